//! # Declarative
//!
//! Tree reconciliation for declarative resource management.
//!
//! Before a change is applied, three snapshots of the same resource exist:
//! the declared configuration, the prior state last read from the external
//! system, and a freshly computed proposal. This crate merges them into one
//! reconciled tree that follows declared intent, keeps server-assigned
//! identifiers, and avoids false change signals caused by null/unknown
//! differences or by reordering inside unordered collections.
//!
//! ## Core Concepts
//!
//! - **Value**: `Null`, `Unknown` or `Known(payload)`
//! - **Node**: scalar, object or collection, each carrying its schema
//! - **Schema**: field shapes, ownership (user, server, recurse), key
//!   policies for sets, field rules and cross-field checks
//! - **Reconciler**: walks the tree applying guards, correlation and
//!   preservation
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{SchemaDefinition, reconcile, snapshot};
//!
//! let shape = SchemaDefinition::from_toml(DEFINITION)?.root_shape()?;
//! let config = snapshot::decode(&config_json, &shape)?;
//! let prior = snapshot::decode(&prior_json, &shape)?;
//! let proposed = snapshot::decode(&proposed_json, &shape)?;
//!
//! let reconciled = reconcile(&config, Some(&prior), &proposed)?;
//! println!("{}", snapshot::encode(&reconciled.tree));
//! ```
//!
//! ## Observer Traits
//!
//! - [`ReconcileObserver`]: receives guard, correlation and preservation decisions
//! - [`ViolationReporter`]: receives cross-field consistency failures
//!
//! Neither depends on a particular logging or UI layer; [`ReconcileReport`]
//! and `Vec<Violation>` are the stock implementations.

pub mod consistency;
pub mod context;
pub mod correlate;
pub mod definition;
pub mod diff;
pub mod error;
pub mod guard;
pub mod key;
pub mod node;
pub mod path;
mod preserve;
pub mod reconcile;
pub mod rules;
pub mod schema;
pub mod snapshot;
pub mod value;

// Re-export main types at crate root
pub use consistency::{CrossFieldRule, Violation, check_consistency, check_with, ensure_consistent};
pub use context::{NoObserver, ReconcileObserver, ReconcileReport, ViolationReporter};
pub use correlate::{Correlation, correlate};
pub use definition::SchemaDefinition;
pub use diff::{ChangeKind, DiffSummary, FieldChange, diff_trees, group_by_kind};
pub use error::{Error, ErrorCategory, Result};
pub use guard::Guard;
pub use key::{KeyCandidate, KeyPolicy};
pub use node::{CollectionNode, Node, ObjectNode, ScalarNode};
pub use path::FieldPath;
pub use reconcile::{Reconciled, Reconciler, Request, plan, reconcile, reconcile_batch};
pub use rules::WindowRule;
pub use schema::{
    CollectionSchema, FieldRule, FieldSchema, ObjectSchema, ObjectSchemaBuilder, Ownership, Shape,
};
pub use snapshot::RequestFile;
pub use value::{Scalar, ScalarKind, Value};
