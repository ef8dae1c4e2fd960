//! Field-specific rules layered on top of the generic engine
//!
//! - first-creation defaults (`DefaultOnCreate`, `DefaultEmpty`)
//! - boundary windows: paired optional boundary values with boolean
//!   "use this boundary" flags, kept in step with declared configuration

use crate::error::{Error, Result};
use crate::node::Node;
use crate::schema::{FieldRule, ObjectSchema, Shape};
use crate::value::{Scalar, ScalarKind, Value};
use chrono::{DateTime, NaiveDate};

/// Boundary value field and the flag that says whether it is in use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryPair {
    pub value: usize,
    pub flag: usize,
    pub value_name: String,
    pub flag_name: String,
}

/// Window rule over an object's fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRule {
    pairs: Vec<BoundaryPair>,
}

impl WindowRule {
    /// Resolve `(boundary, flag)` field name pairs against the window object
    pub fn new(object: &ObjectSchema, pairs: &[(&str, &str)]) -> Result<Self> {
        let mut resolved = Vec::with_capacity(pairs.len());
        for (value_name, flag_name) in pairs {
            let lookup = |name: &str| {
                object.index_of(name).ok_or_else(|| {
                    Error::schema(&object.name, format!("window references unknown field '{name}'"))
                })
            };
            resolved.push(BoundaryPair {
                value: lookup(value_name)?,
                flag: lookup(flag_name)?,
                value_name: (*value_name).to_string(),
                flag_name: (*flag_name).to_string(),
            });
        }
        let rule = Self { pairs: resolved };
        if !rule.fits(object) {
            return Err(Error::schema(
                &object.name,
                "window boundaries must be scalars and their flags bools",
            ));
        }
        Ok(rule)
    }

    pub fn pairs(&self) -> &[BoundaryPair] {
        &self.pairs
    }

    /// Every pair points at a scalar boundary and a bool flag of `object`
    pub(crate) fn fits(&self, object: &ObjectSchema) -> bool {
        let fields = object.fields();
        !self.pairs.is_empty()
            && self.pairs.iter().all(|p| {
                matches!(fields.get(p.value).map(|f| &f.shape), Some(Shape::Scalar(_)))
                    && matches!(
                        fields.get(p.flag).map(|f| &f.shape),
                        Some(Shape::Scalar(ScalarKind::Bool))
                    )
            })
    }

    /// Whether declared boundaries differ from prior ones
    ///
    /// A boundary diverges when config removes one prior had, or declares a
    /// value different from prior's. Unknown config boundaries never diverge.
    pub fn diverges(&self, config: &[Node], prior: &[Node]) -> bool {
        self.pairs.iter().any(|pair| {
            let declared = scalar_at(config, pair.value);
            let previous = scalar_at(prior, pair.value);
            match declared {
                Value::Unknown => false,
                d if !d.is_present() => previous.is_present(),
                d => !same_boundary(d, previous),
            }
        })
    }

    /// Take boundaries from config and derive each flag from boundary presence
    pub fn apply(&self, reconciled: &[Node], config: &[Node]) -> Vec<Node> {
        let mut fields = reconciled.to_vec();
        for pair in &self.pairs {
            let declared = scalar_at(config, pair.value);
            if declared.is_unknown() {
                continue;
            }
            if let Some(node) = config.get(pair.value) {
                fields[pair.value] = node.clone();
            }
            fields[pair.flag] = Node::scalar(ScalarKind::Bool, Value::bool(declared.is_present()));
        }
        fields
    }
}

fn scalar_at(fields: &[Node], index: usize) -> &Value {
    const NULL: &Value = &Value::Null;
    fields.get(index).and_then(Node::value).unwrap_or(NULL)
}

/// Compare boundary values, treating equal instants in different notations as equal
fn same_boundary(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Known(Scalar::String(x)), Value::Known(Scalar::String(y))) => {
            if x == y {
                return true;
            }
            if let (Ok(x), Ok(y)) = (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                return x == y;
            }
            if let (Ok(x), Ok(y)) = (
                NaiveDate::parse_from_str(x, "%Y-%m-%d"),
                NaiveDate::parse_from_str(y, "%Y-%m-%d"),
            ) {
                return x == y;
            }
            false
        }
        _ => a == b,
    }
}

/// Re-derive a window object when declared boundaries diverge from prior ones
///
/// Returns the replacement node, or `None` when config or prior is not a known
/// object or nothing diverges.
pub fn enforce_window(
    rule: &WindowRule,
    config: Option<&Node>,
    prior: Option<&Node>,
    reconciled: &Node,
) -> Option<Node> {
    let config_fields = config.and_then(Node::known_fields)?;
    let prior_fields = prior.and_then(Node::known_fields)?;
    let reconciled_fields = reconciled.known_fields()?;
    let object = reconciled.as_object()?;

    if !rule.diverges(config_fields, prior_fields) {
        return None;
    }
    Some(Node::object(
        &object.schema,
        rule.apply(reconciled_fields, config_fields),
    ))
}

/// First-creation substitute for a field whose config is null
///
/// `creating` is true only when the enclosing object has no prior state. An
/// existing object whose field happens to be null is never reset to its
/// default.
pub fn creation_default(
    rule: Option<&FieldRule>,
    shape: &Shape,
    config: Option<&Node>,
    creating: bool,
) -> Option<Node> {
    if !creating || !config.is_none_or(Node::is_null) {
        return None;
    }
    match (rule?, shape) {
        (FieldRule::DefaultOnCreate(default), _) => Some(default.clone()),
        (FieldRule::DefaultEmpty, Shape::Collection(schema)) => {
            Some(Node::collection(schema, Vec::new()))
        }
        _ => None,
    }
}
