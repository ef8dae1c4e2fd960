//! Recursive reconciler
//!
//! Walks the proposed tree top-down alongside config and prior, applying
//! guards, correlation and the preservation policy at every object and set.
//! Each pass is synchronous and owns nothing but its observer; the three
//! input trees are only read.

use crate::consistency;
use crate::context::{NoObserver, ReconcileObserver, ReconcileReport};
use crate::correlate::{correlate, index_by_key};
use crate::error::Result;
use crate::guard::{self, Guard};
use crate::node::{CollectionNode, Node, ObjectNode};
use crate::path::FieldPath;
use crate::rules;
use crate::schema::{Ownership, Shape};
use crate::value::Value;
use rayon::prelude::*;
use std::sync::Arc;

/// Output of one reconciliation pass
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// The authoritative next state
    pub tree: Node,
    /// What the engine decided along the way
    pub report: ReconcileReport,
}

/// One reconciliation pass over three snapshots
pub struct Reconciler<'o> {
    pub(crate) observer: &'o mut dyn ReconcileObserver,
}

impl<'o> Reconciler<'o> {
    pub fn new(observer: &'o mut dyn ReconcileObserver) -> Self {
        Self { observer }
    }

    /// Reconcile `proposed` against `config` and `prior`
    ///
    /// All three trees are checked against the proposed tree's schema first;
    /// any structural mismatch aborts before anything is produced. A missing
    /// prior means the resource is being created.
    pub fn reconcile(&mut self, config: &Node, prior: Option<&Node>, proposed: &Node) -> Result<Node> {
        let shape = proposed.shape();
        let root = FieldPath::root();

        proposed.check_shape(&shape, &root)?;
        config.check_shape(&shape, &root)?;
        if let Some(prior) = prior {
            prior.check_shape(&shape, &root)?;
        }

        Ok(self.node(&root, Some(config), prior, proposed))
    }

    /// Dispatch on node kind
    pub(crate) fn node(
        &mut self,
        path: &FieldPath,
        config: Option<&Node>,
        prior: Option<&Node>,
        proposed: &Node,
    ) -> Node {
        match proposed {
            Node::Scalar(_) => proposed.clone(),
            Node::Object(object) => self.object(path, config, prior, proposed, object),
            Node::Collection(collection) if collection.schema.ordered => proposed.clone(),
            Node::Collection(collection) => self.set(path, config, prior, proposed, collection),
        }
    }

    fn object(
        &mut self,
        path: &FieldPath,
        config: Option<&Node>,
        prior: Option<&Node>,
        proposed: &Node,
        object: &ObjectNode,
    ) -> Node {
        if let Some(guard) = guard::check_node(config, prior, proposed) {
            self.guarded(path, &guard);
            if guard == Guard::FirstCreation {
                return self.first_creation(path, config, proposed);
            }
            return proposed.clone();
        }

        let (Some(config_fields), Some(prior_fields), Some(proposed_fields)) = (
            config.and_then(Node::known_fields),
            prior.and_then(Node::known_fields),
            object.fields.known(),
        ) else {
            return proposed.clone();
        };

        let fields = self.preserve_fields(
            path,
            &object.schema,
            Some(config_fields),
            Some(prior_fields),
            proposed_fields,
        );
        Node::Object(ObjectNode {
            schema: Arc::clone(&object.schema),
            fields: Value::Known(fields),
        })
    }

    /// Proposal with first-creation defaults applied beneath `path`
    ///
    /// Descends into nested objects and set elements; a set element takes the
    /// config element with the same identity key.
    fn first_creation(&mut self, path: &FieldPath, config: Option<&Node>, proposed: &Node) -> Node {
        match proposed {
            Node::Object(object) => self.created_object(path, config, proposed, object),
            Node::Collection(collection)
                if !collection.schema.ordered
                    && matches!(collection.schema.element, Shape::Object(_)) =>
            {
                self.created_set(path, config, proposed, collection)
            }
            Node::Scalar(_) | Node::Collection(_) => proposed.clone(),
        }
    }

    fn created_object(
        &mut self,
        path: &FieldPath,
        config: Option<&Node>,
        proposed: &Node,
        object: &ObjectNode,
    ) -> Node {
        let Some(proposed_fields) = object.fields.known() else {
            return proposed.clone();
        };
        let config_fields = config.and_then(Node::known_fields);

        let fields = object
            .schema
            .fields()
            .iter()
            .zip(proposed_fields)
            .enumerate()
            .map(|(i, (field, proposed))| {
                let path = path.field(&field.name);
                let config = config_fields.and_then(|c| c.get(i));
                if let Some(default) =
                    rules::creation_default(field.rule.as_ref(), &field.shape, config, true)
                {
                    log::debug!("{path}: substituting first-creation default");
                    self.observer.on_default(&path);
                    return default;
                }
                match field.ownership {
                    Ownership::Recurse => self.first_creation(&path, config, proposed),
                    Ownership::User | Ownership::Server => proposed.clone(),
                }
            })
            .collect();

        Node::Object(ObjectNode {
            schema: Arc::clone(&object.schema),
            fields: Value::Known(fields),
        })
    }

    fn created_set(
        &mut self,
        path: &FieldPath,
        config: Option<&Node>,
        proposed: &Node,
        collection: &CollectionNode,
    ) -> Node {
        let Some(proposed_elements) = collection.elements.known() else {
            return proposed.clone();
        };
        let policy = &collection.schema.key_policy;
        let declared = index_by_key(config.and_then(Node::known_elements).unwrap_or_default(), policy);

        let elements = proposed_elements
            .iter()
            .enumerate()
            .map(|(i, element)| {
                let config_element = policy
                    .extract(element)
                    .and_then(|key| declared.get(&key).copied());
                self.first_creation(&path.index(i), config_element, element)
            })
            .collect();

        Node::Collection(CollectionNode {
            schema: Arc::clone(&collection.schema),
            elements: Value::Known(elements),
        })
    }

    fn set(
        &mut self,
        path: &FieldPath,
        config: Option<&Node>,
        prior: Option<&Node>,
        proposed: &Node,
        collection: &CollectionNode,
    ) -> Node {
        if let Some(guard) = guard::check_collection(config, prior, proposed) {
            self.guarded(path, &guard);
            return proposed.clone();
        }

        // Sets of scalars carry no server-owned state to copy forward.
        if !matches!(collection.schema.element, Shape::Object(_)) {
            return proposed.clone();
        }

        let proposed_elements = proposed.known_elements().unwrap_or_default();
        let prior_elements = prior.and_then(Node::known_elements).unwrap_or_default();
        let config_elements = config.and_then(Node::known_elements).unwrap_or_default();
        let policy = &collection.schema.key_policy;

        let correlation = correlate(proposed_elements, prior_elements, policy);
        let declared = index_by_key(config_elements, policy);
        self.observer
            .on_correlate(path, correlation.matched(), proposed_elements.len());
        log::debug!(
            "{path}: matched {}/{} elements by identity key",
            correlation.matched(),
            proposed_elements.len()
        );

        let elements = proposed_elements
            .iter()
            .enumerate()
            .map(|(i, element)| {
                let config_element = correlation.keys[i]
                    .as_ref()
                    .and_then(|key| declared.get(key).copied());
                self.element(&path.index(i), config_element, correlation.get(i), element)
            })
            .collect();

        Node::Collection(CollectionNode {
            schema: Arc::clone(&collection.schema),
            elements: Value::Known(elements),
        })
    }

    /// Apply the preservation policy to one set element and its match, if any
    fn element(
        &mut self,
        path: &FieldPath,
        config: Option<&Node>,
        prior: Option<&Node>,
        proposed: &Node,
    ) -> Node {
        let Node::Object(object) = proposed else {
            return proposed.clone();
        };
        let Some(proposed_fields) = object.fields.known() else {
            return proposed.clone();
        };

        let fields = self.preserve_fields(
            path,
            &object.schema,
            config.and_then(Node::known_fields),
            prior.and_then(Node::known_fields),
            proposed_fields,
        );
        Node::Object(ObjectNode {
            schema: Arc::clone(&object.schema),
            fields: Value::Known(fields),
        })
    }

    fn guarded(&mut self, path: &FieldPath, guard: &Guard) {
        if guard.is_notable() {
            log::warn!("{path}: {guard}");
        } else {
            log::debug!("{path}: {guard}");
        }
        self.observer.on_guard(path, guard);
    }
}

/// Reconcile three snapshots, collecting a report
pub fn reconcile(config: &Node, prior: Option<&Node>, proposed: &Node) -> Result<Reconciled> {
    let mut report = ReconcileReport::default();
    let tree = Reconciler::new(&mut report).reconcile(config, prior, proposed)?;
    Ok(Reconciled { tree, report })
}

/// Reconcile three snapshots without observing decisions
pub fn reconcile_quiet(config: &Node, prior: Option<&Node>, proposed: &Node) -> Result<Node> {
    Reconciler::new(&mut NoObserver).reconcile(config, prior, proposed)
}

/// Run cross-field checks on config, then reconcile
///
/// Violations abort with [`crate::Error::Inconsistent`] before any reconciliation work.
pub fn plan(config: &Node, prior: Option<&Node>, proposed: &Node) -> Result<Reconciled> {
    consistency::ensure_consistent(config)?;
    reconcile(config, prior, proposed)
}

/// Independent inputs for a batch run
#[derive(Debug, Clone)]
pub struct Request {
    /// Caller-chosen name, echoed in logs
    pub label: String,
    pub config: Node,
    pub prior: Option<Node>,
    pub proposed: Node,
}

/// Reconcile independent requests in parallel
///
/// Results come back in input order. Each request is reconciled in isolation;
/// a failing request does not affect the others.
pub fn reconcile_batch(requests: &[Request], jobs: usize) -> Vec<Result<Reconciled>> {
    let run = |request: &Request| {
        log::debug!("Reconciling {}", request.label);
        reconcile(&request.config, request.prior.as_ref(), &request.proposed)
    };

    if jobs <= 1 || requests.len() <= 1 {
        return requests.iter().map(run).collect();
    }

    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(|| requests.par_iter().map(run).collect()),
        Err(e) => {
            log::warn!("Failed to create thread pool ({e}), reconciling sequentially");
            requests.iter().map(run).collect()
        }
    }
}
