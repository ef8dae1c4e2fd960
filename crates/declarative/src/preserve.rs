//! Field preservation policy
//!
//! Given a proposed object and, when matched, its prior counterpart, build the
//! reconciled object field by field according to each field's ownership.

use crate::node::Node;
use crate::path::FieldPath;
use crate::reconcile::Reconciler;
use crate::rules;
use crate::schema::{FieldRule, FieldSchema, ObjectSchema, Ownership};

impl Reconciler<'_> {
    /// Reconcile every field of a matched (or unmatched) object pair
    ///
    /// `prior` is `None` for an unmatched element; server-owned fields then
    /// keep whatever the proposal carries and first-creation defaults apply.
    pub(crate) fn preserve_fields(
        &mut self,
        path: &FieldPath,
        schema: &ObjectSchema,
        config: Option<&[Node]>,
        prior: Option<&[Node]>,
        proposed: &[Node],
    ) -> Vec<Node> {
        let creating = prior.is_none();
        schema
            .fields()
            .iter()
            .zip(proposed)
            .enumerate()
            .map(|(i, (field, proposed))| {
                self.preserve_field(
                    &path.field(&field.name),
                    field,
                    creating,
                    config.and_then(|c| c.get(i)),
                    prior.and_then(|p| p.get(i)),
                    proposed,
                )
            })
            .collect()
    }

    fn preserve_field(
        &mut self,
        path: &FieldPath,
        field: &FieldSchema,
        creating: bool,
        config: Option<&Node>,
        prior: Option<&Node>,
        proposed: &Node,
    ) -> Node {
        if let Some(default) =
            rules::creation_default(field.rule.as_ref(), &field.shape, config, creating)
        {
            log::debug!("{path}: substituting first-creation default");
            self.observer.on_default(path);
            return default;
        }

        let reconciled = match field.ownership {
            Ownership::User => proposed.clone(),
            Ownership::Server => match prior {
                Some(prior) if prior.is_known() => {
                    if prior != proposed {
                        self.observer.on_preserved(path);
                    }
                    prior.clone()
                }
                _ => proposed.clone(),
            },
            Ownership::Recurse => self.node(path, config, prior, proposed),
        };

        if let Some(FieldRule::Window(window)) = &field.rule
            && let Some(enforced) = rules::enforce_window(window, config, prior, &reconciled)
        {
            log::debug!("{path}: declared boundaries diverge from prior, forcing change");
            self.observer.on_forced_change(path);
            return enforced;
        }

        reconciled
    }
}

#[cfg(test)]
mod tests {
    use crate::context::ReconcileReport;
    use crate::node::{Node, object_from, string};
    use crate::path::FieldPath;
    use crate::reconcile::Reconciler;
    use crate::schema::{FieldSchema, ObjectSchema, Shape};
    use std::sync::Arc;

    fn host() -> Arc<ObjectSchema> {
        ObjectSchema::builder("host")
            .field(FieldSchema::user("name", Shape::string()))
            .field(FieldSchema::server("id", Shape::string()))
            .build()
            .unwrap()
    }

    fn fields(node: &Node) -> Vec<Node> {
        node.known_fields().unwrap().to_vec()
    }

    #[test]
    fn test_server_field_copied_from_matched_prior() {
        let schema = host();
        let proposed = object_from(
            &schema,
            vec![("name", string("new-name")), ("id", Node::unknown(&Shape::string()))],
        )
        .unwrap();
        let prior = object_from(&schema, vec![("name", string("old")), ("id", string("42"))]).unwrap();

        let mut report = ReconcileReport::default();
        let out = Reconciler::new(&mut report).preserve_fields(
            &FieldPath::root(),
            &schema,
            Some(&fields(&proposed)),
            Some(&fields(&prior)),
            &fields(&proposed),
        );

        assert_eq!(out[0], string("new-name"));
        assert_eq!(out[1], string("42"));
        assert_eq!(report.preserved.len(), 1);
        assert_eq!(report.preserved[0].to_string(), "id");
    }

    #[test]
    fn test_unmatched_keeps_proposed_server_field() {
        let schema = host();
        let proposed = object_from(
            &schema,
            vec![("name", string("h1")), ("id", Node::unknown(&Shape::string()))],
        )
        .unwrap();

        let mut report = ReconcileReport::default();
        let out = Reconciler::new(&mut report).preserve_fields(
            &FieldPath::root(),
            &schema,
            None,
            None,
            &fields(&proposed),
        );

        assert!(out[1].is_unknown());
        assert!(report.preserved.is_empty());
    }

    #[test]
    fn test_null_prior_server_field_not_copied() {
        let schema = host();
        let proposed = object_from(&schema, vec![("name", string("h1")), ("id", string("7"))]).unwrap();
        let prior = object_from(&schema, vec![("name", string("h1"))]).unwrap();

        let mut report = ReconcileReport::default();
        let out = Reconciler::new(&mut report).preserve_fields(
            &FieldPath::root(),
            &schema,
            None,
            Some(&fields(&prior)),
            &fields(&proposed),
        );
        assert_eq!(out[1], string("7"));
    }
}
