//! Change detection between prior state and a reconciled tree
//!
//! Sets of objects are compared by identity key, so reordering is not a
//! change; lists are compared by position.

use crate::correlate::index_by_key;
use crate::node::{CollectionNode, Node};
use crate::path::FieldPath;
use crate::snapshot;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Kind of change at one path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    /// Value will only be resolved by the external system
    KnownAfterApply,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Added => "+",
            Self::Removed => "-",
            Self::Modified => "~",
            Self::KnownAfterApply => "?",
        };
        f.write_str(symbol)
    }
}

/// A change at one path, with compact JSON renderings of both sides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub path: String,
    pub kind: ChangeKind,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl FieldChange {
    fn new(path: &FieldPath, kind: ChangeKind, before: Option<&Node>, after: Option<&Node>) -> Self {
        Self {
            path: path.to_string(),
            kind,
            before: before.map(render),
            after: after.map(render),
        }
    }
}

fn render(node: &Node) -> String {
    if node.is_unknown() {
        "(known after apply)".to_string()
    } else {
        snapshot::encode(node).to_string()
    }
}

/// Changes needed to move from `prior` to `next`
///
/// A missing prior means everything in `next` is new.
pub fn diff_trees(prior: Option<&Node>, next: &Node) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    walk(prior, next, &FieldPath::root(), &mut changes);
    changes
}

fn walk(prior: Option<&Node>, next: &Node, path: &FieldPath, out: &mut Vec<FieldChange>) {
    let prior = prior.filter(|p| !p.is_null());

    if next.is_unknown() {
        out.push(FieldChange::new(path, ChangeKind::KnownAfterApply, prior, Some(next)));
        return;
    }
    let Some(prior) = prior else {
        if next.is_known() {
            out.push(FieldChange::new(path, ChangeKind::Added, None, Some(next)));
        }
        return;
    };
    if next.is_null() {
        out.push(FieldChange::new(path, ChangeKind::Removed, Some(prior), None));
        return;
    }

    match (prior, next) {
        (Node::Object(_), Node::Object(after)) => {
            let before_fields = prior.known_fields().unwrap_or_default();
            let after_fields = next.known_fields().unwrap_or_default();
            for (i, field) in after.schema.fields().iter().enumerate() {
                if let Some(child) = after_fields.get(i) {
                    walk(before_fields.get(i), child, &path.field(&field.name), out);
                }
            }
        }
        (Node::Collection(_), Node::Collection(collection)) if collection.schema.ordered => {
            positional(prior, next, path, out);
        }
        (Node::Collection(_), Node::Collection(collection)) => {
            unordered(prior, next, collection, path, out);
        }
        _ => {
            if prior != next {
                out.push(FieldChange::new(path, ChangeKind::Modified, Some(prior), Some(next)));
            }
        }
    }
}

fn positional(prior: &Node, next: &Node, path: &FieldPath, out: &mut Vec<FieldChange>) {
    let before = prior.known_elements().unwrap_or_default();
    let after = next.known_elements().unwrap_or_default();
    for (i, element) in after.iter().enumerate() {
        walk(before.get(i), element, &path.index(i), out);
    }
    for (i, element) in before.iter().enumerate().skip(after.len()) {
        out.push(FieldChange::new(&path.index(i), ChangeKind::Removed, Some(element), None));
    }
}

fn unordered(
    prior: &Node,
    next: &Node,
    collection: &CollectionNode,
    path: &FieldPath,
    out: &mut Vec<FieldChange>,
) {
    let before = prior.known_elements().unwrap_or_default();
    let after = next.known_elements().unwrap_or_default();
    let policy = &collection.schema.key_policy;

    if policy.is_empty() {
        // Without identity keys, elements only match when equal.
        for (i, element) in after.iter().enumerate() {
            if !before.contains(element) {
                out.push(FieldChange::new(&path.index(i), ChangeKind::Added, None, Some(element)));
            }
        }
        for (i, element) in before.iter().enumerate() {
            if !after.contains(element) {
                out.push(FieldChange::new(&path.index(i), ChangeKind::Removed, Some(element), None));
            }
        }
        return;
    }

    let by_key = index_by_key(before, policy);
    let mut seen = HashSet::new();
    for (i, element) in after.iter().enumerate() {
        let key = policy.extract(element);
        let matched = key.as_ref().and_then(|k| by_key.get(k).copied());
        if let Some(key) = key {
            seen.insert(key);
        }
        walk(matched, element, &path.index(i), out);
    }
    for (i, element) in before.iter().enumerate() {
        let kept = policy.extract(element).is_some_and(|k| seen.contains(&k));
        if !kept {
            out.push(FieldChange::new(&path.index(i), ChangeKind::Removed, Some(element), None));
        }
    }
}

/// Change count statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Values appearing for the first time
    pub additions: usize,
    /// Values being removed
    pub removals: usize,
    /// Values being replaced
    pub modifications: usize,
    /// Values resolved only after apply
    pub pending: usize,
}

impl DiffSummary {
    /// Create a summary from a list of changes
    pub fn from_changes(changes: &[FieldChange]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change.kind {
                ChangeKind::Added => summary.additions += 1,
                ChangeKind::Removed => summary.removals += 1,
                ChangeKind::Modified => summary.modifications += 1,
                ChangeKind::KnownAfterApply => summary.pending += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications + self.pending
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group changes by kind
pub fn group_by_kind(changes: &[FieldChange]) -> BTreeMap<ChangeKind, Vec<&FieldChange>> {
    let mut groups: BTreeMap<ChangeKind, Vec<&FieldChange>> = BTreeMap::new();
    for change in changes {
        groups.entry(change.kind).or_default().push(change);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyPolicy;
    use crate::node::{object_from, string};
    use crate::schema::{FieldSchema, ObjectSchema, Shape};
    use std::sync::Arc;

    fn fixture() -> (Arc<ObjectSchema>, Arc<ObjectSchema>) {
        let host = ObjectSchema::builder("host")
            .field(FieldSchema::user("name", Shape::string()))
            .field(FieldSchema::server("id", Shape::string()))
            .build()
            .unwrap();
        let policy = KeyPolicy::parse(&["{name}"], &host).unwrap();
        let monitor = ObjectSchema::builder("monitor")
            .field(FieldSchema::user("name", Shape::string()))
            .field(FieldSchema::recurse("hosts", Shape::set(Shape::object(&host), policy)))
            .build()
            .unwrap();
        (host, monitor)
    }

    fn monitor(schema: &Arc<ObjectSchema>, name: &str, hosts: Vec<Node>) -> Node {
        let Shape::Collection(set) = &schema.fields()[1].shape else {
            unreachable!()
        };
        object_from(
            schema,
            vec![("name", string(name)), ("hosts", Node::collection(set, hosts))],
        )
        .unwrap()
    }

    fn host(schema: &Arc<ObjectSchema>, name: &str, id: Node) -> Node {
        object_from(schema, vec![("name", string(name)), ("id", id)]).unwrap()
    }

    #[test]
    fn test_reordered_set_is_not_a_change() {
        let (h, m) = fixture();
        let prior = monitor(&m, "m", vec![host(&h, "a", string("1")), host(&h, "b", string("2"))]);
        let next = monitor(&m, "m", vec![host(&h, "b", string("2")), host(&h, "a", string("1"))]);
        assert!(diff_trees(Some(&prior), &next).is_empty());
    }

    #[test]
    fn test_added_removed_and_pending() {
        let (h, m) = fixture();
        let prior = monitor(&m, "m", vec![host(&h, "a", string("1")), host(&h, "b", string("2"))]);
        let next = monitor(
            &m,
            "m2",
            vec![host(&h, "a", string("1")), host(&h, "c", Node::unknown(&Shape::string()))],
        );

        let changes = diff_trees(Some(&prior), &next);
        let summary = DiffSummary::from_changes(&changes);
        assert_eq!(summary.modifications, 1);
        assert_eq!(summary.additions, 1);
        assert_eq!(summary.removals, 1);
        assert_eq!(summary.total(), 3);

        assert_eq!(changes[0].path, "name");
        assert_eq!(changes[0].before.as_deref(), Some("\"m\""));
        assert_eq!(changes[1].path, "hosts[1]");
        assert_eq!(changes[1].kind, ChangeKind::Added);
        assert_eq!(changes[2].path, "hosts[1]");
        assert_eq!(changes[2].kind, ChangeKind::Removed);
    }

    #[test]
    fn test_unknown_field_is_pending() {
        let (h, m) = fixture();
        let prior = monitor(&m, "m", vec![host(&h, "a", string("1"))]);
        let next = monitor(&m, "m", vec![host(&h, "a", Node::unknown(&Shape::string()))]);

        let changes = diff_trees(Some(&prior), &next);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::KnownAfterApply);
        assert_eq!(changes[0].path, "hosts[0].id");
        assert_eq!(changes[0].after.as_deref(), Some("(known after apply)"));
    }

    #[test]
    fn test_creation_is_single_addition() {
        let (h, m) = fixture();
        let next = monitor(&m, "m", vec![host(&h, "a", string("1"))]);
        let changes = diff_trees(None, &next);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "<root>");
        assert!(DiffSummary::from_changes(&changes).has_changes());
    }

    #[test]
    fn test_group_by_kind() {
        let (h, m) = fixture();
        let prior = monitor(&m, "m", vec![host(&h, "a", string("1"))]);
        let next = monitor(&m, "n", vec![host(&h, "b", string("1"))]);
        let changes = diff_trees(Some(&prior), &next);
        let groups = group_by_kind(&changes);
        assert_eq!(groups[&ChangeKind::Modified].len(), 1);
        assert_eq!(groups[&ChangeKind::Added].len(), 1);
        assert_eq!(groups[&ChangeKind::Removed].len(), 1);
    }
}
