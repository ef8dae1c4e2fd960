//! Cross-field consistency checks
//!
//! Run once over a declared configuration before reconciliation. They never
//! modify the tree; every failure goes to a [`ViolationReporter`].

use crate::context::ViolationReporter;
use crate::error::{Error, Result};
use crate::node::{Node, ObjectNode};
use crate::path::FieldPath;
use crate::schema::ObjectSchema;
use crate::value::Value;
use std::fmt;

/// Dependency between two sibling fields, resolved to schema positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossFieldRule {
    /// `field` may only be set while `prerequisite` holds one of `allowed`
    Requires {
        field: usize,
        prerequisite: usize,
        allowed: Vec<String>,
    },
    /// `field` and `other` may not both be set
    ConflictsWith { field: usize, other: usize },
}

impl CrossFieldRule {
    /// Render with field names resolved against the owning schema
    pub fn describe(&self, schema: &ObjectSchema) -> String {
        match self {
            Self::Requires {
                field,
                prerequisite,
                allowed,
            } => format!(
                "{} requires {} in [{}]",
                name(schema, *field),
                name(schema, *prerequisite),
                allowed.join(", ")
            ),
            Self::ConflictsWith { field, other } => {
                format!("{} conflicts with {}", name(schema, *field), name(schema, *other))
            }
        }
    }
}

/// One failed check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: FieldPath,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Check `config` and every nested object, reporting each violation
pub fn check_with(config: &Node, reporter: &mut dyn ViolationReporter) {
    walk(config, &FieldPath::root(), reporter);
}

/// Collect violations into a list
pub fn check_consistency(config: &Node) -> Vec<Violation> {
    let mut found = Vec::new();
    check_with(config, &mut found);
    found
}

/// Fail with [`Error::Inconsistent`] if any check fails
pub fn ensure_consistent(config: &Node) -> Result<()> {
    let violations = check_consistency(config);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::Inconsistent { violations })
    }
}

fn walk(node: &Node, path: &FieldPath, reporter: &mut dyn ViolationReporter) {
    match node {
        Node::Scalar(_) => {}
        Node::Object(object) => {
            let Some(fields) = object.fields.known() else {
                return;
            };
            check_object(object, path, reporter);
            for (field, child) in object.schema.fields().iter().zip(fields) {
                walk(child, &path.field(&field.name), reporter);
            }
        }
        Node::Collection(_) => {
            for (i, element) in node.known_elements().unwrap_or_default().iter().enumerate() {
                walk(element, &path.index(i), reporter);
            }
        }
    }
}

fn check_object(object: &ObjectNode, path: &FieldPath, reporter: &mut dyn ViolationReporter) {
    let schema = &object.schema;
    for rule in schema.checks() {
        match rule {
            CrossFieldRule::Requires {
                field,
                prerequisite,
                allowed,
            } => {
                if !is_set(object.field(*field)) {
                    continue;
                }
                // An unresolved prerequisite cannot be judged yet.
                let holds = match object.field(*prerequisite).and_then(Node::value) {
                    Some(Value::Unknown) => continue,
                    Some(Value::Known(v)) => allowed.iter().any(|a| *a == v.to_string()),
                    _ => false,
                };
                if !holds {
                    reporter.report(
                        &path.field(name(schema, *field)),
                        &format!(
                            "`{}` can only be set when `{}` is one of {:?}",
                            name(schema, *field),
                            name(schema, *prerequisite),
                            allowed
                        ),
                    );
                }
            }
            CrossFieldRule::ConflictsWith { field, other } => {
                if is_set(object.field(*field)) && is_set(object.field(*other)) {
                    reporter.report(
                        &path.field(name(schema, *field)),
                        &format!(
                            "`{}` conflicts with `{}`, set at most one of them",
                            name(schema, *field),
                            name(schema, *other)
                        ),
                    );
                }
            }
        }
    }
}

fn is_set(node: Option<&Node>) -> bool {
    node.is_some_and(Node::is_known)
}

fn name(schema: &ObjectSchema, index: usize) -> &str {
    schema.fields().get(index).map_or("?", |f| f.name.as_str())
}
