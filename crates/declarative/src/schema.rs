//! Compiled schema descriptors
//!
//! A schema is built once per resource type and shared through `Arc` by every
//! node decoded against it. Field references inside key policies, window rules
//! and cross-field checks are resolved to positions when the schema is built,
//! so reconciliation never looks fields up by name.

use crate::consistency::CrossFieldRule;
use crate::error::{Error, Result};
use crate::key::KeyPolicy;
use crate::node::Node;
use crate::rules::WindowRule;
use crate::value::ScalarKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Who is authoritative for a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    /// Always taken from the proposal
    #[serde(alias = "user_owned")]
    User,
    /// Assigned by the external system; copied forward from prior state when matched
    #[serde(alias = "server_owned")]
    Server,
    /// Nested object or collection reconciled recursively
    Recurse,
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::Server => "server",
            Self::Recurse => "recurse",
        };
        f.write_str(name)
    }
}

/// Shape a node must have
#[derive(Debug, Clone)]
pub enum Shape {
    Scalar(ScalarKind),
    Object(Arc<ObjectSchema>),
    Collection(Arc<CollectionSchema>),
}

impl Shape {
    pub fn string() -> Self {
        Self::Scalar(ScalarKind::String)
    }

    pub fn bool() -> Self {
        Self::Scalar(ScalarKind::Bool)
    }

    pub fn number() -> Self {
        Self::Scalar(ScalarKind::Number)
    }

    pub fn object(schema: &Arc<ObjectSchema>) -> Self {
        Self::Object(Arc::clone(schema))
    }

    /// Unordered collection correlated by identity key
    pub fn set(element: Shape, key_policy: KeyPolicy) -> Self {
        Self::Collection(Arc::new(CollectionSchema {
            element,
            ordered: false,
            key_policy,
        }))
    }

    /// Ordered collection; positional identity, never correlated
    pub fn list(element: Shape) -> Self {
        Self::Collection(Arc::new(CollectionSchema {
            element,
            ordered: true,
            key_policy: KeyPolicy::default(),
        }))
    }

    /// Structural equality: same kind, same object type, same collection flavour
    pub fn same_as(&self, other: &Shape) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.same_type(b),
            (Self::Collection(a), Self::Collection(b)) => {
                Arc::ptr_eq(a, b) || (a.ordered == b.ordered && a.element.same_as(&b.element))
            }
            _ => false,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Object(obj) => write!(f, "object<{}>", obj.name),
            Self::Collection(c) if c.ordered => write!(f, "list<{}>", c.element),
            Self::Collection(c) => write!(f, "set<{}>", c.element),
        }
    }
}

/// Field-specific rule layered on top of the generic engine
#[derive(Debug, Clone)]
pub enum FieldRule {
    /// Substitute this value when config is null and the object is being created
    DefaultOnCreate(Node),
    /// Substitute an empty collection when config is null on first creation
    DefaultEmpty,
    /// Paired boundary values with "use this boundary" flags
    Window(WindowRule),
}

/// One field of an object schema
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: String,
    pub shape: Shape,
    pub ownership: Ownership,
    pub rule: Option<FieldRule>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, shape: Shape, ownership: Ownership) -> Self {
        Self {
            name: name.into(),
            shape,
            ownership,
            rule: None,
        }
    }

    /// User-owned field
    pub fn user(name: impl Into<String>, shape: Shape) -> Self {
        Self::new(name, shape, Ownership::User)
    }

    /// Server-owned field
    pub fn server(name: impl Into<String>, shape: Shape) -> Self {
        Self::new(name, shape, Ownership::Server)
    }

    /// Recursively reconciled field
    pub fn recurse(name: impl Into<String>, shape: Shape) -> Self {
        Self::new(name, shape, Ownership::Recurse)
    }

    pub fn with_rule(mut self, rule: FieldRule) -> Self {
        self.rule = Some(rule);
        self
    }
}

/// Object type: a fixed, ordered field set
#[derive(Debug)]
pub struct ObjectSchema {
    pub name: String,
    fields: Vec<FieldSchema>,
    checks: Vec<CrossFieldRule>,
}

impl ObjectSchema {
    pub fn builder(name: impl Into<String>) -> ObjectSchemaBuilder {
        ObjectSchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            requires: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field, used while compiling rules
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn checks(&self) -> &[CrossFieldRule] {
        &self.checks
    }

    /// Same descriptor, or one with the same name and field layout
    ///
    /// Fields are paired by position during reconciliation, so a schema that
    /// merely shares the name is a different type.
    pub fn same_type(&self, other: &ObjectSchema) -> bool {
        std::ptr::eq(self, other)
            || (self.name == other.name
                && self.fields.len() == other.fields.len()
                && self.fields.iter().zip(&other.fields).all(|(a, b)| {
                    a.name == b.name && a.ownership == b.ownership && a.shape.same_as(&b.shape)
                }))
    }
}

/// Collection type
#[derive(Debug)]
pub struct CollectionSchema {
    pub element: Shape,
    /// `true` for lists, `false` for sets
    pub ordered: bool,
    pub key_policy: KeyPolicy,
}

/// Builder for [`ObjectSchema`]
pub struct ObjectSchemaBuilder {
    name: String,
    fields: Vec<FieldSchema>,
    requires: Vec<(String, String, Vec<String>)>,
    conflicts: Vec<(String, String)>,
}

impl ObjectSchemaBuilder {
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// `field` may only be set when `prerequisite` holds one of `allowed`
    pub fn requires(mut self, field: &str, prerequisite: &str, allowed: &[&str]) -> Self {
        self.requires.push((
            field.to_string(),
            prerequisite.to_string(),
            allowed.iter().map(|s| (*s).to_string()).collect(),
        ));
        self
    }

    /// `a` and `b` may not both be set
    pub fn conflicts(mut self, a: &str, b: &str) -> Self {
        self.conflicts.push((a.to_string(), b.to_string()));
        self
    }

    pub fn build(self) -> Result<Arc<ObjectSchema>> {
        let name = self.name;
        let fields = self.fields;

        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::schema(&name, format!("duplicate field '{}'", field.name)));
            }
            if field.ownership == Ownership::Recurse && field.shape.is_scalar() {
                return Err(Error::schema(
                    &name,
                    format!("field '{}' is a scalar and cannot recurse", field.name),
                ));
            }
            match &field.rule {
                Some(FieldRule::DefaultOnCreate(default)) if !default.conforms_to(&field.shape) => {
                    return Err(Error::schema(
                        &name,
                        format!(
                            "default for '{}' is not a {}",
                            field.name, field.shape
                        ),
                    ));
                }
                Some(FieldRule::DefaultEmpty) if !matches!(field.shape, Shape::Collection(_)) => {
                    return Err(Error::schema(
                        &name,
                        format!("default_empty on '{}' requires a collection", field.name),
                    ));
                }
                Some(FieldRule::Window(window)) => match &field.shape {
                    Shape::Object(obj) if window.fits(obj) => {}
                    _ => {
                        return Err(Error::schema(
                            &name,
                            format!("window rule on '{}' does not fit its object", field.name),
                        ));
                    }
                },
                _ => {}
            }
        }

        let lookup = |field: &str| {
            fields
                .iter()
                .position(|f| f.name == field)
                .ok_or_else(|| Error::schema(&name, format!("rule references unknown field '{field}'")))
        };

        let mut checks = Vec::new();
        for (field, prerequisite, allowed) in self.requires {
            checks.push(CrossFieldRule::Requires {
                field: lookup(&field)?,
                prerequisite: lookup(&prerequisite)?,
                allowed,
            });
        }
        for (a, b) in self.conflicts {
            checks.push(CrossFieldRule::ConflictsWith {
                field: lookup(&a)?,
                other: lookup(&b)?,
            });
        }

        Ok(Arc::new(ObjectSchema {
            name,
            fields,
            checks,
        }))
    }
}
