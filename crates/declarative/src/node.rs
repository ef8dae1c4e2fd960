//! Tree model: scalar, object and collection nodes
//!
//! Nodes are built once from a snapshot and never mutated afterwards.
//! Reconciliation reads three trees and allocates a fresh fourth one.

use crate::error::{Error, Result};
use crate::path::FieldPath;
use crate::schema::{CollectionSchema, ObjectSchema, Shape};
use crate::value::{ScalarKind, Value};
use std::sync::Arc;

/// A node of a snapshot tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(ScalarNode),
    Object(ObjectNode),
    Collection(CollectionNode),
}

/// Leaf value with its declared kind
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarNode {
    pub kind: ScalarKind,
    pub value: Value,
}

/// Object with a fixed field set; `fields` is positional against the schema
#[derive(Debug, Clone)]
pub struct ObjectNode {
    pub schema: Arc<ObjectSchema>,
    pub fields: Value<Vec<Node>>,
}

/// Set or list of nodes
#[derive(Debug, Clone)]
pub struct CollectionNode {
    pub schema: Arc<CollectionSchema>,
    pub elements: Value<Vec<Node>>,
}

impl PartialEq for ObjectNode {
    fn eq(&self, other: &Self) -> bool {
        self.schema.same_type(&other.schema) && self.fields == other.fields
    }
}

impl PartialEq for CollectionNode {
    fn eq(&self, other: &Self) -> bool {
        self.schema.ordered == other.schema.ordered && self.elements == other.elements
    }
}

impl Node {
    /// Scalar node
    pub fn scalar(kind: ScalarKind, value: Value) -> Self {
        Self::Scalar(ScalarNode { kind, value })
    }

    /// Known object node
    pub fn object(schema: &Arc<ObjectSchema>, fields: Vec<Node>) -> Self {
        Self::Object(ObjectNode {
            schema: Arc::clone(schema),
            fields: Value::Known(fields),
        })
    }

    /// Known collection node
    pub fn collection(schema: &Arc<CollectionSchema>, elements: Vec<Node>) -> Self {
        Self::Collection(CollectionNode {
            schema: Arc::clone(schema),
            elements: Value::Known(elements),
        })
    }

    /// Null node of the given shape
    pub fn null(shape: &Shape) -> Self {
        Self::unresolved(shape, false)
    }

    /// Unknown node of the given shape
    pub fn unknown(shape: &Shape) -> Self {
        Self::unresolved(shape, true)
    }

    fn unresolved(shape: &Shape, unknown: bool) -> Self {
        fn tag<T>(unknown: bool) -> Value<T> {
            if unknown { Value::Unknown } else { Value::Null }
        }
        match shape {
            Shape::Scalar(kind) => Self::Scalar(ScalarNode {
                kind: *kind,
                value: tag(unknown),
            }),
            Shape::Object(schema) => Self::Object(ObjectNode {
                schema: Arc::clone(schema),
                fields: tag(unknown),
            }),
            Shape::Collection(schema) => Self::Collection(CollectionNode {
                schema: Arc::clone(schema),
                elements: tag(unknown),
            }),
        }
    }

    /// Shape this node was built for
    pub fn shape(&self) -> Shape {
        match self {
            Self::Scalar(s) => Shape::Scalar(s.kind),
            Self::Object(o) => Shape::Object(Arc::clone(&o.schema)),
            Self::Collection(c) => Shape::Collection(Arc::clone(&c.schema)),
        }
    }

    /// Lattice tag of this node, ignoring the payload
    pub fn tag(&self) -> Value<()> {
        match self {
            Self::Scalar(s) => s.value.as_ref().map(|_| ()),
            Self::Object(o) => o.fields.as_ref().map(|_| ()),
            Self::Collection(c) => c.elements.as_ref().map(|_| ()),
        }
    }

    pub fn is_known(&self) -> bool {
        self.tag().is_known()
    }

    pub fn is_null(&self) -> bool {
        self.tag().is_null()
    }

    pub fn is_unknown(&self) -> bool {
        self.tag().is_unknown()
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionNode> {
        match self {
            Self::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// Scalar value, if this is a scalar node
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Scalar(s) => Some(&s.value),
            _ => None,
        }
    }

    /// Known fields of an object node
    pub fn known_fields(&self) -> Option<&[Node]> {
        self.as_object().and_then(|o| o.fields.known()).map(Vec::as_slice)
    }

    /// Known elements of a collection node
    pub fn known_elements(&self) -> Option<&[Node]> {
        self.as_collection()
            .and_then(|c| c.elements.known())
            .map(Vec::as_slice)
    }

    /// Whether this node, recursively, matches `shape`
    pub fn conforms_to(&self, shape: &Shape) -> bool {
        self.check_shape(shape, &FieldPath::root()).is_ok()
    }

    /// Verify this node, recursively, matches `shape`
    ///
    /// Scalar payloads must match their declared kind, known objects must carry
    /// exactly one node per schema field, and every child must conform in turn.
    pub fn check_shape(&self, shape: &Shape, path: &FieldPath) -> Result<()> {
        if !self.shape().same_as(shape) {
            return Err(Error::mismatch(path, shape.to_string(), self.shape().to_string()));
        }
        match self {
            Self::Scalar(s) => match &s.value {
                Value::Known(payload) if payload.kind() != s.kind => Err(Error::mismatch(
                    path,
                    s.kind.to_string(),
                    payload.kind().to_string(),
                )),
                _ => Ok(()),
            },
            Self::Object(o) => {
                let Some(fields) = o.fields.known() else {
                    return Ok(());
                };
                if fields.len() != o.schema.len() {
                    return Err(Error::mismatch(
                        path,
                        format!("{} fields", o.schema.len()),
                        format!("{} fields", fields.len()),
                    ));
                }
                for (node, field) in fields.iter().zip(o.schema.fields()) {
                    node.check_shape(&field.shape, &path.field(&field.name))?;
                }
                Ok(())
            }
            Self::Collection(c) => {
                let Some(elements) = c.elements.known() else {
                    return Ok(());
                };
                for (i, element) in elements.iter().enumerate() {
                    element.check_shape(&c.schema.element, &path.index(i))?;
                }
                Ok(())
            }
        }
    }
}

impl ObjectNode {
    /// Field by schema position
    pub fn field(&self, index: usize) -> Option<&Node> {
        self.fields.known().and_then(|f| f.get(index))
    }

    /// Field by name; for tests and display, not for the engine
    pub fn field_named(&self, name: &str) -> Option<&Node> {
        self.schema.index_of(name).and_then(|i| self.field(i))
    }
}

/// Build an object from `(name, node)` pairs in any order; missing fields become null
///
/// Intended for tests and hand-built fixtures.
pub fn object_from(schema: &Arc<ObjectSchema>, pairs: Vec<(&str, Node)>) -> Result<Node> {
    let mut fields: Vec<Node> = schema.fields().iter().map(|f| Node::null(&f.shape)).collect();
    for (name, node) in pairs {
        let index = schema
            .index_of(name)
            .ok_or_else(|| Error::schema(&schema.name, format!("no field named '{name}'")))?;
        fields[index] = node;
    }
    Ok(Node::object(schema, fields))
}

/// Known string scalar node
pub fn string(s: &str) -> Node {
    Node::scalar(ScalarKind::String, Value::string(s))
}

/// Known bool scalar node
pub fn boolean(b: bool) -> Node {
    Node::scalar(ScalarKind::Bool, Value::bool(b))
}

/// Known number scalar node
pub fn number(n: f64) -> Node {
    Node::scalar(ScalarKind::Number, Value::number(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;

    fn host() -> Arc<ObjectSchema> {
        ObjectSchema::builder("host")
            .field(FieldSchema::user("name", Shape::string()))
            .field(FieldSchema::server("id", Shape::string()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_null_and_unknown_keep_schema() {
        let shape = Shape::object(&host());
        let null = Node::null(&shape);
        let unknown = Node::unknown(&shape);
        assert!(null.is_null());
        assert!(unknown.is_unknown());
        assert!(null.shape().same_as(&shape));
        assert!(unknown.conforms_to(&shape));
    }

    #[test]
    fn test_object_from_fills_missing_with_null() {
        let schema = host();
        let node = object_from(&schema, vec![("name", string("h1"))]).unwrap();
        let obj = node.as_object().unwrap();
        assert_eq!(obj.field_named("name"), Some(&string("h1")));
        assert!(obj.field_named("id").unwrap().is_null());
    }

    #[test]
    fn test_check_shape_reports_path() {
        let schema = host();
        let node = Node::object(&schema, vec![string("h1"), boolean(true)]);
        let err = node
            .check_shape(&Shape::object(&schema), &FieldPath::root().field("hosts").index(0))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "schema mismatch at hosts[0].id: expected string, found bool"
        );
    }

    #[test]
    fn test_check_shape_field_count() {
        let schema = host();
        let node = Node::object(&schema, vec![string("h1")]);
        assert!(!node.conforms_to(&Shape::object(&schema)));
    }

    #[test]
    fn test_scalar_payload_kind_checked() {
        let node = Node::scalar(ScalarKind::String, Value::bool(true));
        let err = node.check_shape(&Shape::string(), &FieldPath::root()).unwrap_err();
        assert!(err.to_string().contains("expected string, found bool"));
    }
}
