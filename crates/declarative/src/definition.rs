//! Schema definitions loaded from TOML
//!
//! A definition names a root object and describes every object type the
//! tree uses. Objects reference each other by name; [`SchemaDefinition::compile`]
//! resolves them into shared [`ObjectSchema`]s.
//!
//! ```toml
//! root = "monitor"
//!
//! [objects.host]
//! fields = [
//!     { name = "type", type = "string" },
//!     { name = "name", type = "string" },
//!     { name = "id", type = "string", owner = "server" },
//! ]
//!
//! [objects.monitor]
//! fields = [
//!     { name = "id", type = "string", owner = "server" },
//!     { name = "hosts", type = "set", object = "host", key = ["{type}:name:{name}"], default_empty = true },
//! ]
//! ```

use crate::error::{Error, Result};
use crate::key::KeyPolicy;
use crate::rules::WindowRule;
use crate::schema::{FieldRule, FieldSchema, ObjectSchema, Ownership, Shape};
use crate::snapshot;
use crate::value::ScalarKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// ============================================================================
// Definition Format
// ============================================================================

/// A complete schema definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Name of the object type at the root of every snapshot
    pub root: String,

    /// Object types by name
    #[serde(default)]
    pub objects: BTreeMap<String, ObjectDefinition>,
}

/// One object type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectDefinition {
    /// Fields in declaration order
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,

    /// Fields that may only be set while a sibling holds given values
    #[serde(default)]
    pub requires: Vec<RequiresDefinition>,

    /// Pairs of fields that may not both be set
    #[serde(default)]
    pub conflicts: Vec<[String; 2]>,
}

/// Field type as written in a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Bool,
    Number,
    Object,
    Set,
    List,
}

/// One field of an object type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: FieldType,

    /// Defaults to `user` for scalars and `recurse` for objects and collections
    #[serde(default)]
    pub owner: Option<Ownership>,

    /// Object type of an `object` field, or element type of a collection of objects
    #[serde(default)]
    pub object: Option<String>,

    /// Element type of a collection of scalars
    #[serde(default)]
    pub element: Option<ScalarKind>,

    /// Identity key templates for a set of objects, most preferred first
    #[serde(default)]
    pub key: Vec<String>,

    /// Value substituted when config is null on first creation (snapshot JSON)
    #[serde(default)]
    pub default: Option<serde_json::Value>,

    /// Substitute an empty collection when config is null on first creation
    #[serde(default)]
    pub default_empty: bool,

    /// `[boundary, flag]` pairs of the referenced window object
    #[serde(default)]
    pub window: Vec<[String; 2]>,
}

/// `field` may only be set when `when` is one of `is`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiresDefinition {
    pub field: String,
    pub when: String,
    pub is: Vec<String>,
}

// ============================================================================
// Loading and Compilation
// ============================================================================

impl SchemaDefinition {
    /// Parse a TOML definition
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::schema("<definition>", e.to_string()))
    }

    /// Resolve every object reference and build the root schema
    pub fn compile(&self) -> Result<Arc<ObjectSchema>> {
        self.compile_object(&self.root)
    }

    /// Build the schema of any defined object type, e.g. to reconcile a sub-resource
    pub fn compile_object(&self, name: &str) -> Result<Arc<ObjectSchema>> {
        let mut compiler = Compiler {
            definition: self,
            built: HashMap::new(),
            visiting: Vec::new(),
        };
        compiler.object(name)
    }

    /// Compile and wrap the root schema as a shape
    pub fn root_shape(&self) -> Result<Shape> {
        Ok(Shape::object(&self.compile()?))
    }
}

struct Compiler<'d> {
    definition: &'d SchemaDefinition,
    built: HashMap<String, Arc<ObjectSchema>>,
    visiting: Vec<String>,
}

impl Compiler<'_> {
    fn object(&mut self, name: &str) -> Result<Arc<ObjectSchema>> {
        if let Some(schema) = self.built.get(name) {
            return Ok(Arc::clone(schema));
        }
        if self.visiting.iter().any(|v| v == name) {
            let mut cycle = self.visiting.clone();
            cycle.push(name.to_string());
            return Err(Error::schema(name, format!("reference cycle: {}", cycle.join(" -> "))));
        }
        let definition = self
            .definition
            .objects
            .get(name)
            .ok_or_else(|| Error::schema(name, "object type is not defined"))?;

        self.visiting.push(name.to_string());
        let mut builder = ObjectSchema::builder(name);
        for field in &definition.fields {
            builder = builder.field(self.field(name, field)?);
        }
        for rule in &definition.requires {
            let allowed: Vec<&str> = rule.is.iter().map(String::as_str).collect();
            builder = builder.requires(&rule.field, &rule.when, &allowed);
        }
        for [a, b] in &definition.conflicts {
            builder = builder.conflicts(a, b);
        }
        self.visiting.pop();

        let schema = builder.build()?;
        log::trace!("Compiled object type '{name}' with {} fields", schema.len());
        self.built.insert(name.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    fn field(&mut self, owner: &str, field: &FieldDefinition) -> Result<FieldSchema> {
        let shape = self.shape(owner, field)?;
        let ownership = field.owner.unwrap_or(if shape.is_scalar() {
            Ownership::User
        } else {
            Ownership::Recurse
        });
        let mut schema = FieldSchema::new(&field.name, shape, ownership);

        let rules = [
            field.default.is_some(),
            field.default_empty,
            !field.window.is_empty(),
        ];
        if rules.iter().filter(|r| **r).count() > 1 {
            return Err(Error::schema(
                owner,
                format!("field '{}' declares more than one rule", field.name),
            ));
        }

        if let Some(default) = &field.default {
            let node = snapshot::decode(default, &schema.shape).map_err(|e| {
                Error::schema(owner, format!("default for '{}': {e}", field.name))
            })?;
            schema = schema.with_rule(FieldRule::DefaultOnCreate(node));
        } else if field.default_empty {
            schema = schema.with_rule(FieldRule::DefaultEmpty);
        } else if !field.window.is_empty() {
            let Shape::Object(window) = &schema.shape else {
                return Err(Error::schema(
                    owner,
                    format!("window on '{}' requires an object field", field.name),
                ));
            };
            let pairs: Vec<(&str, &str)> = field
                .window
                .iter()
                .map(|[value, flag]| (value.as_str(), flag.as_str()))
                .collect();
            let rule = WindowRule::new(window, &pairs)?;
            schema = schema.with_rule(FieldRule::Window(rule));
        }
        Ok(schema)
    }

    fn shape(&mut self, owner: &str, field: &FieldDefinition) -> Result<Shape> {
        let shape = match field.kind {
            FieldType::String => Shape::string(),
            FieldType::Bool => Shape::bool(),
            FieldType::Number => Shape::number(),
            FieldType::Object => Shape::object(&self.referenced(owner, field)?),
            FieldType::Set => {
                let element = self.element(owner, field)?;
                let policy = match &element {
                    Shape::Object(object) if field.key.is_empty() => {
                        return Err(Error::schema(
                            owner,
                            format!(
                                "set '{}' of '{}' needs at least one key template",
                                field.name, object.name
                            ),
                        ));
                    }
                    Shape::Object(object) => KeyPolicy::parse(&field.key, object)?,
                    _ => KeyPolicy::default(),
                };
                Shape::set(element, policy)
            }
            FieldType::List => Shape::list(self.element(owner, field)?),
        };
        Ok(shape)
    }

    fn element(&mut self, owner: &str, field: &FieldDefinition) -> Result<Shape> {
        match (&field.object, field.element) {
            (Some(_), None) => Ok(Shape::object(&self.referenced(owner, field)?)),
            (None, Some(kind)) => Ok(Shape::Scalar(kind)),
            _ => Err(Error::schema(
                owner,
                format!(
                    "collection '{}' needs exactly one of `object` or `element`",
                    field.name
                ),
            )),
        }
    }

    fn referenced(&mut self, owner: &str, field: &FieldDefinition) -> Result<Arc<ObjectSchema>> {
        let name = field.object.as_deref().ok_or_else(|| {
            Error::schema(owner, format!("field '{}' does not name an object type", field.name))
        })?;
        self.object(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    const MONITOR: &str = r#"
root = "monitor"

[objects.host]
fields = [
    { name = "type", type = "string" },
    { name = "name", type = "string" },
    { name = "id", type = "string", owner = "server" },
]

[objects.window]
fields = [
    { name = "start", type = "string" },
    { name = "end", type = "string" },
    { name = "use_start", type = "bool", owner = "server" },
    { name = "use_end", type = "bool", owner = "server" },
]

[objects.monitor]
fields = [
    { name = "name", type = "string" },
    { name = "id", type = "string", owner = "server" },
    { name = "mode", type = "string" },
    { name = "threshold", type = "number" },
    { name = "hosts", type = "set", object = "host", key = ["{type}:name:{name}"], default_empty = true },
    { name = "tags", type = "set", element = "string" },
    { name = "window", type = "object", object = "window", window = [["start", "use_start"], ["end", "use_end"]] },
    { name = "severity", type = "string", default = "warning" },
]
requires = [{ field = "threshold", when = "mode", is = ["metric"] }]
"#;

    #[test]
    fn test_compile_monitor() {
        let definition = SchemaDefinition::from_toml(MONITOR).unwrap();
        let schema = definition.compile().unwrap();

        assert_eq!(schema.name, "monitor");
        assert_eq!(schema.len(), 8);
        assert_eq!(schema.fields()[1].ownership, Ownership::Server);
        assert_eq!(schema.fields()[4].ownership, Ownership::Recurse);
        assert_eq!(schema.checks().len(), 1);

        let Shape::Collection(hosts) = &schema.fields()[4].shape else {
            panic!("hosts should be a collection");
        };
        assert!(!hosts.ordered);
        assert_eq!(hosts.key_policy.candidates().len(), 1);
        assert!(matches!(schema.fields()[4].rule, Some(FieldRule::DefaultEmpty)));
        assert!(matches!(schema.fields()[6].rule, Some(FieldRule::Window(_))));
        match &schema.fields()[7].rule {
            Some(FieldRule::DefaultOnCreate(node)) => assert_eq!(node, &crate::node::string("warning")),
            other => panic!("unexpected rule: {other:?}"),
        }
    }

    #[test]
    fn test_shared_object_compiled_once() {
        let definition = SchemaDefinition::from_toml(
            r#"
root = "pair"
[objects.leaf]
fields = [{ name = "v", type = "string" }]
[objects.pair]
fields = [
    { name = "a", type = "object", object = "leaf" },
    { name = "b", type = "object", object = "leaf" },
]
"#,
        )
        .unwrap();
        let schema = definition.compile().unwrap();
        let (Shape::Object(a), Shape::Object(b)) = (&schema.fields()[0].shape, &schema.fields()[1].shape)
        else {
            panic!("expected object fields");
        };
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_cycle_rejected() {
        let definition = SchemaDefinition::from_toml(
            r#"
root = "a"
[objects.a]
fields = [{ name = "b", type = "object", object = "b" }]
[objects.b]
fields = [{ name = "a", type = "object", object = "a" }]
"#,
        )
        .unwrap();
        let err = definition.compile().unwrap_err();
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_set_of_objects_requires_key() {
        let definition = SchemaDefinition::from_toml(
            r#"
root = "m"
[objects.h]
fields = [{ name = "name", type = "string" }]
[objects.m]
fields = [{ name = "hosts", type = "set", object = "h" }]
"#,
        )
        .unwrap();
        assert!(definition.compile().is_err());
    }

    #[test]
    fn test_undefined_reference() {
        let definition = SchemaDefinition::from_toml(
            r#"
root = "m"
[objects.m]
fields = [{ name = "x", type = "object", object = "missing" }]
"#,
        )
        .unwrap();
        let err = definition.compile().unwrap_err();
        assert!(err.to_string().contains("'missing'"));
    }

    #[test]
    fn test_bad_default_rejected() {
        let definition = SchemaDefinition::from_toml(
            r#"
root = "m"
[objects.m]
fields = [{ name = "n", type = "number", default = "ten" }]
"#,
        )
        .unwrap();
        assert!(definition.compile().is_err());
    }

    #[test]
    fn test_root_shape_decodes_snapshot() {
        let shape = SchemaDefinition::from_toml(MONITOR).unwrap().root_shape().unwrap();
        let node = snapshot::decode(&serde_json::json!({"name": "m", "tags": ["a"]}), &shape).unwrap();
        assert!(matches!(node, Node::Object(_)));
    }

    #[test]
    fn test_compile_other_object() {
        let definition = SchemaDefinition::from_toml(MONITOR).unwrap();
        let host = definition.compile_object("host").unwrap();
        assert_eq!(host.name, "host");
        assert!(definition.compile_object("nope").is_err());
    }
}
