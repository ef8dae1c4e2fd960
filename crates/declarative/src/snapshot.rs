//! JSON snapshot codec
//!
//! Snapshots are plain JSON documents decoded against a schema:
//!
//! - `null` is a null node of whatever shape the schema expects
//! - `{"$unknown": true}` is an unknown node
//! - objects list fields by name; missing fields decode as null and
//!   fields the schema does not declare are rejected
//! - collections are arrays, whether the schema calls them sets or lists

use crate::error::{Error, Result};
use crate::node::Node;
use crate::path::FieldPath;
use crate::reconcile::Request;
use crate::schema::Shape;
use crate::value::{Scalar, ScalarKind, Value};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Marker key for values resolved only after apply
pub const UNKNOWN_MARKER: &str = "$unknown";

/// On-disk form of one reconciliation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestFile {
    pub config: Json,
    /// Absent or null when the resource is being created
    #[serde(default)]
    pub prior: Option<Json>,
    pub proposed: Json,
}

impl RequestFile {
    /// Decode all three snapshots against `shape`
    pub fn decode(&self, label: impl Into<String>, shape: &Shape) -> Result<Request> {
        let prior = match &self.prior {
            None | Some(Json::Null) => None,
            Some(json) => Some(decode(json, shape).map_err(|e| within("prior", e))?),
        };
        Ok(Request {
            label: label.into(),
            config: decode(&self.config, shape).map_err(|e| within("config", e))?,
            prior,
            proposed: decode(&self.proposed, shape).map_err(|e| within("proposed", e))?,
        })
    }
}

fn within(document: &str, err: Error) -> Error {
    match err {
        Error::Snapshot { path, message } => Error::Snapshot {
            path,
            message: format!("{message} (in {document})"),
        },
        other => other,
    }
}

/// Decode a JSON document into a tree of the given shape
pub fn decode(json: &Json, shape: &Shape) -> Result<Node> {
    decode_at(json, shape, &FieldPath::root())
}

fn decode_at(json: &Json, shape: &Shape, path: &FieldPath) -> Result<Node> {
    if json.is_null() {
        return Ok(Node::null(shape));
    }
    if is_unknown_marker(json) {
        return Ok(Node::unknown(shape));
    }

    match shape {
        Shape::Scalar(kind) => decode_scalar(json, *kind, path),
        Shape::Object(schema) => {
            let Json::Object(map) = json else {
                return Err(Error::snapshot(path, format!("expected object<{}>", schema.name)));
            };
            if let Some(extra) = map.keys().find(|k| schema.index_of(k).is_none()) {
                return Err(Error::snapshot(
                    path,
                    format!("field '{extra}' is not declared by '{}'", schema.name),
                ));
            }
            let fields = schema
                .fields()
                .iter()
                .map(|field| match map.get(&field.name) {
                    Some(value) => decode_at(value, &field.shape, &path.field(&field.name)),
                    None => Ok(Node::null(&field.shape)),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Node::object(schema, fields))
        }
        Shape::Collection(schema) => {
            let Json::Array(items) = json else {
                return Err(Error::snapshot(path, "expected an array"));
            };
            let elements = items
                .iter()
                .enumerate()
                .map(|(i, item)| decode_at(item, &schema.element, &path.index(i)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Node::collection(schema, elements))
        }
    }
}

fn decode_scalar(json: &Json, kind: ScalarKind, path: &FieldPath) -> Result<Node> {
    let scalar = match (kind, json) {
        (ScalarKind::String, Json::String(s)) => Scalar::String(s.clone()),
        (ScalarKind::Bool, Json::Bool(b)) => Scalar::Bool(*b),
        (ScalarKind::Number, Json::Number(n)) => match n.as_f64() {
            Some(n) => Scalar::Number(n),
            None => return Err(Error::snapshot(path, format!("number {n} is out of range"))),
        },
        _ => {
            return Err(Error::snapshot(
                path,
                format!("expected {kind}, found {}", json_type(json)),
            ));
        }
    };
    Ok(Node::scalar(kind, Value::Known(scalar)))
}

fn is_unknown_marker(json: &Json) -> bool {
    matches!(json, Json::Object(map)
        if map.len() == 1 && map.get(UNKNOWN_MARKER) == Some(&Json::Bool(true)))
}

fn json_type(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Encode a tree back to JSON
///
/// Null fields of objects are written out explicitly so the output keeps
/// the full schema shape.
pub fn encode(node: &Node) -> Json {
    match node.tag() {
        Value::Null => return Json::Null,
        Value::Unknown => return unknown_marker(),
        Value::Known(()) => {}
    }

    match node {
        Node::Scalar(scalar) => match &scalar.value {
            Value::Known(Scalar::String(s)) => Json::String(s.clone()),
            Value::Known(Scalar::Bool(b)) => Json::Bool(*b),
            Value::Known(Scalar::Number(n)) => Json::from(*n),
            Value::Null => Json::Null,
            Value::Unknown => unknown_marker(),
        },
        Node::Object(object) => {
            let fields = node.known_fields().unwrap_or_default();
            let map: Map<String, Json> = object
                .schema
                .fields()
                .iter()
                .zip(fields)
                .map(|(field, node)| (field.name.clone(), encode(node)))
                .collect();
            Json::Object(map)
        }
        Node::Collection(_) => Json::Array(
            node.known_elements()
                .unwrap_or_default()
                .iter()
                .map(encode)
                .collect(),
        ),
    }
}

fn unknown_marker() -> Json {
    let mut map = Map::new();
    map.insert(UNKNOWN_MARKER.to_string(), Json::Bool(true));
    Json::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyPolicy;
    use crate::node::{object_from, string};
    use crate::schema::{FieldSchema, ObjectSchema};
    use serde_json::json;
    use std::sync::Arc;

    fn host() -> Arc<ObjectSchema> {
        ObjectSchema::builder("host")
            .field(FieldSchema::user("name", Shape::string()))
            .field(FieldSchema::server("id", Shape::string()))
            .field(FieldSchema::user("port", Shape::number()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_decode_object_with_markers() {
        let schema = host();
        let node = decode(
            &json!({"name": "h1", "id": {"$unknown": true}}),
            &Shape::object(&schema),
        )
        .unwrap();

        let fields = node.known_fields().unwrap();
        assert_eq!(fields[0], string("h1"));
        assert!(fields[1].is_unknown());
        assert!(fields[2].is_null());
    }

    #[test]
    fn test_decode_rejects_undeclared_field() {
        let schema = host();
        let err = decode(&json!({"name": "h1", "ip": "10.0.0.1"}), &Shape::object(&schema)).unwrap_err();
        assert!(err.to_string().contains("'ip'"));
    }

    #[test]
    fn test_decode_type_error_names_path() {
        let schema = host();
        let policy = KeyPolicy::parse(&["{name}"], &schema).unwrap();
        let shape = Shape::set(Shape::object(&schema), policy);

        let err = decode(&json!([{"name": "h1"}, {"name": 7}]), &shape).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot decode snapshot at [1].name: expected string, found number"
        );
    }

    #[test]
    fn test_encode_keeps_full_shape() {
        let schema = host();
        let node = object_from(
            &schema,
            vec![("name", string("h1")), ("id", Node::unknown(&Shape::string()))],
        )
        .unwrap();
        assert_eq!(
            encode(&node),
            json!({"name": "h1", "id": {"$unknown": true}, "port": null})
        );
    }

    #[test]
    fn test_request_without_prior() {
        let schema = host();
        let file: RequestFile = serde_json::from_value(json!({
            "config": {"name": "h1"},
            "proposed": {"name": "h1", "id": {"$unknown": true}}
        }))
        .unwrap();

        let request = file.decode("h1", &Shape::object(&schema)).unwrap();
        assert!(request.prior.is_none());
        assert_eq!(request.label, "h1");
    }

    #[test]
    fn test_request_error_names_document() {
        let schema = host();
        let file: RequestFile = serde_json::from_value(json!({
            "config": {"name": 1},
            "prior": null,
            "proposed": {}
        }))
        .unwrap();
        let err = file.decode("x", &Shape::object(&schema)).unwrap_err();
        assert!(err.to_string().ends_with("(in config)"));
    }
}
