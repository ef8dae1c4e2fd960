//! Identity keys for set elements
//!
//! A [`KeyPolicy`] is an ordered list of candidates. Each candidate is a
//! template such as `{type}:id:{id}`: placeholders name fields of the element,
//! everything else is literal. The first candidate whose fields are all known
//! produces the element's key.

use crate::error::{Error, Result};
use crate::node::Node;
use crate::schema::ObjectSchema;
use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"));

/// Piece of a key candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    /// Value of the field at this schema position
    Field { index: usize, name: String },
    /// Fixed text
    Literal(String),
}

/// One way of deriving a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCandidate {
    parts: Vec<KeyPart>,
}

impl KeyCandidate {
    /// Compile a template against the element schema
    pub fn parse(template: &str, element: &ObjectSchema) -> Result<Self> {
        let mut parts = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                parts.push(KeyPart::Literal(template[last..whole.start()].to_string()));
            }
            let index = element.index_of(name.as_str()).ok_or_else(|| {
                Error::schema(
                    &element.name,
                    format!("key template '{template}' references unknown field '{}'", name.as_str()),
                )
            })?;
            parts.push(KeyPart::Field {
                index,
                name: name.as_str().to_string(),
            });
            last = whole.end();
        }
        if last < template.len() {
            parts.push(KeyPart::Literal(template[last..].to_string()));
        }

        let literal_text = parts.iter().any(|p| match p {
            KeyPart::Literal(text) => text.contains('{') || text.contains('}'),
            KeyPart::Field { .. } => false,
        });
        if literal_text {
            return Err(Error::schema(
                &element.name,
                format!("malformed key template '{template}'"),
            ));
        }
        if !parts.iter().any(|p| matches!(p, KeyPart::Field { .. })) {
            return Err(Error::schema(
                &element.name,
                format!("key template '{template}' references no field"),
            ));
        }

        Ok(Self { parts })
    }

    /// Candidate joining the named fields with `:`
    pub fn fields(names: &[&str], element: &ObjectSchema) -> Result<Self> {
        let template = names
            .iter()
            .map(|n| format!("{{{n}}}"))
            .collect::<Vec<_>>()
            .join(":");
        Self::parse(&template, element)
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    /// Key for an element's fields, if every referenced field is known
    fn render(&self, fields: &[Node]) -> Option<String> {
        let mut key = String::new();
        for part in &self.parts {
            match part {
                KeyPart::Literal(text) => key.push_str(text),
                KeyPart::Field { index, .. } => {
                    let scalar = fields.get(*index)?.value()?.known()?;
                    key.push_str(&scalar.to_string());
                }
            }
        }
        Some(key)
    }
}

impl std::fmt::Display for KeyCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for part in &self.parts {
            match part {
                KeyPart::Literal(text) => f.write_str(text)?,
                KeyPart::Field { name, .. } => write!(f, "{{{name}}}")?,
            }
        }
        Ok(())
    }
}

/// Ordered candidate list for a set field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPolicy {
    candidates: Vec<KeyCandidate>,
}

impl KeyPolicy {
    pub fn new(candidates: Vec<KeyCandidate>) -> Self {
        Self { candidates }
    }

    /// Compile every template against the element schema
    pub fn parse<S: AsRef<str>>(templates: &[S], element: &ObjectSchema) -> Result<Self> {
        let candidates = templates
            .iter()
            .map(|t| KeyCandidate::parse(t.as_ref(), element))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { candidates })
    }

    pub fn candidates(&self) -> &[KeyCandidate] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Derive the identity key of a set element
    ///
    /// Returns `None` when the element is not a known object, when no candidate
    /// has all of its fields known, or when the first usable candidate renders
    /// to an empty string. Such elements never match anything.
    pub fn extract(&self, element: &Node) -> Option<String> {
        let fields = element.known_fields()?;
        self.candidates
            .iter()
            .find_map(|c| c.render(fields))
            .filter(|key| !key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, object_from, string};
    use crate::schema::{FieldSchema, Shape};
    use std::sync::Arc;

    fn host() -> Arc<ObjectSchema> {
        ObjectSchema::builder("host")
            .field(FieldSchema::user("type", Shape::string()))
            .field(FieldSchema::user("name", Shape::string()))
            .field(FieldSchema::server("id", Shape::string()))
            .build()
            .unwrap()
    }

    fn id_then_name(schema: &ObjectSchema) -> KeyPolicy {
        KeyPolicy::parse(&["{type}:id:{id}", "{type}:name:{name}"], schema).unwrap()
    }

    #[test]
    fn test_prefers_first_usable_candidate() {
        let schema = host();
        let policy = id_then_name(&schema);
        let element = object_from(
            &schema,
            vec![("type", string("host")), ("name", string("h1")), ("id", string("123"))],
        )
        .unwrap();
        assert_eq!(policy.extract(&element).as_deref(), Some("host:id:123"));
    }

    #[test]
    fn test_falls_back_when_field_unknown() {
        let schema = host();
        let policy = id_then_name(&schema);
        let element = object_from(
            &schema,
            vec![
                ("type", string("host")),
                ("name", string("h1")),
                ("id", Node::unknown(&Shape::string())),
            ],
        )
        .unwrap();
        assert_eq!(policy.extract(&element).as_deref(), Some("host:name:h1"));
    }

    #[test]
    fn test_no_usable_candidate() {
        let schema = host();
        let policy = id_then_name(&schema);
        let element = object_from(&schema, vec![("name", string("h1"))]).unwrap();
        assert_eq!(policy.extract(&element), None);
        assert_eq!(policy.extract(&Node::null(&Shape::object(&schema))), None);
    }

    #[test]
    fn test_empty_key_is_unusable() {
        let schema = host();
        let policy = KeyPolicy::parse(&["{name}"], &schema).unwrap();
        let element = object_from(&schema, vec![("name", string(""))]).unwrap();
        assert_eq!(policy.extract(&element), None);
    }

    #[test]
    fn test_fields_candidate_joins_with_colon() {
        let schema = host();
        let candidate = KeyCandidate::fields(&["type", "name"], &schema).unwrap();
        assert_eq!(candidate.to_string(), "{type}:{name}");
    }

    #[test]
    fn test_parse_errors() {
        let schema = host();
        assert!(KeyCandidate::parse("{missing}", &schema).is_err());
        assert!(KeyCandidate::parse("literal-only", &schema).is_err());
        assert!(KeyCandidate::parse("{type", &schema).is_err());
    }
}
