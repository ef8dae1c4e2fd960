//! Reading schema definitions and request files from disk

use anyhow::{Context, Result};
use declarative::{Request, RequestFile, SchemaDefinition, Shape};
use std::fs;
use std::path::Path;

/// Parse a TOML schema definition
pub fn load_definition(path: &Path) -> Result<SchemaDefinition> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read schema definition: {}", path.display()))?;
    SchemaDefinition::from_toml(&content)
        .with_context(|| format!("Invalid schema definition in {}", path.display()))
}

/// Compile the shape requests are decoded against
///
/// `root` picks another defined object type as the root.
pub fn load_shape(path: &Path, root: Option<&str>) -> Result<Shape> {
    let definition = load_definition(path)?;
    let schema = match root {
        Some(name) => definition.compile_object(name),
        None => definition.compile(),
    }
    .with_context(|| format!("Could not compile schema from {}", path.display()))?;
    log::debug!("Compiled root '{}' ({} fields)", schema.name, schema.len());
    Ok(Shape::object(&schema))
}

/// Read a request file and decode its three snapshots
pub fn load_request(path: &Path, shape: &Shape) -> Result<Request> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read request: {}", path.display()))?;
    let file: RequestFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    file.decode(label, shape)
        .with_context(|| format!("Request {} does not match the schema", path.display()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    pub(crate) const MONITOR: &str = r#"
root = "monitor"

[objects.host]
fields = [
    { name = "type", type = "string" },
    { name = "name", type = "string" },
    { name = "id", type = "string", owner = "server" },
]

[objects.monitor]
fields = [
    { name = "name", type = "string" },
    { name = "id", type = "string", owner = "server" },
    { name = "hosts", type = "set", object = "host", key = ["{type}:name:{name}"], default_empty = true },
]
"#;

    pub(crate) const REQUEST: &str = r#"{
  "config": {"name": "web", "hosts": [{"type": "host", "name": "a"}, {"type": "host", "name": "b"}]},
  "prior": {"name": "web", "id": "m-1", "hosts": [
    {"type": "host", "name": "b", "id": "h-2"},
    {"type": "host", "name": "a", "id": "h-1"}
  ]},
  "proposed": {"name": "web", "id": {"$unknown": true}, "hosts": [
    {"type": "host", "name": "a", "id": {"$unknown": true}},
    {"type": "host", "name": "b", "id": {"$unknown": true}}
  ]}
}"#;

    /// Write the monitor schema and one request into a temp dir
    pub(crate) fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let schema = dir.path().join("monitor.toml");
        let request = dir.path().join("web.json");
        fs::write(&schema, MONITOR).unwrap();
        fs::write(&request, REQUEST).unwrap();
        (dir, schema, request)
    }

    #[test]
    fn test_load_request() {
        let (_dir, schema, request) = fixture();
        let shape = load_shape(&schema, None).unwrap();
        let request = load_request(&request, &shape).unwrap();
        assert_eq!(request.label, "web.json");
        assert!(request.prior.is_some());
    }

    #[test]
    fn test_root_override() {
        let (_dir, schema, _) = fixture();
        let shape = load_shape(&schema, Some("host")).unwrap();
        assert_eq!(shape.to_string(), "object<host>");
    }

    #[test]
    fn test_missing_schema_names_file() {
        let err = load_shape(Path::new("/nonexistent/replan.toml"), None).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/replan.toml"));
    }

    #[test]
    fn test_request_against_wrong_schema() {
        let (dir, schema, _) = fixture();
        let shape = load_shape(&schema, None).unwrap();
        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#"{"config": {"name": 1}, "proposed": {"name": "x"}}"#).unwrap();

        let err = load_request(&bad, &shape).unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("bad.json"));
        assert!(chain.contains("expected string"));
    }
}
