//! Field paths used to name locations inside a tree

use std::fmt;

/// One step from a node to one of its children
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// Named field of an object
    Field(String),
    /// Position inside a collection
    Index(usize),
}

/// Location of a node relative to the root of a snapshot
///
/// Rendered as `window.start` or `tags[1].id`. The empty path renders as `<root>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    steps: Vec<PathStep>,
}

impl FieldPath {
    /// The root path
    pub fn root() -> Self {
        Self::default()
    }

    /// Path extended by a field name
    pub fn field(&self, name: &str) -> Self {
        let mut steps = self.steps.clone();
        steps.push(PathStep::Field(name.to_string()));
        Self { steps }
    }

    /// Path extended by a collection index
    pub fn index(&self, index: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(PathStep::Index(index));
        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Name of the last field step, if any
    pub fn last_field(&self) -> Option<&str> {
        self.steps.iter().rev().find_map(|s| match s {
            PathStep::Field(name) => Some(name.as_str()),
            PathStep::Index(_) => None,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "<root>");
        }
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                PathStep::Field(name) if i == 0 => write!(f, "{name}")?,
                PathStep::Field(name) => write!(f, ".{name}")?,
                PathStep::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(FieldPath::root().to_string(), "<root>");

        let path = FieldPath::root().field("tags").index(1).field("id");
        assert_eq!(path.to_string(), "tags[1].id");
        assert_eq!(path.last_field(), Some("id"));
    }

    #[test]
    fn test_extending_does_not_mutate_parent() {
        let parent = FieldPath::root().field("window");
        let child = parent.field("start");
        assert_eq!(parent.to_string(), "window");
        assert_eq!(child.to_string(), "window.start");
    }
}
