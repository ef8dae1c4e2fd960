//! Element correlation for unordered collections

use crate::key::KeyPolicy;
use crate::node::Node;
use std::collections::HashMap;

/// Per-element matches of a proposed collection against a prior one
#[derive(Debug)]
pub struct Correlation<'a> {
    /// Identity key of each proposed element, when one could be derived
    pub keys: Vec<Option<String>>,
    /// Matched prior element for each proposed element, by position
    pub matches: Vec<Option<&'a Node>>,
}

impl<'a> Correlation<'a> {
    /// Matched prior element for the proposed element at `index`
    pub fn get(&self, index: usize) -> Option<&'a Node> {
        self.matches.get(index).copied().flatten()
    }

    pub fn matched(&self) -> usize {
        self.matches.iter().filter(|m| m.is_some()).count()
    }

    pub fn unmatched(&self) -> usize {
        self.matches.len() - self.matched()
    }
}

/// Index elements by identity key
///
/// A key occurring more than once keeps its last element.
pub fn index_by_key<'a>(elements: &'a [Node], policy: &KeyPolicy) -> HashMap<String, &'a Node> {
    let mut index = HashMap::with_capacity(elements.len());
    for element in elements {
        if let Some(key) = policy.extract(element)
            && index.insert(key.clone(), element).is_some()
        {
            log::debug!("Duplicate identity key '{key}', keeping the later element");
        }
    }
    index
}

/// Match each proposed element to the prior element with the same identity key
pub fn correlate<'a>(proposed: &[Node], prior: &'a [Node], policy: &KeyPolicy) -> Correlation<'a> {
    if proposed.is_empty() {
        return Correlation {
            keys: Vec::new(),
            matches: Vec::new(),
        };
    }

    let by_key = index_by_key(prior, policy);
    let mut keys = Vec::with_capacity(proposed.len());
    let mut matches = Vec::with_capacity(proposed.len());

    for element in proposed {
        let key = policy.extract(element);
        let matched = key.as_ref().and_then(|k| by_key.get(k).copied());
        log::trace!(
            "Correlating {} -> {}",
            key.as_deref().unwrap_or("<no key>"),
            if matched.is_some() { "matched" } else { "new" }
        );
        keys.push(key);
        matches.push(matched);
    }

    Correlation { keys, matches }
}
