//! Guard conditions that short-circuit reconciliation at a node
//!
//! When a guard fires the proposed node is used unchanged. Guards keep the
//! engine conservative: without a declared intent, a prior state, or an
//! unambiguous one-to-one pairing there is nothing safe to copy forward.

use crate::node::Node;
use std::fmt;

/// Why reconciliation of a node was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// Config at this node is null or unknown
    NoDeclaredIntent,
    /// Prior at this node is absent, null or unknown
    FirstCreation,
    /// Proposed at this node is null or unknown
    NothingProposed,
    /// Proposed and prior collections differ in size
    CardinalityMismatch { proposed: usize, prior: usize },
    /// Proposed and prior collections are both empty
    BothEmpty,
}

impl Guard {
    /// Whether this guard deserves a warning rather than a debug line
    pub fn is_notable(&self) -> bool {
        matches!(self, Self::CardinalityMismatch { .. })
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDeclaredIntent => write!(f, "no declared configuration"),
            Self::FirstCreation => write!(f, "no prior state (first creation)"),
            Self::NothingProposed => write!(f, "proposal is null or unknown"),
            Self::CardinalityMismatch { proposed, prior } => write!(
                f,
                "collection size changed ({prior} -> {proposed}), correlation skipped"
            ),
            Self::BothEmpty => write!(f, "collection is empty"),
        }
    }
}

/// Guards shared by objects and collections
pub fn check_node(config: Option<&Node>, prior: Option<&Node>, proposed: &Node) -> Option<Guard> {
    if !proposed.is_known() {
        return Some(Guard::NothingProposed);
    }
    if !config.is_some_and(Node::is_known) {
        return Some(Guard::NoDeclaredIntent);
    }
    if !prior.is_some_and(Node::is_known) {
        return Some(Guard::FirstCreation);
    }
    None
}

/// Guards for an unordered collection: the shared ones plus size checks
pub fn check_collection(
    config: Option<&Node>,
    prior: Option<&Node>,
    proposed: &Node,
) -> Option<Guard> {
    if let Some(guard) = check_node(config, prior, proposed) {
        return Some(guard);
    }

    let proposed_len = proposed.known_elements().map_or(0, <[Node]>::len);
    let prior_len = prior
        .and_then(Node::known_elements)
        .map_or(0, <[Node]>::len);

    if proposed_len == 0 && prior_len == 0 {
        return Some(Guard::BothEmpty);
    }
    if proposed_len != prior_len {
        return Some(Guard::CardinalityMismatch {
            proposed: proposed_len,
            prior: prior_len,
        });
    }
    None
}
