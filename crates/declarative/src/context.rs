//! Observer traits for reconciliation passes
//!
//! These traits let callers watch what the engine decided without depending
//! on a particular logging or UI layer.

use crate::consistency::Violation;
use crate::guard::Guard;
use crate::path::FieldPath;

/// Receives decisions made during one reconciliation pass
pub trait ReconcileObserver {
    /// A guard short-circuited the node at `path`
    fn on_guard(&mut self, path: &FieldPath, guard: &Guard);

    /// A set at `path` was correlated against prior state
    fn on_correlate(&mut self, path: &FieldPath, matched: usize, total: usize);

    /// A server-owned field at `path` was copied forward from prior state
    fn on_preserved(&mut self, path: &FieldPath);

    /// A first-creation default replaced a null config at `path`
    fn on_default(&mut self, path: &FieldPath);

    /// A field rule marked the object at `path` as changed
    fn on_forced_change(&mut self, path: &FieldPath);
}

/// Receives cross-field consistency failures
pub trait ViolationReporter {
    fn report(&mut self, path: &FieldPath, message: &str);
}

/// No-op observer
pub struct NoObserver;

impl ReconcileObserver for NoObserver {
    fn on_guard(&mut self, _path: &FieldPath, _guard: &Guard) {}
    fn on_correlate(&mut self, _path: &FieldPath, _matched: usize, _total: usize) {}
    fn on_preserved(&mut self, _path: &FieldPath) {}
    fn on_default(&mut self, _path: &FieldPath) {}
    fn on_forced_change(&mut self, _path: &FieldPath) {}
}

/// Observer that records everything it sees
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Guards that fired, with their location
    pub guards: Vec<(FieldPath, Guard)>,
    /// Elements matched to a prior element
    pub matched: usize,
    /// Elements with no prior counterpart
    pub unmatched: usize,
    /// Server-owned fields copied from prior state
    pub preserved: Vec<FieldPath>,
    /// Null configs replaced by first-creation defaults
    pub defaults: Vec<FieldPath>,
    /// Objects a field rule marked as changed
    pub forced: Vec<FieldPath>,
}

impl ReconcileReport {
    /// Collections that fell back to the proposal because their size changed
    pub fn cardinality_fallbacks(&self) -> impl Iterator<Item = &(FieldPath, Guard)> {
        self.guards.iter().filter(|(_, g)| g.is_notable())
    }

    /// Whether reconciliation changed anything relative to the proposal
    pub fn touched_proposal(&self) -> bool {
        !self.preserved.is_empty() || !self.defaults.is_empty() || !self.forced.is_empty()
    }

    /// Merge another report into this one
    pub fn merge(&mut self, other: &ReconcileReport) {
        self.guards.extend(other.guards.iter().cloned());
        self.matched += other.matched;
        self.unmatched += other.unmatched;
        self.preserved.extend(other.preserved.iter().cloned());
        self.defaults.extend(other.defaults.iter().cloned());
        self.forced.extend(other.forced.iter().cloned());
    }
}

impl ReconcileObserver for ReconcileReport {
    fn on_guard(&mut self, path: &FieldPath, guard: &Guard) {
        self.guards.push((path.clone(), guard.clone()));
    }

    fn on_correlate(&mut self, _path: &FieldPath, matched: usize, total: usize) {
        self.matched += matched;
        self.unmatched += total - matched;
    }

    fn on_preserved(&mut self, path: &FieldPath) {
        self.preserved.push(path.clone());
    }

    fn on_default(&mut self, path: &FieldPath) {
        self.defaults.push(path.clone());
    }

    fn on_forced_change(&mut self, path: &FieldPath) {
        self.forced.push(path.clone());
    }
}

impl ViolationReporter for Vec<Violation> {
    fn report(&mut self, path: &FieldPath, message: &str) {
        self.push(Violation {
            path: path.clone(),
            message: message.to_string(),
        });
    }
}
