//! Baseline vs. working selection for one edit session.

use indexmap::IndexSet;
use shared::domain::AssignmentId;

use crate::types::Diff;

/// Holds the server-known baseline and the user's current selection.
///
/// Both sets keep insertion order; `observed` remembers every id in the order
/// it was first seen so renders stay stable while items are toggled.
#[derive(Debug, Clone, Default)]
pub struct DiffStore {
    baseline: IndexSet<AssignmentId>,
    working: IndexSet<AssignmentId>,
    observed: IndexSet<AssignmentId>,
    revision: u64,
}

impl DiffStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new session; any earlier working state is dropped.
    pub fn initialize(&mut self, baseline: impl IntoIterator<Item = AssignmentId>) {
        self.baseline = baseline.into_iter().collect();
        self.working = self.baseline.clone();
        self.observed = self.baseline.clone();
        self.revision += 1;
    }

    /// Flips membership of `id` in the working selection.
    pub fn toggle(&mut self, id: &AssignmentId) {
        if !self.working.shift_remove(id) {
            self.working.insert(id.clone());
            self.observed.insert(id.clone());
        }
        self.revision += 1;
    }

    pub fn diff(&self) -> Diff {
        Diff {
            added: self.working.difference(&self.baseline).cloned().collect(),
            removed: self.baseline.difference(&self.working).cloned().collect(),
        }
    }

    pub fn unchanged(&self) -> IndexSet<AssignmentId> {
        self.baseline.intersection(&self.working).cloned().collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.working.len() != self.baseline.len()
            || self.working.iter().any(|id| !self.baseline.contains(id))
    }

    /// Drops every local edit.
    pub fn revert(&mut self) {
        self.working = self.baseline.clone();
        self.revision += 1;
    }

    /// Makes the selection the server accepted the new baseline. Edits made
    /// after it was sent stay in `working` and show up as a fresh diff.
    pub fn promote(&mut self, committed: IndexSet<AssignmentId>) {
        self.observed.extend(committed.iter().cloned());
        self.baseline = committed;
        self.revision += 1;
    }

    pub fn baseline(&self) -> &IndexSet<AssignmentId> {
        &self.baseline
    }

    pub fn working(&self) -> &IndexSet<AssignmentId> {
        &self.working
    }

    pub fn observed(&self) -> &IndexSet<AssignmentId> {
        &self.observed
    }

    pub fn is_selected(&self, id: &AssignmentId) -> bool {
        self.working.contains(id)
    }

    /// Bumped on every mutation; used to tell whether a result is still current.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
#[path = "tests/diff_store_tests.rs"]
mod tests;
