use std::time::Duration;

use indexmap::{IndexMap, IndexSet};
use shared::{
    domain::{AssignmentId, CommitId, SessionContextId, SubjectRef},
    protocol::{Candidate, DiffPayload, TargetRef},
};

use crate::error::ValidationError;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(350);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Quiet period after the last edit before a simulate call is issued.
    pub debounce: Duration,
    /// Upper bound on any single remote call.
    pub request_timeout: Duration,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Server-side handle for one staged edit of one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub id: SessionContextId,
    pub subject: SubjectRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactKind {
    Gained,
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactEntry {
    pub kind: ImpactKind,
    pub label: String,
    pub reason: Option<String>,
}

/// Result of a hypothetical application of a diff. Each report replaces the
/// previous one wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactReport {
    pub summary: String,
    pub entries: Vec<ImpactEntry>,
}

impl ImpactReport {
    pub fn gained(&self) -> impl Iterator<Item = &ImpactEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == ImpactKind::Gained)
    }

    pub fn lost(&self) -> impl Iterator<Item = &ImpactEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == ImpactKind::Lost)
    }

    pub fn is_no_change(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    /// Absent when the server answered with an empty body.
    pub id: Option<CommitId>,
}

/// Added/removed split of the working selection against the baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub added: IndexSet<AssignmentId>,
    pub removed: IndexSet<AssignmentId>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Every item offered to the user for one subject, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: IndexMap<AssignmentId, Candidate>,
}

impl Catalog {
    pub fn new(items: impl IntoIterator<Item = Candidate>) -> Self {
        let mut entries = IndexMap::new();
        for item in items {
            entries.entry(item.target_id.clone()).or_insert(item);
        }
        Self { entries }
    }

    pub fn get(&self, id: &AssignmentId) -> Option<&Candidate> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &AssignmentId) -> bool {
        self.entries.contains_key(id)
    }

    /// Looks up an id by the text it displays as. Typed input cannot tell a
    /// numeric id from a numeric-looking string one, so both match.
    pub fn find(&self, raw: &str) -> Option<&AssignmentId> {
        let raw = raw.trim();
        self.entries.keys().find(|id| id.to_string() == raw)
    }

    pub fn label(&self, id: &AssignmentId) -> String {
        self.entries
            .get(id)
            .map(|candidate| candidate.label.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn target_refs<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a AssignmentId>,
    ) -> Result<Vec<TargetRef>, ValidationError> {
        ids.into_iter()
            .map(|id| {
                self.entries
                    .get(id)
                    .map(Candidate::target_ref)
                    .ok_or_else(|| ValidationError::UnknownAssignment(id.clone()))
            })
            .collect()
    }

    /// Wire form of a diff; every id must be known to the catalog.
    pub fn payload(&self, diff: &Diff) -> Result<DiffPayload, ValidationError> {
        Ok(DiffPayload {
            added: self.target_refs(&diff.added)?,
            removed: self.target_refs(&diff.removed)?,
        })
    }
}
