use serde::{Deserialize, Serialize};

use crate::domain::{
    AssignmentId, CommitId, SessionContextId, SubjectId, SubjectType, TargetType,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub subject_id: SubjectId,
    pub subject_type: SubjectType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_context_id: SessionContextId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub target_id: AssignmentId,
    pub target_type: TargetType,
}

/// Added/removed targets as sent to both simulate and commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPayload {
    pub added: Vec<TargetRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<TargetRef>,
}

impl DiffPayload {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateRequest {
    pub session_context_id: SessionContextId,
    #[serde(flatten)]
    pub diff: DiffPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactType {
    PermissionGained,
    PermissionLost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactDetail {
    pub impact_type: ImpactType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    pub summary: String,
    #[serde(default)]
    pub impact_details: Vec<ImpactDetail>,
}

/// Extra fields some commit variants attach (e.g. naming a new policy).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub session_context_id: SessionContextId,
    #[serde(flatten)]
    pub diff: DiffPayload,
    #[serde(flatten)]
    pub metadata: CommitMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitResponse {
    #[serde(default)]
    pub id: Option<CommitId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSaveRequest {
    pub session_context_id: SessionContextId,
    pub step: String,
    pub selected: Vec<TargetRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub target_id: AssignmentId,
    pub target_type: TargetType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Candidate {
    pub fn target_ref(&self) -> TargetRef {
        TargetRef {
            target_id: self.target_id.clone(),
            target_type: self.target_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePermission {
    pub permission_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_via: Option<String>,
}

/// Read-only view of a subject fetched before edit mode starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSnapshot {
    /// Assignments the server currently holds for the subject.
    #[serde(default)]
    pub assignments: Vec<Candidate>,
    /// Further items the subject could be assigned.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub effective_permissions: Vec<EffectivePermission>,
}
