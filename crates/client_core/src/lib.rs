//! Client-side core of the access console: staged assignment edits, debounced
//! impact simulation and committed changes.

use async_trait::async_trait;
use shared::{
    domain::SubjectRef,
    protocol::{CommitMetadata, DiffPayload, TargetRef},
};

pub mod debounce;
pub mod diff_store;
pub mod error;
pub mod reconcile;
pub mod transport;
pub mod types;
pub mod wizard;
pub mod workflow;

pub use debounce::{DebounceTicket, Debouncer};
pub use diff_store::DiffStore;
pub use error::{
    CommitError, RemoteFailure, SessionStartError, SimulationError, StepSaveError,
    ValidationError, WizardError, WorkflowError,
};
pub use reconcile::{ImpactView, ItemTag, ReconciliationItem, ReconciliationRenderer, ReconciliationView};
pub use transport::{ClientConfig, HttpSimulationClient};
pub use types::{
    Catalog, CommitResult, Diff, ImpactEntry, ImpactKind, ImpactReport, SessionContext,
    WorkflowOptions,
};
pub use wizard::{MultiStepWizardController, StepSummary, WizardStep, WizardSummary};
pub use workflow::{Notice, NoticeKind, WorkflowController, WorkflowState, WorkflowUpdate};

/// The remote side of a staged edit: session allocation, impact simulation and
/// commit. Implementations validate server payloads into domain types.
#[async_trait]
pub trait SimulationClient: Send + Sync {
    async fn start_session(&self, subject: &SubjectRef) -> Result<SessionContext, SessionStartError>;

    async fn simulate(
        &self,
        context: &SessionContext,
        diff: &DiffPayload,
    ) -> Result<ImpactReport, SimulationError>;

    /// All-or-nothing; on success the server closes the session.
    async fn commit(
        &self,
        context: &SessionContext,
        diff: &DiffPayload,
        metadata: &CommitMetadata,
    ) -> Result<CommitResult, CommitError>;

    /// Persists one wizard step's selection server-side.
    async fn save_step(
        &self,
        context: &SessionContext,
        step: &str,
        selected: &[TargetRef],
    ) -> Result<(), StepSaveError>;
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
