use std::time::Duration;

use shared::domain::AssignmentId;
use thiserror::Error;

/// Why a remote call did not produce a usable answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteFailure {
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx answer; `message` is the server's text, shown as-is.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
}

impl RemoteFailure {
    /// Text for the user-facing notice. Server messages pass through verbatim.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl From<reqwest::Error> for RemoteFailure {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Malformed(value.to_string())
        } else {
            Self::Network(value.to_string())
        }
    }
}

macro_rules! remote_error {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Error)]
        #[error(transparent)]
        pub struct $name(#[from] pub RemoteFailure);

        impl $name {
            pub fn failure(&self) -> &RemoteFailure {
                &self.0
            }

            pub fn user_message(&self) -> String {
                self.0.user_message()
            }
        }
    };
}

remote_error!(SessionStartError);
remote_error!(SimulationError);
remote_error!(CommitError);
remote_error!(StepSaveError);

/// Local checks that block a transition before anything reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("select at least {minimum} item(s) in '{step}'")]
    NothingSelected { step: String, minimum: usize },
    #[error("assignment {0} is not offered for this subject")]
    UnknownAssignment(AssignmentId),
    #[error("assignment {id} does not belong to step '{step}'")]
    NotInStep { id: AssignmentId, step: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("no subject selected")]
    NoSubject,
    #[error("not in edit mode")]
    NotEditing,
    #[error("already editing")]
    AlreadyEditing,
    #[error("an edit session is already being started")]
    StartInProgress,
    #[error("a commit is already in flight")]
    CommitInProgress,
    #[error("the edit session has been closed")]
    SessionClosed,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("a wizard needs at least one selection step before review")]
    TooFewSteps,
    #[error("commit is only available on the final step")]
    NotAtFinalStep,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    StepSave(#[from] StepSaveError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}
