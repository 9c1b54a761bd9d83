//! Scripted [`SimulationClient`] whose calls park until the test answers them.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shared::{
    domain::{AssignmentId, SessionContextId, SubjectRef, SubjectType, TargetType},
    protocol::{AssignmentSnapshot, Candidate, CommitMetadata, DiffPayload, TargetRef},
};
use tokio::sync::oneshot;

use crate::{
    error::{CommitError, RemoteFailure, SessionStartError, SimulationError, StepSaveError},
    types::{CommitResult, ImpactEntry, ImpactKind, ImpactReport, SessionContext, WorkflowOptions},
    workflow::{WorkflowController, WorkflowUpdate},
    SimulationClient,
};

type Responder<T, E> = oneshot::Sender<Result<T, E>>;

pub struct Parked<T, E> {
    pub request: DiffPayload,
    responder: Option<Responder<T, E>>,
}

#[derive(Default)]
pub struct ScriptedClient {
    starts: Mutex<Vec<(SubjectRef, Option<Responder<SessionContext, SessionStartError>>)>>,
    simulations: Mutex<Vec<Parked<ImpactReport, SimulationError>>>,
    commits: Mutex<Vec<(CommitMetadata, Parked<CommitResult, CommitError>)>>,
    steps: Mutex<Vec<(String, Vec<TargetRef>)>>,
    step_failure: Mutex<Option<RemoteFailure>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn start_count(&self) -> usize {
        self.starts.lock().expect("lock").len()
    }

    pub fn simulation_count(&self) -> usize {
        self.simulations.lock().expect("lock").len()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.lock().expect("lock").len()
    }

    pub fn simulation_request(&self, index: usize) -> DiffPayload {
        self.simulations.lock().expect("lock")[index].request.clone()
    }

    pub fn commit_request(&self, index: usize) -> (CommitMetadata, DiffPayload) {
        let commits = self.commits.lock().expect("lock");
        (commits[index].0.clone(), commits[index].1.request.clone())
    }

    pub fn saved_steps(&self) -> Vec<(String, Vec<TargetRef>)> {
        self.steps.lock().expect("lock").clone()
    }

    pub fn fail_step_saves(&self, failure: Option<RemoteFailure>) {
        *self.step_failure.lock().expect("lock") = failure;
    }

    pub fn answer_start(&self, index: usize, result: Result<SessionContext, SessionStartError>) {
        let responder = self.starts.lock().expect("lock")[index]
            .1
            .take()
            .expect("start already answered");
        let _ = responder.send(result);
    }

    pub fn answer_simulation(&self, index: usize, result: Result<ImpactReport, SimulationError>) {
        let responder = self.simulations.lock().expect("lock")[index]
            .responder
            .take()
            .expect("simulation already answered");
        let _ = responder.send(result);
    }

    pub fn answer_commit(&self, index: usize, result: Result<CommitResult, CommitError>) {
        let responder = self.commits.lock().expect("lock")[index]
            .1
            .responder
            .take()
            .expect("commit already answered");
        let _ = responder.send(result);
    }
}

async fn wait<T, E: From<RemoteFailure>>(rx: oneshot::Receiver<Result<T, E>>) -> Result<T, E> {
    rx.await
        .unwrap_or_else(|_| Err(E::from(RemoteFailure::Network("test dropped the call".into()))))
}

#[async_trait]
impl SimulationClient for ScriptedClient {
    async fn start_session(&self, subject: &SubjectRef) -> Result<SessionContext, SessionStartError> {
        let (tx, rx) = oneshot::channel();
        self.starts
            .lock()
            .expect("lock")
            .push((subject.clone(), Some(tx)));
        wait(rx).await
    }

    async fn simulate(
        &self,
        _context: &SessionContext,
        diff: &DiffPayload,
    ) -> Result<ImpactReport, SimulationError> {
        let (tx, rx) = oneshot::channel();
        self.simulations.lock().expect("lock").push(Parked {
            request: diff.clone(),
            responder: Some(tx),
        });
        wait(rx).await
    }

    async fn commit(
        &self,
        _context: &SessionContext,
        diff: &DiffPayload,
        metadata: &CommitMetadata,
    ) -> Result<CommitResult, CommitError> {
        let (tx, rx) = oneshot::channel();
        self.commits.lock().expect("lock").push((
            metadata.clone(),
            Parked {
                request: diff.clone(),
                responder: Some(tx),
            },
        ));
        wait(rx).await
    }

    async fn save_step(
        &self,
        _context: &SessionContext,
        step: &str,
        selected: &[TargetRef],
    ) -> Result<(), StepSaveError> {
        self.steps
            .lock()
            .expect("lock")
            .push((step.to_string(), selected.to_vec()));
        match self.step_failure.lock().expect("lock").clone() {
            Some(failure) => Err(failure.into()),
            None => Ok(()),
        }
    }
}

pub fn id(raw: &str) -> AssignmentId {
    AssignmentId::from(raw)
}

pub fn target(raw: &str, target_type: TargetType) -> TargetRef {
    TargetRef {
        target_id: id(raw),
        target_type,
    }
}

pub fn candidate(raw: &str, target_type: TargetType, label: &str) -> Candidate {
    Candidate {
        target_id: id(raw),
        target_type,
        label: label.to_string(),
        description: None,
    }
}

pub fn subject() -> SubjectRef {
    SubjectRef::new(5, SubjectType::User)
}

/// Member of G1 and G2; may also join G3 or G4.
pub fn group_snapshot() -> AssignmentSnapshot {
    AssignmentSnapshot {
        assignments: vec![
            candidate("G1", TargetType::Group, "Ops"),
            candidate("G2", TargetType::Group, "Dev"),
        ],
        candidates: vec![
            candidate("G3", TargetType::Group, "Billing"),
            candidate("G4", TargetType::Group, "Support"),
        ],
        effective_permissions: Vec::new(),
    }
}

pub fn context(raw: &str) -> SessionContext {
    SessionContext {
        id: SessionContextId::from(raw),
        subject: subject(),
    }
}

pub fn report(summary: &str, entries: &[(ImpactKind, &str)]) -> ImpactReport {
    ImpactReport {
        summary: summary.to_string(),
        entries: entries
            .iter()
            .map(|(kind, label)| ImpactEntry {
                kind: *kind,
                label: label.to_string(),
                reason: None,
            })
            .collect(),
    }
}

/// Lets spawned calls run up to their first suspension point.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub fn options() -> WorkflowOptions {
    WorkflowOptions {
        debounce: std::time::Duration::from_millis(350),
        request_timeout: std::time::Duration::from_secs(30),
    }
}

/// Controller in `Editing` for [`subject`] over [`group_snapshot`].
pub async fn editing(client: &Arc<ScriptedClient>, snapshot: AssignmentSnapshot) -> WorkflowController {
    let mut controller = WorkflowController::new(client.clone(), options());
    controller
        .select_subject(subject(), snapshot)
        .expect("select subject");
    controller.begin_edit().expect("begin edit");
    settle().await;
    let index = client.start_count() - 1;
    client.answer_start(index, Ok(context("ctx-1")));
    assert_eq!(
        controller.process_next().await,
        Some(WorkflowUpdate::SessionStarted)
    );
    controller
}
