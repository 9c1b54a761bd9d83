//! Staged-change workflow: local edits, debounced impact simulation and a
//! latched commit, driven by events delivered back from spawned remote calls.

use std::{future::Future, sync::Arc, time::Duration};

use indexmap::IndexSet;
use shared::{
    domain::{AssignmentId, SessionContextId, SubjectRef},
    protocol::{AssignmentSnapshot, CommitMetadata, DiffPayload},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    debounce::{DebounceTicket, Debouncer},
    diff_store::DiffStore,
    error::{
        CommitError, RemoteFailure, SessionStartError, SimulationError, ValidationError,
        WorkflowError,
    },
    reconcile::{ReconciliationRenderer, ReconciliationView},
    types::{Catalog, CommitResult, Diff, ImpactReport, SessionContext, WorkflowOptions},
    SimulationClient,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Viewing,
    Editing,
    Simulating,
    Committing,
    Committed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Viewing,
    Editing,
    Committing,
    Committed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    SessionStartFailed,
    SimulationFailed,
    CommitFailed,
    StepSaveFailed,
    Validation,
}

/// Transient banner for the user. Server messages are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// What applying one background event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowUpdate {
    SessionStarted,
    SessionStartFailed(SessionStartError),
    SimulationIssued { seq: u64 },
    ImpactUpdated { seq: u64 },
    SimulationFailed { seq: u64, error: SimulationError },
    StaleDiscarded { seq: u64 },
    Committed(CommitResult),
    CommitFailed(CommitError),
    /// The event belonged to a superseded timer or a session that has moved on.
    Ignored,
}

/// Identity of one edit session: a local epoch plus the server's context id.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionKey {
    epoch: u64,
    context_id: SessionContextId,
}

#[derive(Debug)]
enum WorkflowEvent {
    SessionStarted {
        epoch: u64,
        result: Result<SessionContext, SessionStartError>,
    },
    DebounceElapsed {
        ticket: DebounceTicket,
    },
    SimulationFinished {
        key: SessionKey,
        seq: u64,
        revision: u64,
        result: Result<ImpactReport, SimulationError>,
    },
    CommitFinished {
        key: SessionKey,
        result: Result<CommitResult, CommitError>,
    },
}

struct SubjectView {
    subject: SubjectRef,
    snapshot: AssignmentSnapshot,
    catalog: Catalog,
}

struct ActiveSession {
    key: SessionKey,
    context: SessionContext,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    seq: u64,
}

pub struct WorkflowController {
    client: Arc<dyn SimulationClient>,
    options: WorkflowOptions,
    phase: Phase,
    subject: Option<SubjectView>,
    session: Option<ActiveSession>,
    pending_start: Option<u64>,
    epoch: u64,
    store: DiffStore,
    debouncer: Debouncer,
    next_seq: u64,
    last_applied_seq: u64,
    in_flight: Option<InFlight>,
    /// Working selection as it was when the commit in flight was sent.
    committing: Option<IndexSet<AssignmentId>>,
    report: Option<ImpactReport>,
    report_revision: Option<u64>,
    notice: Option<Notice>,
    committed: Option<CommitResult>,
    events_tx: mpsc::UnboundedSender<WorkflowEvent>,
    events_rx: mpsc::UnboundedReceiver<WorkflowEvent>,
}

pub(crate) async fn bounded<T, E>(limit: Duration, call: impl Future<Output = Result<T, E>>) -> Result<T, E>
where
    E: From<RemoteFailure>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(E::from(RemoteFailure::TimedOut(limit))),
    }
}

impl WorkflowController {
    pub fn new(client: Arc<dyn SimulationClient>, options: WorkflowOptions) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            client,
            options,
            phase: Phase::Idle,
            subject: None,
            session: None,
            pending_start: None,
            epoch: 0,
            store: DiffStore::new(),
            debouncer: Debouncer::new(options.debounce),
            next_seq: 0,
            last_applied_seq: 0,
            in_flight: None,
            committing: None,
            report: None,
            report_revision: None,
            notice: None,
            committed: None,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> WorkflowState {
        match self.phase {
            Phase::Idle => WorkflowState::Idle,
            Phase::Viewing => WorkflowState::Viewing,
            Phase::Editing if self.in_flight.is_some() => WorkflowState::Simulating,
            Phase::Editing => WorkflowState::Editing,
            Phase::Committing => WorkflowState::Committing,
            Phase::Committed => WorkflowState::Committed,
        }
    }

    pub fn options(&self) -> WorkflowOptions {
        self.options
    }

    pub fn subject(&self) -> Option<&SubjectRef> {
        self.subject.as_ref().map(|view| &view.subject)
    }

    pub fn snapshot(&self) -> Option<&AssignmentSnapshot> {
        self.subject.as_ref().map(|view| &view.snapshot)
    }

    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref().map(|session| &session.context)
    }

    pub fn store(&self) -> &DiffStore {
        &self.store
    }

    pub fn diff(&self) -> Diff {
        self.store.diff()
    }

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    pub fn impact_report(&self) -> Option<&ImpactReport> {
        self.report.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn committed_result(&self) -> Option<&CommitResult> {
        self.committed.as_ref()
    }

    /// Maps an id typed by the user onto the offered item it names.
    pub fn resolve_assignment(&self, raw: &str) -> Option<AssignmentId> {
        self.catalog()?.find(raw).cloned()
    }

    pub fn is_starting(&self) -> bool {
        self.pending_start.is_some()
    }

    /// Save control state: enabled while editing, disabled during a commit.
    pub fn can_commit(&self) -> bool {
        self.phase == Phase::Editing
    }

    pub(crate) fn client(&self) -> Arc<dyn SimulationClient> {
        self.client.clone()
    }

    pub(crate) fn catalog(&self) -> Option<&Catalog> {
        self.subject.as_ref().map(|view| &view.catalog)
    }

    pub(crate) fn set_notice(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.notice = Some(Notice {
            kind,
            message: message.into(),
        });
    }

    /// Enters `Viewing` for a subject with its display snapshot. Candidates
    /// offered for editing are the snapshot's assignments plus candidates.
    pub fn select_subject(
        &mut self,
        subject: SubjectRef,
        snapshot: AssignmentSnapshot,
    ) -> Result<(), WorkflowError> {
        self.ensure_not_editing()?;

        let catalog = Catalog::new(
            snapshot
                .assignments
                .iter()
                .chain(snapshot.candidates.iter())
                .cloned(),
        );
        self.store
            .initialize(snapshot.assignments.iter().map(|item| item.target_id.clone()));
        info!(subject = %subject, offered = catalog.len(), "subject selected");

        self.subject = Some(SubjectView {
            subject,
            snapshot,
            catalog,
        });
        self.reset_session_state();
        self.committed = None;
        self.notice = None;
        self.phase = Phase::Viewing;
        Ok(())
    }

    pub fn clear_subject(&mut self) -> Result<(), WorkflowError> {
        self.ensure_not_editing()?;
        self.subject = None;
        self.reset_session_state();
        self.store = DiffStore::new();
        self.committed = None;
        self.notice = None;
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Requests a server session for the selected subject. The outcome arrives
    /// through [`Self::process_next`].
    pub fn begin_edit(&mut self) -> Result<(), WorkflowError> {
        match self.phase {
            Phase::Idle => return Err(WorkflowError::NoSubject),
            Phase::Editing | Phase::Committing => return Err(WorkflowError::AlreadyEditing),
            Phase::Committed => return Err(WorkflowError::SessionClosed),
            Phase::Viewing => {}
        }
        if self.pending_start.is_some() {
            return Err(WorkflowError::StartInProgress);
        }
        let Some(subject) = self.subject().cloned() else {
            return Err(WorkflowError::NoSubject);
        };

        self.epoch += 1;
        let epoch = self.epoch;
        self.pending_start = Some(epoch);
        self.notice = None;
        info!(subject = %subject, epoch, "starting edit session");

        let client = self.client.clone();
        let tx = self.events_tx.clone();
        let limit = self.options.request_timeout;
        tokio::spawn(async move {
            let result = bounded(limit, client.start_session(&subject)).await;
            let _ = tx.send(WorkflowEvent::SessionStarted { epoch, result });
        });
        Ok(())
    }

    /// Applies one edit immediately and re-arms the impact simulation.
    pub fn toggle(&mut self, id: &AssignmentId) -> Result<(), WorkflowError> {
        match self.phase {
            Phase::Editing | Phase::Committing => {}
            _ => return Err(self.not_editing_error()),
        }
        if !self.catalog().is_some_and(|catalog| catalog.contains(id)) {
            return Err(ValidationError::UnknownAssignment(id.clone()).into());
        }

        self.store.toggle(id);
        debug!(
            assignment = %id,
            selected = self.store.is_selected(id),
            revision = self.store.revision(),
            "assignment toggled"
        );

        if self.phase == Phase::Editing {
            self.after_selection_change();
        }
        Ok(())
    }

    /// Restores the working selection to the baseline.
    pub fn revert_all(&mut self) -> Result<(), WorkflowError> {
        self.ensure_editing()?;
        self.store.revert();
        self.after_selection_change();
        Ok(())
    }

    /// Issues a simulate call right away, skipping the quiet period.
    pub fn refresh_impact(&mut self) -> Result<Option<u64>, WorkflowError> {
        self.ensure_editing()?;
        if !self.store.is_dirty() {
            return Ok(None);
        }
        self.debouncer.cancel();
        self.issue_simulation().map(Some)
    }

    /// Sends the current diff for commit. A second call while one is in
    /// flight is rejected without a network call.
    pub fn commit(&mut self, metadata: CommitMetadata) -> Result<(), WorkflowError> {
        self.ensure_editing()?;
        let (key, context) = self.active_session()?;
        let payload = self.payload()?;

        self.debouncer.cancel();
        self.committing = Some(self.store.working().clone());
        self.phase = Phase::Committing;
        if self
            .notice
            .as_ref()
            .is_some_and(|notice| notice.kind == NoticeKind::CommitFailed)
        {
            self.notice = None;
        }
        info!(
            session = %context.id,
            added = payload.added.len(),
            removed = payload.removed.len(),
            "committing staged changes"
        );

        let client = self.client.clone();
        let tx = self.events_tx.clone();
        let limit = self.options.request_timeout;
        tokio::spawn(async move {
            let result = bounded(limit, client.commit(&context, &payload, &metadata)).await;
            let _ = tx.send(WorkflowEvent::CommitFinished { key, result });
        });
        Ok(())
    }

    /// Leaves edit mode without a server call. Pending and in-flight results
    /// for the abandoned session are discarded when they arrive.
    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        match self.phase {
            Phase::Editing | Phase::Committing => {
                if self.phase == Phase::Committing {
                    warn!("edit session abandoned while a commit is in flight");
                }
                if let Some(view) = &self.subject {
                    self.store.initialize(
                        view.snapshot
                            .assignments
                            .iter()
                            .map(|item| item.target_id.clone()),
                    );
                }
                self.reset_session_state();
                self.phase = Phase::Viewing;
                info!("edit session cancelled");
                Ok(())
            }
            Phase::Viewing if self.pending_start.is_some() => {
                self.pending_start = None;
                info!("edit session start abandoned");
                Ok(())
            }
            _ => Err(self.not_editing_error()),
        }
    }

    /// Waits for the next background result and applies it.
    pub async fn process_next(&mut self) -> Option<WorkflowUpdate> {
        let event = self.events_rx.recv().await?;
        Some(self.apply(event))
    }

    /// Applies an already-delivered result, if any, without waiting.
    pub fn try_process(&mut self) -> Option<WorkflowUpdate> {
        let event = self.events_rx.try_recv().ok()?;
        Some(self.apply(event))
    }

    /// Reconciliation view of the current selection, or `None` when idle.
    pub fn view(&self) -> Option<ReconciliationView> {
        let subject = self.subject.as_ref()?;
        let mut view = ReconciliationRenderer::render(
            self.store.baseline(),
            self.store.working(),
            self.store.observed(),
            self.report.as_ref(),
            &subject.catalog,
        );
        view.simulating = self.in_flight.is_some();
        view.impact_outdated = self.report.is_some()
            && (self.report_revision != Some(self.store.revision())
                || self
                    .notice
                    .as_ref()
                    .is_some_and(|notice| notice.kind == NoticeKind::SimulationFailed));
        Some(view)
    }

    fn apply(&mut self, event: WorkflowEvent) -> WorkflowUpdate {
        match event {
            WorkflowEvent::SessionStarted { epoch, result } => self.on_session_started(epoch, result),
            WorkflowEvent::DebounceElapsed { ticket } => self.on_debounce_elapsed(ticket),
            WorkflowEvent::SimulationFinished {
                key,
                seq,
                revision,
                result,
            } => self.on_simulation_finished(key, seq, revision, result),
            WorkflowEvent::CommitFinished { key, result } => self.on_commit_finished(key, result),
        }
    }

    fn on_session_started(
        &mut self,
        epoch: u64,
        result: Result<SessionContext, SessionStartError>,
    ) -> WorkflowUpdate {
        if self.pending_start != Some(epoch) || self.phase != Phase::Viewing {
            debug!(epoch, "discarding session start for an abandoned request");
            return WorkflowUpdate::Ignored;
        }
        self.pending_start = None;

        match result {
            Ok(context) => {
                if let Some(view) = &self.subject {
                    self.store.initialize(
                        view.snapshot
                            .assignments
                            .iter()
                            .map(|item| item.target_id.clone()),
                    );
                }
                info!(session = %context.id, epoch, "edit session started");
                self.session = Some(ActiveSession {
                    key: SessionKey {
                        epoch,
                        context_id: context.id.clone(),
                    },
                    context,
                });
                self.report = None;
                self.report_revision = None;
                self.phase = Phase::Editing;
                WorkflowUpdate::SessionStarted
            }
            Err(err) => {
                warn!(epoch, error = %err, "edit session failed to start");
                self.set_notice(NoticeKind::SessionStartFailed, err.user_message());
                WorkflowUpdate::SessionStartFailed(err)
            }
        }
    }

    fn on_debounce_elapsed(&mut self, ticket: DebounceTicket) -> WorkflowUpdate {
        if !self.debouncer.acknowledge(ticket) {
            debug!(?ticket, "superseded debounce ticket");
            return WorkflowUpdate::Ignored;
        }
        if self.phase != Phase::Editing || !self.store.is_dirty() {
            return WorkflowUpdate::Ignored;
        }
        match self.issue_simulation() {
            Ok(seq) => WorkflowUpdate::SimulationIssued { seq },
            Err(err) => {
                warn!(error = %err, "could not build simulation request");
                self.set_notice(NoticeKind::Validation, err.to_string());
                WorkflowUpdate::Ignored
            }
        }
    }

    fn on_simulation_finished(
        &mut self,
        key: SessionKey,
        seq: u64,
        revision: u64,
        result: Result<ImpactReport, SimulationError>,
    ) -> WorkflowUpdate {
        if !self.is_current_session(&key) {
            debug!(seq, "discarding simulation for a closed session");
            return WorkflowUpdate::Ignored;
        }

        let latest = self.in_flight.is_some_and(|flight| flight.seq == seq);
        if latest {
            self.in_flight = None;
        }
        if !latest || seq <= self.last_applied_seq || revision != self.store.revision() {
            debug!(seq, revision, current = self.store.revision(), "discarding stale simulation");
            return WorkflowUpdate::StaleDiscarded { seq };
        }

        match result {
            Ok(report) => {
                debug!(seq, entries = report.entries.len(), "impact report applied");
                self.last_applied_seq = seq;
                self.report = Some(report);
                self.report_revision = Some(revision);
                if self
                    .notice
                    .as_ref()
                    .is_some_and(|notice| notice.kind == NoticeKind::SimulationFailed)
                {
                    self.notice = None;
                }
                WorkflowUpdate::ImpactUpdated { seq }
            }
            Err(error) => {
                warn!(seq, error = %error, "impact simulation failed");
                self.set_notice(NoticeKind::SimulationFailed, error.user_message());
                WorkflowUpdate::SimulationFailed { seq, error }
            }
        }
    }

    fn on_commit_finished(
        &mut self,
        key: SessionKey,
        result: Result<CommitResult, CommitError>,
    ) -> WorkflowUpdate {
        if !self.is_current_session(&key) || self.phase != Phase::Committing {
            debug!("discarding commit result for a closed session");
            return WorkflowUpdate::Ignored;
        }

        let sent = self.committing.take();
        match result {
            Ok(result) => {
                info!(commit = ?result.id, "staged changes committed");
                let sent = sent.unwrap_or_else(|| self.store.working().clone());
                self.store.promote(sent);
                self.reset_session_state();
                self.committed = Some(result.clone());
                self.notice = None;
                self.phase = Phase::Committed;
                WorkflowUpdate::Committed(result)
            }
            Err(err) => {
                warn!(error = %err, "commit failed");
                self.phase = Phase::Editing;
                self.set_notice(NoticeKind::CommitFailed, err.user_message());
                if self.store.is_dirty()
                    && self.in_flight.is_none()
                    && self.report_revision != Some(self.store.revision())
                {
                    self.schedule_simulation();
                }
                WorkflowUpdate::CommitFailed(err)
            }
        }
    }

    fn after_selection_change(&mut self) {
        if self.store.is_dirty() {
            self.schedule_simulation();
        } else {
            self.debouncer.cancel();
            self.report = None;
            self.report_revision = None;
        }
    }

    fn schedule_simulation(&mut self) {
        let tx = self.events_tx.clone();
        self.debouncer.schedule(move |ticket| {
            let _ = tx.send(WorkflowEvent::DebounceElapsed { ticket });
        });
    }

    fn issue_simulation(&mut self) -> Result<u64, WorkflowError> {
        let (key, context) = self.active_session()?;
        let payload = self.payload()?;

        self.next_seq += 1;
        let seq = self.next_seq;
        let revision = self.store.revision();
        self.in_flight = Some(InFlight { seq });
        debug!(
            seq,
            revision,
            added = payload.added.len(),
            removed = payload.removed.len(),
            "issuing impact simulation"
        );

        let client = self.client.clone();
        let tx = self.events_tx.clone();
        let limit = self.options.request_timeout;
        tokio::spawn(async move {
            let result = bounded(limit, client.simulate(&context, &payload)).await;
            let _ = tx.send(WorkflowEvent::SimulationFinished {
                key,
                seq,
                revision,
                result,
            });
        });
        Ok(seq)
    }

    fn payload(&self) -> Result<DiffPayload, WorkflowError> {
        let catalog = self.catalog().ok_or(WorkflowError::NoSubject)?;
        Ok(catalog.payload(&self.store.diff())?)
    }

    fn active_session(&self) -> Result<(SessionKey, SessionContext), WorkflowError> {
        self.session
            .as_ref()
            .map(|session| (session.key.clone(), session.context.clone()))
            .ok_or(WorkflowError::NotEditing)
    }

    fn is_current_session(&self, key: &SessionKey) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| &session.key == key)
    }

    fn reset_session_state(&mut self) {
        self.debouncer.cancel();
        self.session = None;
        self.pending_start = None;
        self.in_flight = None;
        self.committing = None;
        self.report = None;
        self.report_revision = None;
    }

    fn ensure_editing(&self) -> Result<(), WorkflowError> {
        if self.phase == Phase::Editing {
            Ok(())
        } else {
            Err(self.not_editing_error())
        }
    }

    fn ensure_not_editing(&self) -> Result<(), WorkflowError> {
        match self.phase {
            Phase::Editing => Err(WorkflowError::AlreadyEditing),
            Phase::Committing => Err(WorkflowError::CommitInProgress),
            _ => Ok(()),
        }
    }

    fn not_editing_error(&self) -> WorkflowError {
        match self.phase {
            Phase::Idle => WorkflowError::NoSubject,
            Phase::Committing => WorkflowError::CommitInProgress,
            Phase::Committed => WorkflowError::SessionClosed,
            Phase::Viewing | Phase::Editing => WorkflowError::NotEditing,
        }
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
