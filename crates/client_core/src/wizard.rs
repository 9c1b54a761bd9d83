//! Step-by-step variant of the workflow: each selection step is validated and
//! saved server-side before the next one opens; the last step reviews and commits.

use indexmap::IndexSet;
use shared::{domain::AssignmentId, protocol::CommitMetadata};
use tracing::{debug, info, warn};

use crate::{
    error::{ValidationError, WizardError, WorkflowError},
    reconcile::{ImpactView, ReconciliationItem},
    workflow::{bounded, NoticeKind, WorkflowController, WorkflowState, WorkflowUpdate},
};

pub const REVIEW_STEP_KEY: &str = "review";

/// One selection step. The review step is implicit and always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardStep {
    pub key: String,
    pub title: String,
    pub items: IndexSet<AssignmentId>,
    pub min_selected: usize,
}

impl WizardStep {
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        items: impl IntoIterator<Item = AssignmentId>,
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            items: items.into_iter().collect(),
            min_selected: 0,
        }
    }

    pub fn require_at_least(mut self, minimum: usize) -> Self {
        self.min_selected = minimum;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSummary {
    pub key: String,
    pub title: String,
    pub items: Vec<ReconciliationItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardSummary {
    pub steps: Vec<StepSummary>,
    pub added_count: usize,
    pub removed_count: usize,
    pub impact: ImpactView,
}

pub struct MultiStepWizardController {
    workflow: WorkflowController,
    steps: Vec<WizardStep>,
    current: usize,
}

impl MultiStepWizardController {
    pub fn new(workflow: WorkflowController, steps: Vec<WizardStep>) -> Result<Self, WizardError> {
        if steps.is_empty() {
            return Err(WizardError::TooFewSteps);
        }
        Ok(Self {
            workflow,
            steps,
            current: 1,
        })
    }

    /// Replaces the selection steps and reopens the first one, e.g. after the
    /// subject was reloaded.
    pub fn restart(&mut self, steps: Vec<WizardStep>) -> Result<(), WizardError> {
        if steps.is_empty() {
            return Err(WizardError::TooFewSteps);
        }
        self.steps = steps;
        self.current = 1;
        Ok(())
    }

    pub fn workflow(&self) -> &WorkflowController {
        &self.workflow
    }

    pub fn workflow_mut(&mut self) -> &mut WorkflowController {
        &mut self.workflow
    }

    pub fn into_workflow(self) -> WorkflowController {
        self.workflow
    }

    /// 1-based.
    pub fn current_step(&self) -> usize {
        self.current
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len() + 1
    }

    pub fn is_final_step(&self) -> bool {
        self.current == self.total_steps()
    }

    /// The open selection step, or `None` on review.
    pub fn step(&self) -> Option<&WizardStep> {
        self.steps.get(self.current - 1)
    }

    pub fn step_key(&self) -> &str {
        self.step().map_or(REVIEW_STEP_KEY, |step| step.key.as_str())
    }

    /// Toggles an item belonging to the open step.
    pub fn toggle(&mut self, id: &AssignmentId) -> Result<(), WizardError> {
        let in_step = self.step().is_some_and(|step| step.items.contains(id));
        if !in_step {
            return Err(ValidationError::NotInStep {
                id: id.clone(),
                step: self.step_key().to_string(),
            }
            .into());
        }
        Ok(self.workflow.toggle(id)?)
    }

    /// Validates and saves the open step, then moves forward. A no-op on the
    /// review step.
    pub async fn advance(&mut self) -> Result<usize, WizardError> {
        let Some(step) = self.step().cloned() else {
            return Ok(self.current);
        };

        let selected: Vec<AssignmentId> = step
            .items
            .iter()
            .filter(|id| self.workflow.store().is_selected(id))
            .cloned()
            .collect();
        if selected.len() < step.min_selected {
            let err = ValidationError::NothingSelected {
                step: step.key.clone(),
                minimum: step.min_selected,
            };
            self.workflow.set_notice(NoticeKind::Validation, err.to_string());
            return Err(err.into());
        }

        if !matches!(
            self.workflow.state(),
            WorkflowState::Editing | WorkflowState::Simulating
        ) {
            return Err(WorkflowError::NotEditing.into());
        }
        let context = self
            .workflow
            .session()
            .cloned()
            .ok_or(WorkflowError::NotEditing)?;
        let targets = self
            .workflow
            .catalog()
            .ok_or(WorkflowError::NoSubject)?
            .target_refs(&selected)?;

        let client = self.workflow.client();
        let limit = self.workflow.options().request_timeout;
        debug!(step = %step.key, selected = targets.len(), "saving wizard step");
        if let Err(err) = bounded(limit, client.save_step(&context, &step.key, &targets)).await {
            warn!(step = %step.key, error = %err, "wizard step was not saved");
            self.workflow
                .set_notice(NoticeKind::StepSaveFailed, err.user_message());
            return Err(err.into());
        }

        if self.workflow.notice().is_some_and(|notice| {
            matches!(
                notice.kind,
                NoticeKind::Validation | NoticeKind::StepSaveFailed
            )
        }) {
            self.workflow.dismiss_notice();
        }
        self.current += 1;
        info!(step = %step.key, now = self.current, total = self.total_steps(), "wizard advanced");
        Ok(self.current)
    }

    /// Local navigation back one step; no validation and no server call.
    pub fn retreat(&mut self) -> usize {
        if self.current > 1 {
            self.current -= 1;
        }
        self.current
    }

    /// Read-only recap of every selection step, available on the review step.
    pub fn summary(&self) -> Option<WizardSummary> {
        if !self.is_final_step() {
            return None;
        }
        let view = self.workflow.view()?;
        let steps = self
            .steps
            .iter()
            .map(|step| StepSummary {
                key: step.key.clone(),
                title: step.title.clone(),
                items: view
                    .items
                    .iter()
                    .filter(|item| step.items.contains(&item.id))
                    .cloned()
                    .collect(),
            })
            .collect();
        Some(WizardSummary {
            steps,
            added_count: view.added_count,
            removed_count: view.removed_count,
            impact: view.impact,
        })
    }

    pub fn commit(&mut self, metadata: CommitMetadata) -> Result<(), WizardError> {
        if !self.is_final_step() {
            return Err(WizardError::NotAtFinalStep);
        }
        Ok(self.workflow.commit(metadata)?)
    }

    pub async fn process_next(&mut self) -> Option<WorkflowUpdate> {
        self.workflow.process_next().await
    }
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
