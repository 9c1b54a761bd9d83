//! Plain-text rendering of controller state for the console.

use std::fmt::Write as _;

use client_core::{
    ImpactEntry, ImpactView, ItemTag, MultiStepWizardController, Notice, NoticeKind,
    ReconciliationItem, ReconciliationView, WizardSummary, WorkflowState, WorkflowUpdate,
};
use shared::{domain::SubjectRef, protocol::AssignmentSnapshot};

pub fn render_snapshot(subject: &SubjectRef, snapshot: &AssignmentSnapshot) -> String {
    let mut out = format!("subject {subject}\n");

    out.push_str("assigned:\n");
    if snapshot.assignments.is_empty() {
        out.push_str("  (none)\n");
    }
    for item in &snapshot.assignments {
        let _ = writeln!(out, "  [{}] {}", item.target_id, item.label);
    }

    if !snapshot.candidates.is_empty() {
        out.push_str("available:\n");
        for item in &snapshot.candidates {
            let _ = writeln!(out, "  [{}] {}", item.target_id, item.label);
        }
    }

    if !snapshot.effective_permissions.is_empty() {
        out.push_str("effective permissions:\n");
        for permission in &snapshot.effective_permissions {
            match &permission.granted_via {
                Some(via) => {
                    let _ = writeln!(out, "  {} (via {via})", permission.permission_name);
                }
                None => {
                    let _ = writeln!(out, "  {}", permission.permission_name);
                }
            }
        }
    }

    out
}

pub fn render_view(state: WorkflowState, view: &ReconciliationView) -> String {
    let mut out = format!("[{}]\n", state_label(state));

    push_items(&mut out, &view.items);
    let _ = writeln!(
        out,
        "pending: {} added, {} removed",
        view.added_count, view.removed_count
    );

    push_impact(&mut out, &view.impact);

    if view.simulating {
        out.push_str("(simulating...)\n");
    } else if view.impact_outdated {
        out.push_str("(impact may be out of date)\n");
    }

    out
}

/// Heading for the open wizard step plus the items it offers.
pub fn render_wizard_step(wizard: &MultiStepWizardController) -> String {
    let current = wizard.current_step();
    let total = wizard.total_steps();
    let Some(step) = wizard.step() else {
        return format!("step {current}/{total}: review\n");
    };

    let mut out = format!("step {current}/{total}: {}", step.title);
    if step.min_selected > 0 {
        let _ = write!(out, " (select at least {})", step.min_selected);
    }
    out.push('\n');
    let workflow = wizard.workflow();
    for id in &step.items {
        let mark = if workflow.store().is_selected(id) { 'x' } else { ' ' };
        let label = workflow
            .snapshot()
            .and_then(|snapshot| {
                snapshot
                    .assignments
                    .iter()
                    .chain(&snapshot.candidates)
                    .find(|item| &item.target_id == id)
            })
            .map_or_else(|| id.to_string(), |item| item.label.clone());
        let _ = writeln!(out, " [{mark}] [{id}] {label}");
    }
    out
}

pub fn render_summary(summary: &WizardSummary) -> String {
    let mut out = String::new();
    for step in &summary.steps {
        let _ = writeln!(out, "{}:", step.title);
        push_items(&mut out, &step.items);
    }
    let _ = writeln!(
        out,
        "pending: {} added, {} removed",
        summary.added_count, summary.removed_count
    );
    push_impact(&mut out, &summary.impact);
    out
}

fn push_items(out: &mut String, items: &[ReconciliationItem]) {
    for item in items {
        let (marker, hint) = match item.tag {
            ItemTag::Unchanged => (' ', ""),
            ItemTag::Added => ('+', ""),
            ItemTag::Removed => ('-', " (restore)"),
        };
        let _ = writeln!(out, " {marker} [{}] {}{hint}", item.id, item.label);
    }
}

fn push_impact(out: &mut String, impact: &ImpactView) {
    match impact {
        ImpactView::NotSimulated => out.push_str("Impact not yet simulated\n"),
        ImpactView::NoChanges { summary } => {
            out.push_str("No permission changes\n");
            if !summary.is_empty() {
                let _ = writeln!(out, "  {summary}");
            }
        }
        ImpactView::Changes {
            summary,
            gained,
            lost,
        } => {
            if !summary.is_empty() {
                let _ = writeln!(out, "{summary}");
            }
            push_entries(out, "GAINED", gained);
            push_entries(out, "LOST", lost);
        }
    }
}

fn push_entries(out: &mut String, heading: &str, entries: &[ImpactEntry]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "{heading}:");
    for entry in entries {
        match &entry.reason {
            Some(reason) => {
                let _ = writeln!(out, "  {} ({reason})", entry.label);
            }
            None => {
                let _ = writeln!(out, "  {}", entry.label);
            }
        }
    }
}

pub fn render_notice(notice: &Notice) -> String {
    let prefix = match notice.kind {
        NoticeKind::SessionStartFailed => "could not start editing",
        NoticeKind::SimulationFailed => "impact check failed",
        NoticeKind::CommitFailed => "commit failed",
        NoticeKind::StepSaveFailed => "step not saved",
        NoticeKind::Validation => "invalid",
    };
    format!("! {prefix}: {}", notice.message)
}

/// One line for updates worth announcing; routine simulation bookkeeping is
/// silent.
pub fn describe_update(update: &WorkflowUpdate) -> Option<String> {
    match update {
        WorkflowUpdate::SessionStarted => Some("edit session started".into()),
        WorkflowUpdate::Committed(result) => Some(match &result.id {
            Some(id) => format!("changes committed (id {id})"),
            None => "changes committed".into(),
        }),
        WorkflowUpdate::SessionStartFailed(_)
        | WorkflowUpdate::CommitFailed(_)
        | WorkflowUpdate::SimulationFailed { .. }
        | WorkflowUpdate::SimulationIssued { .. }
        | WorkflowUpdate::ImpactUpdated { .. }
        | WorkflowUpdate::StaleDiscarded { .. }
        | WorkflowUpdate::Ignored => None,
    }
}

fn state_label(state: WorkflowState) -> &'static str {
    match state {
        WorkflowState::Idle => "idle",
        WorkflowState::Viewing => "viewing",
        WorkflowState::Editing => "editing",
        WorkflowState::Simulating => "simulating",
        WorkflowState::Committing => "committing",
        WorkflowState::Committed => "committed",
    }
}
