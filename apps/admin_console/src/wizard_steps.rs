//! Wizard steps for the console: one selection step per kind of item the
//! subject can be assigned.

use client_core::WizardStep;
use indexmap::IndexMap;
use shared::{
    domain::{AssignmentId, TargetType},
    protocol::AssignmentSnapshot,
};

pub fn steps_for(snapshot: &AssignmentSnapshot, min_per_step: usize) -> Vec<WizardStep> {
    let mut by_kind: IndexMap<TargetType, Vec<AssignmentId>> = IndexMap::new();
    for item in snapshot.assignments.iter().chain(&snapshot.candidates) {
        let ids = by_kind.entry(item.target_type).or_default();
        if !ids.contains(&item.target_id) {
            ids.push(item.target_id.clone());
        }
    }

    by_kind
        .into_iter()
        .map(|(kind, ids)| {
            let (key, title) = step_names(kind);
            WizardStep::new(key, title, ids).require_at_least(min_per_step)
        })
        .collect()
}

fn step_names(kind: TargetType) -> (&'static str, &'static str) {
    match kind {
        TargetType::User => ("users", "Users"),
        TargetType::Group => ("groups", "Groups"),
        TargetType::Role => ("roles", "Roles"),
        TargetType::Permission => ("permissions", "Permissions"),
        TargetType::Condition => ("conditions", "Conditions"),
    }
}
