//! Three-way view model derived from baseline, working selection and impact.

use indexmap::IndexSet;
use shared::domain::AssignmentId;

use crate::types::{Catalog, ImpactEntry, ImpactReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTag {
    Unchanged,
    Added,
    /// Still offered with a restore affordance.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationItem {
    pub id: AssignmentId,
    pub label: String,
    pub tag: ItemTag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImpactView {
    NotSimulated,
    /// The server answered and reported nothing gained or lost.
    NoChanges { summary: String },
    Changes {
        summary: String,
        gained: Vec<ImpactEntry>,
        lost: Vec<ImpactEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationView {
    pub items: Vec<ReconciliationItem>,
    pub added_count: usize,
    pub removed_count: usize,
    pub impact: ImpactView,
    /// A simulate call for the current selection is in flight.
    pub simulating: bool,
    /// The impact shown was computed for an earlier selection or the last
    /// refresh failed.
    pub impact_outdated: bool,
}

impl ReconciliationView {
    pub fn is_dirty(&self) -> bool {
        self.added_count + self.removed_count > 0
    }

    pub fn items_tagged(&self, tag: ItemTag) -> impl Iterator<Item = &ReconciliationItem> {
        self.items.iter().filter(move |item| item.tag == tag)
    }
}

pub struct ReconciliationRenderer;

impl ReconciliationRenderer {
    /// Items appear in `order` first, then any remaining baseline or working
    /// ids. Ids in neither set are skipped.
    pub fn render(
        baseline: &IndexSet<AssignmentId>,
        working: &IndexSet<AssignmentId>,
        order: &IndexSet<AssignmentId>,
        report: Option<&ImpactReport>,
        catalog: &Catalog,
    ) -> ReconciliationView {
        let sequence: IndexSet<&AssignmentId> = order
            .iter()
            .chain(baseline.iter())
            .chain(working.iter())
            .collect();

        let mut added_count = 0;
        let mut removed_count = 0;
        let items = sequence
            .into_iter()
            .filter_map(|id| {
                let tag = match (baseline.contains(id), working.contains(id)) {
                    (true, true) => ItemTag::Unchanged,
                    (false, true) => {
                        added_count += 1;
                        ItemTag::Added
                    }
                    (true, false) => {
                        removed_count += 1;
                        ItemTag::Removed
                    }
                    (false, false) => return None,
                };
                Some(ReconciliationItem {
                    id: id.clone(),
                    label: catalog.label(id),
                    tag,
                })
            })
            .collect();

        ReconciliationView {
            items,
            added_count,
            removed_count,
            impact: Self::impact(report),
            simulating: false,
            impact_outdated: false,
        }
    }

    pub fn impact(report: Option<&ImpactReport>) -> ImpactView {
        let Some(report) = report else {
            return ImpactView::NotSimulated;
        };
        if report.is_no_change() {
            return ImpactView::NoChanges {
                summary: report.summary.clone(),
            };
        }
        ImpactView::Changes {
            summary: report.summary.clone(),
            gained: report.gained().cloned().collect(),
            lost: report.lost().cloned().collect(),
        }
    }
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
