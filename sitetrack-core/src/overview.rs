//! Read-only milestone overview.
//!
//! A milestone's stored `progress` is typed in by people; auto-completion
//! counts tasks. The two are never reconciled. This view puts them side by
//! side so the gap is visible, without writing either.

use serde::Serialize;

use crate::error::StoreError;
use crate::ids::{MilestoneId, PhaseId, SiteId};
use crate::milestone::MilestoneStatus;
use crate::ports::SiteStore;

/// Stored progress and task ratio further apart than this are flagged.
pub const DIVERGENCE_THRESHOLD: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MilestoneOverview {
    pub milestone_id: MilestoneId,
    pub name: String,
    pub status: MilestoneStatus,
    pub stored_progress: u8,
    pub linked_phases: usize,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// Percentage of linked tasks completed; `None` without tasks.
    pub task_progress: Option<u8>,
    pub diverges: bool,
}

pub fn milestone_overview<S: SiteStore + ?Sized>(
    store: &S,
    site: SiteId,
) -> Result<Vec<MilestoneOverview>, StoreError> {
    let mut out = Vec::new();
    for m in store.milestones(site)? {
        let phases: Vec<PhaseId> = store
            .phases_for_milestone(m.id)?
            .into_iter()
            .map(|p| p.id)
            .collect();
        let total = store.count_tasks(&phases)?;
        let incomplete = store.count_incomplete_tasks(&phases)?;
        let completed = total.saturating_sub(incomplete);

        let task_progress = (total > 0).then(|| ((completed * 100) / total) as u8);
        let diverges = task_progress
            .map(|p| p.abs_diff(m.progress) > DIVERGENCE_THRESHOLD)
            .unwrap_or(false);

        out.push(MilestoneOverview {
            milestone_id: m.id,
            name: m.name,
            status: m.status,
            stored_progress: m.progress,
            linked_phases: phases.len(),
            total_tasks: total,
            completed_tasks: completed,
            task_progress,
            diverges,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::task::TaskStatus;

    #[test]
    fn test_overview_flags_divergence_without_writing() {
        let store = MemoryStore::new();
        let site = store.add_site("Riverside");
        let m = store.add_milestone(site.id, "Shell");
        let p = store.add_phase(site.id, "Walls", 1, Some(m.id)).unwrap();
        let t1 = store.add_task(p.id, "North wall").unwrap();
        store.add_task(p.id, "South wall").unwrap();
        store.put_task(t1.with_status(TaskStatus::Completed));
        store.set_milestone_progress(m.id, 90);

        let rows = milestone_overview(&store, site.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_tasks, 2);
        assert_eq!(rows[0].completed_tasks, 1);
        assert_eq!(rows[0].task_progress, Some(50));
        assert!(rows[0].diverges);
        assert_eq!(store.milestone(m.id).unwrap().progress, 90);
    }

    #[test]
    fn test_overview_unlinked_milestone() {
        let store = MemoryStore::new();
        let site = store.add_site("Riverside");
        store.add_milestone(site.id, "Handover");
        let rows = milestone_overview(&store, site.id).unwrap();
        assert_eq!(rows[0].linked_phases, 0);
        assert_eq!(rows[0].task_progress, None);
        assert!(!rows[0].diverges);
    }
}
