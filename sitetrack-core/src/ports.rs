//! Collaborators the cascade consumes. Real adapters live outside this crate
//! (`sitetrack-store`); `crate::memory` provides an in-process one.

use chrono::NaiveDate;

use crate::error::StoreError;
use crate::ids::{MilestoneId, PhaseId, SiteId, TaskId};
use crate::messages::{NewNotification, NewStageMessage, Notification, StageMessage};
use crate::milestone::Milestone;
use crate::site::{Employee, Phase};
use crate::task::Task;

/// Everything needed to complete one milestone in a single atomic unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneCompletion {
    pub milestone_id: MilestoneId,
    /// Phases whose tasks must all be completed at commit time.
    pub linked_phases: Vec<PhaseId>,
    pub completed_on: NaiveDate,
    pub achievement: NewStageMessage,
}

/// Typed persistence for the cascade.
///
/// Implementations must make each method atomic on its own. The two guarded
/// writes, `update_task_if` and `complete_milestone`, are what keeps racing
/// approvals from double-applying.
pub trait SiteStore: Send + Sync {
    fn task(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    /// Write `task` only if the stored row still has the status and
    /// submission stamp (`completed_at`) of `expected`. Comparing the stamp
    /// keeps a reject-and-resubmit in between from looking unchanged.
    /// Returns false when another writer got there first.
    fn update_task_if(&self, task: &Task, expected: &Task) -> Result<bool, StoreError>;

    fn milestones(&self, site: SiteId) -> Result<Vec<Milestone>, StoreError>;

    /// Milestones of `site` whose status is not Completed.
    fn open_milestones(&self, site: SiteId) -> Result<Vec<Milestone>, StoreError>;

    /// Phases linked to `milestone`, highest `order_num` first.
    fn phases_for_milestone(&self, milestone: MilestoneId) -> Result<Vec<Phase>, StoreError>;

    fn count_tasks(&self, phases: &[PhaseId]) -> Result<usize, StoreError>;

    /// Tasks in `phases` whose status, case-folded, is not "completed".
    fn count_incomplete_tasks(&self, phases: &[PhaseId]) -> Result<usize, StoreError>;

    /// In one atomic unit: confirm the linked phases still have no incomplete
    /// task, flip the milestone to Completed if it is not already, stamp the
    /// completion date, and append the achievement message.
    ///
    /// Returns the inserted message, or `None` when the milestone was already
    /// Completed (or the count moved) and nothing was written.
    fn complete_milestone(
        &self,
        completion: &MilestoneCompletion,
    ) -> Result<Option<StageMessage>, StoreError>;

    fn insert_notification(&self, notification: &NewNotification)
    -> Result<Notification, StoreError>;

    fn insert_stage_message(&self, message: &NewStageMessage) -> Result<StageMessage, StoreError>;
}

/// Who may be told about submissions.
pub trait EmployeeDirectory: Send + Sync {
    fn admins(&self) -> Result<Vec<Employee>, StoreError>;
}
