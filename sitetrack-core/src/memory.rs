//! In-process `SiteStore` and `EmployeeDirectory`.
//!
//! Every table sits behind one mutex, so each trait method is atomic and the
//! guarded writes are plain check-then-set under the lock. Used by tests and
//! by anything that wants the cascade without a database.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::ids::{
    EmployeeId, MilestoneId, NotificationId, PhaseId, SiteId, StageMessageId, TaskId,
};
use crate::messages::{NewNotification, NewStageMessage, Notification, StageMessage};
use crate::milestone::{Milestone, MilestoneStatus};
use crate::ports::{EmployeeDirectory, MilestoneCompletion, SiteStore};
use crate::site::{Employee, Phase, Role, Site};
use crate::task::Task;

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    sites: BTreeMap<SiteId, Site>,
    employees: BTreeMap<EmployeeId, Employee>,
    phases: BTreeMap<PhaseId, Phase>,
    milestones: BTreeMap<MilestoneId, Milestone>,
    tasks: BTreeMap<TaskId, Task>,
    notifications: Vec<Notification>,
    stage_messages: Vec<StageMessage>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn count_incomplete(&self, phases: &[PhaseId]) -> usize {
        self.tasks
            .values()
            .filter(|t| phases.contains(&t.phase_id) && !t.status.is_completed())
            .count()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    // Seeding helpers. A poisoned lock here is a test bug, so recover the
    // guard rather than threading errors through fixtures.
    fn seed(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_site(&self, name: &str) -> Site {
        let mut t = self.seed();
        let site = Site {
            id: SiteId(t.next_id()),
            name: name.to_string(),
        };
        t.sites.insert(site.id, site.clone());
        site
    }

    pub fn add_employee(&self, name: &str, role: Role) -> Employee {
        let mut t = self.seed();
        let employee = Employee {
            id: EmployeeId(t.next_id()),
            name: name.to_string(),
            role,
        };
        t.employees.insert(employee.id, employee.clone());
        employee
    }

    pub fn add_milestone(&self, site_id: SiteId, name: &str) -> Milestone {
        let mut t = self.seed();
        let milestone = Milestone::new(MilestoneId(t.next_id()), site_id, name);
        t.milestones.insert(milestone.id, milestone.clone());
        milestone
    }

    /// `None` if `milestone_id` names a milestone of another site, or none.
    pub fn add_phase(
        &self,
        site_id: SiteId,
        name: &str,
        order_num: i32,
        milestone_id: Option<MilestoneId>,
    ) -> Option<Phase> {
        let mut t = self.seed();
        if let Some(m) = milestone_id {
            if t.milestones.get(&m)?.site_id != site_id {
                return None;
            }
        }
        let phase = Phase {
            id: PhaseId(t.next_id()),
            site_id,
            name: name.to_string(),
            order_num,
            milestone_id,
        };
        t.phases.insert(phase.id, phase.clone());
        Some(phase)
    }

    /// `None` if the phase does not exist.
    pub fn add_task(&self, phase_id: PhaseId, name: &str) -> Option<Task> {
        let mut t = self.seed();
        let site_id = t.phases.get(&phase_id)?.site_id;
        let task = Task::new(TaskId(t.next_id()), phase_id, site_id, name);
        t.tasks.insert(task.id, task.clone());
        Some(task)
    }

    /// Overwrite a task row as-is, bypassing the state machine.
    pub fn put_task(&self, task: Task) {
        self.seed().tasks.insert(task.id, task);
    }

    pub fn set_milestone_progress(&self, id: MilestoneId, progress: u8) {
        if let Some(m) = self.seed().milestones.get_mut(&id) {
            m.progress = progress.min(100);
        }
    }

    pub fn milestone(&self, id: MilestoneId) -> Option<Milestone> {
        self.seed().milestones.get(&id).cloned()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seed().notifications.clone()
    }

    pub fn stage_messages(&self, phase_id: PhaseId) -> Vec<StageMessage> {
        self.seed()
            .stage_messages
            .iter()
            .filter(|m| m.phase_id == phase_id)
            .cloned()
            .collect()
    }

    pub fn all_stage_messages(&self) -> Vec<StageMessage> {
        self.seed().stage_messages.clone()
    }
}

impl SiteStore for MemoryStore {
    fn task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.lock()?.tasks.get(&id).cloned())
    }

    fn update_task_if(&self, task: &Task, expected: &Task) -> Result<bool, StoreError> {
        let mut t = self.lock()?;
        match t.tasks.get_mut(&task.id) {
            Some(stored)
                if stored.status == expected.status
                    && stored.completed_at == expected.completed_at =>
            {
                *stored = task.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn milestones(&self, site: SiteId) -> Result<Vec<Milestone>, StoreError> {
        Ok(self
            .lock()?
            .milestones
            .values()
            .filter(|m| m.site_id == site)
            .cloned()
            .collect())
    }

    fn open_milestones(&self, site: SiteId) -> Result<Vec<Milestone>, StoreError> {
        Ok(self
            .milestones(site)?
            .into_iter()
            .filter(|m| m.status != MilestoneStatus::Completed)
            .collect())
    }

    fn phases_for_milestone(&self, milestone: MilestoneId) -> Result<Vec<Phase>, StoreError> {
        let mut phases: Vec<Phase> = self
            .lock()?
            .phases
            .values()
            .filter(|p| p.milestone_id == Some(milestone))
            .cloned()
            .collect();
        phases.sort_by(|a, b| (b.order_num, b.id).cmp(&(a.order_num, a.id)));
        Ok(phases)
    }

    fn count_tasks(&self, phases: &[PhaseId]) -> Result<usize, StoreError> {
        Ok(self
            .lock()?
            .tasks
            .values()
            .filter(|t| phases.contains(&t.phase_id))
            .count())
    }

    fn count_incomplete_tasks(&self, phases: &[PhaseId]) -> Result<usize, StoreError> {
        Ok(self.lock()?.count_incomplete(phases))
    }

    fn complete_milestone(
        &self,
        completion: &MilestoneCompletion,
    ) -> Result<Option<StageMessage>, StoreError> {
        let mut t = self.lock()?;
        if t.count_incomplete(&completion.linked_phases) > 0 {
            return Ok(None);
        }
        let Some(milestone) = t.milestones.get_mut(&completion.milestone_id) else {
            return Ok(None);
        };
        if milestone.status.is_terminal() {
            return Ok(None);
        }
        milestone.status = MilestoneStatus::Completed;
        milestone
            .actual_completion_date
            .get_or_insert(completion.completed_on);

        let id = StageMessageId(t.next_id());
        let message = StageMessage::from_new(id, &completion.achievement);
        t.stage_messages.push(message.clone());
        Ok(Some(message))
    }

    fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, StoreError> {
        let mut t = self.lock()?;
        let n = Notification::from_new(NotificationId(t.next_id()), notification);
        t.notifications.push(n.clone());
        Ok(n)
    }

    fn insert_stage_message(&self, message: &NewStageMessage) -> Result<StageMessage, StoreError> {
        let mut t = self.lock()?;
        if let Some(milestone) = message.achievement_for {
            if t.stage_messages
                .iter()
                .any(|m| m.achievement_for == Some(milestone))
            {
                return Err(StoreError::backend(
                    "insert stage message",
                    format!("achievement for milestone {milestone} already recorded"),
                ));
            }
        }
        let m = StageMessage::from_new(StageMessageId(t.next_id()), message);
        t.stage_messages.push(m.clone());
        Ok(m)
    }
}

impl EmployeeDirectory for MemoryStore {
    fn admins(&self) -> Result<Vec<Employee>, StoreError> {
        Ok(self
            .lock()?
            .employees
            .values()
            .filter(|e| e.role.is_admin())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageKind;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn completion(store: &MemoryStore) -> (MilestoneId, MilestoneCompletion) {
        let site = store.add_site("Harbor");
        let m = store.add_milestone(site.id, "Frame");
        let p = store.add_phase(site.id, "Framing", 2, Some(m.id)).unwrap();
        let c = MilestoneCompletion {
            milestone_id: m.id,
            linked_phases: vec![p.id],
            completed_on: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            achievement: NewStageMessage {
                phase_id: p.id,
                sender_id: EmployeeId(0),
                content: "done".into(),
                kind: MessageKind::System,
                created_at: Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
                achievement_for: Some(m.id),
            },
        };
        (m.id, c)
    }

    #[test]
    fn test_complete_milestone_only_once() {
        let store = MemoryStore::new();
        let (id, c) = completion(&store);

        assert!(store.complete_milestone(&c).unwrap().is_some());
        assert!(store.complete_milestone(&c).unwrap().is_none());

        let m = store.milestone(id).unwrap();
        assert_eq!(m.status, MilestoneStatus::Completed);
        assert_eq!(m.actual_completion_date, NaiveDate::from_ymd_opt(2026, 5, 1));
        assert_eq!(store.all_stage_messages().len(), 1);
    }

    #[test]
    fn test_duplicate_achievement_insert_rejected() {
        let store = MemoryStore::new();
        let (_, c) = completion(&store);
        store.insert_stage_message(&c.achievement).unwrap();
        assert!(store.insert_stage_message(&c.achievement).is_err());
    }

    #[test]
    fn test_update_task_if_detects_resubmission() {
        let store = MemoryStore::new();
        let site = store.add_site("Harbor");
        let p = store.add_phase(site.id, "Framing", 1, None).unwrap();
        let task = store.add_task(p.id, "Studs").unwrap();

        let first = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();
        let waiting_v1 = task.submit(EmployeeId(5), first).unwrap();
        let waiting_v2 = task.submit(EmployeeId(5), second).unwrap();
        store.put_task(waiting_v2);

        // Same status, different stamp: a stale approval must not land.
        let stale = waiting_v1.approve(EmployeeId(1), second).unwrap();
        assert!(!store.update_task_if(&stale, &waiting_v1).unwrap());
    }

    #[test]
    fn test_add_phase_rejects_foreign_milestone() {
        let store = MemoryStore::new();
        let a = store.add_site("A");
        let b = store.add_site("B");
        let roof = store.add_milestone(a.id, "Roof");

        assert!(store.add_phase(b.id, "Trusses", 1, Some(roof.id)).is_none());
        assert!(store.add_phase(a.id, "Trusses", 1, Some(MilestoneId(999))).is_none());
        let p = store.add_phase(a.id, "Trusses", 1, Some(roof.id)).unwrap();
        assert_eq!(store.phases_for_milestone(roof.id).unwrap(), vec![p]);
    }
}
