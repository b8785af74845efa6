//! Side-effect dispatcher: pure appends of notifications and chat entries.

use tracing::{debug, warn};

use crate::cascade::Cascade;
use crate::error::StoreError;
use crate::ids::{EmployeeId, PhaseId, SiteId, TaskId};
use crate::messages::{MessageKind, NewNotification, NewStageMessage, Notification, StageMessage};
use crate::ports::{EmployeeDirectory, SiteStore};

pub struct Dispatcher<'a, S, D> {
    cascade: &'a Cascade<S, D>,
}

impl<'a, S: SiteStore, D: EmployeeDirectory> Dispatcher<'a, S, D> {
    pub(crate) fn new(cascade: &'a Cascade<S, D>) -> Self {
        Self { cascade }
    }

    /// One unread notification per current admin. No admins is not an error.
    pub fn notify_admins(
        &self,
        site_id: SiteId,
        phase_id: PhaseId,
        task_id: TaskId,
        kind: &str,
        message: &str,
    ) -> Result<Vec<Notification>, StoreError> {
        let admins = self.cascade.directory.admins()?;
        if admins.is_empty() {
            warn!(site_id = %site_id, task_id = %task_id, kind, "no admins to notify");
            return Ok(Vec::new());
        }

        let created_at = self.cascade.clock.now();
        let mut out = Vec::with_capacity(admins.len());
        for admin in admins {
            let n = NewNotification {
                employee_id: admin.id,
                site_id,
                phase_id: Some(phase_id),
                task_id: Some(task_id),
                kind: kind.to_string(),
                message: message.to_string(),
                created_at,
            };
            out.push(self.cascade.store.insert_notification(&n)?);
        }
        debug!(site_id = %site_id, task_id = %task_id, kind, count = out.len(), "notified admins");
        Ok(out)
    }

    pub fn notify_employee(
        &self,
        employee_id: EmployeeId,
        site_id: SiteId,
        phase_id: PhaseId,
        task_id: TaskId,
        kind: &str,
        message: &str,
    ) -> Result<Notification, StoreError> {
        let n = NewNotification {
            employee_id,
            site_id,
            phase_id: Some(phase_id),
            task_id: Some(task_id),
            kind: kind.to_string(),
            message: message.to_string(),
            created_at: self.cascade.clock.now(),
        };
        self.cascade.store.insert_notification(&n)
    }

    /// A `system` entry from the configured system actor, not yet written.
    pub fn system_message(&self, phase_id: PhaseId, content: String) -> NewStageMessage {
        NewStageMessage {
            phase_id,
            sender_id: self.cascade.settings.system_actor,
            content,
            kind: MessageKind::System,
            created_at: self.cascade.clock.now(),
            achievement_for: None,
        }
    }

    pub fn append_system_message(
        &self,
        phase_id: PhaseId,
        content: &str,
    ) -> Result<StageMessage, StoreError> {
        let m = self.system_message(phase_id, content.to_string());
        self.cascade.store.insert_stage_message(&m)
    }
}
