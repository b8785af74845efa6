//! Status transition authority: the task approval workflow.
//!
//! Each operation reads the task, applies the pure transition from
//! `crate::task`, and writes it back guarded on the status it read. The
//! cascade that follows (notifications, milestone evaluation) is not part of
//! that write: it runs afterwards and its failures never reach the caller.

use tracing::info;

use crate::cascade::Cascade;
use crate::error::{Error, StoreError};
use crate::ids::{EmployeeId, TaskId};
use crate::messages::{TASK_REJECTED, TASK_SUBMITTED};
use crate::ports::{EmployeeDirectory, SiteStore};
use crate::sink::{CascadeFailure, CascadeStage};
use crate::task::{Task, TaskAction};

pub struct ApprovalService<'a, S, D> {
    cascade: &'a Cascade<S, D>,
}

impl<'a, S: SiteStore, D: EmployeeDirectory> ApprovalService<'a, S, D> {
    pub(crate) fn new(cascade: &'a Cascade<S, D>) -> Self {
        Self { cascade }
    }

    pub fn start(&self, task_id: TaskId, actor: EmployeeId) -> Result<Task, Error> {
        let current = self.load(task_id)?;
        let next = self.commit(&current, current.start()?, TaskAction::Start)?;
        info!(task_id = %task_id, actor = %actor, "task started");
        Ok(next)
    }

    /// NotStarted/InProgress -> WaitingForApproval, then tell every admin.
    pub fn submit_for_approval(&self, task_id: TaskId, actor: EmployeeId) -> Result<Task, Error> {
        let current = self.load(task_id)?;
        let now = self.cascade.clock.now();
        let next = self.commit(&current, current.submit(actor, now)?, TaskAction::Submit)?;
        info!(task_id = %task_id, actor = %actor, "task submitted for approval");

        let message = format!("Task \"{}\" submitted for approval", next.name);
        if let Err(error) = self.cascade.dispatcher().notify_admins(
            next.site_id,
            next.phase_id,
            next.id,
            TASK_SUBMITTED,
            &message,
        ) {
            self.contain(&next, error);
        }
        Ok(next)
    }

    /// WaitingForApproval -> Completed, then evaluate the site's milestones.
    ///
    /// The task write is the result. Evaluation runs inline but is
    /// best-effort: whatever it hits is reported to the sink and `approve`
    /// still returns the completed task.
    pub fn approve(&self, task_id: TaskId, actor: EmployeeId) -> Result<Task, Error> {
        let current = self.load(task_id)?;
        let now = self.cascade.clock.now();
        let next = self.commit(&current, current.approve(actor, now)?, TaskAction::Approve)?;
        info!(task_id = %task_id, actor = %actor, site_id = %next.site_id, "task approved");

        self.cascade.evaluator().evaluate(next.site_id);
        Ok(next)
    }

    /// WaitingForApproval -> InProgress. A rejected task cannot complete a
    /// milestone, so no evaluation runs.
    pub fn reject(
        &self,
        task_id: TaskId,
        actor: EmployeeId,
        reason: Option<&str>,
    ) -> Result<Task, Error> {
        let current = self.load(task_id)?;
        let next = self.commit(&current, current.reject()?, TaskAction::Reject)?;
        info!(task_id = %task_id, actor = %actor, reason = reason.unwrap_or(""), "task rejected");

        if let Some(submitter) = current.completed_by {
            let message = match reason.map(str::trim).filter(|r| !r.is_empty()) {
                Some(r) => format!("Task \"{}\" was rejected: {}", next.name, r),
                None => format!("Task \"{}\" was rejected", next.name),
            };
            if let Err(error) = self.cascade.dispatcher().notify_employee(
                submitter,
                next.site_id,
                next.phase_id,
                next.id,
                TASK_REJECTED,
                &message,
            ) {
                self.contain(&next, error);
            }
        }
        Ok(next)
    }

    fn load(&self, task_id: TaskId) -> Result<Task, Error> {
        self.cascade
            .store
            .task(task_id)?
            .ok_or_else(|| Error::not_found("task", task_id.get()))
    }

    /// Guarded write. Losing the race means our read was stale, which the
    /// caller sees as an invalid transition from whatever is stored now.
    fn commit(&self, current: &Task, next: Task, action: TaskAction) -> Result<Task, Error> {
        if self.cascade.store.update_task_if(&next, current)? {
            return Ok(next);
        }
        let stored = self.load(current.id)?;
        Err(Error::InvalidTransition {
            task_id: current.id,
            from: stored.status,
            action,
        })
    }

    fn contain(&self, task: &Task, error: StoreError) {
        self.cascade.sink.report(&CascadeFailure {
            stage: CascadeStage::Notify,
            site_id: task.site_id,
            milestone_id: None,
            task_id: Some(task.id),
            error,
        });
    }
}
