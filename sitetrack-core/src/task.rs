//! Task model and the approval state machine.
//!
//! Transitions are pure: they take the current row and return the row to
//! write. Persisting it (guarded on the prior status) is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::ids::{EmployeeId, PhaseId, SiteId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    WaitingForApproval,
    Completed,
}

impl TaskStatus {
    /// Canonical storage spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::WaitingForApproval => "waiting_for_approval",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn is_completed(self) -> bool {
        self == TaskStatus::Completed
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTaskStatus(pub String);

impl fmt::Display for UnknownTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown task status '{}'", self.0)
    }
}

impl std::error::Error for UnknownTaskStatus {}

/// Legacy rows carry any casing and separator ("COMPLETED", "In Progress",
/// "waiting-for-approval"), so parsing folds both away.
impl FromStr for TaskStatus {
    type Err = UnknownTaskStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "notstarted" => Ok(TaskStatus::NotStarted),
            "inprogress" => Ok(TaskStatus::InProgress),
            "waitingforapproval" => Ok(TaskStatus::WaitingForApproval),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(UnknownTaskStatus(s.to_string())),
        }
    }
}

/// What a caller asked to do with a task. Carried in `InvalidTransition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Start,
    Submit,
    Approve,
    Reject,
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskAction::Start => "start",
            TaskAction::Submit => "submit for approval",
            TaskAction::Approve => "approve",
            TaskAction::Reject => "reject",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub phase_id: PhaseId,
    /// Denormalized from the owning phase.
    pub site_id: SiteId,
    pub name: String,
    pub status: TaskStatus,
    /// 0-100.
    pub progress: u8,
    pub completed_by: Option<EmployeeId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub approved_by: Option<EmployeeId>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: TaskId, phase_id: PhaseId, site_id: SiteId, name: impl Into<String>) -> Self {
        Self {
            id,
            phase_id,
            site_id,
            name: name.into(),
            status: TaskStatus::NotStarted,
            progress: 0,
            completed_by: None,
            completed_at: None,
            approved_by: None,
            approved_at: None,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = progress.min(100);
        self
    }

    fn refuse(&self, action: TaskAction) -> Error {
        Error::InvalidTransition {
            task_id: self.id,
            from: self.status,
            action,
        }
    }

    /// NotStarted -> InProgress.
    pub fn start(&self) -> Result<Task, Error> {
        match self.status {
            TaskStatus::NotStarted => Ok(Task {
                status: TaskStatus::InProgress,
                ..self.clone()
            }),
            _ => Err(self.refuse(TaskAction::Start)),
        }
    }

    /// {NotStarted, InProgress} -> WaitingForApproval, stamping the submitter.
    pub fn submit(&self, actor: EmployeeId, now: DateTime<Utc>) -> Result<Task, Error> {
        match self.status {
            TaskStatus::NotStarted | TaskStatus::InProgress => Ok(Task {
                status: TaskStatus::WaitingForApproval,
                progress: 100,
                completed_by: Some(actor),
                completed_at: Some(now),
                ..self.clone()
            }),
            _ => Err(self.refuse(TaskAction::Submit)),
        }
    }

    /// WaitingForApproval -> Completed, stamping the approver.
    pub fn approve(&self, actor: EmployeeId, now: DateTime<Utc>) -> Result<Task, Error> {
        match self.status {
            TaskStatus::WaitingForApproval => Ok(Task {
                status: TaskStatus::Completed,
                approved_by: Some(actor),
                approved_at: Some(now),
                ..self.clone()
            }),
            _ => Err(self.refuse(TaskAction::Approve)),
        }
    }

    /// WaitingForApproval -> InProgress, clearing the submission stamp.
    pub fn reject(&self) -> Result<Task, Error> {
        match self.status {
            TaskStatus::WaitingForApproval => Ok(Task {
                status: TaskStatus::InProgress,
                completed_by: None,
                completed_at: None,
                ..self.clone()
            }),
            _ => Err(self.refuse(TaskAction::Reject)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task() -> Task {
        Task::new(TaskId(1), PhaseId(10), SiteId(100), "Pour footings")
    }

    #[test]
    fn test_status_parse_is_case_and_separator_insensitive() {
        assert_eq!("COMPLETED".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
        assert_eq!("Completed".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
        assert_eq!("In Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!(
            "waiting-for-approval".parse::<TaskStatus>().unwrap(),
            TaskStatus::WaitingForApproval
        );
        assert_eq!("NotStarted".parse::<TaskStatus>().unwrap(), TaskStatus::NotStarted);
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_submit_stamps_and_fills_progress() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let t = task().with_progress(40).submit(EmployeeId(7), now).unwrap();
        assert_eq!(t.status, TaskStatus::WaitingForApproval);
        assert_eq!(t.progress, 100);
        assert_eq!(t.completed_by, Some(EmployeeId(7)));
        assert_eq!(t.completed_at, Some(now));
    }

    #[test]
    fn test_submit_refused_when_waiting_or_completed() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        for status in [TaskStatus::WaitingForApproval, TaskStatus::Completed] {
            let err = task().with_status(status).submit(EmployeeId(7), now).unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidTransition { from, action: TaskAction::Submit, .. } if from == status
            ));
        }
    }

    #[test]
    fn test_approve_and_reject_only_from_waiting() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        for status in [TaskStatus::NotStarted, TaskStatus::InProgress, TaskStatus::Completed] {
            assert!(task().with_status(status).approve(EmployeeId(1), now).is_err());
            assert!(task().with_status(status).reject().is_err());
        }

        let waiting = task().submit(EmployeeId(7), now).unwrap();
        let approved = waiting.approve(EmployeeId(1), now).unwrap();
        assert_eq!(approved.status, TaskStatus::Completed);
        assert_eq!(approved.approved_by, Some(EmployeeId(1)));
        assert_eq!(approved.completed_by, Some(EmployeeId(7)));

        let rejected = waiting.reject().unwrap();
        assert_eq!(rejected.status, TaskStatus::InProgress);
        assert_eq!(rejected.completed_by, None);
        assert_eq!(rejected.completed_at, None);
    }

    #[test]
    fn test_start_only_from_not_started() {
        assert_eq!(task().start().unwrap().status, TaskStatus::InProgress);
        assert!(task().with_status(TaskStatus::InProgress).start().is_err());
    }
}
