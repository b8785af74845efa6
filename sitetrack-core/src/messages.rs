//! Append-only records produced by the cascade: admin notifications and
//! phase chat entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{EmployeeId, MilestoneId, NotificationId, PhaseId, SiteId, StageMessageId, TaskId};

pub const TASK_SUBMITTED: &str = "TASK_SUBMITTED";
pub const TASK_REJECTED: &str = "TASK_REJECTED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub employee_id: EmployeeId,
    pub site_id: SiteId,
    pub phase_id: Option<PhaseId>,
    pub task_id: Option<TaskId>,
    /// Free-form tag such as `TASK_SUBMITTED`.
    pub kind: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub employee_id: EmployeeId,
    pub site_id: SiteId,
    pub phase_id: Option<PhaseId>,
    pub task_id: Option<TaskId>,
    pub kind: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn from_new(id: NotificationId, n: &NewNotification) -> Self {
        Self {
            id,
            employee_id: n.employee_id,
            site_id: n.site_id,
            phase_id: n.phase_id,
            task_id: n.task_id,
            kind: n.kind.clone(),
            message: n.message.clone(),
            is_read: false,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    System,
    /// Attachments and other kinds written by the chat surface.
    Other(String),
}

impl MessageKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "text" => MessageKind::Text,
            "system" => MessageKind::System,
            _ => MessageKind::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Text => "text",
            MessageKind::System => "system",
            MessageKind::Other(s) => s,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStageMessage {
    pub phase_id: PhaseId,
    pub sender_id: EmployeeId,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    /// Set on achievement messages; stores admit at most one per milestone.
    pub achievement_for: Option<MilestoneId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMessage {
    pub id: StageMessageId,
    pub phase_id: PhaseId,
    pub sender_id: EmployeeId,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    pub achievement_for: Option<MilestoneId>,
}

impl StageMessage {
    pub fn from_new(id: StageMessageId, m: &NewStageMessage) -> Self {
        Self {
            id,
            phase_id: m.phase_id,
            sender_id: m.sender_id,
            content: m.content.clone(),
            kind: m.kind.clone(),
            created_at: m.created_at,
            achievement_for: m.achievement_for,
        }
    }
}
