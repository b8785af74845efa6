//! Row <-> domain conversion.
//!
//! Rows are read into plain structs first; parsing into domain types happens
//! outside the rusqlite closure so a bad value becomes `StoreError::Corrupt`
//! naming the table instead of an opaque conversion failure.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use sitetrack_core::{
    Employee, EmployeeId, MessageKind, Milestone, MilestoneId, MilestoneStatus, Notification,
    NotificationId, Phase, PhaseId, Role, SiteId, StageMessage, StageMessageId, StoreError, Task,
    TaskId, TaskStatus,
};

pub(crate) fn db(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |e| StoreError::backend(operation, e.to_string())
}

pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn parse_ts(table: &'static str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt(table, format!("timestamp '{raw}': {e}")))
}

fn parse_date(table: &'static str, raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| StoreError::corrupt(table, format!("date '{raw}': {e}")))
}

fn percent(table: &'static str, raw: i64) -> Result<u8, StoreError> {
    u8::try_from(raw)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| StoreError::corrupt(table, format!("progress {raw} out of range")))
}

pub(crate) const TASK_COLUMNS: &str =
    "id, phase_id, site_id, name, status, progress, completed_by, completed_at, approved_by, approved_at";

pub(crate) struct TaskRow {
    id: i64,
    phase_id: i64,
    site_id: i64,
    name: String,
    status: String,
    progress: i64,
    completed_by: Option<i64>,
    completed_at: Option<String>,
    approved_by: Option<i64>,
    approved_at: Option<String>,
}

impl TaskRow {
    pub(crate) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            phase_id: row.get(1)?,
            site_id: row.get(2)?,
            name: row.get(3)?,
            status: row.get(4)?,
            progress: row.get(5)?,
            completed_by: row.get(6)?,
            completed_at: row.get(7)?,
            approved_by: row.get(8)?,
            approved_at: row.get(9)?,
        })
    }

    pub(crate) fn into_task(self) -> Result<Task, StoreError> {
        let status = self
            .status
            .parse::<TaskStatus>()
            .map_err(|e| StoreError::corrupt("tasks", e.to_string()))?;
        Ok(Task {
            id: TaskId(self.id),
            phase_id: PhaseId(self.phase_id),
            site_id: SiteId(self.site_id),
            name: self.name,
            status,
            progress: percent("tasks", self.progress)?,
            completed_by: self.completed_by.map(EmployeeId),
            completed_at: self
                .completed_at
                .as_deref()
                .map(|s| parse_ts("tasks", s))
                .transpose()?,
            approved_by: self.approved_by.map(EmployeeId),
            approved_at: self
                .approved_at
                .as_deref()
                .map(|s| parse_ts("tasks", s))
                .transpose()?,
        })
    }
}

pub(crate) const PHASE_COLUMNS: &str = "id, site_id, name, order_num, milestone_id";

pub(crate) fn read_phase(row: &Row<'_>) -> rusqlite::Result<Phase> {
    Ok(Phase {
        id: PhaseId(row.get(0)?),
        site_id: SiteId(row.get(1)?),
        name: row.get(2)?,
        order_num: row.get(3)?,
        milestone_id: row.get::<_, Option<i64>>(4)?.map(MilestoneId),
    })
}

pub(crate) const MILESTONE_COLUMNS: &str = "id, site_id, name, status, progress, planned_start_date, planned_end_date, actual_completion_date, delay_reason";

pub(crate) struct MilestoneRow {
    id: i64,
    site_id: i64,
    name: String,
    status: String,
    progress: i64,
    planned_start_date: Option<String>,
    planned_end_date: Option<String>,
    actual_completion_date: Option<String>,
    delay_reason: Option<String>,
}

impl MilestoneRow {
    pub(crate) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            site_id: row.get(1)?,
            name: row.get(2)?,
            status: row.get(3)?,
            progress: row.get(4)?,
            planned_start_date: row.get(5)?,
            planned_end_date: row.get(6)?,
            actual_completion_date: row.get(7)?,
            delay_reason: row.get(8)?,
        })
    }

    pub(crate) fn into_milestone(self) -> Result<Milestone, StoreError> {
        let opt_date = |raw: Option<String>| -> Result<Option<NaiveDate>, StoreError> {
            raw.as_deref().map(|s| parse_date("milestones", s)).transpose()
        };
        Ok(Milestone {
            id: MilestoneId(self.id),
            site_id: SiteId(self.site_id),
            name: self.name,
            status: self
                .status
                .parse::<MilestoneStatus>()
                .map_err(|e| StoreError::corrupt("milestones", e))?,
            progress: percent("milestones", self.progress)?,
            planned_start_date: opt_date(self.planned_start_date)?,
            planned_end_date: opt_date(self.planned_end_date)?,
            actual_completion_date: opt_date(self.actual_completion_date)?,
            delay_reason: self.delay_reason,
        })
    }
}

pub(crate) fn read_employee(row: &Row<'_>) -> rusqlite::Result<Employee> {
    let role: String = row.get(2)?;
    Ok(Employee {
        id: EmployeeId(row.get(0)?),
        name: row.get(1)?,
        role: Role::parse(&role),
    })
}

pub(crate) const NOTIFICATION_COLUMNS: &str =
    "id, employee_id, site_id, phase_id, task_id, type, message, is_read, created_at";

pub(crate) struct NotificationRow {
    id: i64,
    employee_id: i64,
    site_id: i64,
    phase_id: Option<i64>,
    task_id: Option<i64>,
    kind: String,
    message: String,
    is_read: bool,
    created_at: String,
}

impl NotificationRow {
    pub(crate) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            employee_id: row.get(1)?,
            site_id: row.get(2)?,
            phase_id: row.get(3)?,
            task_id: row.get(4)?,
            kind: row.get(5)?,
            message: row.get(6)?,
            is_read: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub(crate) fn into_notification(self) -> Result<Notification, StoreError> {
        Ok(Notification {
            id: NotificationId(self.id),
            employee_id: EmployeeId(self.employee_id),
            site_id: SiteId(self.site_id),
            phase_id: self.phase_id.map(PhaseId),
            task_id: self.task_id.map(TaskId),
            kind: self.kind,
            message: self.message,
            is_read: self.is_read,
            created_at: parse_ts("notifications", &self.created_at)?,
        })
    }
}

pub(crate) const STAGE_MESSAGE_COLUMNS: &str =
    "id, phase_id, sender_id, content, type, created_at, achievement_for";

pub(crate) struct StageMessageRow {
    id: i64,
    phase_id: i64,
    sender_id: i64,
    content: String,
    kind: String,
    created_at: String,
    achievement_for: Option<i64>,
}

impl StageMessageRow {
    pub(crate) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            phase_id: row.get(1)?,
            sender_id: row.get(2)?,
            content: row.get(3)?,
            kind: row.get(4)?,
            created_at: row.get(5)?,
            achievement_for: row.get(6)?,
        })
    }

    pub(crate) fn into_message(self) -> Result<StageMessage, StoreError> {
        Ok(StageMessage {
            id: StageMessageId(self.id),
            phase_id: PhaseId(self.phase_id),
            sender_id: EmployeeId(self.sender_id),
            content: self.content,
            kind: MessageKind::parse(&self.kind),
            created_at: parse_ts("stage_messages", &self.created_at)?,
            achievement_for: self.achievement_for.map(MilestoneId),
        })
    }
}
