//! SQLite-backed `SiteStore` and `EmployeeDirectory`.
//!
//! Uses a `Mutex<Connection>` because `rusqlite::Connection` is not `Sync`.
//! Several `SqliteStore`s (or processes) may open the same file; the guarded
//! writes run in `BEGIN IMMEDIATE` transactions so they serialize on SQLite's
//! write lock rather than on our mutex.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use sitetrack_core::{
    Employee, EmployeeDirectory, EmployeeId, Error, Milestone, MilestoneCompletion, MilestoneId,
    MilestoneStatus, NewNotification, NewStageMessage, Notification, NotificationId, Phase,
    PhaseId, Role, Site, SiteId, SiteStore, StageMessage, StageMessageId, StoreError, Task, TaskId,
    TaskStatus,
};
use tracing::{debug, warn};

use crate::rows::{
    MILESTONE_COLUMNS, MilestoneRow, NOTIFICATION_COLUMNS, NotificationRow, PHASE_COLUMNS,
    STAGE_MESSAGE_COLUMNS, StageMessageRow, TASK_COLUMNS, TaskRow, date, db, read_employee,
    read_phase, ts,
};
use crate::schema::init_schema;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path` and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::backend("create database directory", format!("{}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(db("open database"))?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(db("set journal_mode"))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            warn!(path = %path.display(), journal_mode, "WAL unavailable; concurrent readers will block");
        }
        Self::configure(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db("open in-memory database"))?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(db("set busy_timeout"))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(db("enable foreign keys"))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn add_site(&self, name: &str) -> Result<Site, StoreError> {
        let conn = self.lock()?;
        conn.execute("INSERT INTO sites (name) VALUES (?1)", params![name])
            .map_err(db("insert site"))?;
        Ok(Site {
            id: SiteId(conn.last_insert_rowid()),
            name: name.to_string(),
        })
    }

    pub fn add_employee(&self, name: &str, role: &Role) -> Result<Employee, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO employees (name, role) VALUES (?1, ?2)",
            params![name, role.as_str()],
        )
        .map_err(db("insert employee"))?;
        Ok(Employee {
            id: EmployeeId(conn.last_insert_rowid()),
            name: name.to_string(),
            role: role.clone(),
        })
    }

    pub fn employees(&self) -> Result<Vec<Employee>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, name, role FROM employees ORDER BY id")
            .map_err(db("list employees"))?;
        let rows = stmt
            .query_map([], read_employee)
            .map_err(db("list employees"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db("list employees"))?;
        Ok(rows)
    }

    pub fn add_milestone(
        &self,
        site_id: SiteId,
        name: &str,
        planned_start: Option<NaiveDate>,
        planned_end: Option<NaiveDate>,
    ) -> Result<Milestone, Error> {
        let conn = self.lock()?;
        Self::require_site(&conn, site_id)?;
        conn.execute(
            "INSERT INTO milestones (site_id, name, status, planned_start_date, planned_end_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                site_id.get(),
                name,
                MilestoneStatus::NotStarted.as_str(),
                planned_start.map(date),
                planned_end.map(date),
            ],
        )
        .map_err(db("insert milestone"))?;
        Ok(
            Milestone::new(MilestoneId(conn.last_insert_rowid()), site_id, name)
                .with_plan(planned_start, planned_end),
        )
    }

    /// A linked milestone must belong to the same site as the phase.
    pub fn add_phase(
        &self,
        site_id: SiteId,
        name: &str,
        order_num: i32,
        milestone_id: Option<MilestoneId>,
    ) -> Result<Phase, Error> {
        let conn = self.lock()?;
        Self::require_site(&conn, site_id)?;
        if let Some(m) = milestone_id {
            let owner: Option<i64> = conn
                .query_row(
                    "SELECT site_id FROM milestones WHERE id = ?1",
                    params![m.get()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db("load milestone"))?;
            if owner != Some(site_id.get()) {
                return Err(Error::not_found("milestone", m.get()));
            }
        }
        conn.execute(
            "INSERT INTO phases (site_id, name, order_num, milestone_id) VALUES (?1, ?2, ?3, ?4)",
            params![site_id.get(), name, order_num, milestone_id.map(|m| m.get())],
        )
        .map_err(db("insert phase"))?;
        Ok(Phase {
            id: PhaseId(conn.last_insert_rowid()),
            site_id,
            name: name.to_string(),
            order_num,
            milestone_id,
        })
    }

    pub fn add_task(&self, phase_id: PhaseId, name: &str) -> Result<Task, Error> {
        let conn = self.lock()?;
        let site_id: i64 = conn
            .query_row(
                "SELECT site_id FROM phases WHERE id = ?1",
                params![phase_id.get()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db("load phase"))?
            .ok_or_else(|| Error::not_found("phase", phase_id.get()))?;
        conn.execute(
            "INSERT INTO tasks (phase_id, site_id, name, status, progress) VALUES (?1, ?2, ?3, ?4, 0)",
            params![phase_id.get(), site_id, name, TaskStatus::NotStarted.as_str()],
        )
        .map_err(db("insert task"))?;
        Ok(Task::new(
            TaskId(conn.last_insert_rowid()),
            phase_id,
            SiteId(site_id),
            name,
        ))
    }

    pub fn phase(&self, id: PhaseId) -> Result<Option<Phase>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {PHASE_COLUMNS} FROM phases WHERE id = ?1"),
            params![id.get()],
            read_phase,
        )
        .optional()
        .map_err(db("load phase"))
    }

    pub fn milestone(&self, id: MilestoneId) -> Result<Option<Milestone>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {MILESTONE_COLUMNS} FROM milestones WHERE id = ?1"),
            params![id.get()],
            MilestoneRow::read,
        )
        .optional()
        .map_err(db("load milestone"))?
        .map(MilestoneRow::into_milestone)
        .transpose()
    }

    /// Display-only. Auto-completion never reads this value.
    pub fn set_milestone_progress(&self, id: MilestoneId, progress: u8) -> Result<(), Error> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE milestones SET progress = ?2 WHERE id = ?1",
                params![id.get(), progress.min(100)],
            )
            .map_err(db("update milestone progress"))?;
        if changed == 0 {
            return Err(Error::not_found("milestone", id.get()));
        }
        Ok(())
    }

    /// Move a milestone to Delayed with a reason. Returns false when its
    /// current status does not allow it (Completed is terminal).
    pub fn delay_milestone(&self, id: MilestoneId, reason: &str) -> Result<bool, Error> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db("begin delay"))?;
        let raw: String = tx
            .query_row(
                "SELECT status FROM milestones WHERE id = ?1",
                params![id.get()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db("load milestone"))?
            .ok_or_else(|| Error::not_found("milestone", id.get()))?;
        let current = raw
            .parse::<MilestoneStatus>()
            .map_err(|e| StoreError::corrupt("milestones", e))?;
        if !current.can_transition_to(MilestoneStatus::Delayed) {
            return Ok(false);
        }
        tx.execute(
            "UPDATE milestones SET status = ?2, delay_reason = ?3 WHERE id = ?1",
            params![id.get(), MilestoneStatus::Delayed.as_str(), reason],
        )
        .map_err(db("delay milestone"))?;
        tx.commit().map_err(db("commit delay"))?;
        Ok(true)
    }

    pub fn stage_messages(&self, phase_id: PhaseId) -> Result<Vec<StageMessage>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {STAGE_MESSAGE_COLUMNS} FROM stage_messages WHERE phase_id = ?1 ORDER BY id"
            ))
            .map_err(db("list stage messages"))?;
        let rows = stmt
            .query_map(params![phase_id.get()], StageMessageRow::read)
            .map_err(db("list stage messages"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db("list stage messages"))?;
        rows.into_iter().map(StageMessageRow::into_message).collect()
    }

    /// All notifications, or only those addressed to `employee`.
    pub fn notifications(
        &self,
        employee: Option<EmployeeId>,
    ) -> Result<Vec<Notification>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE ?1 IS NULL OR employee_id = ?1 ORDER BY id"
            ))
            .map_err(db("list notifications"))?;
        let rows = stmt
            .query_map(params![employee.map(|e| e.get())], NotificationRow::read)
            .map_err(db("list notifications"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db("list notifications"))?;
        rows.into_iter()
            .map(NotificationRow::into_notification)
            .collect()
    }

    fn require_site(conn: &Connection, site_id: SiteId) -> Result<(), Error> {
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM sites WHERE id = ?1",
                params![site_id.get()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db("load site"))?;
        exists
            .map(|_| ())
            .ok_or_else(|| Error::not_found("site", site_id.get()))
    }

    fn placeholders(n: usize) -> String {
        vec!["?"; n].join(", ")
    }

    fn count_where(
        conn: &Connection,
        phases: &[PhaseId],
        extra: &str,
    ) -> Result<usize, StoreError> {
        if phases.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM tasks WHERE phase_id IN ({}){extra}",
            Self::placeholders(phases.len())
        );
        let n: i64 = conn
            .query_row(&sql, params_from_iter(phases.iter().map(|p| p.get())), |row| {
                row.get(0)
            })
            .map_err(db("count tasks"))?;
        Ok(n as usize)
    }

    fn insert_message(conn: &Connection, m: &NewStageMessage) -> Result<StageMessage, StoreError> {
        conn.execute(
            "INSERT INTO stage_messages (phase_id, sender_id, content, type, created_at, achievement_for)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                m.phase_id.get(),
                m.sender_id.get(),
                m.content,
                m.kind.as_str(),
                ts(m.created_at),
                m.achievement_for.map(|id| id.get()),
            ],
        )
        .map_err(db("insert stage message"))?;
        Ok(StageMessage::from_new(
            StageMessageId(conn.last_insert_rowid()),
            m,
        ))
    }
}

/// Status with case, spaces, `_` and `-` folded away, matching how
/// `TaskStatus` and `MilestoneStatus` parse stored values.
macro_rules! folded_status {
    () => {
        "lower(replace(replace(replace(status, ' ', ''), '_', ''), '-', ''))"
    };
}

const NOT_COMPLETED: &str = concat!(" AND ", folded_status!(), " <> 'completed'");

impl SiteStore for SqliteStore {
    fn task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id.get()],
            TaskRow::read,
        )
        .optional()
        .map_err(db("load task"))?
        .map(TaskRow::into_task)
        .transpose()
    }

    fn update_task_if(&self, task: &Task, expected: &Task) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        // Legacy rows may spell status and timestamp differently from what we
        // write, so both are compared by value rather than by text.
        let changed = conn
            .execute(
                concat!(
                    "UPDATE tasks
                     SET status = ?2, progress = ?3, completed_by = ?4, completed_at = ?5,
                         approved_by = ?6, approved_at = ?7
                     WHERE id = ?1
                       AND ",
                    folded_status!(),
                    " = ?8
                       AND (completed_at IS ?9 OR julianday(completed_at) = julianday(?9))"
                ),
                params![
                    task.id.get(),
                    task.status.as_str(),
                    task.progress,
                    task.completed_by.map(|e| e.get()),
                    task.completed_at.map(ts),
                    task.approved_by.map(|e| e.get()),
                    task.approved_at.map(ts),
                    expected.status.as_str().replace('_', ""),
                    expected.completed_at.map(ts),
                ],
            )
            .map_err(db("update task"))?;
        Ok(changed == 1)
    }

    fn milestones(&self, site: SiteId) -> Result<Vec<Milestone>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MILESTONE_COLUMNS} FROM milestones WHERE site_id = ?1 ORDER BY id"
            ))
            .map_err(db("list milestones"))?;
        let rows = stmt
            .query_map(params![site.get()], MilestoneRow::read)
            .map_err(db("list milestones"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db("list milestones"))?;
        rows.into_iter().map(MilestoneRow::into_milestone).collect()
    }

    fn open_milestones(&self, site: SiteId) -> Result<Vec<Milestone>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MILESTONE_COLUMNS} FROM milestones
                 WHERE site_id = ?1{NOT_COMPLETED} ORDER BY id"
            ))
            .map_err(db("list open milestones"))?;
        let rows = stmt
            .query_map(params![site.get()], MilestoneRow::read)
            .map_err(db("list open milestones"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db("list open milestones"))?;
        rows.into_iter().map(MilestoneRow::into_milestone).collect()
    }

    fn phases_for_milestone(&self, milestone: MilestoneId) -> Result<Vec<Phase>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PHASE_COLUMNS} FROM phases WHERE milestone_id = ?1
                 ORDER BY order_num DESC, id DESC"
            ))
            .map_err(db("list milestone phases"))?;
        let rows = stmt
            .query_map(params![milestone.get()], read_phase)
            .map_err(db("list milestone phases"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db("list milestone phases"))?;
        Ok(rows)
    }

    fn count_tasks(&self, phases: &[PhaseId]) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        Self::count_where(&conn, phases, "")
    }

    fn count_incomplete_tasks(&self, phases: &[PhaseId]) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        Self::count_where(&conn, phases, NOT_COMPLETED)
    }

    fn complete_milestone(
        &self,
        completion: &MilestoneCompletion,
    ) -> Result<Option<StageMessage>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db("begin milestone completion"))?;

        // Re-check inside the write lock; the caller's count may be stale.
        if Self::count_where(&tx, &completion.linked_phases, NOT_COMPLETED)? > 0 {
            debug!(milestone_id = %completion.milestone_id, "tasks reopened before completion");
            return Ok(None);
        }

        let changed = tx
            .execute(
                &format!(
                    "UPDATE milestones
                     SET status = ?2,
                         actual_completion_date = COALESCE(actual_completion_date, ?3)
                     WHERE id = ?1{NOT_COMPLETED}"
                ),
                params![
                    completion.milestone_id.get(),
                    MilestoneStatus::Completed.as_str(),
                    date(completion.completed_on),
                ],
            )
            .map_err(db("complete milestone"))?;
        if changed == 0 {
            return Ok(None);
        }

        let message = Self::insert_message(&tx, &completion.achievement)?;
        tx.commit().map_err(db("commit milestone completion"))?;
        Ok(Some(message))
    }

    fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notifications (employee_id, site_id, phase_id, task_id, type, message, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![
                notification.employee_id.get(),
                notification.site_id.get(),
                notification.phase_id.map(|p| p.get()),
                notification.task_id.map(|t| t.get()),
                notification.kind,
                notification.message,
                ts(notification.created_at),
            ],
        )
        .map_err(db("insert notification"))?;
        Ok(Notification::from_new(
            NotificationId(conn.last_insert_rowid()),
            notification,
        ))
    }

    fn insert_stage_message(&self, message: &NewStageMessage) -> Result<StageMessage, StoreError> {
        let conn = self.lock()?;
        Self::insert_message(&conn, message)
    }
}

impl EmployeeDirectory for SqliteStore {
    fn admins(&self) -> Result<Vec<Employee>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, role FROM employees
                 WHERE lower(trim(role)) IN ('admin', 'administrator') ORDER BY id",
            )
            .map_err(db("list admins"))?;
        let rows = stmt
            .query_map([], read_employee)
            .map_err(db("list admins"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db("list admins"))?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sitetrack_core::MessageKind;

    fn seeded() -> (SqliteStore, SiteId, MilestoneId, PhaseId, Task, Task) {
        let store = SqliteStore::open_in_memory().unwrap();
        let site = store.add_site("Dockside").unwrap();
        let m = store.add_milestone(site.id, "Podium", None, None).unwrap();
        let p1 = store.add_phase(site.id, "Piles", 1, Some(m.id)).unwrap();
        let p2 = store.add_phase(site.id, "Slab", 2, Some(m.id)).unwrap();
        let t1 = store.add_task(p1.id, "Drive piles").unwrap();
        let t2 = store.add_task(p2.id, "Pour slab").unwrap();
        (store, site.id, m.id, p2.id, t1, t2)
    }

    fn raw_status(store: &SqliteStore, task: TaskId, status: &str) {
        store
            .lock()
            .unwrap()
            .execute(
                "UPDATE tasks SET status = ?2 WHERE id = ?1",
                params![task.get(), status],
            )
            .unwrap();
    }

    fn completion(m: MilestoneId, phases: Vec<PhaseId>, last: PhaseId) -> MilestoneCompletion {
        MilestoneCompletion {
            milestone_id: m,
            linked_phases: phases,
            completed_on: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            achievement: NewStageMessage {
                phase_id: last,
                sender_id: EmployeeId(0),
                content: "🏆 Achievement Unlocked: Podium completed on October 19, 2026!".into(),
                kind: MessageKind::System,
                created_at: Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
                achievement_for: Some(m),
            },
        }
    }

    #[test]
    fn test_phases_for_milestone_highest_order_first() {
        let (store, _, m, last, _, _) = seeded();
        let phases = store.phases_for_milestone(m).unwrap();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].id, last);
        assert!(phases[0].order_num > phases[1].order_num);
    }

    #[test]
    fn test_incomplete_count_folds_case() {
        let (store, _, m, _, t1, t2) = seeded();
        let phases: Vec<_> = store
            .phases_for_milestone(m)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(store.count_incomplete_tasks(&phases).unwrap(), 2);

        raw_status(&store, t1.id, "COMPLETED");
        raw_status(&store, t2.id, "Completed");
        assert_eq!(store.count_incomplete_tasks(&phases).unwrap(), 0);
        assert_eq!(store.count_tasks(&phases).unwrap(), 2);
        assert_eq!(
            store.task(t1.id).unwrap().unwrap().status,
            TaskStatus::Completed
        );
    }

    #[test]
    fn test_complete_milestone_guarded() {
        let (store, _, m, last, t1, t2) = seeded();
        let phases: Vec<_> = store
            .phases_for_milestone(m)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        let c = completion(m, phases, last);

        // Still incomplete: nothing written.
        assert!(store.complete_milestone(&c).unwrap().is_none());

        raw_status(&store, t1.id, "completed");
        raw_status(&store, t2.id, "completed");
        let msg = store.complete_milestone(&c).unwrap().unwrap();
        assert_eq!(msg.achievement_for, Some(m));
        assert!(store.complete_milestone(&c).unwrap().is_none());

        let stored = store.milestone(m).unwrap().unwrap();
        assert_eq!(stored.status, MilestoneStatus::Completed);
        assert_eq!(stored.actual_completion_date, NaiveDate::from_ymd_opt(2026, 10, 19));
        assert_eq!(store.stage_messages(last).unwrap().len(), 1);
        assert!(store.open_milestones(stored.site_id).unwrap().is_empty());
    }

    #[test]
    fn test_unique_achievement_index() {
        let (store, _, m, last, _, _) = seeded();
        let c = completion(m, vec![], last);
        store.insert_stage_message(&c.achievement).unwrap();
        assert!(store.insert_stage_message(&c.achievement).is_err());
    }

    #[test]
    fn test_update_task_if_matches_legacy_casing() {
        let (store, _, _, _, t1, _) = seeded();
        raw_status(&store, t1.id, "In Progress");
        let current = store.task(t1.id).unwrap().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let next = current.submit(EmployeeId(3), now).unwrap();
        assert!(store.update_task_if(&next, &current).unwrap());
        assert!(!store.update_task_if(&next, &current).unwrap());
        assert_eq!(store.task(t1.id).unwrap().unwrap(), next);
    }

    fn raw_submission(store: &SqliteStore, task: TaskId, status: &str, completed_at: &str) {
        store
            .lock()
            .unwrap()
            .execute(
                "UPDATE tasks SET status = ?2, progress = 100, completed_by = 3, completed_at = ?3
                 WHERE id = ?1",
                params![task.get(), status, completed_at],
            )
            .unwrap();
    }

    #[test]
    fn test_update_task_if_matches_other_timestamp_spellings() {
        let (store, _, _, _, t1, t2) = seeded();
        raw_submission(&store, t1.id, "WaitingForApproval", "2026-10-19T08:00:00+00:00");
        raw_submission(&store, t2.id, "waiting for approval", "2026-10-19T03:00:00.000-05:00");
        let approved_at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();

        for id in [t1.id, t2.id] {
            let current = store.task(id).unwrap().unwrap();
            assert_eq!(current.status, TaskStatus::WaitingForApproval);
            assert_eq!(
                current.completed_at,
                Some(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap())
            );
            let next = current.approve(EmployeeId(9), approved_at).unwrap();
            assert!(store.update_task_if(&next, &current).unwrap());
            assert_eq!(store.task(id).unwrap().unwrap().status, TaskStatus::Completed);
        }
    }

    #[test]
    fn test_update_task_if_rejects_different_submission() {
        let (store, _, _, _, t1, _) = seeded();
        raw_submission(&store, t1.id, "waiting_for_approval", "2026-10-19T08:00:00+00:00");
        let mut stale = store.task(t1.id).unwrap().unwrap();
        stale.completed_at = Some(Utc.with_ymd_and_hms(2026, 10, 19, 7, 0, 0).unwrap());
        let next = stale
            .approve(EmployeeId(9), Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap())
            .unwrap();
        assert!(!store.update_task_if(&next, &stale).unwrap());
        assert_eq!(
            store.task(t1.id).unwrap().unwrap().status,
            TaskStatus::WaitingForApproval
        );
    }

    #[test]
    fn test_padded_completed_status_counts_as_done() {
        let (store, site, m, last, t1, t2) = seeded();
        raw_status(&store, t1.id, "Completed ");
        raw_status(&store, t2.id, "COMPLETED");
        let phases: Vec<_> = store
            .phases_for_milestone(m)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(store.task(t1.id).unwrap().unwrap().status, TaskStatus::Completed);
        assert_eq!(store.count_incomplete_tasks(&phases).unwrap(), 0);
        assert!(store.complete_milestone(&completion(m, phases, last)).unwrap().is_some());

        store
            .lock()
            .unwrap()
            .execute(
                "UPDATE milestones SET status = ' Completed' WHERE id = ?1",
                params![m.get()],
            )
            .unwrap();
        assert!(store.open_milestones(site).unwrap().is_empty());
    }

    #[test]
    fn test_admins_by_role() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.add_employee("Ana", &Role::Admin).unwrap();
        store.add_employee("Bo", &Role::Worker).unwrap();
        store
            .add_employee("Cy", &Role::Other("Site Engineer".into()))
            .unwrap();
        let admins = store.admins().unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].id, a.id);
    }

    #[test]
    fn test_delay_refused_after_completion() {
        let (store, _, m, last, t1, t2) = seeded();
        assert!(store.delay_milestone(m, "rain").unwrap());
        assert_eq!(
            store.milestone(m).unwrap().unwrap().delay_reason.as_deref(),
            Some("rain")
        );

        raw_status(&store, t1.id, "completed");
        raw_status(&store, t2.id, "completed");
        let phases: Vec<_> = store
            .phases_for_milestone(m)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        store.complete_milestone(&completion(m, phases, last)).unwrap();
        assert!(!store.delay_milestone(m, "late paperwork").unwrap());
        assert_eq!(
            store.milestone(m).unwrap().unwrap().status,
            MilestoneStatus::Completed
        );
    }

    #[test]
    fn test_add_phase_rejects_foreign_milestone() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.add_site("A").unwrap();
        let b = store.add_site("B").unwrap();
        let m = store.add_milestone(a.id, "Roof", None, None).unwrap();
        let err = store.add_phase(b.id, "Trusses", 1, Some(m.id)).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "milestone", .. }));
    }
}
