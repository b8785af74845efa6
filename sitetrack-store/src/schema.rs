//! Schema bootstrap.
//!
//! The database uses SQLite's `user_version` pragma to track schema versions.
//! To change the schema, bump `SCHEMA_VERSION`, add `migrate_v{N}_to_v{N+1}`,
//! and call it from `run_migrations`.

use rusqlite::Connection;
use sitetrack_core::StoreError;
use tracing::info;

pub const SCHEMA_VERSION: i32 = 1;

pub(crate) fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    let current: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StoreError::backend("read user_version", e.to_string()))?;

    if current > SCHEMA_VERSION {
        return Err(StoreError::backend(
            "check schema version",
            format!(
                "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
            ),
        ));
    }

    if current < SCHEMA_VERSION {
        run_migrations(conn, current)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|e| StoreError::backend("write user_version", e.to_string()))?;
        info!(from = current, to = SCHEMA_VERSION, "migrated database schema");
    }
    Ok(())
}

fn run_migrations(conn: &Connection, from_version: i32) -> Result<(), StoreError> {
    if from_version < 1 {
        migrate_v0_to_v1(conn)?;
    }
    Ok(())
}

/// Initial schema. Status columns are free TEXT: rows written by older tools
/// use arbitrary casing, so every status comparison goes through `lower()`.
fn migrate_v0_to_v1(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sites (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS employees (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            role TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS milestones (
            id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL REFERENCES sites(id),
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'not_started',
            progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
            planned_start_date TEXT,
            planned_end_date TEXT,
            actual_completion_date TEXT,
            delay_reason TEXT
        );
        CREATE INDEX IF NOT EXISTS milestones_site ON milestones(site_id);

        CREATE TABLE IF NOT EXISTS phases (
            id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL REFERENCES sites(id),
            name TEXT NOT NULL,
            order_num INTEGER NOT NULL,
            milestone_id INTEGER REFERENCES milestones(id)
        );
        CREATE INDEX IF NOT EXISTS phases_milestone ON phases(milestone_id);

        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY,
            phase_id INTEGER NOT NULL REFERENCES phases(id),
            site_id INTEGER NOT NULL REFERENCES sites(id),
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'not_started',
            progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
            completed_by INTEGER,
            completed_at TEXT,
            approved_by INTEGER,
            approved_at TEXT
        );
        CREATE INDEX IF NOT EXISTS tasks_phase ON tasks(phase_id);

        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY,
            employee_id INTEGER NOT NULL,
            site_id INTEGER NOT NULL,
            phase_id INTEGER,
            task_id INTEGER,
            type TEXT NOT NULL,
            message TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS notifications_employee ON notifications(employee_id);

        CREATE TABLE IF NOT EXISTS stage_messages (
            id INTEGER PRIMARY KEY,
            phase_id INTEGER NOT NULL REFERENCES phases(id),
            sender_id INTEGER NOT NULL,
            content TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'text',
            created_at TEXT NOT NULL,
            achievement_for INTEGER REFERENCES milestones(id)
        );
        CREATE INDEX IF NOT EXISTS stage_messages_phase ON stage_messages(phase_id);
        CREATE UNIQUE INDEX IF NOT EXISTS stage_messages_one_achievement
            ON stage_messages(achievement_for) WHERE achievement_for IS NOT NULL;
        "#,
    )
    .map_err(|e| StoreError::backend("migrate v0 -> v1", e.to_string()))
}
