//! Error taxonomy shared by the cascade and its store adapters.

use thiserror::Error;

use crate::ids::TaskId;
use crate::task::{TaskAction, TaskStatus};

/// Failure surfaced to callers of the transition operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("cannot {action} task {task_id}: it is {from}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        action: TaskAction,
    },

    #[error("dependency failure: {0}")]
    DependencyFailure(#[from] StoreError),
}

impl Error {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Error::NotFound { entity, id }
    }
}

/// Failure inside a persistence or directory adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    #[error("unreadable {table} row: {message}")]
    Corrupt {
        table: &'static str,
        message: String,
    },

    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        StoreError::Backend {
            operation,
            message: message.into(),
        }
    }

    pub fn corrupt(table: &'static str, message: impl Into<String>) -> Self {
        StoreError::Corrupt {
            table,
            message: message.into(),
        }
    }
}
