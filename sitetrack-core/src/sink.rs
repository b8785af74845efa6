//! Where contained cascade failures go.
//!
//! Evaluation and dispatch never fail the operation that triggered them; their
//! errors are handed to a `CascadeSink` instead so they stay diagnosable.

use std::fmt;
use std::sync::Mutex;

use tracing::error;

use crate::error::StoreError;
use crate::ids::{MilestoneId, SiteId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStage {
    /// Fetching the open milestones of a site.
    LoadMilestones,
    /// Checking or completing a single milestone.
    EvaluateMilestone,
    /// Writing notifications after a task transition.
    Notify,
}

impl fmt::Display for CascadeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CascadeStage::LoadMilestones => "load_milestones",
            CascadeStage::EvaluateMilestone => "evaluate_milestone",
            CascadeStage::Notify => "notify",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeFailure {
    pub stage: CascadeStage,
    pub site_id: SiteId,
    pub milestone_id: Option<MilestoneId>,
    pub task_id: Option<TaskId>,
    pub error: StoreError,
}

pub trait CascadeSink: Send + Sync {
    fn report(&self, failure: &CascadeFailure);
}

/// Default sink: one structured `error!` event per failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl CascadeSink for TracingSink {
    fn report(&self, failure: &CascadeFailure) {
        error!(
            stage = %failure.stage,
            site_id = %failure.site_id,
            milestone_id = ?failure.milestone_id.map(|m| m.get()),
            task_id = ?failure.task_id.map(|t| t.get()),
            error = %failure.error,
            "cascade side effect failed; triggering operation unaffected"
        );
    }
}

/// Keeps every report in memory, then forwards to tracing.
#[derive(Debug, Default)]
pub struct RecordingSink {
    failures: Mutex<Vec<CascadeFailure>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<CascadeFailure> {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl CascadeSink for RecordingSink {
    fn report(&self, failure: &CascadeFailure) {
        TracingSink.report(failure);
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(failure.clone());
    }
}
