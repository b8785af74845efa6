//! Wiring for the completion-and-approval cascade.
//!
//! `Cascade` owns the collaborators; the three components borrow it:
//! - `ApprovalService`: task state transitions
//! - `MilestoneEvaluator`: re-derives milestone completion for a site
//! - `Dispatcher`: notifications and system chat entries

use chrono_tz::Tz;
use std::sync::Arc;

use crate::approval::ApprovalService;
use crate::dispatch::Dispatcher;
use crate::evaluator::MilestoneEvaluator;
use crate::ids::EmployeeId;
use crate::ports::{EmployeeDirectory, SiteStore};
use crate::sink::{CascadeSink, TracingSink};
use crate::time::{Clock, SystemClock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeSettings {
    /// Sender of system-generated chat entries. Not a real employee.
    pub system_actor: EmployeeId,
    /// Zone in which completion dates are stamped and rendered.
    pub timezone: Tz,
}

/// System actor 0, dates in America/Chicago. Same as the CLI's default config.
impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            system_actor: EmployeeId(0),
            timezone: Tz::America__Chicago,
        }
    }
}

pub struct Cascade<S, D> {
    pub(crate) store: Arc<S>,
    pub(crate) directory: Arc<D>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sink: Arc<dyn CascadeSink>,
    pub(crate) settings: CascadeSettings,
}

impl<S, D> Clone for Cascade<S, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            directory: Arc::clone(&self.directory),
            clock: Arc::clone(&self.clock),
            sink: Arc::clone(&self.sink),
            settings: self.settings.clone(),
        }
    }
}

impl<S: SiteStore, D: EmployeeDirectory> Cascade<S, D> {
    pub fn new(store: Arc<S>, directory: Arc<D>, settings: CascadeSettings) -> Self {
        Self {
            store,
            directory,
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn CascadeSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &CascadeSettings {
        &self.settings
    }

    pub fn approvals(&self) -> ApprovalService<'_, S, D> {
        ApprovalService::new(self)
    }

    pub fn evaluator(&self) -> MilestoneEvaluator<'_, S, D> {
        MilestoneEvaluator::new(self)
    }

    pub fn dispatcher(&self) -> Dispatcher<'_, S, D> {
        Dispatcher::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timezone;

    #[test]
    fn test_default_settings() {
        let settings = CascadeSettings::default();
        assert_eq!(settings.system_actor, EmployeeId(0));
        assert_eq!(settings.timezone, parse_timezone("America/Chicago").unwrap());
    }
}
