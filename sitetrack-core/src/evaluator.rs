//! Milestone completion evaluator.
//!
//! Re-derives, for every open milestone of a site, whether all tasks of its
//! linked phases are completed, and if so completes it through the store's
//! guarded `complete_milestone`. Safe to call redundantly and concurrently:
//! only the first caller to observe satisfaction writes anything.
//!
//! Nothing here is propagated. Failures go to the configured `CascadeSink`.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::cascade::Cascade;
use crate::error::StoreError;
use crate::ids::{MilestoneId, PhaseId, SiteId, StageMessageId};
use crate::milestone::{Milestone, achievement_text};
use crate::ports::{EmployeeDirectory, MilestoneCompletion, SiteStore};
use crate::sink::{CascadeFailure, CascadeStage};
use crate::time::local_date;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MilestoneOutcome {
    /// No phase links to the milestone; it can never auto-complete.
    NoLinkedPhases,
    Pending { incomplete: usize },
    Completed {
        last_phase: PhaseId,
        message_id: StageMessageId,
    },
    /// Satisfied, but another evaluation committed the transition first.
    AlreadyCompleted,
    Failed,
}

/// What one `evaluate` call did. Diagnostic only; it never carries an error
/// back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationReport {
    pub outcomes: Vec<(MilestoneId, MilestoneOutcome)>,
}

impl EvaluationReport {
    pub fn completed(&self) -> Vec<MilestoneId> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, MilestoneOutcome::Completed { .. }))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn outcome(&self, milestone: MilestoneId) -> Option<&MilestoneOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == milestone)
            .map(|(_, o)| o)
    }
}

pub struct MilestoneEvaluator<'a, S, D> {
    cascade: &'a Cascade<S, D>,
}

impl<'a, S: SiteStore, D: EmployeeDirectory> MilestoneEvaluator<'a, S, D> {
    pub(crate) fn new(cascade: &'a Cascade<S, D>) -> Self {
        Self { cascade }
    }

    pub fn evaluate(&self, site_id: SiteId) -> EvaluationReport {
        let mut report = EvaluationReport::default();

        let candidates = match self.cascade.store.open_milestones(site_id) {
            Ok(m) => m,
            Err(error) => {
                self.cascade.sink.report(&CascadeFailure {
                    stage: CascadeStage::LoadMilestones,
                    site_id,
                    milestone_id: None,
                    task_id: None,
                    error,
                });
                return report;
            }
        };
        if candidates.is_empty() {
            debug!(site_id = %site_id, "no open milestones");
            return report;
        }

        let now = self.cascade.clock.now();
        let today = local_date(now, self.cascade.settings.timezone);

        for milestone in &candidates {
            let outcome = match self.evaluate_milestone(milestone, today, now) {
                Ok(o) => o,
                Err(error) => {
                    self.cascade.sink.report(&CascadeFailure {
                        stage: CascadeStage::EvaluateMilestone,
                        site_id,
                        milestone_id: Some(milestone.id),
                        task_id: None,
                        error,
                    });
                    MilestoneOutcome::Failed
                }
            };
            report.outcomes.push((milestone.id, outcome));
        }
        report
    }

    fn evaluate_milestone(
        &self,
        milestone: &Milestone,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<MilestoneOutcome, StoreError> {
        let store = &self.cascade.store;

        let phases = store.phases_for_milestone(milestone.id)?;
        // Ordered highest order_num first.
        let Some(last_phase) = phases.first() else {
            warn!(
                site_id = %milestone.site_id,
                milestone_id = %milestone.id,
                "milestone has no linked phases; skipping"
            );
            return Ok(MilestoneOutcome::NoLinkedPhases);
        };

        let phase_ids: Vec<PhaseId> = phases.iter().map(|p| p.id).collect();
        let incomplete = store.count_incomplete_tasks(&phase_ids)?;
        if incomplete > 0 {
            return Ok(MilestoneOutcome::Pending { incomplete });
        }

        let mut achievement = self
            .cascade
            .dispatcher()
            .system_message(last_phase.id, achievement_text(&milestone.name, today));
        achievement.created_at = now;
        achievement.achievement_for = Some(milestone.id);

        let completion = MilestoneCompletion {
            milestone_id: milestone.id,
            linked_phases: phase_ids,
            completed_on: today,
            achievement,
        };

        match store.complete_milestone(&completion)? {
            Some(message) => {
                info!(
                    site_id = %milestone.site_id,
                    milestone_id = %milestone.id,
                    milestone = %milestone.name,
                    phase_id = %last_phase.id,
                    completed_on = %today,
                    "milestone completed"
                );
                Ok(MilestoneOutcome::Completed {
                    last_phase: last_phase.id,
                    message_id: message.id,
                })
            }
            None => {
                debug!(milestone_id = %milestone.id, "milestone completed by a concurrent evaluation");
                Ok(MilestoneOutcome::AlreadyCompleted)
            }
        }
    }
}
