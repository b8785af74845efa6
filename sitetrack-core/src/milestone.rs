//! Milestones: named achievements spanning one or more phases of a site.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::{MilestoneId, SiteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    NotStarted,
    InProgress,
    Delayed,
    Completed,
}

impl MilestoneStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MilestoneStatus::NotStarted => "not_started",
            MilestoneStatus::InProgress => "in_progress",
            MilestoneStatus::Delayed => "delayed",
            MilestoneStatus::Completed => "completed",
        }
    }

    fn rank(self) -> u8 {
        match self {
            MilestoneStatus::NotStarted => 0,
            MilestoneStatus::InProgress | MilestoneStatus::Delayed => 1,
            MilestoneStatus::Completed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == MilestoneStatus::Completed
    }

    /// Forward-only: InProgress and Delayed may swap, nothing leaves Completed.
    pub fn can_transition_to(self, next: MilestoneStatus) -> bool {
        !self.is_terminal() && self != next && next.rank() >= self.rank()
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for MilestoneStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "notstarted" => Ok(MilestoneStatus::NotStarted),
            "inprogress" => Ok(MilestoneStatus::InProgress),
            "delayed" => Ok(MilestoneStatus::Delayed),
            "completed" => Ok(MilestoneStatus::Completed),
            _ => Err(format!("unknown milestone status '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub site_id: SiteId,
    pub name: String,
    pub status: MilestoneStatus,
    /// Display value maintained by hand. Auto-completion never reads it.
    pub progress: u8,
    pub planned_start_date: Option<NaiveDate>,
    pub planned_end_date: Option<NaiveDate>,
    /// Written once, by the transition into Completed.
    pub actual_completion_date: Option<NaiveDate>,
    pub delay_reason: Option<String>,
}

impl Milestone {
    pub fn new(id: MilestoneId, site_id: SiteId, name: impl Into<String>) -> Self {
        Self {
            id,
            site_id,
            name: name.into(),
            status: MilestoneStatus::NotStarted,
            progress: 0,
            planned_start_date: None,
            planned_end_date: None,
            actual_completion_date: None,
            delay_reason: None,
        }
    }

    pub fn with_plan(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.planned_start_date = start;
        self.planned_end_date = end;
        self
    }
}

/// "October 19, 2026".
pub fn long_form_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

pub fn achievement_text(milestone_name: &str, completed_on: NaiveDate) -> String {
    format!(
        "🏆 Achievement Unlocked: {} completed on {}!",
        milestone_name,
        long_form_date(completed_on)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_achievement_text() {
        let d = NaiveDate::from_ymd_opt(2026, 10, 9).unwrap();
        assert_eq!(
            achievement_text("Foundation", d),
            "🏆 Achievement Unlocked: Foundation completed on October 9, 2026!"
        );
    }

    #[test]
    fn test_completed_is_terminal() {
        use MilestoneStatus::*;
        for next in [NotStarted, InProgress, Delayed, Completed] {
            assert!(!Completed.can_transition_to(next));
        }
        assert!(NotStarted.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Delayed));
        assert!(Delayed.can_transition_to(InProgress));
        assert!(Delayed.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(NotStarted));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("COMPLETED".parse::<MilestoneStatus>().unwrap(), MilestoneStatus::Completed);
        assert_eq!("Not Started".parse::<MilestoneStatus>().unwrap(), MilestoneStatus::NotStarted);
        assert!("finished".parse::<MilestoneStatus>().is_err());
    }
}
