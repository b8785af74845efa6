//! sitetrack-core: the completion-and-approval cascade for construction sites.
//!
//! Site → Phase → Task, with milestones grouping phases. Approving the last
//! open task of a milestone's phases completes the milestone and posts an
//! achievement message to its last phase.

pub mod approval;
pub mod cascade;
pub mod dispatch;
pub mod error;
pub mod evaluator;
pub mod ids;
pub mod memory;
pub mod messages;
pub mod milestone;
pub mod overview;
pub mod ports;
pub mod sink;
pub mod site;
pub mod task;
pub mod time;

pub use approval::ApprovalService;
pub use cascade::{Cascade, CascadeSettings};
pub use dispatch::Dispatcher;
pub use error::{Error, StoreError};
pub use evaluator::{EvaluationReport, MilestoneEvaluator, MilestoneOutcome};
pub use ids::{
    EmployeeId, MilestoneId, NotificationId, PhaseId, SiteId, StageMessageId, TaskId,
};
pub use memory::MemoryStore;
pub use messages::{
    MessageKind, NewNotification, NewStageMessage, Notification, StageMessage, TASK_REJECTED,
    TASK_SUBMITTED,
};
pub use milestone::{Milestone, MilestoneStatus, achievement_text, long_form_date};
pub use overview::{MilestoneOverview, milestone_overview};
pub use ports::{EmployeeDirectory, MilestoneCompletion, SiteStore};
pub use sink::{CascadeFailure, CascadeSink, CascadeStage, RecordingSink, TracingSink};
pub use site::{Employee, Phase, Role, Site};
pub use task::{Task, TaskAction, TaskStatus};
pub use time::{Clock, FixedClock, SystemClock, local_date, parse_timezone};
