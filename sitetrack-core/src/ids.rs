//! Strongly typed row identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

row_id!(
    /// Construction site (top-level project).
    SiteId
);
row_id!(PhaseId);
row_id!(TaskId);
row_id!(MilestoneId);
row_id!(
    /// Employee, or the configured system actor when used as a message sender.
    EmployeeId
);
row_id!(NotificationId);
row_id!(StageMessageId);
