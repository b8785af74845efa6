//! Sites, their ordered phases, and the people working on them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{EmployeeId, MilestoneId, PhaseId, SiteId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
}

/// An ordered stage of work within a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub site_id: SiteId,
    pub name: String,
    /// Position within the site; the highest linked phase is a milestone's last.
    pub order_num: i32,
    /// Phases may be unlinked.
    pub milestone_id: Option<MilestoneId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Supervisor,
    Worker,
    /// Anything the directory holds that we do not model. Never administrative.
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "admin" | "administrator" => Role::Admin,
            "supervisor" => Role::Supervisor,
            "worker" => Role::Worker,
            _ => Role::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Supervisor => "supervisor",
            Role::Worker => "worker",
            Role::Other(s) => s,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("ADMIN"), Role::Admin);
        assert_eq!(Role::parse(" Administrator "), Role::Admin);
        assert_eq!(Role::parse("worker"), Role::Worker);
        assert_eq!(Role::parse("Site Engineer"), Role::Other("Site Engineer".into()));
        assert!(!Role::parse("Site Engineer").is_admin());
        assert_eq!(Role::parse("Supervisor").as_str(), "supervisor");
    }
}
