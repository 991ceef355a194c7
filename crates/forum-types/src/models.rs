use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Points needed per level step.
pub const POINTS_PER_LEVEL: i64 = 100;
pub const MAX_LEVEL: i64 = 10;

/// Level for a points balance: one level per hundred points, capped at ten.
pub fn level_for_points(total_points: i64) -> i64 {
    (1 + total_points / POINTS_PER_LEVEL).clamp(1, MAX_LEVEL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
    Superadmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Moderator, Role::Admin, Role::Superadmin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Moderators and above can use the staff endpoints.
    pub fn is_staff(self) -> bool {
        !matches!(self, Role::User)
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }
}

impl FromStr for VoteType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upvote" => Ok(VoteType::Upvote),
            "downvote" => Ok(VoteType::Downvote),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Decision applied to an application or a creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewDecision::Approved => "approved",
            ReviewDecision::Rejected => "rejected",
        }
    }

    /// Status a reviewed report ends up in.
    pub fn report_status(self) -> &'static str {
        match self {
            ReviewDecision::Approved => "resolved",
            ReviewDecision::Rejected => "dismissed",
        }
    }
}

pub const STATUS_PENDING: &str = "pending";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value: {}", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_steps_every_hundred_points() {
        assert_eq!(level_for_points(0), 1);
        assert_eq!(level_for_points(99), 1);
        assert_eq!(level_for_points(100), 2);
        assert_eq!(level_for_points(950), 10);
        assert_eq!(level_for_points(5000), 10);
    }

    #[test]
    fn level_never_drops_below_one() {
        assert_eq!(level_for_points(-250), 1);
    }

    #[test]
    fn role_parsing() {
        assert_eq!("moderator".parse::<Role>(), Ok(Role::Moderator));
        assert!("root".parse::<Role>().is_err());
        assert!(!Role::User.is_staff());
        assert!(Role::Superadmin.is_staff());
    }

    #[test]
    fn report_status_mapping() {
        assert_eq!(ReviewDecision::Approved.report_status(), "resolved");
        assert_eq!(ReviewDecision::Rejected.report_status(), "dismissed");
    }
}
