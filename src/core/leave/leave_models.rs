// LOA domain models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_LEAVE_DAYS: i64 = 1;
pub const MAX_LEAVE_DAYS: i64 = 90;
pub const REASON_MIN_CHARS: usize = 3;
pub const REASON_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Denied,
    Cancelled,
    Ended,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Denied => "denied",
            LeaveStatus::Cancelled => "cancelled",
            LeaveStatus::Ended => "ended",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(LeaveStatus::Pending),
            "approved" => Some(LeaveStatus::Approved),
            "denied" => Some(LeaveStatus::Denied),
            "cancelled" => Some(LeaveStatus::Cancelled),
            "ended" => Some(LeaveStatus::Ended),
            _ => None,
        }
    }

    /// Pending and approved notices block a new request.
    pub fn is_open(&self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }
}

impl std::fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LeaveStatus::Pending => "Pending",
            LeaveStatus::Approved => "Active",
            LeaveStatus::Denied => "Denied",
            LeaveStatus::Cancelled => "Cancelled",
            LeaveStatus::Ended => "Ended",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveNotice {
    pub id: i64,
    pub guild_id: u64,
    pub user_id: u64,
    pub reason: String,
    /// Requested length. The clock starts when management approves.
    pub duration_secs: i64,
    pub requested_at: DateTime<Utc>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: LeaveStatus,
    pub reviewer_id: Option<u64>,
    pub review_note: Option<String>,
    pub extensions: u32,
}

impl LeaveNotice {
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_secs)
    }

    /// Time left on an approved notice; zero otherwise.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        match (self.status, self.ends_at) {
            (LeaveStatus::Approved, Some(end)) => (end - now).max(Duration::zero()),
            _ => Duration::zero(),
        }
    }
}

/// Input for a new LOA request.
#[derive(Debug, Clone)]
pub struct NewLeaveNotice {
    pub guild_id: u64,
    pub user_id: u64,
    pub reason: String,
    pub duration_secs: i64,
    pub requested_at: DateTime<Utc>,
}
