// Shift domain models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftBreak {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ShiftBreak {
    /// Length of the break, counting an open break up to `now`.
    pub fn length(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).max(Duration::zero())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftStatus {
    OnDuty,
    OnBreak,
    Ended,
}

impl std::fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShiftStatus::OnDuty => write!(f, "On Duty"),
            ShiftStatus::OnBreak => write!(f, "On Break"),
            ShiftStatus::Ended => write!(f, "Off Duty"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shift {
    pub id: i64,
    pub guild_id: u64,
    pub user_id: u64,
    pub shift_type: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub breaks: Vec<ShiftBreak>,
}

impl Shift {
    pub fn status(&self) -> ShiftStatus {
        if self.ended_at.is_some() {
            ShiftStatus::Ended
        } else if self.open_break().is_some() {
            ShiftStatus::OnBreak
        } else {
            ShiftStatus::OnDuty
        }
    }

    pub fn open_break(&self) -> Option<&ShiftBreak> {
        self.breaks.iter().find(|b| b.ended_at.is_none())
    }

    pub fn break_time(&self, now: DateTime<Utc>) -> Duration {
        let until = self.ended_at.unwrap_or(now);
        self.breaks
            .iter()
            .map(|b| b.length(until))
            .fold(Duration::zero(), |acc, d| acc + d)
    }

    /// Time actually spent on duty: wall time minus breaks, never negative.
    pub fn duty_time(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        let wall = end - self.started_at;
        (wall - self.break_time(now)).max(Duration::zero())
    }
}

/// Aggregated on-duty time for one member.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftSummary {
    pub user_id: u64,
    pub shift_count: u32,
    pub total: Duration,
}

impl ShiftSummary {
    pub fn average(&self) -> Duration {
        if self.shift_count == 0 {
            Duration::zero()
        } else {
            self.total / self.shift_count as i32
        }
    }
}

/// Filter used by reports and wipes.
#[derive(Debug, Clone, Default)]
pub struct ShiftFilter {
    pub shift_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift_at(start: DateTime<Utc>) -> Shift {
        Shift {
            id: 1,
            guild_id: 1,
            user_id: 1,
            shift_type: "Patrol".to_string(),
            started_at: start,
            ended_at: None,
            breaks: Vec::new(),
        }
    }

    #[test]
    fn test_duty_time_subtracts_breaks() {
        let start = Utc::now() - Duration::hours(3);
        let mut shift = shift_at(start);
        shift.breaks.push(ShiftBreak {
            started_at: start + Duration::minutes(30),
            ended_at: Some(start + Duration::minutes(60)),
        });
        shift.ended_at = Some(start + Duration::hours(2));

        assert_eq!(shift.duty_time(Utc::now()), Duration::minutes(90));
        assert_eq!(shift.status(), ShiftStatus::Ended);
    }

    #[test]
    fn test_open_break_counts_until_now() {
        let now = Utc::now();
        let start = now - Duration::hours(1);
        let mut shift = shift_at(start);
        shift.breaks.push(ShiftBreak {
            started_at: now - Duration::minutes(20),
            ended_at: None,
        });

        assert_eq!(shift.status(), ShiftStatus::OnBreak);
        assert_eq!(shift.duty_time(now), Duration::minutes(40));
    }

    #[test]
    fn test_summary_average() {
        let summary = ShiftSummary {
            user_id: 1,
            shift_count: 4,
            total: Duration::hours(2),
        };
        assert_eq!(summary.average(), Duration::minutes(30));
    }
}
