// Nickname replacement domain models.

use std::time::Duration;
use thiserror::Error;

/// Discord's nickname length limit.
pub const MAX_NICKNAME_CHARS: usize = 32;

#[derive(Debug, Error)]
pub enum NicknameError {
    #[error("The text to find can't be empty")]
    EmptyPattern,

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Replacement text can be at most {} characters", MAX_NICKNAME_CHARS)]
    ReplacementTooLong,

    #[error("A nickname replacement is already running in this server (started {0}s ago)")]
    OperationInProgress(u64),
}

/// What we know about a member when planning a replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberNickname {
    pub user_id: u64,
    pub username: String,
    pub nickname: Option<String>,
    pub is_owner: bool,
}

impl MemberNickname {
    /// The name Discord shows: nickname when set, otherwise the username.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementMode {
    /// Plain, case-sensitive substring replacement.
    Literal,
    /// Regular expression; the replacement may use `$1`-style captures.
    Regex,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NicknameChange {
    pub user_id: u64,
    pub before: String,
    /// `None` clears the nickname so Discord falls back to the username.
    pub after: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacementPlan {
    pub changes: Vec<NicknameChange>,
    /// Members that matched but can't be renamed (the guild owner).
    pub skipped_owner: usize,
}

impl ReplacementPlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub batch_delay: Duration,
    /// Re-check the bot's Manage Nicknames permission every N batches.
    pub permission_check_every: usize,
    /// Stop when the share of failures within one batch is above this.
    pub failure_threshold: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_millis(1_500),
            permission_check_every: 3,
            failure_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementOutcome {
    Completed,
    Cancelled,
    PermissionLost,
    FailureThreshold,
}

impl std::fmt::Display for ReplacementOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplacementOutcome::Completed => write!(f, "Completed"),
            ReplacementOutcome::Cancelled => write!(f, "Cancelled"),
            ReplacementOutcome::PermissionLost => write!(f, "Stopped: Manage Nicknames permission lost"),
            ReplacementOutcome::FailureThreshold => write!(f, "Stopped: too many failures"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedChange {
    pub user_id: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    pub batch: usize,
    pub batch_count: usize,
    pub processed: usize,
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementReport {
    pub outcome: ReplacementOutcome,
    pub total: usize,
    pub updated: usize,
    pub failed: Vec<FailedChange>,
    /// Changes never attempted because the run stopped early.
    pub skipped: usize,
}
