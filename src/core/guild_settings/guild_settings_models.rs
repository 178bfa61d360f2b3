// Guild settings domain models.
//
// Plain data, no Discord types. IDs are raw snowflakes (u64).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Name used for the implicit shift type when a guild hasn't created any.
pub const IMPLICIT_SHIFT_TYPE: &str = "Default";

/// Discord allows at most 25 autocomplete choices; we keep well under that.
pub const MAX_SHIFT_TYPES: usize = 10;

pub const SHIFT_TYPE_NAME_MIN: usize = 3;
pub const SHIFT_TYPE_NAME_MAX: usize = 20;

static SNOWFLAKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{15,22}$").expect("snowflake pattern is valid"));

static SHIFT_TYPE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9 _-]+$").expect("shift type pattern is valid"));

/// Does `value` look like a Discord snowflake?
pub fn is_snowflake(value: &str) -> bool {
    SNOWFLAKE.is_match(value)
}

/// Snowflake check for an already-parsed ID.
pub fn is_snowflake_id(id: u64) -> bool {
    is_snowflake(&id.to_string())
}

pub fn is_valid_shift_type_name(name: &str) -> bool {
    let len = name.chars().count();
    (SHIFT_TYPE_NAME_MIN..=SHIFT_TYPE_NAME_MAX).contains(&len)
        && SHIFT_TYPE_NAME.is_match(name)
        && name.trim() == name
}

/// A named category of duty shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftType {
    pub name: String,
    /// Members need at least one of these roles to start this shift type.
    /// Empty means everyone with staff access may use it.
    pub access_roles: Vec<u64>,
    pub is_default: bool,
}

impl ShiftType {
    pub fn implicit() -> Self {
        Self {
            name: IMPLICIT_SHIFT_TYPE.to_string(),
            access_roles: Vec::new(),
            is_default: true,
        }
    }

    pub fn allows(&self, member_roles: &[u64]) -> bool {
        self.access_roles.is_empty() || self.access_roles.iter().any(|r| member_roles.contains(r))
    }
}

/// Which role list a command is editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleListKind {
    Management,
    Staff,
}

/// Which log channel a command is editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChannelKind {
    Shifts,
    Leave,
    Records,
}

impl std::fmt::Display for LogChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogChannelKind::Shifts => write!(f, "Shift log"),
            LogChannelKind::Leave => write!(f, "LOA log"),
            LogChannelKind::Records => write!(f, "Records log"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: u64,
    pub management_roles: Vec<u64>,
    pub staff_roles: Vec<u64>,
    pub shift_types: Vec<ShiftType>,
    pub shift_log_channel: Option<u64>,
    pub leave_log_channel: Option<u64>,
    pub leave_role: Option<u64>,
    pub record_log_channel: Option<u64>,
    /// IANA timezone name used when showing dates to members.
    pub timezone: String,
    /// Weekly on-duty minutes expected from each member, if the guild tracks a quota.
    pub shift_quota_minutes: Option<u32>,
}

impl GuildSettings {
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            management_roles: Vec::new(),
            staff_roles: Vec::new(),
            shift_types: Vec::new(),
            shift_log_channel: None,
            leave_log_channel: None,
            leave_role: None,
            record_log_channel: None,
            timezone: "UTC".to_string(),
            shift_quota_minutes: None,
        }
    }

    pub fn find_shift_type(&self, name: &str) -> Option<&ShiftType> {
        self.shift_types
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn default_shift_type(&self) -> Option<&ShiftType> {
        self.shift_types.iter().find(|t| t.is_default)
    }

    pub fn log_channel(&self, kind: LogChannelKind) -> Option<u64> {
        match kind {
            LogChannelKind::Shifts => self.shift_log_channel,
            LogChannelKind::Leave => self.leave_log_channel,
            LogChannelKind::Records => self.record_log_channel,
        }
    }

    pub fn is_management(&self, member_roles: &[u64]) -> bool {
        self.management_roles
            .iter()
            .any(|r| member_roles.contains(r))
    }

    pub fn is_staff(&self, member_roles: &[u64]) -> bool {
        self.is_management(member_roles)
            || self.staff_roles.iter().any(|r| member_roles.contains(r))
    }

    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}
