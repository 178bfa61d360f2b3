// Citation / arrest domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_CHARGES: usize = 15;
pub const MAX_CHARGE_CHARS: usize = 100;
pub const MAX_FINE: u32 = 1_000_000;
pub const LOCATION_MIN_CHARS: usize = 2;
pub const LOCATION_MAX_CHARS: usize = 100;
pub const NOTES_MAX_CHARS: usize = 1_000;

/// The person a record is about. `roblox_id` is set when the username
/// resolved against the Roblox API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub roblox_id: Option<u64>,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CitationKind {
    Warning,
    Fine,
}

impl CitationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CitationKind::Warning => "warning",
            CitationKind::Fine => "fine",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "warning" => Some(CitationKind::Warning),
            "fine" => Some(CitationKind::Fine),
            _ => None,
        }
    }
}

impl std::fmt::Display for CitationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CitationKind::Warning => write!(f, "Warning"),
            CitationKind::Fine => write!(f, "Fine"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub id: i64,
    pub guild_id: u64,
    pub case_number: u64,
    pub officer_id: u64,
    pub subject: Subject,
    pub kind: CitationKind,
    pub violations: Vec<String>,
    pub fine_amount: Option<u32>,
    pub location: String,
    pub notes: Option<String>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrest {
    pub id: i64,
    pub guild_id: u64,
    pub case_number: u64,
    pub officer_id: u64,
    pub subject: Subject,
    pub charges: Vec<String>,
    pub notes: Option<String>,
    pub arrested_at: DateTime<Utc>,
}

/// Validated citation ready to be stored.
#[derive(Debug, Clone)]
pub struct NewCitation {
    pub guild_id: u64,
    pub officer_id: u64,
    pub subject: Subject,
    pub kind: CitationKind,
    pub violations: Vec<String>,
    pub fine_amount: Option<u32>,
    pub location: String,
    pub notes: Option<String>,
    pub issued_at: DateTime<Utc>,
}

/// Validated arrest ready to be stored.
#[derive(Debug, Clone)]
pub struct NewArrest {
    pub guild_id: u64,
    pub officer_id: u64,
    pub subject: Subject,
    pub charges: Vec<String>,
    pub notes: Option<String>,
    pub arrested_at: DateTime<Utc>,
}

/// Raw citation input as typed by the officer.
#[derive(Debug, Clone)]
pub struct CitationDraft {
    pub officer_id: u64,
    pub subject: Subject,
    pub kind: CitationKind,
    pub violations: String,
    pub fine_amount: Option<u32>,
    pub location: String,
    pub notes: Option<String>,
}

/// Raw arrest input as typed by the officer.
#[derive(Debug, Clone)]
pub struct ArrestDraft {
    pub officer_id: u64,
    pub subject: Subject,
    pub charges: String,
    pub notes: Option<String>,
}

/// Either kind of record, looked up by case number.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseRecord {
    Citation(Citation),
    Arrest(Arrest),
}

impl CaseRecord {
    pub fn case_number(&self) -> u64 {
        match self {
            CaseRecord::Citation(c) => c.case_number,
            CaseRecord::Arrest(a) => a.case_number,
        }
    }

    pub fn officer_id(&self) -> u64 {
        match self {
            CaseRecord::Citation(c) => c.officer_id,
            CaseRecord::Arrest(a) => a.officer_id,
        }
    }

    pub fn subject(&self) -> &Subject {
        match self {
            CaseRecord::Citation(c) => &c.subject,
            CaseRecord::Arrest(a) => &a.subject,
        }
    }
}

/// A subject's full record in one guild.
#[derive(Debug, Clone, Default)]
pub struct SubjectHistory {
    pub citations: Vec<Citation>,
    pub arrests: Vec<Arrest>,
}

impl SubjectHistory {
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty() && self.arrests.is_empty()
    }

    pub fn total_fines(&self) -> u64 {
        self.citations
            .iter()
            .filter_map(|c| c.fine_amount)
            .map(u64::from)
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfficerStats {
    pub citations: u64,
    pub warnings: u64,
    pub arrests: u64,
    pub fines_issued: u64,
}
