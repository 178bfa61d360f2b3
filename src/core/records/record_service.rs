// Record service - validates and files citations and arrests.

use super::record_models::{
    Arrest, ArrestDraft, CaseRecord, Citation, CitationDraft, CitationKind, NewArrest,
    NewCitation, OfficerStats, SubjectHistory, LOCATION_MAX_CHARS, LOCATION_MIN_CHARS,
    MAX_CHARGES, MAX_CHARGE_CHARS, MAX_FINE, NOTES_MAX_CHARS,
};
use crate::core::formatting::title_case;
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("List at least one charge or violation")]
    NoCharges,

    #[error("No more than {} charges per record", MAX_CHARGES)]
    TooManyCharges,

    #[error("Charge '{0}' is longer than {} characters", MAX_CHARGE_CHARS)]
    ChargeTooLong(String),

    #[error("Fines must be between 1 and {}", MAX_FINE)]
    InvalidFine,

    #[error("A warning can't carry a fine")]
    FineOnWarning,

    #[error(
        "Location must be {}-{} characters",
        LOCATION_MIN_CHARS,
        LOCATION_MAX_CHARS
    )]
    InvalidLocation,

    #[error("Notes can be at most {} characters", NOTES_MAX_CHARS)]
    NotesTooLong,

    #[error("No case #{0} in this server")]
    CaseNotFound(u64),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store a citation, assigning the guild's next case number.
    async fn insert_citation(&self, citation: NewCitation) -> Result<Citation, RecordError>;

    /// Store an arrest, assigning the guild's next case number.
    async fn insert_arrest(&self, arrest: NewArrest) -> Result<Arrest, RecordError>;

    /// Case-insensitive lookup by subject username, newest first.
    async fn subject_history(
        &self,
        guild_id: u64,
        username: &str,
    ) -> Result<SubjectHistory, RecordError>;

    async fn get_case(
        &self,
        guild_id: u64,
        case_number: u64,
    ) -> Result<Option<CaseRecord>, RecordError>;

    /// Returns false when no such case existed.
    async fn delete_case(&self, guild_id: u64, case_number: u64) -> Result<bool, RecordError>;

    async fn officer_stats(
        &self,
        guild_id: u64,
        officer_id: u64,
    ) -> Result<OfficerStats, RecordError>;
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Split free-form charge text into a clean list.
///
/// Entries may be separated by commas, semicolons or newlines. Each one is
/// trimmed and title-cased, blanks are dropped and duplicates (ignoring case)
/// are removed while keeping the first spelling.
pub fn parse_charges(input: &str) -> Result<Vec<String>, RecordError> {
    let mut charges: Vec<String> = Vec::new();

    for raw in input.split(|c| c == ',' || c == ';' || c == '\n') {
        let charge = title_case(raw);
        if charge.is_empty() {
            continue;
        }
        if charge.chars().count() > MAX_CHARGE_CHARS {
            return Err(RecordError::ChargeTooLong(charge));
        }
        if charges.iter().any(|c| c.eq_ignore_ascii_case(&charge)) {
            continue;
        }
        charges.push(charge);
    }

    if charges.is_empty() {
        return Err(RecordError::NoCharges);
    }
    if charges.len() > MAX_CHARGES {
        return Err(RecordError::TooManyCharges);
    }
    Ok(charges)
}

fn clean_notes(notes: Option<String>) -> Result<Option<String>, RecordError> {
    let notes = notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if notes
        .as_ref()
        .map_or(false, |n| n.chars().count() > NOTES_MAX_CHARS)
    {
        return Err(RecordError::NotesTooLong);
    }
    Ok(notes)
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct RecordService<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> RecordService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn log_citation(
        &self,
        guild_id: u64,
        draft: CitationDraft,
    ) -> Result<Citation, RecordError> {
        let violations = parse_charges(&draft.violations)?;

        match (draft.kind, draft.fine_amount) {
            (CitationKind::Warning, Some(_)) => return Err(RecordError::FineOnWarning),
            (CitationKind::Fine, None) => return Err(RecordError::InvalidFine),
            (CitationKind::Fine, Some(amount)) if amount == 0 || amount > MAX_FINE => {
                return Err(RecordError::InvalidFine)
            }
            _ => {}
        }

        let location = draft.location.trim().to_string();
        let location_len = location.chars().count();
        if !(LOCATION_MIN_CHARS..=LOCATION_MAX_CHARS).contains(&location_len) {
            return Err(RecordError::InvalidLocation);
        }

        let citation = self
            .store
            .insert_citation(NewCitation {
                guild_id,
                officer_id: draft.officer_id,
                subject: draft.subject,
                kind: draft.kind,
                violations,
                fine_amount: draft.fine_amount,
                location,
                notes: clean_notes(draft.notes)?,
                issued_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            guild_id,
            case_number = citation.case_number,
            officer_id = citation.officer_id,
            subject = %citation.subject.username,
            "Citation logged"
        );
        Ok(citation)
    }

    pub async fn log_arrest(&self, guild_id: u64, draft: ArrestDraft) -> Result<Arrest, RecordError> {
        let charges = parse_charges(&draft.charges)?;

        let arrest = self
            .store
            .insert_arrest(NewArrest {
                guild_id,
                officer_id: draft.officer_id,
                subject: draft.subject,
                charges,
                notes: clean_notes(draft.notes)?,
                arrested_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            guild_id,
            case_number = arrest.case_number,
            officer_id = arrest.officer_id,
            subject = %arrest.subject.username,
            "Arrest logged"
        );
        Ok(arrest)
    }

    pub async fn subject_history(
        &self,
        guild_id: u64,
        username: &str,
    ) -> Result<SubjectHistory, RecordError> {
        self.store.subject_history(guild_id, username.trim()).await
    }

    pub async fn get_case(&self, guild_id: u64, case_number: u64) -> Result<CaseRecord, RecordError> {
        self.store
            .get_case(guild_id, case_number)
            .await?
            .ok_or(RecordError::CaseNotFound(case_number))
    }

    /// Remove a case and hand back what was removed.
    pub async fn delete_case(
        &self,
        guild_id: u64,
        case_number: u64,
    ) -> Result<CaseRecord, RecordError> {
        let record = self.get_case(guild_id, case_number).await?;
        if !self.store.delete_case(guild_id, case_number).await? {
            return Err(RecordError::CaseNotFound(case_number));
        }
        tracing::warn!(
            guild_id,
            case_number = record.case_number(),
            officer_id = record.officer_id(),
            "Case deleted"
        );
        Ok(record)
    }

    pub async fn officer_stats(
        &self,
        guild_id: u64,
        officer_id: u64,
    ) -> Result<OfficerStats, RecordError> {
        self.store.officer_stats(guild_id, officer_id).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::records::Subject;
    use dashmap::DashMap;
    use std::sync::Mutex;

    /// In-memory store for testing
    struct MockRecordStore {
        cases: DashMap<(u64, u64), CaseRecord>,
        counters: Mutex<std::collections::HashMap<u64, u64>>,
    }

    impl MockRecordStore {
        fn new() -> Self {
            Self {
                cases: DashMap::new(),
                counters: Mutex::new(std::collections::HashMap::new()),
            }
        }

        fn next_case(&self, guild_id: u64) -> u64 {
            let mut counters = self.counters.lock().unwrap();
            let counter = counters.entry(guild_id).or_insert(0);
            *counter += 1;
            *counter
        }
    }

    #[async_trait]
    impl RecordStore for MockRecordStore {
        async fn insert_citation(&self, c: NewCitation) -> Result<Citation, RecordError> {
            let case_number = self.next_case(c.guild_id);
            let citation = Citation {
                id: case_number as i64,
                guild_id: c.guild_id,
                case_number,
                officer_id: c.officer_id,
                subject: c.subject,
                kind: c.kind,
                violations: c.violations,
                fine_amount: c.fine_amount,
                location: c.location,
                notes: c.notes,
                issued_at: c.issued_at,
            };
            self.cases.insert(
                (citation.guild_id, case_number),
                CaseRecord::Citation(citation.clone()),
            );
            Ok(citation)
        }

        async fn insert_arrest(&self, a: NewArrest) -> Result<Arrest, RecordError> {
            let case_number = self.next_case(a.guild_id);
            let arrest = Arrest {
                id: case_number as i64,
                guild_id: a.guild_id,
                case_number,
                officer_id: a.officer_id,
                subject: a.subject,
                charges: a.charges,
                notes: a.notes,
                arrested_at: a.arrested_at,
            };
            self.cases
                .insert((arrest.guild_id, case_number), CaseRecord::Arrest(arrest.clone()));
            Ok(arrest)
        }

        async fn subject_history(
            &self,
            guild_id: u64,
            username: &str,
        ) -> Result<SubjectHistory, RecordError> {
            let mut history = SubjectHistory::default();
            for entry in self.cases.iter() {
                if entry.key().0 != guild_id
                    || !entry.subject().username.eq_ignore_ascii_case(username)
                {
                    continue;
                }
                match entry.value() {
                    CaseRecord::Citation(c) => history.citations.push(c.clone()),
                    CaseRecord::Arrest(a) => history.arrests.push(a.clone()),
                }
            }
            Ok(history)
        }

        async fn get_case(
            &self,
            guild_id: u64,
            case_number: u64,
        ) -> Result<Option<CaseRecord>, RecordError> {
            Ok(self.cases.get(&(guild_id, case_number)).map(|c| c.clone()))
        }

        async fn delete_case(&self, guild_id: u64, case_number: u64) -> Result<bool, RecordError> {
            Ok(self.cases.remove(&(guild_id, case_number)).is_some())
        }

        async fn officer_stats(
            &self,
            guild_id: u64,
            officer_id: u64,
        ) -> Result<OfficerStats, RecordError> {
            let mut stats = OfficerStats::default();
            for entry in self.cases.iter() {
                if entry.key().0 != guild_id || entry.officer_id() != officer_id {
                    continue;
                }
                match entry.value() {
                    CaseRecord::Citation(c) if c.kind == CitationKind::Warning => {
                        stats.warnings += 1
                    }
                    CaseRecord::Citation(c) => {
                        stats.citations += 1;
                        stats.fines_issued += c.fine_amount.map(u64::from).unwrap_or(0);
                    }
                    CaseRecord::Arrest(_) => stats.arrests += 1,
                }
            }
            Ok(stats)
        }
    }

    fn subject(name: &str) -> Subject {
        Subject {
            roblox_id: None,
            username: name.to_string(),
        }
    }

    fn fine_draft(violations: &str, amount: Option<u32>) -> CitationDraft {
        CitationDraft {
            officer_id: 7,
            subject: subject("Builderman"),
            kind: CitationKind::Fine,
            violations: violations.to_string(),
            fine_amount: amount,
            location: "Route 1".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_parse_charges_cleans_and_dedupes() {
        let charges = parse_charges("speeding, RECKLESS driving;\nSpeeding ,, ").unwrap();
        assert_eq!(charges, vec!["Speeding", "Reckless Driving"]);
    }

    #[test]
    fn test_parse_charges_limits() {
        assert!(matches!(parse_charges(" , ;"), Err(RecordError::NoCharges)));

        let many = (0..16).map(|i| format!("charge {}", i)).collect::<Vec<_>>().join(",");
        assert!(matches!(parse_charges(&many), Err(RecordError::TooManyCharges)));

        let long = "a".repeat(MAX_CHARGE_CHARS + 1);
        assert!(matches!(parse_charges(&long), Err(RecordError::ChargeTooLong(_))));
    }

    #[tokio::test]
    async fn test_fine_rules() {
        let service = RecordService::new(MockRecordStore::new());

        let err = service
            .log_citation(1, fine_draft("Speeding", None))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::InvalidFine));

        let err = service
            .log_citation(1, fine_draft("Speeding", Some(MAX_FINE + 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::InvalidFine));

        let mut warning = fine_draft("Speeding", Some(100));
        warning.kind = CitationKind::Warning;
        let err = service.log_citation(1, warning).await.unwrap_err();
        assert!(matches!(err, RecordError::FineOnWarning));
    }

    #[tokio::test]
    async fn test_case_numbers_shared_across_kinds() {
        let service = RecordService::new(MockRecordStore::new());

        let citation = service
            .log_citation(1, fine_draft("Speeding", Some(250)))
            .await
            .unwrap();
        let arrest = service
            .log_arrest(
                1,
                ArrestDraft {
                    officer_id: 7,
                    subject: subject("Builderman"),
                    charges: "evading police".to_string(),
                    notes: Some("  ".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(citation.case_number, 1);
        assert_eq!(arrest.case_number, 2);
        assert_eq!(arrest.charges, vec!["Evading Police"]);
        assert_eq!(arrest.notes, None);

        let history = service.subject_history(1, "builderman").await.unwrap();
        assert_eq!(history.citations.len(), 1);
        assert_eq!(history.arrests.len(), 1);
        assert_eq!(history.total_fines(), 250);
    }

    #[tokio::test]
    async fn test_delete_returns_removed_case() {
        let service = RecordService::new(MockRecordStore::new());
        service
            .log_citation(1, fine_draft("Speeding", Some(100)))
            .await
            .unwrap();

        let removed = service.delete_case(1, 1).await.unwrap();
        assert_eq!(removed.case_number(), 1);
        assert_eq!(removed.subject().username, "Builderman");
        assert!(matches!(
            service.get_case(1, 1).await,
            Err(RecordError::CaseNotFound(1))
        ));
    }

    #[tokio::test]
    async fn test_delete_unknown_case() {
        let service = RecordService::new(MockRecordStore::new());
        let err = service.delete_case(1, 42).await.unwrap_err();
        assert!(matches!(err, RecordError::CaseNotFound(42)));
    }

    #[tokio::test]
    async fn test_invalid_location() {
        let service = RecordService::new(MockRecordStore::new());
        let mut draft = fine_draft("Speeding", Some(10));
        draft.location = " x ".to_string();
        let err = service.log_citation(1, draft).await.unwrap_err();
        assert!(matches!(err, RecordError::InvalidLocation));
    }
}
