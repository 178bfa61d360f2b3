use crate::core::records::{
    Arrest, CaseRecord, Citation, CitationKind, NewArrest, NewCitation, OfficerStats,
    RecordError, RecordStore, Subject, SubjectHistory,
};
use crate::infra::database::{from_millis, to_millis};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite, SqliteConnection};

pub struct SqliteRecordStore {
    pool: Pool<Sqlite>,
}

fn storage(e: impl std::fmt::Display) -> RecordError {
    RecordError::Storage(e.to_string())
}

/// Bump and return the guild's case counter. Citations and arrests share it.
async fn next_case_number(conn: &mut SqliteConnection, guild_id: u64) -> Result<u64, RecordError> {
    let row = sqlx::query(
        r#"
        INSERT INTO case_counters (guild_id, last_case) VALUES (?, 1)
        ON CONFLICT(guild_id) DO UPDATE SET last_case = last_case + 1
        RETURNING last_case
        "#,
    )
    .bind(guild_id as i64)
    .fetch_one(conn)
    .await
    .map_err(storage)?;

    Ok(row.get::<i64, _>("last_case") as u64)
}

fn subject_from_row(row: &SqliteRow) -> Subject {
    Subject {
        roblox_id: row.get::<Option<i64>, _>("subject_roblox_id").map(|id| id as u64),
        username: row.get("subject_username"),
    }
}

fn citation_from_row(row: &SqliteRow) -> Result<Citation, RecordError> {
    let raw_kind: String = row.get("kind");
    let kind = CitationKind::parse(&raw_kind)
        .ok_or_else(|| storage(format!("unknown citation kind '{}'", raw_kind)))?;
    let violations: Vec<String> = serde_json::from_str(row.get("violations")).map_err(storage)?;

    Ok(Citation {
        id: row.get("id"),
        guild_id: row.get::<i64, _>("guild_id") as u64,
        case_number: row.get::<i64, _>("case_number") as u64,
        officer_id: row.get::<i64, _>("officer_id") as u64,
        subject: subject_from_row(row),
        kind,
        violations,
        fine_amount: row.get::<Option<i64>, _>("fine_amount").map(|f| f as u32),
        location: row.get("location"),
        notes: row.get("notes"),
        issued_at: from_millis(row.get("issued_at")),
    })
}

fn arrest_from_row(row: &SqliteRow) -> Result<Arrest, RecordError> {
    let charges: Vec<String> = serde_json::from_str(row.get("charges")).map_err(storage)?;
    Ok(Arrest {
        id: row.get("id"),
        guild_id: row.get::<i64, _>("guild_id") as u64,
        case_number: row.get::<i64, _>("case_number") as u64,
        officer_id: row.get::<i64, _>("officer_id") as u64,
        subject: subject_from_row(row),
        charges,
        notes: row.get("notes"),
        arrested_at: from_millis(row.get("arrested_at")),
    })
}

impl SqliteRecordStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS case_counters (
                guild_id INTEGER PRIMARY KEY,
                last_case INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS citations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                case_number INTEGER NOT NULL,
                officer_id INTEGER NOT NULL,
                subject_roblox_id INTEGER,
                subject_username TEXT NOT NULL,
                kind TEXT NOT NULL,
                violations TEXT NOT NULL DEFAULT '[]',
                fine_amount INTEGER,
                location TEXT NOT NULL,
                notes TEXT,
                issued_at INTEGER NOT NULL,
                UNIQUE (guild_id, case_number)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS arrests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                case_number INTEGER NOT NULL,
                officer_id INTEGER NOT NULL,
                subject_roblox_id INTEGER,
                subject_username TEXT NOT NULL,
                charges TEXT NOT NULL DEFAULT '[]',
                notes TEXT,
                arrested_at INTEGER NOT NULL,
                UNIQUE (guild_id, case_number)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert_citation(&self, citation: NewCitation) -> Result<Citation, RecordError> {
        let violations = serde_json::to_string(&citation.violations).map_err(storage)?;
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let case_number = next_case_number(&mut tx, citation.guild_id).await?;
        let result = sqlx::query(
            r#"
            INSERT INTO citations (
                guild_id, case_number, officer_id, subject_roblox_id, subject_username,
                kind, violations, fine_amount, location, notes, issued_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(citation.guild_id as i64)
        .bind(case_number as i64)
        .bind(citation.officer_id as i64)
        .bind(citation.subject.roblox_id.map(|id| id as i64))
        .bind(&citation.subject.username)
        .bind(citation.kind.as_str())
        .bind(violations)
        .bind(citation.fine_amount.map(i64::from))
        .bind(&citation.location)
        .bind(citation.notes.as_deref())
        .bind(to_millis(citation.issued_at))
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        Ok(Citation {
            id: result.last_insert_rowid(),
            guild_id: citation.guild_id,
            case_number,
            officer_id: citation.officer_id,
            subject: citation.subject,
            kind: citation.kind,
            violations: citation.violations,
            fine_amount: citation.fine_amount,
            location: citation.location,
            notes: citation.notes,
            issued_at: from_millis(to_millis(citation.issued_at)),
        })
    }

    async fn insert_arrest(&self, arrest: NewArrest) -> Result<Arrest, RecordError> {
        let charges = serde_json::to_string(&arrest.charges).map_err(storage)?;
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let case_number = next_case_number(&mut tx, arrest.guild_id).await?;
        let result = sqlx::query(
            r#"
            INSERT INTO arrests (
                guild_id, case_number, officer_id, subject_roblox_id, subject_username,
                charges, notes, arrested_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(arrest.guild_id as i64)
        .bind(case_number as i64)
        .bind(arrest.officer_id as i64)
        .bind(arrest.subject.roblox_id.map(|id| id as i64))
        .bind(&arrest.subject.username)
        .bind(charges)
        .bind(arrest.notes.as_deref())
        .bind(to_millis(arrest.arrested_at))
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        Ok(Arrest {
            id: result.last_insert_rowid(),
            guild_id: arrest.guild_id,
            case_number,
            officer_id: arrest.officer_id,
            subject: arrest.subject,
            charges: arrest.charges,
            notes: arrest.notes,
            arrested_at: from_millis(to_millis(arrest.arrested_at)),
        })
    }

    async fn subject_history(
        &self,
        guild_id: u64,
        username: &str,
    ) -> Result<SubjectHistory, RecordError> {
        let citations = sqlx::query(
            r#"
            SELECT * FROM citations
            WHERE guild_id = ? AND subject_username = ? COLLATE NOCASE
            ORDER BY issued_at DESC
            "#,
        )
        .bind(guild_id as i64)
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let arrests = sqlx::query(
            r#"
            SELECT * FROM arrests
            WHERE guild_id = ? AND subject_username = ? COLLATE NOCASE
            ORDER BY arrested_at DESC
            "#,
        )
        .bind(guild_id as i64)
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(SubjectHistory {
            citations: citations
                .iter()
                .map(citation_from_row)
                .collect::<Result<_, _>>()?,
            arrests: arrests
                .iter()
                .map(arrest_from_row)
                .collect::<Result<_, _>>()?,
        })
    }

    async fn get_case(
        &self,
        guild_id: u64,
        case_number: u64,
    ) -> Result<Option<CaseRecord>, RecordError> {
        let citation = sqlx::query("SELECT * FROM citations WHERE guild_id = ? AND case_number = ?")
            .bind(guild_id as i64)
            .bind(case_number as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        if let Some(row) = citation {
            return Ok(Some(CaseRecord::Citation(citation_from_row(&row)?)));
        }

        let arrest = sqlx::query("SELECT * FROM arrests WHERE guild_id = ? AND case_number = ?")
            .bind(guild_id as i64)
            .bind(case_number as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        arrest
            .as_ref()
            .map(|row| arrest_from_row(row).map(CaseRecord::Arrest))
            .transpose()
    }

    async fn delete_case(&self, guild_id: u64, case_number: u64) -> Result<bool, RecordError> {
        let mut removed = 0;
        for table in ["citations", "arrests"] {
            let sql = format!("DELETE FROM {} WHERE guild_id = ? AND case_number = ?", table);
            removed += sqlx::query(&sql)
                .bind(guild_id as i64)
                .bind(case_number as i64)
                .execute(&self.pool)
                .await
                .map_err(storage)?
                .rows_affected();
        }
        Ok(removed > 0)
    }

    async fn officer_stats(
        &self,
        guild_id: u64,
        officer_id: u64,
    ) -> Result<OfficerStats, RecordError> {
        let citations = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN kind = 'fine' THEN 1 ELSE 0 END), 0) AS fines,
                COALESCE(SUM(CASE WHEN kind = 'warning' THEN 1 ELSE 0 END), 0) AS warnings,
                COALESCE(SUM(fine_amount), 0) AS fines_issued
            FROM citations
            WHERE guild_id = ? AND officer_id = ?
            "#,
        )
        .bind(guild_id as i64)
        .bind(officer_id as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        let arrests = sqlx::query(
            "SELECT COUNT(*) AS arrests FROM arrests WHERE guild_id = ? AND officer_id = ?",
        )
        .bind(guild_id as i64)
        .bind(officer_id as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        Ok(OfficerStats {
            citations: citations.get::<i64, _>("fines") as u64,
            warnings: citations.get::<i64, _>("warnings") as u64,
            arrests: arrests.get::<i64, _>("arrests") as u64,
            fines_issued: citations.get::<i64, _>("fines_issued") as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::database::memory_pool;
    use chrono::Utc;

    async fn store() -> SqliteRecordStore {
        let store = SqliteRecordStore::new(memory_pool().await);
        store.migrate().await.unwrap();
        store
    }

    fn subject(name: &str) -> Subject {
        Subject {
            roblox_id: Some(156),
            username: name.to_string(),
        }
    }

    fn fine(guild_id: u64, amount: u32) -> NewCitation {
        NewCitation {
            guild_id,
            officer_id: 7,
            subject: subject("builderman"),
            kind: CitationKind::Fine,
            violations: vec!["Speeding".to_string()],
            fine_amount: Some(amount),
            location: "Highway 1".to_string(),
            notes: None,
            issued_at: Utc::now(),
        }
    }

    fn arrest(guild_id: u64) -> NewArrest {
        NewArrest {
            guild_id,
            officer_id: 7,
            subject: subject("Builderman"),
            charges: vec!["Evading".to_string(), "Theft".to_string()],
            notes: Some("Resisted".to_string()),
            arrested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_case_numbers_shared_per_guild() {
        let store = store().await;
        let first = store.insert_citation(fine(1, 500)).await.unwrap();
        let second = store.insert_arrest(arrest(1)).await.unwrap();
        let other_guild = store.insert_arrest(arrest(2)).await.unwrap();

        assert_eq!(first.case_number, 1);
        assert_eq!(second.case_number, 2);
        assert_eq!(other_guild.case_number, 1);
    }

    #[tokio::test]
    async fn test_get_and_delete_case() {
        let store = store().await;
        let citation = store.insert_citation(fine(1, 500)).await.unwrap();
        let arrest = store.insert_arrest(arrest(1)).await.unwrap();

        assert_eq!(
            store.get_case(1, 1).await.unwrap(),
            Some(CaseRecord::Citation(citation))
        );
        assert_eq!(
            store.get_case(1, 2).await.unwrap(),
            Some(CaseRecord::Arrest(arrest))
        );

        assert!(store.delete_case(1, 1).await.unwrap());
        assert!(!store.delete_case(1, 1).await.unwrap());
        assert!(store.get_case(1, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subject_history_ignores_case() {
        let store = store().await;
        store.insert_citation(fine(1, 200)).await.unwrap();
        store.insert_citation(fine(1, 300)).await.unwrap();
        store.insert_arrest(arrest(1)).await.unwrap();

        let history = store.subject_history(1, "BUILDERMAN").await.unwrap();
        assert_eq!(history.citations.len(), 2);
        assert_eq!(history.arrests.len(), 1);
        assert_eq!(history.total_fines(), 500);
        assert_eq!(history.arrests[0].charges, vec!["Evading", "Theft"]);
    }

    #[tokio::test]
    async fn test_officer_stats() {
        let store = store().await;
        assert_eq!(store.officer_stats(1, 7).await.unwrap(), OfficerStats::default());

        store.insert_citation(fine(1, 250)).await.unwrap();
        let mut warning = fine(1, 0);
        warning.kind = CitationKind::Warning;
        warning.fine_amount = None;
        store.insert_citation(warning).await.unwrap();
        store.insert_arrest(arrest(1)).await.unwrap();

        let stats = store.officer_stats(1, 7).await.unwrap();
        assert_eq!(
            stats,
            OfficerStats {
                citations: 1,
                warnings: 1,
                arrests: 1,
                fines_issued: 250,
            }
        );
    }
}
