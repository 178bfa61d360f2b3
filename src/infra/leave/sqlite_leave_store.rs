use crate::core::leave::{LeaveError, LeaveNotice, LeaveStatus, LeaveStore, NewLeaveNotice};
use crate::infra::database::{from_millis, to_millis};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteLeaveStore {
    pool: Pool<Sqlite>,
}

fn storage(e: impl std::fmt::Display) -> LeaveError {
    LeaveError::Storage(e.to_string())
}

impl SqliteLeaveStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS leave_notices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                reason TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                requested_at INTEGER NOT NULL,
                starts_at INTEGER,
                ends_at INTEGER,
                status TEXT NOT NULL DEFAULT 'pending',
                reviewer_id INTEGER,
                review_note TEXT,
                extensions INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_leave_guild_status ON leave_notices (guild_id, status)",
        )
        .execute(&self.pool)
        .await?;

        // One pending or approved notice per member
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_leave_one_open
            ON leave_notices (guild_id, user_id)
            WHERE status IN ('pending', 'approved')
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn from_row(row: &SqliteRow) -> Result<LeaveNotice, LeaveError> {
        let raw_status: String = row.get("status");
        let status = LeaveStatus::parse(&raw_status)
            .ok_or_else(|| storage(format!("unknown leave status '{}'", raw_status)))?;

        Ok(LeaveNotice {
            id: row.get("id"),
            guild_id: row.get::<i64, _>("guild_id") as u64,
            user_id: row.get::<i64, _>("user_id") as u64,
            reason: row.get("reason"),
            duration_secs: row.get("duration_secs"),
            requested_at: from_millis(row.get("requested_at")),
            starts_at: row.get::<Option<i64>, _>("starts_at").map(from_millis),
            ends_at: row.get::<Option<i64>, _>("ends_at").map(from_millis),
            status,
            reviewer_id: row.get::<Option<i64>, _>("reviewer_id").map(|id| id as u64),
            review_note: row.get("review_note"),
            extensions: row.get::<i64, _>("extensions") as u32,
        })
    }

    fn from_rows(rows: &[SqliteRow]) -> Result<Vec<LeaveNotice>, LeaveError> {
        rows.iter().map(Self::from_row).collect()
    }
}

#[async_trait]
impl LeaveStore for SqliteLeaveStore {
    async fn insert(&self, notice: NewLeaveNotice) -> Result<LeaveNotice, LeaveError> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_notices (guild_id, user_id, reason, duration_secs, requested_at, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(notice.guild_id as i64)
        .bind(notice.user_id as i64)
        .bind(&notice.reason)
        .bind(notice.duration_secs)
        .bind(to_millis(notice.requested_at))
        .bind(LeaveStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                LeaveError::AlreadyOpen(LeaveStatus::Pending)
            }
            other => storage(other),
        })?;

        Ok(LeaveNotice {
            id: result.last_insert_rowid(),
            guild_id: notice.guild_id,
            user_id: notice.user_id,
            reason: notice.reason,
            duration_secs: notice.duration_secs,
            requested_at: from_millis(to_millis(notice.requested_at)),
            starts_at: None,
            ends_at: None,
            status: LeaveStatus::Pending,
            reviewer_id: None,
            review_note: None,
            extensions: 0,
        })
    }

    async fn get(&self, guild_id: u64, id: i64) -> Result<Option<LeaveNotice>, LeaveError> {
        let row = sqlx::query("SELECT * FROM leave_notices WHERE guild_id = ? AND id = ?")
            .bind(guild_id as i64)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn update(&self, prior: &LeaveNotice, notice: &LeaveNotice) -> Result<bool, LeaveError> {
        let result = sqlx::query(
            r#"
            UPDATE leave_notices SET
                duration_secs = ?,
                starts_at = ?,
                ends_at = ?,
                status = ?,
                reviewer_id = ?,
                review_note = ?,
                extensions = ?
            WHERE id = ? AND status = ? AND extensions = ?
            "#,
        )
        .bind(notice.duration_secs)
        .bind(notice.starts_at.map(to_millis))
        .bind(notice.ends_at.map(to_millis))
        .bind(notice.status.as_str())
        .bind(notice.reviewer_id.map(|id| id as i64))
        .bind(notice.review_note.as_deref())
        .bind(notice.extensions as i64)
        .bind(notice.id)
        .bind(prior.status.as_str())
        .bind(prior.extensions as i64)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn open_for_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<LeaveNotice>, LeaveError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM leave_notices
            WHERE guild_id = ? AND user_id = ? AND status IN ('pending', 'approved')
            ORDER BY requested_at DESC
            LIMIT 1
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn by_status(
        &self,
        guild_id: u64,
        status: LeaveStatus,
    ) -> Result<Vec<LeaveNotice>, LeaveError> {
        let rows = sqlx::query(
            "SELECT * FROM leave_notices WHERE guild_id = ? AND status = ? ORDER BY requested_at",
        )
        .bind(guild_id as i64)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Self::from_rows(&rows)
    }

    async fn for_user(&self, guild_id: u64, user_id: u64) -> Result<Vec<LeaveNotice>, LeaveError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM leave_notices
            WHERE guild_id = ? AND user_id = ?
            ORDER BY requested_at DESC, id DESC
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Self::from_rows(&rows)
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<LeaveNotice>, LeaveError> {
        let rows = sqlx::query(
            "SELECT * FROM leave_notices WHERE status = 'approved' AND ends_at <= ? ORDER BY ends_at",
        )
        .bind(to_millis(now))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Self::from_rows(&rows)
    }
}
