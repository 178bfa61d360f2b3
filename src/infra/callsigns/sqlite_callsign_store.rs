use crate::core::callsigns::{Callsign, CallsignError, CallsignStore};
use crate::infra::database::{from_millis, to_millis};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteCallsignStore {
    pool: Pool<Sqlite>,
}

fn storage(e: impl std::fmt::Display) -> CallsignError {
    CallsignError::Storage(e.to_string())
}

fn from_row(row: &SqliteRow) -> Callsign {
    Callsign {
        guild_id: row.get::<i64, _>("guild_id") as u64,
        user_id: row.get::<i64, _>("user_id") as u64,
        callsign: row.get("callsign"),
        assigned_at: from_millis(row.get("assigned_at")),
    }
}

impl SqliteCallsignStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS callsigns (
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                callsign TEXT NOT NULL,
                assigned_at INTEGER NOT NULL,
                PRIMARY KEY (guild_id, user_id),
                UNIQUE (guild_id, callsign)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CallsignStore for SqliteCallsignStore {
    async fn find_by_callsign(
        &self,
        guild_id: u64,
        callsign: &str,
    ) -> Result<Option<Callsign>, CallsignError> {
        let row = sqlx::query("SELECT * FROM callsigns WHERE guild_id = ? AND callsign = ?")
            .bind(guild_id as i64)
            .bind(callsign)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.as_ref().map(from_row))
    }

    async fn find_by_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<Callsign>, CallsignError> {
        let row = sqlx::query("SELECT * FROM callsigns WHERE guild_id = ? AND user_id = ?")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.as_ref().map(from_row))
    }

    async fn upsert(&self, callsign: &Callsign) -> Result<(), CallsignError> {
        sqlx::query(
            r#"
            INSERT INTO callsigns (guild_id, user_id, callsign, assigned_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(guild_id, user_id) DO UPDATE SET
                callsign = excluded.callsign,
                assigned_at = excluded.assigned_at
            "#,
        )
        .bind(callsign.guild_id as i64)
        .bind(callsign.user_id as i64)
        .bind(&callsign.callsign)
        .bind(to_millis(callsign.assigned_at))
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn remove(&self, guild_id: u64, user_id: u64) -> Result<bool, CallsignError> {
        let result = sqlx::query("DELETE FROM callsigns WHERE guild_id = ? AND user_id = ?")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, guild_id: u64) -> Result<Vec<Callsign>, CallsignError> {
        let rows = sqlx::query("SELECT * FROM callsigns WHERE guild_id = ? ORDER BY callsign")
            .bind(guild_id as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(rows.iter().map(from_row).collect())
    }
}
