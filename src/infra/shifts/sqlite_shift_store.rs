use crate::core::shifts::{Shift, ShiftBreak, ShiftError, ShiftFilter, ShiftStore};
use crate::infra::database::{from_millis, to_millis};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteShiftStore {
    pool: Pool<Sqlite>,
}

fn storage(e: impl std::fmt::Display) -> ShiftError {
    ShiftError::Storage(e.to_string())
}

impl SqliteShiftStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS shifts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                shift_type TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                ended_at INTEGER,
                breaks TEXT NOT NULL DEFAULT '[]'
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_shifts_guild_user ON shifts (guild_id, user_id, ended_at)",
        )
        .execute(&self.pool)
        .await?;

        // At most one shift in progress per member
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_shifts_one_active
            ON shifts (guild_id, user_id)
            WHERE ended_at IS NULL
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn from_row(row: &SqliteRow) -> Result<Shift, ShiftError> {
        let breaks: Vec<ShiftBreak> = serde_json::from_str(row.get("breaks")).map_err(storage)?;
        Ok(Shift {
            id: row.get("id"),
            guild_id: row.get::<i64, _>("guild_id") as u64,
            user_id: row.get::<i64, _>("user_id") as u64,
            shift_type: row.get("shift_type"),
            started_at: from_millis(row.get("started_at")),
            ended_at: row.get::<Option<i64>, _>("ended_at").map(from_millis),
            breaks,
        })
    }

    fn from_rows(rows: &[SqliteRow]) -> Result<Vec<Shift>, ShiftError> {
        rows.iter().map(Self::from_row).collect()
    }
}

#[async_trait]
impl ShiftStore for SqliteShiftStore {
    async fn insert_shift(
        &self,
        guild_id: u64,
        user_id: u64,
        shift_type: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Shift, ShiftError> {
        let inserted = sqlx::query(
            "INSERT INTO shifts (guild_id, user_id, shift_type, started_at) VALUES (?, ?, ?, ?)",
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .bind(shift_type)
        .bind(to_millis(started_at))
        .execute(&self.pool)
        .await;

        let result = match inserted {
            Ok(result) => result,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let running = self
                    .active_shift(guild_id, user_id)
                    .await?
                    .map_or_else(|| shift_type.to_string(), |s| s.shift_type);
                return Err(ShiftError::AlreadyOnDuty(running));
            }
            Err(e) => return Err(storage(e)),
        };

        Ok(Shift {
            id: result.last_insert_rowid(),
            guild_id,
            user_id,
            shift_type: shift_type.to_string(),
            // Round-trip through millis so the returned value matches a reload
            started_at: from_millis(to_millis(started_at)),
            ended_at: None,
            breaks: Vec::new(),
        })
    }

    async fn active_shift(&self, guild_id: u64, user_id: u64) -> Result<Option<Shift>, ShiftError> {
        let row = sqlx::query(
            "SELECT * FROM shifts WHERE guild_id = ? AND user_id = ? AND ended_at IS NULL LIMIT 1",
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn update_shift(&self, shift: &Shift) -> Result<(), ShiftError> {
        let breaks = serde_json::to_string(&shift.breaks).map_err(storage)?;
        sqlx::query("UPDATE shifts SET ended_at = ?, breaks = ? WHERE id = ?")
            .bind(shift.ended_at.map(to_millis))
            .bind(breaks)
            .bind(shift.id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn delete_shift(&self, shift_id: i64) -> Result<(), ShiftError> {
        sqlx::query("DELETE FROM shifts WHERE id = ?")
            .bind(shift_id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn user_shifts(
        &self,
        guild_id: u64,
        user_id: u64,
        limit: usize,
    ) -> Result<Vec<Shift>, ShiftError> {
        // SQLite treats a negative LIMIT as "no limit"
        let limit = i64::try_from(limit).unwrap_or(-1);
        let rows = sqlx::query(
            r#"
            SELECT * FROM shifts
            WHERE guild_id = ? AND user_id = ? AND ended_at IS NOT NULL
            ORDER BY started_at DESC
            LIMIT ?
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Self::from_rows(&rows)
    }

    async fn guild_shifts(
        &self,
        guild_id: u64,
        filter: &ShiftFilter,
    ) -> Result<Vec<Shift>, ShiftError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM shifts
            WHERE guild_id = ? AND ended_at IS NOT NULL
              AND (? IS NULL OR shift_type = ? COLLATE NOCASE)
              AND (? IS NULL OR started_at >= ?)
            "#,
        )
        .bind(guild_id as i64)
        .bind(filter.shift_type.as_deref())
        .bind(filter.shift_type.as_deref())
        .bind(filter.since.map(to_millis))
        .bind(filter.since.map(to_millis))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Self::from_rows(&rows)
    }

    async fn active_shifts(&self, guild_id: u64) -> Result<Vec<Shift>, ShiftError> {
        let rows = sqlx::query(
            "SELECT * FROM shifts WHERE guild_id = ? AND ended_at IS NULL ORDER BY started_at",
        )
        .bind(guild_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Self::from_rows(&rows)
    }

    async fn delete_shifts(&self, guild_id: u64, filter: &ShiftFilter) -> Result<u64, ShiftError> {
        let result = sqlx::query(
            r#"
            DELETE FROM shifts
            WHERE guild_id = ?
              AND (? IS NULL OR shift_type = ? COLLATE NOCASE)
            "#,
        )
        .bind(guild_id as i64)
        .bind(filter.shift_type.as_deref())
        .bind(filter.shift_type.as_deref())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::database::memory_pool;
    use chrono::Duration;

    async fn store() -> SqliteShiftStore {
        let store = SqliteShiftStore::new(memory_pool().await);
        store.migrate().await.unwrap();
        store
    }

    async fn finished(store: &SqliteShiftStore, user_id: u64, kind: &str, hours_ago: i64) -> Shift {
        let start = Utc::now() - Duration::hours(hours_ago);
        let mut shift = store.insert_shift(1, user_id, kind, start).await.unwrap();
        shift.ended_at = Some(start + Duration::minutes(30));
        store.update_shift(&shift).await.unwrap();
        shift
    }

    #[tokio::test]
    async fn test_second_active_shift_is_refused() {
        let store = store().await;
        store.insert_shift(1, 2, "Patrol", Utc::now()).await.unwrap();

        let err = store.insert_shift(1, 2, "SWAT", Utc::now()).await.unwrap_err();
        assert!(matches!(err, ShiftError::AlreadyOnDuty(t) if t == "Patrol"));

        // Ended shifts don't count, and other members are free to start
        finished(&store, 3, "Patrol", 2).await;
        assert!(store.insert_shift(1, 3, "Patrol", Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_active_shift_round_trip() {
        let store = store().await;
        let mut shift = store.insert_shift(1, 2, "Patrol", Utc::now()).await.unwrap();
        shift.breaks.push(ShiftBreak {
            started_at: from_millis(to_millis(Utc::now())),
            ended_at: None,
        });
        store.update_shift(&shift).await.unwrap();

        let loaded = store.active_shift(1, 2).await.unwrap().unwrap();
        assert_eq!(loaded, shift);
        assert_eq!(store.active_shifts(1).await.unwrap().len(), 1);
        assert!(store.user_shifts(1, 2, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_shifts_newest_first_and_unbounded_limit() {
        let store = store().await;
        finished(&store, 2, "Patrol", 5).await;
        let newest = finished(&store, 2, "Patrol", 1).await;

        let shifts = store.user_shifts(1, 2, usize::MAX).await.unwrap();
        assert_eq!(shifts.len(), 2);
        assert_eq!(shifts[0].id, newest.id);

        assert_eq!(store.user_shifts(1, 2, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_guild_filter_and_wipe() {
        let store = store().await;
        finished(&store, 2, "Patrol", 50).await;
        finished(&store, 3, "SWAT", 2).await;
        finished(&store, 4, "patrol", 1).await;

        let patrol = ShiftFilter {
            shift_type: Some("PATROL".to_string()),
            since: None,
        };
        assert_eq!(store.guild_shifts(1, &patrol).await.unwrap().len(), 2);

        let recent = ShiftFilter {
            shift_type: None,
            since: Some(Utc::now() - Duration::hours(24)),
        };
        assert_eq!(store.guild_shifts(1, &recent).await.unwrap().len(), 2);

        assert_eq!(store.delete_shifts(1, &patrol).await.unwrap(), 2);
        assert_eq!(
            store.delete_shifts(1, &ShiftFilter::default()).await.unwrap(),
            1
        );
    }
}
