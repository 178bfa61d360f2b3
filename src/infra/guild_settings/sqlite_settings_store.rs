use crate::core::guild_settings::{GuildSettings, SettingsError, SettingsStore, ShiftType};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteSettingsStore {
    pool: Pool<Sqlite>,
}

fn storage(e: impl std::fmt::Display) -> SettingsError {
    SettingsError::Storage(e.to_string())
}

impl SqliteSettingsStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_settings (
                guild_id INTEGER PRIMARY KEY,
                management_roles TEXT NOT NULL DEFAULT '[]',
                staff_roles TEXT NOT NULL DEFAULT '[]',
                shift_types TEXT NOT NULL DEFAULT '[]',
                shift_log_channel INTEGER,
                leave_log_channel INTEGER,
                leave_role INTEGER,
                record_log_channel INTEGER,
                timezone TEXT NOT NULL DEFAULT 'UTC',
                shift_quota_minutes INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn from_row(row: &SqliteRow) -> Result<GuildSettings, SettingsError> {
        let opt_id = |col: &str| row.get::<Option<i64>, _>(col).map(|id| id as u64);

        let management_roles: Vec<u64> =
            serde_json::from_str(row.get("management_roles")).map_err(storage)?;
        let staff_roles: Vec<u64> = serde_json::from_str(row.get("staff_roles")).map_err(storage)?;
        let shift_types: Vec<ShiftType> =
            serde_json::from_str(row.get("shift_types")).map_err(storage)?;

        Ok(GuildSettings {
            guild_id: row.get::<i64, _>("guild_id") as u64,
            management_roles,
            staff_roles,
            shift_types,
            shift_log_channel: opt_id("shift_log_channel"),
            leave_log_channel: opt_id("leave_log_channel"),
            leave_role: opt_id("leave_role"),
            record_log_channel: opt_id("record_log_channel"),
            timezone: row.get("timezone"),
            shift_quota_minutes: row
                .get::<Option<i64>, _>("shift_quota_minutes")
                .map(|m| m as u32),
        })
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn load(&self, guild_id: u64) -> Result<Option<GuildSettings>, SettingsError> {
        let row = sqlx::query("SELECT * FROM guild_settings WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn save(&self, settings: &GuildSettings) -> Result<(), SettingsError> {
        let management_roles = serde_json::to_string(&settings.management_roles).map_err(storage)?;
        let staff_roles = serde_json::to_string(&settings.staff_roles).map_err(storage)?;
        let shift_types = serde_json::to_string(&settings.shift_types).map_err(storage)?;

        sqlx::query(
            r#"
            INSERT INTO guild_settings (
                guild_id, management_roles, staff_roles, shift_types,
                shift_log_channel, leave_log_channel, leave_role, record_log_channel,
                timezone, shift_quota_minutes
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                management_roles = excluded.management_roles,
                staff_roles = excluded.staff_roles,
                shift_types = excluded.shift_types,
                shift_log_channel = excluded.shift_log_channel,
                leave_log_channel = excluded.leave_log_channel,
                leave_role = excluded.leave_role,
                record_log_channel = excluded.record_log_channel,
                timezone = excluded.timezone,
                shift_quota_minutes = excluded.shift_quota_minutes
            "#,
        )
        .bind(settings.guild_id as i64)
        .bind(management_roles)
        .bind(staff_roles)
        .bind(shift_types)
        .bind(settings.shift_log_channel.map(|id| id as i64))
        .bind(settings.leave_log_channel.map(|id| id as i64))
        .bind(settings.leave_role.map(|id| id as i64))
        .bind(settings.record_log_channel.map(|id| id as i64))
        .bind(&settings.timezone)
        .bind(settings.shift_quota_minutes.map(|m| m as i64))
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }
}
