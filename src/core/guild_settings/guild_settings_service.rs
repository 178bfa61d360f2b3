// Guild settings service - validation and mutation of per-guild configuration.

use super::guild_settings_models::{
    is_snowflake_id, is_valid_shift_type_name, GuildSettings, LogChannelKind, RoleListKind,
    ShiftType, MAX_SHIFT_TYPES, SHIFT_TYPE_NAME_MAX, SHIFT_TYPE_NAME_MIN,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error(
        "Shift type names must be {}-{} characters of letters, digits, spaces, '-' or '_'",
        SHIFT_TYPE_NAME_MIN,
        SHIFT_TYPE_NAME_MAX
    )]
    InvalidShiftTypeName,

    #[error("A shift type named '{0}' already exists")]
    DuplicateShiftType(String),

    #[error("No shift type named '{0}'")]
    UnknownShiftType(String),

    #[error("This server already has the maximum of {} shift types", MAX_SHIFT_TYPES)]
    TooManyShiftTypes,

    #[error("'{0}' is not a valid Discord ID")]
    InvalidSnowflake(u64),

    #[error("'{0}' is not a recognised timezone")]
    InvalidTimezone(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self, guild_id: u64) -> Result<Option<GuildSettings>, SettingsError>;
    async fn save(&self, settings: &GuildSettings) -> Result<(), SettingsError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct GuildSettingsService<S: SettingsStore> {
    store: S,
    /// Serialises read-modify-write per guild so concurrent edits don't drop each other.
    write_locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl<S: SettingsStore> GuildSettingsService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_locks: DashMap::new(),
        }
    }

    /// Stored settings, or a fresh default for guilds that never ran `/config`.
    pub async fn get(&self, guild_id: u64) -> Result<GuildSettings, SettingsError> {
        Ok(self
            .store
            .load(guild_id)
            .await?
            .unwrap_or_else(|| GuildSettings::new(guild_id)))
    }

    async fn update<F>(&self, guild_id: u64, apply: F) -> Result<GuildSettings, SettingsError>
    where
        F: FnOnce(&mut GuildSettings) -> Result<(), SettingsError>,
    {
        let lock = self.write_locks.entry(guild_id).or_default().clone();
        let _held = lock.lock().await;

        let mut settings = self.get(guild_id).await?;
        apply(&mut settings)?;
        self.store.save(&settings).await?;
        Ok(settings)
    }

    pub async fn add_shift_type(
        &self,
        guild_id: u64,
        name: &str,
        access_roles: Vec<u64>,
    ) -> Result<ShiftType, SettingsError> {
        let name = name.trim().to_string();
        if !is_valid_shift_type_name(&name) {
            return Err(SettingsError::InvalidShiftTypeName);
        }
        if let Some(bad) = access_roles.iter().find(|id| !is_snowflake_id(**id)) {
            return Err(SettingsError::InvalidSnowflake(*bad));
        }

        let settings = self
            .update(guild_id, |s| {
                if s.find_shift_type(&name).is_some() {
                    return Err(SettingsError::DuplicateShiftType(name.clone()));
                }
                if s.shift_types.len() >= MAX_SHIFT_TYPES {
                    return Err(SettingsError::TooManyShiftTypes);
                }
                let is_default = s.shift_types.is_empty();
                s.shift_types.push(ShiftType {
                    name: name.clone(),
                    access_roles,
                    is_default,
                });
                Ok(())
            })
            .await?;

        tracing::info!(guild_id, shift_type = %name, "Shift type created");
        settings
            .find_shift_type(&name)
            .cloned()
            .ok_or(SettingsError::UnknownShiftType(name))
    }

    /// Remove a shift type. If it was the default, the next remaining type takes over.
    pub async fn remove_shift_type(&self, guild_id: u64, name: &str) -> Result<(), SettingsError> {
        self.update(guild_id, |s| {
            let idx = s
                .shift_types
                .iter()
                .position(|t| t.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| SettingsError::UnknownShiftType(name.to_string()))?;
            let removed = s.shift_types.remove(idx);
            if removed.is_default {
                if let Some(first) = s.shift_types.first_mut() {
                    first.is_default = true;
                }
            }
            Ok(())
        })
        .await?;

        tracing::info!(guild_id, shift_type = %name, "Shift type deleted");
        Ok(())
    }

    pub async fn set_default_shift_type(
        &self,
        guild_id: u64,
        name: &str,
    ) -> Result<(), SettingsError> {
        self.update(guild_id, |s| {
            if s.find_shift_type(name).is_none() {
                return Err(SettingsError::UnknownShiftType(name.to_string()));
            }
            for t in s.shift_types.iter_mut() {
                t.is_default = t.name.eq_ignore_ascii_case(name);
            }
            Ok(())
        })
        .await
        .map(|_| ())
    }

    /// Pick the shift type a command should use.
    ///
    /// A named type must exist. Without a name we fall back to the guild default,
    /// and guilds with no types at all get the implicit "Default" type.
    pub async fn resolve_shift_type(
        &self,
        guild_id: u64,
        name: Option<&str>,
    ) -> Result<ShiftType, SettingsError> {
        let settings = self.get(guild_id).await?;
        match name {
            Some(name) => {
                if settings.shift_types.is_empty()
                    && name.eq_ignore_ascii_case(super::IMPLICIT_SHIFT_TYPE)
                {
                    return Ok(ShiftType::implicit());
                }
                settings
                    .find_shift_type(name)
                    .cloned()
                    .ok_or_else(|| SettingsError::UnknownShiftType(name.to_string()))
            }
            None => Ok(settings
                .default_shift_type()
                .or_else(|| settings.shift_types.first())
                .cloned()
                .unwrap_or_else(ShiftType::implicit)),
        }
    }

    pub async fn set_role_list(
        &self,
        guild_id: u64,
        kind: RoleListKind,
        roles: Vec<u64>,
    ) -> Result<GuildSettings, SettingsError> {
        if let Some(bad) = roles.iter().find(|id| !is_snowflake_id(**id)) {
            return Err(SettingsError::InvalidSnowflake(*bad));
        }
        let mut roles = roles;
        roles.sort_unstable();
        roles.dedup();

        self.update(guild_id, |s| {
            match kind {
                RoleListKind::Management => s.management_roles = roles,
                RoleListKind::Staff => s.staff_roles = roles,
            }
            Ok(())
        })
        .await
    }

    pub async fn set_channel(
        &self,
        guild_id: u64,
        kind: LogChannelKind,
        channel_id: Option<u64>,
    ) -> Result<GuildSettings, SettingsError> {
        if let Some(id) = channel_id.filter(|id| !is_snowflake_id(*id)) {
            return Err(SettingsError::InvalidSnowflake(id));
        }
        self.update(guild_id, |s| {
            match kind {
                LogChannelKind::Shifts => s.shift_log_channel = channel_id,
                LogChannelKind::Leave => s.leave_log_channel = channel_id,
                LogChannelKind::Records => s.record_log_channel = channel_id,
            }
            Ok(())
        })
        .await
    }

    pub async fn set_leave_role(
        &self,
        guild_id: u64,
        role_id: Option<u64>,
    ) -> Result<GuildSettings, SettingsError> {
        if let Some(id) = role_id.filter(|id| !is_snowflake_id(*id)) {
            return Err(SettingsError::InvalidSnowflake(id));
        }
        self.update(guild_id, |s| {
            s.leave_role = role_id;
            Ok(())
        })
        .await
    }

    pub async fn set_timezone(
        &self,
        guild_id: u64,
        timezone: &str,
    ) -> Result<GuildSettings, SettingsError> {
        let tz: chrono_tz::Tz = timezone
            .trim()
            .parse()
            .map_err(|_| SettingsError::InvalidTimezone(timezone.to_string()))?;
        self.update(guild_id, |s| {
            s.timezone = tz.name().to_string();
            Ok(())
        })
        .await
    }

    pub async fn set_shift_quota(
        &self,
        guild_id: u64,
        minutes: Option<u32>,
    ) -> Result<GuildSettings, SettingsError> {
        self.update(guild_id, |s| {
            s.shift_quota_minutes = minutes.filter(|m| *m > 0);
            Ok(())
        })
        .await
    }
}

// ============================================================================
// TESTS
// ============================================================================
