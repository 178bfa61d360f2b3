// Callsign registry. One callsign per member, unique within a guild.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static CALLSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9-]{0,9}$").expect("callsign pattern is valid"));

#[derive(Debug, Clone, PartialEq)]
pub struct Callsign {
    pub guild_id: u64,
    pub user_id: u64,
    pub callsign: String,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum CallsignError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Callsigns are 1-10 letters, digits or dashes and can't start with a dash")]
    Invalid,

    #[error("{callsign} is already assigned to <@{holder}>")]
    Taken { callsign: String, holder: u64 },

    #[error("That member has no callsign")]
    NotAssigned,
}

#[async_trait]
pub trait CallsignStore: Send + Sync {
    async fn find_by_callsign(
        &self,
        guild_id: u64,
        callsign: &str,
    ) -> Result<Option<Callsign>, CallsignError>;
    async fn find_by_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<Callsign>, CallsignError>;
    /// Insert or replace the member's callsign.
    async fn upsert(&self, callsign: &Callsign) -> Result<(), CallsignError>;
    /// Returns false when the member had none.
    async fn remove(&self, guild_id: u64, user_id: u64) -> Result<bool, CallsignError>;
    /// All callsigns in a guild, sorted by callsign.
    async fn list(&self, guild_id: u64) -> Result<Vec<Callsign>, CallsignError>;
}

pub fn normalize_callsign(input: &str) -> Result<String, CallsignError> {
    let normalized = input.trim().to_uppercase();
    if CALLSIGN.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(CallsignError::Invalid)
    }
}

pub struct CallsignService<S: CallsignStore> {
    store: S,
}

impl<S: CallsignStore> CallsignService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Give `user_id` the callsign, replacing any they already held.
    pub async fn assign(
        &self,
        guild_id: u64,
        user_id: u64,
        callsign: &str,
    ) -> Result<Callsign, CallsignError> {
        let callsign = normalize_callsign(callsign)?;

        if let Some(existing) = self.store.find_by_callsign(guild_id, &callsign).await? {
            if existing.user_id != user_id {
                return Err(CallsignError::Taken {
                    callsign,
                    holder: existing.user_id,
                });
            }
        }

        let record = Callsign {
            guild_id,
            user_id,
            callsign,
            assigned_at: Utc::now(),
        };
        self.store.upsert(&record).await?;

        tracing::info!(guild_id, user_id, callsign = %record.callsign, "Callsign assigned");
        Ok(record)
    }

    pub async fn release(&self, guild_id: u64, user_id: u64) -> Result<(), CallsignError> {
        if !self.store.remove(guild_id, user_id).await? {
            return Err(CallsignError::NotAssigned);
        }
        tracing::info!(guild_id, user_id, "Callsign released");
        Ok(())
    }

    pub async fn for_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<Callsign>, CallsignError> {
        self.store.find_by_user(guild_id, user_id).await
    }

    pub async fn list(&self, guild_id: u64) -> Result<Vec<Callsign>, CallsignError> {
        self.store.list(guild_id).await
    }
}
