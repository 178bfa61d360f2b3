// Shift service - the duty clock.
//
// Handles:
// - starting a shift (one open shift per member per guild)
// - toggling breaks
// - ending / voiding shifts
// - history and leaderboard reports
//
// Shift type access is checked here from plain role IDs; the Discord layer
// just passes the member's roles in.

use super::shift_models::{Shift, ShiftBreak, ShiftFilter, ShiftStatus, ShiftSummary};
use crate::core::guild_settings::ShiftType;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ShiftError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("You are already on duty ({0} shift)")]
    AlreadyOnDuty(String),

    #[error("You are not on duty")]
    NotOnDuty,

    #[error("You don't have a role that can start {0} shifts")]
    AccessDenied(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait ShiftStore: Send + Sync {
    /// Persist a new shift and return it with its assigned id.
    async fn insert_shift(
        &self,
        guild_id: u64,
        user_id: u64,
        shift_type: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Shift, ShiftError>;

    /// The member's unfinished shift, if any.
    async fn active_shift(&self, guild_id: u64, user_id: u64) -> Result<Option<Shift>, ShiftError>;

    /// Write back `ended_at` and `breaks`.
    async fn update_shift(&self, shift: &Shift) -> Result<(), ShiftError>;

    async fn delete_shift(&self, shift_id: i64) -> Result<(), ShiftError>;

    /// Finished shifts for one member, newest first.
    async fn user_shifts(
        &self,
        guild_id: u64,
        user_id: u64,
        limit: usize,
    ) -> Result<Vec<Shift>, ShiftError>;

    /// Finished shifts in a guild matching the filter.
    async fn guild_shifts(
        &self,
        guild_id: u64,
        filter: &ShiftFilter,
    ) -> Result<Vec<Shift>, ShiftError>;

    /// Every unfinished shift in a guild.
    async fn active_shifts(&self, guild_id: u64) -> Result<Vec<Shift>, ShiftError>;

    /// Delete shifts matching the filter's shift type. Returns how many were removed.
    async fn delete_shifts(&self, guild_id: u64, filter: &ShiftFilter) -> Result<u64, ShiftError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ShiftService<S: ShiftStore> {
    store: S,
}

impl<S: ShiftStore> ShiftService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Clock a member in.
    pub async fn start(
        &self,
        guild_id: u64,
        user_id: u64,
        shift_type: &ShiftType,
        member_roles: &[u64],
    ) -> Result<Shift, ShiftError> {
        if let Some(active) = self.store.active_shift(guild_id, user_id).await? {
            return Err(ShiftError::AlreadyOnDuty(active.shift_type));
        }
        if !shift_type.allows(member_roles) {
            return Err(ShiftError::AccessDenied(shift_type.name.clone()));
        }

        let shift = self
            .store
            .insert_shift(guild_id, user_id, &shift_type.name, Utc::now())
            .await?;

        tracing::info!(
            guild_id,
            user_id,
            shift_id = shift.id,
            shift_type = %shift.shift_type,
            "Shift started"
        );
        Ok(shift)
    }

    /// Start a break when on duty, or end the open one when already on break.
    pub async fn toggle_break(&self, guild_id: u64, user_id: u64) -> Result<Shift, ShiftError> {
        let mut shift = self
            .store
            .active_shift(guild_id, user_id)
            .await?
            .ok_or(ShiftError::NotOnDuty)?;
        let now = Utc::now();

        match shift.status() {
            ShiftStatus::OnBreak => {
                if let Some(open) = shift.breaks.iter_mut().find(|b| b.ended_at.is_none()) {
                    open.ended_at = Some(now);
                }
            }
            ShiftStatus::OnDuty => shift.breaks.push(ShiftBreak {
                started_at: now,
                ended_at: None,
            }),
            ShiftStatus::Ended => return Err(ShiftError::NotOnDuty),
        }

        self.store.update_shift(&shift).await?;
        tracing::debug!(guild_id, user_id, status = %shift.status(), "Break toggled");
        Ok(shift)
    }

    /// Clock a member out, closing any open break.
    pub async fn end(&self, guild_id: u64, user_id: u64) -> Result<Shift, ShiftError> {
        let mut shift = self
            .store
            .active_shift(guild_id, user_id)
            .await?
            .ok_or(ShiftError::NotOnDuty)?;
        let now = Utc::now();

        for b in shift.breaks.iter_mut().filter(|b| b.ended_at.is_none()) {
            b.ended_at = Some(now);
        }
        shift.ended_at = Some(now);
        self.store.update_shift(&shift).await?;

        tracing::info!(
            guild_id,
            user_id,
            shift_id = shift.id,
            duty_secs = shift.duty_time(now).num_seconds(),
            "Shift ended"
        );
        Ok(shift)
    }

    /// Throw away the member's active shift without counting it.
    pub async fn void(&self, guild_id: u64, user_id: u64) -> Result<Shift, ShiftError> {
        let shift = self
            .store
            .active_shift(guild_id, user_id)
            .await?
            .ok_or(ShiftError::NotOnDuty)?;
        self.store.delete_shift(shift.id).await?;

        tracing::info!(guild_id, user_id, shift_id = shift.id, "Shift voided");
        Ok(shift)
    }

    pub async fn active(&self, guild_id: u64, user_id: u64) -> Result<Option<Shift>, ShiftError> {
        self.store.active_shift(guild_id, user_id).await
    }

    pub async fn active_in_guild(&self, guild_id: u64) -> Result<Vec<Shift>, ShiftError> {
        self.store.active_shifts(guild_id).await
    }

    pub async fn history(
        &self,
        guild_id: u64,
        user_id: u64,
        limit: usize,
    ) -> Result<Vec<Shift>, ShiftError> {
        self.store.user_shifts(guild_id, user_id, limit).await
    }

    /// Lifetime totals for one member (finished shifts only).
    pub async fn summary(&self, guild_id: u64, user_id: u64) -> Result<ShiftSummary, ShiftError> {
        let shifts = self.store.user_shifts(guild_id, user_id, usize::MAX).await?;
        let now = Utc::now();
        Ok(ShiftSummary {
            user_id,
            shift_count: shifts.len() as u32,
            total: shifts
                .iter()
                .map(|s| s.duty_time(now))
                .fold(Duration::zero(), |acc, d| acc + d),
        })
    }

    /// Per-member totals, highest first. Ties are broken by user id so the
    /// order is stable between calls.
    pub async fn leaderboard(
        &self,
        guild_id: u64,
        filter: &ShiftFilter,
    ) -> Result<Vec<ShiftSummary>, ShiftError> {
        let shifts = self.store.guild_shifts(guild_id, filter).await?;
        let now = Utc::now();

        let mut totals: HashMap<u64, ShiftSummary> = HashMap::new();
        for shift in &shifts {
            let entry = totals.entry(shift.user_id).or_insert(ShiftSummary {
                user_id: shift.user_id,
                shift_count: 0,
                total: Duration::zero(),
            });
            entry.shift_count += 1;
            entry.total = entry.total + shift.duty_time(now);
        }

        let mut board: Vec<ShiftSummary> = totals.into_values().collect();
        board.sort_by(|a, b| b.total.cmp(&a.total).then(a.user_id.cmp(&b.user_id)));
        Ok(board)
    }

    /// Delete recorded shifts for the whole guild (optionally one type only).
    pub async fn wipe(&self, guild_id: u64, shift_type: Option<String>) -> Result<u64, ShiftError> {
        let filter = ShiftFilter {
            shift_type,
            since: None,
        };
        let removed = self.store.delete_shifts(guild_id, &filter).await?;
        tracing::warn!(guild_id, removed, shift_type = ?filter.shift_type, "Shifts wiped");
        Ok(removed)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// In-memory store for testing
    struct MockShiftStore {
        shifts: DashMap<i64, Shift>,
        next_id: AtomicI64,
    }

    impl MockShiftStore {
        fn new() -> Self {
            Self {
                shifts: DashMap::new(),
                next_id: AtomicI64::new(1),
            }
        }

        fn matches(shift: &Shift, filter: &ShiftFilter) -> bool {
            filter
                .shift_type
                .as_ref()
                .map_or(true, |t| shift.shift_type.eq_ignore_ascii_case(t))
                && filter.since.map_or(true, |since| shift.started_at >= since)
        }
    }

    #[async_trait]
    impl ShiftStore for MockShiftStore {
        async fn insert_shift(
            &self,
            guild_id: u64,
            user_id: u64,
            shift_type: &str,
            started_at: DateTime<Utc>,
        ) -> Result<Shift, ShiftError> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let shift = Shift {
                id,
                guild_id,
                user_id,
                shift_type: shift_type.to_string(),
                started_at,
                ended_at: None,
                breaks: Vec::new(),
            };
            self.shifts.insert(id, shift.clone());
            Ok(shift)
        }

        async fn active_shift(
            &self,
            guild_id: u64,
            user_id: u64,
        ) -> Result<Option<Shift>, ShiftError> {
            Ok(self
                .shifts
                .iter()
                .find(|s| s.guild_id == guild_id && s.user_id == user_id && s.ended_at.is_none())
                .map(|s| s.clone()))
        }

        async fn update_shift(&self, shift: &Shift) -> Result<(), ShiftError> {
            self.shifts.insert(shift.id, shift.clone());
            Ok(())
        }

        async fn delete_shift(&self, shift_id: i64) -> Result<(), ShiftError> {
            self.shifts.remove(&shift_id);
            Ok(())
        }

        async fn user_shifts(
            &self,
            guild_id: u64,
            user_id: u64,
            limit: usize,
        ) -> Result<Vec<Shift>, ShiftError> {
            let mut shifts: Vec<Shift> = self
                .shifts
                .iter()
                .filter(|s| s.guild_id == guild_id && s.user_id == user_id && s.ended_at.is_some())
                .map(|s| s.clone())
                .collect();
            shifts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            shifts.truncate(limit);
            Ok(shifts)
        }

        async fn guild_shifts(
            &self,
            guild_id: u64,
            filter: &ShiftFilter,
        ) -> Result<Vec<Shift>, ShiftError> {
            Ok(self
                .shifts
                .iter()
                .filter(|s| {
                    s.guild_id == guild_id && s.ended_at.is_some() && Self::matches(s, filter)
                })
                .map(|s| s.clone())
                .collect())
        }

        async fn active_shifts(&self, guild_id: u64) -> Result<Vec<Shift>, ShiftError> {
            Ok(self
                .shifts
                .iter()
                .filter(|s| s.guild_id == guild_id && s.ended_at.is_none())
                .map(|s| s.clone())
                .collect())
        }

        async fn delete_shifts(
            &self,
            guild_id: u64,
            filter: &ShiftFilter,
        ) -> Result<u64, ShiftError> {
            let before = self.shifts.len();
            self.shifts
                .retain(|_, s| !(s.guild_id == guild_id && Self::matches(s, filter)));
            Ok((before - self.shifts.len()) as u64)
        }
    }

    fn patrol() -> ShiftType {
        ShiftType {
            name: "Patrol".to_string(),
            access_roles: Vec::new(),
            is_default: true,
        }
    }

    #[tokio::test]
    async fn test_start_and_end_shift() {
        let service = ShiftService::new(MockShiftStore::new());

        let shift = service.start(1, 10, &patrol(), &[]).await.unwrap();
        assert_eq!(shift.status(), ShiftStatus::OnDuty);

        let ended = service.end(1, 10).await.unwrap();
        assert_eq!(ended.status(), ShiftStatus::Ended);
        assert!(service.active(1, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cannot_start_twice() {
        let service = ShiftService::new(MockShiftStore::new());
        service.start(1, 10, &patrol(), &[]).await.unwrap();

        let err = service.start(1, 10, &patrol(), &[]).await.unwrap_err();
        assert!(matches!(err, ShiftError::AlreadyOnDuty(t) if t == "Patrol"));

        // A different guild is independent
        assert!(service.start(2, 10, &patrol(), &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_access_roles_enforced() {
        let service = ShiftService::new(MockShiftStore::new());
        let swat = ShiftType {
            name: "SWAT".to_string(),
            access_roles: vec![99],
            is_default: false,
        };

        let err = service.start(1, 10, &swat, &[1, 2]).await.unwrap_err();
        assert!(matches!(err, ShiftError::AccessDenied(_)));

        assert!(service.start(1, 10, &swat, &[99]).await.is_ok());
    }

    #[tokio::test]
    async fn test_break_toggle() {
        let service = ShiftService::new(MockShiftStore::new());

        let err = service.toggle_break(1, 10).await.unwrap_err();
        assert!(matches!(err, ShiftError::NotOnDuty));

        service.start(1, 10, &patrol(), &[]).await.unwrap();
        let on_break = service.toggle_break(1, 10).await.unwrap();
        assert_eq!(on_break.status(), ShiftStatus::OnBreak);

        let back = service.toggle_break(1, 10).await.unwrap();
        assert_eq!(back.status(), ShiftStatus::OnDuty);
        assert_eq!(back.breaks.len(), 1);
    }

    #[tokio::test]
    async fn test_end_closes_open_break() {
        let service = ShiftService::new(MockShiftStore::new());
        service.start(1, 10, &patrol(), &[]).await.unwrap();
        service.toggle_break(1, 10).await.unwrap();

        let ended = service.end(1, 10).await.unwrap();
        assert!(ended.breaks.iter().all(|b| b.ended_at.is_some()));
    }

    #[tokio::test]
    async fn test_void_removes_shift() {
        let service = ShiftService::new(MockShiftStore::new());
        service.start(1, 10, &patrol(), &[]).await.unwrap();

        service.void(1, 10).await.unwrap();

        assert!(service.active(1, 10).await.unwrap().is_none());
        assert!(service.history(1, 10, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_total() {
        let store = MockShiftStore::new();
        let start = Utc::now() - Duration::hours(5);

        // user 10: one hour, user 20: two hours
        let mut a = store.insert_shift(1, 10, "Patrol", start).await.unwrap();
        a.ended_at = Some(start + Duration::hours(1));
        store.update_shift(&a).await.unwrap();

        let mut b = store.insert_shift(1, 20, "Patrol", start).await.unwrap();
        b.ended_at = Some(start + Duration::hours(2));
        store.update_shift(&b).await.unwrap();

        let service = ShiftService::new(store);
        let board = service
            .leaderboard(1, &ShiftFilter::default())
            .await
            .unwrap();

        assert_eq!(board.len(), 2);
        assert_eq!(board[0].user_id, 20);
        assert_eq!(board[0].total, Duration::hours(2));
        assert_eq!(board[1].user_id, 10);
    }

    #[tokio::test]
    async fn test_wipe_by_type() {
        let store = MockShiftStore::new();
        let start = Utc::now() - Duration::hours(2);
        for (user, kind) in [(10, "Patrol"), (20, "Traffic")] {
            let mut s = store.insert_shift(1, user, kind, start).await.unwrap();
            s.ended_at = Some(start + Duration::hours(1));
            store.update_shift(&s).await.unwrap();
        }

        let service = ShiftService::new(store);
        let removed = service.wipe(1, Some("patrol".to_string())).await.unwrap();
        assert_eq!(removed, 1);

        let board = service
            .leaderboard(1, &ShiftFilter::default())
            .await
            .unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].user_id, 20);
    }
}
