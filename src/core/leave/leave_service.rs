// LOA service - request / review / expiry lifecycle.
//
// Pending -> Approved -> Ended
//         -> Denied
//         -> Cancelled
//
// Nothing here touches Discord. Role changes and DMs happen in the Discord
// layer based on what these methods return.

use super::leave_models::{
    LeaveNotice, LeaveStatus, NewLeaveNotice, MAX_LEAVE_DAYS, MIN_LEAVE_DAYS, REASON_MAX_CHARS,
    REASON_MIN_CHARS,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LeaveError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Leave must be between {} and {} days", MIN_LEAVE_DAYS, MAX_LEAVE_DAYS)]
    InvalidDuration,

    #[error(
        "The reason must be between {} and {} characters",
        REASON_MIN_CHARS,
        REASON_MAX_CHARS
    )]
    InvalidReason,

    #[error("You already have a {0} leave notice")]
    AlreadyOpen(LeaveStatus),

    #[error("No leave notice with ID {0}")]
    NotFound(i64),

    #[error("You don't have a pending leave request")]
    NothingPending,

    #[error("That leave notice is {actual}, not {expected}")]
    WrongStatus {
        expected: LeaveStatus,
        actual: LeaveStatus,
    },

    #[error("You can only manage your own leave notices")]
    NotOwner,

    #[error("Leave cannot run longer than {} days in total", MAX_LEAVE_DAYS)]
    ExtensionTooLong,

    #[error("That leave notice was changed by someone else, try again")]
    Conflict,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait LeaveStore: Send + Sync {
    async fn insert(&self, notice: NewLeaveNotice) -> Result<LeaveNotice, LeaveError>;
    async fn get(&self, guild_id: u64, id: i64) -> Result<Option<LeaveNotice>, LeaveError>;
    /// Write `notice` only if the stored row still has `prior`'s status and
    /// extension count. Returns false when another change got there first.
    async fn update(&self, prior: &LeaveNotice, notice: &LeaveNotice) -> Result<bool, LeaveError>;

    /// The member's Pending or Approved notice, if any.
    async fn open_for_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<LeaveNotice>, LeaveError>;

    async fn by_status(
        &self,
        guild_id: u64,
        status: LeaveStatus,
    ) -> Result<Vec<LeaveNotice>, LeaveError>;

    /// All of a member's notices, newest first.
    async fn for_user(&self, guild_id: u64, user_id: u64) -> Result<Vec<LeaveNotice>, LeaveError>;

    /// Approved notices in every guild whose end time is at or before `now`.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<LeaveNotice>, LeaveError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct LeaveService<S: LeaveStore> {
    store: S,
}

impl<S: LeaveStore> LeaveService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn check_duration(duration: std::time::Duration) -> Result<i64, LeaveError> {
        let secs = i64::try_from(duration.as_secs()).map_err(|_| LeaveError::InvalidDuration)?;
        let min = Duration::days(MIN_LEAVE_DAYS).num_seconds();
        let max = Duration::days(MAX_LEAVE_DAYS).num_seconds();
        if !(min..=max).contains(&secs) {
            return Err(LeaveError::InvalidDuration);
        }
        Ok(secs)
    }

    async fn load(&self, guild_id: u64, id: i64) -> Result<LeaveNotice, LeaveError> {
        self.store
            .get(guild_id, id)
            .await?
            .ok_or(LeaveError::NotFound(id))
    }

    fn expect_status(notice: &LeaveNotice, expected: LeaveStatus) -> Result<(), LeaveError> {
        if notice.status != expected {
            return Err(LeaveError::WrongStatus {
                expected,
                actual: notice.status,
            });
        }
        Ok(())
    }

    async fn commit(&self, prior: &LeaveNotice, notice: LeaveNotice) -> Result<LeaveNotice, LeaveError> {
        if self.store.update(prior, &notice).await? {
            return Ok(notice);
        }

        let current = self.load(prior.guild_id, prior.id).await?;
        if current.status != prior.status {
            return Err(LeaveError::WrongStatus {
                expected: prior.status,
                actual: current.status,
            });
        }
        Err(LeaveError::Conflict)
    }

    pub async fn request(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        duration: std::time::Duration,
    ) -> Result<LeaveNotice, LeaveError> {
        let reason = reason.trim();
        let len = reason.chars().count();
        if !(REASON_MIN_CHARS..=REASON_MAX_CHARS).contains(&len) {
            return Err(LeaveError::InvalidReason);
        }
        let duration_secs = Self::check_duration(duration)?;

        if let Some(open) = self.store.open_for_user(guild_id, user_id).await? {
            return Err(LeaveError::AlreadyOpen(open.status));
        }

        let notice = self
            .store
            .insert(NewLeaveNotice {
                guild_id,
                user_id,
                reason: reason.to_string(),
                duration_secs,
                requested_at: Utc::now(),
            })
            .await?;

        tracing::info!(guild_id, user_id, leave_id = notice.id, "LOA requested");
        Ok(notice)
    }

    /// Approve a pending notice. The leave starts now.
    pub async fn approve(
        &self,
        guild_id: u64,
        id: i64,
        reviewer_id: u64,
        note: Option<String>,
    ) -> Result<LeaveNotice, LeaveError> {
        let prior = self.load(guild_id, id).await?;
        Self::expect_status(&prior, LeaveStatus::Pending)?;

        let now = Utc::now();
        let mut notice = prior.clone();
        notice.status = LeaveStatus::Approved;
        notice.starts_at = Some(now);
        notice.ends_at = Some(now + notice.duration());
        notice.reviewer_id = Some(reviewer_id);
        notice.review_note = note;
        let notice = self.commit(&prior, notice).await?;

        tracing::info!(guild_id, leave_id = id, reviewer_id, "LOA approved");
        Ok(notice)
    }

    pub async fn deny(
        &self,
        guild_id: u64,
        id: i64,
        reviewer_id: u64,
        note: Option<String>,
    ) -> Result<LeaveNotice, LeaveError> {
        let prior = self.load(guild_id, id).await?;
        Self::expect_status(&prior, LeaveStatus::Pending)?;

        let mut notice = prior.clone();
        notice.status = LeaveStatus::Denied;
        notice.reviewer_id = Some(reviewer_id);
        notice.review_note = note;
        let notice = self.commit(&prior, notice).await?;

        tracing::info!(guild_id, leave_id = id, reviewer_id, "LOA denied");
        Ok(notice)
    }

    /// Withdraw the caller's own pending request.
    pub async fn cancel(&self, guild_id: u64, user_id: u64) -> Result<LeaveNotice, LeaveError> {
        let prior = self
            .store
            .open_for_user(guild_id, user_id)
            .await?
            .ok_or(LeaveError::NothingPending)?;
        Self::expect_status(&prior, LeaveStatus::Pending)?;

        let mut notice = prior.clone();
        notice.status = LeaveStatus::Cancelled;
        let notice = self.commit(&prior, notice).await?;

        tracing::info!(guild_id, user_id, leave_id = notice.id, "LOA cancelled");
        Ok(notice)
    }

    /// End an approved notice before its scheduled end.
    ///
    /// `acting_user` must own the notice unless `is_management` is set.
    pub async fn end_early(
        &self,
        guild_id: u64,
        id: i64,
        acting_user: u64,
        is_management: bool,
    ) -> Result<LeaveNotice, LeaveError> {
        let prior = self.load(guild_id, id).await?;
        if prior.user_id != acting_user && !is_management {
            return Err(LeaveError::NotOwner);
        }
        Self::expect_status(&prior, LeaveStatus::Approved)?;

        let mut notice = prior.clone();
        notice.status = LeaveStatus::Ended;
        notice.ends_at = Some(Utc::now());
        let notice = self.commit(&prior, notice).await?;

        tracing::info!(guild_id, leave_id = id, acting_user, "LOA ended early");
        Ok(notice)
    }

    pub async fn extend(
        &self,
        guild_id: u64,
        id: i64,
        extra: std::time::Duration,
    ) -> Result<LeaveNotice, LeaveError> {
        let prior = self.load(guild_id, id).await?;
        Self::expect_status(&prior, LeaveStatus::Approved)?;

        let extra_secs = i64::try_from(extra.as_secs()).map_err(|_| LeaveError::InvalidDuration)?;
        if extra_secs <= 0 {
            return Err(LeaveError::InvalidDuration);
        }
        let total = prior.duration_secs.saturating_add(extra_secs);
        if total > Duration::days(MAX_LEAVE_DAYS).num_seconds() {
            return Err(LeaveError::ExtensionTooLong);
        }

        let mut notice = prior.clone();
        notice.duration_secs = total;
        notice.ends_at = notice.starts_at.map(|s| s + Duration::seconds(total));
        notice.extensions += 1;
        let notice = self.commit(&prior, notice).await?;

        tracing::info!(guild_id, leave_id = id, extra_secs, "LOA extended");
        Ok(notice)
    }

    /// The member's currently running (approved) leave.
    pub async fn active_for(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<LeaveNotice>, LeaveError> {
        Ok(self
            .store
            .open_for_user(guild_id, user_id)
            .await?
            .filter(|n| n.status == LeaveStatus::Approved))
    }

    /// The member's pending or approved notice.
    pub async fn open_for(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<LeaveNotice>, LeaveError> {
        self.store.open_for_user(guild_id, user_id).await
    }

    pub async fn pending(&self, guild_id: u64) -> Result<Vec<LeaveNotice>, LeaveError> {
        self.store.by_status(guild_id, LeaveStatus::Pending).await
    }

    pub async fn active(&self, guild_id: u64) -> Result<Vec<LeaveNotice>, LeaveError> {
        self.store.by_status(guild_id, LeaveStatus::Approved).await
    }

    pub async fn history(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Vec<LeaveNotice>, LeaveError> {
        self.store.for_user(guild_id, user_id).await
    }

    /// Close every approved notice whose end time has passed.
    ///
    /// Returns the notices that were closed so callers can strip roles and notify.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<LeaveNotice>, LeaveError> {
        let due = self.store.due(now).await?;
        let mut expired = Vec::with_capacity(due.len());

        for prior in due {
            let mut notice = prior.clone();
            notice.status = LeaveStatus::Ended;
            match self.store.update(&prior, &notice).await {
                Ok(true) => expired.push(notice),
                // Ended or extended since it was read
                Ok(false) => tracing::debug!(leave_id = notice.id, "LOA changed before expiry"),
                Err(e) => tracing::error!(leave_id = notice.id, error = %e, "Failed to expire LOA"),
            }
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Expired LOA notices");
        }
        Ok(expired)
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
    use std::time::Duration as StdDuration;

    struct MockLeaveStore {
        notices: DashMap<i64, LeaveNotice>,
        next_id: AtomicI64,
    }

    impl MockLeaveStore {
        fn new() -> Self {
            Self {
                notices: DashMap::new(),
                next_id: AtomicI64::new(1),
            }
        }
    }

    #[async_trait]
    impl LeaveStore for MockLeaveStore {
        async fn insert(&self, notice: NewLeaveNotice) -> Result<LeaveNotice, LeaveError> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let stored = LeaveNotice {
                id,
                guild_id: notice.guild_id,
                user_id: notice.user_id,
                reason: notice.reason,
                duration_secs: notice.duration_secs,
                requested_at: notice.requested_at,
                starts_at: None,
                ends_at: None,
                status: LeaveStatus::Pending,
                reviewer_id: None,
                review_note: None,
                extensions: 0,
            };
            self.notices.insert(id, stored.clone());
            Ok(stored)
        }

        async fn get(&self, guild_id: u64, id: i64) -> Result<Option<LeaveNotice>, LeaveError> {
            Ok(self
                .notices
                .get(&id)
                .filter(|n| n.guild_id == guild_id)
                .map(|n| n.clone()))
        }

        async fn update(
            &self,
            prior: &LeaveNotice,
            notice: &LeaveNotice,
        ) -> Result<bool, LeaveError> {
            let Some(mut stored) = self.notices.get_mut(&notice.id) else {
                return Ok(false);
            };
            if stored.status != prior.status || stored.extensions != prior.extensions {
                return Ok(false);
            }
            *stored = notice.clone();
            Ok(true)
        }

        async fn open_for_user(
            &self,
            guild_id: u64,
            user_id: u64,
        ) -> Result<Option<LeaveNotice>, LeaveError> {
            Ok(self
                .notices
                .iter()
                .find(|n| n.guild_id == guild_id && n.user_id == user_id && n.status.is_open())
                .map(|n| n.clone()))
        }

        async fn by_status(
            &self,
            guild_id: u64,
            status: LeaveStatus,
        ) -> Result<Vec<LeaveNotice>, LeaveError> {
            Ok(self
                .notices
                .iter()
                .filter(|n| n.guild_id == guild_id && n.status == status)
                .map(|n| n.clone())
                .collect())
        }

        async fn for_user(
            &self,
            guild_id: u64,
            user_id: u64,
        ) -> Result<Vec<LeaveNotice>, LeaveError> {
            let mut list: Vec<LeaveNotice> = self
                .notices
                .iter()
                .filter(|n| n.guild_id == guild_id && n.user_id == user_id)
                .map(|n| n.clone())
                .collect();
            list.sort_by(|a, b| b.id.cmp(&a.id));
            Ok(list)
        }

        async fn due(&self, now: DateTime<Utc>) -> Result<Vec<LeaveNotice>, LeaveError> {
            Ok(self
                .notices
                .iter()
                .filter(|n| {
                    n.status == LeaveStatus::Approved && n.ends_at.map_or(false, |e| e <= now)
                })
                .map(|n| n.clone())
                .collect())
        }
    }

    const DAY: StdDuration = StdDuration::from_secs(86_400);

    #[tokio::test]
    async fn test_request_validates_input() {
        let service = LeaveService::new(MockLeaveStore::new());

        let err = service.request(1, 10, "no", DAY).await.unwrap_err();
        assert!(matches!(err, LeaveError::InvalidReason));

        let err = service
            .request(1, 10, "Vacation", StdDuration::from_secs(3_600))
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::InvalidDuration));

        let err = service
            .request(1, 10, "Vacation", DAY * 91)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::InvalidDuration));

        assert!(service.request(1, 10, "Vacation", DAY * 90).await.is_ok());
    }

    #[tokio::test]
    async fn test_only_one_open_request() {
        let service = LeaveService::new(MockLeaveStore::new());
        service.request(1, 10, "Vacation", DAY).await.unwrap();

        let err = service.request(1, 10, "Another", DAY).await.unwrap_err();
        assert!(matches!(err, LeaveError::AlreadyOpen(LeaveStatus::Pending)));
    }

    #[tokio::test]
    async fn test_approve_sets_window() {
        let service = LeaveService::new(MockLeaveStore::new());
        let notice = service.request(1, 10, "Vacation", DAY * 3).await.unwrap();

        let approved = service.approve(1, notice.id, 99, None).await.unwrap();
        assert_eq!(approved.status, LeaveStatus::Approved);
        let start = approved.starts_at.unwrap();
        assert_eq!(approved.ends_at.unwrap() - start, Duration::days(3));
        assert_eq!(approved.remaining(start), Duration::days(3));
        assert_eq!(approved.remaining(start + Duration::days(4)), Duration::zero());
        assert!(service.active_for(1, 10).await.unwrap().is_some());

        // Can't approve twice
        let err = service.approve(1, notice.id, 99, None).await.unwrap_err();
        assert!(matches!(err, LeaveError::WrongStatus { .. }));
    }

    #[tokio::test]
    async fn test_deny_and_cancel_only_from_pending() {
        let service = LeaveService::new(MockLeaveStore::new());
        let notice = service.request(1, 10, "Vacation", DAY).await.unwrap();
        let denied = service
            .deny(1, notice.id, 99, Some("Staffing".to_string()))
            .await
            .unwrap();
        assert_eq!(denied.status, LeaveStatus::Denied);

        // Denied notices free the member to ask again
        let second = service.request(1, 10, "Family", DAY).await.unwrap();
        let cancelled = service.cancel(1, 10).await.unwrap();
        assert_eq!(cancelled.id, second.id);
        assert_eq!(cancelled.status, LeaveStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_end_early_requires_owner_or_management() {
        let service = LeaveService::new(MockLeaveStore::new());
        let notice = service.request(1, 10, "Vacation", DAY).await.unwrap();
        service.approve(1, notice.id, 99, None).await.unwrap();

        let err = service.end_early(1, notice.id, 55, false).await.unwrap_err();
        assert!(matches!(err, LeaveError::NotOwner));

        let ended = service.end_early(1, notice.id, 55, true).await.unwrap();
        assert_eq!(ended.status, LeaveStatus::Ended);
        assert!(service.active_for(1, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_extend_caps_total() {
        let service = LeaveService::new(MockLeaveStore::new());
        let notice = service.request(1, 10, "Vacation", DAY * 80).await.unwrap();
        service.approve(1, notice.id, 99, None).await.unwrap();

        let extended = service.extend(1, notice.id, DAY * 5).await.unwrap();
        assert_eq!(extended.extensions, 1);
        assert_eq!(
            extended.ends_at.unwrap() - extended.starts_at.unwrap(),
            Duration::days(85)
        );

        let err = service.extend(1, notice.id, DAY * 10).await.unwrap_err();
        assert!(matches!(err, LeaveError::ExtensionTooLong));
    }

    #[tokio::test]
    async fn test_stale_transition_is_rejected() {
        let service = LeaveService::new(MockLeaveStore::new());
        let notice = service.request(1, 10, "Vacation", DAY * 5).await.unwrap();

        // A second reviewer read the notice while it was still pending
        let stale = notice.clone();
        service.approve(1, notice.id, 99, None).await.unwrap();

        let mut denied = stale.clone();
        denied.status = LeaveStatus::Denied;
        let err = service.commit(&stale, denied).await.unwrap_err();
        assert!(matches!(
            err,
            LeaveError::WrongStatus {
                expected: LeaveStatus::Pending,
                actual: LeaveStatus::Approved
            }
        ));

        // An extension landing between the expiry sweep's read and write
        let approved = service.load(1, notice.id).await.unwrap();
        service.extend(1, notice.id, DAY).await.unwrap();

        let mut ended = approved.clone();
        ended.status = LeaveStatus::Ended;
        let err = service.commit(&approved, ended).await.unwrap_err();
        assert!(matches!(err, LeaveError::Conflict));
        assert_eq!(
            service.load(1, notice.id).await.unwrap().status,
            LeaveStatus::Approved
        );
    }

    #[tokio::test]
    async fn test_expire_due() {
        let store = MockLeaveStore::new();
        let service = LeaveService::new(store);
        let notice = service.request(1, 10, "Vacation", DAY).await.unwrap();
        service.approve(1, notice.id, 99, None).await.unwrap();

        // Nothing due yet
        assert!(service.expire_due(Utc::now()).await.unwrap().is_empty());

        let later = Utc::now() + Duration::days(2);
        let expired = service.expire_due(later).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].status, LeaveStatus::Ended);
        assert!(service.active(1).await.unwrap().is_empty());
    }
}
