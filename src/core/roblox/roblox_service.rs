// Roblox username lookups.
//
// The core only knows the `RobloxDirectory` port; the HTTP client lives in
// infra. Usernames are validated locally first so obviously bad input never
// costs an API round trip.

use crate::core::records::Subject;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+(_[A-Za-z0-9]+)?$").expect("username pattern is valid"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobloxUser {
    pub id: u64,
    pub name: String,
    pub display_name: String,
}

impl RobloxUser {
    pub fn profile_url(&self) -> String {
        profile_url(self.id)
    }
}

pub fn profile_url(user_id: u64) -> String {
    format!("https://www.roblox.com/users/{}/profile", user_id)
}

/// Roblox usernames are 3-20 characters of letters and digits with at most
/// one underscore, which may not start or end the name.
pub fn is_valid_username(name: &str) -> bool {
    (3..=20).contains(&name.len()) && USERNAME.is_match(name)
}

#[derive(Debug, Error)]
pub enum RobloxError {
    #[error("'{0}' is not a valid Roblox username")]
    InvalidUsername(String),

    #[error("Roblox API error: {0}")]
    Api(String),
}

#[async_trait]
pub trait RobloxDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<RobloxUser>, RobloxError>;
    async fn get_user(&self, user_id: u64) -> Result<Option<RobloxUser>, RobloxError>;
}

pub struct RobloxService<C: RobloxDirectory> {
    client: C,
}

impl<C: RobloxDirectory> RobloxService<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub async fn lookup(&self, username: &str) -> Result<Option<RobloxUser>, RobloxError> {
        let username = username.trim();
        if !is_valid_username(username) {
            return Err(RobloxError::InvalidUsername(username.to_string()));
        }
        self.client.find_by_username(username).await
    }

    pub async fn get_user(&self, user_id: u64) -> Result<Option<RobloxUser>, RobloxError> {
        self.client.get_user(user_id).await
    }

    /// Turn typed input into a record subject.
    ///
    /// A resolved account gives the canonical spelling and id. If the API is
    /// down or doesn't know the name we still record what the officer typed.
    pub async fn resolve_subject(&self, username: &str) -> Result<Subject, RobloxError> {
        let typed = username.trim();
        match self.lookup(typed).await {
            Ok(Some(user)) => Ok(Subject {
                roblox_id: Some(user.id),
                username: user.name,
            }),
            Ok(None) => Ok(Subject {
                roblox_id: None,
                username: typed.to_string(),
            }),
            Err(RobloxError::Api(e)) => {
                tracing::warn!(username = typed, error = %e, "Roblox lookup failed, keeping typed name");
                Ok(Subject {
                    roblox_id: None,
                    username: typed.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDirectory {
        online: bool,
    }

    #[async_trait]
    impl RobloxDirectory for FakeDirectory {
        async fn find_by_username(
            &self,
            username: &str,
        ) -> Result<Option<RobloxUser>, RobloxError> {
            if !self.online {
                return Err(RobloxError::Api("connection refused".to_string()));
            }
            if username.eq_ignore_ascii_case("builderman") {
                return Ok(Some(RobloxUser {
                    id: 156,
                    name: "builderman".to_string(),
                    display_name: "builderman".to_string(),
                }));
            }
            Ok(None)
        }

        async fn get_user(&self, user_id: u64) -> Result<Option<RobloxUser>, RobloxError> {
            self.find_by_username(if user_id == 156 { "builderman" } else { "nobody" })
                .await
        }
    }

    #[test]
    fn test_username_rules() {
        assert!(is_valid_username("builderman"));
        assert!(is_valid_username("John_Doe99"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("_leading"));
        assert!(!is_valid_username("trailing_"));
        assert!(!is_valid_username("two_under_scores"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username("averyveryverylongusername"));
    }

    #[tokio::test]
    async fn test_resolve_subject_uses_canonical_name() {
        let service = RobloxService::new(FakeDirectory { online: true });
        let subject = service.resolve_subject("BuilderMan").await.unwrap();
        assert_eq!(subject.roblox_id, Some(156));
        assert_eq!(subject.username, "builderman");
    }

    #[tokio::test]
    async fn test_resolve_subject_falls_back_when_offline() {
        let service = RobloxService::new(FakeDirectory { online: false });
        let subject = service.resolve_subject("Someone").await.unwrap();
        assert_eq!(subject.roblox_id, None);
        assert_eq!(subject.username, "Someone");
    }

    #[tokio::test]
    async fn test_invalid_username_never_hits_api() {
        let service = RobloxService::new(FakeDirectory { online: false });
        let err = service.lookup("no spaces allowed").await.unwrap_err();
        assert!(matches!(err, RobloxError::InvalidUsername(_)));
    }
}
