use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::roblox::{RobloxDirectory, RobloxError, RobloxUser};

/// Client for the public Roblox users API. Only the two lookups we need.
pub struct RobloxApiClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UsernameQuery<'a> {
    usernames: [&'a str; 1],
    exclude_banned_users: bool,
}

#[derive(Deserialize)]
struct UsernameResponse {
    #[serde(default)]
    data: Vec<ApiUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUser {
    id: u64,
    name: String,
    display_name: Option<String>,
}

impl From<ApiUser> for RobloxUser {
    fn from(api: ApiUser) -> Self {
        let display_name = api
            .display_name
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| api.name.clone());
        RobloxUser {
            id: api.id,
            name: api.name,
            display_name,
        }
    }
}

fn api_err(e: impl std::fmt::Display) -> RobloxError {
    RobloxError::Api(e.to_string())
}

impl RobloxApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RobloxError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("User-Agent", HeaderValue::from_static("PatrolBot/1.0"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(api_err)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn check_status(status: StatusCode) -> Result<(), RobloxError> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RobloxError::Api("Roblox API rate limit hit".to_string()));
        }
        if !status.is_success() {
            return Err(RobloxError::Api(format!("Roblox API returned {}", status)));
        }
        Ok(())
    }
}

#[async_trait]
impl RobloxDirectory for RobloxApiClient {
    async fn find_by_username(&self, username: &str) -> Result<Option<RobloxUser>, RobloxError> {
        let url = format!("{}/v1/usernames/users", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&UsernameQuery {
                usernames: [username],
                exclude_banned_users: false,
            })
            .send()
            .await
            .map_err(api_err)?;

        Self::check_status(resp.status())?;
        let body: UsernameResponse = resp.json().await.map_err(api_err)?;
        Ok(body.data.into_iter().next().map(RobloxUser::from))
    }

    async fn get_user(&self, user_id: u64) -> Result<Option<RobloxUser>, RobloxError> {
        let url = format!("{}/v1/users/{}", self.base_url, user_id);
        let resp = self.client.get(&url).send().await.map_err(api_err)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::check_status(resp.status())?;

        let user: ApiUser = resp.json().await.map_err(api_err)?;
        Ok(Some(user.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_response_maps_first_match() {
        let raw = r#"{"data":[{"requestedUsername":"BuilderMan","hasVerifiedBadge":true,"id":156,"name":"builderman","displayName":"Builder"}]}"#;
        let body: UsernameResponse = serde_json::from_str(raw).unwrap();
        let user: Option<RobloxUser> = body.data.into_iter().next().map(RobloxUser::from);

        assert_eq!(
            user,
            Some(RobloxUser {
                id: 156,
                name: "builderman".to_string(),
                display_name: "Builder".to_string(),
            })
        );
    }

    #[test]
    fn test_empty_response_means_unknown_user() {
        let body: UsernameResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(body.data.is_empty());
    }

    #[test]
    fn test_missing_display_name_falls_back_to_name() {
        let api: ApiUser = serde_json::from_str(r#"{"id":1,"name":"Roblox","displayName":""}"#).unwrap();
        assert_eq!(RobloxUser::from(api).display_name, "Roblox");
    }

    #[test]
    fn test_query_body_shape() {
        let body = serde_json::to_value(UsernameQuery {
            usernames: ["builderman"],
            exclude_banned_users: false,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"usernames": ["builderman"], "excludeBannedUsers": false})
        );
    }

    #[test]
    fn test_rate_limit_is_an_api_error() {
        assert!(RobloxApiClient::check_status(StatusCode::OK).is_ok());
        assert!(matches!(
            RobloxApiClient::check_status(StatusCode::TOO_MANY_REQUESTS),
            Err(RobloxError::Api(_))
        ));
    }
}
