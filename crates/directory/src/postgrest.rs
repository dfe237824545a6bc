//! PostgREST user-store implementation
//!
//! Talks to the hosted data API at `{base_url}/rest/v1/users`. All
//! requests carry the project `apikey` header plus a bearer credential;
//! row visibility is enforced server-side by row-level security.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use uuid::Uuid;

use crate::{DirectoryConfig, DirectoryError, NewUserRecord, Role, UserRecord, UserStore};

const USERS_SELECT: &str = "id,full_name,email,role,created_at";

/// Real PostgREST client for the `users` table.
pub struct PostgrestDirectory {
    http: reqwest::Client,
    users_url: String,
}

impl PostgrestDirectory {
    /// Create a new PostgREST client from configuration.
    pub fn new(config: DirectoryConfig) -> Result<Self, DirectoryError> {
        if config.base_url.is_empty() || config.api_key.is_empty() {
            return Err(DirectoryError::Configuration(
                "base_url and api_key are required for the PostgREST store".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| DirectoryError::Configuration(format!("invalid api key: {e}")))?;
        api_key.set_sensitive(true);
        headers.insert("apikey", api_key);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| DirectoryError::Configuration(format!("invalid api key: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| DirectoryError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            users_url: format!("{}/rest/v1/users", config.base_url.trim_end_matches('/')),
        })
    }

    async fn expect_success(
        response: reqwest::Response,
        what: &str,
    ) -> Result<reqwest::Response, DirectoryError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response body".to_string());
        Err(DirectoryError::Response(format!(
            "{what} returned {status}: {body}"
        )))
    }
}

#[async_trait::async_trait]
impl UserStore for PostgrestDirectory {
    async fn fetch_user(&self, id: Uuid) -> Result<Option<UserRecord>, DirectoryError> {
        let response = self
            .http
            .get(&self.users_url)
            .query(&[("id", format!("eq.{id}")), ("select", USERS_SELECT.into())])
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        let response = Self::expect_success(response, "User lookup").await?;

        // PostgREST answers a filtered select with an array; an empty array
        // means the record does not exist yet (sign-up trigger race).
        let mut rows: Vec<UserRecord> = response
            .json()
            .await
            .map_err(|e| DirectoryError::Response(format!("User lookup decode failed: {e}")))?;

        Ok(rows.pop())
    }

    async fn create_user(&self, record: NewUserRecord) -> Result<(), DirectoryError> {
        // Conflict-ignore upsert: the hosted sign-up trigger may have
        // inserted the same row already, and that must not be an error.
        let response = self
            .http
            .post(&self.users_url)
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
            .json(&[&record])
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        Self::expect_success(response, "User creation").await?;
        tracing::info!(subject = %record.id, role = %record.role, "User record created");
        Ok(())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<(), DirectoryError> {
        let response = self
            .http
            .patch(&self.users_url)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "role": role }))
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        Self::expect_success(response, "Role update").await?;
        tracing::info!(subject = %id, role = %role, "Role updated");
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        full_name: Option<String>,
    ) -> Result<(), DirectoryError> {
        let response = self
            .http
            .patch(&self.users_url)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "full_name": full_name }))
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        Self::expect_success(response, "Profile update").await?;
        Ok(())
    }
}
