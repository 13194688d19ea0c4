//! Bitrix24 time-tracking client.
//!
//! Implements [`TimeSink`] over the Bitrix24 REST API: elapsed seconds go
//! to `task.elapseditem.add`, and expired OAuth tokens are refreshed
//! through `/oauth/token/` before the call. Tokens live in the OS keyring;
//! the portal URL and client credentials come from the TOML config.
//!
//! The client owns a small tokio runtime so it can be driven from
//! synchronous call sites.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::keyring_store;
use super::traits::TimeSink;
use crate::error::CrmError;
use crate::storage::CrmConfig;

const TOKENS_KEY: &str = "bitrix_tokens";
const EXPIRY_BUFFER_SECS: i64 = 60;

/// OAuth token pair for the portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitrixTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp; `None` means the expiry is unknown and the token
    /// is used as-is.
    pub expires_at: Option<i64>,
}

impl BitrixTokens {
    /// Whether the access token is past (or within 60s of) its expiry.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => chrono::Utc::now().timestamp() > exp - EXPIRY_BUFFER_SECS,
            None => false,
        }
    }
}

/// Bitrix24 implementation of [`TimeSink`].
pub struct BitrixClient {
    base_url: String,
    client_id: String,
    client_secret: String,
    rt: tokio::runtime::Runtime,
    http: reqwest::Client,
    tokens: Mutex<Option<BitrixTokens>>,
    persist: bool,
}

impl BitrixClient {
    /// Build a client from config, loading stored tokens from the keyring.
    ///
    /// A missing or unreachable keyring leaves the client unauthenticated
    /// rather than failing, so read-only commands keep working.
    pub fn new(cfg: &CrmConfig) -> Result<Self, CrmError> {
        let tokens = match keyring_store::get(TOKENS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "keyring unavailable, starting unauthenticated");
                None
            }
        };
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            rt: tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?,
            http: reqwest::Client::new(),
            tokens: Mutex::new(tokens),
            persist: true,
        })
    }

    /// Client with an explicit base URL and tokens, no keyring persistence
    /// (for tests).
    pub fn with_base(base_url: &str, tokens: BitrixTokens) -> Result<Self, CrmError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            rt: tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?,
            http: reqwest::Client::new(),
            tokens: Mutex::new(Some(tokens)),
            persist: false,
        })
    }

    /// Store a token pair, both in memory and in the keyring.
    pub fn set_tokens(&self, tokens: BitrixTokens) -> Result<(), CrmError> {
        if self.persist {
            let raw = serde_json::to_string(&tokens)
                .map_err(|e| CrmError::Credentials(e.to_string()))?;
            keyring_store::set(TOKENS_KEY, &raw)
                .map_err(|e| CrmError::Credentials(e.to_string()))?;
        }
        *self.lock_tokens() = Some(tokens);
        Ok(())
    }

    /// Remove stored tokens.
    pub fn logout(&self) -> Result<(), CrmError> {
        if self.persist {
            keyring_store::delete(TOKENS_KEY)
                .map_err(|e| CrmError::Credentials(e.to_string()))?;
        }
        *self.lock_tokens() = None;
        Ok(())
    }

    fn lock_tokens(&self) -> MutexGuard<'_, Option<BitrixTokens>> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The portal base URL, validated.
    fn portal(&self) -> Result<&str, CrmError> {
        if self.base_url.is_empty() {
            return Err(CrmError::NotConfigured);
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| CrmError::BadUrl(format!("{}: {e}", self.base_url)))?;
        Ok(&self.base_url)
    }

    /// A valid access token, refreshing through the portal first if the
    /// stored one has expired.
    fn ensure_access_token(&self) -> Result<String, CrmError> {
        let tokens = self
            .lock_tokens()
            .clone()
            .ok_or(CrmError::NotAuthenticated { service: "bitrix24" })?;
        if !tokens.is_expired() {
            return Ok(tokens.access_token);
        }

        tracing::debug!("access token expired, refreshing");
        let refreshed = self.rt.block_on(self.refresh(&tokens.refresh_token))?;
        let access = refreshed.access_token.clone();
        self.set_tokens(refreshed)?;
        Ok(access)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<BitrixTokens, CrmError> {
        let url = format!("{}/oauth/token/", self.portal()?);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;
        let body: serde_json::Value = resp.json().await?;

        if let Some(error) = body.get("error") {
            let desc = body
                .get("error_description")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            return Err(CrmError::TokenRefresh(
                format!("{error} {desc}").trim().to_string(),
            ));
        }

        let access_token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if access_token.is_empty() {
            return Err(CrmError::TokenRefresh("no access_token in response".into()));
        }

        let expires_in = body.get("expires_in").and_then(|v| v.as_i64());
        Ok(BitrixTokens {
            access_token,
            // The portal may rotate the refresh token; keep the old one
            // when it doesn't.
            refresh_token: body
                .get("refresh_token")
                .and_then(|v| v.as_str())
                .map(String::from)
                .unwrap_or_else(|| refresh_token.to_string()),
            expires_at: expires_in.map(|ei| chrono::Utc::now().timestamp() + ei),
        })
    }
}

impl TimeSink for BitrixClient {
    fn name(&self) -> &str {
        "bitrix24"
    }

    fn is_authenticated(&self) -> bool {
        self.lock_tokens().is_some()
    }

    fn submit_elapsed_time(
        &self,
        task_ref: i64,
        crm_user: i64,
        seconds: i64,
        note: &str,
    ) -> Result<(), CrmError> {
        let token = self.ensure_access_token()?;
        let url = format!("{}/rest/task.elapseditem.add", self.portal()?);
        let payload = json!({
            "auth": token,
            "TASKID": task_ref,
            "ARFIELDS": {
                "SECONDS": seconds,
                "COMMENT_TEXT": note,
                "USER_ID": crm_user,
            },
        });

        let body: serde_json::Value = self.rt.block_on(async {
            self.http
                .post(&url)
                .json(&payload)
                .send()
                .await?
                .json()
                .await
        })?;

        if let Some(error) = body.get("error") {
            let desc = body
                .get("error_description")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            return Err(CrmError::Api(format!("{error} {desc}").trim().to_string()));
        }
        if body.get("result").is_none() {
            return Err(CrmError::Api("response carried no result".into()));
        }

        tracing::debug!(task = task_ref, seconds, "elapsed time submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn fresh_tokens() -> BitrixTokens {
        BitrixTokens {
            access_token: "token-1".into(),
            refresh_token: "refresh-1".into(),
            expires_at: None,
        }
    }

    fn expired_tokens() -> BitrixTokens {
        BitrixTokens {
            access_token: "stale".into(),
            refresh_token: "refresh-1".into(),
            expires_at: Some(chrono::Utc::now().timestamp() - 600),
        }
    }

    #[test]
    fn submit_posts_payload_and_accepts_result() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/rest/task.elapseditem.add")
            .match_body(Matcher::PartialJson(json!({
                "auth": "token-1",
                "TASKID": 42,
                "ARFIELDS": { "SECONDS": 5400, "COMMENT_TEXT": "non-qc", "USER_ID": 99 },
            })))
            .with_status(200)
            .with_body(r#"{"result": 1234}"#)
            .create();

        let client = BitrixClient::with_base(&server.url(), fresh_tokens()).unwrap();
        client.submit_elapsed_time(42, 99, 5400, "non-qc").unwrap();
        mock.assert();
    }

    #[test]
    fn api_error_payload_is_an_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/rest/task.elapseditem.add")
            .with_status(200)
            .with_body(r#"{"error":"TASK_NOT_FOUND","error_description":"No task"}"#)
            .create();

        let client = BitrixClient::with_base(&server.url(), fresh_tokens()).unwrap();
        let err = client.submit_elapsed_time(42, 99, 60, "").unwrap_err();
        assert!(matches!(err, CrmError::Api(_)));
        assert!(err.to_string().contains("TASK_NOT_FOUND"));
    }

    #[test]
    fn expired_token_refreshes_before_submitting() {
        let mut server = mockito::Server::new();
        let refresh_mock = server
            .mock("GET", "/oauth/token/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"token-2","refresh_token":"refresh-2","expires_in":3600}"#)
            .create();
        let submit_mock = server
            .mock("POST", "/rest/task.elapseditem.add")
            .match_body(Matcher::PartialJson(json!({ "auth": "token-2" })))
            .with_status(200)
            .with_body(r#"{"result": 1}"#)
            .create();

        let client = BitrixClient::with_base(&server.url(), expired_tokens()).unwrap();
        client.submit_elapsed_time(42, 99, 60, "qc").unwrap();
        refresh_mock.assert();
        submit_mock.assert();
    }

    #[test]
    fn rejected_refresh_is_a_token_refresh_error() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/oauth/token/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create();

        let client = BitrixClient::with_base(&server.url(), expired_tokens()).unwrap();
        let err = client.submit_elapsed_time(42, 99, 60, "").unwrap_err();
        assert!(matches!(err, CrmError::TokenRefresh(_)));
    }

    #[test]
    fn submit_without_tokens_is_not_authenticated() {
        let client = BitrixClient::with_base("http://localhost:9", fresh_tokens()).unwrap();
        client.logout().unwrap();
        assert!(!client.is_authenticated());
        let err = client.submit_elapsed_time(42, 99, 60, "").unwrap_err();
        assert!(matches!(err, CrmError::NotAuthenticated { .. }));
    }

    #[test]
    fn empty_base_url_is_not_configured() {
        let client = BitrixClient::with_base("", fresh_tokens()).unwrap();
        let err = client.submit_elapsed_time(42, 99, 60, "").unwrap_err();
        assert!(matches!(err, CrmError::NotConfigured));
    }
}
