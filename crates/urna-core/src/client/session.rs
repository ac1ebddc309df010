//! Service-account session for the upstream API.
//!
//! The gate and the scheduler run outside any user's request context, so
//! they authenticate with machine credentials and cache the resulting JWT.
//! Tokens are cached for 50 minutes (upstream JWTs expire after an hour)
//! and re-minted on demand after that.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::types::ApiEnvelope;
use super::ApiError;
use crate::clock::Clock;

/// How long a minted token is reused before logging in again.
const TOKEN_CACHE_MINUTES: i64 = 50;

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Machine-credential session against the election API.
///
/// Cheap to share behind an `Arc`; concurrent callers that race past an
/// expired token each perform their own login and the last write wins,
/// which is harmless (every minted token is valid).
pub struct ServiceSession {
    http: reqwest::Client,
    base_url: String,
    email: String,
    password: SecretString,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceSession {
    /// Creates a session from explicit credentials.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        email: impl Into<String>,
        password: SecretString,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            email: email.into(),
            password,
            clock,
            cached: Mutex::new(None),
        }
    }

    /// Creates a session reading the password from an environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] when the variable is not set.
    pub fn from_env(
        http: reqwest::Client,
        base_url: impl Into<String>,
        email: impl Into<String>,
        password_env: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ApiError> {
        let password = std::env::var(password_env).map_err(|_| {
            ApiError::Configuration(format!(
                "service-account password environment variable '{password_env}' is not set"
            ))
        })?;
        Ok(Self::new(
            http,
            base_url,
            email,
            SecretString::new(password),
            clock,
        ))
    }

    /// Returns a bearer token, logging in when the cached one expired.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Authentication`] when the login is rejected and
    /// [`ApiError::Transport`] when the login endpoint is unreachable.
    pub async fn bearer_token(&self) -> Result<SecretString, ApiError> {
        let now = self.clock.now_utc();
        {
            let cached = self.cached.lock().expect("token cache lock poisoned");
            if let Some(entry) = cached.as_ref() {
                if entry.is_fresh(now) {
                    debug!("using cached service token");
                    return Ok(entry.token.clone());
                }
            }
        }

        let token = self.login().await?;
        let mut cached = self.cached.lock().expect("token cache lock poisoned");
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: now + Duration::minutes(TOKEN_CACHE_MINUTES),
        });
        info!("service token minted and cached");
        Ok(token)
    }

    /// Drops the cached token so the next call performs a fresh login.
    ///
    /// Called when the upstream answers 401 to a cached token that should
    /// still have been fresh.
    pub fn forget_token(&self) {
        let mut cached = self.cached.lock().expect("token cache lock poisoned");
        *cached = None;
    }

    async fn login(&self) -> Result<SecretString, ApiError> {
        let url = format!("{}/api/auth/admin/login", self.base_url);
        let body = serde_json::json!({
            "email": self.email,
            "password": self.password.expose_secret(),
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "service login rejected");
            return Err(ApiError::Authentication(format!(
                "service login failed with status {}",
                status.as_u16()
            )));
        }

        let envelope: ApiEnvelope<LoginData> = response.json().await.map_err(ApiError::from)?;
        let data = envelope.data.ok_or_else(|| {
            ApiError::Authentication("login response carried no token".to_string())
        })?;
        Ok(SecretString::new(data.token))
    }
}

impl std::fmt::Debug for ServiceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceSession")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn cached_token_freshness_window() {
        let minted = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let entry = CachedToken {
            token: SecretString::new("jwt".to_string()),
            expires_at: minted + Duration::minutes(TOKEN_CACHE_MINUTES),
        };

        assert!(entry.is_fresh(minted));
        assert!(entry.is_fresh(minted + Duration::minutes(49)));
        assert!(!entry.is_fresh(minted + Duration::minutes(50)));
        assert!(!entry.is_fresh(minted + Duration::hours(2)));
    }

    #[test]
    fn from_env_requires_variable() {
        let clock: Arc<dyn Clock> = Arc::new(crate::clock::SystemClock);
        let result = ServiceSession::from_env(
            reqwest::Client::new(),
            "http://localhost:5110",
            "svc@example.com",
            "URNA_SESSION_TEST_UNSET_VAR",
            clock,
        );
        assert!(matches!(result, Err(ApiError::Configuration(_))));
    }
}
