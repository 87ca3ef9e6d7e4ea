//! `TokenManager` - token acquisition, session caching, expiry and renewal.
#![allow(clippy::future_not_send)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::instrument;

use super::api::LocalTransport;
use super::clock::Clock;
use super::error::RequestError;
use super::response::{LoginGrant, SuccessPolicy, check_envelope, parse_body};
use super::session::{SessionStore, TOKEN_KEY, TOKEN_TIMEOUT_KEY};
use super::transport::{ApiRequest, HttpMethod, LastRequest, RawResponse};

/// Path of the login endpoint.
pub const LOGIN_PATH: &str = "Authentication/v1.0/Login";

/// Default timeout for login requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A bearer token and the instant it stops being valid.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    /// Opaque token value.
    pub value: String,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Returns `true` once `now` has reached the expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Request and response of the most recent login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginExchange {
    /// Login request, with the password masked.
    pub request: LastRequest,
    /// Raw response, if one arrived.
    pub response: Option<RawResponse>,
}

/// Lifecycle state of the in-memory token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No token held (never acquired, or the last renewal failed).
    NoToken,
    /// A token is held and has not reached its expiry.
    Valid,
    /// A token is held but its expiry has passed.
    Expired,
}

/// Owns the token lifecycle for one client.
///
/// Lookup order on every [`TokenManager::get_token`] call:
/// 1. the in-memory token, if not expired;
/// 2. the session store, if its stored expiry is still in the future;
/// 3. a renewal through the login endpoint, written back to the store.
#[allow(clippy::module_name_repetitions)]
pub struct TokenManager {
    /// API login ID.
    login: String,
    /// API password.
    password: String,
    /// Timeout for login requests.
    timeout: Duration,
    /// Session store shared with other clients of the same session.
    store: Arc<dyn SessionStore>,
    /// Time source for expiry checks.
    clock: Arc<dyn Clock>,
    /// Token currently held.
    token: Option<Token>,
    /// Login attempt not yet collected by the client.
    login_exchange: Option<LoginExchange>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("store", &self.store)
            .field("clock", &self.clock)
            .field("token", &self.token)
            .field("login_exchange", &self.login_exchange)
            .finish()
    }
}

impl TokenManager {
    /// Creates a manager with no token held.
    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
            store,
            clock,
            token: None,
            login_exchange: None,
        }
    }

    /// Sets the timeout for login requests (default: 10s).
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the token currently held, expired or not.
    #[must_use]
    pub const fn current(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Returns the token currently held if it has not expired.
    #[must_use]
    pub fn valid(&self) -> Option<&Token> {
        let now = self.clock.now();
        self.token.as_ref().filter(|token| !token.is_expired_at(now))
    }

    /// Takes the record of the last login attempt, if any happened since
    /// the previous call.
    pub const fn take_login_exchange(&mut self) -> Option<LoginExchange> {
        self.login_exchange.take()
    }

    /// Returns the lifecycle state of the in-memory token.
    #[must_use]
    pub fn state(&self) -> TokenState {
        match &self.token {
            None => TokenState::NoToken,
            Some(token) if token.is_expired_at(self.clock.now()) => TokenState::Expired,
            Some(_) => TokenState::Valid,
        }
    }

    /// Returns a token that is valid now, renewing it if needed.
    ///
    /// # Errors
    ///
    /// Returns the renewal failure. The in-memory token is cleared and the
    /// session store is left untouched.
    #[instrument(skip_all)]
    pub async fn get_token<T: LocalTransport>(
        &mut self,
        transport: &T,
    ) -> Result<String, RequestError> {
        let now = self.clock.now();

        if let Some(token) = self.token.as_ref().filter(|t| !t.is_expired_at(now)) {
            tracing::debug!(expires_at = %token.expires_at, "Reusing in-memory token");
            return Ok(token.value.clone());
        }

        if let Some(token) = self.load_cached(now) {
            tracing::debug!(expires_at = %token.expires_at, "Adopted token from session store");
            let value = token.value.clone();
            self.token = Some(token);
            return Ok(value);
        }

        self.renew(transport).await
    }

    /// Requests a new token from the login endpoint.
    async fn renew<T: LocalTransport>(&mut self, transport: &T) -> Result<String, RequestError> {
        let request = ApiRequest::new(
            HttpMethod::Get,
            LOGIN_PATH,
            &[
                ("login", self.login.clone()),
                ("password", self.password.clone()),
            ],
            self.timeout,
        );

        let (outcome, response) = match transport.send(&request).await {
            Ok(raw) => {
                let outcome = parse_body(&raw.body).and_then(|body| {
                    check_envelope(&body, SuccessPolicy::TokenRequired)?;
                    LoginGrant::from_response(&body)
                });
                (outcome, Some(raw))
            }
            Err(e) => (Err(RequestError::Transport(format!("{e:#}"))), None),
        };
        self.login_exchange = Some(LoginExchange {
            request: LastRequest::from(&request),
            response,
        });

        match outcome {
            Ok(grant) => {
                let token = Token {
                    value: grant.token,
                    expires_at: expiry_after_minutes(self.clock.now(), grant.timeout_minutes),
                };
                tracing::info!(
                    timeout_minutes = grant.timeout_minutes,
                    expires_at = %token.expires_at,
                    "Renewed API token"
                );
                self.save(&token);
                let value = token.value.clone();
                self.token = Some(token);
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token renewal failed");
                self.token = None;
                Err(e)
            }
        }
    }

    /// Reads a still-valid token from the session store.
    fn load_cached(&self, now: DateTime<Utc>) -> Option<Token> {
        let read = self
            .store
            .get(TOKEN_KEY)
            .and_then(|value| Ok((value, self.store.get(TOKEN_TIMEOUT_KEY)?)));
        let (value, timeout) = match read {
            Ok((Some(value), Some(timeout))) => (value, timeout),
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session store");
                return None;
            }
        };

        let expires_at = parse_stored_expiry(&timeout)?;
        let token = Token { value, expires_at };
        if token.is_expired_at(now) {
            tracing::debug!(expires_at = %token.expires_at, "Cached token has expired");
            return None;
        }
        Some(token)
    }

    /// Writes a token to the session store. Failures are logged only.
    fn save(&self, token: &Token) {
        let result = self.store.set(TOKEN_KEY, &token.value).and_then(|()| {
            self.store
                .set(TOKEN_TIMEOUT_KEY, &token.expires_at.timestamp().to_string())
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to write token to session store");
        }
    }

    /// Re-sets the token expiry to `now + window` after a request completed.
    ///
    /// The remote session stays alive as long as it sees activity, so any
    /// completed request pushes the expiry forward. Only unexpired tokens are
    /// touched: an expired token stays expired until renewed, both in memory
    /// and in the store. The new value replaces the old one even when it is
    /// earlier.
    pub fn keep_alive(&mut self, window: Duration) {
        let Ok(delta) = TimeDelta::from_std(window) else {
            tracing::warn!(?window, "Keep-alive window out of range");
            return;
        };
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(delta)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        if let Some(token) = self.token.as_mut().filter(|t| !t.is_expired_at(now)) {
            token.expires_at = expires_at;
        }

        let stored = self
            .store
            .get(TOKEN_TIMEOUT_KEY)
            .map(|value| value.as_deref().and_then(parse_stored_expiry));
        match stored {
            Ok(Some(current)) if now < current => {
                let stored = expires_at.timestamp().to_string();
                if let Err(e) = self.store.set(TOKEN_TIMEOUT_KEY, &stored) {
                    tracing::warn!(error = %e, "Failed to extend session token expiry");
                }
            }
            Ok(Some(_)) => {
                tracing::debug!("Stored token has expired; keep-alive skipped");
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to read session store"),
        }
    }

    /// Drops the in-memory token and removes it from the session store.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be written.
    pub fn forget(&mut self) -> anyhow::Result<()> {
        self.token = None;
        self.store.expire(TOKEN_KEY)?;
        self.store.expire(TOKEN_TIMEOUT_KEY)?;
        tracing::info!("Forgot session token");
        Ok(())
    }
}

/// Parses a stored expiry (unix seconds).
fn parse_stored_expiry(value: &str) -> Option<DateTime<Utc>> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Computes `now + minutes`, saturating at the latest representable time.
fn expiry_after_minutes(now: DateTime<Utc>, minutes: u64) -> DateTime<Utc> {
    i64::try_from(minutes)
        .ok()
        .and_then(TimeDelta::try_minutes)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
