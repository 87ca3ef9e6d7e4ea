//! `OrangeLogicClient` - search and raw request client with token handling.
#![allow(clippy::future_not_send)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::instrument;
use url::Url;

use super::api::LocalTransport;
use super::clock::{Clock, SystemClock};
use super::domain::{Credentials, Domain};
use super::error::RequestError;
use super::query::{QuoteEscaping, SearchQuery};
use super::response::{SearchResult, SuccessPolicy, check_envelope, parse_body};
use super::session::SessionStore;
use super::token::{TokenManager, TokenState};
use super::transport::{ApiRequest, HttpMethod, HttpTransport, LastRequest, RawResponse};

/// Path of the search endpoint.
pub const SEARCH_PATH: &str = "search/v3.0/search";

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("orangelogic-api/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of search results per page.
pub const DEFAULT_COUNT_PER_PAGE: u32 = 20;

/// OrangeLogic API client.
///
/// One instance issues one request at a time. Request failures never surface
/// as `Err`: the request methods return `false`/`None` and record the cause in
/// [`OrangeLogicClient::last_error`].
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct OrangeLogicClient<T = HttpTransport> {
    /// HTTP exchange.
    transport: T,
    /// Validated asset manager domain.
    domain: Domain,
    /// Token lifecycle.
    tokens: TokenManager,
    /// Timeout for search requests.
    timeout: Duration,
    /// Page size for search requests.
    count_per_page: u32,
    /// Quote handling inside query clauses.
    quote_escaping: QuoteEscaping,
    /// Result of the last search.
    search_result: SearchResult,
    /// Whether the last request succeeded.
    request_successful: bool,
    /// Failure of the last request.
    last_error: Option<RequestError>,
    /// Summary of the last request.
    last_request: Option<LastRequest>,
    /// Raw response of the last request.
    last_response: Option<RawResponse>,
}

/// Builder for `OrangeLogicClient`.
#[allow(clippy::module_name_repetitions)]
pub struct OrangeLogicClientBuilder {
    domain: Option<String>,
    login: Option<String>,
    password: Option<String>,
    session_store: Option<Arc<dyn SessionStore>>,
    clock: Option<Arc<dyn Clock>>,
    base_url: Option<Url>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
    count_per_page: Option<u32>,
    accept_invalid_certs: bool,
    quote_escaping: QuoteEscaping,
}

impl std::fmt::Debug for OrangeLogicClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrangeLogicClientBuilder")
            .field("domain", &self.domain)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("session_store", &self.session_store)
            .field("clock", &self.clock)
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("count_per_page", &self.count_per_page)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("quote_escaping", &self.quote_escaping)
            .finish()
    }
}

impl OrangeLogicClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            domain: None,
            login: None,
            password: None,
            session_store: None,
            clock: None,
            base_url: None,
            user_agent: None,
            timeout: None,
            count_per_page: None,
            accept_invalid_certs: false,
            quote_escaping: QuoteEscaping::Verbatim,
        }
    }

    /// Sets the asset manager domain, e.g. `acme-dam.com` (required).
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the API login ID (required).
    #[must_use]
    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    /// Sets the API password (required).
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the session store the token is cached in (required).
    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Overrides the time source (default: system clock).
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides the endpoint URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Overrides the User-Agent (default: `orangelogic-api/<version>`).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the timeout for login and search requests (default: 10s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the search page size (default: 20).
    #[must_use]
    pub const fn count_per_page(mut self, count: u32) -> Self {
        self.count_per_page = Some(count);
        self
    }

    /// Sets how quotes inside query values are written (default: verbatim).
    #[must_use]
    pub const fn quote_escaping(mut self, escaping: QuoteEscaping) -> Self {
        self.quote_escaping = escaping;
        self
    }

    /// Disables TLS certificate verification.
    ///
    /// This accepts forged certificates and exposes the password to anyone on
    /// the network path. Only use it against a test server you control.
    #[must_use]
    pub const fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Builds the client on the reqwest transport.
    ///
    /// # Errors
    ///
    /// - the domain is empty or malformed (root cause `ConfigError`).
    /// - `login`, `password` or `session_store` is not set.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<OrangeLogicClient> {
        let domain = Domain::parse(self.domain.as_deref().unwrap_or_default())?;
        let base_url = if let Some(url) = self.base_url.clone() {
            url
        } else {
            let result = Url::parse(&domain.endpoint());
            result.context("invalid endpoint URL")?
        };
        let user_agent = self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        let transport = HttpTransport::new(base_url, user_agent, !self.accept_invalid_certs)?;

        self.build_with_transport(transport)
    }

    /// Builds the client on a caller-supplied transport.
    ///
    /// # Errors
    ///
    /// - the domain is empty or malformed (root cause `ConfigError`).
    /// - `login`, `password` or `session_store` is not set.
    pub fn build_with_transport<T: LocalTransport>(self, transport: T) -> Result<OrangeLogicClient<T>> {
        let login = self.login.context("login is required")?;
        let password = self.password.context("password is required")?;
        let credentials =
            Credentials::new(self.domain.as_deref().unwrap_or_default(), login, password)?;
        let store = self.session_store.context("session_store is required")?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);

        tracing::debug!(domain = %credentials.domain, "Created OrangeLogic client");

        Ok(OrangeLogicClient {
            transport,
            domain: credentials.domain,
            tokens: TokenManager::new(credentials.login, credentials.password, store, clock)
                .with_timeout(timeout),
            timeout,
            count_per_page: self.count_per_page.unwrap_or(DEFAULT_COUNT_PER_PAGE),
            quote_escaping: self.quote_escaping,
            search_result: SearchResult::default(),
            request_successful: false,
            last_error: None,
            last_request: None,
            last_response: None,
        })
    }
}

impl OrangeLogicClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> OrangeLogicClientBuilder {
        OrangeLogicClientBuilder::new()
    }

    /// Creates a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is empty or malformed, or the HTTP
    /// client cannot be built.
    pub fn new(
        domain: &str,
        login: impl Into<String>,
        password: impl Into<String>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        Self::builder()
            .domain(domain)
            .login(login)
            .password(password)
            .session_store(store)
            .build()
    }
}

impl<T: LocalTransport> OrangeLogicClient<T> {
    /// Returns the validated domain.
    #[must_use]
    pub const fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs a search and stores its normalized result.
    ///
    /// Returns `false` on any failure; the stored result is then reset to
    /// its zeroed default and the cause is in [`Self::last_error`]. No search
    /// request is sent if no token can be obtained.
    #[instrument(skip_all)]
    pub async fn search(&mut self, query: &SearchQuery) -> bool {
        let Some(token) = self.get_token().await else {
            self.search_result = SearchResult::default();
            return false;
        };

        let params = [
            ("query", query.to_query_string(self.quote_escaping)),
            ("fields", query.fields_param()),
            ("sort", query.sort_by.to_string()),
            ("countperpage", self.count_per_page.to_string()),
            ("pagenumber", query.page.to_string()),
            ("token", token),
        ];

        let Some(body) = self
            .make_request(HttpMethod::Post, SEARCH_PATH, &params, self.timeout)
            .await
        else {
            self.search_result = SearchResult::default();
            return false;
        };

        self.search_result = SearchResult::from_response(&body);
        tracing::info!(
            total_count = self.search_result.total_count,
            items = self.search_result.items.len(),
            page = query.page,
            "Search completed"
        );
        true
    }

    /// Returns the items of the last successful search.
    #[must_use]
    pub fn items(&self) -> &[Value] {
        &self.search_result.items
    }

    /// Returns the total match count of the last successful search.
    #[must_use]
    pub const fn total_count(&self) -> u64 {
        self.search_result.total_count
    }

    /// Returns the full normalized result of the last search.
    #[must_use]
    pub const fn search_result(&self) -> &SearchResult {
        &self.search_result
    }

    /// Sets the search page size.
    pub const fn set_count_per_page(&mut self, count: u32) {
        self.count_per_page = count;
    }

    /// Returns the search page size.
    #[must_use]
    pub const fn count_per_page(&self) -> u32 {
        self.count_per_page
    }

    /// Returns a valid token, renewing it if needed.
    ///
    /// Returns `None` on failure, with the cause in [`Self::last_error`].
    /// When a login request is sent, it becomes the last request.
    pub async fn get_token(&mut self) -> Option<String> {
        let result = self.tokens.get_token(&self.transport).await;
        if let Some(exchange) = self.tokens.take_login_exchange() {
            self.last_request = Some(exchange.request);
            self.last_response = exchange.response;
            self.request_successful = result.is_ok();
            self.last_error = None;
        }
        match result {
            Ok(token) => Some(token),
            Err(e) => {
                self.request_successful = false;
                self.last_error = Some(e);
                None
            }
        }
    }

    /// Returns the token currently held if it has not expired.
    ///
    /// Never renews; use [`Self::get_token`] for that.
    #[must_use]
    pub fn current_token(&self) -> Option<&str> {
        self.tokens.valid().map(|token| token.value.as_str())
    }

    /// Returns the expiry of the token currently held, which may already
    /// have passed.
    #[must_use]
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.tokens.current().map(|token| token.expires_at)
    }

    /// Returns the lifecycle state of the token.
    #[must_use]
    pub fn token_state(&self) -> TokenState {
        self.tokens.state()
    }

    /// Forgets the token in memory and in the session store.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be written.
    pub fn forget_session(&mut self) -> Result<()> {
        self.tokens.forget()
    }

    /// Sends a GET request to an arbitrary API path.
    ///
    /// No token is added; pass `token` in `params` where the endpoint needs
    /// one. Returns the decoded body on success.
    pub async fn get(
        &mut self,
        path: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Option<Value> {
        self.make_request(HttpMethod::Get, path, params, timeout)
            .await
    }

    /// Sends a form-encoded POST request to an arbitrary API path.
    ///
    /// No token is added; pass `token` in `params` where the endpoint needs
    /// one. Returns the decoded body on success.
    pub async fn post(
        &mut self,
        path: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Option<Value> {
        self.make_request(HttpMethod::Post, path, params, timeout)
            .await
    }

    /// Whether the last request succeeded.
    #[must_use]
    pub const fn request_successful(&self) -> bool {
        self.request_successful
    }

    /// Returns the failure of the last request.
    #[must_use]
    pub const fn last_error(&self) -> Option<&RequestError> {
        self.last_error.as_ref()
    }

    /// Returns a summary of the last request, with secrets masked.
    #[must_use]
    pub const fn last_request(&self) -> Option<&LastRequest> {
        self.last_request.as_ref()
    }

    /// Returns the raw response of the last request.
    #[must_use]
    pub const fn last_response(&self) -> Option<&RawResponse> {
        self.last_response.as_ref()
    }

    /// Sends a request, records diagnostics and applies keep-alive.
    #[instrument(skip_all, fields(method = %method, path = path))]
    async fn make_request(
        &mut self,
        method: HttpMethod,
        path: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Option<Value> {
        let request = ApiRequest::new(method, path, params, timeout);
        self.last_request = Some(LastRequest::from(&request));
        self.last_response = None;
        self.last_error = None;
        self.request_successful = false;

        let raw = match self.transport.send(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                let error = RequestError::Transport(format!("{e:#}"));
                tracing::warn!(error = %error, "OrangeLogic API request failed");
                self.last_error = Some(error);
                return None;
            }
        };

        self.tokens.keep_alive(keep_alive_window(timeout));

        let outcome = parse_body(&raw.body).and_then(|body| {
            check_envelope(&body, SuccessPolicy::CodeOptional)?;
            Ok(body)
        });
        self.last_response = Some(raw);

        match outcome {
            Ok(body) => {
                self.request_successful = true;
                Some(body)
            }
            Err(e) => {
                tracing::warn!(error = %e, "OrangeLogic API returned an error");
                self.last_error = Some(e);
                None
            }
        }
    }
}

/// Session extension applied after a request: the timeout value read as
/// minutes.
const fn keep_alive_window(timeout: Duration) -> Duration {
    timeout.saturating_mul(60)
}
