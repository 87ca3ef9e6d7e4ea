//! `HttpTransport` - reqwest-backed HTTP exchange and request records.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::instrument;
use url::Url;

use super::api::LocalTransport;

/// Parameters whose values never appear in logs or request records.
const SENSITIVE_PARAMS: [&str; 2] = ["password", "token"];

/// HTTP verb of an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Query-string request.
    Get,
    /// Form-encoded request.
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// A request relative to the API endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Path below the endpoint, e.g. `search/v3.0/search`.
    pub path: String,
    /// Query (GET) or form (POST) parameters, always ending with `format=json`.
    pub params: Vec<(String, String)>,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl ApiRequest {
    /// Creates a request, forcing `format=json`.
    #[must_use]
    pub fn new(method: HttpMethod, path: &str, params: &[(&str, String)], timeout: Duration) -> Self {
        let mut owned: Vec<(String, String)> = params
            .iter()
            .filter(|(name, _)| *name != "format")
            .map(|(name, value)| (String::from(*name), value.clone()))
            .collect();
        owned.push((String::from("format"), String::from("json")));

        Self {
            method,
            path: String::from(path.trim_start_matches('/')),
            params: owned,
            timeout,
        }
    }

    /// Returns the first value of a parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Form-encodes the parameters with sensitive values masked.
    #[must_use]
    pub fn redacted_params(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter().map(|(name, value)| {
                if SENSITIVE_PARAMS.contains(&name.as_str()) {
                    (name.as_str(), "[REDACTED]")
                } else {
                    (name.as_str(), value.as_str())
                }
            }))
            .finish()
    }
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.redacted_params())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

/// Summary of the most recent request, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastRequest {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Path below the endpoint.
    pub path: String,
    /// Encoded parameters with secrets masked.
    pub params: String,
    /// Timeout applied to the request.
    pub timeout: Duration,
}

impl From<&ApiRequest> for LastRequest {
    fn from(request: &ApiRequest) -> Self {
        Self {
            method: request.method,
            path: request.path.clone(),
            params: request.redacted_params(),
            timeout: request.timeout,
        }
    }
}

/// reqwest-backed transport rooted at the API endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client (reqwest, gzip enabled).
    http_client: Client,
    /// Endpoint URL with a trailing slash.
    base_url: Url,
}

impl HttpTransport {
    /// Builds the transport.
    ///
    /// Disabling `verify_tls` accepts any certificate, including forged
    /// ones. Only do this against a test server you control.
    ///
    /// # Errors
    ///
    /// Returns an error if the `reqwest::Client` build fails.
    pub fn new(mut base_url: Url, user_agent: &str, verify_tls: bool) -> Result<Self> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut builder = Client::builder().user_agent(user_agent).gzip(true);
        if !verify_tls {
            tracing::warn!(
                endpoint = %base_url,
                "TLS certificate verification is disabled"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http_client = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Returns the endpoint URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl LocalTransport for HttpTransport {
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        let url = self
            .base_url
            .join(&request.path)
            .with_context(|| format!("failed to join URL path: {}", request.path))?;

        let builder = match request.method {
            HttpMethod::Get => self.http_client.get(url).query(&request.params),
            HttpMethod::Post => self.http_client.post(url).form(&request.params),
        };
        let built = builder
            .timeout(request.timeout)
            .build()
            .with_context(|| format!("failed to build request: {}", request.path))?;

        tracing::debug!(url = %built.url().path(), "OrangeLogic API request");

        let result = self.http_client.execute(built).await;
        let response = result.with_context(|| format!("request failed: {}", request.path))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%status, "OrangeLogic API returned non-success status");
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read response body: {}", request.path))?;

        Ok(RawResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn transport_for(server: &wiremock::MockServer) -> HttpTransport {
        let base_url = Url::parse(&format!("{}/API", server.uri())).unwrap();
        HttpTransport::new(base_url, "test/0.0.0", true).unwrap()
    }

    #[test]
    fn test_new_request_forces_json_format() {
        // Arrange
        let params = [("format", String::from("xml")), ("q", String::from("cat"))];

        // Act
        let request = ApiRequest::new(HttpMethod::Get, "/x/y", &params, Duration::from_secs(1));

        // Assert
        assert_eq!(request.path, "x/y");
        assert_eq!(request.param("format"), Some("json"));
        assert_eq!(request.params.len(), 2);
        assert_eq!(request.params.last().unwrap().0, "format");
    }

    #[test]
    fn test_redacted_params_masks_secrets() {
        // Arrange
        let params = [
            ("login", String::from("api-user")),
            ("password", String::from("hunter2")),
            ("token", String::from("abc")),
        ];
        let request = ApiRequest::new(HttpMethod::Post, "p", &params, Duration::from_secs(1));

        // Act
        let encoded = request.redacted_params();
        let debug = format!("{request:?}");

        // Assert
        assert_eq!(
            encoded,
            "login=api-user&password=%5BREDACTED%5D&token=%5BREDACTED%5D&format=json"
        );
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        // Arrange
        let base_url = Url::parse("https://acme-dam.com/API").unwrap();

        // Act
        let transport = HttpTransport::new(base_url, "test/0.0.0", true).unwrap();

        // Assert
        assert_eq!(transport.base_url().as_str(), "https://acme-dam.com/API/");
    }

    #[tokio::test]
    async fn test_get_sends_query_and_user_agent() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/API/Authentication/v1.0/Login"))
            .and(wiremock::matchers::query_param("login", "api-user"))
            .and(wiremock::matchers::query_param("format", "json"))
            .and(wiremock::matchers::header("user-agent", "test/0.0.0"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&mock_server)
            .await;
        let transport = transport_for(&mock_server);
        let request = ApiRequest::new(
            HttpMethod::Get,
            "Authentication/v1.0/Login",
            &[("login", String::from("api-user"))],
            Duration::from_secs(5),
        );

        // Act
        let response = transport.send(&request).await.unwrap();

        // Assert
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{}");
    }

    #[tokio::test]
    async fn test_post_sends_form_body() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/API/search/v3.0/search"))
            .and(wiremock::matchers::header(
                "content-type",
                "application/x-www-form-urlencoded",
            ))
            .and(wiremock::matchers::body_string_contains("countperpage=5"))
            .and(wiremock::matchers::body_string_contains("format=json"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;
        let transport = transport_for(&mock_server);
        let request = ApiRequest::new(
            HttpMethod::Post,
            "search/v3.0/search",
            &[("countperpage", String::from("5"))],
            Duration::from_secs(5),
        );

        // Act
        let response = transport.send(&request).await.unwrap();

        // Assert
        assert_eq!(response.body, "ok");
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::any())
            .respond_with(
                wiremock::ResponseTemplate::new(500).set_body_string(r#"{"APIResponse":{}}"#),
            )
            .mount(&mock_server)
            .await;
        let transport = transport_for(&mock_server);
        let request = ApiRequest::new(HttpMethod::Get, "x", &[], Duration::from_secs(5));

        // Act
        let response = transport.send(&request).await.unwrap();

        // Assert
        assert_eq!(response.status, 500);
        assert_eq!(response.body, r#"{"APIResponse":{}}"#);
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::any())
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;
        let transport = transport_for(&mock_server);
        let request = ApiRequest::new(HttpMethod::Get, "slow", &[], Duration::from_millis(50));

        // Act
        let result = transport.send(&request).await;

        // Assert
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("request failed: slow"));
    }
}
