//! Asset manager domain and login credentials.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

/// Hostname pattern accepted for an asset manager domain.
#[allow(clippy::expect_used)]
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-A-Za-z0-9]{2,100}\.[A-Za-z.]{2,8}$").expect("failed to compile domain regex")
});

/// Endpoint template; `<domain>` is replaced by the validated domain.
const ENDPOINT_TEMPLATE: &str = "https://<domain>/API";

/// A validated asset manager hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain(String);

impl Domain {
    /// Trims and validates a domain.
    ///
    /// # Errors
    ///
    /// - `ConfigError::EmptyDomain` if the trimmed input is empty.
    /// - `ConfigError::InvalidDomain` if it does not match the hostname pattern.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let domain = raw.trim();
        if domain.is_empty() {
            return Err(ConfigError::EmptyDomain);
        }
        if !DOMAIN_RE.is_match(domain) {
            return Err(ConfigError::InvalidDomain(String::from(domain)));
        }
        Ok(Self(String::from(domain)))
    }

    /// Returns the hostname.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the API endpoint, e.g. `https://acme-dam.com/API`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        ENDPOINT_TEMPLATE.replace("<domain>", &self.0)
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Login credentials for the authentication endpoint.
#[derive(Clone)]
pub struct Credentials {
    /// Asset manager domain.
    pub domain: Domain,
    /// API login ID.
    pub login: String,
    /// API password.
    pub password: String,
}

impl Credentials {
    /// Validates the domain and bundles the credentials.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the domain is empty or malformed.
    pub fn new(
        domain: &str,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            domain: Domain::parse(domain)?,
            login: login.into(),
            password: password.into(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("domain", &self.domain)
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
