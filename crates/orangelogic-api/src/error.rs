//! Error taxonomy for client construction and API requests.

/// Fatal configuration problems detected while constructing a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The domain is empty after trimming.
    EmptyDomain,
    /// The domain does not look like a hostname.
    InvalidDomain(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDomain => write!(f, "Domain cannot be empty."),
            Self::InvalidDomain(domain) => write!(f, "Invalid domain format: {domain}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Recoverable failure of a single API request.
///
/// Recorded as the client's last error; never returned as `Err` from the
/// request methods themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The HTTP exchange itself failed (connect, timeout, body read).
    Transport(String),
    /// Empty or unparseable body, or the `APIResponse` envelope is missing.
    InvalidResponse,
    /// The envelope carries a non-success `Code`, kept verbatim.
    Api(String),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "{message}"),
            Self::InvalidResponse => write!(f, "Invalid response."),
            Self::Api(code) => write!(f, "{code}"),
        }
    }
}

impl std::error::Error for RequestError {}
