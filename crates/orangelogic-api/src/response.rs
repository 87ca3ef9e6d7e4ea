//! Response envelope checks and normalization into stable result types.

use serde::Serialize;
use serde_json::Value;

use crate::error::RequestError;

/// Top-level key every API response is nested under.
pub const ENVELOPE_KEY: &str = "APIResponse";

/// How a response envelope without a `Code` field is judged.
///
/// The login and search endpoints differ here, so each caller names its rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessPolicy {
    /// A missing `Code` counts as success (search and raw requests).
    CodeOptional,
    /// A missing `Code` counts as success only if a non-empty `Token` is
    /// present (login).
    TokenRequired,
}

/// Decodes a response body.
///
/// # Errors
///
/// Returns `RequestError::InvalidResponse` for an empty or non-JSON body.
pub fn parse_body(body: &str) -> Result<Value, RequestError> {
    if body.trim().is_empty() {
        return Err(RequestError::InvalidResponse);
    }
    serde_json::from_str(body).map_err(|_| RequestError::InvalidResponse)
}

/// Checks the envelope and status code of a decoded body.
///
/// # Errors
///
/// - `RequestError::InvalidResponse` if the envelope is missing, or the
///   policy requires a token that is absent.
/// - `RequestError::Api` if `Code` is present and not `success`.
pub fn check_envelope(body: &Value, policy: SuccessPolicy) -> Result<(), RequestError> {
    let envelope = body
        .get(ENVELOPE_KEY)
        .filter(|v| !v.is_null())
        .ok_or(RequestError::InvalidResponse)?;

    match envelope.get("Code").filter(|v| !v.is_null()) {
        Some(code) => {
            let code = value_to_string(code);
            if code.eq_ignore_ascii_case("success") {
                Ok(())
            } else {
                Err(RequestError::Api(code))
            }
        }
        None => match policy {
            SuccessPolicy::CodeOptional => Ok(()),
            SuccessPolicy::TokenRequired if token_of(envelope).is_some() => Ok(()),
            SuccessPolicy::TokenRequired => Err(RequestError::InvalidResponse),
        },
    }
}

/// Token grant returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    /// Bearer token value.
    pub token: String,
    /// Validity window in minutes.
    pub timeout_minutes: u64,
}

impl LoginGrant {
    /// Extracts the grant from a login response that passed
    /// [`check_envelope`].
    ///
    /// # Errors
    ///
    /// Returns `RequestError::InvalidResponse` if the token is missing.
    pub fn from_response(body: &Value) -> Result<Self, RequestError> {
        let token = body
            .get(ENVELOPE_KEY)
            .and_then(token_of)
            .ok_or(RequestError::InvalidResponse)?;
        let timeout_minutes = body
            .get("APIRequestInfo")
            .and_then(|info| info.get("TimeoutPeriodMinutes"))
            .map_or(0, coerce_count);

        Ok(Self {
            token: String::from(token),
            timeout_minutes,
        })
    }
}

/// Normalized search response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    /// Total number of matches across all pages.
    pub total_count: u64,
    /// Sort order reported by the server.
    pub sort: String,
    /// Whether a following page exists.
    pub has_next_page: bool,
    /// Whether a preceding page exists.
    pub has_prev_page: bool,
    /// Raw result records, unmodified.
    pub items: Vec<Value>,
}

impl SearchResult {
    /// Maps a successful search response. Missing values take their defaults.
    #[must_use]
    pub fn from_response(body: &Value) -> Self {
        let envelope = body.get(ENVELOPE_KEY);
        let global = envelope.and_then(|e| e.get("GlobalInfo"));

        Self {
            total_count: field(global, "TotalCount").map_or(0, coerce_count),
            sort: field(global, "Sort")
                .map(value_to_string)
                .unwrap_or_default(),
            has_next_page: field(global, "NextPage").is_some_and(coerce_flag),
            has_prev_page: field(global, "PrevPage").is_some_and(coerce_flag),
            items: envelope
                .and_then(|e| e.get("Items"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// Looks up a key of an optional object.
fn field<'a>(object: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    object.and_then(|o| o.get(name))
}

/// Returns the non-empty `Token` string of an envelope.
fn token_of(envelope: &Value) -> Option<&str> {
    envelope
        .get("Token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
}

/// Renders scalars without JSON quoting; `null` becomes empty.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Coerces a count to an integer.
///
/// Numbers and numeric strings use their leading digits (`"42"` → 42,
/// `12.9` → 12); `true` is 1; anything else, including negatives, is 0.
fn coerce_count(value: &Value) -> u64 {
    let text = match value {
        Value::Bool(b) => return u64::from(*b),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_owned(),
        _ => return 0,
    };
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Coerces a pagination flag to a bool.
fn coerce_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        _ => false,
    }
}
