//! `Transport` trait definition.
#![allow(clippy::future_not_send)]

use anyhow::Result;

use super::transport::{ApiRequest, RawResponse};

/// HTTP capability used by the client and the token manager.
///
/// Abstracts the HTTP exchange for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Sends a request and returns the raw response.
    ///
    /// Non-2xx statuses are not errors; the body decides success.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent, times out, or the
    /// body cannot be read.
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse>;
}
