//! Client library for the OrangeLogic digital asset manager API.
//!
//! Authenticates with a login ID and password, caches the issued token in a
//! caller-supplied session store, and runs searches against
//! `search/v3.0/search`.

mod api;
mod client;
mod clock;
mod domain;
mod error;
mod query;
mod response;
mod session;
mod token;
mod transport;

#[cfg(test)]
mod testing;

pub use api::{LocalTransport, Transport};
#[allow(clippy::module_name_repetitions)]
pub use client::{
    DEFAULT_COUNT_PER_PAGE, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, OrangeLogicClient,
    OrangeLogicClientBuilder, SEARCH_PATH,
};
pub use clock::{Clock, SystemClock};
pub use domain::{Credentials, Domain};
pub use error::{ConfigError, RequestError};
pub use query::{DEFAULT_FIELDS, MediaType, QuoteEscaping, SearchQuery, SortBy};
pub use response::{LoginGrant, SearchResult, SuccessPolicy, check_envelope, parse_body};
pub use session::{MemorySessionStore, SessionStore, TOKEN_KEY, TOKEN_TIMEOUT_KEY};
pub use token::{LOGIN_PATH, LoginExchange, Token, TokenManager, TokenState};
pub use transport::{ApiRequest, HttpMethod, HttpTransport, LastRequest, RawResponse};
