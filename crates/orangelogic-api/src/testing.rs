//! Test doubles for the clock and the HTTP transport.
#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Value, json};

use crate::api::LocalTransport;
use crate::clock::Clock;
use crate::transport::{ApiRequest, RawResponse};

/// Fixed starting instant for deterministic tests.
pub fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now = now.checked_add_signed(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Transport returning scripted responses and recording every request.
#[derive(Debug, Default)]
pub struct FakeTransport {
    responses: Mutex<VecDeque<Result<RawResponse, String>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn respond_json(&self, body: &Value) {
        self.respond_body(&body.to_string());
    }

    pub fn respond_body(&self, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(RawResponse {
            status: 200,
            body: String::from(body),
        }));
    }

    pub fn fail(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(String::from(message)));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LocalTransport for FakeTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => bail!("no scripted response for {}", request.path),
        }
    }
}

/// Successful login body.
pub fn login_body(token: &str, timeout_minutes: u64) -> Value {
    json!({
        "APIRequestInfo": {"TimeoutPeriodMinutes": timeout_minutes},
        "APIResponse": {"Token": token}
    })
}
