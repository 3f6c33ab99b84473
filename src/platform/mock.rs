// src/platform/mock.rs - Scripted in-memory transport

//! `ScriptedNetwork` answers requests from per-route reply queues and records
//! every call. The last reply queued for a route repeats once the queue
//! drains, so "always fails" needs a single entry. Unscripted routes answer
//! with a network error.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::platform::network::{
    HttpMethod, MultipartForm, NetworkProvider, NetworkRequest, NetworkResponse,
};

#[derive(Debug, Clone)]
enum Outcome {
    Respond { status_code: u16, body: Vec<u8> },
    Fail { message: String },
}

/// One scripted answer, optionally delayed
#[derive(Debug, Clone)]
pub struct Reply {
    outcome: Outcome,
    delay: Duration,
}

impl Reply {
    pub fn json(status_code: u16, body: serde_json::Value) -> Self {
        Self::raw(status_code, body.to_string().into_bytes())
    }

    pub fn raw(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            outcome: Outcome::Respond {
                status_code,
                body: body.into(),
            },
            delay: Duration::ZERO,
        }
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Fail {
                message: message.into(),
            },
            delay: Duration::ZERO,
        }
    }

    /// Answer only after `delay` has elapsed on the tokio clock
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Vec<u8>>,
    pub form: Option<MultipartForm>,
}

#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for `method url`
    pub fn script(&self, method: HttpMethod, url: impl Into<String>, reply: Reply) -> &Self {
        self.routes
            .lock()
            .entry((method, url.into()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn on_get(&self, url: impl Into<String>, reply: Reply) -> &Self {
        self.script(HttpMethod::Get, url, reply)
    }

    pub fn on_post(&self, url: impl Into<String>, reply: Reply) -> &Self {
        self.script(HttpMethod::Post, url, reply)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, method: HttpMethod, url: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method == method && c.url == url)
            .count()
    }

    fn next_reply(&self, method: HttpMethod, url: &str) -> Option<Reply> {
        let mut routes = self.routes.lock();
        let queue = routes.get_mut(&(method, url.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    async fn answer(&self, call: RecordedCall) -> Result<NetworkResponse> {
        let method = call.method;
        let url = call.url.clone();
        self.calls.lock().push(call);

        let Some(reply) = self.next_reply(method, &url) else {
            return Err(Error::network(&url, format!("No scripted reply for {} {}", method, url)));
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        match reply.outcome {
            Outcome::Respond { status_code, body } => Ok(NetworkResponse {
                status_code,
                headers: HashMap::new(),
                body,
            }),
            Outcome::Fail { message } => Err(Error::network(&url, message)),
        }
    }
}

#[async_trait]
impl NetworkProvider for ScriptedNetwork {
    async fn request(&self, request: NetworkRequest) -> Result<NetworkResponse> {
        self.answer(RecordedCall {
            method: request.method,
            url: request.url,
            body: request.body,
            form: None,
        })
        .await
    }

    async fn send_multipart(
        &self,
        url: &str,
        form: MultipartForm,
        _timeout_ms: Option<u64>,
    ) -> Result<NetworkResponse> {
        self.answer(RecordedCall {
            method: HttpMethod::Post,
            url: url.to_string(),
            body: None,
            form: Some(form),
        })
        .await
    }
}
