// src/catalog/message.rs

//! Ephemeral user-visible messages
//!
//! A message shown on a [`MessageSurface`] clears itself after a fixed
//! time-to-live. How overlapping messages interact is governed by
//! [`ClearPolicy`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_MESSAGE_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearPolicy {
    /// One pending clear per surface: showing a message cancels the previous
    /// timer, so every message gets its full lifetime
    #[default]
    Rearm,
    /// Every message arms its own timer and no timer is ever cancelled; an
    /// older timer may clear a newer message early
    Unconditional,
}

#[derive(Debug)]
struct Inner {
    ttl: Duration,
    policy: ClearPolicy,
    tx: Arc<watch::Sender<String>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

/// Holds at most one visible message. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct MessageSurface {
    inner: Arc<Inner>,
}

impl Default for MessageSurface {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_TTL, ClearPolicy::default())
    }
}

impl MessageSurface {
    pub fn new(ttl: Duration, policy: ClearPolicy) -> Self {
        let (tx, _) = watch::channel(String::new());
        Self {
            inner: Arc::new(Inner {
                ttl,
                policy,
                tx: Arc::new(tx),
                pending: Mutex::new(None),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn policy(&self) -> ClearPolicy {
        self.inner.policy
    }

    /// Shows `message` and arms its clear timer. An empty message clears.
    /// Must be called from within a tokio runtime.
    pub fn show(&self, message: impl Into<String>) {
        let message = message.into();
        if message.is_empty() {
            self.clear();
            return;
        }

        tracing::debug!(text = %message, "Showing message");
        self.inner.tx.send_replace(message);

        let tx = self.inner.tx.clone();
        let ttl = self.inner.ttl;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            tx.send_replace(String::new());
        });

        if self.inner.policy == ClearPolicy::Rearm {
            if let Some(previous) = self.inner.pending.lock().replace(timer) {
                previous.abort();
            }
        }
    }

    /// Clears the current message and any pending rearmed timer
    pub fn clear(&self) {
        if let Some(previous) = self.inner.pending.lock().take() {
            previous.abort();
        }
        self.inner.tx.send_replace(String::new());
    }

    /// The visible message; empty when nothing is shown
    pub fn current(&self) -> String {
        self.inner.tx.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.tx.borrow().is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.inner.tx.subscribe()
    }
}
