// src/catalog/loading.rs

use std::sync::Arc;

use tokio::sync::watch;

/// Observable busy indicator shared between an operation and its view
#[derive(Debug, Clone)]
pub struct LoadingFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for LoadingFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingFlag {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_loading(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn set(&self, loading: bool) {
        self.tx.send_replace(loading);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Raises the flag until the returned guard is dropped
    pub fn guard(&self) -> LoadingGuard {
        self.set(true);
        LoadingGuard { flag: self.clone() }
    }
}

/// Lowers its flag on drop, on every exit path
#[derive(Debug)]
#[must_use = "the flag is lowered as soon as the guard is dropped"]
pub struct LoadingGuard {
    flag: LoadingFlag,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}
