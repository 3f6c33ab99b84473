// src/catalog/fetcher.rs

//! Product listing retrieval with retry-until-deadline
//!
//! The fetcher drives `Idle -> Polling -> Settled(..)`. Attempts run back to
//! back with no delay between them; the loop ends on the first success or on
//! the first failure observed after the [`Deadline`] expired. An attempt that
//! is already in flight when the deadline fires still completes and its
//! result is still applied.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{Error, Result};

use super::api::CatalogApi;
use super::deadline::Deadline;
use super::models::Product;

/// Shown in place while attempts keep failing before the deadline
pub const RETRYING_MESSAGE: &str = "Failed to connect to the server... trying again...";

/// Shown once retrieval has given up, and when no backend is configured
pub const FAILED_MESSAGE: &str = "Failed to connect to the server.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Settlement {
    Success,
    TimedOut,
    Unconfigured,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchPhase {
    #[default]
    Idle,
    Polling,
    Settled(Settlement),
}

impl FetchPhase {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }
}

/// What a listing view renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingState {
    pub products: Vec<Product>,
    pub loading: bool,
    pub error_message: Option<String>,
    pub phase: FetchPhase,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub enum ListingAction {
    AttemptStarted,
    Loaded(Vec<Product>),
    AttemptFailed { retrying: bool },
    Unconfigured,
}

/// State reducer for the listing view
pub fn listing_reducer(state: &ListingState, action: ListingAction) -> ListingState {
    let mut new_state = state.clone();

    match action {
        ListingAction::AttemptStarted => {
            new_state.loading = true;
            new_state.phase = FetchPhase::Polling;
            new_state.attempts += 1;
        }
        ListingAction::Loaded(products) => {
            new_state.products = products;
            new_state.error_message = None;
            new_state.loading = false;
            new_state.phase = FetchPhase::Settled(Settlement::Success);
        }
        ListingAction::AttemptFailed { retrying } => {
            new_state.loading = false;
            if retrying {
                new_state.error_message = Some(RETRYING_MESSAGE.to_string());
            } else {
                new_state.error_message = Some(FAILED_MESSAGE.to_string());
                new_state.phase = FetchPhase::Settled(Settlement::TimedOut);
            }
        }
        ListingAction::Unconfigured => {
            new_state.loading = false;
            new_state.error_message = Some(FAILED_MESSAGE.to_string());
            new_state.phase = FetchPhase::Settled(Settlement::Unconfigured);
        }
    }

    new_state
}

/// One pass of the loop; discarded after its outcome is applied
#[derive(Debug)]
struct FetchAttempt {
    number: u32,
    started_at: Instant,
}

impl FetchAttempt {
    fn start(number: u32) -> Self {
        Self {
            number,
            started_at: Instant::now(),
        }
    }

    async fn run(self, api: &CatalogApi) -> (Self, Result<Vec<Product>>) {
        let outcome = api.list_products().await;
        (self, outcome)
    }
}

/// Owns the listing state and publishes every transition to subscribers
#[derive(Debug, Clone)]
pub struct RetryFetcher {
    state: Arc<watch::Sender<ListingState>>,
}

impl Default for RetryFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryFetcher {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ListingState::default());
        Self { state: Arc::new(tx) }
    }

    pub fn state(&self) -> ListingState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListingState> {
        self.state.subscribe()
    }

    fn dispatch(&self, action: ListingAction) {
        self.state
            .send_modify(|state| *state = listing_reducer(state, action));
    }

    /// Arms a deadline `after` from now and runs the loop against it
    pub async fn run_for(&self, api: &CatalogApi, after: Duration) -> Settlement {
        let deadline = Deadline::arm(after);
        let settlement = self.run(api, &deadline).await;
        deadline.expire();
        settlement
    }

    /// Runs attempts until one succeeds or one fails after `deadline`
    pub async fn run(&self, api: &CatalogApi, deadline: &Deadline) -> Settlement {
        if !api.is_configured() {
            tracing::warn!("Backend address is not configured, skipping product retrieval");
            self.dispatch(ListingAction::Unconfigured);
            return Settlement::Unconfigured;
        }

        let mut number = 0;
        loop {
            number += 1;
            self.dispatch(ListingAction::AttemptStarted);

            let (attempt, outcome) = FetchAttempt::start(number).run(api).await;
            let elapsed_ms = attempt.started_at.elapsed().as_millis() as u64;

            match outcome {
                Ok(products) => {
                    tracing::info!(
                        attempt = attempt.number,
                        elapsed_ms,
                        count = products.len(),
                        "Products loaded"
                    );
                    self.dispatch(ListingAction::Loaded(products));
                    return Settlement::Success;
                }
                Err(error) if deadline.is_expired() => {
                    let timeout = Error::timeout(FAILED_MESSAGE).caused_by(&error);
                    tracing::warn!(
                        attempt = attempt.number,
                        error = %error,
                        causes = ?timeout.causes,
                        "Product retrieval deadline elapsed"
                    );
                    self.dispatch(ListingAction::AttemptFailed { retrying: false });
                    return Settlement::TimedOut;
                }
                Err(error) => {
                    let remaining_ms = deadline
                        .expires_at()
                        .map(|at| at.saturating_duration_since(Instant::now()).as_millis() as u64);
                    tracing::debug!(
                        attempt = attempt.number,
                        elapsed_ms,
                        remaining_ms = ?remaining_ms,
                        transient = error.is_transient(),
                        error = %error,
                        "Product retrieval failed, retrying"
                    );
                    self.dispatch(ListingAction::AttemptFailed { retrying: true });
                }
            }

            // Lets the deadline timer run on a current-thread runtime
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{Reply, ScriptedNetwork};
    use crate::platform::HttpMethod;
    use serde_json::json;

    const BASE: &str = "http://localhost:4000/";

    fn api(network: &Arc<ScriptedNetwork>) -> CatalogApi {
        CatalogApi::new(Some(BASE.to_string()), network.clone())
    }

    #[test]
    fn test_listing_reducer() {
        let initial = ListingState::default();
        assert_eq!(initial.phase, FetchPhase::Idle);

        let polling = listing_reducer(&initial, ListingAction::AttemptStarted);
        assert!(polling.loading);
        assert_eq!(polling.phase, FetchPhase::Polling);
        assert_eq!(polling.attempts, 1);

        let retrying = listing_reducer(&polling, ListingAction::AttemptFailed { retrying: true });
        assert!(!retrying.loading);
        assert_eq!(retrying.error_message.as_deref(), Some(RETRYING_MESSAGE));
        assert_eq!(retrying.phase, FetchPhase::Polling);

        let loaded = listing_reducer(&retrying, ListingAction::Loaded(Vec::new()));
        assert_eq!(loaded.error_message, None);
        assert_eq!(loaded.phase, FetchPhase::Settled(Settlement::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let network = Arc::new(ScriptedNetwork::new());
        network
            .on_get(BASE, Reply::network_error("connection refused").after(Duration::from_millis(50)))
            .on_get(BASE, Reply::raw(200, "not json").after(Duration::from_millis(50)))
            .on_get(
                BASE,
                Reply::json(200, json!([{"_id": "p1", "name": "Widget"}])).after(Duration::from_millis(50)),
            );

        let fetcher = RetryFetcher::new();
        let settlement = fetcher.run_for(&api(&network), Duration::from_secs(20)).await;

        assert_eq!(settlement, Settlement::Success);
        let state = fetcher.state();
        assert_eq!(state.products.len(), 1);
        assert_eq!(state.products[0].name, "Widget");
        assert_eq!(state.error_message, None);
        assert!(!state.loading);
        assert_eq!(network.calls_to(HttpMethod::Get, BASE), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loose_product_fields_load_first_time() {
        let network = Arc::new(ScriptedNetwork::new());
        network.on_get(
            BASE,
            Reply::json(
                200,
                json!([{"_id": "p1", "id": "p1", "name": "Widget", "price": "12", "stock": "4", "picture": {"url": "w.png"}}]),
            ),
        );

        let fetcher = RetryFetcher::new();
        let settlement = fetcher.run_for(&api(&network), Duration::from_secs(20)).await;

        assert_eq!(settlement, Settlement::Success);
        assert_eq!(network.call_count(), 1);
        let product = &fetcher.state().products[0];
        assert_eq!(product.id, "p1");
        assert_eq!(product.price, Some(12.0));
        assert_eq!(product.stock, Some(4));
        assert_eq!(product.picture, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_attempts_after_success() {
        let network = Arc::new(ScriptedNetwork::new());
        network.on_get(BASE, Reply::json(200, json!([])).after(Duration::from_millis(10)));

        let fetcher = RetryFetcher::new();
        fetcher.run_for(&api(&network), Duration::from_secs(20)).await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(network.call_count(), 1);
        assert_eq!(fetcher.state().attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_terminal_message() {
        let network = Arc::new(ScriptedNetwork::new());
        network.on_get(BASE, Reply::network_error("connection refused").after(Duration::from_secs(1)));

        let started = Instant::now();
        let fetcher = RetryFetcher::new();
        let settlement = fetcher.run_for(&api(&network), Duration::from_secs(20)).await;

        assert_eq!(settlement, Settlement::TimedOut);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(20));
        assert!(elapsed <= Duration::from_secs(21));

        let state = fetcher.state();
        assert_eq!(state.error_message.as_deref(), Some(FAILED_MESSAGE));
        assert_eq!(state.phase, FetchPhase::Settled(Settlement::TimedOut));
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_success_after_deadline_is_kept() {
        let network = Arc::new(ScriptedNetwork::new());
        network.on_get(
            BASE,
            Reply::json(200, json!([{"id": "p1", "name": "Late"}])).after(Duration::from_secs(5)),
        );

        let fetcher = RetryFetcher::new();
        let settlement = fetcher.run_for(&api(&network), Duration::from_secs(1)).await;

        assert_eq!(settlement, Settlement::Success);
        assert_eq!(fetcher.state().products[0].name, "Late");
    }

    #[tokio::test]
    async fn test_unconfigured_makes_no_calls() {
        let network = Arc::new(ScriptedNetwork::new());
        let api = CatalogApi::new(None, network.clone());

        let fetcher = RetryFetcher::new();
        let deadline = Deadline::from_token(Default::default());
        let settlement = fetcher.run(&api, &deadline).await;

        assert_eq!(settlement, Settlement::Unconfigured);
        assert_eq!(fetcher.state().error_message.as_deref(), Some(FAILED_MESSAGE));
        assert_eq!(network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_stops_after_first_failure() {
        let network = Arc::new(ScriptedNetwork::new());
        network.on_get(BASE, Reply::network_error("down"));

        let deadline = Deadline::from_token(Default::default());
        deadline.expire();

        let fetcher = RetryFetcher::new();
        let settlement = fetcher.run(&api(&network), &deadline).await;

        assert_eq!(settlement, Settlement::TimedOut);
        assert_eq!(network.call_count(), 1);
    }
}
