// src/catalog/deadline.rs

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A fixed point after which a retry loop stops scheduling attempts.
///
/// Armed once; a background timer expires the token when the interval
/// elapses. Expiry is advisory: it is observed between attempts and never
/// aborts a request already in flight.
#[derive(Debug, Clone)]
pub struct Deadline {
    token: CancellationToken,
    expires_at: Option<Instant>,
}

impl Deadline {
    /// Arms a deadline `after` from now on the tokio clock
    pub fn arm(after: Duration) -> Self {
        let token = CancellationToken::new();
        let timer_token = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(after) => {
                    tracing::debug!(after_ms = after.as_millis() as u64, "Deadline elapsed");
                    timer_token.cancel();
                }
                _ = timer_token.cancelled() => {}
            }
        });

        Self {
            token,
            expires_at: Some(Instant::now() + after),
        }
    }

    /// Deadline driven by an external token, e.g. a view being torn down
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            expires_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Expires the deadline now
    pub fn expire(&self) {
        self.token.cancel();
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_interval() {
        let deadline = Deadline::arm(Duration::from_secs(20));
        assert!(!deadline.is_expired());

        tokio::time::sleep(Duration::from_secs(19)).await;
        assert!(!deadline.is_expired());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(deadline.is_expired());
    }

    #[tokio::test]
    async fn test_external_token() {
        let token = CancellationToken::new();
        let deadline = Deadline::from_token(token.clone());
        assert!(deadline.expires_at().is_none());

        token.cancel();
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_expire() {
        let deadline = Deadline::arm(Duration::from_secs(60));
        deadline.expire();
        assert!(deadline.is_expired());
    }
}
