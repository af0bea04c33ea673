//! Single-flight refresh-token renewal (§4.1): on `AUTH_EXPIRED` an adapter
//! attempts one background refresh; concurrent callers wait on that
//! refresh rather than each kicking off their own.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::Result;

/// Collapses concurrent refresh attempts into one. The mutex itself is the
/// single-flight mechanism: the first caller to acquire it performs the
/// refresh and stamps `last_refreshed_at`; everyone else who was waiting
/// on the lock sees a recent stamp once it's their turn and skips the
/// network call entirely.
pub struct AuthRefresher {
    last_refreshed_at: Mutex<Option<DateTime<Utc>>>,
    min_interval: Duration,
}

impl AuthRefresher {
    pub fn new(min_interval: Duration) -> Self {
        Self { last_refreshed_at: Mutex::new(None), min_interval }
    }

    /// Runs `refresh` unless another caller already refreshed within
    /// `min_interval`. Returns once a usable token is known to exist,
    /// whether this call performed the refresh or piggybacked on one that
    /// just completed.
    pub async fn refresh_once<F, Fut>(&self, refresh: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut last = self.last_refreshed_at.lock().await;
        if let Some(at) = *last {
            if Utc::now() - at < chrono::Duration::from_std(self.min_interval).unwrap_or_default() {
                return Ok(());
            }
        }
        refresh().await?;
        *last = Some(Utc::now());
        Ok(())
    }
}
