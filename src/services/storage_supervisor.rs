//! Background task owning the session-store connection lifecycle.
//!
//! While the store is unreachable the shared state sits in degraded mode and
//! gameplay writes answer `Degraded`; sockets stay up so clients reconnect to
//! a working game instead of losing their room.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{session_store::SessionStore, storage::StorageError},
    state::SharedState,
};

const BACKOFF_FLOOR: Duration = Duration::from_secs(1);
const BACKOFF_CEILING: Duration = Duration::from_secs(10);
const HEALTH_POLL_PERIOD: Duration = Duration::from_secs(5);
const IN_PLACE_RECONNECT_TRIES: u32 = 3;

/// Connect the session store and keep it healthy for the life of the process.
///
/// `connect` builds a fresh store; it is retried with exponential backoff
/// until it succeeds, then the store is polled and revived in place on health
/// failures. Only when in-place reconnects are exhausted does the supervisor
/// throw the store away and rebuild from `connect`.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn SessionStore>, StorageError>> + Send,
{
    let mut backoff = BACKOFF_FLOOR;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "session store connection failed");
                sleep(backoff).await;
                backoff = (backoff * 2).min(BACKOFF_CEILING);
                continue;
            }
        };

        state.install_session_store(store.clone()).await;
        info!("session store online");
        backoff = BACKOFF_FLOOR;

        watch_store(&state, store.as_ref()).await;

        warn!("session store lost; rebuilding the connection");
        sleep(backoff).await;
        backoff = (backoff * 2).min(BACKOFF_CEILING);
    }
}

/// Poll the store until it fails a health check and cannot be revived in place.
///
/// Degraded mode is entered on the first failed health check and left once a
/// ping or reconnect succeeds again.
async fn watch_store(state: &SharedState, store: &dyn SessionStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("session store healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "session store health check failed; entering degraded mode");
                state.update_degraded(true).await;
                if !revive(store).await {
                    return;
                }
                state.update_degraded(false).await;
            }
        }
        sleep(HEALTH_POLL_PERIOD).await;
    }
}

/// Bounded in-place reconnect attempts with backoff.
async fn revive(store: &dyn SessionStore) -> bool {
    let mut delay = BACKOFF_FLOOR;
    for attempt in 1..=IN_PLACE_RECONNECT_TRIES {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "session store reconnected in place");
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "session store reconnect failed");
                sleep(delay).await;
                delay = (delay * 2).min(BACKOFF_CEILING);
            }
        }
    }
    false
}
