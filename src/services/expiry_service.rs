//! One-shot wall-clock timers that end games whose duration cap elapsed.

use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{services::game_service, state::SharedState};

/// Arm the duration-cap timer for a session.
///
/// Re-arming an already armed session is a no-op; the first timer wins.
pub fn arm(state: &SharedState, session_id: Uuid, room_id: &str, duration: Duration) {
    if state.expiry_timers().contains_key(&session_id) {
        debug!(session = %session_id, "expiry timer already armed");
        return;
    }

    let task_state = state.clone();
    let room = room_id.to_string();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        task_state.expiry_timers().remove(&session_id);
        if let Err(err) = game_service::expire_session(&task_state, &room, session_id).await {
            warn!(session = %session_id, room = %room, error = %err, "failed to expire session");
        }
    });
    state.expiry_timers().insert(session_id, handle.abort_handle());
}

/// Cancel the duration-cap timer for a session, if one is armed.
pub fn disarm(state: &SharedState, session_id: Uuid) {
    if let Some((_, handle)) = state.expiry_timers().remove(&session_id) {
        handle.abort();
    }
}
