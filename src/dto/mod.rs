use std::time::SystemTime;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Inbound WebSocket actions.
pub mod action;
/// Outbound WebSocket events.
pub mod event;
/// Game snapshots and round statistics.
pub mod game;
/// Healthcheck payload.
pub mod health;
/// Field validators shared by the action payloads.
pub mod validation;

/// Render a server timestamp the way clients expect it (RFC 3339).
pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
