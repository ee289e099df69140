//! Backend-agnostic persistence seam for session documents and round records.

/// MongoDB-backed session store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

/// In-process session store.
pub mod memory;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{GuessEntity, RoundEntity, RoundEndReason, SessionEntity},
    storage::StorageResult,
};

/// Turn-scoped field updates applied atomically against the session document.
///
/// These narrow the read-modify-write race window for per-player bookkeeping:
/// the store applies all fields in one guarded write and bumps the document
/// version. When a guard fails (the player already answered, or the hint was
/// already spent) nothing is applied and the call reports `false`.
#[derive(Debug, Default, Clone)]
pub struct SessionFieldUpdates {
    /// Per-player score increments.
    pub score_increments: Vec<(String, u32)>,
    /// Absolute streak values to set per player.
    pub streak_sets: Vec<(String, u32)>,
    /// Add this player to the round's correct-answer set.
    /// Guard: the player must not already be in the set.
    pub record_answer: Option<String>,
    /// Mark the per-round hint as spent.
    /// Guard: the hint flag must currently be unset.
    pub mark_hint_used: bool,
}

impl SessionFieldUpdates {
    /// Whether any guard constrains this update.
    pub fn guarded(&self) -> bool {
        self.record_answer.is_some() || self.mark_hint_used
    }
}

/// Abstraction over the persistence layer for session documents and round records.
///
/// Session documents are keyed by room identifier: one active (or just-ended)
/// session per room. Full-document writes carry an expected version and fail
/// with a conflict when a concurrent writer got there first.
pub trait SessionStore: Send + Sync {
    /// Load the session document for a room, if one exists.
    fn find_session(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;

    /// Insert a fresh session document for its room.
    ///
    /// Replaces a finished leftover document; fails with a conflict when a
    /// session is still playing in the room.
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Replace the full session document if its stored version still equals
    /// `expected_version`; the stored version becomes `expected_version + 1`.
    fn replace_session(
        &self,
        session: SessionEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Apply guarded atomic field updates; `Ok(false)` means a guard rejected
    /// the write and nothing was applied.
    fn update_session_fields(
        &self,
        room_id: &str,
        updates: SessionFieldUpdates,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Create the durable record for a round that just started.
    fn insert_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Append a correct guess to an open round record.
    fn record_guess(
        &self,
        session_id: Uuid,
        round: u32,
        guess: GuessEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Flag the round record as having used its hint.
    fn set_round_hint_used(
        &self,
        session_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Close a round record with its end timestamp and reason.
    fn close_round(
        &self,
        session_id: Uuid,
        round: u32,
        ended_at: SystemTime,
        reason: RoundEndReason,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Stamp the retention deadline on every round record of a finished session.
    fn expire_rounds(
        &self,
        session_id: Uuid,
        expire_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// List all round records of a session in round order.
    fn list_rounds(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>>;

    /// Cheap liveness check against the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Attempt to re-establish the backend connection after a failed check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
