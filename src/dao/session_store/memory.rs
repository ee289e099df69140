//! In-process session store used by tests and the `memory` backend setting.
//!
//! Mirrors the MongoDB backend's semantics (versioned replaces, guarded field
//! updates) over plain maps behind a mutex. State is lost on restart.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
    time::SystemTime,
};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{GuessEntity, RoundEntity, RoundEndReason, SessionEntity, SessionStatus},
    session_store::{SessionFieldUpdates, SessionStore},
    storage::{StorageError, StorageResult},
};

#[derive(Clone, Default)]
/// Session store backed by in-process maps.
pub struct MemorySessionStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, SessionEntity>,
    rounds: BTreeMap<(Uuid, u32), RoundEntity>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-update; propagating the panic is
        // the only sound option for an in-process test store.
        self.inner.lock().expect("memory store lock poisoned")
    }
}

impl SessionStore for MemorySessionStore {
    fn find_session(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        let room_id = room_id.to_owned();
        Box::pin(async move { Ok(store.lock().sessions.get(&room_id).cloned()) })
    }

    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            if let Some(existing) = inner.sessions.get(&session.room_id) {
                if existing.status != SessionStatus::Finished {
                    return Err(StorageError::conflict(format!(
                        "room `{}` already has an active session",
                        session.room_id
                    )));
                }
            }
            inner.sessions.insert(session.room_id.clone(), session);
            Ok(())
        })
    }

    fn replace_session(
        &self,
        mut session: SessionEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            let stored_version = inner
                .sessions
                .get(&session.room_id)
                .map(|existing| existing.version);
            match stored_version {
                Some(version) if version == expected_version => {
                    session.version = expected_version + 1;
                    inner.sessions.insert(session.room_id.clone(), session);
                    Ok(())
                }
                _ => Err(StorageError::conflict(format!(
                    "session for room `{}` changed since read",
                    session.room_id
                ))),
            }
        })
    }

    fn update_session_fields(
        &self,
        room_id: &str,
        updates: SessionFieldUpdates,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let room_id = room_id.to_owned();
        Box::pin(async move {
            let mut inner = store.lock();
            let Some(session) = inner.sessions.get_mut(&room_id) else {
                return Ok(false);
            };

            if let Some(player) = &updates.record_answer {
                if session.answered.iter().any(|answered| answered == player) {
                    return Ok(false);
                }
            }
            if updates.mark_hint_used && session.hint_used {
                return Ok(false);
            }

            for (player, increment) in &updates.score_increments {
                *session.scores.entry(player.clone()).or_insert(0) += increment;
            }
            for (player, streak) in &updates.streak_sets {
                session.streaks.insert(player.clone(), *streak);
            }
            if let Some(player) = updates.record_answer {
                session.answered.push(player);
            }
            if updates.mark_hint_used {
                session.hint_used = true;
            }
            session.version += 1;
            session.updated_at = SystemTime::now();
            Ok(true)
        })
    }

    fn insert_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .lock()
                .rounds
                .insert((round.session_id, round.round), round);
            Ok(())
        })
    }

    fn record_guess(
        &self,
        session_id: Uuid,
        round: u32,
        guess: GuessEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(record) = store.lock().rounds.get_mut(&(session_id, round)) {
                record.guesses.push(guess);
            }
            Ok(())
        })
    }

    fn set_round_hint_used(
        &self,
        session_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(record) = store.lock().rounds.get_mut(&(session_id, round)) {
                record.hint_used = true;
            }
            Ok(())
        })
    }

    fn close_round(
        &self,
        session_id: Uuid,
        round: u32,
        ended_at: SystemTime,
        reason: RoundEndReason,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(record) = store.lock().rounds.get_mut(&(session_id, round)) {
                record.ended_at = Some(ended_at);
                record.end_reason = Some(reason);
            }
            Ok(())
        })
    }

    fn expire_rounds(
        &self,
        session_id: Uuid,
        expire_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            for ((id, _), record) in inner.rounds.iter_mut() {
                if *id == session_id {
                    record.expire_at = Some(expire_at);
                }
            }
            Ok(())
        })
    }

    fn list_rounds(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .lock()
                .rounds
                .range((session_id, 0)..=(session_id, u32::MAX))
                .map(|(_, record)| record.clone())
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
