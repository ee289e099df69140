//! Game lifecycle: starting, stopping, duration expiry, and read views.
//!
//! Gameplay mutations go through [`commit_with_retry`], a load-mutate-replace
//! loop over the versioned session document. Concurrent writers invalidate
//! each other's expected version; the loser reloads and retries a bounded
//! number of times before reporting contention.

use std::{
    collections::HashMap,
    time::{Duration, SystemTime},
};

use rand::seq::SliceRandom;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{EndReason, GameKind, RoundEntity, SessionEntity, SessionStatus},
    dto::{
        event::ServerEvent,
        format_system_time,
        game::{GameSnapshot, RoundStats},
    },
    error::{GameRuleError, ServiceError},
    services::{broadcast_service, expiry_service},
    state::{
        SharedState,
        session::{Challenge, Session, chain_letter, normalize_word},
    },
};

/// Load the room's session from the store, or fail with `NotFound`.
pub(crate) async fn load_session(
    state: &SharedState,
    room_id: &str,
) -> Result<Session, ServiceError> {
    let store = state.require_session_store().await?;
    let entity = store
        .find_session(room_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no game in room `{room_id}`")))?;
    Ok(Session::from(entity))
}

/// Load, mutate, and replace the session document under optimistic versioning.
///
/// The closure runs against a freshly loaded session on every attempt; any
/// error it returns aborts the loop. A version conflict on the write reloads
/// and retries, up to the configured attempt budget.
pub(crate) async fn commit_with_retry<T>(
    state: &SharedState,
    room_id: &str,
    mut mutate: impl FnMut(&mut Session) -> Result<T, ServiceError>,
) -> Result<(Session, T), ServiceError> {
    let store = state.require_session_store().await?;
    let attempts = state.config().storage.max_write_attempts.max(1);

    for attempt in 1..=attempts {
        let entity = store
            .find_session(room_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no game in room `{room_id}`")))?;
        let mut session = Session::from(entity);
        let expected = session.version;

        let value = mutate(&mut session)?;
        session.updated_at = SystemTime::now();

        match store
            .replace_session(SessionEntity::from(session.clone()), expected)
            .await
        {
            Ok(()) => {
                session.version = expected + 1;
                return Ok((session, value));
            }
            Err(err) if err.is_conflict() => {
                warn!(room = %room_id, attempt, "session write conflict, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ServiceError::Contention(format!(
        "gave up updating room `{room_id}` after {attempts} attempts"
    )))
}

/// Start a game in a room.
///
/// Seats every currently reachable player in shuffled order, persists the new
/// session, arms the whole-game duration timer, and announces the start to
/// the room. The drawer's copy of the announcement carries the secret word.
pub async fn start_game(
    state: &SharedState,
    room_id: &str,
    initiator: &str,
    kind: GameKind,
    difficulty: Option<crate::dao::models::Difficulty>,
) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;
    let config = state.config();

    let reachable = state.reachable_players(room_id);
    if reachable.len() < config.min_players {
        return Err(GameRuleError::NotEnoughPlayers {
            required: config.min_players,
            reachable: reachable.len(),
        }
        .into());
    }

    if let Some(existing) = store.find_session(room_id).await?
        && existing.status == SessionStatus::Playing
    {
        return Err(GameRuleError::AlreadyRunning.into());
    }

    let mut seating: Vec<String> = reachable.into_iter().collect();
    seating.sort();
    seating.shuffle(&mut rand::rng());

    let (challenge, total_rounds, turn_seconds) = match kind {
        GameKind::CatchWord => {
            let difficulty = difficulty.unwrap_or_default();
            let word = config.catch_word.word_banks.draw(difficulty);
            (
                Challenge::CatchWord { word, difficulty },
                Some(config.catch_word.total_rounds),
                config.catch_word.round_seconds,
            )
        }
        GameKind::WordChain => {
            let starter = normalize_word(&config.word_chain.draw_starter());
            let required_letter = chain_letter(&starter).unwrap_or('a');
            (
                Challenge::WordChain {
                    current_word: starter,
                    required_letter,
                },
                None,
                config.word_chain.initial_turn_seconds,
            )
        }
    };

    let session = Session::start(
        room_id.to_string(),
        initiator.to_string(),
        kind,
        seating,
        challenge,
        total_rounds,
        turn_seconds,
    );

    store
        .insert_session(SessionEntity::from(session.clone()))
        .await
        .map_err(|err| {
            if err.is_conflict() {
                ServiceError::Rule(GameRuleError::AlreadyRunning)
            } else {
                ServiceError::from(err)
            }
        })?;

    if let Challenge::CatchWord { word, .. } = &session.challenge {
        store
            .insert_round(RoundEntity {
                session_id: session.id,
                room_id: session.room_id.clone(),
                round: session.round,
                drawer: session.active_player.clone(),
                word: word.clone(),
                started_at: session.turn_started_at,
                ended_at: None,
                end_reason: None,
                guesses: Vec::new(),
                hint_used: false,
                expire_at: None,
            })
            .await?;
    }

    expiry_service::arm(
        state,
        session.id,
        room_id,
        Duration::from_secs(config.game_duration_seconds(kind)),
    );

    info!(room = %room_id, session = %session.id, ?kind, "game started");
    announce_start(state, &session);
    Ok(())
}

fn announce_start(state: &SharedState, session: &Session) {
    let (secret_word, current_word, required_letter) = match &session.challenge {
        Challenge::CatchWord { word, .. } => (Some(word.clone()), None, None),
        Challenge::WordChain {
            current_word,
            required_letter,
        } => (None, Some(current_word.clone()), Some(*required_letter)),
    };

    let base = ServerEvent::GameStarted {
        session_id: session.id,
        kind: session.kind,
        round: session.round,
        total_rounds: session.total_rounds,
        seating: session.seating.clone(),
        active_player: session.active_player.clone(),
        turn_seconds: session.turn_seconds,
        turn_started_at: format_system_time(session.turn_started_at),
        secret_word: None,
        current_word,
        required_letter,
    };

    let mut overrides = HashMap::new();
    if let Some(word) = secret_word {
        let mut drawer_copy = base.clone();
        if let ServerEvent::GameStarted { secret_word, .. } = &mut drawer_copy {
            *secret_word = Some(word);
        }
        overrides.insert(session.active_player.clone(), drawer_copy);
    }

    broadcast_service::send_differentiated(state, &session.room_id, &base, &overrides);
}

/// Stop the running game in a room.
///
/// Only the player who started the game or a room owner may stop it. The
/// current leader is declared winner.
pub async fn stop_game(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
) -> Result<(), ServiceError> {
    let session = load_session(state, room_id).await?;
    if !session.is_playing() {
        return Err(GameRuleError::GameNotActive.into());
    }
    if player_id != session.initiator && !state.is_room_owner(room_id, player_id) {
        return Err(GameRuleError::NotAuthorized.into());
    }

    let (session, _) = commit_with_retry(state, room_id, |session| {
        if !session.is_playing() {
            return Err(GameRuleError::GameNotActive.into());
        }
        let winner = session.top_scorer();
        session
            .finish(EndReason::Stopped, winner)
            .map_err(|_| ServiceError::Rule(GameRuleError::GameNotActive))?;
        Ok(())
    })
    .await?;

    info!(room = %room_id, session = %session.id, by = %player_id, "game stopped");
    finalize_game(state, &session).await
}

/// End a session whose whole-game duration cap elapsed.
///
/// Idempotent: a missing room, a different session in the room, or an already
/// finished game are all quiet successes, since the timer may race with a
/// normal ending.
pub async fn expire_session(
    state: &SharedState,
    room_id: &str,
    session_id: Uuid,
) -> Result<(), ServiceError> {
    let Some(store) = state.session_store().await else {
        return Ok(());
    };
    let Some(entity) = store.find_session(room_id).await? else {
        return Ok(());
    };
    if entity.id != session_id || entity.status != SessionStatus::Playing {
        return Ok(());
    }

    let result = commit_with_retry(state, room_id, |session| {
        if session.id != session_id || !session.is_playing() {
            return Err(GameRuleError::GameNotActive.into());
        }
        let winner = session.top_scorer();
        session
            .finish(EndReason::TimeExpired, winner)
            .map_err(|_| ServiceError::Rule(GameRuleError::GameNotActive))?;
        Ok(())
    })
    .await;

    match result {
        Ok((session, _)) => {
            info!(room = %room_id, session = %session_id, "game duration cap reached");
            finalize_game(state, &session).await
        }
        Err(ServiceError::Rule(GameRuleError::GameNotActive)) => Ok(()),
        Err(ServiceError::NotFound(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

/// Shared tail of every game ending: cancel the duration timer, stamp round
/// retention, and announce the final scoreboard.
pub(crate) async fn finalize_game(
    state: &SharedState,
    session: &Session,
) -> Result<(), ServiceError> {
    expiry_service::disarm(state, session.id);

    if session.kind == GameKind::CatchWord
        && let Some(store) = state.session_store().await
    {
        let retention = Duration::from_secs(state.config().storage.round_retention_seconds);
        store
            .expire_rounds(session.id, SystemTime::now() + retention)
            .await?;
    }

    let (reason, winner) = match &session.outcome {
        Some(outcome) => (outcome.reason, outcome.winner.clone()),
        None => (EndReason::Completed, session.top_scorer()),
    };
    broadcast_service::broadcast(
        state,
        &session.room_id,
        &ServerEvent::GameEnded {
            reason,
            winner,
            scores: session.scores.clone(),
        },
    );
    Ok(())
}

/// Current game view for a room, with secrets withheld.
pub async fn session_snapshot(
    state: &SharedState,
    room_id: &str,
) -> Result<GameSnapshot, ServiceError> {
    let session = load_session(state, room_id).await?;
    Ok(GameSnapshot::from(&session))
}

/// Round-by-round statistics of the room's current (or latest) session.
pub async fn round_stats(
    state: &SharedState,
    room_id: &str,
) -> Result<Vec<RoundStats>, ServiceError> {
    let store = state.require_session_store().await?;
    let session = load_session(state, room_id).await?;
    let rounds = store.list_rounds(session.id).await?;
    Ok(rounds.into_iter().map(RoundStats::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::session_store::memory::MemorySessionStore,
        state::{AppState, PlayerConnection},
    };
    use axum::extract::ws::Message;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    async fn state_with_store() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .install_session_store(Arc::new(MemorySessionStore::new()))
            .await;
        state
    }

    fn connect(
        state: &SharedState,
        room: &str,
        player: &str,
        owner: bool,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        state.connections().insert(
            id,
            PlayerConnection {
                id,
                player_id: player.to_string(),
                room_id: room.to_string(),
                owner,
                tx,
            },
        );
        rx
    }

    #[tokio::test]
    async fn starting_needs_enough_players() {
        let state = state_with_store().await;
        let _rx = connect(&state, "room", "alice", false);

        let err = start_game(&state, "room", "alice", GameKind::CatchWord, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rule(GameRuleError::NotEnoughPlayers {
                required: 2,
                reachable: 1,
            })
        ));
    }

    #[tokio::test]
    async fn starting_seats_every_reachable_player() {
        let state = state_with_store().await;
        let _rx_a = connect(&state, "room", "alice", false);
        let _rx_b = connect(&state, "room", "bob", false);
        let _rx_c = connect(&state, "room", "carol", false);

        start_game(&state, "room", "alice", GameKind::CatchWord, None)
            .await
            .unwrap();

        let session = load_session(&state, "room").await.unwrap();
        assert!(session.is_playing());
        assert_eq!(session.round, 1);
        assert_eq!(session.total_rounds, Some(5));
        let mut seated = session.seating.clone();
        seated.sort();
        assert_eq!(seated, vec!["alice", "bob", "carol"]);
        assert_eq!(session.seating[0], session.active_player);
        assert!(state.expiry_timers().contains_key(&session.id));
    }

    #[tokio::test]
    async fn only_the_drawer_sees_the_secret_word() {
        let state = state_with_store().await;
        let mut rx_a = connect(&state, "room", "alice", false);
        let mut rx_b = connect(&state, "room", "bob", false);

        start_game(&state, "room", "alice", GameKind::CatchWord, None)
            .await
            .unwrap();
        let session = load_session(&state, "room").await.unwrap();

        let mut saw_secret = 0;
        for rx in [&mut rx_a, &mut rx_b] {
            let Ok(Message::Text(payload)) = rx.try_recv() else {
                panic!("player missed the start announcement");
            };
            let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
            assert_eq!(json["type"], "game_started");
            if json.get("secret_word").is_some() {
                saw_secret += 1;
            }
        }
        assert_eq!(saw_secret, 1, "exactly one player gets the word");
        let _ = session;
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_playing() {
        let state = state_with_store().await;
        let _rx_a = connect(&state, "room", "alice", false);
        let _rx_b = connect(&state, "room", "bob", false);

        start_game(&state, "room", "alice", GameKind::WordChain, None)
            .await
            .unwrap();
        let err = start_game(&state, "room", "bob", GameKind::CatchWord, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rule(GameRuleError::AlreadyRunning)
        ));
    }

    #[tokio::test]
    async fn stopping_requires_initiator_or_owner() {
        let state = state_with_store().await;
        let _rx_a = connect(&state, "room", "alice", false);
        let _rx_b = connect(&state, "room", "bob", false);
        let _rx_o = connect(&state, "room", "olive", true);

        start_game(&state, "room", "alice", GameKind::CatchWord, None)
            .await
            .unwrap();

        let err = stop_game(&state, "room", "bob").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rule(GameRuleError::NotAuthorized)
        ));

        stop_game(&state, "room", "olive").await.unwrap();
        let session = load_session(&state, "room").await.unwrap();
        assert_eq!(session.status, SessionStatus::Finished);
        assert!(!state.expiry_timers().contains_key(&session.id));
        assert_eq!(
            session.outcome.as_ref().map(|o| o.reason),
            Some(EndReason::Stopped)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn duration_cap_firing_force_finishes_the_game() {
        let state = state_with_store().await;
        let _rx_a = connect(&state, "room", "alice", false);
        let _rx_b = connect(&state, "room", "bob", false);

        start_game(&state, "room", "alice", GameKind::CatchWord, None)
            .await
            .unwrap();
        let session = load_session(&state, "room").await.unwrap();
        assert!(state.expiry_timers().contains_key(&session.id));

        let cap = state.config().catch_word.game_duration_seconds;
        tokio::time::sleep(Duration::from_secs(cap + 1)).await;
        // Let the fired timer task finish its writes.
        for _ in 0..100 {
            tokio::task::yield_now().await;
            if !load_session(&state, "room").await.unwrap().is_playing() {
                break;
            }
        }

        let after = load_session(&state, "room").await.unwrap();
        assert_eq!(after.status, SessionStatus::Finished);
        assert_eq!(
            after.outcome.as_ref().map(|o| o.reason),
            Some(EndReason::TimeExpired)
        );
        assert!(!state.expiry_timers().contains_key(&session.id));
    }

    #[tokio::test]
    async fn expiry_is_idempotent_after_a_normal_ending() {
        let state = state_with_store().await;
        let _rx_a = connect(&state, "room", "alice", false);
        let _rx_b = connect(&state, "room", "bob", false);

        start_game(&state, "room", "alice", GameKind::WordChain, None)
            .await
            .unwrap();
        let session = load_session(&state, "room").await.unwrap();
        stop_game(&state, "room", "alice").await.unwrap();

        expire_session(&state, "room", session.id).await.unwrap();
        let after = load_session(&state, "room").await.unwrap();
        assert_eq!(
            after.outcome.as_ref().map(|o| o.reason),
            Some(EndReason::Stopped)
        );
    }
}
