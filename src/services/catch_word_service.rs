//! Catch-the-word gameplay: guesses, hints, skips, and round advancement.

use std::{collections::HashMap, time::SystemTime};

use tracing::info;

use crate::{
    dao::models::{EndReason, GameKind, GuessEntity, RoundEndReason, RoundEntity},
    dto::{event::ServerEvent, format_system_time},
    error::{GameRuleError, ServiceError},
    services::{broadcast_service, game_service},
    state::{
        SharedState, rotation,
        scoring::catch_word_points,
        session::{Challenge, Session, normalize_guess},
    },
};

fn secret_word(session: &Session) -> Result<&str, ServiceError> {
    if !session.is_playing() || session.kind != GameKind::CatchWord {
        return Err(GameRuleError::GameNotActive.into());
    }
    match &session.challenge {
        Challenge::CatchWord { word, .. } => Ok(word),
        Challenge::WordChain { .. } => Err(GameRuleError::GameNotActive.into()),
    }
}

/// Handle a guess at the current secret word.
///
/// A correct guess scores the guesser (time bonus plus streak bonus) and the
/// drawer, atomically and at most once per guesser per round. When every
/// reachable guesser has answered the round ends immediately.
pub async fn submit_answer(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
    answer: &str,
) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;
    let session = game_service::load_session(state, room_id).await?;
    let word = secret_word(&session)?;

    if !session.seating.iter().any(|seat| seat == player_id) {
        return Err(GameRuleError::NotAuthorized.into());
    }
    if player_id == session.active_player {
        return Err(GameRuleError::DrawerCannotGuess.into());
    }
    if session.answered.contains(player_id) {
        return Err(GameRuleError::AlreadyAnswered.into());
    }
    if normalize_guess(answer) != normalize_guess(word) {
        return Err(GameRuleError::WrongAnswer.into());
    }

    let now = SystemTime::now();
    let streak = session.streaks.get(player_id).copied().unwrap_or(0);
    let points = catch_word_points(
        &state.config().catch_word,
        session.turn_seconds,
        session.elapsed_seconds(now),
        streak,
    );
    let drawer_bonus = state.config().catch_word.drawer_bonus;

    let updates = crate::dao::session_store::SessionFieldUpdates {
        score_increments: vec![
            (player_id.to_string(), points),
            (session.active_player.clone(), drawer_bonus),
        ],
        streak_sets: vec![(player_id.to_string(), streak + 1)],
        record_answer: Some(player_id.to_string()),
        mark_hint_used: false,
    };
    if !store.update_session_fields(room_id, updates).await? {
        // Lost the race against a duplicate of the same answer.
        return Err(GameRuleError::AlreadyAnswered.into());
    }

    store
        .record_guess(
            session.id,
            session.round,
            GuessEntity {
                player: player_id.to_string(),
                elapsed_ms: session.elapsed_millis(now),
                points,
            },
        )
        .await?;

    let session = game_service::load_session(state, room_id).await?;
    broadcast_service::broadcast(
        state,
        room_id,
        &ServerEvent::GuessCorrect {
            round: session.round,
            player: player_id.to_string(),
            points,
            drawer_bonus,
            streak: streak + 1,
            scores: session.scores.clone(),
            answered_count: session.answered.len(),
        },
    );

    if session.all_guessers_answered(&state.reachable_players(room_id)) {
        end_round(state, room_id, session.round, RoundEndReason::AllAnswered).await?;
    }
    Ok(())
}

struct NextRound {
    round: u32,
    drawer: String,
    word: String,
    turn_seconds: u64,
    started_at: SystemTime,
}

struct RoundTransition {
    ended_round: u32,
    ended_word: String,
    next: Option<NextRound>,
}

/// End round `round` and either advance to the next one or finish the game.
///
/// `round` is the round the caller observed when its trigger fired; if the
/// session has already moved past it, another trigger won the race and this
/// one is a no-op. Streaks reset for every seat that missed the round. The
/// game finishes when the final round ends, or when too few players remain
/// reachable to keep playing.
pub(crate) async fn end_round(
    state: &SharedState,
    room_id: &str,
    round: u32,
    reason: RoundEndReason,
) -> Result<(), ServiceError> {
    let reachable = state.reachable_players(room_id);
    let config = state.config().clone();

    let (session, transition) = game_service::commit_with_retry(state, room_id, |session| {
        if session.round != round {
            return Ok(None);
        }
        let word = secret_word(session)?.to_string();
        let ended_round = session.round;

        for player in session.streak_reset_candidates() {
            session.streaks.insert(player, 0);
        }

        let finished_all_rounds = session
            .total_rounds
            .is_some_and(|total| session.round >= total);
        let next_drawer = rotation::next_active_player(&session.seating, &reachable, session.round + 1);

        // Completing the last round outranks losing players along the way.
        if finished_all_rounds {
            let winner = session.top_scorer();
            session
                .finish(EndReason::Completed, winner)
                .map_err(|_| ServiceError::Rule(GameRuleError::GameNotActive))?;
            return Ok(Some(RoundTransition {
                ended_round,
                ended_word: word,
                next: None,
            }));
        }
        let Some(drawer) = next_drawer.filter(|_| reachable.len() >= config.min_players) else {
            let winner = session.top_scorer();
            session
                .finish(EndReason::NotEnoughPlayers, winner)
                .map_err(|_| ServiceError::Rule(GameRuleError::GameNotActive))?;
            return Ok(Some(RoundTransition {
                ended_round,
                ended_word: word,
                next: None,
            }));
        };

        let difficulty = match &session.challenge {
            Challenge::CatchWord { difficulty, .. } => *difficulty,
            Challenge::WordChain { .. } => Default::default(),
        };
        let now = SystemTime::now();
        session.round += 1;
        session.active_player = drawer.clone();
        session.challenge = Challenge::CatchWord {
            word: config.catch_word.word_banks.draw(difficulty),
            difficulty,
        };
        session.answered.clear();
        session.hint_used = false;
        session.turn_started_at = now;
        session.turn_seconds = config.catch_word.round_seconds;

        let next_word = match &session.challenge {
            Challenge::CatchWord { word, .. } => word.clone(),
            Challenge::WordChain { .. } => String::new(),
        };
        Ok(Some(RoundTransition {
            ended_round,
            ended_word: word,
            next: Some(NextRound {
                round: session.round,
                drawer,
                word: next_word,
                turn_seconds: session.turn_seconds,
                started_at: now,
            }),
        }))
    })
    .await?;

    let Some(transition) = transition else {
        // Another trigger already ended this round.
        return Ok(());
    };

    let store = state.require_session_store().await?;
    store
        .close_round(session.id, transition.ended_round, SystemTime::now(), reason)
        .await?;

    match transition.next {
        Some(next) => {
            store
                .insert_round(RoundEntity {
                    session_id: session.id,
                    room_id: room_id.to_string(),
                    round: next.round,
                    drawer: next.drawer.clone(),
                    word: next.word.clone(),
                    started_at: next.started_at,
                    ended_at: None,
                    end_reason: None,
                    guesses: Vec::new(),
                    hint_used: false,
                    expire_at: None,
                })
                .await?;

            info!(room = %room_id, round = next.round, drawer = %next.drawer, "round advanced");
            let base = ServerEvent::RoundEnded {
                round: transition.ended_round,
                reason,
                word: transition.ended_word,
                scores: session.scores.clone(),
                next_round: Some(next.round),
                next_drawer: Some(next.drawer.clone()),
                turn_seconds: Some(next.turn_seconds),
                turn_started_at: Some(format_system_time(next.started_at)),
                secret_word: None,
            };
            let mut drawer_copy = base.clone();
            if let ServerEvent::RoundEnded { secret_word, .. } = &mut drawer_copy {
                *secret_word = Some(next.word);
            }
            let mut overrides = HashMap::new();
            overrides.insert(next.drawer, drawer_copy);
            broadcast_service::send_differentiated(state, room_id, &base, &overrides);
            Ok(())
        }
        None => {
            broadcast_service::broadcast(
                state,
                room_id,
                &ServerEvent::RoundEnded {
                    round: transition.ended_round,
                    reason,
                    word: transition.ended_word,
                    scores: session.scores.clone(),
                    next_round: None,
                    next_drawer: None,
                    turn_seconds: None,
                    turn_started_at: None,
                    secret_word: None,
                },
            );
            game_service::finalize_game(state, &session).await
        }
    }
}

/// Handle a round-timeout report from any player in the room.
///
/// The report is validated against the server clock; early reports are
/// rejected so a malicious client cannot shorten rounds.
pub async fn round_timeout(
    state: &SharedState,
    room_id: &str,
    _player_id: &str,
) -> Result<(), ServiceError> {
    let session = game_service::load_session(state, room_id).await?;
    secret_word(&session)?;
    if !session.turn_expired(SystemTime::now()) {
        return Err(GameRuleError::TurnNotExpired.into());
    }
    end_round(state, room_id, session.round, RoundEndReason::Timeout).await
}

/// Reveal the once-per-round hint: first letter and word length.
pub async fn provide_hint(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;
    let session = game_service::load_session(state, room_id).await?;
    let word = secret_word(&session)?.to_string();
    if player_id != session.active_player {
        return Err(GameRuleError::DrawerOnly.into());
    }

    let updates = crate::dao::session_store::SessionFieldUpdates {
        mark_hint_used: true,
        ..Default::default()
    };
    if !store.update_session_fields(room_id, updates).await? {
        return Err(GameRuleError::HintAlreadyUsed.into());
    }
    store.set_round_hint_used(session.id, session.round).await?;

    let Some(first_letter) = word.chars().next().map(|c| c.to_ascii_lowercase()) else {
        return Err(ServiceError::InvalidInput("empty secret word".into()));
    };
    broadcast_service::broadcast(
        state,
        room_id,
        &ServerEvent::HintRevealed {
            round: session.round,
            first_letter,
            length: word.chars().count(),
        },
    );
    Ok(())
}

/// Let the drawer give up on the current word and move the game along.
pub async fn skip_turn(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
) -> Result<(), ServiceError> {
    let session = game_service::load_session(state, room_id).await?;
    secret_word(&session)?;
    if player_id != session.active_player {
        return Err(GameRuleError::DrawerOnly.into());
    }
    end_round(state, room_id, session.round, RoundEndReason::Skip).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{models::SessionStatus, session_store::memory::MemorySessionStore},
        state::{AppState, PlayerConnection},
    };
    use axum::extract::ws::Message;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    async fn playing_room(players: &[&str]) -> (SharedState, Vec<mpsc::UnboundedReceiver<Message>>) {
        let state = AppState::new(AppConfig::default());
        state
            .install_session_store(Arc::new(MemorySessionStore::new()))
            .await;
        let mut receivers = Vec::new();
        for player in players {
            let (tx, rx) = mpsc::unbounded_channel();
            let id = Uuid::new_v4();
            state.connections().insert(
                id,
                PlayerConnection {
                    id,
                    player_id: player.to_string(),
                    room_id: "room".to_string(),
                    owner: false,
                    tx,
                },
            );
            receivers.push(rx);
        }
        game_service::start_game(&state, "room", players[0], GameKind::CatchWord, None)
            .await
            .unwrap();
        (state, receivers)
    }

    async fn current(state: &SharedState) -> Session {
        game_service::load_session(state, "room").await.unwrap()
    }

    fn guesser(session: &Session) -> String {
        session
            .seating
            .iter()
            .find(|seat| **seat != session.active_player)
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn correct_answer_scores_guesser_and_drawer() {
        let (state, _rx) = playing_room(&["alice", "bob", "carol"]).await;
        let session = current(&state).await;
        let word = secret_word(&session).unwrap().to_string();
        let player = guesser(&session);

        submit_answer(&state, "room", &player, &word).await.unwrap();

        let after = current(&state).await;
        let expected = catch_word_points(&state.config().catch_word, 60, 0, 0);
        assert_eq!(after.scores[&player], expected);
        assert_eq!(
            after.scores[&after.active_player],
            state.config().catch_word.drawer_bonus
        );
        assert_eq!(after.streaks[&player], 1);
        assert!(after.answered.contains(&player));
    }

    #[tokio::test]
    async fn drawer_cannot_guess_and_duplicates_are_rejected() {
        let (state, _rx) = playing_room(&["alice", "bob", "carol"]).await;
        let session = current(&state).await;
        let word = secret_word(&session).unwrap().to_string();
        let drawer = session.active_player.clone();
        let player = guesser(&session);

        let err = submit_answer(&state, "room", &drawer, &word)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rule(GameRuleError::DrawerCannotGuess)
        ));

        submit_answer(&state, "room", &player, &word).await.unwrap();
        let err = submit_answer(&state, "room", &player, &word)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rule(GameRuleError::AlreadyAnswered)
        ));
    }

    #[tokio::test]
    async fn guesses_are_normalized_before_comparison() {
        let (state, _rx) = playing_room(&["alice", "bob", "carol"]).await;
        let session = current(&state).await;
        let word = secret_word(&session).unwrap().to_string();
        let player = guesser(&session);

        let sloppy = format!("  {} ", word.to_uppercase());
        submit_answer(&state, "room", &player, &sloppy)
            .await
            .unwrap();
        assert!(current(&state).await.answered.contains(&player));
    }

    #[tokio::test]
    async fn all_guessers_answering_ends_the_round() {
        let (state, _rx) = playing_room(&["alice", "bob", "carol"]).await;
        let session = current(&state).await;
        let first_drawer = session.active_player.clone();
        let word = secret_word(&session).unwrap().to_string();

        for seat in session.seating.iter().filter(|s| **s != first_drawer) {
            submit_answer(&state, "room", seat, &word).await.unwrap();
        }

        let after = current(&state).await;
        assert_eq!(after.round, 2);
        assert_ne!(after.active_player, first_drawer);
        assert!(after.answered.is_empty());
    }

    #[tokio::test]
    async fn missed_rounds_reset_streaks() {
        let (state, _rx) = playing_room(&["alice", "bob", "carol"]).await;
        let session = current(&state).await;
        let word = secret_word(&session).unwrap().to_string();
        let player = guesser(&session);

        submit_answer(&state, "room", &player, &word).await.unwrap();
        // Force the round to end with the other guesser silent.
        skip_or_end(&state).await;

        let after = current(&state).await;
        for seat in &after.seating {
            if *seat == player {
                assert_eq!(after.streaks[seat], 1);
            } else {
                assert_eq!(after.streaks[seat], 0);
            }
        }
    }

    async fn skip_or_end(state: &SharedState) {
        let drawer = current(state).await.active_player;
        skip_turn(state, "room", &drawer).await.unwrap();
    }

    #[tokio::test]
    async fn hint_is_single_use_and_drawer_only() {
        let (state, _rx) = playing_room(&["alice", "bob"]).await;
        let session = current(&state).await;
        let drawer = session.active_player.clone();
        let player = guesser(&session);

        let err = provide_hint(&state, "room", &player).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rule(GameRuleError::DrawerOnly)));

        provide_hint(&state, "room", &drawer).await.unwrap();
        let err = provide_hint(&state, "room", &drawer).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rule(GameRuleError::HintAlreadyUsed)
        ));
        assert!(current(&state).await.hint_used);
    }

    #[tokio::test]
    async fn duplicate_round_end_triggers_advance_once() {
        let (state, _rx) = playing_room(&["alice", "bob", "carol"]).await;
        let round = current(&state).await.round;

        // Two triggers that each observed round 1 before acting, the way every
        // client reporting the same deadline does.
        end_round(&state, "room", round, RoundEndReason::Timeout)
            .await
            .unwrap();
        end_round(&state, "room", round, RoundEndReason::Timeout)
            .await
            .unwrap();

        // The loser is a no-op; round 2 is still the one being played.
        assert_eq!(current(&state).await.round, 2);
    }

    #[tokio::test]
    async fn early_timeout_reports_are_rejected() {
        let (state, _rx) = playing_room(&["alice", "bob"]).await;
        let err = round_timeout(&state, "room", "bob").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rule(GameRuleError::TurnNotExpired)
        ));
    }

    #[tokio::test]
    async fn skipping_every_round_completes_the_game() {
        let (state, _rx) = playing_room(&["alice", "bob"]).await;
        let total = state.config().catch_word.total_rounds;

        for _ in 0..total {
            skip_or_end(&state).await;
        }

        let after = current(&state).await;
        assert_eq!(after.status, SessionStatus::Finished);
        assert_eq!(
            after.outcome.as_ref().map(|o| o.reason),
            Some(EndReason::Completed)
        );
        assert!(!state.expiry_timers().contains_key(&after.id));
    }

    #[tokio::test]
    async fn hint_resets_with_the_round() {
        let (state, _rx) = playing_room(&["alice", "bob"]).await;
        let drawer = current(&state).await.active_player;
        provide_hint(&state, "room", &drawer).await.unwrap();
        skip_or_end(&state).await;
        assert!(!current(&state).await.hint_used);
    }
}
