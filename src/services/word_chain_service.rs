//! Word-chain gameplay: word submissions, eliminations, and turn passing.

use std::time::SystemTime;

use tracing::info;

use crate::{
    dao::models::{EndReason, GameKind},
    dto::{event::ServerEvent, format_system_time},
    error::{GameRuleError, ServiceError},
    services::{
        broadcast_service,
        dictionary_service::WordLookup,
        game_service,
    },
    state::{
        SharedState, rotation,
        scoring::{word_chain_points, word_chain_turn_seconds},
        session::{Challenge, Session, UsedWord, chain_letter, normalize_word},
    },
};

fn chain_position(session: &Session) -> Result<(&str, char), ServiceError> {
    if !session.is_playing() || session.kind != GameKind::WordChain {
        return Err(GameRuleError::GameNotActive.into());
    }
    match &session.challenge {
        Challenge::WordChain {
            current_word,
            required_letter,
        } => Ok((current_word, *required_letter)),
        Challenge::CatchWord { .. } => Err(GameRuleError::GameNotActive.into()),
    }
}

/// Handle a word submission from the active player.
///
/// The word must start with the required letter, be new to this game, and
/// pass the dictionary check. An accepted word scores the player, extends the
/// chain with its last letter, and passes the turn. A submission arriving
/// after the turn budget elapsed forfeits the turn instead.
pub async fn submit_word(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
    word: &str,
) -> Result<(), ServiceError> {
    let session = game_service::load_session(state, room_id).await?;
    let (_, required) = chain_position(&session)?;
    if player_id != session.active_player {
        return Err(GameRuleError::NotYourTurn.into());
    }

    let now = SystemTime::now();
    if session.turn_expired(now) {
        // Too late; the turn is forfeit no matter what the word was.
        return handle_timeout(state, room_id, player_id).await;
    }

    let normalized = normalize_word(word);
    if normalized.chars().next() != Some(required) {
        return Err(GameRuleError::WrongLetter { required }.into());
    }
    if session.word_used(&normalized) {
        return Err(GameRuleError::WordAlreadyUsed.into());
    }

    let (definition, phonetic) = match state.dictionary().lookup(&normalized).await {
        WordLookup::Valid {
            definition,
            phonetic,
        } => (definition, phonetic),
        WordLookup::Invalid { reason } => {
            return Err(GameRuleError::InvalidWord { reason }.into());
        }
    };

    let points = word_chain_points(
        &state.config().word_chain,
        session.remaining_seconds(now),
        normalized.chars().count(),
    );
    let reachable = state.reachable_players(room_id);
    let config = state.config().clone();

    let (session, _) = game_service::commit_with_retry(state, room_id, |session| {
        let (_, required) = chain_position(session)?;
        if player_id != session.active_player {
            return Err(GameRuleError::NotYourTurn.into());
        }
        if session.word_used(&normalized) {
            return Err(GameRuleError::WordAlreadyUsed.into());
        }

        *session.scores.entry(player_id.to_string()).or_insert(0) += points;
        session.used_words.push(UsedWord {
            word: normalized.clone(),
            player: Some(player_id.to_string()),
            definition: definition.clone(),
            phonetic: phonetic.clone(),
        });

        let next_letter = chain_letter(&normalized).unwrap_or(required);
        session.challenge = Challenge::WordChain {
            current_word: normalized.clone(),
            required_letter: next_letter,
        };
        session.round += 1;
        let eligible = session.eligible_players(&reachable);
        if let Some(next) = rotation::next_active_player(&session.seating, &eligible, session.round)
        {
            session.active_player = next;
        }
        session.turn_seconds = word_chain_turn_seconds(&config.word_chain, session.round);
        session.turn_started_at = SystemTime::now();
        Ok(())
    })
    .await?;

    let (current_word, required_letter) = match &session.challenge {
        Challenge::WordChain {
            current_word,
            required_letter,
        } => (current_word.clone(), *required_letter),
        Challenge::CatchWord { .. } => (normalized.clone(), required),
    };
    info!(room = %room_id, player = %player_id, word = %current_word, "word accepted");
    broadcast_service::broadcast(
        state,
        room_id,
        &ServerEvent::WordAccepted {
            round: session.round,
            player: player_id.to_string(),
            word: current_word,
            definition,
            phonetic,
            points,
            scores: session.scores.clone(),
            next_player: session.active_player.clone(),
            required_letter,
            turn_seconds: session.turn_seconds,
            turn_started_at: format_system_time(session.turn_started_at),
        },
    );
    Ok(())
}

/// Handle a forfeited turn: the active player is eliminated from the chain.
///
/// Self-reports are accepted without checking the clock; a player giving up
/// early only hurts themselves. Anyone else may report too (the active player
/// may have vanished), but only once the server clock agrees the budget
/// elapsed. With one or zero eligible players left the game ends.
pub async fn handle_timeout(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
) -> Result<(), ServiceError> {
    let session = game_service::load_session(state, room_id).await?;
    chain_position(&session)?;
    if player_id != session.active_player && !session.turn_expired(SystemTime::now()) {
        return Err(GameRuleError::TurnNotExpired.into());
    }
    let timed_out = session.active_player.clone();

    let reachable = state.reachable_players(room_id);
    let config = state.config().clone();

    let (session, still_playing) =
        game_service::commit_with_retry(state, room_id, |session| {
            chain_position(session)?;
            if timed_out != session.active_player {
                // The turn already moved on; someone beat us to it.
                return Err(GameRuleError::NotYourTurn.into());
            }

            session.eliminated.insert(timed_out.clone());
            let eligible = session.eligible_players(&reachable);
            if eligible.len() <= 1 {
                let winner = eligible
                    .iter()
                    .next()
                    .cloned()
                    .or_else(|| session.top_scorer());
                session
                    .finish(EndReason::LastPlayerStanding, winner)
                    .map_err(|_| ServiceError::Rule(GameRuleError::GameNotActive))?;
                return Ok(false);
            }

            session.round += 1;
            if let Some(next) =
                rotation::next_active_player(&session.seating, &eligible, session.round)
            {
                session.active_player = next;
            }
            session.turn_seconds = word_chain_turn_seconds(&config.word_chain, session.round);
            session.turn_started_at = SystemTime::now();
            Ok(true)
        })
        .await?;

    info!(room = %room_id, player = %timed_out, "player eliminated");
    if still_playing {
        let required_letter = match &session.challenge {
            Challenge::WordChain {
                required_letter, ..
            } => Some(*required_letter),
            Challenge::CatchWord { .. } => None,
        };
        broadcast_service::broadcast(
            state,
            room_id,
            &ServerEvent::PlayerEliminated {
                player: timed_out.clone(),
                next_player: Some(session.active_player.clone()),
                required_letter,
                turn_seconds: Some(session.turn_seconds),
                turn_started_at: Some(format_system_time(session.turn_started_at)),
            },
        );
        Ok(())
    } else {
        broadcast_service::broadcast(
            state,
            room_id,
            &ServerEvent::PlayerEliminated {
                player: timed_out.clone(),
                next_player: None,
                required_letter: None,
                turn_seconds: None,
                turn_started_at: None,
            },
        );
        game_service::finalize_game(state, &session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{models::SessionStatus, session_store::memory::MemorySessionStore},
        services::dictionary_service::{Definition, DefinerError, WordDefiner},
        state::{AppState, PlayerConnection},
    };
    use axum::extract::ws::Message;
    use futures::future::BoxFuture;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    struct YesDefiner;

    impl WordDefiner for YesDefiner {
        fn define<'a>(
            &'a self,
            _word: &'a str,
        ) -> BoxFuture<'a, Result<Definition, DefinerError>> {
            Box::pin(async {
                Ok(Definition {
                    found: true,
                    definition: Some("a word".to_string()),
                    phonetic: Some("/wɜːd/".to_string()),
                })
            })
        }
    }

    struct NoDefiner;

    impl WordDefiner for NoDefiner {
        fn define<'a>(
            &'a self,
            _word: &'a str,
        ) -> BoxFuture<'a, Result<Definition, DefinerError>> {
            Box::pin(async {
                Ok(Definition {
                    found: false,
                    definition: None,
                    phonetic: None,
                })
            })
        }
    }

    async fn playing_room(
        definer: Arc<dyn WordDefiner>,
        players: &[&str],
    ) -> (SharedState, Vec<mpsc::UnboundedReceiver<Message>>) {
        let state = AppState::with_word_definer(AppConfig::default(), definer);
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
        game_service::start_game(&state, "room", players[0], GameKind::WordChain, None)
            .await
            .unwrap();
        (state, receivers)
    }

    async fn current(state: &SharedState) -> Session {
        game_service::load_session(state, "room").await.unwrap()
    }

    fn required_word(session: &Session) -> (String, char) {
        match &session.challenge {
            Challenge::WordChain {
                current_word,
                required_letter,
            } => (current_word.clone(), *required_letter),
            Challenge::CatchWord { .. } => panic!("wrong game kind"),
        }
    }

    #[tokio::test]
    async fn accepted_word_scores_and_passes_the_turn() {
        let (state, _rx) = playing_room(Arc::new(YesDefiner), &["alice", "bob", "carol"]).await;
        let session = current(&state).await;
        let player = session.active_player.clone();
        let (_, letter) = required_word(&session);

        let word = format!("{letter}ant");
        submit_word(&state, "room", &player, &word).await.unwrap();

        let after = current(&state).await;
        assert_eq!(after.round, 2);
        assert_ne!(after.active_player, player);
        assert!(after.scores[&player] > 0);
        let (current_word, required) = required_word(&after);
        assert_eq!(current_word, word.to_lowercase());
        assert_eq!(required, 't');
        assert!(after.word_used(&word.to_lowercase()));
        let played = after.used_words.last().unwrap();
        assert_eq!(played.definition.as_deref(), Some("a word"));
        assert_eq!(played.phonetic.as_deref(), Some("/wɜːd/"));
    }

    #[tokio::test]
    async fn only_the_active_player_may_submit() {
        let (state, _rx) = playing_room(Arc::new(YesDefiner), &["alice", "bob"]).await;
        let session = current(&state).await;
        let other = session
            .seating
            .iter()
            .find(|seat| **seat != session.active_player)
            .unwrap();

        let err = submit_word(&state, "room", other, "tiger").await.unwrap_err();
        assert!(matches!(err, ServiceError::Rule(GameRuleError::NotYourTurn)));
    }

    #[tokio::test]
    async fn wrong_first_letter_is_rejected() {
        let (state, _rx) = playing_room(Arc::new(YesDefiner), &["alice", "bob"]).await;
        let session = current(&state).await;
        let player = session.active_player.clone();
        let (_, letter) = required_word(&session);
        let wrong = if letter == 'z' { 'a' } else { 'z' };

        let err = submit_word(&state, "room", &player, &format!("{wrong}ebra"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rule(GameRuleError::WrongLetter { .. })
        ));
    }

    #[tokio::test]
    async fn repeating_a_word_is_rejected() {
        let (state, _rx) = playing_room(Arc::new(YesDefiner), &["alice", "bob"]).await;
        let session = current(&state).await;
        let (starter, letter) = required_word(&session);

        // Replaying the starter itself is only possible when the chain loops
        // back to its first letter; build that loop explicitly.
        if starter.starts_with(letter) {
            let player = session.active_player.clone();
            let err = submit_word(&state, "room", &player, &starter)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ServiceError::Rule(GameRuleError::WordAlreadyUsed)
            ));
        } else {
            let player = session.active_player.clone();
            // Steer the chain onto 'o' so "oxo" can be played and replayed.
            submit_word(&state, "room", &player, &format!("{letter}oxo"))
                .await
                .unwrap();
            let next = current(&state).await.active_player;
            submit_word(&state, "room", &next, "oxo").await.unwrap();
            let third = current(&state).await.active_player;
            let err = submit_word(&state, "room", &third, "oxo").await.unwrap_err();
            assert!(matches!(
                err,
                ServiceError::Rule(GameRuleError::WordAlreadyUsed)
            ));
        }
    }

    #[tokio::test]
    async fn dictionary_rejection_blocks_the_word() {
        let (state, _rx) = playing_room(Arc::new(NoDefiner), &["alice", "bob"]).await;
        let session = current(&state).await;
        let player = session.active_player.clone();
        let (_, letter) = required_word(&session);

        let err = submit_word(&state, "room", &player, &format!("{letter}zzz"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rule(GameRuleError::InvalidWord { .. })
        ));
    }

    #[tokio::test]
    async fn timeout_eliminates_down_to_a_winner() {
        let (state, _rx) = playing_room(Arc::new(YesDefiner), &["alice", "bob", "carol"]).await;
        let session = current(&state).await;

        // First elimination leaves two players in the chain.
        let first = session.active_player.clone();
        handle_timeout(&state, "room", &first).await.unwrap();
        let after = current(&state).await;
        assert!(after.is_playing());
        assert!(after.eliminated.contains(&first));
        assert_ne!(after.active_player, first);

        // Second elimination leaves one: the game ends, survivor wins.
        let second = after.active_player.clone();
        handle_timeout(&state, "room", &second).await.unwrap();
        let done = current(&state).await;
        assert_eq!(done.status, SessionStatus::Finished);
        let outcome = done.outcome.as_ref().unwrap();
        assert_eq!(outcome.reason, EndReason::LastPlayerStanding);
        let survivor = outcome.winner.as_ref().unwrap();
        assert_ne!(survivor, &first);
        assert_ne!(survivor, &second);
        assert!(!state.expiry_timers().contains_key(&done.id));
    }

    #[tokio::test]
    async fn bystander_timeout_report_needs_an_expired_clock() {
        let (state, _rx) = playing_room(Arc::new(YesDefiner), &["alice", "bob"]).await;
        let session = current(&state).await;
        let other = session
            .seating
            .iter()
            .find(|seat| **seat != session.active_player)
            .unwrap()
            .clone();

        // Turn budget still running: the report is premature.
        let err = handle_timeout(&state, "room", &other).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rule(GameRuleError::TurnNotExpired)
        ));

        // Backdate the turn clock past the budget; now the report lands and
        // the active player is the one eliminated.
        let mut stale = current(&state).await;
        let active = stale.active_player.clone();
        stale.turn_started_at =
            SystemTime::now() - std::time::Duration::from_secs(stale.turn_seconds + 5);
        let version = stale.version;
        state
            .require_session_store()
            .await
            .unwrap()
            .replace_session(stale.into(), version)
            .await
            .unwrap();

        handle_timeout(&state, "room", &other).await.unwrap();
        let done = current(&state).await;
        assert_eq!(done.status, SessionStatus::Finished);
        assert!(done.eliminated.contains(&active));
    }

    #[tokio::test]
    async fn turn_budget_shrinks_each_round() {
        let (state, _rx) = playing_room(Arc::new(YesDefiner), &["alice", "bob"]).await;
        let session = current(&state).await;
        let initial = session.turn_seconds;
        let player = session.active_player.clone();
        let (_, letter) = required_word(&session);

        submit_word(&state, "room", &player, &format!("{letter}int"))
            .await
            .unwrap();
        let after = current(&state).await;
        assert_eq!(
            after.turn_seconds,
            initial - state.config().word_chain.turn_shrink_step
        );
    }
}
