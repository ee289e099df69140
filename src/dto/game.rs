use indexmap::IndexMap;
use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{
        Difficulty, EndReason, GameKind, GuessEntity, RoundEndReason, RoundEntity, SessionStatus,
    },
    dto::format_system_time,
    state::session::{Challenge, Session},
};

/// Read-only view of a session, safe to show any player in the room.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSnapshot {
    /// Session identifier.
    pub session_id: Uuid,
    /// Room the session belongs to.
    pub room_id: String,
    /// Game variant.
    pub kind: GameKind,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Current round number, 1-based.
    pub round: u32,
    /// Total round count for catch-the-word; absent for word-chain.
    pub total_rounds: Option<u32>,
    /// Player whose turn it is.
    pub active_player: String,
    /// RFC 3339 timestamp the turn clock started from.
    pub turn_started_at: String,
    /// Seconds allotted for the current turn.
    pub turn_seconds: u64,
    /// Current scoreboard.
    #[schema(value_type = Object)]
    pub scores: IndexMap<String, u32>,
    /// Current answer streaks (catch-the-word).
    #[schema(value_type = Object)]
    pub streaks: IndexMap<String, u32>,
    /// Players eliminated from the game (word-chain).
    pub eliminated: Vec<String>,
    /// Players who answered the current round (catch-the-word).
    pub answered: Vec<String>,
    /// Current challenge, with the secret word withheld.
    pub challenge: ChallengeSnapshot,
    /// Whether the current round's hint was revealed.
    pub hint_used: bool,
    /// Final outcome once the game is over.
    pub outcome: Option<OutcomeSnapshot>,
}

/// Challenge view that never leaks the secret word.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChallengeSnapshot {
    /// Catch-the-word round in progress.
    CatchWord {
        /// Length of the secret word in characters.
        word_length: usize,
        /// Difficulty tier the word was drawn at.
        difficulty: Difficulty,
        /// First letter of the secret word, present once the hint was used.
        #[schema(value_type = Option<String>)]
        hint_letter: Option<char>,
    },
    /// Word-chain position.
    WordChain {
        /// Most recently accepted word.
        current_word: String,
        /// Letter the next word must begin with.
        #[schema(value_type = String)]
        required_letter: char,
    },
}

/// How a finished game ended.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OutcomeSnapshot {
    /// Why the game ended.
    pub reason: EndReason,
    /// Winner, when one could be determined.
    pub winner: Option<String>,
}

impl From<&Session> for GameSnapshot {
    fn from(session: &Session) -> Self {
        let challenge = match &session.challenge {
            Challenge::CatchWord { word, difficulty } => ChallengeSnapshot::CatchWord {
                word_length: word.chars().count(),
                difficulty: *difficulty,
                hint_letter: session
                    .hint_used
                    .then(|| word.chars().next())
                    .flatten()
                    .map(|letter| letter.to_ascii_lowercase()),
            },
            Challenge::WordChain {
                current_word,
                required_letter,
            } => ChallengeSnapshot::WordChain {
                current_word: current_word.clone(),
                required_letter: *required_letter,
            },
        };

        let mut eliminated: Vec<String> = session.eliminated.iter().cloned().collect();
        eliminated.sort();
        let mut answered: Vec<String> = session.answered.iter().cloned().collect();
        answered.sort();

        GameSnapshot {
            session_id: session.id,
            room_id: session.room_id.clone(),
            kind: session.kind,
            status: session.status,
            round: session.round,
            total_rounds: session.total_rounds,
            active_player: session.active_player.clone(),
            turn_started_at: format_system_time(session.turn_started_at),
            turn_seconds: session.turn_seconds,
            scores: session.scores.clone(),
            streaks: session.streaks.clone(),
            eliminated,
            answered,
            challenge,
            hint_used: session.hint_used,
            outcome: session.outcome.as_ref().map(|outcome| OutcomeSnapshot {
                reason: outcome.reason,
                winner: outcome.winner.clone(),
            }),
        }
    }
}

/// One correct guess inside a round record.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GuessStats {
    /// Guessing player.
    pub player: String,
    /// Time from round start to the correct answer, in milliseconds.
    pub elapsed_ms: u64,
    /// Points awarded for this guess.
    pub points: u32,
}

/// Per-round statistics exposed after (or during) a catch-the-word game.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundStats {
    /// Round number, 1-based.
    pub round: u32,
    /// Player who drew this round.
    pub drawer: String,
    /// Secret word of the round; withheld while the round is still open.
    pub word: Option<String>,
    /// RFC 3339 round start time.
    pub started_at: String,
    /// RFC 3339 round end time, absent while in progress.
    pub ended_at: Option<String>,
    /// Why the round ended, absent while in progress.
    pub end_reason: Option<RoundEndReason>,
    /// Correct guesses in answer order.
    pub guesses: Vec<GuessStats>,
    /// Whether the hint was revealed during this round.
    pub hint_used: bool,
}

impl From<GuessEntity> for GuessStats {
    fn from(entity: GuessEntity) -> Self {
        GuessStats {
            player: entity.player,
            elapsed_ms: entity.elapsed_ms,
            points: entity.points,
        }
    }
}

impl From<RoundEntity> for RoundStats {
    fn from(entity: RoundEntity) -> Self {
        let finished = entity.ended_at.is_some();
        RoundStats {
            round: entity.round,
            drawer: entity.drawer,
            word: finished.then_some(entity.word),
            started_at: format_system_time(entity.started_at),
            ended_at: entity.ended_at.map(format_system_time),
            end_reason: entity.end_reason,
            guesses: entity.guesses.into_iter().map(GuessStats::from).collect(),
            hint_used: entity.hint_used,
        }
    }
}
