use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Difficulty tier for the catch-the-word word banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Short everyday words.
    Easy,
    /// The default tier.
    #[default]
    Medium,
    /// Longer or less common words.
    Hard,
}

/// Which of the two game variants a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// Drawing-and-guessing: one drawer, everyone else guesses the secret word.
    CatchWord,
    /// Word-chain: each word must start with the last letter of the previous one.
    WordChain,
}

/// Lifecycle status of a session. Transitions are one-directional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No game running yet.
    Waiting,
    /// A game is in progress.
    Playing,
    /// Terminal state: completed, stopped, expired, or starved of players.
    Finished,
}

impl SessionStatus {
    /// Whether moving from `self` to `next` is a legal forward transition.
    pub fn can_become(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Waiting, SessionStatus::Playing)
                | (SessionStatus::Waiting, SessionStatus::Finished)
                | (SessionStatus::Playing, SessionStatus::Finished)
        )
    }
}

/// Why a session reached [`SessionStatus::Finished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every configured round was played.
    Completed,
    /// The owner or initiator stopped the game.
    Stopped,
    /// The auto-expiry timer fired.
    TimeExpired,
    /// Fewer than two players remained reachable.
    NotEnoughPlayers,
    /// Word-chain eliminations left a single player standing.
    LastPlayerStanding,
}

/// Why a single catch-the-word round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    /// Every reachable non-drawer answered correctly.
    AllAnswered,
    /// The round's time budget elapsed.
    Timeout,
    /// The drawer skipped their own round.
    Skip,
}

impl RoundEndReason {
    /// Wire name of the reason, identical to its serde rendering.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundEndReason::AllAnswered => "all_answered",
            RoundEndReason::Timeout => "timeout",
            RoundEndReason::Skip => "skip",
        }
    }
}

/// Current challenge of a session, one case per game variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChallengeEntity {
    /// Secret word the current drawer must get the others to guess.
    CatchWord {
        /// The secret word. Never sent to guessers.
        word: String,
        /// Difficulty tier the word was drawn at.
        difficulty: Difficulty,
    },
    /// Word-chain position: the last accepted word and the letter it imposes.
    WordChain {
        /// Most recently accepted word (or the starter).
        current_word: String,
        /// Letter the next word must begin with.
        required_letter: char,
    },
}

/// One entry of the word-chain used-word history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedWordEntity {
    /// Normalized (trimmed, lowercased) form used for duplicate checks.
    pub word: String,
    /// Player who played it; `None` for the session's starter word.
    pub player: Option<String>,
    /// Definition returned by the dictionary, when one was available.
    pub definition: Option<String>,
    /// IPA transcription returned by the dictionary, when one was available.
    pub phonetic: Option<String>,
}

/// Terminal outcome recorded on a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeEntity {
    /// Why the session ended.
    pub reason: EndReason,
    /// Declared winner, when one exists.
    pub winner: Option<String>,
}

/// The room/session document: the single mutable record for one game instance.
///
/// Keyed by `room_id` — a room holds at most one active (or just-ended)
/// session. `version` backs the optimistic-concurrency check on full-document
/// writes; atomic field updates bump it too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntity {
    /// Identifier of this session instance.
    pub id: Uuid,
    /// Owning room. Primary key of the document.
    pub room_id: String,
    /// Game variant running in this session.
    pub kind: GameKind,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Randomized player order fixed at game start. Immutable afterwards.
    pub seating: Vec<String>,
    /// Players eliminated by word-chain timeouts.
    pub eliminated: Vec<String>,
    /// Current round/turn number, 1-based, monotonically non-decreasing.
    pub round: u32,
    /// Total configured rounds; `None` for the unbounded word-chain variant.
    pub total_rounds: Option<u32>,
    /// Player currently drawing or answering.
    pub active_player: String,
    /// Current challenge state.
    pub challenge: ChallengeEntity,
    /// Server-authoritative start of the current turn.
    pub turn_started_at: SystemTime,
    /// Time budget of the current turn, in seconds.
    pub turn_seconds: u64,
    /// Cumulative scores; insertion order follows the seating order.
    pub scores: IndexMap<String, u32>,
    /// Consecutive-correct-round streak per player.
    pub streaks: IndexMap<String, u32>,
    /// Players who already answered correctly this round (catch-the-word).
    pub answered: Vec<String>,
    /// Words already played this session (word-chain), starter included.
    pub used_words: Vec<UsedWordEntity>,
    /// Whether the single per-round hint was spent.
    pub hint_used: bool,
    /// Player who started the game.
    pub initiator: String,
    /// Terminal outcome, present once finished.
    pub outcome: Option<OutcomeEntity>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the document was updated.
    pub updated_at: SystemTime,
    /// Optimistic-concurrency counter, bumped on every write.
    pub version: u64,
}

/// One correct guess inside a round record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessEntity {
    /// Guessing player.
    pub player: String,
    /// Time from round start to the correct answer, in milliseconds.
    pub elapsed_ms: u64,
    /// Points awarded for this guess.
    pub points: u32,
}

/// Durable per-round record for post-game statistics (catch-the-word only).
///
/// Created when the round starts, appended to as players answer, closed when
/// the round ends. Once the owning session finishes, `expire_at` is stamped so
/// the retention window can reap it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEntity {
    /// Session this round belongs to.
    pub session_id: Uuid,
    /// Room the session ran in.
    pub room_id: String,
    /// Round number, 1-based.
    pub round: u32,
    /// Player who drew this round.
    pub drawer: String,
    /// Secret word of the round.
    pub word: String,
    /// When the round started.
    pub started_at: SystemTime,
    /// When the round ended; `None` while in progress.
    pub ended_at: Option<SystemTime>,
    /// Why the round ended; `None` while in progress.
    pub end_reason: Option<RoundEndReason>,
    /// Correct guesses in answer order.
    pub guesses: Vec<GuessEntity>,
    /// Whether the hint was revealed during this round.
    pub hint_used: bool,
    /// Retention deadline stamped when the owning session finishes.
    pub expire_at: Option<SystemTime>,
}
