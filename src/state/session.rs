//! Runtime session model and the status transition rules.

use std::{
    collections::HashSet,
    time::{Duration, SystemTime},
};

use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{
    ChallengeEntity, Difficulty, EndReason, GameKind, OutcomeEntity, SessionEntity, SessionStatus,
    UsedWordEntity,
};

/// Current challenge of a session, one case per game variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    /// Secret word the current drawer must get the others to guess.
    CatchWord {
        /// The secret word.
        word: String,
        /// Difficulty tier the word was drawn at.
        difficulty: Difficulty,
    },
    /// Word-chain position.
    WordChain {
        /// Most recently accepted word (or the starter).
        current_word: String,
        /// Letter the next word must begin with.
        required_letter: char,
    },
}

/// One entry of the word-chain used-word history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsedWord {
    /// Normalized form used for duplicate checks.
    pub word: String,
    /// Player who played it; `None` for the starter word.
    pub player: Option<String>,
    /// Definition returned by the dictionary, when one was available.
    pub definition: Option<String>,
    /// IPA transcription returned by the dictionary, when one was available.
    pub phonetic: Option<String>,
}

/// Terminal outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Why the session ended.
    pub reason: EndReason,
    /// Declared winner, when one exists.
    pub winner: Option<String>,
}

/// Error returned when a status change would move the lifecycle backwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status change: {from:?} cannot become {to:?}")]
pub struct InvalidStatusChange {
    /// Status the session was in.
    pub from: SessionStatus,
    /// Status the caller asked for.
    pub to: SessionStatus,
}

/// Aggregated state for one in-progress (or just-ended) game session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Identifier of this session instance.
    pub id: Uuid,
    /// Owning room.
    pub room_id: String,
    /// Game variant.
    pub kind: GameKind,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Randomized player order fixed at game start. Never mutated afterwards.
    pub seating: Vec<String>,
    /// Players eliminated by word-chain timeouts.
    pub eliminated: HashSet<String>,
    /// Current round/turn number, 1-based.
    pub round: u32,
    /// Total configured rounds; `None` for the unbounded word-chain variant.
    pub total_rounds: Option<u32>,
    /// Player currently drawing or answering.
    pub active_player: String,
    /// Current challenge state.
    pub challenge: Challenge,
    /// Server-authoritative start of the current turn.
    pub turn_started_at: SystemTime,
    /// Time budget of the current turn, in seconds.
    pub turn_seconds: u64,
    /// Cumulative scores, insertion order following the seating order.
    pub scores: IndexMap<String, u32>,
    /// Consecutive-correct-round streaks.
    pub streaks: IndexMap<String, u32>,
    /// Players who answered correctly this round (catch-the-word).
    pub answered: HashSet<String>,
    /// Words already played this session (word-chain), starter included.
    pub used_words: Vec<UsedWord>,
    /// Whether the per-round hint was spent.
    pub hint_used: bool,
    /// Player who started the game.
    pub initiator: String,
    /// Terminal outcome, present once finished.
    pub outcome: Option<Outcome>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last update timestamp.
    pub updated_at: SystemTime,
    /// Optimistic-concurrency counter as read from the store.
    pub version: u64,
}

impl Session {
    /// Build a fresh `playing` session.
    ///
    /// `seating` must already be the shuffled reachable-player permutation;
    /// the first seat takes the first turn. Scores and streaks start at zero
    /// for every seat. For the word-chain variant the starter word is seeded
    /// into the used-word history so it can never be replayed.
    pub fn start(
        room_id: String,
        initiator: String,
        kind: GameKind,
        seating: Vec<String>,
        challenge: Challenge,
        total_rounds: Option<u32>,
        turn_seconds: u64,
    ) -> Self {
        let now = SystemTime::now();
        let scores: IndexMap<String, u32> =
            seating.iter().map(|player| (player.clone(), 0)).collect();
        let streaks = scores.clone();
        let active_player = seating.first().cloned().unwrap_or_default();

        let used_words = match &challenge {
            Challenge::WordChain { current_word, .. } => vec![UsedWord {
                word: normalize_word(current_word),
                player: None,
                definition: None,
                phonetic: None,
            }],
            Challenge::CatchWord { .. } => Vec::new(),
        };

        Self {
            id: Uuid::new_v4(),
            room_id,
            kind,
            status: SessionStatus::Playing,
            seating,
            eliminated: HashSet::new(),
            round: 1,
            total_rounds,
            active_player,
            challenge,
            turn_started_at: now,
            turn_seconds,
            scores,
            streaks,
            answered: HashSet::new(),
            used_words,
            hint_used: false,
            initiator,
            outcome: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Move the lifecycle status forward, rejecting backward transitions.
    pub fn transition(&mut self, to: SessionStatus) -> Result<(), InvalidStatusChange> {
        if !self.status.can_become(to) {
            return Err(InvalidStatusChange {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Finish the session with a reason and optional winner.
    pub fn finish(
        &mut self,
        reason: EndReason,
        winner: Option<String>,
    ) -> Result<(), InvalidStatusChange> {
        self.transition(SessionStatus::Finished)?;
        self.outcome = Some(Outcome { reason, winner });
        Ok(())
    }

    /// Whether the session is still accepting gameplay actions.
    pub fn is_playing(&self) -> bool {
        self.status == SessionStatus::Playing
    }

    /// Seconds elapsed since the current turn started.
    pub fn elapsed_seconds(&self, now: SystemTime) -> u64 {
        now.duration_since(self.turn_started_at)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }

    /// Milliseconds elapsed since the current turn started.
    pub fn elapsed_millis(&self, now: SystemTime) -> u64 {
        now.duration_since(self.turn_started_at)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }

    /// Seconds left in the current turn budget.
    pub fn remaining_seconds(&self, now: SystemTime) -> u64 {
        self.turn_seconds.saturating_sub(self.elapsed_seconds(now))
    }

    /// Whether the current turn's time budget has elapsed.
    pub fn turn_expired(&self, now: SystemTime) -> bool {
        self.elapsed_seconds(now) >= self.turn_seconds
    }

    /// Whether `word` (already normalized) was played earlier in this session.
    pub fn word_used(&self, word: &str) -> bool {
        self.used_words.iter().any(|used| used.word == word)
    }

    /// Players who may take a word-chain turn: reachable and not eliminated.
    pub fn eligible_players<'a>(&self, reachable: &'a HashSet<String>) -> HashSet<String> {
        reachable
            .iter()
            .filter(|player| !self.eliminated.contains(*player))
            .cloned()
            .collect()
    }

    /// Whether every reachable player other than the drawer has answered.
    pub fn all_guessers_answered(&self, reachable: &HashSet<String>) -> bool {
        let mut guessers = reachable
            .iter()
            .filter(|player| **player != self.active_player)
            .peekable();
        if guessers.peek().is_none() {
            return false;
        }
        guessers.all(|player| self.answered.contains(player))
    }

    /// Players whose streak resets when the round ends: everyone absent from
    /// the round's correct-answer set (the drawer included, since drawing
    /// does not extend a guessing streak).
    pub fn streak_reset_candidates(&self) -> Vec<String> {
        self.seating
            .iter()
            .filter(|player| !self.answered.contains(*player))
            .cloned()
            .collect()
    }

    /// Highest cumulative scorer, ties broken by seating order.
    pub fn top_scorer(&self) -> Option<String> {
        let mut best: Option<(&String, u32)> = None;
        for (player, score) in &self.scores {
            match best {
                Some((_, top)) if *score <= top => {}
                _ => best = Some((player, *score)),
            }
        }
        best.map(|(player, _)| player.clone())
    }
}

/// Normalize a catch-the-word guess: trim, lowercase, strip internal whitespace.
pub fn normalize_guess(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalize a word-chain submission: trim and lowercase.
pub fn normalize_word(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Last letter of a normalized word, which the next word must start with.
pub fn chain_letter(word: &str) -> Option<char> {
    word.chars().rev().find(|c| c.is_alphabetic())
}

impl From<ChallengeEntity> for Challenge {
    fn from(value: ChallengeEntity) -> Self {
        match value {
            ChallengeEntity::CatchWord { word, difficulty } => {
                Challenge::CatchWord { word, difficulty }
            }
            ChallengeEntity::WordChain {
                current_word,
                required_letter,
            } => Challenge::WordChain {
                current_word,
                required_letter,
            },
        }
    }
}

impl From<Challenge> for ChallengeEntity {
    fn from(value: Challenge) -> Self {
        match value {
            Challenge::CatchWord { word, difficulty } => {
                ChallengeEntity::CatchWord { word, difficulty }
            }
            Challenge::WordChain {
                current_word,
                required_letter,
            } => ChallengeEntity::WordChain {
                current_word,
                required_letter,
            },
        }
    }
}

impl From<UsedWordEntity> for UsedWord {
    fn from(value: UsedWordEntity) -> Self {
        Self {
            word: value.word,
            player: value.player,
            definition: value.definition,
            phonetic: value.phonetic,
        }
    }
}

impl From<UsedWord> for UsedWordEntity {
    fn from(value: UsedWord) -> Self {
        Self {
            word: value.word,
            player: value.player,
            definition: value.definition,
            phonetic: value.phonetic,
        }
    }
}

impl From<OutcomeEntity> for Outcome {
    fn from(value: OutcomeEntity) -> Self {
        Self {
            reason: value.reason,
            winner: value.winner,
        }
    }
}

impl From<Outcome> for OutcomeEntity {
    fn from(value: Outcome) -> Self {
        Self {
            reason: value.reason,
            winner: value.winner,
        }
    }
}

impl From<SessionEntity> for Session {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            kind: value.kind,
            status: value.status,
            seating: value.seating,
            eliminated: value.eliminated.into_iter().collect(),
            round: value.round,
            total_rounds: value.total_rounds,
            active_player: value.active_player,
            challenge: value.challenge.into(),
            turn_started_at: value.turn_started_at,
            turn_seconds: value.turn_seconds,
            scores: value.scores,
            streaks: value.streaks,
            answered: value.answered.into_iter().collect(),
            used_words: value.used_words.into_iter().map(Into::into).collect(),
            hint_used: value.hint_used,
            initiator: value.initiator,
            outcome: value.outcome.map(Into::into),
            created_at: value.created_at,
            updated_at: value.updated_at,
            version: value.version,
        }
    }
}

impl From<Session> for SessionEntity {
    fn from(value: Session) -> Self {
        let mut eliminated: Vec<String> = value.eliminated.into_iter().collect();
        eliminated.sort();
        let mut answered: Vec<String> = value.answered.into_iter().collect();
        answered.sort();

        Self {
            id: value.id,
            room_id: value.room_id,
            kind: value.kind,
            status: value.status,
            seating: value.seating,
            eliminated,
            round: value.round,
            total_rounds: value.total_rounds,
            active_player: value.active_player,
            challenge: value.challenge.into(),
            turn_started_at: value.turn_started_at,
            turn_seconds: value.turn_seconds,
            scores: value.scores,
            streaks: value.streaks,
            answered,
            used_words: value.used_words.into_iter().map(Into::into).collect(),
            hint_used: value.hint_used,
            initiator: value.initiator,
            outcome: value.outcome.map(Into::into),
            created_at: value.created_at,
            updated_at: value.updated_at,
            version: value.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_chain_session() -> Session {
        Session::start(
            "r1".into(),
            "a".into(),
            GameKind::WordChain,
            vec!["a".into(), "b".into(), "c".into()],
            Challenge::WordChain {
                current_word: "Plant".into(),
                required_letter: 't',
            },
            None,
            30,
        )
    }

    #[test]
    fn status_never_moves_backwards() {
        assert!(SessionStatus::Waiting.can_become(SessionStatus::Playing));
        assert!(SessionStatus::Waiting.can_become(SessionStatus::Finished));
        assert!(SessionStatus::Playing.can_become(SessionStatus::Finished));

        assert!(!SessionStatus::Playing.can_become(SessionStatus::Waiting));
        assert!(!SessionStatus::Finished.can_become(SessionStatus::Playing));
        assert!(!SessionStatus::Finished.can_become(SessionStatus::Waiting));
        assert!(!SessionStatus::Playing.can_become(SessionStatus::Playing));
    }

    #[test]
    fn finish_rejects_already_finished_session() {
        let mut session = word_chain_session();
        session.finish(EndReason::Stopped, None).unwrap();

        let err = session
            .finish(EndReason::TimeExpired, None)
            .unwrap_err();
        assert_eq!(err.from, SessionStatus::Finished);
    }

    #[test]
    fn starter_word_is_seeded_into_history() {
        let session = word_chain_session();
        assert!(session.word_used("plant"));
        assert!(session.word_used(&normalize_word("  PLANT ")));
    }

    #[test]
    fn guess_normalization_strips_spaces_and_case() {
        assert_eq!(normalize_guess("  Ice Cream "), "icecream");
        assert_eq!(normalize_guess("PENCIL"), "pencil");
        assert_eq!(normalize_guess("a b\tc"), "abc");
    }

    #[test]
    fn chain_letter_is_last_alphabetic_character() {
        assert_eq!(chain_letter("tiger"), Some('r'));
        assert_eq!(chain_letter("1234"), None);
    }

    #[test]
    fn all_guessers_answered_ignores_the_drawer() {
        let mut session = Session::start(
            "r1".into(),
            "a".into(),
            GameKind::CatchWord,
            vec!["a".into(), "b".into(), "c".into()],
            Challenge::CatchWord {
                word: "pencil".into(),
                difficulty: Difficulty::Medium,
            },
            Some(3),
            60,
        );
        let reachable: HashSet<String> =
            ["a", "b", "c"].into_iter().map(String::from).collect();

        assert!(!session.all_guessers_answered(&reachable));
        session.answered.insert("b".into());
        assert!(!session.all_guessers_answered(&reachable));
        session.answered.insert("c".into());
        assert!(session.all_guessers_answered(&reachable));
    }

    #[test]
    fn top_scorer_breaks_ties_by_seating_order() {
        let mut session = word_chain_session();
        session.scores.insert("a".into(), 12);
        session.scores.insert("b".into(), 12);
        session.scores.insert("c".into(), 3);
        assert_eq!(session.top_scorer(), Some("a".into()));
    }

    #[test]
    fn entity_round_trip_preserves_session() {
        let mut session = word_chain_session();
        session.eliminated.insert("c".into());
        session.scores.insert("b".into(), 9);

        let entity: SessionEntity = session.clone().into();
        let restored: Session = entity.into();
        assert_eq!(restored, session);
    }
}
