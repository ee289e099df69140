use indexmap::IndexMap;
use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

use crate::{
    dao::models::{EndReason, GameKind, RoundEndReason},
    dto::game::GameSnapshot,
};

/// Messages pushed to player WebSocket clients.
///
/// Events are broadcast to every connection in a room; a handful of fields
/// (the secret word, mostly) are only filled in per-player overrides sent to
/// the drawer.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Acknowledges a successful `identify`, with the room's current game if
    /// one is running.
    Welcome {
        /// Identity bound to this connection.
        player_id: String,
        /// Room this connection now belongs to.
        room_id: String,
        /// Snapshot of the game in progress, if any.
        game: Option<GameSnapshot>,
    },
    /// A new game just started in the room.
    GameStarted {
        /// Session identifier.
        session_id: uuid::Uuid,
        /// Which game variant started.
        kind: GameKind,
        /// Current round number, starting at 1.
        round: u32,
        /// Total round count for catch-the-word; absent for word-chain.
        total_rounds: Option<u32>,
        /// Shuffled turn order for the whole game.
        seating: Vec<String>,
        /// Player whose turn it is (the drawer, or the word-chain player).
        active_player: String,
        /// Seconds allotted for this turn.
        turn_seconds: u64,
        /// RFC 3339 timestamp the turn clock started from.
        turn_started_at: String,
        /// The word to draw. Only present in the override sent to the drawer.
        #[schema(value_type = Option<String>)]
        secret_word: Option<String>,
        /// Starter word for word-chain.
        current_word: Option<String>,
        /// Letter the next word must start with (word-chain).
        #[schema(value_type = Option<String>)]
        required_letter: Option<char>,
    },
    /// A guesser found the secret word.
    GuessCorrect {
        /// Round the guess landed in.
        round: u32,
        /// The player who guessed correctly.
        player: String,
        /// Points awarded to the guesser.
        points: u32,
        /// Points awarded to the drawer for this guess.
        drawer_bonus: u32,
        /// The guesser's streak after this answer.
        streak: u32,
        /// Full scoreboard after the award.
        #[schema(value_type = Object)]
        scores: IndexMap<String, u32>,
        /// How many guessers have answered this round.
        answered_count: usize,
    },
    /// A catch-the-word round ended.
    RoundEnded {
        /// The round that just ended.
        round: u32,
        /// Why it ended.
        reason: RoundEndReason,
        /// The secret word, revealed to everyone.
        word: String,
        /// Scoreboard after any round-end adjustments.
        #[schema(value_type = Object)]
        scores: IndexMap<String, u32>,
        /// Number of the next round, absent when the game is over.
        next_round: Option<u32>,
        /// Drawer of the next round.
        next_drawer: Option<String>,
        /// Turn budget of the next round.
        turn_seconds: Option<u64>,
        /// RFC 3339 start of the next round's clock.
        turn_started_at: Option<String>,
        /// Next round's word. Only present in the override sent to the next
        /// drawer.
        secret_word: Option<String>,
    },
    /// The drawer revealed the round hint.
    HintRevealed {
        /// Round the hint belongs to.
        round: u32,
        /// First letter of the secret word.
        #[schema(value_type = String)]
        first_letter: char,
        /// Length of the secret word in characters.
        length: usize,
    },
    /// A word-chain word was accepted.
    WordAccepted {
        /// Turn number the word was played in.
        round: u32,
        /// Player who played the word.
        player: String,
        /// The accepted word, normalized.
        word: String,
        /// Dictionary definition, when one was found.
        definition: Option<String>,
        /// IPA transcription, when the dictionary provided one.
        phonetic: Option<String>,
        /// Points awarded for the word.
        points: u32,
        /// Full scoreboard after the award.
        #[schema(value_type = Object)]
        scores: IndexMap<String, u32>,
        /// Player whose turn is next.
        next_player: String,
        /// Letter the next word must start with.
        #[schema(value_type = String)]
        required_letter: char,
        /// Turn budget for the next player.
        turn_seconds: u64,
        /// RFC 3339 start of the next turn's clock.
        turn_started_at: String,
    },
    /// A word-chain player ran out of time and is out of the game.
    PlayerEliminated {
        /// The eliminated player.
        player: String,
        /// Next player up, absent when the game just ended.
        next_player: Option<String>,
        /// Required starting letter for the next word.
        #[schema(value_type = Option<String>)]
        required_letter: Option<char>,
        /// Turn budget for the next player.
        turn_seconds: Option<u64>,
        /// RFC 3339 start of the next turn's clock.
        turn_started_at: Option<String>,
    },
    /// The game is over.
    GameEnded {
        /// Why the game ended.
        reason: EndReason,
        /// Winner, when one could be determined.
        winner: Option<String>,
        /// Final scoreboard.
        #[schema(value_type = Object)]
        scores: IndexMap<String, u32>,
    },
    /// An action from this connection was rejected.
    ActionRejected {
        /// Stable machine-readable error code.
        code: String,
        /// Human-readable explanation.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_omitted() {
        let event = ServerEvent::PlayerEliminated {
            player: "bob".to_string(),
            next_player: None,
            required_letter: None,
            turn_seconds: None,
            turn_started_at: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "player_eliminated");
        assert_eq!(json["player"], "bob");
        assert!(json.get("next_player").is_none());
        assert!(json.get("required_letter").is_none());
    }

    #[test]
    fn rejection_carries_code_and_message() {
        let event = ServerEvent::ActionRejected {
            code: "wrong_answer".to_string(),
            message: "that is not the word".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "action_rejected");
        assert_eq!(json["code"], "wrong_answer");
    }

    #[test]
    fn hint_serializes_letter_as_string() {
        let event = ServerEvent::HintRevealed {
            round: 2,
            first_letter: 'p',
            length: 6,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["first_letter"], "p");
        assert_eq!(json["length"], 6);
    }
}
