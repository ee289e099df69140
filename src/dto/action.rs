use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    dao::models::{Difficulty, GameKind},
    dto::validation::{validate_answer, validate_identifier, validate_word},
};

/// Messages accepted from player WebSocket clients.
///
/// The first message on a connection must be `identify`; everything else is
/// interpreted against the session currently running in the identified room.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientAction {
    /// Bind this connection to a player identity and room.
    Identify {
        /// Player identity (validated identifier).
        player_id: String,
        /// Room the player is joining.
        room_id: String,
        /// Room-owner claim stamped by the upstream auth layer.
        #[serde(default)]
        owner: bool,
    },
    /// Start a game of the given kind in the identified room.
    StartGame {
        /// Which game variant to start.
        kind: GameKind,
        /// Word difficulty for catch-the-word; ignored by word-chain.
        #[serde(default)]
        difficulty: Option<Difficulty>,
    },
    /// Guess the current secret word (catch-the-word).
    SubmitAnswer {
        /// Raw guess text.
        answer: String,
    },
    /// Play a word (word-chain).
    SubmitWord {
        /// Raw word text.
        word: String,
    },
    /// Report that the current turn's budget elapsed.
    TurnTimeout,
    /// Stop the running game (owner or initiator only).
    StopGame,
    /// Reveal the per-round hint (drawer only).
    RequestHint,
    /// Skip the current round (drawer only).
    SkipTurn,
    /// Anything this server version does not understand.
    #[serde(other)]
    Unknown,
}

/// Error produced while parsing or validating an inbound action.
#[derive(Debug, Error)]
pub enum ActionParseError {
    /// The payload was not valid JSON for any known action.
    #[error("malformed action payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The payload parsed but a field failed validation.
    #[error("invalid action payload: {0}")]
    Validation(#[from] ValidationErrors),
}

impl ClientAction {
    /// Parse an inbound frame and validate its fields.
    pub fn from_json_str(payload: &str) -> Result<Self, ActionParseError> {
        let action: ClientAction = serde_json::from_str(payload)?;
        action.validate()?;
        Ok(action)
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match self {
            ClientAction::Identify {
                player_id, room_id, ..
            } => {
                if let Err(err) = validate_identifier(player_id) {
                    errors.add("player_id", err);
                }
                if let Err(err) = validate_identifier(room_id) {
                    errors.add("room_id", err);
                }
            }
            ClientAction::SubmitAnswer { answer } => {
                if let Err(err) = validate_answer(answer) {
                    errors.add("answer", err);
                }
            }
            ClientAction::SubmitWord { word } => {
                if let Err(err) = validate_word(word) {
                    errors.add("word", err);
                }
            }
            _ => {}
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_round_trips() {
        let action = ClientAction::from_json_str(
            r#"{"type": "identify", "player_id": "alice", "room_id": "r1"}"#,
        )
        .unwrap();
        match action {
            ClientAction::Identify {
                player_id,
                room_id,
                owner,
            } => {
                assert_eq!(player_id, "alice");
                assert_eq!(room_id, "r1");
                assert!(!owner);
            }
            other => panic!("expected identify, got {other:?}"),
        }
    }

    #[test]
    fn start_game_defaults_difficulty() {
        let action =
            ClientAction::from_json_str(r#"{"type": "start_game", "kind": "word_chain"}"#).unwrap();
        assert!(matches!(
            action,
            ClientAction::StartGame {
                kind: GameKind::WordChain,
                difficulty: None,
            }
        ));
    }

    #[test]
    fn invalid_player_id_is_rejected() {
        let result = ClientAction::from_json_str(
            r#"{"type": "identify", "player_id": "has space", "room_id": "r1"}"#,
        );
        assert!(matches!(result, Err(ActionParseError::Validation(_))));
    }

    #[test]
    fn unknown_action_types_parse_as_unknown() {
        let action = ClientAction::from_json_str(r#"{"type": "dance"}"#).unwrap();
        assert!(matches!(action, ClientAction::Unknown));
    }

    #[test]
    fn non_alphabetic_word_is_rejected() {
        let result = ClientAction::from_json_str(r#"{"type": "submit_word", "word": "t1ger"}"#);
        assert!(matches!(result, Err(ActionParseError::Validation(_))));
    }
}
