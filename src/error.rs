use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Gameplay rejections reported to the acting player only.
///
/// Every variant maps to a stable snake_case code carried on the
/// `action_rejected` payload, so clients can branch without parsing the
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameRuleError {
    /// A game is already running in this room.
    #[error("a game is already running in this room")]
    AlreadyRunning,
    /// Not enough reachable players to start.
    #[error("at least {required} connected players are required (found {reachable})")]
    NotEnoughPlayers {
        /// Minimum number of reachable players a game needs.
        required: usize,
        /// Reachable players counted at the time of the attempt.
        reachable: usize,
    },
    /// No matching game is currently accepting this action.
    #[error("no active game accepts this action")]
    GameNotActive,
    /// Another player holds the current turn.
    #[error("it is not your turn")]
    NotYourTurn,
    /// The drawer is excluded from guessing their own word.
    #[error("the drawer cannot guess")]
    DrawerCannotGuess,
    /// Hint and skip are reserved for the active drawer.
    #[error("only the active drawer may do that")]
    DrawerOnly,
    /// The player already answered correctly this round.
    #[error("you already answered this round")]
    AlreadyAnswered,
    /// The guess does not match the secret word.
    #[error("wrong answer")]
    WrongAnswer,
    /// The submitted word does not start with the required letter.
    #[error("word must start with `{required}`")]
    WrongLetter {
        /// Letter the next word must begin with.
        required: char,
    },
    /// The word was already played earlier in this session.
    #[error("word was already used in this game")]
    WordAlreadyUsed,
    /// The dictionary rejected the word.
    #[error("invalid word: {reason}")]
    InvalidWord {
        /// Reason reported by the dictionary validator.
        reason: String,
    },
    /// The single per-round hint was already spent.
    #[error("the hint was already used this round")]
    HintAlreadyUsed,
    /// Requester is neither the room owner nor the game initiator.
    #[error("not authorized to do that")]
    NotAuthorized,
    /// A timeout was reported before the turn budget elapsed.
    #[error("the turn has not expired yet")]
    TurnNotExpired,
}

impl GameRuleError {
    /// Stable machine-readable code for the rejection payload.
    pub fn code(&self) -> &'static str {
        match self {
            GameRuleError::AlreadyRunning => "already_running",
            GameRuleError::NotEnoughPlayers { .. } => "not_enough_players",
            GameRuleError::GameNotActive => "game_not_active",
            GameRuleError::NotYourTurn => "not_your_turn",
            GameRuleError::DrawerCannotGuess => "drawer_cannot_guess",
            GameRuleError::DrawerOnly => "drawer_only",
            GameRuleError::AlreadyAnswered => "already_answered",
            GameRuleError::WrongAnswer => "wrong_answer",
            GameRuleError::WrongLetter { .. } => "wrong_letter",
            GameRuleError::WordAlreadyUsed => "word_already_used",
            GameRuleError::InvalidWord { .. } => "invalid_word",
            GameRuleError::HintAlreadyUsed => "hint_already_used",
            GameRuleError::NotAuthorized => "not_authorized",
            GameRuleError::TurnNotExpired => "turn_not_expired",
        }
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// A game rule rejected the action.
    #[error(transparent)]
    Rule(#[from] GameRuleError),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Concurrent writers kept invalidating the session document.
    #[error("session write contention: {0}")]
    Contention(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { message } => ServiceError::Contention(message),
            unavailable => ServiceError::Unavailable(unavailable),
        }
    }
}

impl ServiceError {
    /// Machine-readable code mirrored onto `action_rejected` payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unavailable(_) | ServiceError::Degraded => "storage_unavailable",
            ServiceError::Rule(rule) => rule.code(),
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Contention(_) => "conflict",
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Rule(rule) => AppError::Conflict(rule.to_string()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Contention(message) => AppError::Conflict(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
