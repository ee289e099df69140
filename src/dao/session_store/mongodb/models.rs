use indexmap::IndexMap;
use mongodb::bson::{Binary, DateTime, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    ChallengeEntity, GameKind, GuessEntity, OutcomeEntity, RoundEndReason, RoundEntity,
    SessionEntity, SessionStatus, UsedWordEntity,
};

/// BSON shape of the session document; `_id` is the owning room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    pub room_id: String,
    pub id: Uuid,
    pub kind: GameKind,
    pub status: SessionStatus,
    pub seating: Vec<String>,
    pub eliminated: Vec<String>,
    pub round: u32,
    pub total_rounds: Option<u32>,
    pub active_player: String,
    pub challenge: ChallengeEntity,
    pub turn_started_at: DateTime,
    pub turn_seconds: u32,
    pub scores: IndexMap<String, u32>,
    pub streaks: IndexMap<String, u32>,
    pub answered: Vec<String>,
    pub used_words: Vec<UsedWordEntity>,
    #[serde(default)]
    pub hint_used: bool,
    pub initiator: String,
    pub outcome: Option<OutcomeEntity>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub version: i64,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            room_id: value.room_id,
            id: value.id,
            kind: value.kind,
            status: value.status,
            seating: value.seating,
            eliminated: value.eliminated,
            round: value.round,
            total_rounds: value.total_rounds,
            active_player: value.active_player,
            challenge: value.challenge,
            turn_started_at: DateTime::from_system_time(value.turn_started_at),
            turn_seconds: value.turn_seconds.min(u64::from(u32::MAX)) as u32,
            scores: value.scores,
            streaks: value.streaks,
            answered: value.answered,
            used_words: value.used_words,
            hint_used: value.hint_used,
            initiator: value.initiator,
            outcome: value.outcome,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
            version: value.version as i64,
        }
    }
}

impl From<MongoSessionDocument> for SessionEntity {
    fn from(value: MongoSessionDocument) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            kind: value.kind,
            status: value.status,
            seating: value.seating,
            eliminated: value.eliminated,
            round: value.round,
            total_rounds: value.total_rounds,
            active_player: value.active_player,
            challenge: value.challenge,
            turn_started_at: value.turn_started_at.to_system_time(),
            turn_seconds: u64::from(value.turn_seconds),
            scores: value.scores,
            streaks: value.streaks,
            answered: value.answered,
            used_words: value.used_words,
            hint_used: value.hint_used,
            initiator: value.initiator,
            outcome: value.outcome,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
            version: value.version.max(0) as u64,
        }
    }
}

/// BSON shape of one durable round record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoundDocument {
    pub session_id: Uuid,
    pub room_id: String,
    pub round: u32,
    pub drawer: String,
    pub word: String,
    pub started_at: DateTime,
    pub ended_at: Option<DateTime>,
    pub end_reason: Option<RoundEndReason>,
    pub guesses: Vec<MongoGuessDocument>,
    #[serde(default)]
    pub hint_used: bool,
    pub expire_at: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGuessDocument {
    pub player: String,
    pub elapsed_ms: i64,
    pub points: u32,
}

impl From<GuessEntity> for MongoGuessDocument {
    fn from(value: GuessEntity) -> Self {
        Self {
            player: value.player,
            elapsed_ms: value.elapsed_ms.min(i64::MAX as u64) as i64,
            points: value.points,
        }
    }
}

impl From<MongoGuessDocument> for GuessEntity {
    fn from(value: MongoGuessDocument) -> Self {
        Self {
            player: value.player,
            elapsed_ms: value.elapsed_ms.max(0) as u64,
            points: value.points,
        }
    }
}

impl From<RoundEntity> for MongoRoundDocument {
    fn from(value: RoundEntity) -> Self {
        Self {
            session_id: value.session_id,
            room_id: value.room_id,
            round: value.round,
            drawer: value.drawer,
            word: value.word,
            started_at: DateTime::from_system_time(value.started_at),
            ended_at: value.ended_at.map(DateTime::from_system_time),
            end_reason: value.end_reason,
            guesses: value.guesses.into_iter().map(Into::into).collect(),
            hint_used: value.hint_used,
            expire_at: value.expire_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoRoundDocument> for RoundEntity {
    fn from(value: MongoRoundDocument) -> Self {
        Self {
            session_id: value.session_id,
            room_id: value.room_id,
            round: value.round,
            drawer: value.drawer,
            word: value.word,
            started_at: value.started_at.to_system_time(),
            ended_at: value.ended_at.map(|at| at.to_system_time()),
            end_reason: value.end_reason,
            guesses: value.guesses.into_iter().map(Into::into).collect(),
            hint_used: value.hint_used,
            expire_at: value.expire_at.map(|at| at.to_system_time()),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}
