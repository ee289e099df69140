use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB store operations.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Errors raised by the MongoDB session store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("invalid MongoDB URI `{uri}`")]
    InvalidUri {
        /// The offending URI.
        uri: String,
        #[source]
        source: mongodb::error::Error,
    },
    /// Client construction from parsed options failed.
    #[error("failed to construct MongoDB client")]
    ClientConstruction {
        #[source]
        source: mongodb::error::Error,
    },
    /// The server never answered the bootstrap ping.
    #[error("MongoDB did not answer the initial ping after {attempts} attempts")]
    InitialPing {
        /// How many pings were attempted.
        attempts: u32,
        #[source]
        source: mongodb::error::Error,
    },
    /// A periodic liveness ping failed.
    #[error("MongoDB health ping failed")]
    HealthPing {
        #[source]
        source: mongodb::error::Error,
    },
    /// Index bootstrap failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection carrying the index.
        collection: &'static str,
        /// Key description of the index.
        index: &'static str,
        #[source]
        source: mongodb::error::Error,
    },
    /// Reading a session document failed.
    #[error("failed to load session for room `{room}`")]
    LoadSession {
        /// Room whose session was requested.
        room: String,
        #[source]
        source: mongodb::error::Error,
    },
    /// Writing a session document failed.
    #[error("failed to write session for room `{room}`")]
    SaveSession {
        /// Room whose session was written.
        room: String,
        #[source]
        source: mongodb::error::Error,
    },
    /// An insert collided with a session still playing in the room.
    #[error("room `{room}` already has an active session")]
    ActiveSessionExists {
        /// The contested room.
        room: String,
    },
    /// A versioned replace lost the race against a concurrent writer.
    #[error("session for room `{room}` was modified by a concurrent writer")]
    VersionConflict {
        /// The contested room.
        room: String,
    },
    /// Writing a round record failed.
    #[error("failed to write round {round} of session `{session_id}`")]
    SaveRound {
        /// Owning session.
        session_id: Uuid,
        /// Round number of the record.
        round: u32,
        #[source]
        source: mongodb::error::Error,
    },
    /// Reading round records failed.
    #[error("failed to load rounds of session `{session_id}`")]
    LoadRounds {
        /// Owning session.
        session_id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
}
