//! MongoDB session store: connection bootstrap, document models, and the
//! versioned write operations of the [`SessionStore`](super::SessionStore) seam.

mod error;
mod models;
/// Connection settings parsing.
pub mod config;
/// The store implementation.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoSessionStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::VersionConflict { room } => {
                StorageError::conflict(format!("session for room `{room}` changed since read"))
            }
            MongoDaoError::ActiveSessionExists { room } => {
                StorageError::conflict(format!("room `{room}` already has an active session"))
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
