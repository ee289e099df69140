use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, doc},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::{sync::RwLock, time::sleep};
use tracing::warn;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{MongoRoundDocument, MongoSessionDocument, uuid_as_binary},
};
use crate::dao::{
    models::{GuessEntity, RoundEndReason, RoundEntity, SessionEntity},
    session_store::{SessionFieldUpdates, SessionStore},
    storage::StorageResult,
};

const SESSION_COLLECTION_NAME: &str = "sessions";
const ROUND_COLLECTION_NAME: &str = "rounds";

const BOOTSTRAP_PING_ATTEMPTS: u32 = 10;
const BOOTSTRAP_PING_DELAY: Duration = Duration::from_millis(250);
const BOOTSTRAP_PING_DELAY_CAP: Duration = Duration::from_secs(5);

/// Build a client and wait for the deployment to answer a ping.
///
/// Rooms cannot run games without the session store, so startup waits out a
/// slow-to-boot deployment instead of failing fast.
async fn open_database(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut attempts = 0;
    let mut delay = BOOTSTRAP_PING_DELAY;
    loop {
        match database.run_command(doc! {"ping": 1}).await {
            Ok(_) => return Ok((client, database)),
            Err(source) => {
                attempts += 1;
                if attempts >= BOOTSTRAP_PING_ATTEMPTS {
                    return Err(MongoDaoError::InitialPing { attempts, source });
                }
                warn!(attempt = attempts, error = %source, "session database not answering pings yet");
                sleep(delay).await;
                delay = (delay * 2).min(BOOTSTRAP_PING_DELAY_CAP);
            }
        }
    }
}

#[derive(Clone)]
/// MongoDB-backed session store.
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = open_database(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = open_database(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let rounds = database.collection::<MongoRoundDocument>(ROUND_COLLECTION_NAME);

        // One record per (session, round); concurrent inserts of the same
        // round collapse onto a single document.
        let unique_index = mongodb::IndexModel::builder()
            .keys(doc! {"session_id": 1, "round": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("round_session_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        rounds
            .create_index(unique_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROUND_COLLECTION_NAME,
                index: "session_id,round",
                source,
            })?;

        // TTL reaping of closed rounds once `expire_at` is stamped.
        let ttl_index = mongodb::IndexModel::builder()
            .keys(doc! {"expire_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("round_retention_idx".to_owned()))
                    .expire_after(Some(std::time::Duration::ZERO))
                    .build(),
            )
            .build();
        rounds
            .create_index(ttl_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROUND_COLLECTION_NAME,
                index: "expire_at",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn session_collection(&self) -> Collection<MongoSessionDocument> {
        self.database()
            .await
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn round_collection(&self) -> Collection<MongoRoundDocument> {
        self.database()
            .await
            .collection::<MongoRoundDocument>(ROUND_COLLECTION_NAME)
    }

    async fn find_session(&self, room_id: String) -> MongoResult<Option<SessionEntity>> {
        let collection = self.session_collection().await;
        let document = collection
            .find_one(doc! {"_id": &room_id})
            .await
            .map_err(|source| MongoDaoError::LoadSession {
                room: room_id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn insert_session(&self, session: SessionEntity) -> MongoResult<()> {
        let room = session.room_id.clone();
        let document: MongoSessionDocument = session.into();
        let collection = self.session_collection().await;

        // Replace whatever finished session is left in the room; if a playing
        // document still holds the `_id`, the upsert collides with it and
        // surfaces as a duplicate-key write error.
        let result = collection
            .replace_one(
                doc! {"_id": &room, "status": {"$ne": "playing"}},
                &document,
            )
            .upsert(true)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => {
                Err(MongoDaoError::ActiveSessionExists { room })
            }
            Err(source) => Err(MongoDaoError::SaveSession { room, source }),
        }
    }

    async fn replace_session(
        &self,
        session: SessionEntity,
        expected_version: u64,
    ) -> MongoResult<()> {
        let room = session.room_id.clone();
        let mut document: MongoSessionDocument = session.into();
        document.version = (expected_version + 1) as i64;

        let collection = self.session_collection().await;
        let result = collection
            .replace_one(
                doc! {"_id": &room, "version": expected_version as i64},
                &document,
            )
            .await
            .map_err(|source| MongoDaoError::SaveSession {
                room: room.clone(),
                source,
            })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::VersionConflict { room });
        }
        Ok(())
    }

    async fn update_session_fields(
        &self,
        room_id: String,
        updates: SessionFieldUpdates,
    ) -> MongoResult<bool> {
        let mut filter = doc! {"_id": &room_id};
        if let Some(player) = &updates.record_answer {
            filter.insert("answered", doc! {"$ne": player});
        }
        if updates.mark_hint_used {
            filter.insert("hint_used", false);
        }

        let mut inc = doc! {"version": 1i64};
        for (player, increment) in &updates.score_increments {
            inc.insert(format!("scores.{player}"), i64::from(*increment));
        }

        let mut set = doc! {"updated_at": DateTime::now()};
        for (player, streak) in &updates.streak_sets {
            set.insert(format!("streaks.{player}"), i64::from(*streak));
        }
        if updates.mark_hint_used {
            set.insert("hint_used", true);
        }

        let mut update = doc! {"$inc": inc, "$set": set};
        if let Some(player) = updates.record_answer {
            update.insert("$addToSet", doc! {"answered": player});
        }

        let collection = self.session_collection().await;
        let result = collection
            .update_one(filter, update)
            .await
            .map_err(|source| MongoDaoError::SaveSession {
                room: room_id,
                source,
            })?;

        Ok(result.modified_count > 0)
    }

    async fn insert_round(&self, round: RoundEntity) -> MongoResult<()> {
        let session_id = round.session_id;
        let number = round.round;
        let document: MongoRoundDocument = round.into();
        let collection = self.round_collection().await;

        collection
            .replace_one(
                doc! {"session_id": uuid_as_binary(session_id), "round": number},
                &document,
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveRound {
                session_id,
                round: number,
                source,
            })?;
        Ok(())
    }

    async fn record_guess(
        &self,
        session_id: Uuid,
        round: u32,
        guess: GuessEntity,
    ) -> MongoResult<()> {
        let push = doc! {
            "player": &guess.player,
            "elapsed_ms": guess.elapsed_ms.min(i64::MAX as u64) as i64,
            "points": i64::from(guess.points),
        };

        let collection = self.round_collection().await;
        collection
            .update_one(
                doc! {"session_id": uuid_as_binary(session_id), "round": round},
                doc! {"$push": {"guesses": push}},
            )
            .await
            .map_err(|source| MongoDaoError::SaveRound {
                session_id,
                round,
                source,
            })?;
        Ok(())
    }

    async fn set_round_hint_used(&self, session_id: Uuid, round: u32) -> MongoResult<()> {
        let collection = self.round_collection().await;
        collection
            .update_one(
                doc! {"session_id": uuid_as_binary(session_id), "round": round},
                doc! {"$set": {"hint_used": true}},
            )
            .await
            .map_err(|source| MongoDaoError::SaveRound {
                session_id,
                round,
                source,
            })?;
        Ok(())
    }

    async fn close_round(
        &self,
        session_id: Uuid,
        round: u32,
        ended_at: SystemTime,
        reason: RoundEndReason,
    ) -> MongoResult<()> {
        let collection = self.round_collection().await;
        collection
            .update_one(
                doc! {"session_id": uuid_as_binary(session_id), "round": round},
                doc! {"$set": {
                    "ended_at": DateTime::from_system_time(ended_at),
                    "end_reason": reason.as_str(),
                }},
            )
            .await
            .map_err(|source| MongoDaoError::SaveRound {
                session_id,
                round,
                source,
            })?;
        Ok(())
    }

    async fn expire_rounds(&self, session_id: Uuid, expire_at: SystemTime) -> MongoResult<()> {
        let collection = self.round_collection().await;
        collection
            .update_many(
                doc! {"session_id": uuid_as_binary(session_id)},
                doc! {"$set": {"expire_at": DateTime::from_system_time(expire_at)}},
            )
            .await
            .map_err(|source| MongoDaoError::SaveRound {
                session_id,
                round: 0,
                source,
            })?;
        Ok(())
    }

    async fn list_rounds(&self, session_id: Uuid) -> MongoResult<Vec<RoundEntity>> {
        let collection = self.round_collection().await;
        let documents: Vec<MongoRoundDocument> = collection
            .find(doc! {"session_id": uuid_as_binary(session_id)})
            .sort(doc! {"round": 1})
            .await
            .map_err(|source| MongoDaoError::LoadRounds { session_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadRounds { session_id, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11_000,
        _ => false,
    }
}

impl SessionStore for MongoSessionStore {
    fn find_session(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        let room_id = room_id.to_owned();
        Box::pin(async move { store.find_session(room_id).await.map_err(Into::into) })
    }

    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_session(session).await.map_err(Into::into) })
    }

    fn replace_session(
        &self,
        session: SessionEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_session(session, expected_version)
                .await
                .map_err(Into::into)
        })
    }

    fn update_session_fields(
        &self,
        room_id: &str,
        updates: SessionFieldUpdates,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let room_id = room_id.to_owned();
        Box::pin(async move {
            store
                .update_session_fields(room_id, updates)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_round(round).await.map_err(Into::into) })
    }

    fn record_guess(
        &self,
        session_id: Uuid,
        round: u32,
        guess: GuessEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .record_guess(session_id, round, guess)
                .await
                .map_err(Into::into)
        })
    }

    fn set_round_hint_used(
        &self,
        session_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_round_hint_used(session_id, round)
                .await
                .map_err(Into::into)
        })
    }

    fn close_round(
        &self,
        session_id: Uuid,
        round: u32,
        ended_at: SystemTime,
        reason: RoundEndReason,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .close_round(session_id, round, ended_at, reason)
                .await
                .map_err(Into::into)
        })
    }

    fn expire_rounds(
        &self,
        session_id: Uuid,
        expire_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .expire_rounds(session_id, expire_at)
                .await
                .map_err(Into::into)
        })
    }

    fn list_rounds(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_rounds(session_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
