//! Shared application state: config, storage slot, connection roster,
//! dictionary cache, and expiry timers.

/// Turn rotation over the immutable seating order.
pub mod rotation;
/// Word-game scoring formulas.
pub mod scoring;
/// Runtime session model and lifecycle transitions.
pub mod session;

use std::{collections::HashSet, sync::Arc};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::{
    sync::{RwLock, mpsc, watch},
    task::AbortHandle,
};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::session_store::SessionStore,
    error::ServiceError,
    services::dictionary_service::{DictionaryService, HttpWordDefiner, WordDefiner},
};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Identifier of one WebSocket connection.
pub type ConnectionId = Uuid;

#[derive(Clone)]
/// Handle used to push messages to a connected player.
pub struct PlayerConnection {
    /// Connection identifier; one player may hold several.
    pub id: ConnectionId,
    /// Identity claimed in the identification message.
    pub player_id: String,
    /// Room this connection is attached to.
    pub room_id: String,
    /// Room-owner claim carried by the identification message.
    pub owner: bool,
    /// Writer-task channel for outbound frames.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state shared by every request handler.
pub struct AppState {
    config: AppConfig,
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    degraded: watch::Sender<bool>,
    connections: DashMap<ConnectionId, PlayerConnection>,
    dictionary: DictionaryService,
    expiry_timers: DashMap<Uuid, AbortHandle>,
}

impl AppState {
    /// Construct the shared state with the HTTP-backed word definer.
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed by the supervisor.
    pub fn new(config: AppConfig) -> SharedState {
        let definer = Arc::new(HttpWordDefiner::new(&config.dictionary));
        Self::with_word_definer(config, definer)
    }

    /// Construct the shared state with an explicit word definer (tests inject
    /// stubs here).
    pub fn with_word_definer(config: AppConfig, definer: Arc<dyn WordDefiner>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            session_store: RwLock::new(None),
            degraded: degraded_tx,
            connections: DashMap::new(),
            dictionary: DictionaryService::new(definer),
            expiry_timers: DashMap::new(),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current session store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_session_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        self.session_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn install_session_store(&self, store: Arc<dyn SessionStore>) {
        {
            let mut guard = self.session_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_session_store(&self) {
        {
            let mut guard = self.session_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Whether the application currently has no storage backend.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.session_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        if self.is_degraded().await == value {
            return;
        }
        let _ = self.degraded.send(value);
    }

    /// Registry of active player sockets keyed by connection identifier.
    pub fn connections(&self) -> &DashMap<ConnectionId, PlayerConnection> {
        &self.connections
    }

    /// Connections currently registered for a room.
    pub fn room_connections(&self, room_id: &str) -> Vec<PlayerConnection> {
        self.connections
            .iter()
            .filter(|entry| entry.value().room_id == room_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Players reachable in a room right now.
    pub fn reachable_players(&self, room_id: &str) -> HashSet<String> {
        self.connections
            .iter()
            .filter(|entry| entry.value().room_id == room_id)
            .map(|entry| entry.value().player_id.clone())
            .collect()
    }

    /// Whether any of the player's connections to this room carries the
    /// room-owner claim.
    pub fn is_room_owner(&self, room_id: &str, player_id: &str) -> bool {
        self.connections.iter().any(|entry| {
            let connection = entry.value();
            connection.room_id == room_id && connection.player_id == player_id && connection.owner
        })
    }

    /// Dictionary validator with its in-process cache.
    pub fn dictionary(&self) -> &DictionaryService {
        &self.dictionary
    }

    /// One-shot expiry timers keyed by session identifier.
    pub fn expiry_timers(&self) -> &DashMap<Uuid, AbortHandle> {
        &self.expiry_timers
    }
}
