//! Library crate for wordplay-back, exposing modules for binaries and integration tests.

/// Application configuration loading and defaults.
pub mod config;
/// Persistence layer: entities, the store trait, and its backends.
pub mod dao;
/// Wire payloads: client actions, server events, snapshots, validation.
pub mod dto;
/// Error taxonomy from gameplay rejections up to HTTP responses.
pub mod error;
/// HTTP and WebSocket route trees.
pub mod routes;
/// Game, broadcast, dictionary, and background services.
pub mod services;
/// Shared application state and pure game-state logic.
pub mod state;
