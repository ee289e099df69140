/// Event fan-out to room WebSocket connections.
pub mod broadcast_service;
/// Catch-the-word gameplay rules.
pub mod catch_word_service;
/// Dictionary-backed word validation with caching.
pub mod dictionary_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Whole-game duration timers.
pub mod expiry_service;
/// Game lifecycle and versioned session writes.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Storage connection supervisor with reconnect backoff.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
/// Word-chain gameplay rules.
pub mod word_chain_service;
