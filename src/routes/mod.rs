use axum::Router;

use crate::state::SharedState;

/// Swagger UI and the rendered OpenAPI document.
pub mod docs;
/// Read-only game views per room.
pub mod game;
/// Healthcheck endpoint.
pub mod health;
/// WebSocket upgrade endpoint.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(game::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
