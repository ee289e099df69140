use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Wordplay Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::game::game_snapshot,
        crate::routes::game::game_rounds,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::action::ClientAction,
            crate::dto::event::ServerEvent,
            crate::dto::game::GameSnapshot,
            crate::dto::game::ChallengeSnapshot,
            crate::dto::game::OutcomeSnapshot,
            crate::dto::game::RoundStats,
            crate::dto::game::GuessStats,
            crate::dao::models::Difficulty,
            crate::dao::models::GameKind,
            crate::dao::models::SessionStatus,
            crate::dao::models::EndReason,
            crate::dao::models::RoundEndReason,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Read-only game views per room"),
        (name = "players", description = "WebSocket operations for player clients"),
    )
)]
pub struct ApiDoc;
