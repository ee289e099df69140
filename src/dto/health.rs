use serde::Serialize;
use utoipa::ToSchema;

/// Response payload of the healthcheck endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Whether the session store is currently reachable.
    pub storage: bool,
}

impl HealthResponse {
    /// Everything is up.
    pub fn ok() -> Self {
        HealthResponse {
            status: "ok",
            storage: true,
        }
    }

    /// The service is running without its session store.
    pub fn degraded() -> Self {
        HealthResponse {
            status: "degraded",
            storage: false,
        }
    }
}
