use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the process is serving.
    pub status: String,
    /// Number of rooms currently held in the registry.
    pub active_rooms: usize,
}

impl HealthResponse {
    /// Health response for a serving process with `active_rooms` live rooms.
    pub fn ok(active_rooms: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_rooms,
        }
    }
}
