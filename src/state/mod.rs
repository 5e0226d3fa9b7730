pub mod game;
pub mod state_machine;

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::game_store::GameStore,
    error::ServiceError,
    providers::{IdentityResolver, TrackProvider},
    services::room_session::RoomHandle,
};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state: the room registry plus the collaborator seams.
///
/// Rooms are inserted on game creation and evicted by their session task when
/// they reach a terminal status; identifiers are generated fresh per game so
/// concurrent inserts of the same key cannot occur.
pub struct AppState {
    config: AppConfig,
    rooms: DashMap<Uuid, RoomHandle>,
    identity: Arc<dyn IdentityResolver>,
    tracks: Arc<dyn TrackProvider>,
    store: Arc<dyn GameStore>,
}

impl AppState {
    /// Construct the shared state, wiring in the collaborator implementations.
    pub fn new(
        config: AppConfig,
        identity: Arc<dyn IdentityResolver>,
        tracks: Arc<dyn TrackProvider>,
        store: Arc<dyn GameStore>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            rooms: DashMap::new(),
            identity,
            tracks,
            store,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of live room sessions keyed by game identifier.
    pub fn rooms(&self) -> &DashMap<Uuid, RoomHandle> {
        &self.rooms
    }

    /// Look up a live room, failing with `NotFound` for unknown or already
    /// evicted games.
    pub fn room(&self, game_id: Uuid) -> Result<RoomHandle, ServiceError> {
        self.rooms
            .get(&game_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))
    }

    /// Identity collaborator resolving bearer credentials.
    pub fn identity(&self) -> Arc<dyn IdentityResolver> {
        Arc::clone(&self.identity)
    }

    /// Track-selection collaborator supplying round ground truth.
    pub fn tracks(&self) -> Arc<dyn TrackProvider> {
        Arc::clone(&self.tracks)
    }

    /// Persistence collaborator for answers, results and status updates.
    pub fn store(&self) -> Arc<dyn GameStore> {
        Arc::clone(&self.store)
    }
}
