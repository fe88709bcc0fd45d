//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::RoomRegistry;
use crate::lobby::LobbyRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: Arc<RoomRegistry>,
    pub lobbies: Arc<LobbyRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let rooms = Arc::new(RoomRegistry::new(config.max_players_per_room));
        let lobbies = Arc::new(LobbyRegistry::new(config.max_players_per_room));

        Self {
            config,
            rooms,
            lobbies,
        }
    }
}
