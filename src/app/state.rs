//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{GameRegistry, GameScheduler};
use crate::room::storage::RoomStorage;
use crate::room::RoomStore;
use crate::ws::channels::RoomChannels;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: Arc<RoomStore>,
    pub games: Arc<GameRegistry>,
    pub scheduler: Arc<GameScheduler>,
    pub channels: Arc<RoomChannels>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Reload persisted rooms from disk
        let rooms = Arc::new(RoomStore::load(RoomStorage::new(config.data_file.clone())));

        Self {
            config,
            rooms,
            games: Arc::new(GameRegistry::new()),
            scheduler: Arc::new(GameScheduler::new()),
            channels: Arc::new(RoomChannels::new()),
        }
    }
}
