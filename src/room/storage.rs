//! Disk persistence for lobby state

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use super::Room;

/// Rooms idle longer than this are dropped at startup and hourly
pub const STALE_ROOM_MAX_AGE_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Reads and writes the room map as one JSON file.
///
/// Live connections are never persisted; a reloaded room comes back as
/// a lobby snapshot only.
pub struct RoomStorage {
    path: PathBuf,
}

impl RoomStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load persisted rooms; an unreadable or corrupt file yields an
    /// empty map rather than a startup failure.
    pub fn load(&self) -> HashMap<String, Room> {
        if !self.path.exists() {
            return HashMap::new();
        }

        match fs::read_to_string(&self.path)
            .map_err(StorageError::from)
            .and_then(|data| {
                serde_json::from_str::<HashMap<String, Room>>(&data).map_err(StorageError::from)
            }) {
            Ok(rooms) => {
                info!(count = rooms.len(), path = %self.path.display(), "Loaded rooms");
                rooms
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Failed to load rooms, starting empty");
                HashMap::new()
            }
        }
    }

    pub fn save(&self, rooms: &HashMap<String, Room>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(rooms)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
