//! Room registry: membership, anonymous voting and persistence

pub mod storage;

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::game::state::RosterEntry;
use crate::ws::protocol::{RoomUserView, RoomView};

use self::storage::{RoomStorage, STALE_ROOM_MAX_AGE_HOURS};

/// A lobby member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomUser {
    pub id: Uuid,
    pub name: String,
    pub vote: Option<String>,
}

/// A persisted room. Join order of `users` is the game roster order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub users: Vec<RoomUser>,
    pub revealed: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Room {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            users: Vec::new(),
            revealed: false,
            created_at: now,
            last_activity: now,
        }
    }

    /// Public view with votes masked until revealed
    fn view(&self) -> RoomView {
        RoomView {
            id: self.id.clone(),
            users: self
                .users
                .iter()
                .map(|u| RoomUserView {
                    id: u.id,
                    name: u.name.clone(),
                    vote: if self.revealed {
                        u.vote.clone()
                    } else {
                        u.vote.as_ref().map(|_| "hidden".to_string())
                    },
                })
                .collect(),
            revealed: self.revealed,
        }
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// What happened to the room after a user left
#[derive(Debug, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub room_deleted: bool,
}

/// All rooms, persisted to disk on every mutation.
///
/// An explicit store injected into the transport layer, never a
/// process-wide singleton.
pub struct RoomStore {
    rooms: RwLock<HashMap<String, Room>>,
    storage: RoomStorage,
}

impl RoomStore {
    /// Load persisted rooms and drop the stale ones
    pub fn load(storage: RoomStorage) -> Self {
        let mut rooms = storage.load();
        let dropped = remove_stale(&mut rooms);
        if dropped > 0 {
            info!(count = dropped, "Cleaned up stale rooms at startup");
        }
        let store = Self {
            rooms: RwLock::new(rooms),
            storage,
        };
        store.persist();
        store
    }

    /// Create an empty room under a fresh 6-digit id
    pub fn create_room(&self) -> String {
        let mut rooms = self.rooms.write();
        let mut id = generate_room_id();
        while rooms.contains_key(&id) {
            id = generate_room_id();
        }
        rooms.insert(id.clone(), Room::new(id.clone()));
        drop(rooms);

        info!(room_id = %id, "Room created");
        self.persist();
        id
    }

    /// Add a user to a room, creating the room on first join.
    /// Returns the new user's id and the updated view.
    pub fn join(&self, room_id: &str, user_name: &str) -> (Uuid, RoomView) {
        let mut rooms = self.rooms.write();
        let room = rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(room_id.to_string()));

        let user_id = Uuid::new_v4();
        room.users.push(RoomUser {
            id: user_id,
            name: user_name.to_string(),
            vote: None,
        });
        room.touch();
        let view = room.view();
        drop(rooms);

        info!(room_id = %room_id, user_id = %user_id, name = %user_name, "User joined room");
        self.persist();
        (user_id, view)
    }

    /// Remove a user; the room is deleted once its last user leaves
    pub fn leave(&self, room_id: &str, user_id: Uuid) -> Option<LeaveOutcome> {
        let mut rooms = self.rooms.write();
        let room = rooms.get_mut(room_id)?;

        let before = room.users.len();
        room.users.retain(|u| u.id != user_id);
        if room.users.len() == before {
            return None;
        }
        room.touch();

        let room_deleted = room.users.is_empty();
        if room_deleted {
            rooms.remove(room_id);
        }
        drop(rooms);

        info!(room_id = %room_id, user_id = %user_id, room_deleted, "User left room");
        self.persist();
        Some(LeaveOutcome { room_deleted })
    }

    /// Record a vote; ignored while the room is revealed
    pub fn vote(&self, room_id: &str, user_id: Uuid, value: String) -> Option<RoomView> {
        let mut rooms = self.rooms.write();
        let room = rooms.get_mut(room_id)?;
        if room.revealed {
            return None;
        }

        let user = room.users.iter_mut().find(|u| u.id == user_id)?;
        user.vote = Some(value);
        room.touch();
        let view = room.view();
        drop(rooms);

        self.persist();
        Some(view)
    }

    /// Reveal all votes
    pub fn reveal(&self, room_id: &str) -> Option<RoomView> {
        let view = {
            let mut rooms = self.rooms.write();
            let room = rooms.get_mut(room_id)?;
            room.revealed = true;
            room.touch();
            room.view()
        };
        self.persist();
        Some(view)
    }

    /// Clear votes and hide them again
    pub fn reset(&self, room_id: &str) -> Option<RoomView> {
        let view = {
            let mut rooms = self.rooms.write();
            let room = rooms.get_mut(room_id)?;
            room.revealed = false;
            for user in &mut room.users {
                user.vote = None;
            }
            room.touch();
            room.view()
        };
        self.persist();
        Some(view)
    }

    /// Kick everyone out and delete the room
    pub fn reset_room(&self, room_id: &str) -> bool {
        let existed = self.rooms.write().remove(room_id).is_some();
        if existed {
            info!(room_id = %room_id, "Room reset");
            self.persist();
        }
        existed
    }

    /// Current ordered membership, used to seed a game
    pub fn roster(&self, room_id: &str) -> Option<Vec<RosterEntry>> {
        let rooms = self.rooms.read();
        let room = rooms.get(room_id)?;
        Some(
            room.users
                .iter()
                .map(|u| RosterEntry {
                    id: u.id,
                    name: u.name.clone(),
                })
                .collect(),
        )
    }

    pub fn view(&self, room_id: &str) -> Option<RoomView> {
        self.rooms.read().get(room_id).map(|r| r.view())
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.read().len()
    }

    /// Drop rooms idle past the stale threshold; returns how many
    pub fn cleanup_stale(&self) -> usize {
        let removed = remove_stale(&mut self.rooms.write());
        if removed > 0 {
            info!(count = removed, "Cleaned up stale rooms");
            self.persist();
        }
        removed
    }

    fn persist(&self) {
        let rooms = self.rooms.read();
        if let Err(e) = self.storage.save(&rooms) {
            warn!(error = %e, "Failed to persist rooms");
        }
    }
}

fn remove_stale(rooms: &mut HashMap<String, Room>) -> usize {
    let cutoff = Utc::now() - Duration::hours(STALE_ROOM_MAX_AGE_HOURS);
    let before = rooms.len();
    rooms.retain(|_, room| room.last_activity >= cutoff);
    before - rooms.len()
}

fn generate_room_id() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}
