//! Per-room broadcast channels

use dashmap::DashMap;
use tokio::sync::broadcast;

use super::protocol::ServerMsg;

const CHANNEL_CAPACITY: usize = 256;

/// Fan-out primitive: one broadcast channel per room.
///
/// Delivery silently skips members whose connection is gone; a send
/// never blocks or awaits, so the tick loop can hand off snapshots
/// without risking tick drift.
#[derive(Default)]
pub struct RoomChannels {
    channels: DashMap<String, broadcast::Sender<ServerMsg>>,
}

impl RoomChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the sender for a room
    pub fn sender(&self, room_id: &str) -> broadcast::Sender<ServerMsg> {
        self.channels
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .value()
            .clone()
    }

    /// Subscribe to a room's messages
    pub fn subscribe(&self, room_id: &str) -> broadcast::Receiver<ServerMsg> {
        self.sender(room_id).subscribe()
    }

    /// Deliver a message to all currently connected members of a room
    pub fn broadcast(&self, room_id: &str, msg: ServerMsg) {
        if let Some(tx) = self.channels.get(room_id) {
            // Err just means nobody is listening right now
            let _ = tx.send(msg);
        }
    }

    /// Drop a room's channel once the room is gone
    pub fn remove(&self, room_id: &str) {
        self.channels.remove(room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let channels = RoomChannels::new();
        let mut a = channels.subscribe("1");
        let mut b = channels.subscribe("1");

        channels.broadcast("1", ServerMsg::RoomReset);

        assert!(matches!(a.recv().await, Ok(ServerMsg::RoomReset)));
        assert!(matches!(b.recv().await, Ok(ServerMsg::RoomReset)));
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let channels = RoomChannels::new();
        let mut other = channels.subscribe("2");

        channels.broadcast("1", ServerMsg::RoomReset);
        channels.broadcast("2", ServerMsg::GameStopped);

        assert!(matches!(other.recv().await, Ok(ServerMsg::GameStopped)));
    }

    #[test]
    fn broadcast_without_a_channel_is_a_no_op() {
        let channels = RoomChannels::new();
        channels.broadcast("nobody", ServerMsg::RoomReset);
    }
}
