//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::entity::EliminationReason;
use crate::game::InputUpdate;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Join a room by name; creates the room if it does not exist
    Join {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "userName")]
        user_name: String,
    },

    /// Cast or change an anonymous vote
    Vote { value: String },

    /// Reveal all votes in the room
    Reveal,

    /// Clear votes and hide them again
    Reset,

    /// Kick everyone out and delete the room
    ResetRoom,

    /// Launch the arena minigame for the whole room
    StartGame,

    /// Partial input intent for the sender's ship
    SubmitInput { input: InputUpdate },

    /// Start a fresh game under the same room (authority only)
    RestartGame,

    /// Terminate the game for everyone (authority only)
    ExitGame,
}

/// Messages sent from server to clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Current lobby state; `user_id` is set only on the direct reply
    /// to a join
    RoomState {
        room: RoomView,
        #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
        user_id: Option<Uuid>,
    },

    /// A user joined the sender's room
    UserJoined { user: RoomUserView },

    /// A user left the sender's room
    UserLeft {
        #[serde(rename = "userId")]
        user_id: Uuid,
    },

    /// The room was reset; clients should rejoin from scratch
    RoomReset,

    /// A game has started in the room
    GameStarted {
        #[serde(rename = "startedBy")]
        started_by: Uuid,
    },

    /// Authoritative state snapshot, one per tick
    GameState {
        tick: u64,
        players: Vec<PlayerView>,
        bullets: Vec<BulletView>,
        #[serde(rename = "hitEvents")]
        hit_events: Vec<HitEventView>,
    },

    /// Final standings after termination
    GameEnded {
        rankings: Vec<RankingEntry>,
        #[serde(rename = "startedBy")]
        started_by: Uuid,
    },

    /// The game was stopped without rankings
    GameStopped,

    /// Generic error notice, sent to the offending client only
    Error { message: String },
}

/// Lobby view of a room with votes masked until revealed
#[derive(Debug, Clone, Serialize)]
pub struct RoomView {
    pub id: String,
    pub users: Vec<RoomUserView>,
    pub revealed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomUserView {
    pub id: Uuid,
    pub name: String,
    /// `None` = not voted; `"hidden"` until the room is revealed
    pub vote: Option<String>,
}

/// Player state as rendered by clients
#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub id: Uuid,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub lives: u8,
    pub alive: bool,
    pub invincible: bool,
    pub thrusting: bool,
    pub shooting: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulletView {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    #[serde(rename = "ownerId")]
    pub owner_id: Uuid,
}

/// One registered hit this tick, for client impact effects
#[derive(Debug, Clone, Serialize)]
pub struct HitEventView {
    #[serde(rename = "playerId")]
    pub player_id: Uuid,
    #[serde(rename = "bulletOwnerId")]
    pub bullet_owner_id: Uuid,
    pub tick: u64,
}

/// Final standing for one player
#[derive(Debug, Clone, Serialize)]
pub struct RankingEntry {
    pub id: Uuid,
    pub name: String,
    pub rank: u32,
    pub survived: bool,
    #[serde(rename = "killedBy", skip_serializing_if = "Option::is_none")]
    pub killed_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<EliminationReason>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn client_messages_deserialize_from_wire_shape() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"join","roomId":"123456","userName":"ada"}"#).unwrap();
        match msg {
            ClientMsg::Join { room_id, user_name } => {
                assert_eq!(room_id, "123456");
                assert_eq!(user_name, "ada");
            }
            other => panic!("unexpected variant: {other:?}"),
        }

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"submit_input","input":{"up":true,"shooting":false}}"#)
                .unwrap();
        match msg {
            ClientMsg::SubmitInput { input } => {
                assert_eq!(input.up, Some(true));
                assert_eq!(input.shooting, Some(false));
                assert_eq!(input.left, None);
            }
            other => panic!("unexpected variant: {other:?}"),
        }

        assert!(matches!(
            serde_json::from_str(r#"{"type":"start_game"}"#).unwrap(),
            ClientMsg::StartGame
        ));
    }

    #[test]
    fn unknown_message_types_fail_to_parse() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"not even json"#).is_err());
    }

    #[test]
    fn ranking_entry_omits_absent_fields() {
        let winner = RankingEntry {
            id: Uuid::new_v4(),
            name: "winner".into(),
            rank: 1,
            survived: true,
            killed_by: None,
            reason: None,
        };
        let value: Value = serde_json::to_value(&winner).unwrap();
        assert!(value.get("killedBy").is_none());
        assert!(value.get("reason").is_none());

        let killer = Uuid::new_v4();
        let loser = RankingEntry {
            id: Uuid::new_v4(),
            name: "loser".into(),
            rank: 2,
            survived: false,
            killed_by: Some(killer),
            reason: Some(EliminationReason::Killed),
        };
        let value: Value = serde_json::to_value(&loser).unwrap();
        assert_eq!(value["killedBy"], json!(killer.to_string()));
        assert_eq!(value["reason"], json!("killed"));
    }

    #[test]
    fn game_state_uses_camel_case_field_names() {
        let msg = ServerMsg::GameState {
            tick: 7,
            players: vec![],
            bullets: vec![BulletView {
                id: 3,
                x: 0.1,
                y: 0.2,
                rotation: 0.0,
                owner_id: Uuid::new_v4(),
            }],
            hit_events: vec![],
        };
        let value: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], json!("game_state"));
        assert!(value.get("hitEvents").is_some());
        assert!(value["bullets"][0].get("ownerId").is_some());
    }
}
