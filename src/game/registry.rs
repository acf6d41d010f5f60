//! Registry of active games and the membership API

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::info;
use uuid::Uuid;

use super::state::{Game, RosterEntry};
use super::InputUpdate;

/// A registered game, shared between the tick task and the
/// membership/input API
pub type SharedGame = Arc<Mutex<Game>>;

/// Errors from direct game action requests
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Game already active")]
    AlreadyActive,
}

/// All active games, one per room at most.
///
/// An explicit struct injected where needed, so a single room's game
/// can be exercised in tests without global state.
#[derive(Default)]
pub struct GameRegistry {
    games: DashMap<String, SharedGame>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            games: DashMap::new(),
        }
    }

    /// Create and store a game for a room.
    ///
    /// Fails if the room already has a running game; a finished game
    /// left behind for late ranking queries is replaced silently.
    pub fn start(
        &self,
        room_id: &str,
        roster: &[RosterEntry],
        started_by: Uuid,
        started_at: u64,
        seed: u64,
    ) -> Result<SharedGame, GameError> {
        if let Some(existing) = self.games.get(room_id) {
            if !existing.lock().game_over {
                return Err(GameError::AlreadyActive);
            }
        }

        let game = Arc::new(Mutex::new(Game::new(
            room_id.to_string(),
            roster,
            started_by,
            started_at,
            seed,
        )));
        self.games.insert(room_id.to_string(), game.clone());

        info!(room_id = %room_id, players = roster.len(), "Game started");
        Ok(game)
    }

    /// Replace any existing game with a freshly seeded one under the
    /// same room id. The caller must have cancelled the room's timer.
    pub fn restart(
        &self,
        room_id: &str,
        roster: &[RosterEntry],
        started_by: Uuid,
        started_at: u64,
        seed: u64,
    ) -> SharedGame {
        let game = Arc::new(Mutex::new(Game::new(
            room_id.to_string(),
            roster,
            started_by,
            started_at,
            seed,
        )));
        self.games.insert(room_id.to_string(), game.clone());

        info!(room_id = %room_id, players = roster.len(), "Game restarted");
        game
    }

    /// Discard a room's game. Idempotent.
    pub fn stop(&self, room_id: &str) -> Option<SharedGame> {
        let removed = self.games.remove(room_id).map(|(_, game)| game);
        if removed.is_some() {
            info!(room_id = %room_id, "Game discarded");
        }
        removed
    }

    pub fn get(&self, room_id: &str) -> Option<SharedGame> {
        self.games.get(room_id).map(|g| g.value().clone())
    }

    /// Merge a partial input update into a player's intent.
    /// Silent no-op if the room has no game or the player is unknown.
    pub fn apply_input(&self, room_id: &str, player_id: Uuid, update: &InputUpdate) {
        if let Some(game) = self.games.get(room_id) {
            game.lock().apply_input(player_id, update);
        }
    }

    /// Insert a mid-game joiner. No-op if no game is running.
    pub fn add_player(&self, room_id: &str, player_id: Uuid, name: String) {
        if let Some(game) = self.games.get(room_id) {
            let mut game = game.lock();
            if !game.game_over {
                game.add_player(player_id, name);
                info!(room_id = %room_id, user_id = %player_id, "Player joined running game");
            }
        }
    }

    /// Record a disconnect elimination. No-op without a game.
    pub fn remove_player(&self, room_id: &str, player_id: Uuid) {
        if let Some(game) = self.games.get(room_id) {
            game.lock().remove_player(player_id);
        }
    }

    pub fn active_games(&self) -> usize {
        self.games.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::TICK_INTERVAL_MS;

    fn roster(n: usize) -> Vec<RosterEntry> {
        (0..n)
            .map(|i| RosterEntry {
                id: Uuid::new_v4(),
                name: format!("user{i}"),
            })
            .collect()
    }

    #[test]
    fn start_rejects_a_second_game_for_the_same_room() {
        let registry = GameRegistry::new();
        let r = roster(2);

        registry.start("1", &r, r[0].id, 0, 1).unwrap();
        let err = registry.start("1", &r, r[0].id, 0, 2).unwrap_err();
        assert!(matches!(err, GameError::AlreadyActive));

        // A different room is unaffected
        registry.start("2", &r, r[0].id, 0, 3).unwrap();
        assert_eq!(registry.active_games(), 2);
    }

    #[test]
    fn start_replaces_a_finished_game() {
        let registry = GameRegistry::new();
        let r = roster(1);

        let game = registry.start("1", &r, r[0].id, 0, 1).unwrap();
        {
            let mut game = game.lock();
            game.remove_player(r[0].id);
            game.tick(TICK_INTERVAL_MS);
            assert!(game.game_over);
        }

        assert!(registry.start("1", &r, r[0].id, 0, 2).is_ok());
    }

    #[test]
    fn stop_is_idempotent() {
        let registry = GameRegistry::new();
        let r = roster(2);

        registry.start("1", &r, r[0].id, 0, 1).unwrap();
        assert!(registry.stop("1").is_some());
        assert!(registry.stop("1").is_none());
        assert_eq!(registry.active_games(), 0);
    }

    #[test]
    fn input_routes_to_the_addressed_player_only() {
        let registry = GameRegistry::new();
        let r = roster(2);
        let game = registry.start("1", &r, r[0].id, 0, 1).unwrap();

        registry.apply_input(
            "1",
            r[1].id,
            &InputUpdate {
                up: Some(true),
                ..Default::default()
            },
        );

        match game.lock().build_snapshot(0) {
            crate::ws::protocol::ServerMsg::GameState { players, .. } => {
                assert!(!players[0].thrusting);
                assert!(players[1].thrusting);
            }
            _ => unreachable!(),
        }

        // Unknown room: silent no-op
        registry.apply_input("missing", r[0].id, &InputUpdate::default());
    }

    #[test]
    fn membership_changes_only_touch_running_games() {
        let registry = GameRegistry::new();

        // No game yet: both are no-ops
        registry.add_player("1", Uuid::new_v4(), "ghost".into());
        registry.remove_player("1", Uuid::new_v4());

        let r = roster(2);
        let game = registry.start("1", &r, r[0].id, 0, 1).unwrap();

        let late = Uuid::new_v4();
        registry.add_player("1", late, "late".into());
        assert_eq!(game.lock().player_count(), 3);

        registry.remove_player("1", late);
        assert_eq!(game.lock().alive_count(), 2);
    }
}
