//! Per-room fixed-rate tick timers with synchronous cancellation

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::util::time::unix_millis;
use crate::ws::protocol::ServerMsg;

use super::registry::{GameRegistry, SharedGame};
use super::state::TickOutcome;
use super::TICK_INTERVAL_MS;

/// Owns one cancellable fixed-rate timer per active room.
///
/// Each generation number marks one timer incarnation; a firing whose
/// generation is no longer current is a stale firing and does nothing.
/// `cancel` removes the generation entry before aborting the task, so
/// after it returns no further tick can run for that incarnation.
#[derive(Default)]
pub struct GameScheduler {
    generations: Arc<DashMap<String, u64>>,
    handles: DashMap<String, JoinHandle<()>>,
    next_generation: AtomicU64,
}

impl GameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the tick loop for a room, replacing any previous timer.
    ///
    /// Snapshot delivery is fire-and-forget through the room's
    /// broadcast channel; the loop never awaits a send.
    pub fn start_loop(
        &self,
        room_id: String,
        game: SharedGame,
        registry: Arc<GameRegistry>,
        tx: broadcast::Sender<ServerMsg>,
    ) {
        self.cancel(&room_id);

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.generations.insert(room_id.clone(), generation);

        let generations = self.generations.clone();
        let task_room = room_id.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(TICK_INTERVAL_MS));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                // A firing that outlived cancel/restart must not touch state
                let current = generations.get(&task_room).map(|g| *g);
                if current != Some(generation) {
                    break;
                }

                // Contain a tick fault to this room
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| game.lock().tick(unix_millis())));

                match outcome {
                    Ok(Some(TickOutcome::Snapshot(msg))) => {
                        let _ = tx.send(msg);
                    }
                    Ok(Some(TickOutcome::Finished(msg))) => {
                        let _ = tx.send(msg);
                        info!(room_id = %task_room, "Game finished");
                        break;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        error!(room_id = %task_room, "Tick panicked, stopping this room's game");
                        registry.stop(&task_room);
                        let _ = tx.send(ServerMsg::GameStopped);
                        break;
                    }
                }
            }

            generations.remove_if(&task_room, |_, g| *g == generation);
        });

        // The previous handle, if any, was aborted above
        self.handles.insert(room_id, handle);
    }

    /// Cancel a room's timer. After this returns no further tick fires
    /// for that room until a new loop is started. Idempotent.
    pub fn cancel(&self, room_id: &str) -> bool {
        let had_timer = self.generations.remove(room_id).is_some();
        if let Some((_, handle)) = self.handles.remove(room_id) {
            handle.abort();
        }
        if had_timer {
            info!(room_id = %room_id, "Tick timer cancelled");
        }
        had_timer
    }

    pub fn is_running(&self, room_id: &str) -> bool {
        self.generations.contains_key(room_id)
    }

    pub fn active_timers(&self) -> usize {
        self.generations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::RosterEntry;
    use parking_lot::Mutex;
    use tokio::time::timeout;
    use uuid::Uuid;

    fn shared_game(names: &[&str]) -> (SharedGame, Vec<Uuid>) {
        let roster: Vec<RosterEntry> = names
            .iter()
            .map(|name| RosterEntry {
                id: Uuid::new_v4(),
                name: (*name).into(),
            })
            .collect();
        let ids = roster.iter().map(|e| e.id).collect();
        let game = crate::game::Game::new("9".into(), &roster, roster[0].id, unix_millis(), 1);
        (Arc::new(Mutex::new(game)), ids)
    }

    #[tokio::test]
    async fn loop_broadcasts_snapshots_every_tick() {
        let scheduler = Arc::new(GameScheduler::new());
        let registry = Arc::new(GameRegistry::new());
        let (tx, mut rx) = broadcast::channel(64);
        let (game, _) = shared_game(&["a", "b"]);

        scheduler.start_loop("9".into(), game, registry, tx);

        for _ in 0..3 {
            let msg = timeout(Duration::from_millis(500), rx.recv())
                .await
                .expect("no snapshot within timeout")
                .expect("channel closed");
            assert!(matches!(msg, ServerMsg::GameState { .. }));
        }
        assert!(scheduler.is_running("9"));
        scheduler.cancel("9");
    }

    #[tokio::test]
    async fn cancelled_room_never_ticks_again() {
        let scheduler = Arc::new(GameScheduler::new());
        let registry = Arc::new(GameRegistry::new());
        let (tx, mut rx) = broadcast::channel(64);
        let (game, _) = shared_game(&["a", "b"]);

        scheduler.start_loop("9".into(), game.clone(), registry, tx);
        let _ = timeout(Duration::from_millis(500), rx.recv()).await;

        assert!(scheduler.cancel("9"));
        assert!(!scheduler.is_running("9"));
        let tick_at_cancel = game.lock().tick;

        // Drain anything already in flight, then expect silence
        tokio::time::sleep(Duration::from_millis(200)).await;
        while let Ok(msg) = rx.try_recv() {
            drop(msg);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err(), "tick fired after cancellation");
        assert!(game.lock().tick <= tick_at_cancel + 1);
    }

    #[tokio::test]
    async fn finished_game_stops_its_own_timer() {
        let scheduler = Arc::new(GameScheduler::new());
        let registry = Arc::new(GameRegistry::new());
        let (tx, mut rx) = broadcast::channel(64);
        let (game, ids) = shared_game(&["solo"]);

        // Sole player disconnects: next tick terminates the game
        game.lock().remove_player(ids[0]);
        scheduler.start_loop("9".into(), game, registry, tx);

        let msg = timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("no message within timeout")
            .expect("channel closed");
        assert!(matches!(msg, ServerMsg::GameEnded { .. }));

        // The loop exits and clears its generation entry
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!scheduler.is_running("9"));
    }

    #[tokio::test]
    async fn restarting_a_room_replaces_the_old_timer() {
        let scheduler = Arc::new(GameScheduler::new());
        let registry = Arc::new(GameRegistry::new());
        let (tx, mut rx) = broadcast::channel(64);
        let (first, _) = shared_game(&["a", "b"]);
        let (second, _) = shared_game(&["a", "b"]);

        scheduler.start_loop("9".into(), first.clone(), registry.clone(), tx.clone());
        let _ = timeout(Duration::from_millis(500), rx.recv()).await;

        scheduler.start_loop("9".into(), second.clone(), registry, tx);
        assert_eq!(scheduler.active_timers(), 1);

        let first_tick = first.lock().tick;
        tokio::time::sleep(Duration::from_millis(200)).await;
        // Only the replacement advances
        assert!(first.lock().tick <= first_tick + 1);
        assert!(second.lock().tick > 0);
        scheduler.cancel("9");
    }
}
