//! Per-room game state and the authoritative tick pipeline

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::ws::protocol::{BulletView, HitEventView, PlayerView, ServerMsg};

use super::combat::{CollisionEngine, Hit};
use super::entity::{Bullet, Elimination, EliminationReason, Player};
use super::physics::PhysicsSystem;
use super::ranking::build_rankings;
use super::weapons::WeaponSystem;
use super::{InputUpdate, SHOT_FLASH_MS};

/// A member of the room roster at start/restart time
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub id: Uuid,
    pub name: String,
}

/// What one tick produced for broadcast
#[derive(Debug)]
pub enum TickOutcome {
    /// Regular state snapshot; keep ticking
    Snapshot(ServerMsg),
    /// Final standings; the room's timer must stop
    Finished(ServerMsg),
}

/// Authoritative per-room game state.
///
/// Mutated only by the tick pipeline and the membership API; all of it
/// behind one lock held briefly and never across an await.
#[derive(Debug)]
pub struct Game {
    pub room_id: String,
    /// Authority holder: may restart or exit the game for everyone
    pub started_by: Uuid,
    pub started_at: u64,
    pub tick: u64,
    /// Join order is preserved; iteration order is the deterministic
    /// tie-break for same-tick eliminations
    players: Vec<Player>,
    bullets: Vec<Bullet>,
    /// Cleared at the start of every tick
    hit_events: Vec<Hit>,
    eliminations: Vec<Elimination>,
    pub game_over: bool,
    winner: Option<Uuid>,
    rng: ChaCha8Rng,
    next_bullet_id: u64,
}

impl Game {
    /// Seed a new game from the room roster, placing players evenly
    /// around the spawn ring in join order.
    pub fn new(
        room_id: String,
        roster: &[RosterEntry],
        started_by: Uuid,
        started_at: u64,
        seed: u64,
    ) -> Self {
        let total = roster.len();
        let players = roster
            .iter()
            .enumerate()
            .map(|(index, entry)| Player::at_ring(entry.id, entry.name.clone(), index, total))
            .collect();

        Self {
            room_id,
            started_by,
            started_at,
            tick: 0,
            players,
            bullets: Vec::new(),
            hit_events: Vec::new(),
            eliminations: Vec::new(),
            game_over: false,
            winner: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_bullet_id: 0,
        }
    }

    /// Advance the simulation by one tick.
    ///
    /// Returns `None` once the game is over; the scheduler treats that
    /// as a stale firing and stops.
    pub fn tick(&mut self, now: u64) -> Option<TickOutcome> {
        if self.game_over {
            return None;
        }

        self.tick += 1;
        self.hit_events.clear();

        // Movement and firing, players in join order
        for i in 0..self.players.len() {
            if !self.players[i].alive {
                continue;
            }

            PhysicsSystem::step_player(&mut self.players[i]);

            if WeaponSystem::can_fire(&self.players[i], now, self.started_at) {
                WeaponSystem::mark_fired(&mut self.players[i], now);
                self.next_bullet_id += 1;
                let bullet = Bullet::fired_by(&self.players[i], self.tick, self.next_bullet_id);
                self.bullets.push(bullet);
            }
        }

        PhysicsSystem::step_bullets(&mut self.bullets);

        CollisionEngine::resolve(
            &mut self.players,
            &mut self.bullets,
            now,
            self.tick,
            &mut self.hit_events,
            &mut self.eliminations,
        );

        let mut remaining = self.players.iter().filter(|p| p.alive);
        let survivor = remaining.next().map(|p| p.id);
        if remaining.next().is_none() {
            self.game_over = true;
            self.winner = survivor;
            return Some(TickOutcome::Finished(self.build_end_state()));
        }

        Some(TickOutcome::Snapshot(self.build_snapshot(now)))
    }

    /// Merge a partial input update into one player's intent.
    /// Ignored for dead or unknown players.
    pub fn apply_input(&mut self, player_id: Uuid, update: &InputUpdate) {
        if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
            if player.alive {
                player.input.merge(update);
            }
        }
    }

    /// Drop a mid-game joiner at a random interior position
    pub fn add_player(&mut self, id: Uuid, name: String) {
        if self.players.iter().any(|p| p.id == id) {
            return;
        }
        let player = Player::at_random(id, name, &mut self.rng);
        self.players.push(player);
    }

    /// Handle a disconnect: record the elimination and hand authority
    /// to the first remaining alive player in join order if the leaver
    /// held it. Termination is detected by the next tick.
    pub fn remove_player(&mut self, player_id: Uuid) {
        let tick = self.tick;
        if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
            if player.alive {
                player.alive = false;
                player.eliminated_at = Some(tick);
                self.eliminations.push(Elimination {
                    player_id,
                    name: player.name.clone(),
                    tick,
                    reason: EliminationReason::Disconnect,
                    killed_by: None,
                });
            }
        } else {
            return;
        }

        if self.started_by == player_id {
            if let Some(next) = self.players.iter().find(|p| p.alive) {
                self.started_by = next.id;
            }
        }
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn winner_id(&self) -> Option<Uuid> {
        self.winner
    }

    /// Full state snapshot for broadcast; includes dead players so
    /// clients can render wrecks and the scoreboard.
    pub fn build_snapshot(&self, now: u64) -> ServerMsg {
        ServerMsg::GameState {
            tick: self.tick,
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id,
                    name: p.name.clone(),
                    x: p.x,
                    y: p.y,
                    rotation: p.rotation,
                    lives: p.lives,
                    alive: p.alive,
                    invincible: p.is_invincible(now),
                    thrusting: p.input.up,
                    shooting: now.saturating_sub(p.last_shot) < SHOT_FLASH_MS,
                })
                .collect(),
            bullets: self
                .bullets
                .iter()
                .map(|b| BulletView {
                    id: b.id,
                    x: b.x,
                    y: b.y,
                    rotation: b.rotation,
                    owner_id: b.owner_id,
                })
                .collect(),
            hit_events: self
                .hit_events
                .iter()
                .map(|h| HitEventView {
                    player_id: h.player_id,
                    bullet_owner_id: h.bullet_owner_id,
                    tick: h.tick,
                })
                .collect(),
        }
    }

    /// Final standings message
    pub fn build_end_state(&self) -> ServerMsg {
        let winner = self
            .winner
            .and_then(|id| self.players.iter().find(|p| p.id == id));
        ServerMsg::GameEnded {
            rankings: build_rankings(winner, &self.eliminations),
            started_by: self.started_by,
        }
    }
}
