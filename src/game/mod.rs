//! Arena minigame simulation modules

pub mod combat;
pub mod entity;
pub mod geometry;
pub mod physics;
pub mod ranking;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod weapons;

pub use registry::{GameError, GameRegistry};
pub use scheduler::GameScheduler;
pub use state::{Game, TickOutcome};

use serde::Deserialize;

/// Simulation tick rate
pub const TICK_RATE: u32 = 20; // 20Hz (50ms per tick)
pub const TICK_INTERVAL_MS: u64 = 1_000 / TICK_RATE as u64;

/// Collision radii (normalized arena units)
pub const PLAYER_RADIUS: f32 = 0.022;
pub const BULLET_RADIUS: f32 = 0.015;

/// Bullet travel per tick, and total travel before despawn
pub const BULLET_SPEED: f32 = 0.025;
pub const BULLET_MAX_DISTANCE: f32 = 1.0;

/// Weapon timing (milliseconds)
pub const SHOOT_COOLDOWN_MS: u64 = 300;
pub const INVINCIBILITY_MS: u64 = 500;
pub const GAME_START_GRACE_MS: u64 = 5_000;

/// Muzzle flash window reported in snapshots
pub const SHOT_FLASH_MS: u64 = 100;

/// Asteroids-style momentum constants, applied once per tick
pub const THRUST_ACCELERATION: f32 = 0.0008;
pub const MAX_SPEED: f32 = 0.015;
pub const DRAG: f32 = 0.995;
pub const TURN_STEP: f32 = 0.1;

pub const STARTING_LIVES: u8 = 3;

/// Players wrap inside an inset strip; bullets wrap over the full
/// normalized range and may graze the border strip players can't occupy.
pub const ARENA_MIN: f32 = 0.05;
pub const ARENA_MAX: f32 = 0.95;
pub const BULLET_WRAP_MIN: f32 = 0.0;
pub const BULLET_WRAP_MAX: f32 = 1.0;

/// Ring used to seed starting positions, centered in the arena
pub const SPAWN_RING_RADIUS: f32 = 0.3;
pub const ARENA_CENTER: f32 = 0.5;

/// Bullets spawn this far beyond the combined radii so they never
/// overlap their owner on the spawn tick.
pub const BULLET_SPAWN_MARGIN: f32 = 0.01;

/// Full input state held per player between ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub shooting: bool,
}

impl PlayerInput {
    /// Merge a partial update, leaving unmentioned keys untouched
    pub fn merge(&mut self, update: &InputUpdate) {
        if let Some(up) = update.up {
            self.up = up;
        }
        if let Some(down) = update.down {
            self.down = down;
        }
        if let Some(left) = update.left {
            self.left = left;
        }
        if let Some(right) = update.right {
            self.right = right;
        }
        if let Some(shooting) = update.shooting {
            self.shooting = shooting;
        }
    }
}

/// Partial input update as sent by clients on key transitions
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct InputUpdate {
    #[serde(default)]
    pub up: Option<bool>,
    #[serde(default)]
    pub down: Option<bool>,
    #[serde(default)]
    pub left: Option<bool>,
    #[serde(default)]
    pub right: Option<bool>,
    #[serde(default)]
    pub shooting: Option<bool>,
}
