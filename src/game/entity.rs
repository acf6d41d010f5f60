//! Player and bullet state records and their construction rules

use std::f32::consts::{PI, TAU};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use super::{
    PlayerInput, ARENA_CENTER, ARENA_MAX, ARENA_MIN, BULLET_RADIUS, BULLET_SPAWN_MARGIN,
    PLAYER_RADIUS, SPAWN_RING_RADIUS, STARTING_LIVES,
};

/// Authoritative per-player state
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub name: String,

    // Position and momentum
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub rotation: f32,

    // Combat
    pub lives: u8,
    pub alive: bool,
    pub last_shot: u64,
    pub invincible_until: u64,
    /// Tick of elimination, `None` while alive
    pub eliminated_at: Option<u64>,

    pub input: PlayerInput,
}

impl Player {
    /// Place the i-th of N joining players on the spawn ring, facing the
    /// arena center.
    pub fn at_ring(id: Uuid, name: String, index: usize, total: usize) -> Self {
        let angle = (index as f32 / total.max(1) as f32) * TAU;
        Self::new(
            id,
            name,
            ARENA_CENTER + angle.cos() * SPAWN_RING_RADIUS,
            ARENA_CENTER + angle.sin() * SPAWN_RING_RADIUS,
            angle + PI,
        )
    }

    /// Mid-game joiners spawn at a uniformly random interior position
    /// with a random facing.
    pub fn at_random(id: Uuid, name: String, rng: &mut ChaCha8Rng) -> Self {
        Self::new(
            id,
            name,
            rng.gen_range(ARENA_MIN..ARENA_MAX),
            rng.gen_range(ARENA_MIN..ARENA_MAX),
            rng.gen_range(0.0..TAU),
        )
    }

    fn new(id: Uuid, name: String, x: f32, y: f32, rotation: f32) -> Self {
        Self {
            id,
            name,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            rotation,
            lives: STARTING_LIVES,
            alive: true,
            last_shot: 0,
            invincible_until: 0,
            eliminated_at: None,
            input: PlayerInput::default(),
        }
    }

    pub fn is_invincible(&self, now: u64) -> bool {
        now < self.invincible_until
    }
}

/// A bullet in flight. The travel angle is fixed at spawn.
#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: u64,
    pub owner_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub created_at: u64,
    pub distance_traveled: f32,
}

impl Bullet {
    /// Spawn a bullet offset from the shooter's center along its facing,
    /// far enough out that it never overlaps its owner.
    pub fn fired_by(player: &Player, tick: u64, id: u64) -> Self {
        let offset = PLAYER_RADIUS + BULLET_RADIUS + BULLET_SPAWN_MARGIN;
        Self {
            id,
            owner_id: player.id,
            x: player.x + player.rotation.cos() * offset,
            y: player.y + player.rotation.sin() * offset,
            rotation: player.rotation,
            created_at: tick,
            distance_traveled: 0.0,
        }
    }
}

/// Why a player left the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationReason {
    Killed,
    Disconnect,
}

/// Append-only log entry; append order is the authoritative
/// elimination order used for ranking.
#[derive(Debug, Clone)]
pub struct Elimination {
    pub player_id: Uuid,
    pub name: String,
    pub tick: u64,
    pub reason: EliminationReason,
    /// Present only for `Killed`
    pub killed_by: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::geometry::circles_overlap;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;

    #[test]
    fn ring_spawns_are_evenly_spaced_and_face_inward() {
        let total = 4;
        for index in 0..total {
            let p = Player::at_ring(Uuid::new_v4(), format!("p{index}"), index, total);
            let angle = (index as f32 / total as f32) * TAU;
            assert_approx_eq!(p.x, ARENA_CENTER + angle.cos() * SPAWN_RING_RADIUS, 1e-5);
            assert_approx_eq!(p.y, ARENA_CENTER + angle.sin() * SPAWN_RING_RADIUS, 1e-5);
            // Facing the center means pointing back along the spawn angle
            assert_approx_eq!(p.rotation, angle + PI, 1e-5);
            assert_eq!(p.lives, STARTING_LIVES);
            assert!(p.alive);
        }
    }

    #[test]
    fn random_spawns_stay_inside_the_arena() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            let p = Player::at_random(Uuid::new_v4(), "drifter".into(), &mut rng);
            assert!(p.x >= ARENA_MIN && p.x < ARENA_MAX);
            assert!(p.y >= ARENA_MIN && p.y < ARENA_MAX);
        }
    }

    #[test]
    fn bullets_never_spawn_overlapping_their_owner() {
        for index in 0..8 {
            let shooter = Player::at_ring(Uuid::new_v4(), "shooter".into(), index, 8);
            let bullet = Bullet::fired_by(&shooter, 7, 1);
            assert_eq!(bullet.created_at, 7);
            assert_eq!(bullet.owner_id, shooter.id);
            assert!(!circles_overlap(
                bullet.x,
                bullet.y,
                BULLET_RADIUS,
                shooter.x,
                shooter.y,
                PLAYER_RADIUS
            ));
        }
    }

    #[test]
    fn invincibility_window_is_checked_against_now() {
        let mut p = Player::at_ring(Uuid::new_v4(), "p".into(), 0, 1);
        p.invincible_until = 1_500;
        assert!(p.is_invincible(1_499));
        assert!(!p.is_invincible(1_500));
    }
}
