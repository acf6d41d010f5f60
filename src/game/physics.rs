//! Per-tick momentum integration for players and bullets

use super::entity::{Bullet, Player};
use super::geometry::wrap;
use super::{
    ARENA_MAX, ARENA_MIN, BULLET_MAX_DISTANCE, BULLET_SPEED, BULLET_WRAP_MAX, BULLET_WRAP_MIN,
    DRAG, MAX_SPEED, THRUST_ACCELERATION, TURN_STEP,
};

/// Integrates player and bullet motion
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one player by one tick.
    ///
    /// Order matters: turn, thrust, cap speed, integrate, drag, wrap.
    pub fn step_player(player: &mut Player) {
        let input = player.input;

        // Rotation is instantaneous, no momentum
        if input.left {
            player.rotation -= TURN_STEP;
        }
        if input.right {
            player.rotation += TURN_STEP;
        }

        // Thrust accelerates along the current facing
        if input.up {
            player.vx += player.rotation.cos() * THRUST_ACCELERATION;
            player.vy += player.rotation.sin() * THRUST_ACCELERATION;
        }

        // Cap speed, preserving direction
        let speed = (player.vx * player.vx + player.vy * player.vy).sqrt();
        if speed > MAX_SPEED {
            let scale = MAX_SPEED / speed;
            player.vx *= scale;
            player.vy *= scale;
        }

        // Momentum carries on without thrust
        player.x += player.vx;
        player.y += player.vy;

        // Drag applies every tick so motion decays toward rest
        player.vx *= DRAG;
        player.vy *= DRAG;

        player.x = wrap(player.x, ARENA_MIN, ARENA_MAX);
        player.y = wrap(player.y, ARENA_MIN, ARENA_MAX);
    }

    /// Advance all bullets one tick and drop the ones past their range.
    ///
    /// Bullets fly at fixed speed along their spawn angle and wrap over
    /// the full normalized range, wider than the player inset.
    pub fn step_bullets(bullets: &mut Vec<Bullet>) {
        bullets.retain_mut(|bullet| {
            bullet.x += bullet.rotation.cos() * BULLET_SPEED;
            bullet.y += bullet.rotation.sin() * BULLET_SPEED;
            bullet.distance_traveled += BULLET_SPEED;

            bullet.x = wrap(bullet.x, BULLET_WRAP_MIN, BULLET_WRAP_MAX);
            bullet.y = wrap(bullet.y, BULLET_WRAP_MIN, BULLET_WRAP_MAX);

            bullet.distance_traveled < BULLET_MAX_DISTANCE
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PlayerInput;
    use assert_approx_eq::assert_approx_eq;
    use uuid::Uuid;

    fn player_at(x: f32, y: f32, rotation: f32) -> Player {
        let mut p = Player::at_ring(Uuid::new_v4(), "p".into(), 0, 1);
        p.x = x;
        p.y = y;
        p.rotation = rotation;
        p.vx = 0.0;
        p.vy = 0.0;
        p
    }

    #[test]
    fn thrust_accelerates_along_facing() {
        let mut p = player_at(0.5, 0.5, 0.0);
        p.input = PlayerInput {
            up: true,
            ..Default::default()
        };

        PhysicsSystem::step_player(&mut p);

        assert!(p.x > 0.5);
        assert_approx_eq!(p.y, 0.5, 1e-6);
        assert_approx_eq!(p.vx, THRUST_ACCELERATION * DRAG, 1e-7);
    }

    #[test]
    fn speed_never_exceeds_cap_under_sustained_thrust() {
        let mut p = player_at(0.5, 0.5, 1.3);
        p.input = PlayerInput {
            up: true,
            left: true,
            ..Default::default()
        };

        for _ in 0..500 {
            PhysicsSystem::step_player(&mut p);
            let speed = (p.vx * p.vx + p.vy * p.vy).sqrt();
            assert!(
                speed <= MAX_SPEED + 1e-6,
                "speed {speed} exceeded cap {MAX_SPEED}"
            );
        }
    }

    #[test]
    fn momentum_continues_and_decays_without_thrust() {
        let mut p = player_at(0.5, 0.5, 0.0);
        p.vx = 0.01;

        PhysicsSystem::step_player(&mut p);
        assert_approx_eq!(p.x, 0.51, 1e-6);
        assert_approx_eq!(p.vx, 0.01 * DRAG, 1e-7);

        let mut coasted = p.clone();
        for _ in 0..2_000 {
            PhysicsSystem::step_player(&mut coasted);
        }
        assert!(coasted.vx.abs() < 1e-4, "drag never brought player to rest");
    }

    #[test]
    fn players_wrap_at_arena_edges() {
        let mut p = player_at(0.94, 0.5, 0.0);
        p.vx = 0.012;
        p.input = PlayerInput::default();

        PhysicsSystem::step_player(&mut p);

        assert!(p.x >= ARENA_MIN && p.x < ARENA_MAX);
        assert!(p.x < 0.1, "expected reentry near the opposite edge");
    }

    #[test]
    fn rotation_steps_by_fixed_amount() {
        let mut p = player_at(0.5, 0.5, 1.0);
        p.input = PlayerInput {
            right: true,
            ..Default::default()
        };
        PhysicsSystem::step_player(&mut p);
        assert_approx_eq!(p.rotation, 1.0 + TURN_STEP, 1e-6);

        p.input = PlayerInput {
            left: true,
            ..Default::default()
        };
        PhysicsSystem::step_player(&mut p);
        assert_approx_eq!(p.rotation, 1.0, 1e-6);
    }

    #[test]
    fn bullets_advance_and_despawn_past_max_distance() {
        let shooter = player_at(0.5, 0.5, 0.0);
        let mut bullets = vec![Bullet::fired_by(&shooter, 1, 1)];

        PhysicsSystem::step_bullets(&mut bullets);
        assert_eq!(bullets.len(), 1);
        assert_approx_eq!(bullets[0].distance_traveled, BULLET_SPEED, 1e-6);

        let ticks_to_expire = (BULLET_MAX_DISTANCE / BULLET_SPEED).ceil() as usize;
        for _ in 0..ticks_to_expire {
            PhysicsSystem::step_bullets(&mut bullets);
        }
        assert!(bullets.is_empty(), "bullet outlived its max distance");
    }

    #[test]
    fn bullets_wrap_over_the_full_range() {
        let shooter = player_at(0.97, 0.5, 0.0);
        let mut bullets = vec![Bullet::fired_by(&shooter, 1, 1)];

        for _ in 0..3 {
            PhysicsSystem::step_bullets(&mut bullets);
        }

        let b = &bullets[0];
        assert!(b.x >= BULLET_WRAP_MIN && b.x < BULLET_WRAP_MAX);
    }
}
