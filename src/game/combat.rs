//! Hit detection, life decrement and death bookkeeping

use std::collections::HashSet;

use uuid::Uuid;

use super::entity::{Bullet, Elimination, EliminationReason, Player};
use super::geometry::circles_overlap;
use super::{BULLET_RADIUS, INVINCIBILITY_MS, PLAYER_RADIUS};

/// One registered hit, reported to clients for impact effects
#[derive(Debug, Clone)]
pub struct Hit {
    pub player_id: Uuid,
    pub bullet_owner_id: Uuid,
    pub tick: u64,
}

/// Resolves bullet/player collisions and eliminations for one tick
pub struct CollisionEngine;

impl CollisionEngine {
    /// Test every bullet against every alive player.
    ///
    /// A bullet resolves at most one hit per tick; bullets are tested in
    /// spawn order and players in join order, which fixes the
    /// elimination order when several players die on the same tick.
    /// Spent bullets are removed only after the full pair loop so a hit
    /// this tick never hides a bullet from the remaining players.
    pub fn resolve(
        players: &mut [Player],
        bullets: &mut Vec<Bullet>,
        now: u64,
        tick: u64,
        hits: &mut Vec<Hit>,
        eliminations: &mut Vec<Elimination>,
    ) {
        let mut spent: HashSet<u64> = HashSet::new();

        for bullet in bullets.iter() {
            for player in players.iter_mut() {
                if !player.alive || bullet.owner_id == player.id {
                    continue;
                }
                if player.is_invincible(now) {
                    continue;
                }
                if !circles_overlap(
                    bullet.x,
                    bullet.y,
                    BULLET_RADIUS,
                    player.x,
                    player.y,
                    PLAYER_RADIUS,
                ) {
                    continue;
                }

                spent.insert(bullet.id);
                player.lives -= 1;
                player.invincible_until = now + INVINCIBILITY_MS;

                hits.push(Hit {
                    player_id: player.id,
                    bullet_owner_id: bullet.owner_id,
                    tick,
                });

                if player.lives == 0 {
                    player.alive = false;
                    player.eliminated_at = Some(tick);
                    eliminations.push(Elimination {
                        player_id: player.id,
                        name: player.name.clone(),
                        tick,
                        reason: EliminationReason::Killed,
                        killed_by: Some(bullet.owner_id),
                    });
                }

                // One hit per bullet per tick
                break;
            }
        }

        bullets.retain(|b| !spent.contains(&b.id));
    }
}
