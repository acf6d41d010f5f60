//! Cooldown- and grace-period-gated bullet spawning

use super::entity::Player;
use super::{GAME_START_GRACE_MS, SHOOT_COOLDOWN_MS};

/// Gates bullet spawning per player
pub struct WeaponSystem;

impl WeaponSystem {
    /// Whether this player may fire right now.
    ///
    /// No firing during the opening splash window, and at least the
    /// cooldown must have elapsed since the player's last shot.
    pub fn can_fire(player: &Player, now: u64, started_at: u64) -> bool {
        now.saturating_sub(started_at) >= GAME_START_GRACE_MS
            && player.input.shooting
            && now.saturating_sub(player.last_shot) >= SHOOT_COOLDOWN_MS
    }

    /// Record a successful shot. The caller appends the bullet.
    pub fn mark_fired(player: &mut Player, now: u64) {
        player.last_shot = now;
    }
}
