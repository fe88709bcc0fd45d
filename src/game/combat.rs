//! Combat system - attack stats, hitbox placement, damage and knockback

use crate::ws::protocol::{AttackDirection, AttackKind};

use super::player::PlayerState;

/// Cross-axis tolerance for a hit (px)
pub const HIT_CROSS_AXIS_RANGE: f32 = 80.0;
/// Knockback gained per point of accumulated damage
pub const KNOCKBACK_DAMAGE_SCALE: f32 = 2.0;
/// Hard cap on knockback magnitude
pub const KNOCKBACK_CAP: f32 = 800.0;
/// Fraction of the target's damage total added to special-attack damage
pub const SPECIAL_DAMAGE_HEALTH_SCALE: f32 = 0.2;

/// Attack tuning per kind
#[derive(Debug, Clone, Copy)]
pub struct AttackStats {
    /// Base damage per hit
    pub damage: f32,
    /// Base knockback impulse
    pub knockback: f32,
    /// Reach of the swing
    pub range: f32,
    /// Swing duration (seconds); the attacker is committed for this long
    pub duration_secs: f32,
    /// Cooldown between uses (seconds)
    pub cooldown_secs: f32,
}

impl AttackStats {
    pub fn for_kind(kind: AttackKind) -> Self {
        match kind {
            AttackKind::Normal => Self {
                damage: 5.0,
                knockback: 200.0,
                range: 80.0,
                duration_secs: 0.3,
                cooldown_secs: 0.0,
            },
            AttackKind::Special => Self {
                damage: 15.0,
                knockback: 400.0,
                range: 100.0,
                duration_secs: 0.5,
                cooldown_secs: 0.5,
            },
        }
    }
}

/// Combat system for resolving melee swings
pub struct CombatSystem;

impl CombatSystem {
    /// Center of the attack hitbox, offset half the range from the attacker
    /// along the attack axis. Forward resolves against facing.
    pub fn hitbox_center(
        attacker_x: f32,
        attacker_y: f32,
        facing_right: bool,
        direction: AttackDirection,
        range: f32,
    ) -> (f32, f32) {
        let half = range / 2.0;
        match direction {
            AttackDirection::Up => (attacker_x, attacker_y - half),
            AttackDirection::Down => (attacker_x, attacker_y + half),
            AttackDirection::Left => (attacker_x - half, attacker_y),
            AttackDirection::Right => (attacker_x + half, attacker_y),
            AttackDirection::Forward => {
                let sign = if facing_right { 1.0 } else { -1.0 };
                (attacker_x + sign * half, attacker_y)
            }
        }
    }

    /// Rectangular distance test: within range on the attack axis and within
    /// the cross-axis tolerance on the other.
    pub fn in_range(
        target_x: f32,
        target_y: f32,
        hitbox_x: f32,
        hitbox_y: f32,
        direction: AttackDirection,
        range: f32,
    ) -> bool {
        let (primary, cross) = match direction {
            AttackDirection::Up | AttackDirection::Down => (
                (target_y - hitbox_y).abs(),
                (target_x - hitbox_x).abs(),
            ),
            _ => (
                (target_x - hitbox_x).abs(),
                (target_y - hitbox_y).abs(),
            ),
        };
        primary < range && cross < HIT_CROSS_AXIS_RANGE
    }

    /// Damage an attack deals to a given target. Specials scale with the
    /// target's accumulated damage.
    pub fn damage_for(kind: AttackKind, target_health: f32) -> f32 {
        let stats = AttackStats::for_kind(kind);
        match kind {
            AttackKind::Normal => stats.damage,
            AttackKind::Special => stats.damage + target_health * SPECIAL_DAMAGE_HEALTH_SCALE,
        }
    }

    /// Knockback magnitude: grows with the target's damage total, capped.
    pub fn knockback_strength(target_health: f32, base_knockback: f32) -> f32 {
        (target_health * KNOCKBACK_DAMAGE_SCALE + base_knockback).min(KNOCKBACK_CAP)
    }

    /// Apply directional knockback to the target and knock them airborne.
    pub fn apply_knockback(
        target: &mut PlayerState,
        attacker_x: f32,
        base_knockback: f32,
        direction: AttackDirection,
    ) {
        let strength = Self::knockback_strength(target.health, base_knockback);

        match direction {
            AttackDirection::Up => {
                target.vel_x = 0.0;
                target.vel_y = -strength;
            }
            AttackDirection::Down => {
                target.vel_x = 0.0;
                target.vel_y = strength * 0.5;
            }
            AttackDirection::Left => {
                target.vel_x = -strength;
                target.vel_y = -strength * 0.3;
            }
            AttackDirection::Right => {
                target.vel_x = strength;
                target.vel_y = -strength * 0.3;
            }
            AttackDirection::Forward => {
                let sign = if target.x > attacker_x { 1.0 } else { -1.0 };
                target.vel_x = sign * strength;
                target.vel_y = -strength * 0.3;
            }
        }

        target.grounded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::stage::Stage;
    use crate::ws::protocol::Character;
    use uuid::Uuid;

    #[test]
    fn forward_hitbox_offsets_by_half_range() {
        // Attacker at x=100 facing right with range 80 -> hitbox at x=140
        let (hx, hy) =
            CombatSystem::hitbox_center(100.0, 300.0, true, AttackDirection::Forward, 80.0);
        assert_eq!((hx, hy), (140.0, 300.0));

        // Defender at x=150, small y offset: hit
        assert!(CombatSystem::in_range(
            150.0,
            310.0,
            hx,
            hy,
            AttackDirection::Forward,
            80.0
        ));
        // Defender at x=400: out of reach
        assert!(!CombatSystem::in_range(
            400.0,
            300.0,
            hx,
            hy,
            AttackDirection::Forward,
            80.0
        ));
    }

    #[test]
    fn vertical_attacks_swap_axes() {
        let (hx, hy) =
            CombatSystem::hitbox_center(400.0, 300.0, true, AttackDirection::Up, 80.0);
        assert_eq!((hx, hy), (400.0, 260.0));

        // Directly above within range
        assert!(CombatSystem::in_range(
            400.0,
            220.0,
            hx,
            hy,
            AttackDirection::Up,
            80.0
        ));
        // Too far sideways even if close vertically
        assert!(!CombatSystem::in_range(
            490.0,
            260.0,
            hx,
            hy,
            AttackDirection::Up,
            80.0
        ));
    }

    #[test]
    fn special_damage_scales_with_target_health() {
        assert_eq!(CombatSystem::damage_for(AttackKind::Normal, 120.0), 5.0);
        assert_eq!(CombatSystem::damage_for(AttackKind::Special, 0.0), 15.0);
        assert_eq!(CombatSystem::damage_for(AttackKind::Special, 100.0), 35.0);
    }

    #[test]
    fn knockback_monotone_in_damage_and_capped() {
        let base = AttackStats::for_kind(AttackKind::Normal).knockback;
        let mut last = 0.0;
        for health in [0.0, 10.0, 50.0, 120.0, 250.0, 400.0, 1000.0] {
            let strength = CombatSystem::knockback_strength(health, base);
            assert!(strength >= last);
            assert!(strength <= KNOCKBACK_CAP);
            last = strength;
        }
        assert_eq!(CombatSystem::knockback_strength(1000.0, base), KNOCKBACK_CAP);
    }

    #[test]
    fn forward_knockback_pushes_away_from_attacker() {
        let stage = Stage::default();
        let mut target = PlayerState::new(Uuid::new_v4(), Character::RedFighter, 0, &stage);
        target.x = 300.0;
        target.grounded = true;

        CombatSystem::apply_knockback(&mut target, 250.0, 200.0, AttackDirection::Forward);

        assert!(target.vel_x > 0.0, "pushed right, away from attacker");
        assert!(target.vel_y < 0.0, "lifted slightly");
        assert!(!target.grounded);
    }
}
