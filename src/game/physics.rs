//! Player physics - gravity, friction, platform landing, stage bounds

use crate::util::time::tick_delta;
use crate::ws::protocol::Character;

use super::player::PlayerState;
use super::stage::{Platform, Stage};

/// Downward acceleration in px/s^2 (y grows downward)
pub const GRAVITY: f32 = 1200.0;
/// Horizontal velocity multiplier per tick while grounded
pub const GROUND_FRICTION: f32 = 0.8;
/// Horizontal velocity multiplier per tick while airborne
pub const AIR_RESISTANCE: f32 = 0.98;

/// Body AABB dimensions, shared by every fighter
pub const BODY_WIDTH: f32 = 40.0;
pub const BODY_HEIGHT: f32 = 60.0;

/// Movement constants per fighter. Jump power is negative (upward).
#[derive(Debug, Clone, Copy)]
pub struct CharacterStats {
    pub move_speed: f32,
    pub jump_power: f32,
}

impl CharacterStats {
    pub fn for_character(character: Character) -> Self {
        match character {
            Character::RedFighter => Self {
                move_speed: 200.0,
                jump_power: -500.0,
            },
            Character::FinnHuman => Self {
                move_speed: 220.0,
                jump_power: -480.0,
            },
            Character::BlueWitch => Self {
                move_speed: 180.0,
                jump_power: -520.0,
            },
            Character::Archer => Self {
                move_speed: 190.0,
                jump_power: -450.0,
            },
            Character::Stickman => Self {
                move_speed: 240.0,
                jump_power: -430.0,
            },
            Character::GreenTank => Self {
                move_speed: 150.0,
                jump_power: -400.0,
            },
        }
    }
}

/// Result of one physics step for one player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    OnStage,
    /// Crossed the fall line; the caller owes a respawn
    FellOff,
}

/// Physics system for integrating player movement against the stage
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one player by one fixed timestep. Eliminated players must be
    /// filtered out by the caller before this runs.
    pub fn step(player: &mut PlayerState, stage: &Stage) -> StepOutcome {
        let dt = tick_delta();

        if !player.grounded {
            player.vel_y += GRAVITY * dt;
        }

        if player.grounded {
            player.vel_x *= GROUND_FRICTION;
        } else {
            player.vel_x *= AIR_RESISTANCE;
        }

        player.x += player.vel_x * dt;
        player.y += player.vel_y * dt;

        // Land on the first platform we fall onto, or stay grounded while
        // still standing on one
        let mut on_ground = false;
        for platform in &stage.platforms {
            if let Some(snap_y) = Self::landing_snap(player, platform) {
                player.y = snap_y;
                player.vel_y = 0.0;
                on_ground = true;
                break;
            }
            if player.grounded && Self::supported_by(player, platform) {
                on_ground = true;
                break;
            }
        }
        player.grounded = on_ground;

        // Stage walls stop horizontal movement
        let half_w = player.width / 2.0;
        player.x = player.x.clamp(half_w, stage.width - half_w);

        if player.y > stage.fall_y {
            StepOutcome::FellOff
        } else {
            StepOutcome::OnStage
        }
    }

    /// Landing test: AABB overlap while falling, with the player's top edge
    /// still above the platform top (so side passes don't snap). Returns the
    /// y the player's center snaps to.
    fn landing_snap(player: &PlayerState, platform: &Platform) -> Option<f32> {
        let half_w = player.width / 2.0;
        let half_h = player.height / 2.0;

        let overlaps = player.x + half_w > platform.left()
            && player.x - half_w < platform.right()
            && player.y + half_h > platform.top()
            && player.y - half_h < platform.bottom();

        if overlaps && player.vel_y > 0.0 && player.y - half_h < platform.top() {
            Some(platform.top() - half_h)
        } else {
            None
        }
    }

    /// A grounded player keeps standing on a platform while horizontally
    /// over it with their feet at its top. Walking off the edge or gaining
    /// upward velocity (jump, knockback) ends the support.
    fn supported_by(player: &PlayerState, platform: &Platform) -> bool {
        let half_w = player.width / 2.0;
        let half_h = player.height / 2.0;

        player.vel_y >= 0.0
            && player.x + half_w > platform.left()
            && player.x - half_w < platform.right()
            && (player.y + half_h - platform.top()).abs() <= 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::stage::Stage;
    use uuid::Uuid;

    fn test_player(x: f32, y: f32) -> PlayerState {
        let stage = Stage::default();
        let mut p = PlayerState::new(Uuid::new_v4(), Character::GreenTank, 0, &stage);
        p.x = x;
        p.y = y;
        p
    }

    #[test]
    fn airborne_player_accelerates_downward() {
        let stage = Stage::default();
        let mut p = test_player(400.0, 100.0);
        let vy_before = p.vel_y;

        PhysicsSystem::step(&mut p, &stage);

        assert!(p.vel_y > vy_before);
        assert!(!p.grounded);
    }

    #[test]
    fn falling_onto_ground_snaps_and_zeroes_vertical_velocity() {
        let stage = Stage::default();
        // Just above the ground platform top (y=400), falling fast
        let mut p = test_player(400.0, 368.0);
        p.vel_y = 300.0;

        PhysicsSystem::step(&mut p, &stage);

        assert!(p.grounded);
        assert_eq!(p.vel_y, 0.0);
        assert_eq!(p.y, 400.0 - BODY_HEIGHT / 2.0);
    }

    #[test]
    fn rising_player_passes_through_platforms() {
        let stage = Stage::default();
        // Inside the top ledge's AABB but moving upward
        let mut p = test_player(400.0, 245.0);
        p.vel_y = -400.0;

        PhysicsSystem::step(&mut p, &stage);

        assert!(!p.grounded);
        assert!(p.vel_y < 0.0);
    }

    #[test]
    fn horizontal_position_clamped_to_stage() {
        let stage = Stage::default();
        let mut p = test_player(790.0, 100.0);
        p.vel_x = 5000.0;

        PhysicsSystem::step(&mut p, &stage);

        assert_eq!(p.x, stage.width - BODY_WIDTH / 2.0);
    }

    #[test]
    fn crossing_fall_line_reports_fell_off() {
        let stage = Stage::default();
        let mut p = test_player(50.0, 645.0);
        p.vel_y = 600.0;

        let outcome = PhysicsSystem::step(&mut p, &stage);

        assert_eq!(outcome, StepOutcome::FellOff);
    }

    #[test]
    fn standing_player_stays_grounded() {
        let stage = Stage::default();
        let mut p = test_player(400.0, 400.0 - BODY_HEIGHT / 2.0);
        p.grounded = true;

        for _ in 0..10 {
            PhysicsSystem::step(&mut p, &stage);
        }

        assert!(p.grounded);
        assert_eq!(p.vel_y, 0.0);
    }

    #[test]
    fn walking_off_a_ledge_loses_ground_support() {
        let stage = Stage::default();
        // Standing on the left ledge (spans x 140..260, top y=330)
        let mut p = test_player(150.0, 330.0 - BODY_HEIGHT / 2.0);
        p.grounded = true;
        p.x = 100.0; // now fully past the ledge's left edge

        PhysicsSystem::step(&mut p, &stage);

        assert!(!p.grounded);
    }

    #[test]
    fn ground_friction_bleeds_horizontal_speed() {
        let stage = Stage::default();
        let mut p = test_player(400.0, 400.0 - BODY_HEIGHT / 2.0);
        p.grounded = true;
        p.vel_x = 100.0;

        PhysicsSystem::step(&mut p, &stage);

        assert!(p.vel_x.abs() < 100.0 * GROUND_FRICTION + 1e-3);
    }
}
