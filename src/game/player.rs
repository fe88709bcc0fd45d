//! Authoritative per-player state

use uuid::Uuid;

use crate::ws::protocol::{AttackDirection, AttackKind, Character, PlayerSnapshot};

use super::physics::{CharacterStats, BODY_HEIGHT, BODY_WIDTH};
use super::shield::ShieldState;
use super::stage::Stage;

/// Starting stock count
pub const STARTING_LIVES: u32 = 3;

/// An attack currently being swung
#[derive(Debug, Clone, Copy)]
pub struct ActiveAttack {
    pub kind: AttackKind,
    pub direction: AttackDirection,
    /// Tick at which the swing ends and the player may act again
    pub ends_at_tick: u64,
}

/// Player state in a room (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub player_id: Uuid,
    pub character: Character,

    // Position and movement
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub width: f32,
    pub height: f32,
    pub facing_right: bool,
    pub grounded: bool,

    // Combat
    /// Damage accumulator; grows without bound and scales knockback
    pub health: f32,
    pub lives: u32,
    pub attack: Option<ActiveAttack>,
    /// Earliest tick the next special attack is allowed
    pub special_ready_at_tick: u64,
    /// Dodge window end; 0 when not dodging
    pub dodge_until_tick: u64,
    /// Earliest tick the next dodge is allowed
    pub dodge_ready_at_tick: u64,
    pub shield: ShieldState,
    /// Latest block hold state from input
    pub block_held: bool,
    pub eliminated: bool,

    /// Join-order slot, fixes this player's spawn position
    pub spawn_slot: usize,
}

impl PlayerState {
    pub fn new(player_id: Uuid, character: Character, spawn_slot: usize, stage: &Stage) -> Self {
        let (x, y) = stage.spawn_position(spawn_slot);
        Self {
            player_id,
            character,
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            width: BODY_WIDTH,
            height: BODY_HEIGHT,
            facing_right: true,
            grounded: false,
            health: 0.0,
            lives: STARTING_LIVES,
            attack: None,
            special_ready_at_tick: 0,
            dodge_until_tick: 0,
            dodge_ready_at_tick: 0,
            shield: ShieldState::new(),
            block_held: false,
            eliminated: false,
            spawn_slot,
        }
    }

    pub fn stats(&self) -> CharacterStats {
        CharacterStats::for_character(self.character)
    }

    pub fn is_attacking(&self, tick: u64) -> bool {
        self.attack.map_or(false, |a| tick < a.ends_at_tick)
    }

    pub fn is_dodging(&self, tick: u64) -> bool {
        tick < self.dodge_until_tick
    }

    /// Clear expired attack/dodge windows. Runs at the top of every tick.
    pub fn expire_windows(&mut self, tick: u64) {
        if self.attack.is_some() && !self.is_attacking(tick) {
            self.attack = None;
        }
        if self.dodge_until_tick != 0 && !self.is_dodging(tick) {
            self.dodge_until_tick = 0;
        }
    }

    /// Reset after falling off the stage: costs a life, restores shield,
    /// returns the player to their spawn slot with cleared state.
    pub fn respawn(&mut self, stage: &Stage) {
        self.lives = self.lives.saturating_sub(1);
        self.health = 0.0;
        let (x, y) = stage.spawn_position(self.spawn_slot);
        self.x = x;
        self.y = y;
        self.vel_x = 0.0;
        self.vel_y = 0.0;
        self.grounded = false;
        self.attack = None;
        self.dodge_until_tick = 0;
        self.block_held = false;
        self.shield.reset();
    }

    pub fn snapshot(&self, tick: u64) -> PlayerSnapshot {
        PlayerSnapshot {
            player_id: self.player_id,
            character: self.character,
            x: self.x,
            y: self.y,
            vel_x: self.vel_x,
            vel_y: self.vel_y,
            facing_right: self.facing_right,
            health: self.health,
            lives: self.lives,
            shield_health: self.shield.health(),
            grounded: self.grounded,
            attacking: self.is_attacking(tick),
            attack: self.attack.map(|a| a.kind),
            attack_direction: self.attack.map(|a| a.direction),
            blocking: self.shield.is_blocking(),
            dodging: self.is_dodging(tick),
            eliminated: self.eliminated,
        }
    }
}
