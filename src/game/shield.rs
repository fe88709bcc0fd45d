//! Blocking and shield state machine
//!
//! Idle -> Blocking -> (Broken -> Regenerating) -> Idle. The shield drains
//! while the block input is held, force-breaks after a maximum hold, and a
//! break locks blocking out until a recovery deadline restores it to full.

use crate::util::time::{secs_to_ticks, tick_delta};

/// Shield pool bounds
pub const SHIELD_MAX: f32 = 100.0;
/// Drain rate while blocking (per second)
pub const SHIELD_DRAIN_PER_SEC: f32 = 20.0;
/// Passive regeneration rate while not blocking (per second)
pub const SHIELD_REGEN_PER_SEC: f32 = 10.0;
/// Longest continuous block before a forced break (seconds)
pub const MAX_BLOCK_SECS: f32 = 5.0;
/// Lockout after a break before the shield restores to full (seconds)
pub const BREAK_RECOVERY_SECS: f32 = 10.0;
/// Fraction of incoming damage a shield absorbs
pub const BLOCK_ABSORB_FACTOR: f32 = 0.5;
/// Knockback scale applied to a blocking target
pub const BLOCK_KNOCKBACK_FACTOR: f32 = 0.2;

/// Observable shield transitions surfaced as game events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShieldEvent {
    Broke,
    Recovered,
}

/// Per-player shield pool and block bookkeeping
#[derive(Debug, Clone)]
pub struct ShieldState {
    health: f32,
    blocking: bool,
    /// Tick the current block hold began
    block_started_tick: u64,
    /// Recovery deadline while broken
    broken_until_tick: Option<u64>,
}

impl ShieldState {
    pub fn new() -> Self {
        Self {
            health: SHIELD_MAX,
            blocking: false,
            block_started_tick: 0,
            broken_until_tick: None,
        }
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn is_broken(&self) -> bool {
        self.broken_until_tick.is_some()
    }

    /// Whether the shield currently absorbs incoming hits
    pub fn absorbs_hits(&self) -> bool {
        self.blocking && self.health > 0.0
    }

    /// Advance the state machine by one tick given the held block input.
    pub fn step(&mut self, block_held: bool, tick: u64) -> Option<ShieldEvent> {
        let dt = tick_delta();

        // Broken: blocking is locked out until the recovery deadline
        if let Some(deadline) = self.broken_until_tick {
            self.blocking = false;
            if tick >= deadline {
                self.health = SHIELD_MAX;
                self.broken_until_tick = None;
                return Some(ShieldEvent::Recovered);
            }
            return None;
        }

        if block_held && self.health > 0.0 {
            if !self.blocking {
                self.blocking = true;
                self.block_started_tick = tick;
            } else if tick - self.block_started_tick >= secs_to_ticks(MAX_BLOCK_SECS) {
                return Some(self.break_shield(tick));
            }

            self.health = (self.health - SHIELD_DRAIN_PER_SEC * dt).max(0.0);
            if self.health <= 0.0 {
                return Some(self.break_shield(tick));
            }
        } else {
            self.blocking = false;
            self.health = (self.health + SHIELD_REGEN_PER_SEC * dt).min(SHIELD_MAX);
        }

        None
    }

    /// Absorb a blocked hit. Returns (shield damage dealt, whether it broke).
    pub fn absorb(&mut self, damage: f32, tick: u64) -> (f32, bool) {
        let shield_damage = damage * BLOCK_ABSORB_FACTOR;
        self.health = (self.health - shield_damage).max(0.0);
        if self.health <= 0.0 {
            self.break_shield(tick);
            (shield_damage, true)
        } else {
            (shield_damage, false)
        }
    }

    /// Restore to full and clear all timers (respawn)
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn break_shield(&mut self, tick: u64) -> ShieldEvent {
        self.blocking = false;
        self.health = 0.0;
        self.broken_until_tick = Some(tick + secs_to_ticks(BREAK_RECOVERY_SECS));
        ShieldEvent::Broke
    }
}

impl Default for ShieldState {
    fn default() -> Self {
        Self::new()
    }
}
