//! Static stage geometry - platforms and bounds

use serde::{Deserialize, Serialize};

/// A static axis-aligned platform, anchored at its center
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Platform {
    pub fn left(&self) -> f32 {
        self.x - self.width / 2.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn top(&self) -> f32 {
        self.y - self.height / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// The arena every room simulates: fixed platform set plus stage bounds.
/// Y grows downward; falling past `fall_y` costs a life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub width: f32,
    pub height: f32,
    /// Fall line below the visible stage
    pub fall_y: f32,
    pub platforms: Vec<Platform>,
    /// Base spawn position; players stagger right of it by join order
    pub spawn_x: f32,
    pub spawn_y: f32,
    /// Horizontal offset between staggered spawn slots
    pub spawn_step: f32,
}

impl Stage {
    /// Spawn position for the nth player to join
    pub fn spawn_position(&self, slot: usize) -> (f32, f32) {
        (self.spawn_x + slot as f32 * self.spawn_step, self.spawn_y)
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            fall_y: 650.0,
            platforms: vec![
                // ground
                Platform {
                    x: 400.0,
                    y: 425.0,
                    width: 600.0,
                    height: 50.0,
                },
                // left ledge
                Platform {
                    x: 200.0,
                    y: 340.0,
                    width: 120.0,
                    height: 20.0,
                },
                // right ledge
                Platform {
                    x: 600.0,
                    y: 340.0,
                    width: 120.0,
                    height: 20.0,
                },
                // top ledge
                Platform {
                    x: 400.0,
                    y: 240.0,
                    width: 100.0,
                    height: 20.0,
                },
            ],
            spawn_x: 400.0,
            spawn_y: 200.0,
            spawn_step: 100.0,
        }
    }
}
