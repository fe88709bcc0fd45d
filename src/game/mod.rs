//! Game simulation modules

pub mod combat;
pub mod physics;
pub mod player;
pub mod room;
pub mod shield;
pub mod snapshot;
pub mod stage;

pub use player::PlayerState;
pub use room::{GameRoom, JoinError, RoomCmd, RoomHandle, RoomRegistry};
