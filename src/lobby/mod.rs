//! Pre-game battle lobbies - character select, ready-up, start negotiation

pub mod room;

pub use room::{Lobby, LobbyError, LobbyRegistry};
