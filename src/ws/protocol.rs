//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::game::stage::Stage;

/// Playable fighters. Wire ids match the character ids the client ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Character {
    /// Balanced all-rounder
    RedFighter,
    /// Quick with a strong jump
    FinnHuman,
    /// Slow mover, highest jump
    BlueWitch,
    /// Mid speed, shallow jump
    Archer,
    /// Fastest on the ground, weakest jump
    Stickman,
    /// Heavy and slow
    GreenTank,
}

impl Character {
    pub fn display_name(&self) -> &'static str {
        match self {
            Character::RedFighter => "Meow Knight",
            Character::FinnHuman => "Finn the Human",
            Character::BlueWitch => "Blue Witch",
            Character::Archer => "Archer",
            Character::Stickman => "Stickman",
            Character::GreenTank => "Green Tank",
        }
    }
}

impl Default for Character {
    fn default() -> Self {
        Self::GreenTank
    }
}

/// Attack flavors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    /// Fast jab, low damage
    Normal,
    /// Slower, longer reach, damage scales with the target's damage total
    Special,
}

/// Direction an attack is thrown in. Forward resolves against facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackDirection {
    Up,
    Down,
    Left,
    Right,
    Forward,
}

/// Continuous player input, applied between ticks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerInput {
    /// Horizontal movement and block hold state for this frame
    Move { left: bool, right: bool, block: bool },
    /// Jump press
    Jump,
    /// Attack press
    Attack {
        attack: AttackKind,
        direction: AttackDirection,
    },
    /// Dodge press
    Dodge,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Create a game room (no-op if it already exists)
    CreateRoom {
        room_id: String,
        room_name: Option<String>,
        character: Character,
    },

    /// Request the list of open rooms
    ListRooms,

    /// Join a game room, creating it lazily if needed
    JoinRoom {
        room_id: String,
        character: Character,
    },

    /// Leave the current game room
    LeaveRoom,

    /// Player input for the current frame
    Input {
        input: PlayerInput,
        /// Client timestamp in milliseconds
        t: u64,
    },

    /// Join a pre-game battle lobby
    JoinLobby { room_id: String },

    /// Leave the current battle lobby
    LeaveLobby,

    /// Pick a fighter in the lobby
    SelectCharacter { character: Character },

    /// Toggle ready state in the lobby
    SetReady { ready: bool },

    /// Host request to start the battle
    StartBattle,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { player_id: Uuid, server_time: u64 },

    /// Confirmation of room creation
    RoomCreated { room_id: String, name: String },

    /// List of open rooms
    RoomList { rooms: Vec<RoomInfo> },

    /// Confirmation of room join, including the arena geometry to render
    RoomJoined {
        room_id: String,
        name: String,
        stage: Stage,
    },

    /// A player joined the room
    PlayerJoined {
        player_id: Uuid,
        character: Character,
    },

    /// A player left the room
    PlayerLeft { player_id: Uuid },

    /// Authoritative game state snapshot (sent at regular intervals)
    GameState {
        /// Server tick number
        tick: u64,
        /// All player states keyed by player id
        players: HashMap<Uuid, PlayerSnapshot>,
        /// Whether the simulation has started
        game_started: bool,
        /// Events that occurred since the last snapshot
        events: Vec<GameEvent>,
    },

    /// Terminal game-end notice
    GameEnd { winner: Option<Uuid> },

    /// Battle lobby state after any lobby mutation
    LobbyState {
        room_id: String,
        players: Vec<LobbyPlayerInfo>,
        game_started: bool,
    },

    /// Battle is starting with this roster
    BattleStart { players: Vec<BattlePlayerInfo> },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Public room listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: String,
    pub name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub game_started: bool,
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player_id: Uuid,
    pub character: Character,
    /// Position (center of the body AABB)
    pub x: f32,
    pub y: f32,
    /// Current velocity
    pub vel_x: f32,
    pub vel_y: f32,
    pub facing_right: bool,
    /// Damage accumulator, percent-style, unbounded upward
    pub health: f32,
    /// Stock count, eliminated at zero
    pub lives: u32,
    /// Shield pool, 0-100
    pub shield_health: f32,
    pub grounded: bool,
    pub attacking: bool,
    pub attack: Option<AttackKind>,
    pub attack_direction: Option<AttackDirection>,
    pub blocking: bool,
    pub dodging: bool,
    pub eliminated: bool,
}

/// Lobby roster entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyPlayerInfo {
    pub player_id: Uuid,
    pub character: Option<Character>,
    pub ready: bool,
    pub is_host: bool,
}

/// Roster entry sent with BattleStart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattlePlayerInfo {
    pub player_id: Uuid,
    pub character: Character,
}

/// Game events (hits, KOs, eliminations)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Attack connected
    Hit {
        attacker_id: Uuid,
        target_id: Uuid,
        damage: f32,
        attack: AttackKind,
        direction: AttackDirection,
    },

    /// Attack absorbed by a shield
    Blocked {
        attacker_id: Uuid,
        target_id: Uuid,
        shield_damage: f32,
    },

    /// Attack avoided by a dodge
    Dodged { attacker_id: Uuid, target_id: Uuid },

    /// Shield depleted or force-broken
    ShieldBroken { player_id: Uuid },

    /// Player fell off the stage and lost a life
    Ko { player_id: Uuid, lives_remaining: u32 },

    /// Player is out of lives
    Eliminated { player_id: Uuid },
}
