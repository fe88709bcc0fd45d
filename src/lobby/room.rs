//! Battle lobby state machine
//!
//! A lobby is the negotiation room before a match: players join, pick a
//! fighter, ready up, and the host starts the battle once at least two
//! ready players have characters. Unlike game rooms there is no tick loop;
//! every mutation broadcasts the new lobby state.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::ws::protocol::{BattlePlayerInfo, Character, LobbyPlayerInfo, ServerMsg};

/// Ready players required before a battle can start
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Why a lobby operation was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("lobby is full")]
    LobbyFull,
    #[error("battle already started")]
    AlreadyStarted,
    #[error("already in this lobby")]
    AlreadyJoined,
    #[error("only the host can start the battle")]
    NotHost,
    #[error("need at least two ready players with characters")]
    NotEnoughReady,
}

/// A player waiting in a lobby
#[derive(Debug, Clone)]
struct LobbyPlayer {
    player_id: Uuid,
    character: Option<Character>,
    ready: bool,
}

/// Interior lobby state; join order is kept, the earliest joiner is host
#[derive(Debug, Default)]
struct LobbyInner {
    players: Vec<LobbyPlayer>,
    started: bool,
}

/// A pre-game battle lobby
pub struct Lobby {
    pub id: String,
    pub max_players: usize,
    inner: Mutex<LobbyInner>,
    events_tx: broadcast::Sender<ServerMsg>,
}

impl Lobby {
    fn new(id: String, max_players: usize) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            id,
            max_players,
            inner: Mutex::new(LobbyInner::default()),
            events_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }

    pub fn player_count(&self) -> usize {
        self.inner.lock().players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().players.is_empty()
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock().started
    }

    pub fn join(&self, player_id: Uuid) -> Result<(), LobbyError> {
        let mut inner = self.inner.lock();
        if inner.started {
            return Err(LobbyError::AlreadyStarted);
        }
        if inner.players.len() >= self.max_players {
            return Err(LobbyError::LobbyFull);
        }
        if inner.players.iter().any(|p| p.player_id == player_id) {
            return Err(LobbyError::AlreadyJoined);
        }

        inner.players.push(LobbyPlayer {
            player_id,
            character: None,
            ready: false,
        });
        info!(lobby_id = %self.id, player_id = %player_id, "Player joined lobby");
        self.broadcast_state(&inner);
        Ok(())
    }

    /// Remove a player. Host reassigns to the next earliest joiner.
    pub fn leave(&self, player_id: Uuid) {
        let mut inner = self.inner.lock();
        let before = inner.players.len();
        inner.players.retain(|p| p.player_id != player_id);
        if inner.players.len() != before {
            info!(lobby_id = %self.id, player_id = %player_id, "Player left lobby");
            self.broadcast_state(&inner);
        }
    }

    /// Pick a fighter; unknown players are ignored
    pub fn select_character(&self, player_id: Uuid, character: Character) {
        let mut inner = self.inner.lock();
        if inner.started {
            return;
        }
        if let Some(player) = inner.players.iter_mut().find(|p| p.player_id == player_id) {
            player.character = Some(character);
            info!(
                lobby_id = %self.id,
                player_id = %player_id,
                character = character.display_name(),
                "Character selected"
            );
            self.broadcast_state(&inner);
        }
    }

    /// Toggle ready state; unknown players are ignored
    pub fn set_ready(&self, player_id: Uuid, ready: bool) {
        let mut inner = self.inner.lock();
        if inner.started {
            return;
        }
        if let Some(player) = inner.players.iter_mut().find(|p| p.player_id == player_id) {
            player.ready = ready;
            self.broadcast_state(&inner);
        }
    }

    /// Host request to start the battle. Requires at least two ready
    /// players holding characters.
    pub fn start(&self, player_id: Uuid) -> Result<(), LobbyError> {
        let mut inner = self.inner.lock();
        if inner.started {
            return Err(LobbyError::AlreadyStarted);
        }
        match inner.players.first() {
            Some(host) if host.player_id == player_id => {}
            _ => return Err(LobbyError::NotHost),
        }

        let roster: Vec<BattlePlayerInfo> = inner
            .players
            .iter()
            .filter(|p| p.ready)
            .filter_map(|p| {
                p.character.map(|character| BattlePlayerInfo {
                    player_id: p.player_id,
                    character,
                })
            })
            .collect();

        if roster.len() < MIN_PLAYERS_TO_START {
            return Err(LobbyError::NotEnoughReady);
        }

        inner.started = true;
        info!(
            lobby_id = %self.id,
            players = roster.len(),
            "Battle starting"
        );
        let _ = self.events_tx.send(ServerMsg::BattleStart { players: roster });
        self.broadcast_state(&inner);
        Ok(())
    }

    fn broadcast_state(&self, inner: &LobbyInner) {
        let players: Vec<LobbyPlayerInfo> = inner
            .players
            .iter()
            .enumerate()
            .map(|(idx, p)| LobbyPlayerInfo {
                player_id: p.player_id,
                character: p.character,
                ready: p.ready,
                is_host: idx == 0,
            })
            .collect();

        let _ = self.events_tx.send(ServerMsg::LobbyState {
            room_id: self.id.clone(),
            players,
            game_started: inner.started,
        });
    }
}

/// Registry of battle lobbies, keyed by room id. Created lazily on first
/// join; the WebSocket layer removes a lobby once it empties.
pub struct LobbyRegistry {
    lobbies: DashMap<String, Arc<Lobby>>,
    max_players: usize,
}

impl LobbyRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            lobbies: DashMap::new(),
            max_players,
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Lobby>> {
        self.lobbies.get(id).map(|l| l.value().clone())
    }

    pub fn get_or_create(&self, id: &str) -> Arc<Lobby> {
        match self.lobbies.entry(id.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let lobby = Lobby::new(id.to_string(), self.max_players);
                info!(lobby_id = %id, "Lobby created");
                entry.insert(lobby.clone());
                lobby
            }
        }
    }

    /// Tear a lobby down if its last player has left
    pub fn remove_if_empty(&self, id: &str) {
        let removed = self
            .lobbies
            .remove_if(id, |_, lobby| lobby.is_empty())
            .is_some();
        if removed {
            info!(lobby_id = %id, "Empty lobby removed");
        }
    }

    pub fn active_lobbies(&self) -> usize {
        self.lobbies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_up(lobby: &Lobby, player: Uuid, character: Character) {
        lobby.select_character(player, character);
        lobby.set_ready(player, true);
    }

    #[test]
    fn join_rejects_overflow_and_duplicates() {
        let lobby = Lobby::new("duel".to_string(), 2);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(lobby.join(a), Ok(()));
        assert_eq!(lobby.join(a), Err(LobbyError::AlreadyJoined));
        assert_eq!(lobby.join(b), Ok(()));
        assert_eq!(lobby.join(Uuid::new_v4()), Err(LobbyError::LobbyFull));
    }

    #[test]
    fn start_needs_host_and_two_ready_characters() {
        let lobby = Lobby::new("duel".to_string(), 4);
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        lobby.join(host).unwrap();
        lobby.join(guest).unwrap();

        // Nobody is ready yet
        assert_eq!(lobby.start(host), Err(LobbyError::NotEnoughReady));

        ready_up(&lobby, host, Character::RedFighter);
        // Ready without a character does not count
        lobby.set_ready(guest, true);
        assert_eq!(lobby.start(host), Err(LobbyError::NotEnoughReady));

        lobby.select_character(guest, Character::BlueWitch);
        assert_eq!(lobby.start(guest), Err(LobbyError::NotHost));
        assert_eq!(lobby.start(host), Ok(()));
        assert!(lobby.is_started());

        // No double start, no late joins
        assert_eq!(lobby.start(host), Err(LobbyError::AlreadyStarted));
        assert_eq!(lobby.join(Uuid::new_v4()), Err(LobbyError::AlreadyStarted));
    }

    #[test]
    fn host_reassigns_when_the_host_leaves() {
        let lobby = Lobby::new("duel".to_string(), 4);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();
        lobby.join(first).unwrap();
        lobby.join(second).unwrap();
        lobby.join(third).unwrap();

        ready_up(&lobby, second, Character::Archer);
        ready_up(&lobby, third, Character::Stickman);

        lobby.leave(first);
        assert_eq!(lobby.start(third), Err(LobbyError::NotHost));
        assert_eq!(lobby.start(second), Ok(()));
    }

    #[test]
    fn battle_start_broadcasts_the_ready_roster() {
        let lobby = Lobby::new("duel".to_string(), 4);
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let idler = Uuid::new_v4();
        lobby.join(host).unwrap();
        lobby.join(guest).unwrap();
        lobby.join(idler).unwrap();

        ready_up(&lobby, host, Character::GreenTank);
        ready_up(&lobby, guest, Character::FinnHuman);

        let mut rx = lobby.subscribe();
        lobby.start(host).unwrap();

        let mut roster = None;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::BattleStart { players } = msg {
                roster = Some(players);
            }
        }
        let roster = roster.expect("no BattleStart broadcast");
        assert_eq!(roster.len(), 2);
        assert!(roster.iter().all(|p| p.player_id != idler));
    }

    #[test]
    fn registry_creates_lazily_and_removes_empty() {
        let registry = LobbyRegistry::new(4);
        let player = Uuid::new_v4();

        let lobby = registry.get_or_create("casual");
        lobby.join(player).unwrap();
        assert_eq!(registry.active_lobbies(), 1);

        // Not empty yet, removal refuses
        registry.remove_if_empty("casual");
        assert!(registry.get("casual").is_some());

        lobby.leave(player);
        registry.remove_if_empty("casual");
        assert!(registry.get("casual").is_none());
    }
}
