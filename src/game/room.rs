//! Room state, authoritative tick loop, and room registry

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::{secs_to_ticks, SIMULATION_TPS, SNAPSHOT_TPS, TICK_DURATION_MICROS};
use crate::ws::protocol::{
    AttackDirection, AttackKind, Character, GameEvent, PlayerInput, RoomInfo, ServerMsg,
};

use super::combat::{AttackStats, CombatSystem};
use super::physics::{PhysicsSystem, StepOutcome};
use super::player::{ActiveAttack, PlayerState};
use super::shield::{ShieldEvent, BLOCK_KNOCKBACK_FACTOR};
use super::snapshot::SnapshotBuilder;
use super::stage::Stage;

/// Dodge invulnerability window (seconds)
pub const DODGE_DURATION_SECS: f32 = 0.3;
/// Cooldown between dodges (seconds)
pub const DODGE_COOLDOWN_SECS: f32 = 1.0;
/// How long a room that never saw a player may idle before teardown
pub const EMPTY_ROOM_GRACE_SECS: f32 = 60.0;

/// Why a join was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("room is full")]
    RoomFull,
    #[error("already in this room")]
    AlreadyJoined,
}

/// Commands sent from player sessions to the room task
#[derive(Debug)]
pub enum RoomCmd {
    Join {
        player_id: Uuid,
        character: Character,
        reply: oneshot::Sender<Result<(), JoinError>>,
    },
    Leave {
        player_id: Uuid,
    },
    Input {
        player_id: Uuid,
        input: PlayerInput,
    },
}

/// Room state (owned by the room task)
pub struct RoomState {
    pub id: String,
    pub name: String,
    pub max_players: usize,
    pub tick: u64,
    pub players: HashMap<Uuid, PlayerState>,
    pub stage: Stage,
    /// Set once the first player joins
    pub started: bool,
    /// Set when the terminal game-end has been broadcast
    pub game_over: bool,
}

impl RoomState {
    fn new(id: String, name: String, max_players: usize, stage: Stage) -> Self {
        Self {
            id,
            name,
            max_players,
            tick: 0,
            players: HashMap::new(),
            stage,
            started: false,
            game_over: false,
        }
    }

    /// Count players still holding lives
    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| !p.eliminated).count()
    }

    /// Smallest spawn slot not currently in use
    fn next_spawn_slot(&self) -> usize {
        (0..self.max_players)
            .find(|slot| !self.players.values().any(|p| p.spawn_slot == *slot))
            .unwrap_or(0)
    }
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: String,
    pub name: String,
    pub cmd_tx: mpsc::Sender<RoomCmd>,
    pub events_tx: broadcast::Sender<ServerMsg>,
    pub max_players: usize,
    /// The arena this room simulates; clients need its geometry on join
    pub stage: Arc<Stage>,
    player_count: Arc<AtomicUsize>,
    started: Arc<AtomicBool>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            player_count: self.player_count(),
            max_players: self.max_players,
            game_started: self.is_started(),
        }
    }
}

/// Registry of all active rooms, keyed by room id. Rooms are created lazily
/// on first join and remove themselves when the last player leaves.
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
    max_players: usize,
}

impl RoomRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            max_players,
        }
    }

    pub fn get(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    /// Fetch a room, spawning its task first if it does not exist yet
    pub fn get_or_create(self: &Arc<Self>, id: &str, name: Option<String>) -> RoomHandle {
        match self.rooms.entry(id.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let name = name.unwrap_or_else(|| id.to_string());
                let (room, handle) = GameRoom::new(id.to_string(), name, self.max_players);
                entry.insert(handle.clone());

                let registry = Arc::clone(self);
                let room_id = id.to_string();
                tokio::spawn(async move {
                    room.run().await;
                    registry.remove(&room_id);
                    info!(room_id = %room_id, "Room removed from registry");
                });

                handle
            }
        }
    }

    pub fn remove(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.remove(id).map(|(_, h)| h)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }

    pub fn room_list(&self) -> Vec<RoomInfo> {
        self.rooms.iter().map(|r| r.value().info()).collect()
    }
}

/// The authoritative game room
pub struct GameRoom {
    state: RoomState,
    cmd_rx: mpsc::Receiver<RoomCmd>,
    events_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    pending_events: Vec<GameEvent>,
    player_count: Arc<AtomicUsize>,
    started: Arc<AtomicBool>,
    /// True once anyone has joined; an empty room then means teardown
    had_players: bool,
}

impl GameRoom {
    /// Create a room and its handle
    pub fn new(id: String, name: String, max_players: usize) -> (Self, RoomHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (events_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicBool::new(false));
        let stage = Stage::default();

        let handle = RoomHandle {
            id: id.clone(),
            name: name.clone(),
            cmd_tx,
            events_tx: events_tx.clone(),
            max_players,
            stage: Arc::new(stage.clone()),
            player_count: player_count.clone(),
            started: started.clone(),
        };

        let snapshot_interval = SIMULATION_TPS / SNAPSHOT_TPS;
        let room = Self {
            state: RoomState::new(id, name, max_players, stage),
            cmd_rx,
            events_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            pending_events: Vec::new(),
            player_count,
            started,
            had_players: false,
        };

        (room, handle)
    }

    /// Run the authoritative tick loop
    pub async fn run(mut self) {
        info!(room_id = %self.state.id, "Room started");

        let tick_duration = Duration::from_micros(TICK_DURATION_MICROS);
        let mut ticker = interval(tick_duration);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            // Apply input events that arrived between ticks
            self.process_commands();

            // Run simulation tick
            self.run_tick();

            // Broadcast state on the snapshot cadence
            if self.snapshot_builder.should_send() {
                let events = std::mem::take(&mut self.pending_events);
                let snapshot = self.snapshot_builder.build(
                    self.state.tick,
                    &self.state.players,
                    self.state.started,
                    events,
                );
                let _ = self.events_tx.send(snapshot);
            }

            // Teardown once the last player has left, or if nobody ever
            // arrived within the grace period
            if self.state.players.is_empty()
                && (self.had_players || self.state.tick > secs_to_ticks(EMPTY_ROOM_GRACE_SECS))
            {
                info!(room_id = %self.state.id, "Room empty, closing");
                break;
            }
        }
    }

    /// Drain all pending commands from sessions
    fn process_commands(&mut self) {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            match cmd {
                RoomCmd::Join {
                    player_id,
                    character,
                    reply,
                } => {
                    let result = self.handle_join(player_id, character);
                    let _ = reply.send(result);
                }
                RoomCmd::Leave { player_id } => self.handle_leave(player_id),
                RoomCmd::Input { player_id, input } => self.handle_input(player_id, input),
            }
        }
    }

    fn handle_join(&mut self, player_id: Uuid, character: Character) -> Result<(), JoinError> {
        if self.state.players.contains_key(&player_id) {
            return Err(JoinError::AlreadyJoined);
        }
        if self.state.players.len() >= self.state.max_players {
            return Err(JoinError::RoomFull);
        }

        let slot = self.state.next_spawn_slot();
        let player = PlayerState::new(player_id, character, slot, &self.state.stage);
        self.state.players.insert(player_id, player);
        self.had_players = true;
        self.state.started = true;
        self.started.store(true, Ordering::Relaxed);
        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);

        let _ = self.events_tx.send(ServerMsg::PlayerJoined {
            player_id,
            character,
        });
        self.snapshot_builder.force_next();

        info!(
            room_id = %self.state.id,
            player_id = %player_id,
            player_count = self.state.players.len(),
            "Player joined room"
        );

        Ok(())
    }

    fn handle_leave(&mut self, player_id: Uuid) {
        if self.state.players.remove(&player_id).is_none() {
            return;
        }
        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);

        let _ = self.events_tx.send(ServerMsg::PlayerLeft { player_id });
        self.snapshot_builder.force_next();

        info!(
            room_id = %self.state.id,
            player_id = %player_id,
            "Player left room"
        );

        // A mid-game leave can decide the match
        self.check_game_end();
    }

    /// Apply one input event. Unknown or eliminated players are ignored.
    fn handle_input(&mut self, player_id: Uuid, input: PlayerInput) {
        let tick = self.state.tick;

        let Some(player) = self.state.players.get_mut(&player_id) else {
            debug!(player_id = %player_id, "Input for unknown player ignored");
            return;
        };
        if player.eliminated {
            return;
        }

        match input {
            PlayerInput::Move { left, right, block } => {
                let stats = player.stats();
                if left {
                    player.vel_x = -stats.move_speed;
                    player.facing_right = false;
                } else if right {
                    player.vel_x = stats.move_speed;
                    player.facing_right = true;
                } else {
                    player.vel_x = 0.0;
                }
                player.block_held = block;
            }
            PlayerInput::Jump => {
                if player.grounded {
                    player.vel_y = player.stats().jump_power;
                    player.grounded = false;
                }
            }
            PlayerInput::Attack { attack, direction } => {
                self.handle_attack(player_id, attack, direction);
            }
            PlayerInput::Dodge => {
                if !player.is_dodging(tick)
                    && !player.is_attacking(tick)
                    && tick >= player.dodge_ready_at_tick
                {
                    player.dodge_until_tick = tick + secs_to_ticks(DODGE_DURATION_SECS);
                    player.dodge_ready_at_tick = tick + secs_to_ticks(DODGE_COOLDOWN_SECS);
                }
            }
        }
    }

    /// Start a swing and resolve hits against every other live player
    fn handle_attack(&mut self, attacker_id: Uuid, kind: AttackKind, direction: AttackDirection) {
        let tick = self.state.tick;
        let stats = AttackStats::for_kind(kind);

        // Forward swings face the nearest opponent
        let nearest_opponent_x = {
            let Some(attacker) = self.state.players.get(&attacker_id) else {
                return;
            };
            let ax = attacker.x;
            self.state
                .players
                .values()
                .filter(|p| p.player_id != attacker_id && !p.eliminated)
                .min_by(|a, b| {
                    (a.x - ax)
                        .abs()
                        .partial_cmp(&(b.x - ax).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|p| p.x)
        };

        let (ax, ay, facing_right) = {
            let Some(attacker) = self.state.players.get_mut(&attacker_id) else {
                return;
            };

            if attacker.is_attacking(tick) || attacker.shield.is_blocking() {
                return;
            }
            if kind == AttackKind::Special && tick < attacker.special_ready_at_tick {
                return;
            }

            match direction {
                AttackDirection::Left => attacker.facing_right = false,
                AttackDirection::Right => attacker.facing_right = true,
                AttackDirection::Forward => {
                    if let Some(ox) = nearest_opponent_x {
                        attacker.facing_right = ox > attacker.x;
                    }
                }
                AttackDirection::Up | AttackDirection::Down => {}
            }

            attacker.attack = Some(ActiveAttack {
                kind,
                direction,
                ends_at_tick: tick + secs_to_ticks(stats.duration_secs),
            });
            if kind == AttackKind::Special {
                attacker.special_ready_at_tick = tick + secs_to_ticks(stats.cooldown_secs);
            }

            (attacker.x, attacker.y, attacker.facing_right)
        };

        let (hx, hy) = CombatSystem::hitbox_center(ax, ay, facing_right, direction, stats.range);

        for target in self.state.players.values_mut() {
            if target.player_id == attacker_id || target.eliminated {
                continue;
            }
            if !CombatSystem::in_range(target.x, target.y, hx, hy, direction, stats.range) {
                continue;
            }

            if target.is_dodging(tick) {
                self.pending_events.push(GameEvent::Dodged {
                    attacker_id,
                    target_id: target.player_id,
                });
                continue;
            }

            let damage = CombatSystem::damage_for(kind, target.health);

            if target.shield.absorbs_hits() {
                let (shield_damage, broke) = target.shield.absorb(damage, tick);
                CombatSystem::apply_knockback(
                    target,
                    ax,
                    stats.knockback * BLOCK_KNOCKBACK_FACTOR,
                    direction,
                );
                self.pending_events.push(GameEvent::Blocked {
                    attacker_id,
                    target_id: target.player_id,
                    shield_damage,
                });
                if broke {
                    self.pending_events.push(GameEvent::ShieldBroken {
                        player_id: target.player_id,
                    });
                }
            } else {
                target.health += damage;
                CombatSystem::apply_knockback(target, ax, stats.knockback, direction);
                self.pending_events.push(GameEvent::Hit {
                    attacker_id,
                    target_id: target.player_id,
                    damage,
                    attack: kind,
                    direction,
                });
            }
        }
    }

    /// Run a single simulation tick
    fn run_tick(&mut self) {
        self.state.tick += 1;
        let tick = self.state.tick;
        let mut fell: Vec<Uuid> = Vec::new();

        {
            let RoomState {
                stage, players, ..
            } = &mut self.state;

            for player in players.values_mut() {
                if player.eliminated {
                    continue;
                }

                player.expire_windows(tick);

                if player.shield.step(player.block_held, tick) == Some(ShieldEvent::Broke) {
                    self.pending_events.push(GameEvent::ShieldBroken {
                        player_id: player.player_id,
                    });
                }

                if PhysicsSystem::step(player, stage) == StepOutcome::FellOff {
                    fell.push(player.player_id);
                }
            }
        }

        let mut any_eliminated = false;
        {
            let RoomState {
                id, stage, players, ..
            } = &mut self.state;

            for player_id in fell {
                let Some(player) = players.get_mut(&player_id) else {
                    continue;
                };
                player.respawn(stage);
                self.pending_events.push(GameEvent::Ko {
                    player_id,
                    lives_remaining: player.lives,
                });

                if player.lives == 0 {
                    player.eliminated = true;
                    any_eliminated = true;
                    self.pending_events
                        .push(GameEvent::Eliminated { player_id });
                    info!(room_id = %id, player_id = %player_id, "Player eliminated");
                }
                self.snapshot_builder.force_next();
            }
        }

        if any_eliminated {
            self.check_game_end();
        }
    }

    /// Broadcast the terminal game-end exactly once when at most one
    /// player remains alive.
    fn check_game_end(&mut self) {
        if self.state.game_over || self.state.players.is_empty() {
            return;
        }

        if self.state.alive_count() <= 1 {
            self.state.game_over = true;
            let winner = self
                .state
                .players
                .values()
                .find(|p| !p.eliminated)
                .map(|p| p.player_id);
            let _ = self.events_tx.send(ServerMsg::GameEnd { winner });
            self.snapshot_builder.force_next();
            info!(
                room_id = %self.state.id,
                winner = ?winner,
                "Game over"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_room() -> (GameRoom, RoomHandle) {
        GameRoom::new("test".to_string(), "Test Arena".to_string(), 4)
    }

    fn join(room: &mut GameRoom, character: Character) -> Uuid {
        let id = Uuid::new_v4();
        room.handle_join(id, character).expect("join failed");
        id
    }

    fn place(room: &mut GameRoom, id: Uuid, x: f32, y: f32) {
        let p = room.state.players.get_mut(&id).unwrap();
        p.x = x;
        p.y = y;
    }

    #[test]
    fn join_caps_at_max_players() {
        let (mut room, _handle) = make_room();
        for _ in 0..4 {
            join(&mut room, Character::RedFighter);
        }
        assert_eq!(
            room.handle_join(Uuid::new_v4(), Character::Archer),
            Err(JoinError::RoomFull)
        );

        let existing = *room.state.players.keys().next().unwrap();
        assert_eq!(
            room.handle_join(existing, Character::Archer),
            Err(JoinError::AlreadyJoined)
        );
    }

    #[test]
    fn forward_attack_hits_in_range_target_only() {
        let (mut room, _handle) = make_room();
        let attacker = join(&mut room, Character::RedFighter);
        let near = join(&mut room, Character::GreenTank);
        let far = join(&mut room, Character::Archer);

        place(&mut room, attacker, 100.0, 300.0);
        place(&mut room, near, 150.0, 310.0);
        place(&mut room, far, 400.0, 300.0);
        room.state.players.get_mut(&attacker).unwrap().facing_right = true;

        room.handle_attack(attacker, AttackKind::Normal, AttackDirection::Forward);

        let near_p = &room.state.players[&near];
        assert_eq!(near_p.health, 5.0);
        assert!(near_p.vel_x > 0.0, "knocked away from the attacker");
        assert!(!near_p.grounded);
        assert_eq!(room.state.players[&far].health, 0.0);
        assert!(room
            .pending_events
            .iter()
            .any(|e| matches!(e, GameEvent::Hit { target_id, .. } if *target_id == near)));
    }

    #[test]
    fn attack_rejected_while_blocking_or_mid_swing() {
        let (mut room, _handle) = make_room();
        let attacker = join(&mut room, Character::RedFighter);
        let target = join(&mut room, Character::GreenTank);
        place(&mut room, attacker, 100.0, 300.0);
        place(&mut room, target, 150.0, 300.0);

        // Blocking disallows attacking
        room.state
            .players
            .get_mut(&attacker)
            .unwrap()
            .shield
            .step(true, 0);
        room.handle_attack(attacker, AttackKind::Normal, AttackDirection::Forward);
        assert!(room.state.players[&attacker].attack.is_none());
        assert_eq!(room.state.players[&target].health, 0.0);

        // Drop the block, swing, then try to swing again mid-swing
        room.state
            .players
            .get_mut(&attacker)
            .unwrap()
            .shield
            .step(false, 0);
        room.handle_attack(attacker, AttackKind::Normal, AttackDirection::Forward);
        assert_eq!(room.state.players[&target].health, 5.0);
        room.handle_attack(attacker, AttackKind::Normal, AttackDirection::Forward);
        assert_eq!(
            room.state.players[&target].health, 5.0,
            "second swing rejected while the first is active"
        );
    }

    #[test]
    fn blocked_hit_drains_shield_instead_of_health() {
        let (mut room, _handle) = make_room();
        let attacker = join(&mut room, Character::RedFighter);
        let target = join(&mut room, Character::GreenTank);
        place(&mut room, attacker, 100.0, 300.0);
        place(&mut room, target, 150.0, 300.0);

        let t = room.state.players.get_mut(&target).unwrap();
        t.block_held = true;
        t.shield.step(true, 0);

        room.handle_attack(attacker, AttackKind::Normal, AttackDirection::Forward);

        let t = &room.state.players[&target];
        assert_eq!(t.health, 0.0);
        assert!(t.shield.health() < 100.0);
        assert!(room
            .pending_events
            .iter()
            .any(|e| matches!(e, GameEvent::Blocked { target_id, .. } if *target_id == target)));
    }

    #[test]
    fn dodging_target_takes_no_damage() {
        let (mut room, _handle) = make_room();
        let attacker = join(&mut room, Character::RedFighter);
        let target = join(&mut room, Character::Stickman);
        place(&mut room, attacker, 100.0, 300.0);
        place(&mut room, target, 150.0, 300.0);
        room.state.players.get_mut(&target).unwrap().dodge_until_tick = 100;

        room.handle_attack(attacker, AttackKind::Normal, AttackDirection::Forward);

        let t = &room.state.players[&target];
        assert_eq!(t.health, 0.0);
        assert_eq!(t.vel_x, 0.0);
        assert!(room
            .pending_events
            .iter()
            .any(|e| matches!(e, GameEvent::Dodged { target_id, .. } if *target_id == target)));
    }

    #[test]
    fn final_fall_eliminates_once_and_ends_the_game() {
        let (mut room, handle) = make_room();
        let mut rx = handle.events_tx.subscribe();

        let survivor = join(&mut room, Character::RedFighter);
        let faller = join(&mut room, Character::GreenTank);
        room.state.players.get_mut(&faller).unwrap().lives = 1;
        place(&mut room, faller, 50.0, 700.0);

        room.run_tick();

        let f = &room.state.players[&faller];
        assert!(f.eliminated);
        assert_eq!(f.lives, 0);
        assert!(room.state.game_over);
        assert!(room
            .pending_events
            .iter()
            .any(|e| matches!(e, GameEvent::Eliminated { player_id } if *player_id == faller)));

        // Exactly one GameEnd naming the survivor
        let mut game_ends = 0;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::GameEnd { winner } = msg {
                assert_eq!(winner, Some(survivor));
                game_ends += 1;
            }
        }
        assert_eq!(game_ends, 1);

        // Eliminated players receive no further physics updates
        let (x, y) = {
            let f = &room.state.players[&faller];
            (f.x, f.y)
        };
        for _ in 0..10 {
            room.run_tick();
        }
        let f = &room.state.players[&faller];
        assert_eq!((f.x, f.y), (x, y));

        // And no second GameEnd ever fires
        while let Ok(msg) = rx.try_recv() {
            assert!(!matches!(msg, ServerMsg::GameEnd { .. }));
        }
    }

    #[test]
    fn non_final_fall_costs_a_life_and_respawns() {
        let (mut room, _handle) = make_room();
        let faller = join(&mut room, Character::BlueWitch);
        let _other = join(&mut room, Character::Archer);
        place(&mut room, faller, 50.0, 700.0);

        room.run_tick();

        let f = &room.state.players[&faller];
        assert_eq!(f.lives, 2);
        assert!(!f.eliminated);
        assert_eq!((f.x, f.y), room.state.stage.spawn_position(f.spawn_slot));
        assert!(!room.state.game_over);
    }

    #[test]
    fn mid_game_leave_decides_the_match() {
        let (mut room, handle) = make_room();
        let mut rx = handle.events_tx.subscribe();

        let stayer = join(&mut room, Character::RedFighter);
        let leaver = join(&mut room, Character::GreenTank);

        room.handle_leave(leaver);

        assert!(room.state.game_over);
        let mut winner_seen = None;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::GameEnd { winner } = msg {
                winner_seen = Some(winner);
            }
        }
        assert_eq!(winner_seen, Some(Some(stayer)));
    }

    #[tokio::test]
    async fn room_actor_replies_to_joins_and_rejects_overflow() {
        let registry = Arc::new(RoomRegistry::new(4));
        let handle = registry.get_or_create("arena", Some("Arena".to_string()));
        let mut rx = handle.events_tx.subscribe();

        for _ in 0..4 {
            let (tx, reply) = oneshot::channel();
            handle
                .cmd_tx
                .send(RoomCmd::Join {
                    player_id: Uuid::new_v4(),
                    character: Character::RedFighter,
                    reply: tx,
                })
                .await
                .unwrap();
            assert_eq!(reply.await.unwrap(), Ok(()));
        }

        let (tx, reply) = oneshot::channel();
        handle
            .cmd_tx
            .send(RoomCmd::Join {
                player_id: Uuid::new_v4(),
                character: Character::Archer,
                reply: tx,
            })
            .await
            .unwrap();
        assert_eq!(reply.await.unwrap(), Err(JoinError::RoomFull));

        let msg = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no broadcast")
            .expect("channel closed");
        assert!(matches!(msg, ServerMsg::PlayerJoined { .. }));
    }

    #[tokio::test]
    async fn empty_room_tears_itself_down() {
        let registry = Arc::new(RoomRegistry::new(4));
        let handle = registry.get_or_create("short-lived", None);

        let player_id = Uuid::new_v4();
        let (tx, reply) = oneshot::channel();
        handle
            .cmd_tx
            .send(RoomCmd::Join {
                player_id,
                character: Character::Stickman,
                reply: tx,
            })
            .await
            .unwrap();
        assert_eq!(reply.await.unwrap(), Ok(()));
        assert_eq!(registry.active_rooms(), 1);

        handle
            .cmd_tx
            .send(RoomCmd::Leave { player_id })
            .await
            .unwrap();

        for _ in 0..100 {
            if registry.get("short-lived").is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("room was not torn down after the last player left");
    }
}
