//! Snapshot cadence and game-state message building

use std::collections::HashMap;
use uuid::Uuid;

use crate::ws::protocol::{GameEvent, PlayerSnapshot, ServerMsg};

use super::player::PlayerState;

/// Builds snapshots for network transmission. The simulation runs faster
/// than the snapshot rate; this tracks when the next one is due.
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (membership changes, KOs, game end)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a game-state message
    pub fn build(
        &self,
        tick: u64,
        players: &HashMap<Uuid, PlayerState>,
        game_started: bool,
        events: Vec<GameEvent>,
    ) -> ServerMsg {
        let players: HashMap<Uuid, PlayerSnapshot> = players
            .iter()
            .map(|(id, p)| (*id, p.snapshot(tick)))
            .collect();

        ServerMsg::GameState {
            tick,
            players,
            game_started,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::stage::Stage;
    use crate::ws::protocol::Character;

    #[test]
    fn sends_on_interval_and_on_force() {
        let mut builder = SnapshotBuilder::new(3);
        assert!(!builder.should_send());
        assert!(!builder.should_send());
        assert!(builder.should_send());
        assert!(!builder.should_send());

        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn snapshot_keyed_by_player_id() {
        let stage = Stage::default();
        let builder = SnapshotBuilder::new(2);
        let id = Uuid::new_v4();
        let mut players = HashMap::new();
        players.insert(id, PlayerState::new(id, Character::BlueWitch, 0, &stage));

        let msg = builder.build(7, &players, true, Vec::new());
        match msg {
            ServerMsg::GameState {
                tick,
                players,
                game_started,
                events,
            } => {
                assert_eq!(tick, 7);
                assert!(game_started);
                assert!(events.is_empty());
                let snap = players.get(&id).expect("player present");
                assert_eq!(snap.character, Character::BlueWitch);
                assert_eq!(snap.lives, 3);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
