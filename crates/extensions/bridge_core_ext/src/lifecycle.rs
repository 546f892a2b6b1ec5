//! Periodic eviction and restart recovery (§4.6). The sweep itself is pure
//! state-store surgery; `bridge_mapper` is responsible for scheduling it
//! (nominally hourly) and for persisting the resulting deletions.
use crate::ids::PacketId;
use crate::resolver::ChannelTracker;
use crate::state::MessageState;
use crate::store::MessageStore;
use clock::Timestamp;
use time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct EvictionConfig {
    pub max_age: Duration,
    pub max_size: usize,
}

impl EvictionConfig {
    pub const DEFAULT_MAX_AGE: Duration = Duration::hours(24);
    pub const DEFAULT_MAX_SIZE: usize = 10_000;
}

impl Default for EvictionConfig {
    fn default() -> Self {
        EvictionConfig {
            max_age: Self::DEFAULT_MAX_AGE,
            max_size: Self::DEFAULT_MAX_SIZE,
        }
    }
}

/// Delete entries older than `max_age`, then trim oldest-first until the
/// store fits `max_size` (§4.6 steps 1-2). Returns the evicted ids so the
/// caller can persist the deletions (step 3).
pub fn sweep(store: &mut MessageStore, config: &EvictionConfig, now: Timestamp) -> Vec<PacketId> {
    let mut evicted = Vec::new();

    let expired: Vec<PacketId> = store
        .values()
        .filter(|state| now - state.last_update_at > config.max_age)
        .map(|state| state.packet_id)
        .collect();
    for packet_id in expired {
        store.remove(packet_id);
        evicted.push(packet_id);
    }

    if store.len() > config.max_size {
        let mut by_age: Vec<(PacketId, Timestamp)> = store
            .values()
            .map(|state| (state.packet_id, state.last_update_at))
            .collect();
        by_age.sort_by_key(|(_, last_update_at)| *last_update_at);
        let excess = store.len() - config.max_size;
        for (packet_id, _) in by_age.into_iter().take(excess) {
            store.remove(packet_id);
            evicted.push(packet_id);
        }
    }

    evicted
}

/// Recompute `last_seen_packet_id` per channel from a rehydrated set of
/// states: the packet with the largest `created_at` on each channel
/// (§4.4 restart recovery).
pub fn recompute_channel_tracker(states: &[MessageState]) -> ChannelTracker {
    let mut tracker = ChannelTracker::new();
    for state in states {
        let supersedes = match tracker.last_seen(state.channel_index) {
            Some((_, last_at)) => state.created_at > last_at,
            None => true,
        };
        if supersedes {
            tracker.record(state.channel_index, state.packet_id, state.created_at);
        }
    }
    tracker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use time::macros::datetime;

    fn state_at(packet_id: u32, channel: u32, created_at: Timestamp) -> MessageState {
        MessageState::new(
            PacketId(packet_id),
            NodeId(1),
            channel,
            "hi".to_string(),
            created_at,
        )
    }

    #[test]
    fn evicts_entries_older_than_max_age() {
        let mut store = MessageStore::new();
        store.insert(state_at(1, 0, datetime!(2026-01-01 00:00:00 UTC)));
        store.insert(state_at(2, 0, datetime!(2026-01-02 00:00:00 UTC)));
        let config = EvictionConfig {
            max_age: Duration::hours(24),
            max_size: 10_000,
        };
        let evicted = sweep(&mut store, &config, datetime!(2026-01-02 01:00:00 UTC));
        assert_eq!(evicted, vec![PacketId(1)]);
        assert!(store.contains(PacketId(2)));
    }

    #[test]
    fn trims_oldest_first_when_over_max_size() {
        let mut store = MessageStore::new();
        store.insert(state_at(1, 0, datetime!(2026-01-01 00:00:00 UTC)));
        store.insert(state_at(2, 0, datetime!(2026-01-01 01:00:00 UTC)));
        store.insert(state_at(3, 0, datetime!(2026-01-01 02:00:00 UTC)));
        let config = EvictionConfig {
            max_age: Duration::hours(24 * 365),
            max_size: 2,
        };
        let evicted = sweep(&mut store, &config, datetime!(2026-01-01 02:00:00 UTC));
        assert_eq!(evicted, vec![PacketId(1)]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn channel_tracker_recomputes_max_created_at_per_channel() {
        let states = vec![
            state_at(1, 0, datetime!(2026-01-01 00:00:00 UTC)),
            state_at(2, 0, datetime!(2026-01-01 05:00:00 UTC)),
            state_at(3, 1, datetime!(2026-01-01 02:00:00 UTC)),
        ];
        let tracker = recompute_channel_tracker(&states);
        assert_eq!(tracker.last_seen(0).map(|(id, _)| id), Some(PacketId(2)));
        assert_eq!(tracker.last_seen(1).map(|(id, _)| id), Some(PacketId(3)));
    }
}
