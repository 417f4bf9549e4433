use dashmap::{mapref::entry::Entry, DashMap};
use log::debug;

use crate::packet_features::{FlowKey, PacketFeatures};

/// The packet history of one live flow.
///
/// Always holds at least one packet, it is created together with its first.
#[derive(Debug, Clone)]
pub struct FlowEntry {
    pub flow_key: FlowKey,
    /// Packets in arrival order.
    pub packets: Vec<PacketFeatures>,
    pub last_timestamp_us: i64,
}

impl FlowEntry {
    pub fn new(packet: PacketFeatures) -> Self {
        FlowEntry {
            flow_key: packet.flow_key,
            last_timestamp_us: packet.timestamp_us,
            packets: vec![packet],
        }
    }

    fn push(&mut self, packet: PacketFeatures) {
        // Capture order is near-monotonic only, a late straggler must not pull the deadline back
        self.last_timestamp_us = self.last_timestamp_us.max(packet.timestamp_us);
        self.packets.push(packet);
    }

    /// Whether no packet was seen for longer than `idle_timeout_us` before `now_us`.
    pub fn is_idle(&self, now_us: i64, idle_timeout_us: i64) -> bool {
        now_us.saturating_sub(self.last_timestamp_us) > idle_timeout_us
    }

    pub fn first_timestamp_us(&self) -> i64 {
        self.packets
            .iter()
            .map(|packet| packet.timestamp_us)
            .min()
            .unwrap_or(self.last_timestamp_us)
    }
}

/// Concurrent map of live flows.
///
/// The capture feed is the only caller of [`FlowTable::append`]; sweeps and
/// the final drain are the only paths that remove entries. Every removal
/// hands the entry out by value, so a later packet for the same key always
/// starts a fresh entry.
pub struct FlowTable {
    flow_map: DashMap<FlowKey, FlowEntry>,
    bidirectional: bool,
}

impl FlowTable {
    /// Creates an empty table. With `bidirectional` set, reply packets are
    /// merged into the entry of the opposite direction when one is live.
    pub fn new(bidirectional: bool) -> Self {
        Self {
            flow_map: DashMap::new(),
            bidirectional,
        }
    }

    /// Appends a packet to its flow, creating the flow if it is unseen.
    ///
    /// Returns true when a new entry was created.
    pub fn append(&self, packet: PacketFeatures) -> bool {
        if self.bidirectional {
            if let Some(mut flow) = self.flow_map.get_mut(&packet.flow_key.reversed()) {
                flow.push(packet);
                return false;
            }
        }

        match self.flow_map.entry(packet.flow_key) {
            Entry::Occupied(mut flow) => {
                flow.get_mut().push(packet);
                false
            }
            Entry::Vacant(slot) => {
                debug!("Creating new flow: {}", packet.flow_key);
                slot.insert(FlowEntry::new(packet));
                true
            }
        }
    }

    /// Removes and returns every flow idle for longer than `idle_timeout_us`.
    ///
    /// Idleness is checked again under the shard lock at removal, so a flow
    /// that received a packet after the scan stays in the table.
    pub fn sweep_idle(&self, now_us: i64, idle_timeout_us: i64) -> Vec<FlowEntry> {
        // Keys are collected first, removing while iterating would deadlock on the shard
        let idle_keys: Vec<FlowKey> = self
            .flow_map
            .iter()
            .filter(|flow| flow.value().is_idle(now_us, idle_timeout_us))
            .map(|flow| *flow.key())
            .collect();

        let expired: Vec<FlowEntry> = idle_keys
            .into_iter()
            .filter_map(|key| {
                self.flow_map
                    .remove_if(&key, |_, flow| flow.is_idle(now_us, idle_timeout_us))
                    .map(|(_, flow)| flow)
            })
            .collect();

        debug!("Swept {} idle flows", expired.len());
        expired
    }

    /// Removes and returns all flows, in order of first packet arrival.
    pub fn drain_all(&self) -> Vec<FlowEntry> {
        let keys: Vec<FlowKey> = self.flow_map.iter().map(|flow| *flow.key()).collect();

        let mut drained: Vec<FlowEntry> = keys
            .into_iter()
            .filter_map(|key| self.flow_map.remove(&key).map(|(_, flow)| flow))
            .collect();
        drained.sort_by_key(|flow| flow.first_timestamp_us());

        debug!("Drained {} flows", drained.len());
        drained
    }

    pub fn len(&self) -> usize {
        self.flow_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flow_map.is_empty()
    }
}
