use crate::packet_features::PacketFeatures;

use super::util::{FeatureStats, FlowFeature};

/// Packet lengths per direction plus the extremes of the whole flow.
#[derive(Clone, Debug)]
pub struct PacketLengthStats {
    pub fwd_packet_len: FeatureStats,
    pub bwd_packet_len: FeatureStats,
}

impl PacketLengthStats {
    pub fn new() -> Self {
        PacketLengthStats {
            fwd_packet_len: FeatureStats::new(),
            bwd_packet_len: FeatureStats::new(),
        }
    }

    pub fn flow_count(&self) -> u64 {
        self.fwd_packet_len.get_count() + self.bwd_packet_len.get_count()
    }

    pub fn flow_total(&self) -> f64 {
        self.fwd_packet_len.get_total() + self.bwd_packet_len.get_total()
    }

    pub fn flow_min(&self) -> f64 {
        match (
            self.fwd_packet_len.get_count() > 0,
            self.bwd_packet_len.get_count() > 0,
        ) {
            (true, true) => self
                .fwd_packet_len
                .get_min()
                .min(self.bwd_packet_len.get_min()),
            (true, false) => self.fwd_packet_len.get_min(),
            (false, true) => self.bwd_packet_len.get_min(),
            (false, false) => 0.0,
        }
    }

    pub fn flow_max(&self) -> f64 {
        self.fwd_packet_len
            .get_max()
            .max(self.bwd_packet_len.get_max())
    }
}

impl FlowFeature for PacketLengthStats {
    fn update(&mut self, packet: &PacketFeatures, is_forward: bool) {
        if is_forward {
            self.fwd_packet_len.add_value(packet.length as f64);
        } else {
            self.bwd_packet_len.add_value(packet.length as f64);
        }
    }

    fn close(&mut self) {}
}
