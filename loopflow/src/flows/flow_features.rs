use serde::Serialize;

use crate::{
    error::{Result, SessionError},
    flow_table::FlowEntry,
};

use super::features::{
    iat_stats::IATStats,
    packet_stats::PacketLengthStats,
    util::FlowFeature,
};

/// The feature row of one completed flow.
///
/// Field order and names are the output columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowFeatures {
    pub protocol: u8,
    pub src_port: u16,
    pub dst_port: u16,
    pub fwd_pkt_count: u64,
    pub bwd_pkt_count: u64,
    pub total_pkt_count: u64,
    pub fwd_bytes_sum: u64,
    pub bwd_bytes_sum: u64,
    pub total_bytes_sum: u64,
    /// Microseconds between the first and the last packet.
    pub flow_duration: f64,
    pub fwd_iat_mean: f64,
    pub fwd_iat_std: f64,
    pub bwd_iat_mean: f64,
    pub bwd_iat_std: f64,
    pub fwd_pkt_len_mean: f64,
    pub bwd_pkt_len_mean: f64,
    pub pkt_len_max: u32,
    pub pkt_len_min: u32,
}

impl FlowFeatures {
    /// Computes the features of an evicted flow.
    ///
    /// Packets are put in timestamp order first; the sort is stable so equal
    /// timestamps keep their arrival order. A packet is forward when its own
    /// key equals the entry's key. The identity columns come from the first
    /// packet after sorting.
    pub fn from_entry(mut entry: FlowEntry) -> Result<Self> {
        entry.packets.sort_by_key(|packet| packet.timestamp_us);

        let (first, last) = match (entry.packets.first(), entry.packets.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(SessionError::EmptyFlow(entry.flow_key)),
        };

        let mut packet_len_stats = PacketLengthStats::new();
        let mut iat_stats = IATStats::new();
        for packet in &entry.packets {
            let is_forward = packet.flow_key == entry.flow_key;
            packet_len_stats.update(packet, is_forward);
            iat_stats.update(packet, is_forward);
        }
        packet_len_stats.close();
        iat_stats.close();

        let fwd_len = &packet_len_stats.fwd_packet_len;
        let bwd_len = &packet_len_stats.bwd_packet_len;

        Ok(FlowFeatures {
            protocol: first.flow_key.protocol,
            src_port: first.flow_key.source_port,
            dst_port: first.flow_key.destination_port,
            fwd_pkt_count: fwd_len.get_count(),
            bwd_pkt_count: bwd_len.get_count(),
            total_pkt_count: packet_len_stats.flow_count(),
            fwd_bytes_sum: fwd_len.get_total() as u64,
            bwd_bytes_sum: bwd_len.get_total() as u64,
            total_bytes_sum: packet_len_stats.flow_total() as u64,
            flow_duration: (last.timestamp_us - first.timestamp_us) as f64,
            fwd_iat_mean: iat_stats.fwd_iat.get_mean(),
            fwd_iat_std: iat_stats.fwd_iat.get_std(),
            bwd_iat_mean: iat_stats.bwd_iat.get_mean(),
            bwd_iat_std: iat_stats.bwd_iat.get_std(),
            fwd_pkt_len_mean: fwd_len.get_mean(),
            bwd_pkt_len_mean: bwd_len.get_mean(),
            pkt_len_max: packet_len_stats.flow_max() as u32,
            pkt_len_min: packet_len_stats.flow_min() as u32,
        })
    }
}
