use crate::packet_features::PacketFeatures;

use super::util::{FeatureStats, FlowFeature};

/// Inter-arrival times per direction, in microseconds.
///
/// A direction with fewer than two packets has the series `[0]`, so its mean
/// and standard deviation are both zero.
#[derive(Clone, Debug)]
pub struct IATStats {
    pub fwd_iat: FeatureStats,
    pub bwd_iat: FeatureStats,
    last_timestamp_fwd_us: Option<i64>,
    last_timestamp_bwd_us: Option<i64>,
}

impl IATStats {
    pub fn new() -> Self {
        IATStats {
            fwd_iat: FeatureStats::new(),
            bwd_iat: FeatureStats::new(),
            last_timestamp_fwd_us: None,
            last_timestamp_bwd_us: None,
        }
    }
}

impl FlowFeature for IATStats {
    fn update(&mut self, packet: &PacketFeatures, is_forward: bool) {
        let (iat, last_timestamp_us) = if is_forward {
            (&mut self.fwd_iat, &mut self.last_timestamp_fwd_us)
        } else {
            (&mut self.bwd_iat, &mut self.last_timestamp_bwd_us)
        };

        if let Some(last) = *last_timestamp_us {
            iat.add_value((packet.timestamp_us - last) as f64);
        }
        *last_timestamp_us = Some(packet.timestamp_us);
    }

    fn close(&mut self) {
        for iat in [&mut self.fwd_iat, &mut self.bwd_iat] {
            if iat.get_count() == 0 {
                iat.add_value(0.0);
            }
        }
    }
}
