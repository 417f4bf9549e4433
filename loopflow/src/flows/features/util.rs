use crate::packet_features::PacketFeatures;

/// A statistic accumulated over the packets of one flow, in timestamp order.
pub trait FlowFeature {
    fn update(&mut self, packet: &PacketFeatures, is_forward: bool);

    /// Called once after the last packet.
    fn close(&mut self);
}

/// Summary of a series of values.
///
/// Extremes read as 0 while the series is empty. The standard deviation is
/// the population one.
#[derive(Clone, Debug, Default)]
pub struct FeatureStats {
    count: u64,
    total: f64,
    extremes: Option<(f64, f64)>,
    mean: f64,
    // Sum of squared distances from the running mean (Welford)
    squared_distance: f64,
}

impl FeatureStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.extremes = Some(match self.extremes {
            Some((min, max)) => (min.min(value), max.max(value)),
            None => (value, value),
        });

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.squared_distance += delta * (value - self.mean);
    }

    pub fn get_count(&self) -> u64 {
        self.count
    }

    pub fn get_total(&self) -> f64 {
        self.total
    }

    pub fn get_min(&self) -> f64 {
        self.extremes.map_or(0.0, |(min, _)| min)
    }

    pub fn get_max(&self) -> f64 {
        self.extremes.map_or(0.0, |(_, max)| max)
    }

    pub fn get_mean(&self) -> f64 {
        self.mean
    }

    pub fn get_std(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.squared_distance / self.count as f64).sqrt()
    }
}
