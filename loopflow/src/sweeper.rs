use std::{sync::Arc, time::Duration};

use log::{debug, error, info};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    flow_table::{FlowEntry, FlowTable},
    flows::flow_features::FlowFeatures,
};

/// Evicts idle flows from the table and exports their features.
#[derive(Clone)]
pub struct Sweeper {
    flow_table: Arc<FlowTable>,
    idle_timeout_us: i64,
    export_channel: UnboundedSender<FlowFeatures>,
}

impl Sweeper {
    pub fn new(
        flow_table: Arc<FlowTable>,
        idle_timeout: Duration,
        export_channel: UnboundedSender<FlowFeatures>,
    ) -> Self {
        Self {
            flow_table,
            idle_timeout_us: i64::try_from(idle_timeout.as_micros()).unwrap_or(i64::MAX),
            export_channel,
        }
    }

    /// Evicts every flow idle at `now_us` and exports it.
    ///
    /// Returns the number of flows exported.
    pub fn sweep(&self, now_us: i64) -> usize {
        let expired = self.flow_table.sweep_idle(now_us, self.idle_timeout_us);
        if expired.is_empty() {
            return 0;
        }
        let exported = self.export_flows(expired);
        info!(
            "Exported {} idle flows, {} still active",
            exported,
            self.flow_table.len()
        );
        exported
    }

    /// Evicts and exports every remaining flow regardless of idle time.
    pub fn drain(&self) -> usize {
        if self.flow_table.is_empty() {
            return 0;
        }
        let remaining = self.flow_table.drain_all();
        debug!("Draining {} remaining flows", remaining.len());
        self.export_flows(remaining)
    }

    /// Computes and exports each flow on its own, a failing flow is logged
    /// and skipped without affecting the others.
    pub(crate) fn export_flows(&self, flows: Vec<FlowEntry>) -> usize {
        let mut exported = 0;
        for flow in flows {
            let flow_key = flow.flow_key;
            debug!("Flow {} expired, computing features", flow_key);

            match FlowFeatures::from_entry(flow) {
                Ok(features) => {
                    if let Err(e) = self.export_channel.send(features) {
                        error!("Failed to send flow {}: {}", flow_key, e);
                    } else {
                        exported += 1;
                    }
                }
                Err(e) => error!("Skipping flow {}: {}", flow_key, e),
            }
        }
        exported
    }
}
