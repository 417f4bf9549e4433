use std::{sync::Arc, time::Duration};

use chrono::Utc;
use log::{debug, error, info};
use tokio::{
    sync::mpsc,
    task,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    args::ExportConfig,
    capture::{run_capture, CaptureStats, PacketClock, PacketSource, StopSignal},
    error::{Result, SessionError},
    flow_table::FlowTable,
    flows::flow_features::FlowFeatures,
    output::OutputWriter,
    sweeper::Sweeper,
};

/// Time base for idle expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepClock {
    /// Live capture, sweeps run on a timer against the current time.
    WallClock,
    /// Replayed capture, sweeps run as packet timestamps advance.
    PacketTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub flows_written: u64,
    pub appended_to_existing: bool,
    pub capture: CaptureStats,
}

impl SessionSummary {
    /// True when the session completed without a single flow.
    pub fn is_empty(&self) -> bool {
        self.flows_written == 0
    }
}

/// One capture session: the flow table and the timing that drives it.
pub struct CaptureSession {
    flow_table: Arc<FlowTable>,
    duration: Duration,
    idle_timeout: Duration,
    sweep_interval: Duration,
    stop: StopSignal,
}

impl CaptureSession {
    /// Validates `config` and prepares an empty session.
    pub fn new(config: &ExportConfig) -> Result<Self> {
        config.validate()?;

        Ok(CaptureSession {
            flow_table: Arc::new(FlowTable::new(config.bidirectional)),
            duration: Duration::from_secs(config.duration),
            idle_timeout: Duration::from_secs(config.idle_timeout),
            sweep_interval: Duration::from_secs(config.sweep_interval),
            stop: StopSignal::new(),
        })
    }

    /// A handle that ends the capture early when triggered, for example on
    /// Ctrl-C.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Runs the session to completion.
    ///
    /// Capture runs on a blocking thread while this task sweeps on every
    /// tick. The capture ends when the stop signal is triggered, when the
    /// source is exhausted, or, on the wall clock only, when the duration
    /// elapses. A replay always runs to the end of the file. Delivery is
    /// then stopped and joined before the remaining flows are drained, so
    /// no flow is computed while a packet for it may still arrive.
    ///
    /// The first error of the output sink fails the session.
    pub async fn run<S>(
        self,
        source: S,
        mut output_writer: OutputWriter,
        clock: SweepClock,
    ) -> Result<SessionSummary>
    where
        S: PacketSource + 'static,
    {
        let start = Instant::now();
        let (sender, mut receiver) = mpsc::unbounded_channel::<FlowFeatures>();
        let sweeper = Sweeper::new(Arc::clone(&self.flow_table), self.idle_timeout, sender);

        // Start the output writer in a separate task
        let output_task = tokio::spawn(async move {
            let mut output_error = None;
            while let Some(flow) = receiver.recv().await {
                if let Err(e) = output_writer.write_flow(&flow) {
                    error!("Error writing flow: {}", e);
                    output_error.get_or_insert(e);
                }
            }

            // Ensure that all remaining flows are flushed properly before ending
            if let Err(e) = output_writer.flush_and_close() {
                error!("Error flushing and closing the writer: {}", e);
                output_error.get_or_insert(e);
            }
            debug!("OutputWriter task finished");
            (output_writer, output_error)
        });

        let packet_clock = match clock {
            SweepClock::PacketTime => Some(PacketClock::new(
                sweeper.clone(),
                i64::try_from(self.sweep_interval.as_micros()).unwrap_or(i64::MAX),
            )),
            SweepClock::WallClock => None,
        };
        let capture_table = Arc::clone(&self.flow_table);
        let capture_stop = self.stop.clone();
        let mut capture_task = task::spawn_blocking(move || {
            run_capture(source, &capture_table, &capture_stop, packet_clock)
        });

        let has_deadline = clock == SweepClock::WallClock;
        if has_deadline {
            info!(
                "Capturing for {} seconds, idle timeout {} seconds",
                self.duration.as_secs(),
                self.idle_timeout.as_secs()
            );
        } else {
            info!(
                "Replaying until the end of the capture, idle timeout {} seconds",
                self.idle_timeout.as_secs()
            );
        }

        let deadline = time::sleep(self.duration);
        tokio::pin!(deadline);
        let mut ticker = time::interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut finished_capture = None;
        loop {
            tokio::select! {
                _ = &mut deadline, if has_deadline => {
                    info!("Capture duration elapsed, stopping capture...");
                    break;
                }
                result = &mut capture_task => {
                    finished_capture = Some(result);
                    break;
                }
                _ = ticker.tick() => {
                    if clock == SweepClock::WallClock {
                        sweeper.sweep(Utc::now().timestamp_micros());
                    }
                    debug!(
                        "Elapsed: {}s, active flows: {}",
                        start.elapsed().as_secs(),
                        self.flow_table.len()
                    );
                }
            }
        }

        self.stop.trigger();
        let joined = match finished_capture {
            Some(result) => result,
            None => capture_task.await,
        };
        let capture_stats = match joined {
            Ok(result) => result,
            Err(e) => Err(SessionError::Capture(format!("capture task failed: {}", e))),
        };

        let capture_stats = match capture_stats {
            Ok(stats) => stats,
            Err(e) => {
                // Rows already exported are still flushed
                drop(sweeper);
                if let Err(join_error) = output_task.await {
                    error!("Error waiting for output task: {:?}", join_error);
                }
                return Err(e);
            }
        };

        let drained = sweeper.drain();
        info!("Exported {} remaining flows", drained);
        drop(sweeper);

        let (output_writer, output_error) = output_task.await.map_err(|e| {
            SessionError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("output task failed: {}", e),
            ))
        })?;
        if let Some(e) = output_error {
            return Err(e);
        }

        info!(
            "Duration: {:.4} seconds",
            start.elapsed().as_secs_f64()
        );

        Ok(SessionSummary {
            flows_written: output_writer.flows_written(),
            appended_to_existing: output_writer.appended_to_existing(),
            capture: capture_stats,
        })
    }
}
