use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{debug, info};
use pcap::{Activated, Capture};

use crate::{
    classifier::{classify, LinkLayer},
    error::{Result, SessionError},
    flow_table::FlowTable,
    packet_features::PacketFeatures,
    sweeper::Sweeper,
};

// Short enough for the capture loop to notice a stop request promptly
const READ_TIMEOUT_MS: i32 = 100;

/// One step of a packet source.
#[derive(Debug)]
pub enum Delivery {
    Packet(PacketFeatures),
    /// A frame arrived but it is not TCP or UDP over IP.
    Unclassified,
    /// Nothing arrived within the read timeout.
    Idle,
    /// The source has no more packets.
    Exhausted,
}

/// Anything that delivers captured packets one at a time.
pub trait PacketSource: Send {
    fn next_delivery(&mut self) -> Result<Delivery>;
}

/// A libpcap handle on a live interface or a capture file.
pub struct PcapSource {
    capture: Capture<dyn Activated>,
    link_layer: LinkLayer,
}

impl PcapSource {
    /// Opens `interface` for live capture.
    pub fn live(interface: &str) -> Result<Self> {
        debug!("Opening interface {} for capture...", interface);
        let capture = Capture::from_device(interface)?
            .immediate_mode(true)
            .timeout(READ_TIMEOUT_MS)
            .open()?;
        Self::from_capture(capture.into())
    }

    /// Opens a pcap file for replay.
    pub fn offline(path: &str) -> Result<Self> {
        debug!("Opening the pcap file: {:?} ...", path);
        let capture = Capture::from_file(path)?;
        Self::from_capture(capture.into())
    }

    fn from_capture(capture: Capture<dyn Activated>) -> Result<Self> {
        let linktype = capture.get_datalink();
        let link_layer = LinkLayer::from_linktype(linktype).ok_or_else(|| {
            SessionError::Capture(format!("unsupported link type {:?}", linktype))
        })?;
        debug!("Capture link layer: {:?}", link_layer);

        Ok(PcapSource {
            capture,
            link_layer,
        })
    }
}

impl PacketSource for PcapSource {
    fn next_delivery(&mut self) -> Result<Delivery> {
        match self.capture.next_packet() {
            Ok(packet) => {
                let timestamp_us =
                    packet.header.ts.tv_sec as i64 * 1_000_000 + packet.header.ts.tv_usec as i64;
                Ok(match classify(self.link_layer, packet.data) {
                    Some(flow_key) => Delivery::Packet(PacketFeatures::new(
                        flow_key,
                        packet.header.len,
                        timestamp_us,
                    )),
                    None => Delivery::Unclassified,
                })
            }
            Err(pcap::Error::TimeoutExpired) => Ok(Delivery::Idle),
            Err(pcap::Error::NoMorePackets) => Ok(Delivery::Exhausted),
            Err(e) => Err(e.into()),
        }
    }
}

/// Cooperative cancellation shared by the session and the capture loop.
#[derive(Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Sweeps on packet time instead of the wall clock, for replayed captures.
pub struct PacketClock {
    sweeper: Sweeper,
    sweep_interval_us: i64,
    next_check_us: Option<i64>,
}

impl PacketClock {
    pub fn new(sweeper: Sweeper, sweep_interval_us: i64) -> Self {
        PacketClock {
            sweeper,
            sweep_interval_us,
            next_check_us: None,
        }
    }

    /// Sweeps once packet time has reached the next check time.
    fn advance(&mut self, timestamp_us: i64) {
        if self
            .next_check_us
            .map_or(true, |next_check| timestamp_us >= next_check)
        {
            self.sweeper.sweep(timestamp_us);
            self.next_check_us = Some(timestamp_us.saturating_add(self.sweep_interval_us));
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub packets_seen: u64,
    pub packets_tracked: u64,
    pub packets_unclassified: u64,
}

/// Feeds packets from `source` into `flow_table` until the source is
/// exhausted or `stop` is triggered.
///
/// The stop signal is checked between deliveries. A source error ends the
/// capture and is returned to the caller.
pub fn run_capture<S: PacketSource>(
    mut source: S,
    flow_table: &FlowTable,
    stop: &StopSignal,
    mut packet_clock: Option<PacketClock>,
) -> Result<CaptureStats> {
    let mut stats = CaptureStats::default();

    while !stop.is_triggered() {
        match source.next_delivery()? {
            Delivery::Packet(packet) => {
                stats.packets_seen += 1;
                stats.packets_tracked += 1;
                if let Some(clock) = packet_clock.as_mut() {
                    clock.advance(packet.timestamp_us);
                }
                flow_table.append(packet);
            }
            Delivery::Unclassified => {
                stats.packets_seen += 1;
                stats.packets_unclassified += 1;
            }
            Delivery::Idle => {}
            Delivery::Exhausted => {
                debug!("Packet source exhausted");
                break;
            }
        }
    }

    info!(
        "Capture stopped: {} packets seen, {} tracked, {} unclassified",
        stats.packets_seen, stats.packets_tracked, stats.packets_unclassified
    );
    Ok(stats)
}
