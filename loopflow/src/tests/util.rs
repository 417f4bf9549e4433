use std::{
    collections::VecDeque,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    path::{Path, PathBuf},
    time::Duration,
};

use pcap::{Capture, Linktype, Packet, PacketHeader};

use crate::{
    capture::{Delivery, PacketSource},
    error::Result,
    flow_table::FlowEntry,
    packet_features::{FlowKey, PacketFeatures},
};

pub const SECOND_US: i64 = 1_000_000;

/// A TCP key between two loopback ports.
pub fn loopback_key(source_port: u16, destination_port: u16) -> FlowKey {
    FlowKey::new(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        source_port,
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        destination_port,
        6,
    )
}

pub fn packet_at(flow_key: FlowKey, length: u32, timestamp_us: i64) -> PacketFeatures {
    PacketFeatures::new(flow_key, length, timestamp_us)
}

/// Builds an entry holding `packets` as given, without reordering.
pub fn entry_of(flow_key: FlowKey, packets: Vec<PacketFeatures>) -> FlowEntry {
    let last_timestamp_us = packets
        .iter()
        .map(|packet| packet.timestamp_us)
        .max()
        .unwrap_or(0);
    FlowEntry {
        flow_key,
        packets,
        last_timestamp_us,
    }
}

pub fn temp_csv_path(name: &str) -> PathBuf {
    temp_file_path(name, "csv")
}

/// A fresh per-process path in the temp directory, removed if left over.
pub fn temp_file_path(name: &str, extension: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "loopflow-{}-{}.{}",
        name,
        std::process::id(),
        extension
    ));
    let _ = std::fs::remove_file(&path);
    path
}

/// A frame as stored in a capture file.
pub struct RecordedFrame {
    pub timestamp_us: i64,
    /// Length on the wire, may exceed the stored bytes.
    pub wire_length: u32,
    pub data: Vec<u8>,
}

/// Writes `frames` into a pcap file at `path` with microsecond timestamps.
pub fn write_pcap(path: &Path, linktype: Linktype, frames: &[RecordedFrame]) {
    let capture = Capture::dead(linktype).unwrap();
    let mut savefile = capture.savefile(path).unwrap();
    for frame in frames {
        let header = PacketHeader {
            ts: libc::timeval {
                tv_sec: (frame.timestamp_us / SECOND_US) as libc::time_t,
                tv_usec: (frame.timestamp_us % SECOND_US) as libc::suseconds_t,
            },
            caplen: frame.data.len() as u32,
            len: frame.wire_length,
        };
        savefile.write(&Packet::new(&header, &frame.data));
    }
    savefile.flush().unwrap();
}

/// Plays back a fixed list of deliveries, then reports the configured end.
pub struct ScriptedSource {
    deliveries: VecDeque<Result<Delivery>>,
    idle_when_done: bool,
}

impl ScriptedSource {
    /// Ends with `Delivery::Exhausted`, like the end of a capture file.
    pub fn finite(deliveries: Vec<Result<Delivery>>) -> Self {
        ScriptedSource {
            deliveries: deliveries.into(),
            idle_when_done: false,
        }
    }

    /// Stays idle forever once the script runs out, like a quiet interface.
    pub fn live(deliveries: Vec<Result<Delivery>>) -> Self {
        ScriptedSource {
            deliveries: deliveries.into(),
            idle_when_done: true,
        }
    }
}

impl PacketSource for ScriptedSource {
    fn next_delivery(&mut self) -> Result<Delivery> {
        match self.deliveries.pop_front() {
            Some(delivery) => delivery,
            None if self.idle_when_done => {
                std::thread::sleep(Duration::from_millis(5));
                Ok(Delivery::Idle)
            }
            None => Ok(Delivery::Exhausted),
        }
    }
}

// Hand-built frames, checksums left at zero

pub const TCP: u8 = 6;
pub const UDP: u8 = 17;
pub const ICMP: u8 = 1;

pub fn transport_header(protocol: u8, source_port: u16, destination_port: u16) -> Vec<u8> {
    let mut header = Vec::new();
    header.extend_from_slice(&source_port.to_be_bytes());
    header.extend_from_slice(&destination_port.to_be_bytes());
    if protocol == TCP {
        // seq, ack, data offset 5, flags, window, checksum, urgent pointer
        header.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0, 0x50, 0x02, 0x04, 0x00]);
        header.extend_from_slice(&[0, 0, 0, 0]);
    } else {
        header.extend_from_slice(&8u16.to_be_bytes());
        header.extend_from_slice(&[0, 0]);
    }
    header
}

pub fn ipv4_packet(
    protocol: u8,
    source: [u8; 4],
    source_port: u16,
    destination: [u8; 4],
    destination_port: u16,
    fragment_offset: u16,
) -> Vec<u8> {
    let transport = transport_header(protocol, source_port, destination_port);
    let total_length = (20 + transport.len()) as u16;

    let mut packet = vec![0x45, 0x00];
    packet.extend_from_slice(&total_length.to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x01]);
    packet.extend_from_slice(&fragment_offset.to_be_bytes());
    packet.extend_from_slice(&[64, protocol, 0, 0]);
    packet.extend_from_slice(&source);
    packet.extend_from_slice(&destination);
    packet.extend_from_slice(&transport);
    packet
}

pub fn ipv6_packet(protocol: u8, source_port: u16, destination_port: u16) -> Vec<u8> {
    let transport = transport_header(protocol, source_port, destination_port);

    let mut packet = vec![0x60, 0, 0, 0];
    packet.extend_from_slice(&(transport.len() as u16).to_be_bytes());
    packet.extend_from_slice(&[protocol, 64]);
    packet.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
    packet.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
    packet.extend_from_slice(&transport);
    packet
}

pub fn ethernet_frame(ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; 12];
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}
