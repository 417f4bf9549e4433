use std::{fmt, net::IpAddr};

use pnet::packet::{
    ip::{IpNextHeaderProtocol, IpNextHeaderProtocols},
    ipv4::Ipv4Packet,
    ipv6::Ipv6Packet,
    tcp::TcpPacket,
    udp::UdpPacket,
    Packet,
};

/// Directional five-tuple identifying a flow.
///
/// A reply packet has its source and destination swapped and therefore a
/// different key, see [`FlowKey::reversed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    pub source_ip: IpAddr,
    pub source_port: u16,
    pub destination_ip: IpAddr,
    pub destination_port: u16,
    pub protocol: u8,
}

impl FlowKey {
    pub fn new(
        source_ip: IpAddr,
        source_port: u16,
        destination_ip: IpAddr,
        destination_port: u16,
        protocol: u8,
    ) -> Self {
        FlowKey {
            source_ip,
            source_port,
            destination_ip,
            destination_port,
            protocol,
        }
    }

    /// The key of the reply direction.
    pub fn reversed(&self) -> Self {
        FlowKey {
            source_ip: self.destination_ip,
            source_port: self.destination_port,
            destination_ip: self.source_ip,
            destination_port: self.source_port,
            protocol: self.protocol,
        }
    }

    /// Derives the key of an IPv4 packet carrying TCP or UDP.
    ///
    /// Returns `None` for other transports, truncated transport headers and
    /// non-first fragments (which carry no transport header at all).
    pub fn from_ipv4_packet(packet: &Ipv4Packet) -> Option<Self> {
        if packet.get_fragment_offset() != 0 {
            return None;
        }
        let protocol = packet.get_next_level_protocol();
        let (source_port, destination_port) = transport_ports(protocol, packet.payload())?;

        Some(FlowKey::new(
            IpAddr::V4(packet.get_source()),
            source_port,
            IpAddr::V4(packet.get_destination()),
            destination_port,
            protocol.0,
        ))
    }

    /// Derives the key of an IPv6 packet whose next header is TCP or UDP.
    ///
    /// Extension headers are not walked.
    pub fn from_ipv6_packet(packet: &Ipv6Packet) -> Option<Self> {
        let protocol = packet.get_next_header();
        let (source_port, destination_port) = transport_ports(protocol, packet.payload())?;

        Some(FlowKey::new(
            IpAddr::V6(packet.get_source()),
            source_port,
            IpAddr::V6(packet.get_destination()),
            destination_port,
            protocol.0,
        ))
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}-{}",
            self.source_ip,
            self.source_port,
            self.destination_ip,
            self.destination_port,
            self.protocol
        )
    }
}

fn transport_ports(protocol: IpNextHeaderProtocol, payload: &[u8]) -> Option<(u16, u16)> {
    match protocol {
        IpNextHeaderProtocols::Tcp => {
            TcpPacket::new(payload).map(|tcp| (tcp.get_source(), tcp.get_destination()))
        }
        IpNextHeaderProtocols::Udp => {
            UdpPacket::new(payload).map(|udp| (udp.get_source(), udp.get_destination()))
        }
        _ => None,
    }
}

/// A classified packet as stored in the flow table.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketFeatures {
    pub flow_key: FlowKey,
    /// Wire length of the captured frame in bytes.
    pub length: u32,
    pub timestamp_us: i64,
}

impl PacketFeatures {
    pub fn new(flow_key: FlowKey, length: u32, timestamp_us: i64) -> Self {
        PacketFeatures {
            flow_key,
            length,
            timestamp_us,
        }
    }
}
