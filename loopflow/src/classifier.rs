use log::debug;
use pcap::Linktype;
use pnet::packet::{
    ethernet::{EtherTypes, EthernetPacket},
    ipv4::Ipv4Packet,
    ipv6::Ipv6Packet,
    Packet,
};

use crate::packet_features::FlowKey;

// EtherTypes as they appear in VLAN tags and Linux cooked capture headers
const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86DD;
const ETHERTYPE_VLAN: u16 = 0x8100;

const SLL_HEADER_LEN: usize = 16;
const NULL_HEADER_LEN: usize = 4;
const VLAN_TAG_LEN: usize = 4;

// Live handles report the DLT value rather than LINKTYPE_RAW
const DLT_RAW: i32 = 12;

/// Link-layer framing of captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    LinuxCooked,
    /// BSD loopback, a 4 byte address family header.
    Null,
    RawIp,
}

impl LinkLayer {
    pub fn from_linktype(linktype: Linktype) -> Option<Self> {
        if linktype == Linktype::ETHERNET {
            Some(LinkLayer::Ethernet)
        } else if linktype == Linktype::LINUX_SLL {
            Some(LinkLayer::LinuxCooked)
        } else if linktype == Linktype::NULL || linktype == Linktype::LOOP {
            Some(LinkLayer::Null)
        } else if linktype == Linktype::RAW
            || linktype == Linktype(DLT_RAW)
            || linktype == Linktype::IPV4
            || linktype == Linktype::IPV6
        {
            Some(LinkLayer::RawIp)
        } else {
            None
        }
    }
}

/// Derives the flow key of a captured frame.
///
/// Returns `None` when the frame has no IP layer or the IP payload is not
/// TCP or UDP. Such frames are not tracked.
pub fn classify(link_layer: LinkLayer, frame: &[u8]) -> Option<FlowKey> {
    match link_layer {
        LinkLayer::Ethernet => classify_ethernet(frame),
        LinkLayer::LinuxCooked => {
            if frame.len() < SLL_HEADER_LEN {
                debug!("Frame too short to be SLL");
                return None;
            }
            let ethertype = u16::from_be_bytes([frame[14], frame[15]]);
            classify_ethertype(ethertype, &frame[SLL_HEADER_LEN..])
        }
        LinkLayer::Null => frame.get(NULL_HEADER_LEN..).and_then(classify_ip),
        LinkLayer::RawIp => classify_ip(frame),
    }
}

fn classify_ethernet(frame: &[u8]) -> Option<FlowKey> {
    let ethernet = EthernetPacket::new(frame)?;
    match ethernet.get_ethertype() {
        EtherTypes::Ipv4 => Ipv4Packet::new(ethernet.payload())
            .as_ref()
            .and_then(FlowKey::from_ipv4_packet),
        EtherTypes::Ipv6 => Ipv6Packet::new(ethernet.payload())
            .as_ref()
            .and_then(FlowKey::from_ipv6_packet),
        EtherTypes::Vlan => {
            let payload = ethernet.payload();
            if payload.len() < VLAN_TAG_LEN {
                debug!("VLAN frame too short to contain inner EtherType");
                return None;
            }
            let inner_ethertype = u16::from_be_bytes([payload[2], payload[3]]);
            classify_ethertype(inner_ethertype, &payload[VLAN_TAG_LEN..])
        }
        _ => None,
    }
}

fn classify_ethertype(ethertype: u16, payload: &[u8]) -> Option<FlowKey> {
    match ethertype {
        ETHERTYPE_IPV4 => Ipv4Packet::new(payload)
            .as_ref()
            .and_then(FlowKey::from_ipv4_packet),
        ETHERTYPE_IPV6 => Ipv6Packet::new(payload)
            .as_ref()
            .and_then(FlowKey::from_ipv6_packet),
        ETHERTYPE_VLAN => {
            if payload.len() < VLAN_TAG_LEN {
                return None;
            }
            let inner_ethertype = u16::from_be_bytes([payload[2], payload[3]]);
            match inner_ethertype {
                ETHERTYPE_IPV4 | ETHERTYPE_IPV6 => {
                    classify_ethertype(inner_ethertype, &payload[VLAN_TAG_LEN..])
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Dispatches on the IP version nibble, used where no EtherType is present.
fn classify_ip(packet: &[u8]) -> Option<FlowKey> {
    match packet.first().map(|byte| byte >> 4) {
        Some(4) => Ipv4Packet::new(packet)
            .as_ref()
            .and_then(FlowKey::from_ipv4_packet),
        Some(6) => Ipv6Packet::new(packet)
            .as_ref()
            .and_then(FlowKey::from_ipv6_packet),
        _ => None,
    }
}
