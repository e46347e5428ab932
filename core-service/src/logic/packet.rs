//! Packet record consumed from a capture source
//!
//! Only the fields the flow pipeline needs; layer presence is expressed
//! through `Option`s so partially decoded frames still carry what they have.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

pub const PROTO_ICMP: u8 = 1;
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;
pub const PROTO_ICMPV6: u8 = 58;

/// Default IPv4 header length when the capture does not report IHL
pub const DEFAULT_IP_HEADER_LEN: u16 = 20;
/// Default TCP data offset (32-bit words)
pub const DEFAULT_TCP_DATA_OFFSET: u8 = 5;
pub const UDP_HEADER_LEN: u16 = 8;

// ============================================================================
// TCP FLAGS
// ============================================================================

/// Raw TCP flag byte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TcpFlags(pub u8);

impl TcpFlags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;
    pub const ECE: u8 = 0x40;
    pub const CWR: u8 = 0x80;

    pub fn has(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn syn() -> Self {
        TcpFlags(Self::SYN)
    }

    pub fn ack() -> Self {
        TcpFlags(Self::ACK)
    }
}

// ============================================================================
// PACKET
// ============================================================================

/// One captured packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Capture time, seconds since the epoch
    pub timestamp: f64,
    #[serde(default)]
    pub src: Option<IpAddr>,
    #[serde(default)]
    pub dst: Option<IpAddr>,
    #[serde(default)]
    pub src_port: Option<u16>,
    #[serde(default)]
    pub dst_port: Option<u16>,
    /// IP protocol number (0 when there is no IP layer)
    #[serde(default)]
    pub protocol: u8,
    #[serde(default)]
    pub tcp_flags: Option<TcpFlags>,
    /// IP header length in bytes, if known
    #[serde(default)]
    pub ip_header_len: Option<u16>,
    /// TCP data offset in 32-bit words, if known
    #[serde(default)]
    pub tcp_data_offset: Option<u8>,
    /// Frame length in bytes
    pub total_len: u32,
    /// Transport payload length in bytes
    #[serde(default)]
    pub payload_len: u32,
    #[serde(default)]
    pub is_arp: bool,
}

impl Packet {
    pub fn has_ip(&self) -> bool {
        self.src.is_some() && self.dst.is_some()
    }

    pub fn is_tcp(&self) -> bool {
        self.has_ip() && self.protocol == PROTO_TCP
    }

    pub fn is_udp(&self) -> bool {
        self.has_ip() && self.protocol == PROTO_UDP
    }

    pub fn is_icmp(&self) -> bool {
        self.has_ip() && matches!(self.protocol, PROTO_ICMP | PROTO_ICMPV6)
    }

    /// Transport-layer payload, counted only for TCP/UDP
    pub fn transport_payload(&self) -> u32 {
        if self.is_tcp() || self.is_udp() {
            self.payload_len
        } else {
            0
        }
    }

    /// Estimated IP + transport header bytes (0 without an IP layer)
    pub fn header_len(&self) -> f64 {
        if !self.has_ip() {
            return 0.0;
        }
        let ip = self
            .ip_header_len
            .filter(|len| *len > 0)
            .unwrap_or(DEFAULT_IP_HEADER_LEN) as f64;
        if self.is_tcp() {
            let offset = self
                .tcp_data_offset
                .filter(|o| *o > 0)
                .unwrap_or(DEFAULT_TCP_DATA_OFFSET) as f64;
            ip + offset * 4.0
        } else if self.is_udp() {
            ip + UDP_HEADER_LEN as f64
        } else {
            ip
        }
    }

    /// Convenience constructor for a TCP segment
    pub fn tcp(timestamp: f64, src: IpAddr, dst: IpAddr, src_port: u16, dst_port: u16, flags: TcpFlags, total_len: u32) -> Self {
        Self {
            timestamp,
            src: Some(src),
            dst: Some(dst),
            src_port: Some(src_port),
            dst_port: Some(dst_port),
            protocol: PROTO_TCP,
            tcp_flags: Some(flags),
            ip_header_len: Some(DEFAULT_IP_HEADER_LEN),
            tcp_data_offset: Some(DEFAULT_TCP_DATA_OFFSET),
            total_len,
            payload_len: total_len.saturating_sub(54),
            is_arp: false,
        }
    }

    /// Convenience constructor for a UDP datagram
    pub fn udp(timestamp: f64, src: IpAddr, dst: IpAddr, src_port: u16, dst_port: u16, total_len: u32) -> Self {
        Self {
            timestamp,
            src: Some(src),
            dst: Some(dst),
            src_port: Some(src_port),
            dst_port: Some(dst_port),
            protocol: PROTO_UDP,
            tcp_flags: None,
            ip_header_len: Some(DEFAULT_IP_HEADER_LEN),
            tcp_data_offset: None,
            total_len,
            payload_len: total_len.saturating_sub(42),
            is_arp: false,
        }
    }
}

// ============================================================================
// FLOW KEY
// ============================================================================

/// (src, dst, src_port, protocol); exact-match equality and hashing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowKey {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub src_port: u16,
    pub protocol: u8,
}

impl FlowKey {
    /// Derive the key; a missing transport layer keys on port 0,
    /// a missing IP layer yields no key
    pub fn from_packet(packet: &Packet) -> Option<FlowKey> {
        match (packet.src, packet.dst) {
            (Some(src), Some(dst)) => Some(FlowKey {
                src,
                dst,
                src_port: packet.src_port.unwrap_or(0),
                protocol: packet.protocol,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} -> {} (proto {})", self.src, self.src_port, self.dst, self.protocol)
    }
}
