//! Flow Feature Engine
//!
//! Deterministically reduces the ordered packet list of one flow to a
//! fixed, named numeric vector. Pure function of its input.

use std::net::IpAddr;

use crate::logic::packet::{Packet, TcpFlags};
use super::layout::FeatureSchema;
use super::stats;
use super::vector::FeatureVector;

// ============================================================================
// WELL-KNOWN PORTS
// ============================================================================

const HTTP_PORT: u16 = 80;
const HTTPS_PORT: u16 = 443;
const TELNET_PORT: u16 = 23;
const SMTP_PORT: u16 = 25;
const SSH_PORT: u16 = 22;
const IRC_PORTS: [u16; 3] = [6667, 6668, 6669];
const DNS_PORT: u16 = 53;
const DHCP_PORTS: [u16; 2] = [67, 68];

// ============================================================================
// MEASUREMENTS
// ============================================================================

/// Every measurable quantity of a flow, before schema projection
#[derive(Debug, Clone, Default)]
struct FlowMeasurements {
    duration: f64,
    header_length: f64,
    protocol_type: f64,
    rate: f64,
    srate: f64,
    drate: f64,

    fin: f64,
    syn: f64,
    rst: f64,
    psh: f64,
    ack: f64,
    ece: f64,
    cwr: f64,
    urg: f64,

    http: bool,
    https: bool,
    dns: bool,
    telnet: bool,
    smtp: bool,
    ssh: bool,
    irc: bool,
    tcp: bool,
    udp: bool,
    dhcp: bool,
    arp: bool,
    icmp: bool,
    ipv: bool,

    tot_sum: f64,
    min: f64,
    max: f64,
    avg: f64,
    std: f64,
    iat: f64,
    number: f64,
    magnitude: f64,
    radius: f64,
    covariance: f64,
    variance: f64,
    weight: f64,
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

impl FlowMeasurements {
    fn measure(packets: &[Packet]) -> Self {
        let mut m = FlowMeasurements::default();

        let first = &packets[0];
        let first_src: Option<IpAddr> = first.src.filter(|_| first.has_ip());
        if first.has_ip() {
            m.protocol_type = first.protocol as f64;
        }

        let times: Vec<f64> = packets.iter().map(|p| p.timestamp).collect();
        let sizes: Vec<f64> = packets.iter().map(|p| p.total_len as f64).collect();
        let count = packets.len() as f64;

        m.duration = if packets.len() > 1 { times[times.len() - 1] - times[0] } else { 0.0 };
        m.rate = if m.duration > 0.0 { count / m.duration } else { count };

        let headers: Vec<f64> = packets.iter().map(Packet::header_len).collect();
        m.header_length = stats::mean(&headers);

        // Direction: forward = same source as the first packet
        let (mut fwd, mut bwd) = (0u64, 0u64);
        for p in packets.iter().filter(|p| p.has_ip()) {
            if p.src == first_src {
                fwd += 1;
            } else {
                bwd += 1;
            }
        }
        if m.duration > 0.0 {
            m.srate = fwd as f64 / m.duration;
            m.drate = bwd as f64 / m.duration;
        }

        let mut payload_sum = 0u64;
        for p in packets {
            if p.is_tcp() {
                m.tcp = true;
                if let Some(flags) = p.tcp_flags {
                    m.fin += flag(flags.has(TcpFlags::FIN));
                    m.syn += flag(flags.has(TcpFlags::SYN));
                    m.rst += flag(flags.has(TcpFlags::RST));
                    m.psh += flag(flags.has(TcpFlags::PSH));
                    m.ack += flag(flags.has(TcpFlags::ACK));
                    m.ece += flag(flags.has(TcpFlags::ECE));
                    m.cwr += flag(flags.has(TcpFlags::CWR));
                    m.urg += flag(flags.has(TcpFlags::URG));
                }
                let on = |port: u16| p.src_port == Some(port) || p.dst_port == Some(port);
                m.http |= on(HTTP_PORT);
                m.https |= on(HTTPS_PORT);
                m.telnet |= on(TELNET_PORT);
                m.smtp |= on(SMTP_PORT);
                m.ssh |= on(SSH_PORT);
                m.irc |= IRC_PORTS.iter().any(|&port| on(port));
            } else if p.is_udp() {
                m.udp = true;
                let on = |port: u16| p.src_port == Some(port) || p.dst_port == Some(port);
                m.dns |= on(DNS_PORT);
                m.dhcp |= DHCP_PORTS.iter().any(|&port| on(port));
            } else if p.is_icmp() {
                m.icmp = true;
            } else if p.is_arp {
                m.arp = true;
            }
            m.ipv |= p.has_ip();
            payload_sum += p.transport_payload() as u64;
        }

        m.tot_sum = sizes.iter().sum();
        m.min = sizes.iter().copied().fold(f64::INFINITY, f64::min);
        m.max = sizes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        m.avg = stats::mean(&sizes);
        m.std = stats::std_dev(&sizes);
        m.variance = stats::variance(&sizes);
        m.number = count;
        m.magnitude = sizes.iter().map(|s| s * s).sum::<f64>().sqrt();

        let iats = stats::diffs(&times);
        m.iat = stats::mean(&iats);

        if sizes.len() > 1 {
            m.radius = stats::mean_abs_deviation(&sizes);
            m.covariance = stats::covariance(&sizes[..sizes.len() - 1], &iats);
        }

        m.weight = if m.tot_sum > 0.0 { payload_sum as f64 / m.tot_sum } else { 0.0 };
        m
    }

    /// Value of one named column; unknown names read as 0.0
    fn column(&self, name: &str) -> f64 {
        match name {
            "flow_duration" | "Duration" => self.duration,
            "Header_Length" => self.header_length,
            "Protocol Type" => self.protocol_type,
            "Rate" => self.rate,
            "Srate" => self.srate,
            "Drate" => self.drate,
            "fin_flag_number" | "fin_count" => self.fin,
            "syn_flag_number" | "syn_count" => self.syn,
            "rst_flag_number" | "rst_count" => self.rst,
            "psh_flag_number" => self.psh,
            "ack_flag_number" | "ack_count" => self.ack,
            "ece_flag_number" => self.ece,
            "cwr_flag_number" => self.cwr,
            "urg_count" => self.urg,
            "HTTP" => flag(self.http),
            "HTTPS" => flag(self.https),
            "DNS" => flag(self.dns),
            "Telnet" => flag(self.telnet),
            "SMTP" => flag(self.smtp),
            "SSH" => flag(self.ssh),
            "IRC" => flag(self.irc),
            "TCP" => flag(self.tcp),
            "UDP" => flag(self.udp),
            "DHCP" => flag(self.dhcp),
            "ARP" => flag(self.arp),
            "ICMP" => flag(self.icmp),
            "IPv" => flag(self.ipv),
            // No LLC decoding on this path
            "LLC" => 0.0,
            "Tot sum" | "Tot size" => self.tot_sum,
            "Min" => self.min,
            "Max" => self.max,
            "AVG" => self.avg,
            "Std" => self.std,
            "IAT" => self.iat,
            "Number" => self.number,
            "Magnitue" => self.magnitude,
            "Radius" => self.radius,
            "Covariance" => self.covariance,
            "Variance" => self.variance,
            "Weight" => self.weight,
            _ => 0.0,
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Stateless extractor bound to one schema
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngine {
    schema: FeatureSchema,
}

impl FeatureEngine {
    pub fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    /// Extract the feature vector for `packets` (arrival order)
    ///
    /// An empty slice yields an empty vector.
    pub fn extract(&self, packets: &[Packet]) -> FeatureVector {
        if packets.is_empty() {
            return FeatureVector::empty();
        }

        let m = FlowMeasurements::measure(packets);
        let values: Vec<f64> = self
            .schema
            .names()
            .iter()
            .map(|name| stats::finite_or_zero(m.column(name)))
            .collect();

        FeatureVector::from_schema(self.schema, values).unwrap_or_else(FeatureVector::empty)
    }
}
