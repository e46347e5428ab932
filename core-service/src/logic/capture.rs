//! Packet Sources - what feeds the pipeline
//!
//! Live capture is an external collaborator; anything that yields
//! `Packet`s in arrival order is a source. Two are shipped: a JSON-lines
//! replayer and a seeded synthetic traffic mix.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::logic::packet::{Packet, TcpFlags};

/// Any ordered packet stream
pub trait PacketSource: Iterator<Item = Packet> + Send {}

impl<T> PacketSource for T where T: Iterator<Item = Packet> + Send {}

// ============================================================================
// JSON LINES
// ============================================================================

/// One packet record per line; blank, non-UTF-8 and malformed lines are
/// skipped. Any other read error ends the stream.
pub struct JsonlPacketSource<R> {
    lines: io::Lines<R>,
    line_no: u64,
    skipped: u64,
    finished: bool,
}

impl JsonlPacketSource<BufReader<File>> {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::from_reader(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> JsonlPacketSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            skipped: 0,
            finished: false,
        }
    }

    /// Lines that could not be read or parsed
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<R: BufRead> Iterator for JsonlPacketSource<R> {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        if self.finished {
            return None;
        }
        loop {
            let line = match self.lines.next() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Ok(line)) => line,
                Some(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    self.line_no += 1;
                    self.skipped += 1;
                    log::warn!("Skipping non-UTF-8 packet record at line {}", self.line_no);
                    continue;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    log::error!("Packet source read failed after line {}: {}", self.line_no, e);
                    return None;
                }
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Packet>(trimmed) {
                Ok(packet) => return Some(packet),
                Err(e) => {
                    self.skipped += 1;
                    log::debug!("Skipping malformed packet record at line {}: {}", self.line_no, e);
                }
            }
        }
    }
}

// ============================================================================
// SYNTHETIC TRAFFIC
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficKind {
    Benign,
    SynFlood,
    PortScan,
    UdpFlood,
}

impl TrafficKind {
    /// Pick a kind given a uniform draw in [0, 1)
    fn from_draw(draw: f64, attack_ratio: f64) -> Self {
        if draw >= attack_ratio {
            return TrafficKind::Benign;
        }
        let slot = draw / attack_ratio;
        if slot < 1.0 / 3.0 {
            TrafficKind::SynFlood
        } else if slot < 2.0 / 3.0 {
            TrafficKind::PortScan
        } else {
            TrafficKind::UdpFlood
        }
    }
}

const BENIGN_BURST: usize = 20;
const FLOOD_BURST: usize = 60;
const SCAN_BURST: usize = 30;

/// Seeded generator of benign conversations mixed with attack bursts
pub struct SyntheticTraffic {
    rng: StdRng,
    clock: f64,
    remaining: u64,
    attack_ratio: f64,
    pending: VecDeque<Packet>,
}

impl SyntheticTraffic {
    pub fn new(seed: u64, total_packets: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            clock: 1_700_000_000.0,
            remaining: total_packets,
            attack_ratio: 0.3,
            pending: VecDeque::new(),
        }
    }

    /// Fraction of bursts that are attacks, clamped to [0, 1]
    pub fn with_attack_ratio(mut self, ratio: f64) -> Self {
        self.attack_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_start_time(mut self, start: f64) -> Self {
        self.clock = start;
        self
    }

    fn private_host(&mut self) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, self.rng.gen_range(2..250)))
    }

    fn external_host(&mut self) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(
            self.rng.gen_range(11..170),
            self.rng.gen_range(0..255),
            self.rng.gen_range(0..255),
            self.rng.gen_range(1..255),
        ))
    }

    fn refill(&mut self) {
        let draw: f64 = self.rng.gen();
        let kind = TrafficKind::from_draw(draw, self.attack_ratio);
        let server = IpAddr::V4(Ipv4Addr::new(10, 0, 0, self.rng.gen_range(1..20)));
        let sport: u16 = self.rng.gen_range(1024..65535);

        match kind {
            TrafficKind::Benign => {
                let client = self.private_host();
                let dport = if self.rng.gen_bool(0.5) { 443 } else { 80 };
                for i in 0..BENIGN_BURST {
                    self.clock += self.rng.gen_range(0.02..0.1);
                    let flags = if i % 2 == 0 {
                        TcpFlags::ack()
                    } else {
                        TcpFlags(TcpFlags::ACK | TcpFlags::PSH)
                    };
                    let size = self.rng.gen_range(60..1500);
                    self.pending.push_back(Packet::tcp(self.clock, client, server, sport, dport, flags, size));
                }
            }
            TrafficKind::SynFlood => {
                let attacker = self.external_host();
                for _ in 0..FLOOD_BURST {
                    self.clock += 0.0005;
                    self.pending.push_back(Packet::tcp(self.clock, attacker, server, sport, 80, TcpFlags::syn(), 54));
                }
            }
            TrafficKind::PortScan => {
                let attacker = self.external_host();
                let first: u16 = self.rng.gen_range(1..60000);
                for i in 0..SCAN_BURST {
                    self.clock += 0.002;
                    let dport = first.saturating_add(i as u16);
                    self.pending.push_back(Packet::tcp(self.clock, attacker, server, sport, dport, TcpFlags::syn(), 58));
                }
            }
            TrafficKind::UdpFlood => {
                let attacker = self.external_host();
                for _ in 0..FLOOD_BURST {
                    self.clock += 0.001;
                    self.pending.push_back(Packet::udp(self.clock, attacker, server, sport, 53, 512));
                }
            }
        }
        // idle gap between bursts
        self.clock += self.rng.gen_range(0.1..2.0);
    }
}

impl Iterator for SyntheticTraffic {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        if self.remaining == 0 {
            return None;
        }
        if self.pending.is_empty() {
            self.refill();
        }
        self.remaining -= 1;
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_jsonl_skips_bad_lines() {
        let data = r#"{"timestamp": 1.0, "src": "10.0.0.1", "dst": "10.0.0.2", "src_port": 1234, "dst_port": 80, "protocol": 6, "tcp_flags": 2, "total_len": 60}

not json
{"timestamp": 2.0, "src": "10.0.0.1", "dst": "10.0.0.2", "protocol": 17, "total_len": 100}
"#;
        let mut source = JsonlPacketSource::from_reader(Cursor::new(data));
        let packets: Vec<Packet> = source.by_ref().collect();

        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].dst_port, Some(80));
        assert!(packets[0].tcp_flags.map_or(false, |f| f.has(TcpFlags::SYN)));
        assert_eq!(packets[1].protocol, 17);
        assert_eq!(source.skipped(), 1);
    }

    #[test]
    fn test_jsonl_skips_invalid_utf8() {
        let mut data = b"\xff\xfe\n".to_vec();
        data.extend_from_slice(br#"{"timestamp": 1.0, "src": "10.0.0.1", "dst": "10.0.0.2", "protocol": 17, "total_len": 80}"#);
        data.push(b'\n');

        let mut source = JsonlPacketSource::from_reader(Cursor::new(data));
        assert_eq!(source.by_ref().count(), 1);
        assert_eq!(source.skipped(), 1);
    }

    #[test]
    fn test_jsonl_read_error_ends_stream() {
        let dir = tempfile::tempdir().unwrap();
        // directories open on unix but every read fails
        let Ok(mut source) = JsonlPacketSource::open(dir.path()) else {
            return;
        };

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let n = source.by_ref().count();
            let _ = tx.send((n, source.next().is_none()));
        });
        let (count, fused) = rx.recv_timeout(std::time::Duration::from_secs(3)).unwrap();
        assert_eq!(count, 0);
        assert!(fused);
    }

    #[test]
    fn test_synthetic_is_deterministic_and_ordered() {
        let a: Vec<Packet> = SyntheticTraffic::new(7, 500).collect();
        let b: Vec<Packet> = SyntheticTraffic::new(7, 500).collect();

        assert_eq!(a.len(), 500);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_attack_ratio_extremes() {
        let benign: Vec<Packet> = SyntheticTraffic::new(1, 200).with_attack_ratio(0.0).collect();
        assert!(benign.iter().all(|p| p.is_tcp() && p.dst_port.map_or(false, |d| d == 80 || d == 443)));

        let attacks: Vec<Packet> = SyntheticTraffic::new(1, 200).with_attack_ratio(1.0).collect();
        assert!(attacks.iter().all(|p| p.src.map_or(false, |ip| !matches!(ip, IpAddr::V4(v4) if v4.octets()[0] == 192))));
    }

    #[test]
    fn test_start_time_anchors_clock() {
        let packets: Vec<Packet> = SyntheticTraffic::new(3, 50).with_start_time(100.0).collect();
        assert!(packets[0].timestamp > 100.0);
        assert!(packets[0].timestamp < 200.0);
    }

    #[test]
    fn test_from_draw() {
        assert_eq!(TrafficKind::from_draw(0.5, 0.3), TrafficKind::Benign);
        assert_eq!(TrafficKind::from_draw(0.05, 0.3), TrafficKind::SynFlood);
        assert_eq!(TrafficKind::from_draw(0.15, 0.3), TrafficKind::PortScan);
        assert_eq!(TrafficKind::from_draw(0.25, 0.3), TrafficKind::UdpFlood);
    }
}
