//! Flow Assembler
//!
//! One `Flow` per `FlowKey`. Every Nth packet of a flow triggers a
//! synchronous feature snapshot over the packets seen so far.
//!
//! Eviction runs on the packet clock (latest timestamp seen), so replayed
//! captures age flows the same way live traffic does.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::logic::config::FlowConfig;
use crate::logic::features::{FeatureEngine, FeatureVector};
use crate::logic::packet::{FlowKey, Packet};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Packets of one flow in arrival order
#[derive(Debug, Clone)]
pub struct Flow {
    pub key: FlowKey,
    pub packets: Vec<Packet>,
    /// Set once, from the first packet
    pub start_ts: f64,
    pub last_ts: f64,
    pub bytes: u64,
    pub packet_count: u64,
}

impl Flow {
    fn new(key: FlowKey, first: &Packet) -> Self {
        Self {
            key,
            packets: Vec::new(),
            start_ts: first.timestamp,
            last_ts: first.timestamp,
            bytes: 0,
            packet_count: 0,
        }
    }

    fn push(&mut self, packet: Packet) {
        self.last_ts = self.last_ts.max(packet.timestamp);
        self.bytes += packet.total_len as u64;
        self.packet_count += 1;
        self.packets.push(packet);
    }
}

/// Feature snapshot handed downstream on the Nth-packet boundary
#[derive(Debug, Clone)]
pub struct FlowSnapshot {
    pub key: FlowKey,
    /// Destination port of the triggering packet (0 without transport)
    pub dst_port: u16,
    pub packet_count: u64,
    pub features: FeatureVector,
}

/// Result of one ingest call
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// No IP layer, nothing to key on
    Dropped,
    Accumulated { key: FlowKey, packet_count: u64 },
    Snapshot(FlowSnapshot),
}

/// Flow key plus counters, for the query surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSummary {
    pub key: FlowKey,
    pub packet_count: u64,
    pub bytes: u64,
    pub start_ts: f64,
    pub last_ts: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblerStats {
    pub packets_ingested: u64,
    pub packets_dropped: u64,
    pub flows_created: u64,
    pub flows_expired: u64,
    pub flows_evicted_full: u64,
    pub snapshots_emitted: u64,
    pub active_flows: usize,
}

// ============================================================================
// ASSEMBLER
// ============================================================================

pub struct FlowAssembler {
    flows: HashMap<FlowKey, Flow>,
    config: FlowConfig,
    engine: FeatureEngine,
    /// Latest packet timestamp seen
    clock: f64,
    since_sweep: u64,
    stats: AssemblerStats,
}

impl FlowAssembler {
    pub fn new(config: FlowConfig, engine: FeatureEngine) -> Self {
        Self {
            flows: HashMap::with_capacity(config.max_flows.min(100_000)),
            config,
            engine,
            clock: f64::NEG_INFINITY,
            since_sweep: 0,
            stats: AssemblerStats::default(),
        }
    }

    /// Add one packet; returns a snapshot on every Nth packet of its flow
    pub fn ingest(&mut self, packet: Packet) -> IngestOutcome {
        let key = match FlowKey::from_packet(&packet) {
            Some(key) => key,
            None => {
                self.stats.packets_dropped += 1;
                return IngestOutcome::Dropped;
            }
        };

        self.stats.packets_ingested += 1;
        self.clock = self.clock.max(packet.timestamp);

        self.since_sweep += 1;
        if self.config.eviction_check_every > 0 && self.since_sweep >= self.config.eviction_check_every {
            self.since_sweep = 0;
            self.evict_idle(self.clock);
        }

        if !self.flows.contains_key(&key) {
            if self.config.max_flows > 0 && self.flows.len() >= self.config.max_flows {
                if self.evict_idle(self.clock) == 0 {
                    self.evict_oldest();
                }
            }
            self.flows.insert(key, Flow::new(key, &packet));
            self.stats.flows_created += 1;
        }

        let dst_port = packet.dst_port.unwrap_or(0);
        let interval = self.config.snapshot_interval.max(1);

        let flow = match self.flows.get_mut(&key) {
            Some(flow) => flow,
            None => return IngestOutcome::Dropped,
        };
        flow.push(packet);
        let packet_count = flow.packet_count;

        if packet_count % interval != 0 {
            return IngestOutcome::Accumulated { key, packet_count };
        }

        let features = self.engine.extract(&flow.packets);
        self.stats.snapshots_emitted += 1;
        IngestOutcome::Snapshot(FlowSnapshot { key, dst_port, packet_count, features })
    }

    /// Drop flows idle longer than the timeout as of `now`
    pub fn evict_idle(&mut self, now: f64) -> usize {
        let timeout = self.config.idle_timeout_secs;
        let before = self.flows.len();
        self.flows.retain(|_, flow| now - flow.last_ts <= timeout);
        let removed = before - self.flows.len();
        if removed > 0 {
            self.stats.flows_expired += removed as u64;
            log::debug!("Evicted {} idle flows ({} active)", removed, self.flows.len());
        }
        removed
    }

    /// Evict the least recently seen flow (when table is full)
    fn evict_oldest(&mut self) {
        let oldest = self
            .flows
            .iter()
            .min_by(|a, b| a.1.last_ts.total_cmp(&b.1.last_ts))
            .map(|(k, _)| *k);
        if let Some(key) = oldest {
            self.flows.remove(&key);
            self.stats.flows_evicted_full += 1;
        }
    }

    /// Latest packet timestamp seen (packet clock)
    pub fn clock(&self) -> Option<f64> {
        if self.clock.is_finite() { Some(self.clock) } else { None }
    }

    pub fn get(&self, key: &FlowKey) -> Option<&Flow> {
        self.flows.get(key)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Busiest flows first
    pub fn summaries(&self, limit: usize) -> Vec<FlowSummary> {
        let mut list: Vec<FlowSummary> = self
            .flows
            .values()
            .map(|f| FlowSummary {
                key: f.key,
                packet_count: f.packet_count,
                bytes: f.bytes,
                start_ts: f.start_ts,
                last_ts: f.last_ts,
            })
            .collect();
        list.sort_by(|a, b| b.packet_count.cmp(&a.packet_count).then(a.key.cmp(&b.key)));
        list.truncate(limit);
        list
    }

    pub fn stats(&self) -> AssemblerStats {
        AssemblerStats { active_flows: self.flows.len(), ..self.stats.clone() }
    }
}
