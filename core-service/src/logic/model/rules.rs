//! Rule scorer - model-free fallback
//!
//! Classic volumetric and scan heuristics over named flow features. Used
//! when no trained model is configured, and as a safety net member of the
//! ensemble.

use crate::constants::{BENIGN_LABEL, RULES_ID};
use crate::logic::features::FeatureSchema;
use super::scorer::{ScoreOutput, Scorer, ScorerError, ScorerMetadata};

// ============================================================================
// CONSTANTS
// ============================================================================

const SYN_FLOOD_RATIO: f64 = 0.7;
const SYN_FLOOD_MIN_SYN: f64 = 20.0;
const SYN_FLOOD_MIN_RATE: f64 = 100.0;

const SCAN_MIN_PACKETS: f64 = 10.0;
const SCAN_MAX_AVG_SIZE: f64 = 100.0;
const SCAN_MIN_FLAGS: f64 = 5.0;

const UDP_FLOOD_MIN_PACKETS: f64 = 20.0;
const UDP_FLOOD_MIN_RATE: f64 = 200.0;

const HIGH_RATE: f64 = 500.0;

const SIZE_CV_LIMIT: f64 = 2.0;

const BENIGN_CONFIDENCE: f64 = 0.6;

/// Feature columns the rules read
struct Columns {
    rate: usize,
    syn: usize,
    ack: usize,
    fin: usize,
    rst: usize,
    tcp: usize,
    udp: usize,
    tot_sum: usize,
    avg: usize,
    variance: usize,
}

impl Columns {
    fn resolve(schema: FeatureSchema) -> Option<Self> {
        Some(Self {
            rate: schema.index_of("Rate")?,
            syn: schema.index_of("syn_flag_number")?,
            ack: schema.index_of("ack_flag_number")?,
            fin: schema.index_of("fin_flag_number")?,
            rst: schema.index_of("rst_count")?,
            tcp: schema.index_of("TCP")?,
            udp: schema.index_of("UDP")?,
            tot_sum: schema.index_of("Tot sum")?,
            avg: schema.index_of("AVG")?,
            variance: schema.index_of("Variance")?,
        })
    }
}

pub struct RuleScorer {
    metadata: ScorerMetadata,
    columns: Columns,
}

impl RuleScorer {
    pub fn new(schema: FeatureSchema) -> Result<Self, ScorerError> {
        let columns = Columns::resolve(schema)
            .ok_or_else(|| ScorerError::Artifact(format!("schema {} lacks rule columns", schema)))?;
        Ok(Self {
            metadata: ScorerMetadata {
                feature_names: schema.names().iter().map(|s| s.to_string()).collect(),
                preprocessing: None,
            },
            columns,
        })
    }

    fn classify(&self, x: &[f32]) -> ScoreOutput {
        let c = &self.columns;
        let get = |i: usize| x.get(i).copied().unwrap_or(0.0) as f64;

        let rate = get(c.rate);
        let syn = get(c.syn);
        let rst = get(c.rst);
        let avg = get(c.avg);
        let packets = if avg > 0.0 { get(c.tot_sum) / avg } else { 0.0 };

        if packets > 0.0 {
            let syn_ratio = syn / packets;
            if syn_ratio > SYN_FLOOD_RATIO && syn > SYN_FLOOD_MIN_SYN && rate > SYN_FLOOD_MIN_RATE {
                return ScoreOutput::new("DDoS-SYN_Flood", 0.85);
            }
        }

        if packets > SCAN_MIN_PACKETS && avg < SCAN_MAX_AVG_SIZE && (syn > SCAN_MIN_FLAGS || rst > SCAN_MIN_FLAGS) {
            return ScoreOutput::new("Recon-PortScan", 0.75);
        }

        let tcp_flags = syn + get(c.ack) + get(c.fin);
        if get(c.udp) > 0.0 && tcp_flags == 0.0 && packets > UDP_FLOOD_MIN_PACKETS && rate > UDP_FLOOD_MIN_RATE {
            return ScoreOutput::new("DDoS-UDP_Flood", 0.80);
        }

        if rate > HIGH_RATE {
            let label = if get(c.tcp) > 0.0 { "DoS-TCP_Flood" } else { "DoS-UDP_Flood" };
            return ScoreOutput::new(label, 0.70);
        }

        let std = get(c.variance).sqrt();
        if avg > 0.0 && std / avg > SIZE_CV_LIMIT && packets > SCAN_MIN_PACKETS {
            return ScoreOutput::new("DDoS-UDP_Fragmentation", 0.65);
        }

        ScoreOutput::new(BENIGN_LABEL, BENIGN_CONFIDENCE)
    }
}

impl Scorer for RuleScorer {
    fn id(&self) -> &str {
        RULES_ID
    }

    fn metadata(&self) -> &ScorerMetadata {
        &self.metadata
    }

    fn score(&self, input: &[f32]) -> Result<ScoreOutput, ScorerError> {
        if input.len() != self.metadata.feature_names.len() {
            return Err(ScorerError::Input(format!(
                "expected {} values, got {}",
                self.metadata.feature_names.len(),
                input.len()
            )));
        }
        Ok(self.classify(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    use crate::logic::features::FeatureEngine;
    use crate::logic::packet::{Packet, TcpFlags};

    fn score(packets: &[Packet]) -> ScoreOutput {
        let schema = FeatureSchema::Ciciot37;
        let v = FeatureEngine::new(schema).extract(packets);
        RuleScorer::new(schema).unwrap().score(&v.to_f32()).unwrap()
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(172, 16, 0, last))
    }

    #[test]
    fn test_syn_flood() {
        let packets: Vec<Packet> = (0..40)
            .map(|i| Packet::tcp(i as f64 * 0.001, ip(1), ip(2), 4000, 80, TcpFlags::syn(), 60))
            .collect();
        let out = score(&packets);
        assert_eq!(out.label, "DDoS-SYN_Flood");
        assert_eq!(out.confidence, 0.85);
    }

    #[test]
    fn test_udp_flood() {
        let packets: Vec<Packet> = (0..30)
            .map(|i| Packet::udp(i as f64 * 0.001, ip(1), ip(2), 4000, 9999, 512))
            .collect();
        assert_eq!(score(&packets).label, "DDoS-UDP_Flood");
    }

    #[test]
    fn test_quiet_flow_is_benign() {
        let packets: Vec<Packet> = (0..10)
            .map(|i| Packet::tcp(i as f64, ip(1), ip(2), 4000, 443, TcpFlags::ack(), 800))
            .collect();
        let out = score(&packets);
        assert_eq!(out.label, BENIGN_LABEL);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let scorer = RuleScorer::new(FeatureSchema::Ciciot46).unwrap();
        assert!(scorer.score(&[0.0; 37]).is_err());
        assert_eq!(scorer.metadata().feature_names.len(), 46);
    }
}
