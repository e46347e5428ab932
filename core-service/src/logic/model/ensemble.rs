//! Ensemble Detection Engine
//!
//! Combines independent scorer verdicts into one decision.
//!
//! Policies:
//! - weighted-threshold (default): `Σ w·c` gated by the acceptance threshold
//! - majority vote: most frequent label, ties to the first seen
//! - highest confidence: single most confident scorer wins
//!
//! Weights are normalized over the enabled scorers so the fused confidence
//! stays a convex combination of the individual ones.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::constants::BENIGN_LABEL;
use crate::logic::config::{EnsembleConfig, FusionPolicy};
use crate::logic::features::vector::{check_names, validate, FeatureContractError};
use crate::logic::features::{FeatureSchema, FeatureVector};
use super::instrumentation::{Instrumentation, LogInstrumentation};
use super::preprocess;
use super::scorer::{Prediction, Scorer};
use super::severity::{severity_for, Severity};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Which fusion rule produced the verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FusionMethod {
    ThresholdFiltered,
    Unanimous,
    /// Disagreement resolved in favour of this scorer
    Scorer(String),
    MajorityVote,
    HighestConfidence(String),
}

impl fmt::Display for FusionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FusionMethod::ThresholdFiltered => f.write_str("threshold_filtered"),
            FusionMethod::Unanimous => f.write_str("unanimous"),
            FusionMethod::Scorer(id) => f.write_str(id),
            FusionMethod::MajorityVote => f.write_str("majority_vote"),
            FusionMethod::HighestConfidence(id) => write!(f, "confidence:{}", id),
        }
    }
}

impl Serialize for FusionMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One member's contribution to a decision
#[derive(Debug, Clone, Serialize)]
pub struct ScorerVote {
    pub scorer: String,
    /// Normalized weight
    pub weight: f64,
    pub prediction: Prediction,
    /// Scorer raised; prediction is the zero-confidence benign stand-in
    pub failed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsembleResult {
    pub label: String,
    pub severity: Severity,
    pub confidence: f64,
    pub method: FusionMethod,
    /// Σ weight × confidence over all members
    pub weighted_confidence: f64,
    pub votes: Vec<ScorerVote>,
}

impl EnsembleResult {
    pub fn is_benign(&self) -> bool {
        self.label == BENIGN_LABEL
    }
}

#[derive(Debug, Error)]
pub enum EnsembleError {
    #[error("no enabled scorers")]
    NoScorers,
    #[error("scorer '{scorer}' rejected: {source}")]
    Contract {
        scorer: String,
        #[source]
        source: FeatureContractError,
    },
    #[error("scorer '{scorer}' has invalid weight {weight}")]
    InvalidWeight { scorer: String, weight: f64 },
    #[error("scorer '{scorer}' preprocessing does not fit {features} features")]
    Preprocessing { scorer: String, features: usize },
}

struct Member {
    scorer: Box<dyn Scorer>,
    weight: f64,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct EnsembleEngine {
    members: Vec<Member>,
    config: EnsembleConfig,
    schema: FeatureSchema,
    instrumentation: Box<dyn Instrumentation>,
}

impl EnsembleEngine {
    /// Wire scorers against `schema`; any column disagreement is rejected here
    pub fn new(
        scorers: Vec<Box<dyn Scorer>>,
        schema: FeatureSchema,
        config: EnsembleConfig,
    ) -> Result<Self, EnsembleError> {
        Self::with_instrumentation(scorers, schema, config, Box::new(LogInstrumentation))
    }

    pub fn with_instrumentation(
        scorers: Vec<Box<dyn Scorer>>,
        schema: FeatureSchema,
        config: EnsembleConfig,
        instrumentation: Box<dyn Instrumentation>,
    ) -> Result<Self, EnsembleError> {
        let mut members = Vec::new();
        for scorer in scorers {
            let id = scorer.id().to_string();
            if !config.is_enabled(&id) {
                log::info!("Scorer '{}' registered but disabled", id);
                continue;
            }

            let meta = scorer.metadata();
            check_names(schema.names(), &meta.feature_names)
                .map_err(|source| EnsembleError::Contract { scorer: id.clone(), source })?;
            if let Some(scaler) = &meta.preprocessing {
                if !scaler.fits(meta.feature_names.len()) {
                    return Err(EnsembleError::Preprocessing { scorer: id, features: meta.feature_names.len() });
                }
            }

            let weight = config.weight_of(&id);
            if !weight.is_finite() || weight < 0.0 {
                return Err(EnsembleError::InvalidWeight { scorer: id, weight });
            }
            members.push(Member { scorer, weight });
        }

        if members.is_empty() {
            return Err(EnsembleError::NoScorers);
        }

        let ids: Vec<String> = members.iter().map(|m| m.scorer.id().to_string()).collect();
        for (m, (_, weight)) in members.iter_mut().zip(config.normalized_weights(&ids)) {
            m.weight = weight;
        }

        let engine = Self { members, config, schema, instrumentation };
        log::info!(
            "Ensemble ready: schema {} (hash {:08x}), policy {:?}, threshold {}, members [{}]",
            schema,
            schema.layout_hash(),
            engine.config.policy,
            engine.config.acceptance_threshold,
            engine.describe_members()
        );
        Ok(engine)
    }

    fn describe_members(&self) -> String {
        self.members
            .iter()
            .map(|m| format!("{}={:.3}", m.scorer.id(), m.weight))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn scorer_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.scorer.id().to_string()).collect()
    }

    /// (scorer id, normalized weight)
    pub fn weights(&self) -> Vec<(String, f64)> {
        self.members.iter().map(|m| (m.scorer.id().to_string(), m.weight)).collect()
    }

    /// Release every member's cached artifacts
    pub fn release_artifacts(&self) {
        for m in &self.members {
            m.scorer.release();
        }
    }

    /// Score one vector and fuse the verdicts
    ///
    /// A column mismatch fails this attempt only; scorer failures never do.
    pub fn evaluate(&self, features: &FeatureVector) -> Result<EnsembleResult, EnsembleError> {
        for m in &self.members {
            validate(features, &m.scorer.metadata().feature_names).map_err(|source| {
                EnsembleError::Contract { scorer: m.scorer.id().to_string(), source }
            })?;
        }

        let ids: Vec<&str> = self.members.iter().map(|m| m.scorer.id()).collect();
        self.instrumentation.before_fusion(features, &ids);

        let votes: Vec<ScorerVote> = self.members.iter().map(|m| self.vote(m, features)).collect();
        let result = match self.config.policy {
            FusionPolicy::WeightedThreshold => self.weighted_threshold(votes),
            FusionPolicy::MajorityVote => majority_vote(votes),
            FusionPolicy::HighestConfidence => highest_confidence(votes),
        };

        self.instrumentation.after_fusion(&result);
        Ok(result)
    }

    fn vote(&self, member: &Member, features: &FeatureVector) -> ScorerVote {
        let id = member.scorer.id();
        let clip = if self.config.clip_enabled { Some(self.config.clip_z) } else { None };
        let prepared = preprocess::prepare(
            features.values(),
            member.scorer.metadata().preprocessing.as_ref(),
            clip,
        );
        if prepared.clipped > 0 {
            log::debug!("Scorer '{}': clipped {} features to ±{}", id, prepared.clipped, self.config.clip_z);
        }

        match member.scorer.score(&prepared.values) {
            Ok(out) => {
                let confidence = if out.confidence.is_finite() { out.confidence.clamp(0.0, 1.0) } else { 0.0 };
                ScorerVote {
                    scorer: id.to_string(),
                    weight: member.weight,
                    prediction: Prediction {
                        severity: severity_for(&out.label),
                        label: out.label,
                        confidence,
                    },
                    failed: false,
                }
            }
            Err(e) => {
                log::error!("Scorer '{}' failed: {}", id, e);
                ScorerVote {
                    scorer: id.to_string(),
                    weight: member.weight,
                    prediction: Prediction {
                        label: BENIGN_LABEL.to_string(),
                        severity: Severity::Low,
                        confidence: 0.0,
                    },
                    failed: true,
                }
            }
        }
    }

    fn weighted_threshold(&self, votes: Vec<ScorerVote>) -> EnsembleResult {
        let weighted = weighted_confidence(&votes);

        if weighted < self.config.acceptance_threshold {
            return EnsembleResult {
                label: BENIGN_LABEL.to_string(),
                severity: Severity::Low,
                confidence: weighted,
                method: FusionMethod::ThresholdFiltered,
                weighted_confidence: weighted,
                votes,
            };
        }

        let first = votes[0].prediction.label.clone();
        let unanimous = votes.iter().all(|v| v.prediction.label == first);
        if unanimous {
            return EnsembleResult {
                severity: severity_for(&first),
                label: first,
                confidence: (weighted * self.config.unanimous_boost).min(1.0),
                method: FusionMethod::Unanimous,
                weighted_confidence: weighted,
                votes,
            };
        }

        let mut best = 0;
        for (i, v) in votes.iter().enumerate() {
            if v.weight * v.prediction.confidence > votes[best].weight * votes[best].prediction.confidence {
                best = i;
            }
        }
        let label = votes[best].prediction.label.clone();
        EnsembleResult {
            severity: severity_for(&label),
            label,
            confidence: weighted,
            method: FusionMethod::Scorer(votes[best].scorer.clone()),
            weighted_confidence: weighted,
            votes,
        }
    }
}

fn weighted_confidence(votes: &[ScorerVote]) -> f64 {
    votes.iter().map(|v| v.weight * v.prediction.confidence).sum::<f64>().clamp(0.0, 1.0)
}

fn majority_vote(votes: Vec<ScorerVote>) -> EnsembleResult {
    // (label, count, confidence sum) in first-seen order
    let mut tally: Vec<(String, usize, f64)> = Vec::new();
    for v in &votes {
        match tally.iter_mut().find(|(label, _, _)| *label == v.prediction.label) {
            Some(entry) => {
                entry.1 += 1;
                entry.2 += v.prediction.confidence;
            }
            None => tally.push((v.prediction.label.clone(), 1, v.prediction.confidence)),
        }
    }

    let mut winner = 0;
    for (i, entry) in tally.iter().enumerate() {
        if entry.1 > tally[winner].1 {
            winner = i;
        }
    }
    let (label, count, sum) = tally.swap_remove(winner);

    EnsembleResult {
        severity: severity_for(&label),
        label,
        confidence: sum / count as f64,
        method: FusionMethod::MajorityVote,
        weighted_confidence: weighted_confidence(&votes),
        votes,
    }
}

fn highest_confidence(votes: Vec<ScorerVote>) -> EnsembleResult {
    let mut best = 0;
    for (i, v) in votes.iter().enumerate() {
        if v.prediction.confidence > votes[best].prediction.confidence {
            best = i;
        }
    }
    let label = votes[best].prediction.label.clone();
    EnsembleResult {
        severity: severity_for(&label),
        label,
        confidence: votes[best].prediction.confidence,
        method: FusionMethod::HighestConfidence(votes[best].scorer.clone()),
        weighted_confidence: weighted_confidence(&votes),
        votes,
    }
}
