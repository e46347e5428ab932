//! Inference Engine - ONNX Runtime Scorer
//!
//! Loads an exported classifier (random forest or feed-forward network)
//! and exposes it through the `Scorer` seam.
//!
//! Artifact layout inside a model directory:
//! - `<id>.onnx`       the model
//! - `<id>.meta.json`  feature names, scaler, class mapping, optional sha256

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Value;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::cache::ArtifactCache;
use super::preprocess::StandardScaler;
use super::scorer::{ScoreOutput, Scorer, ScorerError, ScorerMetadata};

// ============================================================================
// ARTIFACTS
// ============================================================================

/// Contents of `<id>.meta.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
    /// Class index (as string) → label
    pub class_mapping: BTreeMap<String, String>,
    /// Hex SHA-256 of the `.onnx` file
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Loaded, shareable model session
pub struct OnnxArtifact {
    session: Mutex<Session>,
    output_name: String,
}

/// Shared cache type for ONNX sessions
pub type SessionCache = ArtifactCache<OnnxArtifact>;

// ============================================================================
// SCORER
// ============================================================================

pub struct OnnxScorer {
    id: String,
    model_path: PathBuf,
    metadata: ScorerMetadata,
    labels: Vec<String>,
    sha256: Option<String>,
    cache: Arc<SessionCache>,
}

impl OnnxScorer {
    /// Read `<dir>/<id>.meta.json`; the session itself loads lazily on first score
    pub fn from_dir(dir: &Path, id: &str, cache: Arc<SessionCache>) -> Result<Self, ScorerError> {
        let model_path = dir.join(format!("{}.onnx", id));
        let manifest_path = dir.join(format!("{}.meta.json", id));

        if !model_path.exists() {
            return Err(ScorerError::Artifact(format!("model not found: {}", model_path.display())));
        }

        let raw = std::fs::read(&manifest_path)
            .map_err(|e| ScorerError::Artifact(format!("{}: {}", manifest_path.display(), e)))?;
        let manifest: ModelManifest = serde_json::from_slice(&raw)
            .map_err(|e| ScorerError::Artifact(format!("{}: {}", manifest_path.display(), e)))?;

        Self::from_manifest(id, model_path, manifest, cache)
    }

    pub fn from_manifest(
        id: &str,
        model_path: PathBuf,
        manifest: ModelManifest,
        cache: Arc<SessionCache>,
    ) -> Result<Self, ScorerError> {
        if let Some(scaler) = &manifest.scaler {
            if !scaler.fits(manifest.feature_names.len()) {
                return Err(ScorerError::Artifact(format!(
                    "scaler has {} entries for {} features",
                    scaler.len(),
                    manifest.feature_names.len()
                )));
            }
        }

        let labels = class_labels(&manifest.class_mapping)?;

        log::info!(
            "ONNX scorer '{}' registered ({} features, {} classes)",
            id,
            manifest.feature_names.len(),
            labels.len()
        );

        Ok(Self {
            id: id.to_string(),
            model_path,
            metadata: ScorerMetadata {
                feature_names: manifest.feature_names,
                preprocessing: manifest.scaler,
            },
            labels,
            sha256: manifest.sha256,
            cache,
        })
    }

    fn cache_key(&self) -> String {
        self.model_path.to_string_lossy().into_owned()
    }

    fn artifact(&self) -> Result<Arc<OnnxArtifact>, ScorerError> {
        self.cache.get_or_load(&self.cache_key(), || {
            load_session(&self.model_path, self.sha256.as_deref())
        })
    }
}

impl Scorer for OnnxScorer {
    fn id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &ScorerMetadata {
        &self.metadata
    }

    fn score(&self, input: &[f32]) -> Result<ScoreOutput, ScorerError> {
        let width = self.metadata.feature_names.len();
        if input.len() != width {
            return Err(ScorerError::Input(format!("expected {} values, got {}", width, input.len())));
        }

        let artifact = self.artifact()?;

        let input_array = Array2::<f32>::from_shape_vec((1, width), input.to_vec())
            .map_err(|e| ScorerError::Input(format!("Array error: {}", e)))?;
        let input_tensor = Value::from_array(input_array)
            .map_err(|e| ScorerError::Inference(format!("Tensor error: {}", e)))?;

        let mut session = artifact.session.lock();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ScorerError::Inference(e.to_string()))?;

        let output = outputs
            .get(&artifact.output_name)
            .ok_or_else(|| ScorerError::Inference("No output".to_string()))?;
        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ScorerError::Inference(format!("Extract error: {}", e)))?;

        let probabilities: Vec<f64> = tensor.1.iter().map(|&p| p as f64).collect();
        decode_probabilities(&probabilities, &self.labels)
    }

    fn release(&self) {
        self.cache.clear();
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn load_session(path: &Path, expected_sha256: Option<&str>) -> Result<OnnxArtifact, ScorerError> {
    log::info!("Loading ONNX model from: {}", path.display());

    let bytes = std::fs::read(path)
        .map_err(|e| ScorerError::Artifact(format!("{}: {}", path.display(), e)))?;

    if let Some(expected) = expected_sha256 {
        verify_checksum(path, &bytes, expected)?;
    }

    let session = Session::builder()
        .map_err(|e| ScorerError::Artifact(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ScorerError::Artifact(format!("Failed to set optimization: {}", e)))?
        .commit_from_memory(&bytes)
        .map_err(|e| ScorerError::Artifact(format!("Failed to load model: {}", e)))?;

    // Classifiers export (label, probabilities); take the last output
    let output_name = session
        .outputs
        .last()
        .map(|o| o.name.clone())
        .ok_or_else(|| ScorerError::Artifact("No output defined".to_string()))?;

    log::info!("ONNX model loaded ({} bytes, output '{}')", bytes.len(), output_name);

    Ok(OnnxArtifact { session: Mutex::new(session), output_name })
}

/// Compare a file's SHA-256 against the manifest
pub fn verify_checksum(path: &Path, bytes: &[u8], expected: &str) -> Result<(), ScorerError> {
    let actual = hex::encode(Sha256::digest(bytes));
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(ScorerError::Integrity {
            path: path.display().to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Dense label table from the `{"0": "BenignTraffic", ...}` mapping
fn class_labels(mapping: &BTreeMap<String, String>) -> Result<Vec<String>, ScorerError> {
    let mut indexed: Vec<(usize, String)> = Vec::with_capacity(mapping.len());
    for (k, v) in mapping {
        let idx: usize = k
            .parse()
            .map_err(|_| ScorerError::Artifact(format!("bad class index '{}'", k)))?;
        indexed.push((idx, v.clone()));
    }
    indexed.sort_by_key(|(i, _)| *i);
    if indexed.iter().enumerate().any(|(pos, (i, _))| pos != *i) {
        return Err(ScorerError::Artifact("class mapping indices must be 0..n".to_string()));
    }
    if indexed.is_empty() {
        return Err(ScorerError::Artifact("empty class mapping".to_string()));
    }
    Ok(indexed.into_iter().map(|(_, label)| label).collect())
}

/// Argmax over class probabilities
pub fn decode_probabilities(probabilities: &[f64], labels: &[String]) -> Result<ScoreOutput, ScorerError> {
    if probabilities.len() < labels.len() {
        return Err(ScorerError::Inference(format!(
            "model produced {} scores for {} classes",
            probabilities.len(),
            labels.len()
        )));
    }

    let (best, confidence) = probabilities[..labels.len()]
        .iter()
        .copied()
        .enumerate()
        .fold((0usize, f64::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });

    Ok(ScoreOutput {
        label: labels[best].clone(),
        confidence: if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["BenignTraffic".into(), "DDoS-SYN_Flood".into(), "Recon-PortScan".into()]
    }

    #[test]
    fn test_decode_argmax() {
        let out = decode_probabilities(&[0.1, 0.7, 0.2], &labels()).unwrap();
        assert_eq!(out.label, "DDoS-SYN_Flood");
        assert!((out.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_decode_short_output() {
        assert!(decode_probabilities(&[0.5, 0.5], &labels()).is_err());
    }

    #[test]
    fn test_class_labels_dense() {
        let mut m = BTreeMap::new();
        m.insert("1".to_string(), "B".to_string());
        m.insert("0".to_string(), "A".to_string());
        assert_eq!(class_labels(&m).unwrap(), vec!["A", "B"]);

        m.insert("5".to_string(), "C".to_string());
        assert!(class_labels(&m).is_err());
    }

    #[test]
    fn test_checksum() {
        let data = b"model-bytes";
        let good = hex::encode(Sha256::digest(data));
        assert!(verify_checksum(Path::new("m.onnx"), data, &good).is_ok());
        assert!(matches!(
            verify_checksum(Path::new("m.onnx"), data, "00"),
            Err(ScorerError::Integrity { .. })
        ));
    }

    #[test]
    fn test_manifest_and_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(SessionCache::new());
        let err = OnnxScorer::from_dir(dir.path(), "random_forest", cache.clone());
        assert!(matches!(err, Err(ScorerError::Artifact(_))));

        let manifest = ModelManifest {
            feature_names: vec!["a".into(), "b".into()],
            scaler: Some(StandardScaler { mean: vec![0.0], scale: vec![1.0] }),
            class_mapping: [("0".to_string(), "BenignTraffic".to_string())].into_iter().collect(),
            sha256: None,
        };
        let err = OnnxScorer::from_manifest("rf", dir.path().join("rf.onnx"), manifest, cache);
        assert!(matches!(err, Err(ScorerError::Artifact(_))));
    }

    #[test]
    fn test_unloadable_model_fails_score() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rf.onnx"), b"not a model").unwrap();
        let manifest = ModelManifest {
            feature_names: vec!["a".into()],
            scaler: None,
            class_mapping: [("0".to_string(), "BenignTraffic".to_string())].into_iter().collect(),
            sha256: Some("deadbeef".into()),
        };
        std::fs::write(dir.path().join("rf.meta.json"), serde_json::to_vec(&manifest).unwrap()).unwrap();

        let cache = Arc::new(SessionCache::new());
        let scorer = OnnxScorer::from_dir(dir.path(), "rf", cache.clone()).unwrap();
        assert_eq!(scorer.metadata().feature_names, vec!["a".to_string()]);
        assert!(matches!(scorer.score(&[1.0]), Err(ScorerError::Integrity { .. })));
        assert!(cache.is_empty());
    }
}
