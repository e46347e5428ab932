//! Scorer preprocessing: standard scaling and outlier clipping

use serde::{Deserialize, Serialize};

/// Serialized standard-scaler parameters (`(x - mean) / scale`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Scaler dimensions agree with each other and with `features`
    pub fn fits(&self, features: usize) -> bool {
        self.mean.len() == features && self.scale.len() == features
    }
}

/// Model-ready input plus how many entries were clipped
#[derive(Debug, Clone)]
pub struct Prepared {
    pub values: Vec<f32>,
    pub clipped: usize,
}

/// Standardize then clip to +/- `clip_z` (when given)
///
/// Without a scaler the raw values pass through unclipped.
/// A zero scale is treated as 1.
pub fn prepare(values: &[f64], scaler: Option<&StandardScaler>, clip_z: Option<f64>) -> Prepared {
    let scaler = match scaler {
        Some(s) => s,
        None => {
            return Prepared {
                values: values.iter().map(|&v| v as f32).collect(),
                clipped: 0,
            }
        }
    };

    let mut clipped = 0;
    let out = values
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let mean = scaler.mean.get(i).copied().unwrap_or(0.0);
            let scale = scaler.scale.get(i).copied().filter(|s| *s != 0.0).unwrap_or(1.0);
            let mut z = (x - mean) / scale;
            if !z.is_finite() {
                z = 0.0;
            }
            if let Some(bound) = clip_z {
                if z > bound || z < -bound {
                    clipped += 1;
                    z = z.clamp(-bound, bound);
                }
            }
            z as f32
        })
        .collect();

    Prepared { values: out, clipped }
}
