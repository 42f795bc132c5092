//! Per-feature mean/variance standardisation.

use serde::{Deserialize, Serialize};

use crate::model::FEATURE_NAMES;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: [f64; FEATURE_NAMES.len()],
    pub std: [f64; FEATURE_NAMES.len()],
}

impl Scaler {
    pub fn fit(rows: &[[f64; FEATURE_NAMES.len()]]) -> Self {
        let n = rows.len() as f64;
        let mut mean = [0.0; FEATURE_NAMES.len()];
        let mut std = [0.0; FEATURE_NAMES.len()];

        if rows.is_empty() {
            std.fill(1.0);
            return Self { mean, std };
        }

        for col in 0..FEATURE_NAMES.len() {
            mean[col] = rows.iter().map(|r| r[col]).sum::<f64>() / n;
        }
        for col in 0..FEATURE_NAMES.len() {
            let var = rows.iter().map(|r| (r[col] - mean[col]).powi(2)).sum::<f64>() / n;
            std[col] = var.sqrt();
            if std[col] == 0.0 {
                std[col] = 1.0;
            }
        }
        Self { mean, std }
    }

    pub fn transform(&self, rows: &[[f64; FEATURE_NAMES.len()]]) -> Vec<[f64; FEATURE_NAMES.len()]> {
        rows.iter()
            .map(|row| {
                let mut out = [0.0; FEATURE_NAMES.len()];
                for col in 0..FEATURE_NAMES.len() {
                    out[col] = (row[col] - self.mean[col]) / self.std[col];
                }
                out
            })
            .collect()
    }

    pub fn fit_transform(rows: &[[f64; FEATURE_NAMES.len()]]) -> (Self, Vec<[f64; FEATURE_NAMES.len()]>) {
        let scaler = Self::fit(rows);
        let transformed = scaler.transform(rows);
        (scaler, transformed)
    }
}
