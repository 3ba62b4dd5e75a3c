//! Feature scaling implementations

use crate::error::{PipelineError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// No scaling
    None,
}

impl FromStr for ScalerType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" => Ok(ScalerType::Standard),
            "minmax" => Ok(ScalerType::MinMax),
            "none" => Ok(ScalerType::None),
            other => Err(PipelineError::invalid_parameter(
                "scaling",
                other,
                "expected 'standard', 'minmax' or 'none'",
            )),
        }
    }
}

/// Parameters for a fitted scaler column
#[derive(Debug, Clone, Copy)]
struct ScalerParams {
    center: f64, // mean or min
    scale: f64,  // population std or range
}

/// Column-wise feature scaler over a dense matrix
#[derive(Debug, Clone)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit per-column statistics on the current data
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        self.params = x
            .axis_iter(Axis(1))
            .map(|column| self.compute_params(column))
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data with the fitted statistics
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ComputationError("scaler is not fitted".to_string()));
        }
        if x.ncols() != self.params.len() {
            return Err(PipelineError::ComputationError(format!(
                "scaler fitted on {} columns, got {}",
                self.params.len(),
                x.ncols()
            )));
        }

        let mut result = x.clone();
        for (mut column, params) in result.axis_iter_mut(Axis(1)).zip(&self.params) {
            column.mapv_inplace(|v| (v - params.center) / params.scale);
        }
        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    fn compute_params(&self, column: ArrayView1<f64>) -> ScalerParams {
        let n = column.len();
        match self.scaler_type {
            ScalerType::Standard if n > 0 => {
                let mean = column.sum() / n as f64;
                let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
                let std = variance.sqrt();
                ScalerParams {
                    center: mean,
                    scale: if std == 0.0 { 1.0 } else { std },
                }
            }
            ScalerType::MinMax if n > 0 => {
                let min = column.iter().copied().fold(f64::INFINITY, f64::min);
                let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                }
            }
            _ => ScalerParams {
                center: 0.0,
                scale: 1.0,
            },
        }
    }
}
