//! Data preprocessing module
//!
//! Turns a raw [`Dataset`] into a numeric feature matrix and a label vector:
//! - Missing value handling (row dropping, mean/median/mode imputation)
//! - Feature scaling (StandardScaler, MinMaxScaler)
//! - Categorical encoding (full one-hot expansion)

mod config;
mod encoder;
mod imputer;
mod scaler;

pub use config::PreprocessingConfig;
pub use encoder::{OneHotEncoder, MISSING_CATEGORY};
pub use imputer::{Imputer, MissingStrategy};
pub use scaler::{Scaler, ScalerType};

use crate::data::{distinct_labels, Column, ColumnData, Dataset, Label};
use crate::error::{PipelineError, Result};
use ndarray::{concatenate, Array2, Axis};
use std::time::Instant;
use tracing::debug;

/// Output of a successful preprocessing run
#[derive(Debug, Clone)]
pub struct PreprocessedData {
    /// Numeric feature matrix, one row per surviving dataset row
    pub features: Array2<f64>,
    /// Raw target values aligned with `features` rows
    pub labels: Vec<Label>,
    /// Original feature columns used, target excluded
    pub selected_features: Vec<String>,
    /// Column used as label source
    pub target: String,
    /// Output column names after categorical expansion
    pub feature_names: Vec<String>,
}

impl PreprocessedData {
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_dims(&self) -> usize {
        self.features.ncols()
    }
}

/// Main data preprocessing pipeline
#[derive(Debug, Clone)]
pub struct DataPreprocessor {
    config: PreprocessingConfig,
}

impl DataPreprocessor {
    pub fn with_config(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Run every preprocessing step on a copy of `dataset`
    pub fn fit_transform(&self, dataset: &Dataset) -> Result<PreprocessedData> {
        let start = Instant::now();
        let target = self.config.target.clone();

        if dataset.column(&target).is_none() {
            return Err(PipelineError::InvalidTarget(target));
        }

        let cleaned = Imputer::new(self.config.missing_strategy).apply(dataset);

        let features = self.config.feature_columns();
        if let Some(missing) = features.iter().find(|f| cleaned.column(f).is_none()) {
            return Err(PipelineError::InvalidFeature(missing.clone()));
        }

        let target_column = cleaned
            .column(&target)
            .ok_or_else(|| PipelineError::InvalidTarget(target.clone()))?;
        let n_classes = target_column.n_unique();
        if n_classes < 2 {
            return Err(PipelineError::InsufficientClasses { found: n_classes });
        }

        let (numeric, categorical): (Vec<&Column>, Vec<&Column>) = features
            .iter()
            .filter_map(|f| cleaned.column(f))
            .partition(|c| c.is_numeric());

        let mut numeric_block = numeric_matrix(&numeric, cleaned.n_rows())?;
        if !numeric.is_empty() {
            numeric_block = Scaler::new(self.config.scaler_type).fit_transform(&numeric_block)?;
        }

        let mut encoder = OneHotEncoder::new();
        let categorical_block = encoder.fit_transform(&categorical)?;
        let categorical_block = if categorical.is_empty() {
            Array2::zeros((cleaned.n_rows(), 0))
        } else {
            categorical_block
        };

        let matrix = concatenate(Axis(1), &[numeric_block.view(), categorical_block.view()])?;

        let mut feature_names: Vec<String> = numeric.iter().map(|c| c.name.clone()).collect();
        feature_names.extend(encoder.feature_names());

        let labels = target_column.labels().ok_or_else(|| {
            PipelineError::ComputationError(format!(
                "target column '{}' still has missing values",
                target
            ))
        })?;

        debug!(
            samples = matrix.nrows(),
            dims = matrix.ncols(),
            numeric = numeric.len(),
            categorical = categorical.len(),
            classes = distinct_labels(&labels).len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Preprocessing finished"
        );

        Ok(PreprocessedData {
            features: matrix,
            labels,
            selected_features: features,
            target,
            feature_names,
        })
    }
}

/// Stack numeric columns into a row-major matrix
fn numeric_matrix(columns: &[&Column], n_rows: usize) -> Result<Array2<f64>> {
    let col_data: Vec<&Vec<Option<f64>>> = columns
        .iter()
        .map(|c| match &c.data {
            ColumnData::Numeric { values, .. } => {
                if values.iter().any(Option::is_none) {
                    Err(PipelineError::ComputationError(format!(
                        "feature '{}' has missing values that could not be imputed",
                        c.name
                    )))
                } else {
                    Ok(values)
                }
            }
            ColumnData::Categorical(_) => Err(PipelineError::ComputationError(format!(
                "feature '{}' is not numeric",
                c.name
            ))),
        })
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, col_data.len()), |(r, c)| {
        col_data[c][r].unwrap_or(f64::NAN)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Column::numeric("x1", vec![Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)]),
            Column::categorical(
                "color",
                vec![
                    Some("red".into()),
                    Some("blue".into()),
                    Some("red".into()),
                    None,
                    Some("green".into()),
                ],
            ),
            Column::numeric("x2", vec![Some(10.0), Some(20.0), Some(30.0), Some(40.0), Some(50.0)]),
            Column::categorical(
                "label",
                vec![
                    Some("a".into()),
                    Some("b".into()),
                    Some("a".into()),
                    Some("b".into()),
                    Some("a".into()),
                ],
            ),
        ])
        .unwrap()
    }

    fn features() -> Vec<String> {
        vec!["color".into(), "x1".into(), "label".into(), "x2".into()]
    }

    #[test]
    fn test_drop_standard() {
        let config = PreprocessingConfig::new("label", features());
        let out = DataPreprocessor::with_config(config).fit_transform(&dataset()).unwrap();

        // rows 2 and 3 had missing values
        assert_eq!(out.n_samples(), 3);
        assert_eq!(out.labels.len(), out.n_samples());
        assert_eq!(out.selected_features, vec!["color", "x1", "x2"]);
        assert_eq!(
            out.feature_names,
            vec!["x1", "x2", "color_blue", "color_green", "color_red"]
        );
        assert_eq!(out.n_dims(), out.feature_names.len());

        let col = out.features.column(0);
        let mean = col.sum() / col.len() as f64;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
        assert!(mean.abs() < 1e-9);
        assert!((var - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_imputation_keeps_rows() {
        let config = PreprocessingConfig::new("label", features())
            .with_missing(MissingStrategy::Mean)
            .with_scaler(ScalerType::None);
        let out = DataPreprocessor::with_config(config).fit_transform(&dataset()).unwrap();

        assert_eq!(out.n_samples(), 5);
        assert_eq!(out.features[[2, 0]], 3.0);
        // missing color imputed with mode "red"
        assert_eq!(out.features[[3, 4]], 1.0);
    }

    #[test]
    fn test_minmax_range() {
        let config = PreprocessingConfig::new("label", vec!["x2".into()])
            .with_scaler(ScalerType::MinMax);
        let out = DataPreprocessor::with_config(config).fit_transform(&dataset()).unwrap();
        assert!(out.features.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_invalid_target() {
        let config = PreprocessingConfig::new("nope", features());
        let err = DataPreprocessor::with_config(config).fit_transform(&dataset()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTarget(_)));
    }

    #[test]
    fn test_invalid_feature() {
        let config = PreprocessingConfig::new("label", vec!["ghost".into()]);
        let err = DataPreprocessor::with_config(config).fit_transform(&dataset()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFeature(f) if f == "ghost"));
    }

    #[test]
    fn test_single_class_target() {
        let ds = Dataset::new(vec![
            Column::numeric("x", vec![Some(1.0), Some(2.0)]),
            Column::numeric("y", vec![Some(1.0), Some(1.0)]),
        ])
        .unwrap();
        let config = PreprocessingConfig::new("y", vec!["x".into()]);
        let err = DataPreprocessor::with_config(config).fit_transform(&ds).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientClasses { found: 1 }));
    }

    #[test]
    fn test_no_features() {
        let config = PreprocessingConfig::new("label", vec![]);
        let out = DataPreprocessor::with_config(config).fit_transform(&dataset()).unwrap();
        assert_eq!(out.n_dims(), 0);
        assert_eq!(out.n_samples(), 3);
    }
}
