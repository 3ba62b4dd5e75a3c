//! Missing value handling

use crate::data::{ColumnData, Dataset};
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Strategy for handling missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingStrategy {
    /// Drop every row with a missing value in any column
    Drop,
    /// Numeric columns take their mean, categorical columns their mode
    Mean,
    /// Numeric columns take their median, categorical columns their mode
    Median,
}

impl FromStr for MissingStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop" => Ok(MissingStrategy::Drop),
            "mean" => Ok(MissingStrategy::Mean),
            "median" => Ok(MissingStrategy::Median),
            other => Err(PipelineError::invalid_parameter(
                "handle_missing",
                other,
                "expected 'drop', 'mean' or 'median'",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FillValue {
    Numeric(f64),
    Text(String),
}

/// Imputer applied to every column of a dataset
#[derive(Debug, Clone)]
pub struct Imputer {
    strategy: MissingStrategy,
}

impl Imputer {
    pub fn new(strategy: MissingStrategy) -> Self {
        Self { strategy }
    }

    /// Return a cleaned copy of `dataset`.
    ///
    /// Columns without any observed value have nothing to fill from and are
    /// left as they are.
    pub fn apply(&self, dataset: &Dataset) -> Dataset {
        if self.strategy == MissingStrategy::Drop {
            return dataset.drop_missing_rows();
        }

        let mut result = dataset.clone();
        for column in result.columns_mut() {
            let Some(fill) = self.fill_value(&column.data) else {
                continue;
            };
            match (&mut column.data, fill) {
                (ColumnData::Numeric { values, .. }, FillValue::Numeric(v)) => {
                    values.iter_mut().filter(|x| x.is_none()).for_each(|x| *x = Some(v));
                }
                (ColumnData::Categorical(values), FillValue::Text(s)) => {
                    values
                        .iter_mut()
                        .filter(|x| x.is_none())
                        .for_each(|x| *x = Some(s.clone()));
                }
                _ => {}
            }
        }
        result
    }

    fn fill_value(&self, data: &ColumnData) -> Option<FillValue> {
        match data {
            ColumnData::Numeric { values, .. } => {
                let observed: Vec<f64> = values.iter().flatten().copied().collect();
                let value = match self.strategy {
                    MissingStrategy::Median => median(&observed),
                    _ => mean(&observed),
                };
                value.map(FillValue::Numeric)
            }
            ColumnData::Categorical(values) => mode(values.iter().flatten()).map(FillValue::Text),
        }
    }
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Most frequent value; ties go to the smallest value
pub(crate) fn mode<'a>(values: impl Iterator<Item = &'a String>) -> Option<String> {
    let mut counts: BTreeMap<&String, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let best = counts.values().copied().max()?;
    counts
        .into_iter()
        .find(|(_, c)| *c == best)
        .map(|(v, _)| v.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Column::numeric("a", vec![Some(1.0), None, Some(3.0), Some(10.0)]),
            Column::categorical(
                "c",
                vec![Some("x".into()), Some("y".into()), None, Some("y".into())],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_drop() {
        let out = Imputer::new(MissingStrategy::Drop).apply(&dataset());
        assert_eq!(out.n_rows(), 2);
    }

    #[test]
    fn test_mean_and_mode() {
        let out = Imputer::new(MissingStrategy::Mean).apply(&dataset());
        assert_eq!(out.n_rows(), 4);
        let a = out.column("a").unwrap();
        assert_eq!(a.json_value(1), serde_json::json!(14.0 / 3.0));
        let c = out.column("c").unwrap();
        assert_eq!(c.json_value(2), serde_json::json!("y"));
    }

    #[test]
    fn test_median() {
        let out = Imputer::new(MissingStrategy::Median).apply(&dataset());
        assert_eq!(out.column("a").unwrap().json_value(1), serde_json::json!(3.0));
    }

    #[test]
    fn test_all_missing_column_untouched() {
        let ds = Dataset::new(vec![Column::numeric("a", vec![None, None])]).unwrap();
        let out = Imputer::new(MissingStrategy::Mean).apply(&ds);
        assert_eq!(out.column("a").unwrap().null_count(), 2);
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("median".parse::<MissingStrategy>().unwrap(), MissingStrategy::Median);
        assert!("zero".parse::<MissingStrategy>().is_err());
    }

    #[test]
    fn test_mode_tie_picks_smallest() {
        let values = vec!["b".to_string(), "a".to_string()];
        assert_eq!(mode(values.iter()).as_deref(), Some("a"));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }
}
