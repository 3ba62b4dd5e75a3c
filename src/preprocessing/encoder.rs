//! One-hot encoding of categorical columns

use crate::data::{Column, ColumnData};
use crate::error::{PipelineError, Result};
use ndarray::Array2;

/// Category string used for a missing categorical value
pub const MISSING_CATEGORY: &str = "nan";

/// Full dummy expansion: every distinct value becomes a 0/1 column, none dropped
#[derive(Debug, Clone, Default)]
pub struct OneHotEncoder {
    /// (column name, sorted categories) per encoded column
    categories: Vec<(String, Vec<String>)>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the sorted distinct values of each column
    pub fn fit(&mut self, columns: &[&Column]) -> Result<&mut Self> {
        self.categories = columns
            .iter()
            .map(|column| {
                let mut values = category_strings(column)?;
                values.sort();
                values.dedup();
                Ok((column.name.clone(), values))
            })
            .collect::<Result<_>>()?;
        self.is_fitted = true;
        Ok(self)
    }

    /// Names of the output columns, `<column>_<value>`
    pub fn feature_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|(name, cats)| cats.iter().map(move |c| format!("{}_{}", name, c)))
            .collect()
    }

    pub fn n_outputs(&self) -> usize {
        self.categories.iter().map(|(_, cats)| cats.len()).sum()
    }

    /// Expand the columns into indicator columns, in fitted order
    pub fn transform(&self, columns: &[&Column]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ComputationError("encoder is not fitted".to_string()));
        }
        if columns.len() != self.categories.len() {
            return Err(PipelineError::ComputationError(format!(
                "encoder fitted on {} columns, got {}",
                self.categories.len(),
                columns.len()
            )));
        }

        let n_rows = columns.first().map_or(0, |c| c.len());
        let mut out = Array2::zeros((n_rows, self.n_outputs()));
        let mut offset = 0;

        for (column, (_, cats)) in columns.iter().zip(&self.categories) {
            for (row, value) in category_strings(column)?.iter().enumerate() {
                if let Ok(pos) = cats.binary_search(value) {
                    out[[row, offset + pos]] = 1.0;
                }
            }
            offset += cats.len();
        }

        Ok(out)
    }

    pub fn fit_transform(&mut self, columns: &[&Column]) -> Result<Array2<f64>> {
        self.fit(columns)?;
        self.transform(columns)
    }
}

/// Every cell as a string, with missing values spelled `nan`
fn category_strings(column: &Column) -> Result<Vec<String>> {
    match &column.data {
        ColumnData::Categorical(values) => Ok(values
            .iter()
            .map(|v| v.clone().unwrap_or_else(|| MISSING_CATEGORY.to_string()))
            .collect()),
        ColumnData::Numeric { .. } => Err(PipelineError::ComputationError(format!(
            "column '{}' is numeric and cannot be one-hot encoded",
            column.name
        ))),
    }
}
