//! Model traits and label encoding

use crate::data::{distinct_labels, Label};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};

/// Common interface for classifiers fitted on encoded class indices
pub trait Classifier: Send + Sync {
    /// Fit the model on features and class indices in `0..n_classes`
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()>;

    /// Predict class indices
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>>;
}

/// Number of classes implied by a vector of class indices
pub(crate) fn n_classes(y: &Array1<usize>) -> usize {
    y.iter().copied().max().map_or(0, |m| m + 1)
}

/// Maps raw labels to dense class indices in sorted label order
#[derive(Debug, Clone, Default)]
pub struct LabelEncoder {
    classes: Vec<Label>,
}

impl LabelEncoder {
    /// Learn the sorted distinct classes
    pub fn fit(labels: &[Label]) -> Self {
        Self {
            classes: distinct_labels(labels),
        }
    }

    pub fn classes(&self) -> &[Label] {
        &self.classes
    }

    pub fn transform(&self, labels: &[Label]) -> Result<Array1<usize>> {
        labels
            .iter()
            .map(|label| {
                self.classes.binary_search(label).map_err(|_| {
                    PipelineError::ComputationError(format!("unknown class label '{}'", label))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Array1::from_vec)
    }

    pub fn inverse_transform(&self, indices: &Array1<usize>) -> Result<Vec<Label>> {
        indices
            .iter()
            .map(|&i| {
                self.classes.get(i).cloned().ok_or_else(|| {
                    PipelineError::ComputationError(format!("class index {} out of range", i))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_label_encoder_sorted() {
        let labels = vec![
            Label::Text("b".into()),
            Label::Text("a".into()),
            Label::Text("b".into()),
        ];
        let encoder = LabelEncoder::fit(&labels);
        assert_eq!(encoder.classes().len(), 2);
        assert_eq!(encoder.transform(&labels).unwrap(), array![1, 0, 1]);
        assert_eq!(
            encoder.inverse_transform(&array![0, 1]).unwrap(),
            vec![Label::Text("a".into()), Label::Text("b".into())]
        );
    }

    #[test]
    fn test_unknown_label() {
        let encoder = LabelEncoder::fit(&[Label::Int(0), Label::Int(1)]);
        assert!(encoder.transform(&[Label::Int(7)]).is_err());
        assert!(encoder.inverse_transform(&array![2]).is_err());
    }

    #[test]
    fn test_n_classes() {
        assert_eq!(n_classes(&array![0, 2, 1]), 3);
        assert_eq!(n_classes(&Array1::<usize>::zeros(0)), 0);
    }
}
