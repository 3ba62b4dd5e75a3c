//! Linear model implementations

use super::models::{n_classes, Classifier};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};

/// Multinomial logistic regression with L2 penalty.
///
/// Minimises `C * sum(log_loss) + 0.5 * ||W||^2` (scaled by `1 / (C n)`)
/// with full-batch gradient descent. Optimisation runs on internally
/// standardised columns, so `W` is penalised in that space; the fitted
/// `coefficients` and `intercept` are mapped back to the raw features.
/// Two classes are handled by the same softmax formulation.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    /// Fitted coefficients, one column per class
    pub coefficients: Option<Array2<f64>>,
    /// Fitted intercepts, one per class
    pub intercept: Option<Array1<f64>>,
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Iterations run by the last fit
    pub n_iter: usize,
    /// Whether model is fitted
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
            n_iter: 0,
            is_fitted: false,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Per-column mean and population std; constant columns get scale 1
    fn column_stats(x: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
        let n = x.nrows() as f64;
        let mean = x.sum_axis(Axis(0)) / n;
        let scale = x
            .axis_iter(Axis(1))
            .zip(mean.iter())
            .map(|(column, &m)| {
                let std = (column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n).sqrt();
                if std > 0.0 && std.is_finite() { std } else { 1.0 }
            })
            .collect();
        (mean, scale)
    }

    /// Row-wise softmax, shifted by the row max for stability
    fn softmax(logits: &mut Array2<f64>) {
        for mut row in logits.axis_iter_mut(Axis(0)) {
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
    }

    /// Class probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (coefficients, intercept) = match (&self.coefficients, &self.intercept) {
            (Some(w), Some(b)) if self.is_fitted => (w, b),
            _ => return Err(PipelineError::TrainingError("model is not fitted".to_string())),
        };
        if x.ncols() != coefficients.nrows() {
            return Err(PipelineError::ComputationError(format!(
                "expected {} features, got {}",
                coefficients.nrows(),
                x.ncols()
            )));
        }

        let mut proba = x.dot(coefficients) + intercept;
        Self::softmax(&mut proba);
        Ok(proba)
    }
}

impl Classifier for LogisticRegression {
    /// Fit the model using gradient descent
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::ComputationError(format!(
                "x has {} rows but y has {} values",
                n_samples,
                y.len()
            )));
        }
        if n_features == 0 {
            return Err(PipelineError::TrainingError(
                "logistic regression needs at least one feature".to_string(),
            ));
        }
        let k = n_classes(y);
        if k < 2 {
            return Err(PipelineError::TrainingError(
                "logistic regression needs samples of at least 2 classes in the training data"
                    .to_string(),
            ));
        }
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(PipelineError::invalid_parameter("C", self.c, "must be a positive float"));
        }

        let n = n_samples as f64;
        let penalty = 1.0 / (self.c * n);

        // One-hot targets
        let mut targets = Array2::<f64>::zeros((n_samples, k));
        for (i, &class) in y.iter().enumerate() {
            targets[[i, class]] = 1.0;
        }

        let (mean, scale) = Self::column_stats(x);
        let z = (x - &mean) / &scale;

        // Step from the Lipschitz bound of the averaged loss
        let mean_sq_norm = z.mapv(|v| v * v).sum() / n;
        let lr = 1.0 / (0.5 * (mean_sq_norm + 1.0) + penalty);

        let mut weights = Array2::<f64>::zeros((n_features, k));
        let mut bias = Array1::<f64>::zeros(k);
        let mut iterations = 0;

        for _ in 0..self.max_iter {
            iterations += 1;

            let mut proba = z.dot(&weights) + &bias;
            Self::softmax(&mut proba);

            let errors = proba - &targets;
            let dw = z.t().dot(&errors) / n + &weights * penalty;
            let db = errors.sum_axis(Axis(0)) / n;

            let grad_norm = (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
            if !grad_norm.is_finite() {
                return Err(PipelineError::ComputationError(
                    "logistic regression diverged".to_string(),
                ));
            }
            if grad_norm < self.tol {
                break;
            }

            weights = weights - dw * lr;
            bias = bias - db * lr;
        }

        // Back to raw feature space: w = w_z / scale, b = b_z - mean . w
        let coefficients = weights / &scale.view().insert_axis(Axis(1));
        let intercept = bias - mean.dot(&coefficients);

        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);
        self.n_iter = iterations;
        self.is_fitted = true;

        Ok(())
    }

    /// Predict class indices
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
                    .0
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logistic_regression() {
        // Simple linearly separable data
        let x = array![
            [1.0, 1.0],
            [1.5, 1.5],
            [2.0, 2.0],
            [5.0, 5.0],
            [5.5, 5.5],
            [6.0, 6.0],
        ];
        let y = array![0, 0, 0, 1, 1, 1];

        let mut model = LogisticRegression::new().with_max_iter(1000);
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted);

        let predictions = model.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 5, "expected >= 5 correct, got {}", correct);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let x = array![[0.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
        let y = array![0, 1, 2];

        let mut model = LogisticRegression::new().with_max_iter(500);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[3, 3]);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_three_classes() {
        let x = array![
            [-3.0, 0.0],
            [-2.5, 0.2],
            [0.0, 3.0],
            [0.2, 2.5],
            [3.0, 0.0],
            [2.5, -0.2],
        ];
        let y = array![0, 0, 1, 1, 2, 2];
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_single_class_fails() {
        let x = array![[1.0], [2.0]];
        let y = array![0, 0];
        let err = LogisticRegression::new().fit(&x, &y).unwrap_err();
        assert!(matches!(err, PipelineError::TrainingError(_)));
    }

    #[test]
    fn test_non_positive_c_rejected() {
        let x = array![[1.0], [2.0]];
        let y = array![0, 1];
        let err = LogisticRegression::new().with_c(0.0).fit(&x, &y).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { .. }));
    }

    #[test]
    fn test_unscaled_large_magnitude_feature() {
        let x = Array2::from_shape_fn((100, 1), |(i, _)| 1000.0 + 100.0 * i as f64);
        let y: Array1<usize> = (0..100).map(|i| usize::from(i >= 50)).collect();

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 90, "expected >= 90 correct, got {}", correct);
        // Intercept carries the threshold in raw units
        let intercept = model.intercept.as_ref().unwrap();
        assert!((intercept[1] - intercept[0]).abs() > 1.0);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LogisticRegression::new();
        assert!(model.predict(&array![[1.0]]).is_err());
    }
}
