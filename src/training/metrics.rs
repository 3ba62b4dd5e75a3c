//! Classification metrics

use crate::data::{distinct_labels, Label};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Per-class precision, recall, F1 and support
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: usize,
}

/// Evaluation of predictions against ground truth
#[derive(Debug, Clone)]
pub struct ClassificationReport {
    /// Sorted union of true and predicted labels
    pub labels: Vec<Label>,
    /// Scores per entry of `labels`
    pub per_class: Vec<ClassScores>,
    /// Fraction of correct predictions in [0, 1]
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
}

impl ClassificationReport {
    pub fn compute(y_true: &[Label], y_pred: &[Label]) -> Self {
        let labels = label_union(y_true, y_pred);
        let matrix = confusion_matrix_with(&labels, y_true, y_pred);
        let k = labels.len();
        let total = y_true.len();

        let per_class: Vec<ClassScores> = (0..k)
            .map(|c| {
                let tp = matrix[c][c];
                let support: usize = matrix[c].iter().sum();
                let predicted: usize = matrix.iter().map(|row| row[c]).sum();
                let precision = safe_div(tp as f64, predicted as f64);
                let recall = safe_div(tp as f64, support as f64);
                ClassScores {
                    precision,
                    recall,
                    f1_score: safe_div(2.0 * precision * recall, precision + recall),
                    support,
                }
            })
            .collect();

        let macro_avg = average(&per_class, total, |_| 1.0 / k.max(1) as f64);
        let weighted_avg = average(&per_class, total, |s| safe_div(s.support as f64, total as f64));

        Self {
            labels,
            per_class,
            accuracy: accuracy(y_true, y_pred),
            macro_avg,
            weighted_avg,
        }
    }

    /// Nested JSON keyed by stringified label, plus `accuracy`, `macro avg`, `weighted avg`
    pub fn to_json(&self) -> Value {
        let mut report = Map::new();
        for (label, scores) in self.labels.iter().zip(&self.per_class) {
            report.insert(label.to_string(), scores_json(scores));
        }
        report.insert("accuracy".to_string(), json!(self.accuracy));
        report.insert("macro avg".to_string(), scores_json(&self.macro_avg));
        report.insert("weighted avg".to_string(), scores_json(&self.weighted_avg));
        Value::Object(report)
    }
}

fn scores_json(scores: &ClassScores) -> Value {
    serde_json::to_value(scores).unwrap_or(Value::Null)
}

fn average(per_class: &[ClassScores], total: usize, weight: impl Fn(&ClassScores) -> f64) -> ClassScores {
    let (mut precision, mut recall, mut f1_score) = (0.0, 0.0, 0.0);
    for scores in per_class {
        let w = weight(scores);
        precision += w * scores.precision;
        recall += w * scores.recall;
        f1_score += w * scores.f1_score;
    }
    ClassScores {
        precision,
        recall,
        f1_score,
        support: total,
    }
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Sorted distinct labels over both vectors
pub fn label_union(y_true: &[Label], y_pred: &[Label]) -> Vec<Label> {
    let mut all = y_true.to_vec();
    all.extend_from_slice(y_pred);
    distinct_labels(&all)
}

/// Fraction of matching predictions; 0 for empty input
pub fn accuracy(y_true: &[Label], y_pred: &[Label]) -> f64 {
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    safe_div(correct as f64, y_true.len() as f64)
}

/// Accuracy as a percentage rounded to 2 decimals
pub fn accuracy_percent(y_true: &[Label], y_pred: &[Label]) -> f64 {
    (accuracy(y_true, y_pred) * 100.0 * 100.0).round() / 100.0
}

/// Rows are true classes, columns predicted classes, both in sorted label order
pub fn confusion_matrix(y_true: &[Label], y_pred: &[Label]) -> Vec<Vec<usize>> {
    confusion_matrix_with(&label_union(y_true, y_pred), y_true, y_pred)
}

fn confusion_matrix_with(labels: &[Label], y_true: &[Label], y_pred: &[Label]) -> Vec<Vec<usize>> {
    let k = labels.len();
    let mut matrix = vec![vec![0usize; k]; k];
    for (t, p) in y_true.iter().zip(y_pred) {
        if let (Ok(i), Ok(j)) = (labels.binary_search(t), labels.binary_search(p)) {
            matrix[i][j] += 1;
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<Label> {
        values.iter().map(|v| Label::Text(v.to_string())).collect()
    }

    #[test]
    fn test_accuracy_and_matrix() {
        let y_true = labels(&["a", "a", "b", "b", "c"]);
        let y_pred = labels(&["a", "b", "b", "b", "a"]);

        assert_eq!(accuracy_percent(&y_true, &y_pred), 60.0);
        assert_eq!(
            confusion_matrix(&y_true, &y_pred),
            vec![vec![1, 1, 0], vec![0, 2, 0], vec![1, 0, 0]]
        );
    }

    #[test]
    fn test_report_zero_division() {
        let y_true = labels(&["a", "a", "b", "b", "c"]);
        let y_pred = labels(&["a", "b", "b", "b", "a"]);
        let report = ClassificationReport::compute(&y_true, &y_pred);

        // Class "c" is never predicted
        let c = report.per_class[2];
        assert_eq!(c.precision, 0.0);
        assert_eq!(c.recall, 0.0);
        assert_eq!(c.f1_score, 0.0);
        assert_eq!(c.support, 1);

        let b = report.per_class[1];
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(b.recall, 1.0);
        assert_eq!(report.weighted_avg.support, 5);
    }

    #[test]
    fn test_report_json_keys() {
        let y_true = vec![Label::Int(0), Label::Int(1), Label::Int(1)];
        let y_pred = vec![Label::Int(0), Label::Int(1), Label::Int(0)];
        let json = ClassificationReport::compute(&y_true, &y_pred).to_json();

        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["0", "1", "accuracy", "macro avg", "weighted avg"]);
        assert_eq!(json["1"]["support"], 2);
        assert_eq!(json["0"]["f1-score"], json!(2.0 / 3.0));
    }

    #[test]
    fn test_predicted_only_label_included() {
        let y_true = vec![Label::Int(0), Label::Int(0)];
        let y_pred = vec![Label::Int(0), Label::Int(9)];
        let matrix = confusion_matrix(&y_true, &y_pred);
        assert_eq!(matrix, vec![vec![1, 1], vec![0, 0]]);
    }

    #[test]
    fn test_rounding() {
        let y_true = labels(&["a", "a", "a"]);
        let y_pred = labels(&["a", "b", "b"]);
        assert_eq!(accuracy_percent(&y_true, &y_pred), 33.33);
    }
}
