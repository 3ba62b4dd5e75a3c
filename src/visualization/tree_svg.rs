//! Decision tree diagram rendered as an SVG document

use crate::data::format_float;
use crate::error::{PipelineError, Result};
use crate::training::{DecisionTree, TreeNode};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const BOX_WIDTH: f64 = 180.0;
const BOX_HEIGHT: f64 = 84.0;
const H_GAP: f64 = 16.0;
const V_GAP: f64 = 48.0;
const MARGIN: f64 = 12.0;
const LINE_HEIGHT: f64 = 15.0;

/// Fill colours per class, cycled when there are more classes
const PALETTE: [&str; 10] = [
    "#e58139", "#399de5", "#47e539", "#d739e5", "#e5d739", "#39e5c5", "#e53958", "#7d39e5",
    "#9de539", "#39e581",
];

/// A node with its computed position
struct Placed<'a> {
    node: &'a TreeNode,
    x: f64,
    y: f64,
    parent: Option<usize>,
    is_left: bool,
}

/// Renders a fitted [`DecisionTree`] with one box per node
pub struct TreeSvgRenderer<'a> {
    feature_names: &'a [String],
    class_names: &'a [String],
}

impl<'a> TreeSvgRenderer<'a> {
    pub fn new(feature_names: &'a [String], class_names: &'a [String]) -> Self {
        Self {
            feature_names,
            class_names,
        }
    }

    /// Render to an SVG string
    pub fn render(&self, tree: &DecisionTree) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_svg(&mut buffer, tree)?;
        String::from_utf8(buffer)
            .map_err(|e| PipelineError::ComputationError(format!("Invalid UTF-8: {}", e)))
    }

    /// Render into a file
    pub fn export(&self, tree: &DecisionTree, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.write_svg(&mut writer, tree)?;
        writer.flush()?;
        Ok(())
    }

    fn write_svg<W: Write>(&self, writer: &mut W, tree: &DecisionTree) -> Result<()> {
        let root = tree
            .root()
            .ok_or_else(|| PipelineError::ComputationError("tree is not fitted".to_string()))?;
        if tree.n_features() > self.feature_names.len() {
            return Err(PipelineError::ComputationError(format!(
                "tree uses {} features but {} names were given",
                tree.n_features(),
                self.feature_names.len()
            )));
        }
        if tree.n_classes() > self.class_names.len() {
            return Err(PipelineError::ComputationError(format!(
                "tree has {} classes but {} names were given",
                tree.n_classes(),
                self.class_names.len()
            )));
        }

        let mut placed = Vec::new();
        let mut next_leaf = 0usize;
        layout(root, 0, None, false, &mut next_leaf, &mut placed);

        let width = next_leaf as f64 * (BOX_WIDTH + H_GAP) - H_GAP + 2.0 * MARGIN;
        let levels = tree.get_depth() + 1;
        let height = levels as f64 * (BOX_HEIGHT + V_GAP) - V_GAP + 2.0 * MARGIN;

        writeln!(
            writer,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
            w = width,
            h = height
        )
        .map_err(io_err)?;
        writeln!(
            writer,
            "  <style>text {{ font-family: Helvetica, Arial, sans-serif; font-size: 12px; }}</style>"
        )
        .map_err(io_err)?;

        // Edges first so boxes are drawn on top
        for item in &placed {
            if let Some(parent) = item.parent {
                self.write_edge(writer, &placed[parent], item)?;
            }
        }
        for item in &placed {
            self.write_node(writer, item)?;
        }

        writeln!(writer, "</svg>").map_err(io_err)?;
        Ok(())
    }

    fn write_edge<W: Write>(&self, writer: &mut W, parent: &Placed, child: &Placed) -> Result<()> {
        let (x1, y1) = (parent.x + BOX_WIDTH / 2.0, parent.y + BOX_HEIGHT);
        let (x2, y2) = (child.x + BOX_WIDTH / 2.0, child.y);
        writeln!(
            writer,
            "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#555555\" stroke-width=\"1.2\"/>",
            x1, y1, x2, y2
        )
        .map_err(io_err)?;

        if parent.parent.is_none() {
            let label = if child.is_left { "True" } else { "False" };
            writeln!(
                writer,
                "  <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" fill=\"#555555\">{}</text>",
                (x1 + x2) / 2.0,
                (y1 + y2) / 2.0,
                label
            )
            .map_err(io_err)?;
        }
        Ok(())
    }

    fn write_node<W: Write>(&self, writer: &mut W, item: &Placed) -> Result<()> {
        let node = item.node;
        let class_idx = node.majority_class();
        let color = PALETTE[class_idx % PALETTE.len()];

        writeln!(writer, "  <g>").map_err(io_err)?;
        writeln!(
            writer,
            "    <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"6\" fill=\"{}\" fill-opacity=\"{:.3}\" stroke=\"#333333\"/>",
            item.x,
            item.y,
            BOX_WIDTH,
            BOX_HEIGHT,
            color,
            purity(node.counts())
        )
        .map_err(io_err)?;

        let lines = self.node_lines(node);
        let top = item.y + (BOX_HEIGHT - lines.len() as f64 * LINE_HEIGHT) / 2.0 + LINE_HEIGHT - 3.0;
        writeln!(
            writer,
            "    <text x=\"{}\" text-anchor=\"middle\">",
            item.x + BOX_WIDTH / 2.0
        )
        .map_err(io_err)?;
        for (i, line) in lines.iter().enumerate() {
            writeln!(
                writer,
                "      <tspan x=\"{}\" y=\"{}\">{}</tspan>",
                item.x + BOX_WIDTH / 2.0,
                top + i as f64 * LINE_HEIGHT,
                escape_xml(line)
            )
            .map_err(io_err)?;
        }
        writeln!(writer, "    </text>").map_err(io_err)?;
        writeln!(writer, "  </g>").map_err(io_err)?;
        Ok(())
    }

    fn node_lines(&self, node: &TreeNode) -> Vec<String> {
        let mut lines = Vec::with_capacity(5);
        if let TreeNode::Split {
            feature_idx,
            threshold,
            ..
        } = node
        {
            let name = self
                .feature_names
                .get(*feature_idx)
                .map(String::as_str)
                .unwrap_or("?");
            lines.push(format!("{} <= {:.3}", name, threshold));
        }
        lines.push(format!("gini = {:.3}", node.impurity()));
        lines.push(format!("samples = {}", node.n_samples()));
        let value: Vec<String> = node
            .counts()
            .iter()
            .map(|&c| format_float(c as f64))
            .collect();
        lines.push(format!("value = [{}]", value.join(", ")));
        let class = self
            .class_names
            .get(node.majority_class())
            .map(String::as_str)
            .unwrap_or("?");
        lines.push(format!("class = {}", class));
        lines
    }
}

/// Leaves are spaced left to right; parents sit centred over their children
fn layout<'a>(
    node: &'a TreeNode,
    depth: usize,
    parent: Option<usize>,
    is_left: bool,
    next_leaf: &mut usize,
    placed: &mut Vec<Placed<'a>>,
) -> usize {
    let idx = placed.len();
    placed.push(Placed {
        node,
        x: 0.0,
        y: MARGIN + depth as f64 * (BOX_HEIGHT + V_GAP),
        parent,
        is_left,
    });

    let x = match node {
        TreeNode::Leaf { .. } => {
            let x = MARGIN + *next_leaf as f64 * (BOX_WIDTH + H_GAP);
            *next_leaf += 1;
            x
        }
        TreeNode::Split { left, right, .. } => {
            let l = layout(left, depth + 1, Some(idx), true, next_leaf, placed);
            let r = layout(right, depth + 1, Some(idx), false, next_leaf, placed);
            (placed[l].x + placed[r].x) / 2.0
        }
    };
    placed[idx].x = x;
    idx
}

/// Margin of the majority class over the runner-up, scaled to [0, 1]
fn purity(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let mut sorted: Vec<f64> = counts.iter().map(|&c| c as f64 / total as f64).collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let first = sorted.first().copied().unwrap_or(0.0);
    let second = sorted.get(1).copied().unwrap_or(0.0);
    if second >= 1.0 {
        return 0.0;
    }
    ((first - second) / (1.0 - second)).clamp(0.0, 1.0)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn io_err(e: std::io::Error) -> PipelineError {
    PipelineError::ComputationError(format!("Failed to write SVG: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::Classifier;
    use ndarray::array;

    fn fitted() -> DecisionTree {
        let x = array![[0.0, 5.0], [1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let y = array![0, 0, 1, 1];
        let mut tree = DecisionTree::new().with_max_depth(3);
        tree.fit(&x, &y).unwrap();
        tree
    }

    #[test]
    fn test_render_contains_nodes() {
        let features = vec!["petal<width".to_string(), "b".to_string()];
        let classes = vec!["no".to_string(), "yes".to_string()];
        let svg = TreeSvgRenderer::new(&features, &classes)
            .render(&fitted())
            .unwrap();

        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<rect").count(), 3);
        assert_eq!(svg.matches("<line").count(), 2);
        assert!(svg.contains("petal&lt;width &lt;= 1.500"));
        assert!(svg.contains("value = [2.0, 2.0]"));
        assert!(svg.contains("class = yes"));
        assert!(svg.contains("gini = 0.500"));
    }

    #[test]
    fn test_missing_names_fail() {
        let features = vec!["a".to_string()];
        let classes = vec!["no".to_string(), "yes".to_string()];
        let err = TreeSvgRenderer::new(&features, &classes).render(&fitted());
        assert!(err.is_err());
    }

    #[test]
    fn test_unfitted_fails() {
        let names = vec!["a".to_string()];
        assert!(TreeSvgRenderer::new(&names, &names)
            .render(&DecisionTree::new())
            .is_err());
    }

    #[test]
    fn test_purity() {
        assert_eq!(purity(&[5, 0]), 1.0);
        assert_eq!(purity(&[3, 3]), 0.0);
        assert!((purity(&[3, 1]) - 2.0 / 3.0).abs() < 1e-12);
    }
}
