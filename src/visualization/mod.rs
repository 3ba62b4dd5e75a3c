//! Visualization module: diagrams of fitted models.

pub mod tree_svg;
pub use tree_svg::TreeSvgRenderer;
