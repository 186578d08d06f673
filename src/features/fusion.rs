//! Feature fusion: `[TabularBlock | TextBlock]`.
//!
//! The concatenation order is fixed. Widths are checked against the layout the
//! model was fit on; column order within a block is protected separately by the
//! feature-name list persisted in the bundle manifest.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::{FeatureVector, TabularBlock, TextBlock};
use crate::error::AppError;

/// Block widths recorded at fit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLayout {
    pub tabular_width: usize,
    pub text_width: usize,
}

impl FeatureLayout {
    pub fn new(tabular_width: usize, text_width: usize) -> Self {
        Self {
            tabular_width,
            text_width,
        }
    }

    pub fn total_width(&self) -> usize {
        self.tabular_width + self.text_width
    }

    fn check(&self, tabular: &TabularBlock, text: &TextBlock) -> Result<(), AppError> {
        if tabular.width() != self.tabular_width {
            return Err(AppError::dimension(format!(
                "Tabular block has width {}, expected {}.",
                tabular.width(),
                self.tabular_width
            )));
        }
        if text.width() != self.text_width {
            return Err(AppError::dimension(format!(
                "Text block has width {}, expected {}.",
                text.width(),
                self.text_width
            )));
        }
        Ok(())
    }
}

/// Concatenate one record's blocks.
pub fn fuse(layout: &FeatureLayout, tabular: &TabularBlock, text: &TextBlock) -> Result<FeatureVector, AppError> {
    layout.check(tabular, text)?;
    let mut out = Vec::with_capacity(layout.total_width());
    out.extend_from_slice(&tabular.0);
    out.extend_from_slice(&text.0);
    Ok(FeatureVector(out))
}

/// Build the training matrix (one row per record).
pub fn fuse_matrix(
    layout: &FeatureLayout,
    tabular: &[TabularBlock],
    text: &[TextBlock],
) -> Result<DMatrix<f64>, AppError> {
    if tabular.len() != text.len() {
        return Err(AppError::dimension(format!(
            "Got {} tabular rows but {} text rows.",
            tabular.len(),
            text.len()
        )));
    }

    let width = layout.total_width();
    let mut m = DMatrix::<f64>::zeros(tabular.len(), width);
    for (i, (tab, txt)) in tabular.iter().zip(text).enumerate() {
        layout.check(tab, txt)?;
        for (j, v) in tab.0.iter().chain(txt.0.iter()).enumerate() {
            m[(i, j)] = *v;
        }
    }
    Ok(m)
}
