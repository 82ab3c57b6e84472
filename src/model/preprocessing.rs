use serde::{Deserialize, Serialize};

use super::{InputSchema, Matrix, ModelInput, Transformer};
use crate::error::{ArtifactError, ModelError};

/// Centers and scales each column: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    #[serde(default)]
    pub mean: Option<Vec<f64>>,
    #[serde(default)]
    pub scale: Option<Vec<f64>>,
    #[serde(flatten)]
    pub schema: InputSchema,
}

impl StandardScaler {
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let widths: Vec<usize> = [self.mean.as_ref(), self.scale.as_ref()]
            .into_iter()
            .flatten()
            .map(Vec::len)
            .chain(self.schema.width())
            .collect();
        if widths.windows(2).any(|w| w[0] != w[1]) {
            return Err(ArtifactError::Invalid("scaler mean, scale and width disagree".into()));
        }
        Ok(())
    }

    fn width(&self) -> Option<usize> {
        self.schema
            .width()
            .or_else(|| self.mean.as_ref().map(Vec::len))
            .or_else(|| self.scale.as_ref().map(Vec::len))
    }

    pub(crate) fn apply(&self, input: &ModelInput) -> Result<Matrix, ModelError> {
        let rows = self.schema.align(input, "StandardScaler")?;
        self.transform(&rows)
    }
}

impl Transformer for StandardScaler {
    fn expected_width(&self) -> Option<usize> {
        self.width()
    }

    fn transform(&self, rows: &Matrix) -> Result<Matrix, ModelError> {
        if let Some(expected) = self.width() {
            if let Some(actual) = rows.iter().map(Vec::len).find(|&w| w != expected) {
                return Err(ModelError::WidthMismatch {
                    stage: "StandardScaler",
                    expected,
                    actual,
                });
            }
        }
        Ok(rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let centered = v - self.mean.as_ref().and_then(|m| m.get(i)).unwrap_or(&0.0);
                        match self.scale.as_ref().and_then(|s| s.get(i)).copied() {
                            Some(s) if s != 0.0 => centered / s,
                            _ => centered,
                        }
                    })
                    .collect()
            })
            .collect())
    }
}

/// Replaces undefined cells with per-column fill values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleImputer {
    pub statistics: Vec<f64>,
    #[serde(flatten)]
    pub schema: InputSchema,
}

impl SimpleImputer {
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.schema.width().is_some_and(|w| w != self.statistics.len()) {
            return Err(ArtifactError::Invalid("imputer statistics do not match declared width".into()));
        }
        Ok(())
    }

    pub(crate) fn apply(&self, input: &ModelInput) -> Result<Matrix, ModelError> {
        let rows = self.schema.align(input, "SimpleImputer")?;
        self.transform(&rows)
    }
}

impl Transformer for SimpleImputer {
    fn expected_width(&self) -> Option<usize> {
        Some(self.statistics.len())
    }

    fn transform(&self, rows: &Matrix) -> Result<Matrix, ModelError> {
        let expected = self.statistics.len();
        if let Some(actual) = rows.iter().map(Vec::len).find(|&w| w != expected) {
            return Err(ModelError::WidthMismatch {
                stage: "SimpleImputer",
                expected,
                actual,
            });
        }
        Ok(rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.statistics)
                    .map(|(v, fill)| if v.is_nan() { *fill } else { *v })
                    .collect()
            })
            .collect())
    }
}

/// Picks named columns out of a table, in the listed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSelector {
    pub columns: Vec<String>,
}

impl ColumnSelector {
    pub(crate) fn apply(&self, input: &ModelInput) -> Result<Matrix, ModelError> {
        match input {
            ModelInput::Table(table) => table.select(&self.columns),
            ModelInput::Matrix(_) => Err(ModelError::NeedsTable("ColumnSelector")),
        }
    }
}
