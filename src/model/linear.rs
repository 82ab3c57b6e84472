use serde::{Deserialize, Serialize};

use super::{argmax_labels, dot, softmax, InputSchema, Matrix, ModelInput, Predictor};
use crate::error::{ArtifactError, ModelError};
use crate::value::Datum;

/// Logistic regression. A single coefficient row is a binary model (sigmoid
/// of the decision function); several rows are a multinomial model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
    pub classes: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub schema: InputSchema,
}

impl LogisticRegression {
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let width = self.coef.first().map_or(0, Vec::len);
        if self.coef.is_empty() || self.coef.iter().any(|row| row.len() != width) {
            return Err(ArtifactError::Invalid("coef must be a non-empty rectangular matrix".into()));
        }
        if self.intercept.len() != self.coef.len() {
            return Err(ArtifactError::Invalid(format!(
                "{} intercepts for {} coefficient rows",
                self.intercept.len(),
                self.coef.len()
            )));
        }
        let expected_classes = if self.coef.len() == 1 { 2 } else { self.coef.len() };
        if self.classes.len() != expected_classes {
            return Err(ArtifactError::Invalid(format!(
                "expected {expected_classes} classes, found {}",
                self.classes.len()
            )));
        }
        if self.schema.width().is_some_and(|w| w != width) {
            return Err(ArtifactError::Invalid("declared input width does not match coef".into()));
        }
        Ok(())
    }

    fn width(&self) -> usize {
        self.coef.first().map_or(0, Vec::len)
    }

    fn probabilities(&self, rows: &Matrix) -> Result<Matrix, ModelError> {
        let expected = self.width();
        if let Some(actual) = rows.iter().map(Vec::len).find(|&w| w != expected) {
            return Err(ModelError::WidthMismatch {
                stage: "LogisticRegression",
                expected,
                actual,
            });
        }
        Ok(rows
            .iter()
            .map(|row| {
                let scores: Vec<f64> = self
                    .coef
                    .iter()
                    .zip(&self.intercept)
                    .map(|(w, b)| dot(w, row) + b)
                    .collect();
                if scores.len() == 1 {
                    let p = 1.0 / (1.0 + (-scores[0]).exp());
                    vec![1.0 - p, p]
                } else {
                    softmax(&scores)
                }
            })
            .collect())
    }
}

impl Predictor for LogisticRegression {
    fn feature_names(&self) -> Option<Vec<String>> {
        self.schema.feature_names_in.clone()
    }

    fn feature_count(&self) -> Option<usize> {
        self.schema.width().or(Some(self.width()))
    }

    fn predict(&self, input: &ModelInput) -> Result<Vec<Datum>, ModelError> {
        let proba = self.predict_probabilities(input)?;
        Ok(argmax_labels(&proba, &self.classes))
    }

    fn predict_probabilities(&self, input: &ModelInput) -> Result<Matrix, ModelError> {
        let rows = self.schema.align(input, "LogisticRegression")?;
        self.probabilities(&rows)
    }
}
