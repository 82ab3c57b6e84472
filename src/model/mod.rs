//! Capability interface for opaque predictors and transformers, plus the
//! estimators the JSON artifact format can describe.

pub mod artifact;
pub mod linear;
pub mod naive_bayes;
pub mod pipeline;
pub mod preprocessing;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::value::Datum;

pub use artifact::{ArtifactLoader, JsonArtifactLoader, Stage};
pub use linear::LogisticRegression;
pub use naive_bayes::{BernoulliNb, GaussianNb};
pub use pipeline::{Pipeline, Step};
pub use preprocessing::{ColumnSelector, SimpleImputer, StandardScaler};

/// Row-major numeric input.
pub type Matrix = Vec<Vec<f64>>;

/// Rows with named columns, for models whose stages select columns by name.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows: Matrix,
}

impl FeatureTable {
    pub fn single_row(columns: Vec<String>, values: Vec<f64>) -> Self {
        Self {
            columns,
            rows: vec![values],
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Projects the table onto `names`, in that order.
    pub fn select(&self, names: &[String]) -> Result<Matrix, ModelError> {
        let indices = names
            .iter()
            .map(|n| self.column_index(n).ok_or_else(|| ModelError::MissingColumn(n.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i]).collect())
            .collect())
    }

    /// Row records as name -> value maps.
    pub fn records(&self) -> Datum {
        Datum::List(
            self.rows
                .iter()
                .map(|row| {
                    Datum::map(
                        self.columns
                            .iter()
                            .zip(row)
                            .map(|(c, v)| (c.clone(), Datum::Float(*v))),
                    )
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelInput {
    Table(FeatureTable),
    Matrix(Matrix),
}

impl ModelInput {
    pub fn width(&self) -> usize {
        match self {
            ModelInput::Table(t) => t.columns.len(),
            ModelInput::Matrix(m) => m.first().map_or(0, Vec::len),
        }
    }

    pub fn rows(&self) -> &Matrix {
        match self {
            ModelInput::Table(t) => &t.rows,
            ModelInput::Matrix(m) => m,
        }
    }
}

/// Input contract an estimator or transformer may declare.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_features_in: Option<usize>,
}

impl InputSchema {
    pub fn width(&self) -> Option<usize> {
        self.n_features_in
            .or_else(|| self.feature_names_in.as_ref().map(Vec::len))
    }

    /// Numeric rows for `stage`. Named tables are aligned to the declared
    /// feature names; anything else must match the declared width.
    pub fn align(&self, input: &ModelInput, stage: &'static str) -> Result<Matrix, ModelError> {
        let rows = match (input, &self.feature_names_in) {
            (ModelInput::Table(table), Some(names)) => table.select(names)?,
            _ => input.rows().clone(),
        };
        self.check_width(&rows, stage)?;
        Ok(rows)
    }

    pub fn check_width(&self, rows: &Matrix, stage: &'static str) -> Result<(), ModelError> {
        if let Some(expected) = self.width() {
            if let Some(actual) = rows.iter().map(Vec::len).find(|&w| w != expected) {
                return Err(ModelError::WidthMismatch {
                    stage,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// A loaded model. Optional capabilities report "not supported" through
/// their defaults instead of being probed at runtime.
pub trait Predictor: Send + Sync + fmt::Debug {
    fn feature_names(&self) -> Option<Vec<String>> {
        None
    }

    fn feature_count(&self) -> Option<usize> {
        None
    }

    /// True for composites of ordered named stages that expect named columns.
    fn is_composite_pipeline(&self) -> bool {
        false
    }

    fn predict(&self, input: &ModelInput) -> Result<Vec<Datum>, ModelError>;

    /// One probability row per input row, columns in class order.
    fn predict_probabilities(&self, _input: &ModelInput) -> Result<Matrix, ModelError> {
        Err(ModelError::Unsupported {
            operation: "predict_probabilities",
        })
    }
}

/// A fitted input transform such as a standard scaler.
pub trait Transformer: Send + Sync + fmt::Debug {
    fn expected_width(&self) -> Option<usize> {
        None
    }

    fn transform(&self, rows: &Matrix) -> Result<Matrix, ModelError>;
}

/// Predicted labels: the class with the highest probability in each row.
pub(crate) fn argmax_labels(
    probabilities: &Matrix,
    classes: &[serde_json::Value],
) -> Vec<Datum> {
    probabilities
        .iter()
        .map(|row| {
            let best = row
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, f64)>, (i, &p)| match best {
                    Some((_, bp)) if bp >= p => best,
                    _ => Some((i, p)),
                })
                .map_or(0, |(i, _)| i);
            classes.get(best).map_or(Datum::Int(best as i64), Datum::from)
        })
        .collect()
}

/// Normalizes joint log likelihoods into probabilities.
pub(crate) fn softmax(row: &[f64]) -> Vec<f64> {
    let peak = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = row.iter().map(|v| (v - peak).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn table() -> FeatureTable {
        FeatureTable::single_row(vec!["a".into(), "b".into()], vec![1.0, 2.0])
    }

    #[test]
    fn select_reorders_columns() {
        let m = table().select(&["b".into(), "a".into()]).unwrap();
        assert_eq!(m, vec![vec![2.0, 1.0]]);
        assert_matches!(
            table().select(&["c".into()]),
            Err(ModelError::MissingColumn(c)) if c == "c"
        );
    }

    #[test]
    fn schema_aligns_tables_and_checks_matrices() {
        let schema = InputSchema {
            feature_names_in: Some(vec!["b".into(), "a".into()]),
            n_features_in: Some(2),
        };
        let aligned = schema.align(&ModelInput::Table(table()), "test").unwrap();
        assert_eq!(aligned, vec![vec![2.0, 1.0]]);

        let wrong = ModelInput::Matrix(vec![vec![1.0, 2.0, 3.0]]);
        assert_matches!(
            schema.align(&wrong, "test"),
            Err(ModelError::WidthMismatch { expected: 2, actual: 3, .. })
        );
    }

    #[test]
    fn undeclared_schema_accepts_anything() {
        let schema = InputSchema::default();
        assert_eq!(schema.width(), None);
        let rows = schema.align(&ModelInput::Matrix(vec![vec![1.0; 5]]), "test").unwrap();
        assert_eq!(rows[0].len(), 5);
    }

    #[test]
    fn argmax_picks_first_best_class() {
        let classes = vec![json!(0), json!("dementia")];
        let labels = argmax_labels(&vec![vec![0.2, 0.8], vec![0.5, 0.5]], &classes);
        assert_eq!(labels, vec![Datum::Text("dementia".into()), Datum::Int(0)]);
    }

    #[test]
    fn softmax_sums_to_one() {
        let p = softmax(&[-1000.0, -1001.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[0] > p[1]);
    }

    #[test]
    fn table_records() {
        let records = table().records();
        assert_eq!(
            records,
            Datum::List(vec![Datum::map([("a", Datum::Float(1.0)), ("b", Datum::Float(2.0))])])
        );
    }
}
