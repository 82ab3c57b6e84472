use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{argmax_labels, dot, softmax, InputSchema, Matrix, ModelInput, Predictor};
use crate::error::{ArtifactError, ModelError};
use crate::value::Datum;

fn check_rectangular(rows: &[Vec<f64>], n_rows: usize, what: &str) -> Result<usize, ArtifactError> {
    let width = rows.first().map_or(0, Vec::len);
    if rows.len() != n_rows || rows.iter().any(|r| r.len() != width) {
        return Err(ArtifactError::Invalid(format!(
            "{what} must have one row of equal width per class"
        )));
    }
    Ok(width)
}

fn check_width(rows: &Matrix, expected: usize, stage: &'static str) -> Result<(), ModelError> {
    match rows.iter().map(Vec::len).find(|&w| w != expected) {
        Some(actual) => Err(ModelError::WidthMismatch {
            stage,
            expected,
            actual,
        }),
        None => Ok(()),
    }
}

/// Naive Bayes over binary features. Inputs are binarized with `binarize`
/// (values strictly above the threshold become 1) unless it is `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BernoulliNb {
    pub class_log_prior: Vec<f64>,
    pub feature_log_prob: Vec<Vec<f64>>,
    #[serde(default = "default_binarize")]
    pub binarize: Option<f64>,
    pub classes: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub schema: InputSchema,
}

fn default_binarize() -> Option<f64> {
    Some(0.0)
}

impl BernoulliNb {
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let n = self.classes.len();
        if n == 0 || self.class_log_prior.len() != n {
            return Err(ArtifactError::Invalid("class_log_prior must have one entry per class".into()));
        }
        let width = check_rectangular(&self.feature_log_prob, n, "feature_log_prob")?;
        if self.schema.width().is_some_and(|w| w != width) {
            return Err(ArtifactError::Invalid("declared input width does not match feature_log_prob".into()));
        }
        Ok(())
    }

    fn width(&self) -> usize {
        self.feature_log_prob.first().map_or(0, Vec::len)
    }

    fn joint_log_likelihood(&self, rows: &Matrix) -> Result<Matrix, ModelError> {
        check_width(rows, self.width(), "BernoulliNB")?;
        let neg_prob: Vec<Vec<f64>> = self
            .feature_log_prob
            .iter()
            .map(|class| class.iter().map(|lp| (1.0 - lp.exp()).ln()).collect())
            .collect();
        Ok(rows
            .iter()
            .map(|row| {
                let x: Vec<f64> = match self.binarize {
                    Some(threshold) => row.iter().map(|v| if *v > threshold { 1.0 } else { 0.0 }).collect(),
                    None => row.clone(),
                };
                self.feature_log_prob
                    .iter()
                    .zip(&neg_prob)
                    .zip(&self.class_log_prior)
                    .map(|((lp, neg), prior)| {
                        let delta: Vec<f64> = lp.iter().zip(neg).map(|(a, b)| a - b).collect();
                        dot(&x, &delta) + prior + neg.iter().sum::<f64>()
                    })
                    .collect()
            })
            .collect())
    }
}

impl Predictor for BernoulliNb {
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
        let rows = self.schema.align(input, "BernoulliNB")?;
        let jll = self.joint_log_likelihood(&rows)?;
        Ok(jll.iter().map(|row| softmax(row)).collect())
    }
}

/// Gaussian naive Bayes with per-class means (`theta`) and variances (`var`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianNb {
    pub theta: Vec<Vec<f64>>,
    pub var: Vec<Vec<f64>>,
    pub class_prior: Vec<f64>,
    pub classes: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub schema: InputSchema,
}

impl GaussianNb {
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let n = self.classes.len();
        if n == 0 || self.class_prior.len() != n {
            return Err(ArtifactError::Invalid("class_prior must have one entry per class".into()));
        }
        let width = check_rectangular(&self.theta, n, "theta")?;
        if check_rectangular(&self.var, n, "var")? != width {
            return Err(ArtifactError::Invalid("theta and var differ in width".into()));
        }
        if self.var.iter().flatten().any(|v| *v <= 0.0) {
            return Err(ArtifactError::Invalid("variances must be positive".into()));
        }
        if self.schema.width().is_some_and(|w| w != width) {
            return Err(ArtifactError::Invalid("declared input width does not match theta".into()));
        }
        Ok(())
    }

    fn width(&self) -> usize {
        self.theta.first().map_or(0, Vec::len)
    }
}

impl Predictor for GaussianNb {
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
        let rows = self.schema.align(input, "GaussianNB")?;
        check_width(&rows, self.width(), "GaussianNB")?;
        Ok(rows
            .iter()
            .map(|x| {
                let jll: Vec<f64> = self
                    .theta
                    .iter()
                    .zip(&self.var)
                    .zip(&self.class_prior)
                    .map(|((mu, var), prior)| {
                        let norm: f64 = var.iter().map(|v| (2.0 * PI * v).ln()).sum();
                        let dist: f64 = x
                            .iter()
                            .zip(mu)
                            .zip(var)
                            .map(|((xi, m), v)| (xi - m).powi(2) / v)
                            .sum();
                        prior.ln() - 0.5 * norm - 0.5 * dist
                    })
                    .collect();
                softmax(&jll)
            })
            .collect())
    }
}
