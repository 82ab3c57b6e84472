use crate::binder::BoundInput;
use crate::config::DiagnosisLabels;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::ModelError;
use crate::model::{Matrix, ModelInput, Predictor, Transformer};
use crate::resolver::Loaded;
use crate::value::Datum;

pub const INSUFFICIENT_METADATA_WARNING: &str =
    "model declares neither feature names nor a feature count; prediction skipped";
pub const NO_MODEL_WARNING: &str = "no loadable model found";

/// Two-class probabilities as percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilitySummary {
    pub positive: f64,
    pub negative: f64,
    pub diagnosis: String,
}

impl ProbabilitySummary {
    /// Reads the second column of the first row as the positive class.
    pub fn from_two_class(probabilities: &Matrix, labels: &DiagnosisLabels) -> Option<Self> {
        let row = probabilities.first()?;
        let [_, positive] = row.as_slice() else {
            return None;
        };
        let positive = positive * 100.0;
        let diagnosis = if positive >= 50.0 {
            &labels.positive
        } else {
            &labels.negative
        };
        Some(Self {
            positive: round2(positive),
            negative: round2(100.0 - positive),
            diagnosis: diagnosis.clone(),
        })
    }

    pub fn to_datum(&self) -> Datum {
        Datum::map([
            ("dementia_probability", Datum::Float(self.positive)),
            ("normal_probability", Datum::Float(self.negative)),
            ("diagnosis", Datum::Text(self.diagnosis.clone())),
        ])
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebugPayload {
    pub raw_pred: Vec<Datum>,
    pub predict_proba_raw: Option<Matrix>,
    pub input_vector: Datum,
    pub input_df: Datum,
    pub matched_by: Datum,
}

impl DebugPayload {
    pub fn to_datum(&self) -> Datum {
        let proba = self
            .predict_proba_raw
            .as_ref()
            .map(|m| Datum::List(m.iter().map(|row| Datum::from(row.clone())).collect()));
        Datum::map([
            ("raw_pred", Datum::List(self.raw_pred.clone())),
            ("predict_proba_raw", proba.into()),
            ("input_vector", self.input_vector.clone()),
            ("input_df", self.input_df.clone()),
            ("matched_by", self.matched_by.clone()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionReport {
    pub prediction: Vec<Datum>,
    pub probability: Option<ProbabilitySummary>,
    pub model_file: String,
    pub scaler_file: Option<String>,
    pub debug: Option<DebugPayload>,
}

/// What the `ml` half of an analysis holds.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Predicted(PredictionReport),
    Failed { error: String, model_file: String },
    InsufficientMetadata { model_file: String },
    NoModel { load_errors: Vec<(String, String)> },
}

impl PredictionOutcome {
    pub fn to_datum(&self) -> Datum {
        match self {
            PredictionOutcome::Predicted(report) => {
                let mut entries = vec![
                    ("prediction", Datum::List(report.prediction.clone())),
                    (
                        "probability",
                        report.probability.as_ref().map(ProbabilitySummary::to_datum).into(),
                    ),
                    ("model_file", Datum::Text(report.model_file.clone())),
                    ("scaler_file", report.scaler_file.clone().into()),
                ];
                if let Some(debug) = &report.debug {
                    entries.push(("_debug", debug.to_datum()));
                }
                Datum::map(entries)
            }
            PredictionOutcome::Failed { error, model_file } => Datum::map([
                ("error", Datum::Text(error.clone())),
                ("model_file", Datum::Text(model_file.clone())),
            ]),
            PredictionOutcome::InsufficientMetadata { model_file } => Datum::map([
                ("warning", Datum::Text(INSUFFICIENT_METADATA_WARNING.to_string())),
                ("model_file", Datum::Text(model_file.clone())),
            ]),
            PredictionOutcome::NoModel { load_errors } => Datum::map([
                ("warning", Datum::Text(NO_MODEL_WARNING.to_string())),
                (
                    "load_errors",
                    Datum::List(
                        load_errors
                            .iter()
                            .map(|(file, error)| {
                                Datum::map([
                                    ("file", Datum::Text(file.clone())),
                                    ("error", Datum::Text(error.clone())),
                                ])
                            })
                            .collect(),
                    ),
                ),
            ]),
        }
    }
}

/// Runs one bound input through a model, with the optional scaler.
pub struct PredictionExecutor<'a> {
    pub labels: &'a DiagnosisLabels,
    pub debug: bool,
}

impl<'a> PredictionExecutor<'a> {
    pub fn new(labels: &'a DiagnosisLabels, debug: bool) -> Self {
        Self { labels, debug }
    }

    /// Pipelines receive the named table; single estimators a bare row,
    /// scaled when the scaler's width agrees.
    pub fn prepare_input(
        &self,
        model: &dyn Predictor,
        scaler: Option<&Loaded<dyn Transformer>>,
        bound: &BoundInput,
        diagnostics: &mut Diagnostics,
    ) -> ModelInput {
        if model.is_composite_pipeline() {
            return ModelInput::Table(bound.table());
        }
        let rows = vec![bound.values.clone()];
        let Some(scaler) = scaler else {
            return ModelInput::Matrix(rows);
        };
        match scaler.artifact.expected_width() {
            Some(expected) if expected != bound.width() => {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::ScalerWidthMismatch,
                        format!(
                            "scaler expects {expected} features but the input has {}; scaling skipped",
                            bound.width()
                        ),
                    )
                    .at(&scaler.path),
                );
                ModelInput::Matrix(rows)
            }
            _ => match scaler.artifact.transform(&rows) {
                Ok(scaled) => ModelInput::Matrix(scaled),
                Err(e) => {
                    diagnostics.push(
                        Diagnostic::new(DiagnosticKind::ScalerFailed, format!("scaler failed: {e}"))
                            .at(&scaler.path),
                    );
                    ModelInput::Matrix(rows)
                }
            },
        }
    }

    pub fn execute(
        &self,
        model: &Loaded<dyn Predictor>,
        scaler: Option<&Loaded<dyn Transformer>>,
        bound: &BoundInput,
        diagnostics: &mut Diagnostics,
    ) -> PredictionOutcome {
        let model_file = model.file_name();
        let input = self.prepare_input(model.artifact.as_ref(), scaler, bound, diagnostics);

        let prediction = match model.artifact.predict(&input) {
            Ok(prediction) => prediction,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::new(DiagnosticKind::PredictionFailed, e.to_string())
                        .at(&model.path),
                );
                return PredictionOutcome::Failed {
                    error: e.to_string(),
                    model_file,
                };
            }
        };

        let raw_proba = match model.artifact.predict_probabilities(&input) {
            Ok(proba) => Some(proba),
            Err(ModelError::Unsupported { .. }) => None,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::ProbabilityFailed,
                        format!("probability extraction failed: {e}"),
                    )
                    .at(&model.path),
                );
                None
            }
        };
        let probability = raw_proba
            .as_ref()
            .and_then(|p| ProbabilitySummary::from_two_class(p, self.labels));

        let debug = self.debug.then(|| DebugPayload {
            raw_pred: prediction.clone(),
            predict_proba_raw: raw_proba.clone(),
            input_vector: bound.mapping(),
            input_df: bound.table().records(),
            matched_by: bound.matched_by(),
        });

        PredictionOutcome::Predicted(PredictionReport {
            prediction,
            probability,
            model_file,
            scaler_file: scaler.map(Loaded::file_name),
            debug,
        })
    }
}
