//! One analysis: stroke table in, `{preprocessing, ml}` out.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::binder::{bind, Binding};
use crate::config::Config;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::InputError;
use crate::executor::{PredictionExecutor, PredictionOutcome};
use crate::features::{extract, Extraction, FeatureSet};
use crate::frame::StrokeFrame;
use crate::resolver::{ArtifactResolver, ArtifactSource, CachedResolver};
use crate::sanitize::sanitize;
use crate::stroke::StrokeSource;

/// The client-facing result object. Serializes to exactly two keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub preprocessing: serde_json::Value,
    pub ml: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub features: FeatureSet,
    pub outcome: PredictionOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Analyzer {
    config: Config,
    artifacts: Arc<dyn ArtifactSource>,
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    pub fn new(config: Config, artifacts: Arc<dyn ArtifactSource>) -> Self {
        Self { config, artifacts }
    }

    /// Searches the configured roots, or the working directory and its
    /// ancestors when none are configured.
    pub fn from_config(config: Config) -> Self {
        let roots = match std::env::current_dir() {
            Ok(cwd) => config.resolved_search_roots(&cwd),
            Err(e) => {
                tracing::warn!("cannot read working directory: {e}");
                config.search_roots.clone()
            }
        };
        let resolver = ArtifactResolver::from_config(&config, roots);
        let artifacts: Arc<dyn ArtifactSource> = if config.cache_artifacts {
            Arc::new(CachedResolver::new(resolver))
        } else {
            Arc::new(resolver)
        };
        Self::new(config, artifacts)
    }

    pub fn load_frame(&self, source: StrokeSource) -> Result<StrokeFrame, InputError> {
        match source {
            StrokeSource::Csv(path) => StrokeFrame::from_csv_path(&path),
            StrokeSource::Records(records) => {
                Ok(StrokeFrame::from_records(&records, &self.config.columns))
            }
            StrokeSource::Frame(frame) => Ok(frame),
        }
    }

    pub fn analyze(&self, source: StrokeSource, debug: bool) -> Result<Analysis, InputError> {
        let frame = self.load_frame(source)?;
        tracing::debug!(rows = frame.len(), "loaded stroke table");
        let Extraction { features, frame } =
            extract(frame, &self.config.columns, self.config.gmrt_offset)?;

        let mut diagnostics = Diagnostics::new();
        let outcome = self.predict(&features, &frame, debug, &mut diagnostics);

        let result = AnalysisResult {
            preprocessing: sanitize(&features.to_datum()),
            ml: sanitize(&outcome.to_datum()),
        };
        Ok(Analysis {
            result,
            features,
            outcome,
            diagnostics: diagnostics.into_vec(),
        })
    }

    fn predict(
        &self,
        features: &FeatureSet,
        frame: &StrokeFrame,
        debug: bool,
        diagnostics: &mut Diagnostics,
    ) -> PredictionOutcome {
        let start = diagnostics.len();
        let Some(model) = self.artifacts.resolve_model(diagnostics) else {
            let load_errors = diagnostics
                .as_slice()
                .get(start..)
                .unwrap_or_default()
                .iter()
                .filter(|d| d.kind == DiagnosticKind::ModelLoadFailed)
                .map(|d| {
                    let file = d.path.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
                    (file, d.message.clone())
                })
                .collect();
            diagnostics.report(DiagnosticKind::NoModel, "no loadable model found");
            return PredictionOutcome::NoModel { load_errors };
        };
        let scaler = self.artifacts.resolve_scaler(diagnostics);

        match bind(model.artifact.as_ref(), features, frame) {
            Binding::InsufficientMetadata => {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::InsufficientMetadata,
                        "model declares neither feature names nor a feature count",
                    )
                    .at(&model.path),
                );
                PredictionOutcome::InsufficientMetadata {
                    model_file: model.file_name(),
                }
            }
            Binding::Bound(bound) => PredictionExecutor::new(&self.config.labels, debug).execute(
                &model,
                scaler.as_ref(),
                &bound,
                diagnostics,
            ),
        }
    }
}

/// Analyzes `source` with the default configuration, searching the working
/// directory and its ancestors for artifacts.
pub fn analyze(source: impl Into<StrokeSource>, debug: bool) -> Result<Analysis, InputError> {
    Analyzer::from_config(Config::default()).analyze(source.into(), debug)
}
