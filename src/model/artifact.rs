//! JSON artifact documents. Each document is one `Stage`, tagged by `kind`:
//!
//! ```json
//! { "kind": "logistic_regression", "coef": [[0.4, -1.2]], "intercept": [0.1],
//!   "classes": [0, 1], "feature_names_in": ["air_time", "paper_time"] }
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    BernoulliNb, ColumnSelector, GaussianNb, LogisticRegression, ModelInput, Pipeline, Predictor,
    SimpleImputer, StandardScaler, Transformer,
};
use crate::error::{ArtifactError, ModelError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stage {
    LogisticRegression(LogisticRegression),
    BernoulliNb(BernoulliNb),
    GaussianNb(GaussianNb),
    StandardScaler(StandardScaler),
    SimpleImputer(SimpleImputer),
    ColumnSelector(ColumnSelector),
    Pipeline(Pipeline),
}

impl Stage {
    pub fn kind(&self) -> &'static str {
        match self {
            Stage::LogisticRegression(_) => "logistic_regression",
            Stage::BernoulliNb(_) => "bernoulli_nb",
            Stage::GaussianNb(_) => "gaussian_nb",
            Stage::StandardScaler(_) => "standard_scaler",
            Stage::SimpleImputer(_) => "simple_imputer",
            Stage::ColumnSelector(_) => "column_selector",
            Stage::Pipeline(_) => "pipeline",
        }
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        match self {
            Stage::LogisticRegression(m) => m.validate(),
            Stage::BernoulliNb(m) => m.validate(),
            Stage::GaussianNb(m) => m.validate(),
            Stage::StandardScaler(t) => t.validate(),
            Stage::SimpleImputer(t) => t.validate(),
            Stage::ColumnSelector(s) if s.columns.is_empty() => {
                Err(ArtifactError::Invalid("column selector lists no columns".into()))
            }
            Stage::ColumnSelector(_) => Ok(()),
            Stage::Pipeline(p) => p.validate(),
        }
    }

    pub fn is_predictor(&self) -> bool {
        match self {
            Stage::LogisticRegression(_) | Stage::BernoulliNb(_) | Stage::GaussianNb(_) => true,
            Stage::Pipeline(p) => p.ends_with_predictor(),
            Stage::StandardScaler(_) | Stage::SimpleImputer(_) | Stage::ColumnSelector(_) => false,
        }
    }

    pub fn as_predictor(&self) -> Option<&dyn Predictor> {
        match self {
            Stage::LogisticRegression(m) => Some(m as &dyn Predictor),
            Stage::BernoulliNb(m) => Some(m as &dyn Predictor),
            Stage::GaussianNb(m) => Some(m as &dyn Predictor),
            Stage::Pipeline(p) if p.ends_with_predictor() => Some(p as &dyn Predictor),
            _ => None,
        }
    }

    /// Input column names the stage declares. A selector declares the columns
    /// it picks.
    pub fn feature_names(&self) -> Option<Vec<String>> {
        match self {
            Stage::StandardScaler(t) => t.schema.feature_names_in.clone(),
            Stage::SimpleImputer(t) => t.schema.feature_names_in.clone(),
            Stage::ColumnSelector(s) => Some(s.columns.clone()),
            Stage::Pipeline(p) => p.feature_names(),
            _ => self.as_predictor().and_then(Predictor::feature_names),
        }
    }

    pub fn feature_count(&self) -> Option<usize> {
        match self {
            Stage::StandardScaler(t) => t.expected_width(),
            Stage::SimpleImputer(t) => t.expected_width(),
            Stage::ColumnSelector(s) => Some(s.columns.len()),
            Stage::Pipeline(p) => p.feature_count(),
            _ => self.as_predictor().and_then(Predictor::feature_count),
        }
    }

    /// Applies a non-predicting stage inside a pipeline.
    pub(crate) fn transform_input(
        &self,
        input: &ModelInput,
        step: &str,
    ) -> Result<ModelInput, ModelError> {
        match self {
            Stage::StandardScaler(t) => t.apply(input).map(ModelInput::Matrix),
            Stage::SimpleImputer(t) => t.apply(input).map(ModelInput::Matrix),
            Stage::ColumnSelector(s) => s.apply(input).map(ModelInput::Matrix),
            Stage::Pipeline(p) if p.is_transform_only() => p.transform_prefix(input),
            _ => Err(ModelError::NotATransformer(step.to_string())),
        }
    }

    pub fn into_predictor(self) -> Result<Arc<dyn Predictor>, ArtifactError> {
        match self {
            Stage::LogisticRegression(m) => Ok(Arc::new(m)),
            Stage::BernoulliNb(m) => Ok(Arc::new(m)),
            Stage::GaussianNb(m) => Ok(Arc::new(m)),
            Stage::Pipeline(p) if p.ends_with_predictor() => Ok(Arc::new(p)),
            other => Err(ArtifactError::Role {
                kind: other.kind().to_string(),
                expected: "predictor",
            }),
        }
    }

    pub fn into_transformer(self) -> Result<Arc<dyn Transformer>, ArtifactError> {
        match self {
            Stage::StandardScaler(t) => Ok(Arc::new(t)),
            Stage::SimpleImputer(t) => Ok(Arc::new(t)),
            other => Err(ArtifactError::Role {
                kind: other.kind().to_string(),
                expected: "scaler",
            }),
        }
    }
}

/// Turns an artifact file into a usable model or scaler.
pub trait ArtifactLoader: Send + Sync {
    fn load_model(&self, path: &Path) -> Result<Arc<dyn Predictor>, ArtifactError>;
    fn load_scaler(&self, path: &Path) -> Result<Arc<dyn Transformer>, ArtifactError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonArtifactLoader;

impl JsonArtifactLoader {
    pub fn read_stage(path: &Path) -> Result<Stage, ArtifactError> {
        let bytes = fs::read(path)?;
        Self::parse_stage(&bytes)
    }

    pub fn parse_stage(bytes: &[u8]) -> Result<Stage, ArtifactError> {
        let stage: Stage = serde_json::from_slice(bytes)?;
        stage.validate()?;
        Ok(stage)
    }
}

impl ArtifactLoader for JsonArtifactLoader {
    fn load_model(&self, path: &Path) -> Result<Arc<dyn Predictor>, ArtifactError> {
        let stage = Self::read_stage(path)?;
        tracing::debug!(path = %path.display(), kind = stage.kind(), "loaded model artifact");
        stage.into_predictor()
    }

    fn load_scaler(&self, path: &Path) -> Result<Arc<dyn Transformer>, ArtifactError> {
        let stage = Self::read_stage(path)?;
        tracing::debug!(path = %path.display(), kind = stage.kind(), "loaded scaler artifact");
        stage.into_transformer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const NB: &str = r#"{
        "kind": "bernoulli_nb",
        "class_log_prior": [-0.6931471805599453, -0.6931471805599453],
        "feature_log_prob": [[-1.6094379124341003], [-0.2231435513142097]],
        "classes": [0, 1],
        "feature_names_in": ["air_time"]
    }"#;

    const PIPELINE: &str = r#"{
        "kind": "pipeline",
        "steps": [
            {"name": "select", "stage": {"kind": "column_selector", "columns": ["paper_time"]}},
            {"name": "impute", "stage": {"kind": "simple_imputer", "statistics": [0]}},
            {"name": "clf", "stage": {
                "kind": "logistic_regression",
                "coef": [[1.0]], "intercept": [0], "classes": [0, 1]
            }}
        ]
    }"#;

    #[test]
    fn parses_tagged_documents() {
        let stage = JsonArtifactLoader::parse_stage(NB.as_bytes()).unwrap();
        assert_eq!(stage.kind(), "bernoulli_nb");
        assert_matches!(&stage, Stage::BernoulliNb(nb) if nb.binarize == Some(0.0));
        assert_eq!(stage.feature_names(), Some(vec!["air_time".to_string()]));

        let pipeline = JsonArtifactLoader::parse_stage(PIPELINE.as_bytes()).unwrap();
        assert!(pipeline.is_predictor());
        let model = pipeline.into_predictor().unwrap();
        assert!(model.is_composite_pipeline());
        assert_eq!(model.feature_names(), Some(vec!["paper_time".to_string()]));
    }

    #[test]
    fn rejects_invalid_parameters() {
        let doc = r#"{"kind": "logistic_regression", "coef": [[1.0, 2.0]], "intercept": [0, 0], "classes": [0, 1]}"#;
        assert_matches!(
            JsonArtifactLoader::parse_stage(doc.as_bytes()),
            Err(ArtifactError::Invalid(_))
        );
        assert_matches!(
            JsonArtifactLoader::parse_stage(b"not json"),
            Err(ArtifactError::Parse(_))
        );
        assert_matches!(
            JsonArtifactLoader::parse_stage(br#"{"kind": "random_forest"}"#),
            Err(ArtifactError::Parse(_))
        );
    }

    #[test]
    fn roles_are_enforced_on_load() {
        let mut scaler = NamedTempFile::new().unwrap();
        write!(scaler, r#"{{"kind": "standard_scaler", "mean": [1.0], "scale": [2.0]}}"#).unwrap();
        let mut model = NamedTempFile::new().unwrap();
        write!(model, "{NB}").unwrap();

        let loader = JsonArtifactLoader;
        assert!(loader.load_scaler(scaler.path()).is_ok());
        assert!(loader.load_model(model.path()).is_ok());
        assert_matches!(
            loader.load_model(scaler.path()),
            Err(ArtifactError::Role { expected: "predictor", .. })
        );
        assert_matches!(
            loader.load_scaler(model.path()),
            Err(ArtifactError::Role { expected: "scaler", .. })
        );
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            JsonArtifactLoader.load_model(&dir.path().join("absent.json")),
            Err(ArtifactError::Io(_))
        );
    }
}
