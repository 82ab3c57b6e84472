use serde::{Deserialize, Serialize};

use super::{Matrix, ModelInput, Predictor, Stage};
use crate::error::{ArtifactError, ModelError};
use crate::value::Datum;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub stage: Stage,
}

/// Ordered named stages: every step but the last transforms its input, the
/// last one predicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub steps: Vec<Step>,
}

impl Pipeline {
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let Some((last, intermediate)) = self.steps.split_last() else {
            return Err(ArtifactError::Invalid("pipeline has no steps".into()));
        };
        for step in &self.steps {
            step.stage.validate()?;
        }
        if let Some(step) = intermediate.iter().find(|s| s.stage.is_predictor()) {
            return Err(ArtifactError::Invalid(format!(
                "intermediate step '{}' is an estimator",
                step.name
            )));
        }
        if !last.stage.is_predictor() && !self.is_transform_only() {
            return Err(ArtifactError::Invalid(format!(
                "final step '{}' cannot predict",
                last.name
            )));
        }
        Ok(())
    }

    /// True when no step predicts, so the whole pipeline is a transform.
    pub fn is_transform_only(&self) -> bool {
        self.steps.iter().all(|s| !s.stage.is_predictor())
    }

    pub fn ends_with_predictor(&self) -> bool {
        self.steps.last().is_some_and(|s| s.stage.is_predictor())
    }

    /// Runs `input` through every transforming step.
    pub(crate) fn transform_prefix(&self, input: &ModelInput) -> Result<ModelInput, ModelError> {
        let transforms = if self.ends_with_predictor() {
            &self.steps[..self.steps.len() - 1]
        } else {
            &self.steps[..]
        };
        let mut current = input.clone();
        for step in transforms {
            tracing::trace!(step = %step.name, "applying pipeline step");
            current = step.stage.transform_input(&current, &step.name)?;
        }
        Ok(current)
    }

    fn estimator(&self) -> Result<&dyn Predictor, ModelError> {
        self.steps
            .last()
            .and_then(|s| s.stage.as_predictor())
            .ok_or(ModelError::Unsupported { operation: "predict" })
    }
}

impl Predictor for Pipeline {
    fn feature_names(&self) -> Option<Vec<String>> {
        self.steps.iter().find_map(|s| s.stage.feature_names())
    }

    fn feature_count(&self) -> Option<usize> {
        self.steps.iter().find_map(|s| s.stage.feature_count())
    }

    fn is_composite_pipeline(&self) -> bool {
        true
    }

    fn predict(&self, input: &ModelInput) -> Result<Vec<Datum>, ModelError> {
        let estimator = self.estimator()?;
        estimator.predict(&self.transform_prefix(input)?)
    }

    fn predict_probabilities(&self, input: &ModelInput) -> Result<Matrix, ModelError> {
        let estimator = self.estimator()?;
        estimator.predict_probabilities(&self.transform_prefix(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BernoulliNb, ColumnSelector, FeatureTable, InputSchema, LogisticRegression, StandardScaler,
    };
    use assert_matches::assert_matches;
    use serde_json::json;

    fn pipeline() -> Pipeline {
        Pipeline {
            steps: vec![
                Step {
                    name: "select".into(),
                    stage: Stage::ColumnSelector(ColumnSelector {
                        columns: vec!["paper_time".into(), "air_time".into()],
                    }),
                },
                Step {
                    name: "scale".into(),
                    stage: Stage::StandardScaler(StandardScaler {
                        mean: Some(vec![4.0, 1.0]),
                        scale: Some(vec![2.0, 1.0]),
                        schema: InputSchema::default(),
                    }),
                },
                Step {
                    name: "clf".into(),
                    stage: Stage::LogisticRegression(LogisticRegression {
                        coef: vec![vec![1.0, 0.0]],
                        intercept: vec![0.0],
                        classes: vec![json!(0), json!(1)],
                        schema: InputSchema::default(),
                    }),
                },
            ],
        }
    }

    #[test]
    fn pipeline_selects_scales_and_predicts() {
        let p = pipeline();
        assert!(p.validate().is_ok());
        assert!(p.is_composite_pipeline());
        let table = FeatureTable::single_row(
            vec!["air_time".into(), "paper_time".into()],
            vec![1.0, 8.0],
        );
        let proba = p.predict_probabilities(&ModelInput::Table(table.clone())).unwrap();
        // paper_time scaled to 2.0 -> sigmoid(2)
        assert!((proba[0][1] - 1.0 / (1.0 + (-2.0f64).exp())).abs() < 1e-12);
        assert_eq!(p.predict(&ModelInput::Table(table)).unwrap(), vec![Datum::Int(1)]);
    }

    #[test]
    fn pipeline_reports_selector_columns_as_feature_names() {
        assert_eq!(
            pipeline().feature_names(),
            Some(vec!["paper_time".to_string(), "air_time".to_string()])
        );
        assert_eq!(pipeline().feature_count(), Some(2));
    }

    #[test]
    fn selector_pipeline_rejects_bare_matrix() {
        assert_matches!(
            pipeline().predict(&ModelInput::Matrix(vec![vec![1.0, 2.0]])),
            Err(ModelError::NeedsTable(_))
        );
    }

    #[test]
    fn validation_requires_final_estimator_position() {
        let mut p = pipeline();
        p.steps.swap(1, 2);
        assert!(p.validate().is_err());

        let empty = Pipeline { steps: vec![] };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn first_declaring_step_wins() {
        let p = Pipeline {
            steps: vec![
                Step {
                    name: "scale".into(),
                    stage: Stage::StandardScaler(StandardScaler {
                        mean: None,
                        scale: None,
                        schema: InputSchema::default(),
                    }),
                },
                Step {
                    name: "nb".into(),
                    stage: Stage::BernoulliNb(BernoulliNb {
                        class_log_prior: vec![0.5f64.ln(), 0.5f64.ln()],
                        feature_log_prob: vec![vec![0.5f64.ln()], vec![0.5f64.ln()]],
                        binarize: Some(0.0),
                        classes: vec![json!(0), json!(1)],
                        schema: InputSchema {
                            feature_names_in: Some(vec!["mean_gmrt".into()]),
                            n_features_in: Some(1),
                        },
                    }),
                },
            ],
        };
        assert_eq!(p.feature_names(), Some(vec!["mean_gmrt".to_string()]));
        assert_eq!(p.feature_count(), Some(1));
    }

    #[test]
    fn count_declared_by_final_estimator_binds() {
        let p = Pipeline {
            steps: vec![
                Step {
                    name: "scale".into(),
                    stage: Stage::StandardScaler(StandardScaler {
                        mean: None,
                        scale: None,
                        schema: InputSchema::default(),
                    }),
                },
                Step {
                    name: "clf".into(),
                    stage: Stage::LogisticRegression(LogisticRegression {
                        coef: vec![vec![1.0, 1.0]],
                        intercept: vec![0.0],
                        classes: vec![json!(0), json!(1)],
                        schema: InputSchema {
                            feature_names_in: None,
                            n_features_in: Some(2),
                        },
                    }),
                },
            ],
        };
        assert_eq!(p.feature_names(), None);
        assert_eq!(p.feature_count(), Some(2));
        assert_eq!(Stage::Pipeline(p.clone()).feature_count(), Some(2));

        let features: crate::features::FeatureSet = std::iter::empty::<(String, Datum)>().collect();
        let frame = crate::frame::StrokeFrame::from_columns([("time", vec![0.0])]);
        assert_matches!(
            crate::binder::bind(&p, &features, &frame),
            crate::binder::Binding::Bound(bound) if bound.names == ["col_0", "col_1"]
        );
    }
}
