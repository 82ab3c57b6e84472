//! Maps aggregate features onto the input names a model declares.

use std::sync::LazyLock;

use regex::Regex;

use crate::features::FeatureSet;
use crate::frame::StrokeFrame;
use crate::model::{FeatureTable, Predictor};
use crate::value::Datum;

static TRAILING_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+$").unwrap());
static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^[:alnum:]]+").unwrap());

/// Which fallback produced a bound value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MatchRule {
    Exact,
    Column,
    StrippedSuffix,
    Normalized,
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub rule: MatchRule,
    pub value: Datum,
}

fn strip_suffix(name: &str) -> &str {
    match TRAILING_DIGITS.find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}

fn normalize(name: &str) -> String {
    NON_ALNUM.replace_all(&name.to_lowercase(), "_").into_owned()
}

/// Looks `target` up through the fallback chain. `None` means nothing
/// matched and the caller should use the default.
pub fn resolve_feature(target: &str, features: &FeatureSet, frame: &StrokeFrame) -> Option<Resolved> {
    let found = |rule, value: &Datum| {
        Some(Resolved {
            rule,
            value: value.clone(),
        })
    };

    if let Some(value) = features.get(target) {
        return found(MatchRule::Exact, value);
    }
    if frame.has_column(target) {
        return Some(Resolved {
            rule: MatchRule::Column,
            value: frame.first_value(target).into(),
        });
    }
    let base = strip_suffix(target);
    if let Some(value) = features.get(base) {
        return found(MatchRule::StrippedSuffix, value);
    }
    let wanted = normalize(target);
    let wanted_base = normalize(base);
    features
        .iter()
        .find(|(key, _)| {
            let key = normalize(key);
            key == wanted || key == wanted_base
        })
        .and_then(|(_, value)| found(MatchRule::Normalized, value))
}

/// Finite numeric reading of a bound value; anything else becomes 0.0.
pub fn coerce_finite(value: &Datum) -> f64 {
    value.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// The names a model wants, or `col_<i>` placeholders when it only declares
/// a count.
pub fn target_feature_names(model: &dyn Predictor) -> Option<Vec<String>> {
    model.feature_names().or_else(|| {
        model
            .feature_count()
            .map(|n| (0..n).map(|i| format!("col_{i}")).collect())
    })
}

/// Model input bound in target order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundInput {
    pub names: Vec<String>,
    pub values: Vec<f64>,
    pub rules: Vec<MatchRule>,
}

impl BoundInput {
    pub fn width(&self) -> usize {
        self.values.len()
    }

    /// Name -> value, in target order.
    pub fn mapping(&self) -> Datum {
        Datum::map(
            self.names
                .iter()
                .zip(&self.values)
                .map(|(n, v)| (n.clone(), Datum::Float(*v))),
        )
    }

    pub fn matched_by(&self) -> Datum {
        Datum::map(
            self.names
                .iter()
                .zip(&self.rules)
                .map(|(n, r)| (n.clone(), Datum::Text(r.to_string()))),
        )
    }

    pub fn table(&self) -> FeatureTable {
        FeatureTable::single_row(self.names.clone(), self.values.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Bound(BoundInput),
    /// The model declares neither feature names nor a feature count.
    InsufficientMetadata,
}

pub fn bind(model: &dyn Predictor, features: &FeatureSet, frame: &StrokeFrame) -> Binding {
    let Some(names) = target_feature_names(model) else {
        return Binding::InsufficientMetadata;
    };
    let (values, rules) = names
        .iter()
        .map(|name| match resolve_feature(name, features, frame) {
            Some(resolved) => (coerce_finite(&resolved.value), resolved.rule),
            None => (0.0, MatchRule::Default),
        })
        .unzip();
    let bound = BoundInput {
        names,
        values,
        rules,
    };
    tracing::debug!(
        width = bound.width(),
        defaulted = bound.rules.iter().filter(|r| **r == MatchRule::Default).count(),
        "bound model input"
    );
    Binding::Bound(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::{Matrix, ModelInput};
    use assert_matches::assert_matches;

    #[derive(Debug)]
    struct Declared {
        names: Option<Vec<String>>,
        count: Option<usize>,
    }

    impl Predictor for Declared {
        fn feature_names(&self) -> Option<Vec<String>> {
            self.names.clone()
        }

        fn feature_count(&self) -> Option<usize> {
            self.count
        }

        fn predict(&self, _input: &ModelInput) -> Result<Vec<Datum>, ModelError> {
            Ok(vec![])
        }

        fn predict_probabilities(&self, _input: &ModelInput) -> Result<Matrix, ModelError> {
            Ok(vec![])
        }
    }

    fn features() -> FeatureSet {
        [
            ("air_time", Datum::UInt(1)),
            ("mean_speed_on_paper", Datum::Float(f64::NAN)),
            ("Pressure Mean", Datum::Float(0.5)),
            ("num_of_pendown", Datum::Null),
        ]
        .into_iter()
        .collect()
    }

    fn frame() -> StrokeFrame {
        StrokeFrame::from_columns([("SPEED", vec![3.5, 9.0]), ("X", vec![10.0, 20.0])])
    }

    #[test]
    fn exact_match_comes_first() {
        let r = resolve_feature("air_time", &features(), &frame()).unwrap();
        assert_eq!(r.rule, MatchRule::Exact);
        assert_eq!(coerce_finite(&r.value), 1.0);
    }

    #[test]
    fn column_match_uses_first_row() {
        let r = resolve_feature("SPEED", &features(), &frame()).unwrap();
        assert_eq!(r, Resolved { rule: MatchRule::Column, value: Datum::Float(3.5) });
    }

    #[test]
    fn trailing_digits_are_stripped() {
        let r = resolve_feature("air_time1", &features(), &frame()).unwrap();
        assert_eq!(r.rule, MatchRule::StrippedSuffix);
        assert_eq!(coerce_finite(&r.value), 1.0);
    }

    #[test]
    fn normalized_names_match() {
        let r = resolve_feature("pressure-mean", &features(), &frame()).unwrap();
        assert_eq!(r.rule, MatchRule::Normalized);
        assert_eq!(coerce_finite(&r.value), 0.5);

        let stripped = resolve_feature("PRESSURE MEAN2", &features(), &frame()).unwrap();
        assert_eq!(stripped.rule, MatchRule::Normalized);
    }

    #[test]
    fn separator_runs_collapse_when_normalizing() {
        let features: FeatureSet = [("mean_gmrt", Datum::Float(2.5)), ("air_time", Datum::UInt(7))]
            .into_iter()
            .collect();
        let gmrt = resolve_feature("MEAN__GMRT", &features, &frame()).unwrap();
        assert_eq!(gmrt, Resolved { rule: MatchRule::Normalized, value: Datum::Float(2.5) });
        let air = resolve_feature("air_-time", &features, &frame()).unwrap();
        assert_eq!(air.rule, MatchRule::Normalized);
        assert_eq!(coerce_finite(&air.value), 7.0);
        assert_eq!(normalize("Air _-_ Time3"), "air_time3");
    }

    #[test]
    fn unknown_names_are_unresolved() {
        assert_matches!(resolve_feature("stroke_count", &features(), &frame()), None);
    }

    #[test]
    fn non_finite_values_coerce_to_zero() {
        assert_eq!(coerce_finite(&Datum::Float(f64::NAN)), 0.0);
        assert_eq!(coerce_finite(&Datum::Float(f64::NEG_INFINITY)), 0.0);
        assert_eq!(coerce_finite(&Datum::Null), 0.0);
        assert_eq!(coerce_finite(&Datum::Text("abc".into())), 0.0);
        assert_eq!(coerce_finite(&Datum::Text("2.5".into())), 2.5);
    }

    #[test]
    fn bound_vector_follows_target_order() {
        let model = Declared {
            names: Some(vec![
                "mean_speed_on_paper".into(),
                "air_time2".into(),
                "unknown".into(),
                "num_of_pendown".into(),
            ]),
            count: None,
        };
        let Binding::Bound(bound) = bind(&model, &features(), &frame()) else {
            panic!("expected a binding");
        };
        assert_eq!(bound.values, vec![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(bound.names.len(), bound.values.len());
        assert_eq!(
            bound.rules,
            vec![MatchRule::Exact, MatchRule::StrippedSuffix, MatchRule::Default, MatchRule::Exact]
        );
        assert_eq!(bound.matched_by().get("unknown"), Some(&Datum::Text("default".into())));
        assert_eq!(bound.table().columns, bound.names);
    }

    #[test]
    fn count_only_models_get_placeholder_names() {
        let model = Declared { names: None, count: Some(3) };
        assert_eq!(
            target_feature_names(&model),
            Some(vec!["col_0".to_string(), "col_1".into(), "col_2".into()])
        );
        let Binding::Bound(bound) = bind(&model, &features(), &frame()) else {
            panic!("expected a binding");
        };
        assert_eq!(bound.values, vec![0.0; 3]);
    }

    #[test]
    fn models_without_metadata_cannot_be_bound() {
        let model = Declared { names: None, count: None };
        assert_eq!(bind(&model, &features(), &frame()), Binding::InsufficientMetadata);
    }
}
