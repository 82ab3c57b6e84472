//! Session-level kinematic and pressure statistics of a stroke table.

use crate::config::ColumnNames;
use crate::error::SchemaError;
use crate::frame::StrokeFrame;
use crate::util::{diff, divide, fill_undefined_with_mean, max, mean, variance};
use crate::value::Datum;

pub const ELAPSED: &str = "TIME_DIFF";
pub const TIME_DELTA: &str = "TIME_DIFF_DELTA";
pub const DISTANCE: &str = "DISTANCE";
pub const SPEED: &str = "SPEED";
pub const ACCELERATION: &str = "ACCELERATION";
pub const JERK: &str = "JERK";

const ON_SURFACE: f64 = 1.0;
const IN_AIR: f64 = 0.0;

/// Ordered mapping from aggregate feature name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    entries: Vec<(String, Datum)>,
}

impl FeatureSet {
    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Datum) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Datum)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_datum(&self) -> Datum {
        Datum::Map(self.entries.clone())
    }
}

impl<K: Into<String>> FromIterator<(K, Datum)> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = (K, Datum)>>(iter: I) -> Self {
        let mut set = FeatureSet::default();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

/// Aggregates plus the table enriched with the per-sample kinematic columns.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub features: FeatureSet,
    pub frame: StrokeFrame,
}

/// Mean absolute change of the radial distance between samples `offset` rows
/// apart. Zero when there are not more than `offset` samples.
pub fn gmrt(xs: &[f64], ys: &[f64], offset: usize) -> f64 {
    let n = xs.len().min(ys.len());
    if n <= offset {
        return 0.0;
    }
    let radii: Vec<f64> = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x * x + y * y).sqrt())
        .collect();
    let total: f64 = diff(&radii, offset)
        .into_iter()
        .filter(|d| !d.is_nan())
        .map(f64::abs)
        .sum();
    total / (n - offset) as f64
}

/// Rows whose contact flag equals `state`.
fn rows_where(contact: &[f64], state: f64) -> Vec<usize> {
    contact
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == state)
        .map(|(i, _)| i)
        .collect()
}

fn select(values: &[f64], rows: &[usize]) -> Vec<f64> {
    rows.iter().map(|&i| values[i]).collect()
}

fn float(v: Option<f64>) -> Datum {
    v.map_or(Datum::Float(f64::NAN), Datum::Float)
}

struct ContactStats {
    count: usize,
    mean_speed: Option<f64>,
    mean_jerk: Option<f64>,
    gmrt: f64,
}

impl ContactStats {
    fn collect(rows: &[usize], frame: &Enriched, offset: usize) -> Self {
        Self {
            count: rows.iter().filter(|&&i| !frame.elapsed[i].is_nan()).count(),
            mean_speed: mean(&select(&frame.speed, rows)),
            mean_jerk: mean(&select(&frame.jerk, rows)),
            gmrt: gmrt(&select(&frame.x, rows), &select(&frame.y, rows), offset),
        }
    }
}

fn contact_stat(stats: &Option<ContactStats>, f: impl Fn(&ContactStats) -> Datum) -> Datum {
    stats.as_ref().map_or(Datum::Null, f)
}

struct Enriched {
    elapsed: Vec<f64>,
    speed: Vec<f64>,
    jerk: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
}

/// Derives the per-sample kinematic columns and the session aggregates.
///
/// Fails only when the time column is absent. Statistics conditioned on the
/// contact flag are null when the table has no contact column.
pub fn extract(
    mut frame: StrokeFrame,
    names: &ColumnNames,
    gmrt_offset: usize,
) -> Result<Extraction, SchemaError> {
    let time = frame
        .column(&names.time)
        .ok_or_else(|| SchemaError::MissingColumn(names.time.clone()))?
        .to_vec();
    let len = frame.len();
    let undefined = || vec![f64::NAN; len];

    let origin = time.first().map_or(f64::NAN, |t0| t0 + 1.0);
    let elapsed: Vec<f64> = time.iter().map(|t| t - origin).collect();
    let total_time = elapsed.last().copied().unwrap_or(f64::NAN);

    let delta: Vec<f64> = diff(&elapsed, 1)
        .into_iter()
        .map(|d| if d == 0.0 { f64::NAN } else { d })
        .collect();

    let xs = frame.column(&names.x).map_or_else(undefined, <[f64]>::to_vec);
    let ys = frame.column(&names.y).map_or_else(undefined, <[f64]>::to_vec);
    let distance: Vec<f64> = diff(&xs, 1)
        .iter()
        .zip(diff(&ys, 1))
        .map(|(dx, dy)| (dx * dx + dy * dy).sqrt())
        .collect();

    let mut speed = divide(&distance, &delta);
    let mut acceleration = divide(&diff(&speed, 1), &delta);
    let mut jerk = divide(&diff(&acceleration, 1), &delta);
    for column in [&mut speed, &mut acceleration, &mut jerk] {
        fill_undefined_with_mean(column);
    }

    let pressure = frame.column(&names.pressure).map(<[f64]>::to_vec);
    let contact = frame.column(&names.contact).map(<[f64]>::to_vec);
    let has_x = frame.has_column(&names.x);
    let has_y = frame.has_column(&names.y);

    frame.set_column(ELAPSED, elapsed.clone());
    frame.set_column(TIME_DELTA, delta);
    frame.set_column(DISTANCE, distance);
    frame.set_column(SPEED, speed.clone());
    frame.set_column(ACCELERATION, acceleration);
    frame.set_column(JERK, jerk.clone());

    let enriched = Enriched {
        elapsed,
        speed,
        jerk,
        x: xs,
        y: ys,
    };

    let (on_paper, in_air, pendowns) = match &contact {
        Some(flags) => {
            let on = ContactStats::collect(&rows_where(flags, ON_SURFACE), &enriched, gmrt_offset);
            let off = ContactStats::collect(&rows_where(flags, IN_AIR), &enriched, gmrt_offset);
            let pendowns = diff(flags, 1).into_iter().filter(|d| *d == 1.0).count();
            (Some(on), Some(off), Some(pendowns))
        }
        None => (None, None, None),
    };

    let gmrt_on = on_paper.as_ref().map(|s| s.gmrt);
    let gmrt_off = in_air.as_ref().map(|s| s.gmrt);
    let mean_gmrt = (gmrt_on.unwrap_or(0.0) + gmrt_off.unwrap_or(0.0)) / 2.0;

    // Kept as the mean speed: trained schemas consume these keys with that meaning.
    let mean_acc_in_air = in_air.as_ref().map(|s| float(s.mean_speed));
    let mean_acc_on_paper = on_paper.as_ref().map(|s| float(s.mean_speed));

    let features: FeatureSet = [
        ("air_time", contact_stat(&in_air, |s| Datum::from(s.count))),
        ("gmrt_in_air", gmrt_off.map_or(Datum::Null, Datum::Float)),
        ("gmrt_on_paper", gmrt_on.map_or(Datum::Null, Datum::Float)),
        ("max_x_extension", if has_x { float(max(&enriched.x)) } else { Datum::Null }),
        ("max_y_extension", if has_y { float(max(&enriched.y)) } else { Datum::Null }),
        ("mean_acc_in_air", mean_acc_in_air.unwrap_or(Datum::Null)),
        ("mean_acc_on_paper", mean_acc_on_paper.unwrap_or(Datum::Null)),
        ("mean_gmrt", Datum::Float(mean_gmrt)),
        ("mean_jerk_in_air", contact_stat(&in_air, |s| float(s.mean_jerk))),
        ("mean_jerk_on_paper", contact_stat(&on_paper, |s| float(s.mean_jerk))),
        ("mean_speed_in_air", contact_stat(&in_air, |s| float(s.mean_speed))),
        ("mean_speed_on_paper", contact_stat(&on_paper, |s| float(s.mean_speed))),
        ("num_of_pendown", Datum::from(pendowns)),
        ("paper_time", contact_stat(&on_paper, |s| Datum::from(s.count))),
        ("pressure_mean", pressure.as_deref().map_or(Datum::Null, |p| float(mean(p)))),
        ("pressure_var", pressure.as_deref().map_or(Datum::Null, |p| float(variance(p)))),
        ("total_time", Datum::Float(total_time)),
    ]
    .into_iter()
    .collect();

    tracing::debug!(samples = len, features = features.len(), "extracted stroke features");

    Ok(Extraction { features, frame })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTACT_KEYS: [&str; 9] = [
        "air_time",
        "paper_time",
        "mean_speed_in_air",
        "mean_speed_on_paper",
        "mean_jerk_in_air",
        "mean_jerk_on_paper",
        "gmrt_in_air",
        "gmrt_on_paper",
        "num_of_pendown",
    ];

    fn names() -> ColumnNames {
        ColumnNames::default()
    }

    fn session() -> StrokeFrame {
        let t0 = 1_700_000_000_000.0;
        let mut time: Vec<f64> = (0..8).map(|i| t0 + 20.0 * i as f64).collect();
        time.push(t0 + 180.0);
        let x: Vec<f64> = (0..8).map(|i| 50.0 + 5.0 * i as f64).chain([90.0]).collect();
        let y: Vec<f64> = (0..8).map(|i| 50.0 + 3.0 * i as f64).chain([74.0]).collect();
        let pressure: Vec<f64> = [0.5]
            .into_iter()
            .chain((1..8).map(|i| 0.4 + 0.05 * i as f64))
            .chain([0.0])
            .collect();
        let contact = vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0];
        StrokeFrame::from_columns([
            ("time", time),
            ("X", x),
            ("Y", y),
            ("pressure", pressure),
            ("contact", contact),
        ])
    }

    fn num(features: &FeatureSet, key: &str) -> f64 {
        features.get(key).and_then(Datum::as_f64).unwrap()
    }

    #[test]
    fn first_elapsed_is_minus_one_and_total_is_last() {
        let out = extract(session(), &names(), 1).unwrap();
        let elapsed = out.frame.column(ELAPSED).unwrap();
        assert_eq!(elapsed[0], -1.0);
        assert_eq!(num(&out.features, "total_time"), *elapsed.last().unwrap());
    }

    #[test]
    fn end_to_end_session_statistics() {
        let out = extract(session(), &names(), 1).unwrap();
        let f = &out.features;
        assert_eq!(f.get("paper_time"), Some(&Datum::UInt(8)));
        assert_eq!(f.get("air_time"), Some(&Datum::UInt(1)));
        // all-down then up never goes 0 -> 1
        assert_eq!(f.get("num_of_pendown"), Some(&Datum::UInt(0)));
        assert_eq!(num(f, "total_time"), 179.0);
        assert_eq!(num(f, "max_x_extension"), 90.0);
        assert_eq!(num(f, "max_y_extension"), 74.0);
        assert_eq!(num(f, "gmrt_in_air"), 0.0);
        assert!(num(f, "gmrt_on_paper") > 0.0);
        assert_eq!(num(f, "mean_gmrt"), num(f, "gmrt_on_paper") / 2.0);
        assert_eq!(num(f, "mean_acc_on_paper"), num(f, "mean_speed_on_paper"));
        assert_eq!(num(f, "mean_acc_in_air"), num(f, "mean_speed_in_air"));
        assert!((num(f, "pressure_mean") - 0.5222222222222222).abs() < 1e-9);
    }

    #[test]
    fn speed_of_uniform_motion() {
        let out = extract(session(), &names(), 1).unwrap();
        let speed = out.frame.column(SPEED).unwrap();
        let expected = (25.0f64 + 9.0).sqrt() / 20.0;
        // first row is filled with the column mean, not zero
        assert!(speed.iter().all(|v| !v.is_nan()));
        assert!((speed[1] - expected).abs() < 1e-12);
        assert!((speed[7] - expected).abs() < 1e-12);
    }

    #[test]
    fn pendowns_count_zero_to_one_transitions() {
        let frame = StrokeFrame::from_columns([
            ("time", vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]),
            ("X", vec![0.0; 6]),
            ("Y", vec![0.0; 6]),
            ("contact", vec![0.0, 1.0, 1.0, 0.0, 1.0, 0.0]),
        ]);
        let out = extract(frame, &names(), 1).unwrap();
        assert_eq!(out.features.get("num_of_pendown"), Some(&Datum::UInt(2)));
    }

    #[test]
    fn missing_contact_nulls_contact_statistics() {
        let frame = StrokeFrame::from_columns([
            ("time", vec![0.0, 10.0, 20.0]),
            ("X", vec![1.0, 2.0, 3.0]),
            ("Y", vec![1.0, 2.0, 3.0]),
        ]);
        let out = extract(frame, &names(), 1).unwrap();
        for key in CONTACT_KEYS {
            assert_eq!(out.features.get(key), Some(&Datum::Null), "{key}");
        }
        assert_eq!(out.features.get("mean_gmrt"), Some(&Datum::Float(0.0)));
        assert_eq!(out.features.get("pressure_mean"), Some(&Datum::Null));
    }

    #[test]
    fn missing_time_column_is_a_schema_error() {
        let frame = StrokeFrame::from_columns([("X", vec![1.0])]);
        assert_eq!(
            extract(frame, &names(), 1).unwrap_err(),
            SchemaError::MissingColumn("time".into())
        );
    }

    #[test]
    fn gmrt_is_zero_for_short_subsets() {
        for d in 1..4 {
            let xs: Vec<f64> = (0..d).map(|i| i as f64 * 3.0).collect();
            let ys = xs.clone();
            assert_eq!(gmrt(&xs, &ys, d), 0.0);
        }
        assert_eq!(gmrt(&[], &[], 1), 0.0);
    }

    #[test]
    fn gmrt_averages_radius_changes() {
        // radii 5, 10, 5
        let g = gmrt(&[3.0, 6.0, 3.0], &[4.0, 8.0, 4.0], 1);
        assert!((g - 5.0).abs() < 1e-12);
        let g2 = gmrt(&[3.0, 6.0, 3.0], &[4.0, 8.0, 4.0], 2);
        assert_eq!(g2, 0.0);
    }

    #[test]
    fn single_row_session() {
        let frame = StrokeFrame::from_columns([
            ("time", vec![5.0]),
            ("X", vec![1.0]),
            ("Y", vec![2.0]),
            ("contact", vec![1.0]),
        ]);
        let out = extract(frame, &names(), 1).unwrap();
        assert_eq!(num(&out.features, "total_time"), -1.0);
        assert_eq!(out.features.get("gmrt_on_paper"), Some(&Datum::Float(0.0)));
        assert_eq!(out.features.get("paper_time"), Some(&Datum::UInt(1)));
        assert!(num(&out.features, "mean_speed_on_paper").is_nan());
    }

    #[test]
    fn empty_session_degrades_to_undefined() {
        let frame = StrokeFrame::from_columns([
            ("time", Vec::new()),
            ("X", Vec::new()),
            ("Y", Vec::new()),
            ("contact", Vec::new()),
        ]);
        let out = extract(frame, &names(), 1).unwrap();
        assert!(num(&out.features, "total_time").is_nan());
        assert!(num(&out.features, "max_x_extension").is_nan());
        assert_eq!(out.features.get("air_time"), Some(&Datum::UInt(0)));
        assert_eq!(out.features.get("mean_gmrt"), Some(&Datum::Float(0.0)));
    }

    #[test]
    fn zero_time_delta_is_undefined_not_infinite() {
        let frame = StrokeFrame::from_columns([
            ("time", vec![0.0, 0.0, 10.0]),
            ("X", vec![0.0, 3.0, 6.0]),
            ("Y", vec![0.0, 4.0, 8.0]),
        ]);
        let out = extract(frame, &names(), 1).unwrap();
        let delta = out.frame.column(TIME_DELTA).unwrap();
        assert!(delta[1].is_nan());
        let speed = out.frame.column(SPEED).unwrap();
        // only row 2 is defined (5 / 10), and it fills the rest
        assert_eq!(speed, &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn feature_keys_are_ordered() {
        let out = extract(session(), &names(), 1).unwrap();
        let keys: Vec<&str> = out.features.iter().map(|(k, _)| k).collect();
        assert_eq!(keys.first(), Some(&"air_time"));
        assert_eq!(keys.last(), Some(&"total_time"));
        assert_eq!(keys.len(), 17);
    }
}
