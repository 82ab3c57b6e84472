use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

use crate::frame::StrokeFrame;

/// One captured pen instant as delivered by an upload client.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StrokeRecord {
    pub time: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub pressure: Option<f64>,
    /// 1 when the pen touches the surface, 0 when it hovers.
    pub contact: Option<f64>,
}

impl StrokeRecord {
    pub fn new(time: f64, x: f64, y: f64, pressure: f64, contact: f64) -> Self {
        Self {
            time: Some(time),
            x: Some(x),
            y: Some(y),
            pressure: Some(pressure),
            contact: Some(contact),
        }
    }
}

impl From<(f64, f64, f64, f64, f64)> for StrokeRecord {
    fn from(v: (f64, f64, f64, f64, f64)) -> Self {
        StrokeRecord::new(v.0, v.1, v.2, v.3, v.4)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireRecord {
    Tuple(
        Option<Number>,
        Option<Number>,
        Option<Number>,
        Option<Number>,
        Option<Number>,
    ),
    Object {
        #[serde(alias = "t", alias = "time")]
        timestamp_ms: Option<Number>,
        x: Option<Number>,
        y: Option<Number>,
        #[serde(alias = "pressure_normal")]
        pressure: Option<Number>,
        #[serde(alias = "contact")]
        button: Option<Number>,
    },
}

/// Accepts numbers, booleans and numeric strings.
struct Number(f64);

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(f64),
            Flag(bool),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Num(v) => Ok(Number(v)),
            Raw::Flag(b) => Ok(Number(if b { 1.0 } else { 0.0 })),
            Raw::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Number)
                .map_err(serde::de::Error::custom),
        }
    }
}

impl From<WireRecord> for StrokeRecord {
    fn from(w: WireRecord) -> Self {
        let n = |v: Option<Number>| v.map(|n| n.0);
        match w {
            WireRecord::Tuple(t, x, y, p, b) | WireRecord::Object {
                timestamp_ms: t,
                x,
                y,
                pressure: p,
                button: b,
            } => StrokeRecord {
                time: n(t),
                x: n(x),
                y: n(y),
                pressure: n(p),
                contact: n(b),
            },
        }
    }
}

/// Parses a JSON array of records. Entries that are neither a five-element
/// array nor a record object are skipped.
pub fn parse_records(json: &str) -> Result<Vec<StrokeRecord>, serde_json::Error> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let total = raw.len();
    let records: Vec<StrokeRecord> = raw
        .into_iter()
        .filter_map(|v| serde_json::from_value::<WireRecord>(v).ok())
        .map(StrokeRecord::from)
        .collect();
    if records.len() < total {
        tracing::debug!(skipped = total - records.len(), "skipped malformed stroke records");
    }
    Ok(records)
}

/// Where an analysis reads its stroke table from.
#[derive(Debug, Clone)]
pub enum StrokeSource {
    Csv(PathBuf),
    Records(Vec<StrokeRecord>),
    Frame(StrokeFrame),
}

impl From<Vec<StrokeRecord>> for StrokeSource {
    fn from(records: Vec<StrokeRecord>) -> Self {
        StrokeSource::Records(records)
    }
}

impl From<StrokeFrame> for StrokeSource {
    fn from(frame: StrokeFrame) -> Self {
        StrokeSource::Frame(frame)
    }
}
