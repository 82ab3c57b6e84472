//! Loosely typed value tree used for everything that ends up in a result payload.
//!
//! Estimators and the extractor produce values of mixed provenance: unsigned
//! counts, class labels that may be text, non-finite floats.
//! `Datum` keeps them as they are until [`crate::sanitize`] turns the tree into
//! plain JSON.

#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    List(Vec<Datum>),
    Map(Vec<(String, Datum)>),
}

impl Datum {
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Datum)>) -> Self {
        Datum::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Numeric reading of a scalar. Text is parsed; containers and nulls have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Datum::Int(i) => Some(*i as f64),
            Datum::UInt(u) => Some(*u as f64),
            Datum::Float(f) => Some(*f),
            Datum::Text(s) => s.trim().parse::<f64>().ok(),
            Datum::Null | Datum::List(_) | Datum::Map(_) => None,
        }
    }

    /// Looks up a key of a map; `None` for any other variant.
    pub fn get(&self, key: &str) -> Option<&Datum> {
        match self {
            Datum::Map(entries) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Datum::Float(v)
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int(v)
    }
}

impl From<usize> for Datum {
    fn from(v: usize) -> Self {
        Datum::UInt(v as u64)
    }
}

impl From<bool> for Datum {
    fn from(v: bool) -> Self {
        Datum::Bool(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::Text(v.to_string())
    }
}

impl From<String> for Datum {
    fn from(v: String) -> Self {
        Datum::Text(v)
    }
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    fn from(v: Option<T>) -> Self {
        v.map_or(Datum::Null, Into::into)
    }
}

impl<T: Into<Datum>> From<Vec<T>> for Datum {
    fn from(v: Vec<T>) -> Self {
        Datum::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<&serde_json::Value> for Datum {
    fn from(v: &serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => Datum::Null,
            Value::Bool(b) => Datum::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Datum::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Datum::UInt(u)
                } else {
                    Datum::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Datum::Text(s.clone()),
            Value::Array(items) => Datum::List(items.iter().map(Datum::from).collect()),
            Value::Object(entries) => Datum::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Datum::from(v)))
                    .collect(),
            ),
        }
    }
}
