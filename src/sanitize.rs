use serde_json::{Map, Number, Value};

use crate::value::Datum;

/// Converts a value tree into JSON that survives any serializer: non-finite
/// floats become `null` and unsigned counts become plain JSON numbers.
pub fn sanitize(datum: &Datum) -> Value {
    match datum {
        Datum::Null => Value::Null,
        Datum::Bool(b) => Value::Bool(*b),
        Datum::Int(i) => Value::Number(Number::from(*i)),
        Datum::UInt(u) => Value::Number(Number::from(*u)),
        Datum::Float(f) => finite(*f),
        Datum::Text(s) => Value::String(s.clone()),
        Datum::List(items) => Value::Array(items.iter().map(sanitize).collect()),
        Datum::Map(entries) => {
            let mut out = Map::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(k.clone(), sanitize(v));
            }
            Value::Object(out)
        }
    }
}

fn finite(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}
