//! Column-oriented stroke table.
//!
//! Every column holds `f64` cells; `NaN` is an undefined cell. Input columns
//! that are not numbers are kept with all cells undefined so that their names
//! stay visible to the feature binder.

use std::io::Read;
use std::path::Path;

use crate::config::ColumnNames;
use crate::error::InputError;
use crate::stroke::StrokeRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeFrame {
    columns: Vec<Column>,
    len: usize,
}

impl StrokeFrame {
    pub fn new(len: usize) -> Self {
        Self {
            columns: Vec::new(),
            len,
        }
    }

    /// Builds a frame from named columns. Columns shorter than the longest one
    /// are padded with undefined cells.
    pub fn from_columns<S: Into<String>>(columns: impl IntoIterator<Item = (S, Vec<f64>)>) -> Self {
        let columns: Vec<(String, Vec<f64>)> =
            columns.into_iter().map(|(n, v)| (n.into(), v)).collect();
        let len = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let mut frame = Self::new(len);
        for (name, values) in columns {
            frame.set_column(name, values);
        }
        frame
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, InputError> {
        let file = std::fs::File::open(path).map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv_reader(file)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, InputError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let names: Vec<String> = rdr.headers()?.iter().map(clean_header).collect();
        let mut cells: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

        for record in rdr.records() {
            let record = record?;
            for (i, column) in cells.iter_mut().enumerate() {
                column.push(record.get(i).map_or(f64::NAN, parse_cell));
            }
        }

        Ok(Self::from_columns(names.into_iter().zip(cells)))
    }

    /// Lays stroke records out in the fixed five-column schema.
    pub fn from_records(records: &[StrokeRecord], names: &ColumnNames) -> Self {
        let pick = |f: fn(&StrokeRecord) -> Option<f64>| -> Vec<f64> {
            records.iter().map(|r| f(r).unwrap_or(f64::NAN)).collect()
        };
        let mut frame = Self::new(records.len());
        frame.set_column(names.time.clone(), pick(|r| r.time));
        frame.set_column(names.x.clone(), pick(|r| r.x));
        frame.set_column(names.y.clone(), pick(|r| r.y));
        frame.set_column(names.pressure.clone(), pick(|r| r.pressure));
        frame.set_column(names.contact.clone(), pick(|r| r.contact));
        frame
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Cell of `name` in the first row, if both exist.
    pub fn first_value(&self, name: &str) -> Option<f64> {
        self.column(name).and_then(|values| values.first().copied())
    }

    /// Adds a column or replaces an existing one with the same name.
    pub fn set_column(&mut self, name: impl Into<String>, mut values: Vec<f64>) {
        let name = name.into();
        values.resize(self.len, f64::NAN);
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
    }
}

fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').replace('"', "").trim().to_string()
}

fn parse_cell(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}
