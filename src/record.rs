//! Records decoded from a delimited text dataset.
//!
//! A [Record] is an ordered mapping from field name to the raw string value found in the input.
//! All records decoded from one input share a single reference-counted [Header]. Numeric fields
//! are parsed on demand with [coerce_numeric].

use std::sync::Arc;

use hashbrown::HashMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Field names of a dataset, in input order.
#[derive(Debug, Default, PartialEq)]
pub struct Header {
    /// Field names in the order they appear in the header row.
    names: Vec<String>,
    /// Position of each field name in `names`.
    index: HashMap<String, usize>,
}

impl Header {
    /// Return a new Header.
    ///
    /// When a name is repeated, lookups resolve to its last occurrence.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(position, name)| (name.clone(), position))
            .collect();
        Self { names, index }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the header has no fields.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Field names in input order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Position of a field, if present.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.index.get(field).copied()
    }
}

/// One decoded data row.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    header: Arc<Header>,
    values: Box<[String]>,
}

impl Record {
    /// Return a new Record.
    ///
    /// The caller guarantees that `values` has one entry per header field.
    pub(crate) fn new(header: Arc<Header>, values: Vec<String>) -> Self {
        debug_assert_eq!(header.len(), values.len());
        Self {
            header,
            values: values.into_boxed_slice(),
        }
    }

    /// Raw value of a field, or `None` if the dataset has no such field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.header
            .position(field)
            .and_then(|position| self.values.get(position))
            .map(String::as_str)
    }

    /// Value of a field coerced to a number. See [coerce_numeric].
    pub fn numeric(&self, field: &str) -> f64 {
        coerce_numeric(self.get(field))
    }

    /// Value of a categorical field, with absent fields read as the empty string.
    pub fn category(&self, field: &str) -> &str {
        self.get(field).unwrap_or_default()
    }

    /// Iterate over `(field, value)` pairs in header order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.header
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    /// Header shared by this record.
    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }
}

impl Serialize for Record {
    /// Serialise as a map, in header order.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.fields() {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

/// Coerce a raw field value into a number.
///
/// Absent, empty, non-numeric and non-finite values all coerce to `0`. Surrounding whitespace is
/// ignored. The whole value must parse as a number: there is no prefix parsing, so a value with a
/// trailing unit such as `12g` is not numeric and coerces to `0`, not `12`.
pub fn coerce_numeric(value: Option<&str>) -> f64 {
    let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return 0.0;
    };
    match raw.parse::<f64>() {
        Ok(number) if number.is_finite() => number,
        _ => {
            tracing::trace!(value = raw, "FieldCoercionWarning: non-numeric value read as 0");
            0.0
        }
    }
}

/// The retained, possibly truncated, records from one decode pass.
#[derive(Debug, Default)]
pub struct Dataset {
    /// Header shared by all records.
    pub header: Arc<Header>,
    /// Retained records in input order.
    pub records: Vec<Record>,
    /// Number of valid rows seen before decoding stopped.
    pub processed: usize,
    /// Number of rows dropped for a field count mismatch or for being blank.
    pub skipped: usize,
    /// Whether decoding stopped at the row limit rather than at the end of input.
    pub truncated: bool,
}

impl Dataset {
    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records were retained.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
