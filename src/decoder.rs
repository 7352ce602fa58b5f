//! Bounded CSV decoding.
//!
//! The decoder pulls rows from a [Read] one at a time and stops as soon as the row limit has
//! been reached, dropping the underlying reader at that point. Inputs much larger than the limit,
//! or unbounded ones, are never buffered in full.

use std::io::Read;
use std::sync::Arc;

use thiserror::Error;

use crate::record::{Dataset, Header, Record};

/// Upper bound on the records preallocated for one decode pass.
const PREALLOCATE_MAX: usize = 4096;

/// Malformed CSV framing.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The reader produced data that is not valid CSV text, e.g. invalid UTF-8.
    #[error("malformed CSV input at line {line} (byte {byte})")]
    Malformed {
        line: u64,
        byte: u64,
        #[source]
        source: csv::Error,
    },

    /// The underlying reader failed part way through the input.
    #[error("failed to read CSV input at line {line} (byte {byte})")]
    Read {
        line: u64,
        byte: u64,
        #[source]
        source: csv::Error,
    },

    /// The input ended inside a quoted field. The position is that of the opening quote.
    #[error("unterminated quoted field starting at line {line} (byte {byte})")]
    UnterminatedQuote { line: u64, byte: u64 },
}

impl ParseError {
    /// Build a ParseError from a csv error, using `fallback` when the error carries no position.
    fn from_csv(source: csv::Error, fallback: &csv::Position) -> Self {
        let position = source.position().unwrap_or(fallback);
        let (line, byte) = (position.line(), position.byte());
        if source.is_io_error() {
            Self::Read { line, byte, source }
        } else {
            Self::Malformed { line, byte, source }
        }
    }
}

/// A decode pass that failed part way through.
///
/// Records decoded before the failure are kept in `partial`; whether they are usable is up to
/// the caller.
#[derive(Debug)]
pub struct PartialDecode {
    pub partial: Dataset,
    pub error: ParseError,
}

/// Position of a byte within CSV framing.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Framing {
    /// At the start of a field, where a quote opens a quoted field.
    FieldStart,
    /// Inside an unquoted field, where quotes are literal.
    Unquoted,
    /// Inside a quoted field.
    Quoted,
    /// After a quote inside a quoted field: either a closing quote or the first half of `""`.
    QuoteInQuoted,
}

/// [Read] adapter that follows quoted-field framing on the bytes passing through.
///
/// A quote opens a quoted field only at the start of a field, and `""` inside a quoted field is
/// an escaped quote. Elsewhere a quote is an ordinary character.
struct QuoteTracker<R> {
    inner: R,
    state: Framing,
    line: u64,
    byte: u64,
    /// Line and byte offset of the quote that opened the current quoted field.
    opened_at: (u64, u64),
}

impl<R> QuoteTracker<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            state: Framing::FieldStart,
            line: 1,
            byte: 0,
            opened_at: (1, 0),
        }
    }

    fn advance(&mut self, byte: u8) {
        self.state = match (self.state, byte) {
            (Framing::FieldStart, b'"') => {
                self.opened_at = (self.line, self.byte);
                Framing::Quoted
            }
            (Framing::Quoted, b'"') => Framing::QuoteInQuoted,
            (Framing::Quoted, _) => Framing::Quoted,
            (Framing::QuoteInQuoted, b'"') => Framing::Quoted,
            (_, b',' | b'\n' | b'\r') => Framing::FieldStart,
            _ => Framing::Unquoted,
        };
        if byte == b'\n' {
            self.line += 1;
        }
        self.byte += 1;
    }

    /// Line and byte offset of the opening quote, if the input so far ends inside a quoted field.
    fn unterminated(&self) -> Option<(u64, u64)> {
        (self.state == Framing::Quoted).then_some(self.opened_at)
    }
}

impl<R: Read> Read for QuoteTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        for byte in &buf[..n] {
            self.advance(*byte);
        }
        Ok(n)
    }
}

/// Lazy, bounded sequence of records read from CSV text.
///
/// The first line of the input is the header. Rows whose field count differs from the header,
/// and rows whose fields are all blank, are skipped without counting towards the limit. Once
/// `limit` records have been produced the reader is released, before the caller asks for more.
pub struct RecordReader<R: Read> {
    /// Source of CSV text. `None` once released.
    reader: Option<csv::Reader<QuoteTracker<R>>>,
    header: Arc<Header>,
    limit: usize,
    row: csv::StringRecord,
    processed: usize,
    skipped: usize,
    truncated: bool,
}

impl<R: Read> RecordReader<R> {
    /// Read the header row and return a new RecordReader.
    ///
    /// # Arguments
    ///
    /// * `source`: Reader yielding UTF-8 CSV text
    /// * `limit`: Maximum number of records to produce
    pub fn new(source: R, limit: usize) -> Result<Self, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(QuoteTracker::new(source));
        let header = reader.headers().map(|names| Header::new(names.iter()));
        let header = match header {
            Ok(header) => header,
            Err(error) => {
                let fallback = reader.position().clone();
                return Err(ParseError::from_csv(error, &fallback));
            }
        };
        Ok(Self {
            reader: Some(reader),
            header: Arc::new(header),
            limit,
            row: csv::StringRecord::new(),
            processed: 0,
            skipped: 0,
            truncated: false,
        })
    }

    /// Header shared by the records.
    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    /// Number of records produced so far.
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Number of rows skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Whether the row limit has been reached.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Whether the underlying reader has been released.
    pub fn is_released(&self) -> bool {
        self.reader.is_none()
    }

    /// Drop the underlying reader, closing the source.
    fn release(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!(
                processed = self.processed,
                skipped = self.skipped,
                truncated = self.truncated,
                "released record source"
            );
        }
    }

    /// Finish decoding, combining the reader's counters with the collected records.
    pub fn into_dataset(mut self, records: Vec<Record>) -> Dataset {
        self.release();
        Dataset {
            header: self.header.clone(),
            records,
            processed: self.processed,
            skipped: self.skipped,
            truncated: self.truncated,
        }
    }
}

/// Whether every field of a row is empty or whitespace.
fn is_blank(row: &csv::StringRecord) -> bool {
    row.iter().all(|field| field.trim().is_empty())
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;
            if self.processed >= self.limit {
                self.truncated = true;
                self.release();
                return None;
            }
            match reader.read_record(&mut self.row) {
                Ok(true) => {
                    if self.row.len() != self.header.len() || is_blank(&self.row) {
                        self.skipped += 1;
                        continue;
                    }
                    self.processed += 1;
                    let values = self.row.iter().map(str::to_owned).collect();
                    let record = Record::new(self.header.clone(), values);
                    if self.processed >= self.limit {
                        self.truncated = true;
                        self.release();
                    }
                    return Some(Ok(record));
                }
                Ok(false) => {
                    let unterminated = reader.get_ref().unterminated();
                    self.release();
                    if let Some((line, byte)) = unterminated {
                        return Some(Err(ParseError::UnterminatedQuote { line, byte }));
                    }
                    return None;
                }
                Err(error) => {
                    let position = reader.position().clone();
                    self.release();
                    return Some(Err(ParseError::from_csv(error, &position)));
                }
            }
        }
    }
}

/// Decode up to `limit` records from CSV text.
///
/// The source is dropped on every exit path: at the row limit, at the end of input, and on
/// failure.
///
/// # Arguments
///
/// * `source`: Reader yielding UTF-8 CSV text with a header row
/// * `limit`: Maximum number of records to retain
pub fn decode<R: Read>(source: R, limit: usize) -> Result<Dataset, PartialDecode> {
    let mut reader = RecordReader::new(source, limit).map_err(|error| PartialDecode {
        partial: Dataset::default(),
        error,
    })?;
    let mut records = Vec::with_capacity(limit.min(PREALLOCATE_MAX));
    for result in reader.by_ref() {
        match result {
            Ok(record) => records.push(record),
            Err(error) => {
                return Err(PartialDecode {
                    partial: reader.into_dataset(records),
                    error,
                })
            }
        }
    }
    Ok(reader.into_dataset(records))
}
