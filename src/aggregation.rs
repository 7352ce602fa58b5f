//! Statistical aggregations over records.
//!
//! All functions accept any slice of records or record references, so that they can be applied
//! directly to the output of [crate::filter::filter]. Degenerate inputs are not errors: an empty
//! set averages to zero, and fewer than two records or a constant column correlate to zero.

use std::borrow::Borrow;

use hashbrown::HashMap;
use ndarray::{Array1, Array2, ArrayView1};

use crate::models::{CategoryCount, CorrelationMatrix};
use crate::record::Record;

/// Label given to records with an absent or empty category.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Extract a numeric column.
fn column<R: Borrow<Record>>(records: &[R], field: &str) -> Array1<f64> {
    records
        .iter()
        .map(|record| record.borrow().numeric(field))
        .collect()
}

/// Return the mean of a numeric field, rounded to the nearest integer.
///
/// Halves round away from zero. An empty input averages to `0`.
///
/// # Arguments
///
/// * `records`: Records to average over
/// * `field`: Name of the numeric field
pub fn average<R: Borrow<Record>>(records: &[R], field: &str) -> i64 {
    column(records, field)
        .mean()
        .map_or(0, |mean| mean.round() as i64)
}

/// Count records per value of a categorical field.
///
/// Labels are the raw field values; absent or empty values are counted as
/// [UNKNOWN_CATEGORY]. Labels appear in the order they are first seen.
///
/// # Arguments
///
/// * `records`: Records to count
/// * `field`: Name of the categorical field
pub fn distribution<R: Borrow<Record>>(records: &[R], field: &str) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for record in records {
        let label = match record.borrow().category(field) {
            "" => UNKNOWN_CATEGORY,
            label => label,
        };
        let position = *positions.entry(label).or_insert_with(|| {
            counts.push(CategoryCount::new(label, 0));
            counts.len() - 1
        });
        counts[position].value += 1;
    }
    counts
}

/// Return the Pearson correlation coefficient of two numeric fields.
///
/// Uses population (divide by `n`) covariance and variances. The result is rounded to two
/// decimal places and lies in `[-1, 1]`. Fewer than two records, or a constant field, yields
/// `0`.
///
/// # Arguments
///
/// * `records`: Records to correlate over
/// * `a`: Name of the first numeric field
/// * `b`: Name of the second numeric field
pub fn correlation<R: Borrow<Record>>(records: &[R], a: &str, b: &str) -> f64 {
    if records.len() < 2 {
        return 0.0;
    }
    pearson(column(records, a).view(), column(records, b).view())
}

/// Return the correlation matrix of a list of numeric fields.
///
/// The diagonal is exactly `1.0`. Each pair of fields is computed once and mirrored, so the
/// matrix is exactly symmetric.
///
/// # Arguments
///
/// * `records`: Records to correlate over
/// * `fields`: Names of the numeric fields, in matrix order
pub fn correlation_matrix<R: Borrow<Record>>(
    records: &[R],
    fields: &[String],
) -> CorrelationMatrix {
    let columns: Vec<Array1<f64>> = fields.iter().map(|field| column(records, field)).collect();
    let mut values = Array2::<f64>::eye(fields.len());
    for i in 0..columns.len() {
        for j in (i + 1)..columns.len() {
            let r = pearson(columns[i].view(), columns[j].view());
            values[[i, j]] = r;
            values[[j, i]] = r;
        }
    }
    CorrelationMatrix::new(fields.to_vec(), values)
}

fn is_constant(values: &ArrayView1<f64>) -> bool {
    values.iter().all(|value| *value == values[0])
}

/// Round to two decimal places, halves away from zero.
fn round_to_hundredths(value: f64) -> f64 {
    // Adding zero turns -0.0 into 0.0.
    (value * 100.0).round() / 100.0 + 0.0
}

fn pearson(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let len = x.len();
    if len < 2 || len != y.len() || is_constant(&x) || is_constant(&y) {
        return 0.0;
    }
    let n = len as f64;
    let dx = &x - x.sum() / n;
    let dy = &y - y.sum() / n;
    let covariance = dx.dot(&dy) / n;
    let variance_x = dx.dot(&dx) / n;
    let variance_y = dy.dot(&dy) / n;
    if variance_x == 0.0 || variance_y == 0.0 {
        return 0.0;
    }
    let r = covariance / (variance_x.sqrt() * variance_y.sqrt());
    if !r.is_finite() {
        return 0.0;
    }
    round_to_hundredths(r).clamp(-1.0, 1.0)
}
