//! Categorical filtering of records.

use crate::record::Record;

/// Category value that selects every record. Matched case-sensitively.
pub const ALL_CATEGORIES: &str = "All Diet Types";

/// Select the records whose `field` matches `category`, ignoring case.
///
/// [ALL_CATEGORIES] selects every record. Records without the field compare as the empty
/// string, so they never match a non-empty category. Input order is preserved.
///
/// # Arguments
///
/// * `records`: Records to filter
/// * `field`: Name of the categorical field
/// * `category`: Requested category value
pub fn filter<'a>(records: &'a [Record], field: &str, category: &str) -> Vec<&'a Record> {
    if category == ALL_CATEGORIES {
        return records.iter().collect();
    }
    let category = category.to_lowercase();
    records
        .iter()
        .filter(|record| record.category(field).to_lowercase() == category)
        .collect()
}
