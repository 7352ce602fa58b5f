//! Request and response data types.

use std::iter::once;
use std::time::Instant;

use ndarray::Array2;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use validator::Validate;

use crate::filter::ALL_CATEGORIES;
use crate::record::{Dataset, Record};

/// Query parameters accepted by the insight endpoints.
#[derive(Debug, Default, Deserialize, PartialEq, Validate)]
pub struct InsightsQuery {
    /// Diet type to filter on
    #[serde(rename = "dietType")]
    pub diet_type: Option<String>,
    /// Maximum number of dataset rows to read
    #[validate(range(min = 1, message = "limit must be greater than 0"))]
    pub limit: Option<usize>,
}

impl InsightsQuery {
    /// Requested category, defaulting to every diet type.
    pub fn category(&self) -> &str {
        self.diet_type
            .as_deref()
            .filter(|diet_type| !diet_type.is_empty())
            .unwrap_or(ALL_CATEGORIES)
    }
}

/// Average of one nutrient.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct NutrientAverage {
    pub nutrient: String,
    pub value: i64,
}

impl NutrientAverage {
    pub fn new(nutrient: &str, value: i64) -> Self {
        Self {
            nutrient: nutrient.to_string(),
            value,
        }
    }
}

/// Number of records in one category.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub value: u64,
}

impl CategoryCount {
    pub fn new(name: &str, value: u64) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// Square, symmetric matrix of correlation coefficients between numeric fields.
///
/// Serialises as a labelled table: a header row of field names preceded by an empty cell,
/// followed by one row per field starting with the field name.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationMatrix {
    fields: Vec<String>,
    values: Array2<f64>,
}

impl CorrelationMatrix {
    /// Return a new CorrelationMatrix. `values` must be `fields.len()` square.
    pub fn new(fields: Vec<String>, values: Array2<f64>) -> Self {
        debug_assert_eq!((fields.len(), fields.len()), values.dim());
        Self { fields, values }
    }

    /// Field names, in matrix order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Coefficients, indexed in field order.
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Coefficient between two fields, if both are present.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.fields.iter().position(|field| field == a)?;
        let j = self.fields.iter().position(|field| field == b)?;
        Some(self.values[[i, j]])
    }
}

/// One cell of a labelled table.
#[derive(Serialize)]
#[serde(untagged)]
enum Cell<'a> {
    Label(&'a str),
    Value(f64),
}

impl Serialize for CorrelationMatrix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut table = serializer.serialize_seq(Some(self.fields.len() + 1))?;
        let header: Vec<Cell> = once(Cell::Label(""))
            .chain(self.fields.iter().map(|field| Cell::Label(field)))
            .collect();
        table.serialize_element(&header)?;
        for (field, row) in self.fields.iter().zip(self.values.rows()) {
            let row: Vec<Cell> = once(Cell::Label(field))
                .chain(row.iter().map(|value| Cell::Value(*value)))
                .collect();
            table.serialize_element(&row)?;
        }
        table.end()
    }
}

/// All three views of a dataset.
#[derive(Debug, Serialize)]
pub struct Insights {
    /// Average of each nutrient over the selected diet type
    pub averages: Vec<NutrientAverage>,
    /// Record count per diet type over the whole dataset
    pub distribution: Vec<CategoryCount>,
    /// Nutrient correlation matrix over the selected diet type
    pub correlation: CorrelationMatrix,
}

/// Metadata accompanying a single view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewMetadata {
    /// Diet type the view was filtered on
    pub diet_type: String,
    /// Time taken to build the view, in milliseconds
    pub execution_time: u64,
    /// Time the view was built (RFC 3339)
    pub timestamp: String,
}

impl ViewMetadata {
    /// Return metadata for a view whose computation began at `started`.
    pub fn new(diet_type: &str, started: Instant) -> Self {
        let execution_time = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            diet_type: diet_type.to_string(),
            execution_time,
            timestamp,
        }
    }
}

/// Response containing a single view and its metadata.
#[derive(Debug, Serialize)]
pub struct ViewResponse<T> {
    pub data: T,
    pub metadata: ViewMetadata,
}

/// Response containing raw dataset rows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowsResponse {
    /// Object the rows were read from
    pub blob: String,
    /// Container holding the object
    pub container: String,
    /// Number of rows returned
    pub returned_rows: usize,
    /// Number of valid rows read before decoding stopped
    pub processed_rows: usize,
    /// Number of malformed or blank rows skipped
    pub skipped_rows: usize,
    /// Whether decoding stopped at the row limit
    pub truncated: bool,
    /// The rows, as field name to value maps
    pub rows: Vec<Record>,
}

impl RowsResponse {
    pub fn new(container: &str, blob: &str, dataset: Dataset) -> Self {
        Self {
            blob: blob.to_string(),
            container: container.to_string(),
            returned_rows: dataset.len(),
            processed_rows: dataset.processed,
            skipped_rows: dataset.skipped,
            truncated: dataset.truncated,
            rows: dataset.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder;
    use serde_json::json;
    use serde_test::{assert_de_tokens, Token};

    #[test]
    fn test_query_empty() {
        let query = InsightsQuery::default();
        assert_de_tokens(
            &query,
            &[
                Token::Struct {
                    name: "InsightsQuery",
                    len: 0,
                },
                Token::StructEnd,
            ],
        );
        query.validate().unwrap();
        assert_eq!(ALL_CATEGORIES, query.category());
    }

    #[test]
    fn test_query_all_fields() {
        let query = InsightsQuery {
            diet_type: Some("Vegan".to_string()),
            limit: Some(10),
        };
        assert_de_tokens(
            &query,
            &[
                Token::Struct {
                    name: "InsightsQuery",
                    len: 2,
                },
                Token::Str("dietType"),
                Token::Some,
                Token::Str("Vegan"),
                Token::Str("limit"),
                Token::Some,
                Token::U64(10),
                Token::StructEnd,
            ],
        );
        query.validate().unwrap();
        assert_eq!("Vegan", query.category());
    }

    #[test]
    fn test_query_empty_diet_type() {
        let query = InsightsQuery {
            diet_type: Some("".to_string()),
            limit: None,
        };
        assert_eq!(ALL_CATEGORIES, query.category());
    }

    #[test]
    #[should_panic(expected = "limit must be greater than 0")]
    fn test_query_zero_limit() {
        let query = InsightsQuery {
            diet_type: None,
            limit: Some(0),
        };
        query.validate().unwrap()
    }

    #[test]
    fn test_json_nutrient_average() {
        let average = NutrientAverage::new("Protein", 15);
        assert_eq!(
            json!({"nutrient": "Protein", "value": 15}),
            serde_json::to_value(average).unwrap()
        );
    }

    #[test]
    fn test_json_category_count() {
        let count = CategoryCount::new("Vegan", 2);
        assert_eq!(
            json!({"name": "Vegan", "value": 2}),
            serde_json::to_value(count).unwrap()
        );
    }

    #[test]
    fn test_json_correlation_matrix() {
        let fields = vec!["Protein".to_string(), "Carbs".to_string()];
        let values = ndarray::arr2(&[[1.0, -0.5], [-0.5, 1.0]]);
        let matrix = CorrelationMatrix::new(fields, values);
        assert_eq!(
            json!([
                ["", "Protein", "Carbs"],
                ["Protein", 1.0, -0.5],
                ["Carbs", -0.5, 1.0],
            ]),
            serde_json::to_value(&matrix).unwrap()
        );
        assert_eq!(Some(-0.5), matrix.get("Carbs", "Protein"));
        assert_eq!(None, matrix.get("Carbs", "Fat"));
    }

    #[test]
    fn test_json_view_response() {
        let response = ViewResponse {
            data: vec![CategoryCount::new("Keto", 1)],
            metadata: ViewMetadata::new("Keto", Instant::now()),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(json!([{"name": "Keto", "value": 1}]), value["data"]);
        assert_eq!(json!("Keto"), value["metadata"]["dietType"]);
        assert!(value["metadata"]["executionTime"].is_u64());
        let timestamp = value["metadata"]["timestamp"].as_str().unwrap();
        assert!(OffsetDateTime::parse(timestamp, &Rfc3339).is_ok(), "{timestamp}");
    }

    #[test]
    fn test_json_rows_response() {
        let dataset = decoder::decode("a,b\n1,2\n3,4\n".as_bytes(), 1).unwrap();
        let response = RowsResponse::new("datasets", "diets.csv", dataset);
        assert_eq!(
            json!({
                "blob": "diets.csv",
                "container": "datasets",
                "returnedRows": 1,
                "processedRows": 1,
                "skippedRows": 0,
                "truncated": true,
                "rows": [{"a": "1", "b": "2"}],
            }),
            serde_json::to_value(&response).unwrap()
        );
    }
}
