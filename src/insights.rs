//! Assembly of the nutritional views from filtered records.

use crate::aggregation;
use crate::filter::filter;
use crate::models::{CategoryCount, CorrelationMatrix, Insights, NutrientAverage};
use crate::record::{Dataset, Record};

/// Names of the fields the views are built from.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetSchema {
    /// Categorical field used for filtering and distribution
    pub category_field: String,
    /// Numeric fields averaged and correlated, in output order
    pub nutrient_fields: Vec<String>,
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self {
            category_field: "DietType".to_string(),
            nutrient_fields: vec!["Protein".into(), "Carbs".into(), "Fat".into()],
        }
    }
}

/// Average of each nutrient over the records of one category.
pub fn nutrient_averages(
    records: &[Record],
    category: &str,
    schema: &DatasetSchema,
) -> Vec<NutrientAverage> {
    let selected = filter(records, &schema.category_field, category);
    averages_of(&selected, schema)
}

fn averages_of(selected: &[&Record], schema: &DatasetSchema) -> Vec<NutrientAverage> {
    schema
        .nutrient_fields
        .iter()
        .map(|nutrient| NutrientAverage::new(nutrient, aggregation::average(selected, nutrient)))
        .collect()
}

/// Record count per category value, over the records of one category.
pub fn diet_distribution(
    records: &[Record],
    category: &str,
    schema: &DatasetSchema,
) -> Vec<CategoryCount> {
    let selected = filter(records, &schema.category_field, category);
    aggregation::distribution(&selected, &schema.category_field)
}

/// Nutrient correlation matrix over the records of one category.
pub fn nutrient_correlations(
    records: &[Record],
    category: &str,
    schema: &DatasetSchema,
) -> CorrelationMatrix {
    let selected = filter(records, &schema.category_field, category);
    correlations_of(&selected, schema)
}

fn correlations_of(selected: &[&Record], schema: &DatasetSchema) -> CorrelationMatrix {
    aggregation::correlation_matrix(selected, &schema.nutrient_fields)
}

/// Build all three views of a dataset.
///
/// Averages and correlations cover the requested category only. The distribution always covers
/// the whole dataset, so that the selected category can be seen in proportion to the others.
pub fn build_insights(dataset: &Dataset, category: &str, schema: &DatasetSchema) -> Insights {
    let selected = filter(&dataset.records, &schema.category_field, category);
    Insights {
        averages: averages_of(&selected, schema),
        distribution: aggregation::distribution(&dataset.records, &schema.category_field),
        correlation: correlations_of(&selected, schema),
    }
}
