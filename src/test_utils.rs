use crate::error::InsightsError;
use crate::record::{Header, Record};
use crate::source::{ObjectReader, RecordSource};

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;

/// Three rows, two of which are Vegan.
pub(crate) const SCENARIO_CSV: &str = "Protein,Carbs,Fat,DietType\n\
                                       10,50,10,Vegan\n\
                                       20,40,20,Vegan\n\
                                       30,30,30,Keto\n";

/// Build records sharing one header.
pub(crate) fn records(fields: &[&str], rows: &[&[&str]]) -> Vec<Record> {
    let header = Arc::new(Header::new(fields.iter().copied()));
    rows.iter()
        .map(|row| Record::new(header.clone(), row.iter().map(|v| v.to_string()).collect()))
        .collect()
}

/// A small diet dataset with mixed-case diet types.
pub(crate) fn diet_records() -> Vec<Record> {
    records(
        &[
            "Recipe_name",
            "DietType",
            "Protein",
            "Carbs",
            "Fat",
            "Cuisine_type",
        ],
        &[
            &["Tofu bowl", "Vegan", "20", "60", "10", "asian"],
            &["Steak salad", "Keto", "45", "10", "35", "american"],
            &["Lentil soup", "vegan", "18", "40", "5", "indian"],
            &["Chickpea curry", "VEGAN", "15", "55", "12", "indian"],
            &["Grilled fish", "Mediterranean", "38", "20", "13", "mediterranean"],
        ],
    )
}

/// The default nutrient fields.
pub(crate) fn nutrient_fields() -> Vec<String> {
    vec!["Protein".into(), "Carbs".into(), "Fat".into()]
}

/// In-memory record source, keyed by container then object.
#[derive(Default)]
pub(crate) struct MemorySource {
    containers: HashMap<String, HashMap<String, Vec<u8>>>,
}

impl MemorySource {
    pub(crate) fn with_object(mut self, container: &str, object: &str, data: &[u8]) -> Self {
        self.containers
            .entry(container.to_string())
            .or_default()
            .insert(object.to_string(), data.to_vec());
        self
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn open(&self, container: &str, object: &str) -> Result<ObjectReader, InsightsError> {
        let objects = self
            .containers
            .get(container)
            .ok_or_else(|| InsightsError::ContainerNotFound {
                container: container.to_string(),
            })?;
        match objects.get(object) {
            Some(data) => Ok(Box::new(Cursor::new(data.clone()))),
            None => Err(InsightsError::ObjectNotFound {
                container: container.to_string(),
                object: object.to_string(),
                available: self.list(container).await?,
            }),
        }
    }

    async fn list(&self, container: &str) -> Result<Vec<String>, InsightsError> {
        let objects = self
            .containers
            .get(container)
            .ok_or_else(|| InsightsError::ContainerNotFound {
                container: container.to_string(),
            })?;
        let mut names: Vec<String> = objects.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
