//! Dataset pipeline: fetch an object from a record source, decode it and build views.

use crate::decoder::{self, PartialDecode};
use crate::error::InsightsError;
use crate::insights::{self, DatasetSchema};
use crate::metrics;
use crate::models::{CategoryCount, CorrelationMatrix, Insights, NutrientAverage};
use crate::record::Dataset;
use crate::resource_manager::ResourceManager;
use crate::source::RecordSource;

use std::sync::Arc;

/// Location and shape of the dataset served by a [Pipeline].
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Container holding the dataset
    pub container: String,
    /// Name of the dataset object
    pub object: String,
    /// Row limit used when a request does not give one
    pub default_limit: usize,
    /// Largest row limit a request may ask for
    pub max_limit: usize,
    /// Fields the views are built from
    pub schema: DatasetSchema,
}

impl PipelineConfig {
    /// Resolve the row limit for a request.
    pub fn resolve_limit(&self, limit: Option<usize>) -> Result<usize, InsightsError> {
        match limit {
            None => Ok(self.default_limit),
            Some(requested) if requested > self.max_limit => Err(InsightsError::LimitExceeded {
                requested,
                max: self.max_limit,
            }),
            Some(requested) => Ok(requested),
        }
    }
}

/// Decodes the configured dataset on demand and builds views from it.
///
/// Each call reads its own copy of the dataset; nothing is cached between requests.
pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn RecordSource>,
    resource_manager: ResourceManager,
}

impl Pipeline {
    /// Return a new Pipeline.
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn RecordSource>,
        resource_manager: ResourceManager,
    ) -> Self {
        Self {
            config,
            source,
            resource_manager,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Read up to `limit` records of the dataset.
    ///
    /// The object stream is decoded on a blocking task, which owns the stream and the resource
    /// permits until decoding stops.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn dataset(&self, limit: Option<usize>) -> Result<Dataset, InsightsError> {
        let limit = self.config.resolve_limit(limit)?;
        let task_permit = self.resource_manager.task().await?;
        let connection_permit = self.resource_manager.source_connection().await?;
        let reader = self
            .source
            .open(&self.config.container, &self.config.object)
            .await?;
        let result = tokio::task::spawn_blocking(move || {
            let result = decoder::decode(reader, limit);
            drop(connection_permit);
            drop(task_permit);
            result
        })
        .await?;
        match result {
            Ok(dataset) => {
                metrics::record_decode_metrics(&dataset);
                tracing::info!(
                    container = %self.config.container,
                    object = %self.config.object,
                    rows = dataset.len(),
                    skipped = dataset.skipped,
                    truncated = dataset.truncated,
                    "decoded dataset"
                );
                Ok(dataset)
            }
            Err(PartialDecode { partial, error }) => {
                tracing::warn!(
                    container = %self.config.container,
                    object = %self.config.object,
                    rows = partial.len(),
                    "discarding partially decoded dataset: {}",
                    error
                );
                Err(error.into())
            }
        }
    }

    /// Build all three views over the records of one category.
    pub async fn build_insights(
        &self,
        category: &str,
        limit: Option<usize>,
    ) -> Result<Insights, InsightsError> {
        let dataset = self.dataset(limit).await?;
        Ok(insights::build_insights(
            &dataset,
            category,
            &self.config.schema,
        ))
    }

    pub async fn nutrient_averages(
        &self,
        category: &str,
        limit: Option<usize>,
    ) -> Result<Vec<NutrientAverage>, InsightsError> {
        let dataset = self.dataset(limit).await?;
        Ok(insights::nutrient_averages(
            &dataset.records,
            category,
            &self.config.schema,
        ))
    }

    pub async fn diet_distribution(
        &self,
        category: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CategoryCount>, InsightsError> {
        let dataset = self.dataset(limit).await?;
        Ok(insights::diet_distribution(
            &dataset.records,
            category,
            &self.config.schema,
        ))
    }

    pub async fn nutrient_correlations(
        &self,
        category: &str,
        limit: Option<usize>,
    ) -> Result<CorrelationMatrix, InsightsError> {
        let dataset = self.dataset(limit).await?;
        Ok(insights::nutrient_correlations(
            &dataset.records,
            category,
            &self.config.schema,
        ))
    }
}
