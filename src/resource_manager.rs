//! Resource management

use crate::error::InsightsError;

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// [crate::resource_manager::ResourceManager] provides a simple way to allocate various resources
/// to requests. Resource management is performed using a Tokio Semaphore for each type of resource.
///
/// Permits are owned so that they can travel with a dataset stream onto a blocking decode task.
#[derive(Debug, Default)]
pub struct ResourceManager {
    /// Optional semaphore for record source connections.
    source_connections: Option<Arc<Semaphore>>,

    /// Optional semaphore for decode tasks.
    tasks: Option<Arc<Semaphore>>,
}

impl ResourceManager {
    /// Returns a new ResourceManager object.
    pub fn new(source_connection_limit: Option<usize>, task_limit: Option<usize>) -> Self {
        Self {
            source_connections: source_connection_limit.map(|n| Arc::new(Semaphore::new(n))),
            tasks: task_limit.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// Acquire a record source connection resource.
    pub async fn source_connection(&self) -> Result<Option<OwnedSemaphorePermit>, InsightsError> {
        optional_acquire(&self.source_connections).await
    }

    /// Acquire a decode task resource.
    pub async fn task(&self) -> Result<Option<OwnedSemaphorePermit>, InsightsError> {
        optional_acquire(&self.tasks).await
    }
}

/// Acquire a permit on an optional Semaphore, if present.
async fn optional_acquire(
    sem: &Option<Arc<Semaphore>>,
) -> Result<Option<OwnedSemaphorePermit>, InsightsError> {
    match sem {
        Some(sem) => Ok(Some(sem.clone().acquire_owned().await?)),
        None => Ok(None),
    }
}
