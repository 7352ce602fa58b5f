use crate::cli::{CommandLineArgs, SourceKind};
use crate::pipeline::Pipeline;
use crate::resource_manager::ResourceManager;
use crate::s3_client::{S3Client, S3Credentials};
use crate::source::{FsRecordSource, RecordSource};

use std::sync::Arc;

use expanduser::expanduser;

/// Shared application state passed to each request handler.
pub struct AppState {
    /// Dataset pipeline.
    pub pipeline: Pipeline,
}

impl AppState {
    /// Create and return an [AppState].
    pub fn new(args: &CommandLineArgs) -> std::io::Result<Self> {
        let task_limit = args
            .task_limit
            .or_else(|| Some(num_cpus::get().saturating_sub(1).max(1)));
        let resource_manager = ResourceManager::new(args.connection_limit, task_limit);
        let source: Arc<dyn RecordSource> = match args.source {
            SourceKind::S3 => {
                let credentials = match (&args.s3_access_key, &args.s3_secret_key) {
                    (Some(access_key), Some(secret_key)) => {
                        S3Credentials::access_key(access_key, secret_key)
                    }
                    _ => S3Credentials::None,
                };
                Arc::new(S3Client::new(&args.s3_url, credentials, &args.s3_region))
            }
            SourceKind::Fs => Arc::new(FsRecordSource::new(expanduser(&args.data_dir)?)),
        };
        Ok(Self::with_source(args, source, resource_manager))
    }

    /// Create and return an [AppState] reading from an existing record source.
    pub fn with_source(
        args: &CommandLineArgs,
        source: Arc<dyn RecordSource>,
        resource_manager: ResourceManager,
    ) -> Self {
        Self {
            pipeline: Pipeline::new(args.pipeline_config(), source, resource_manager),
        }
    }
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;
