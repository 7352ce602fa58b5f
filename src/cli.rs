//! Command Line Interface (CLI) arguments.

use crate::insights::DatasetSchema;
use crate::pipeline::PipelineConfig;

use clap::{Parser, ValueEnum};
use url::Url;

/// Where datasets are read from.
#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
pub enum SourceKind {
    /// S3-compatible object storage
    S3,
    /// Subdirectories of a local directory
    Fs,
}

/// Diet insights command line interface
#[derive(Clone, Debug, Parser)]
#[command(version, about)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "DIET_INSIGHTS_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 8080, env = "DIET_INSIGHTS_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "DIET_INSIGHTS_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/diet-insights/certs/cert.pem",
        env = "DIET_INSIGHTS_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/diet-insights/certs/key.pem",
        env = "DIET_INSIGHTS_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for requests to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "DIET_INSIGHTS_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Whether to enable sending traces to Jaeger.
    #[arg(long, default_value_t = false, env = "DIET_INSIGHTS_ENABLE_JAEGER")]
    pub enable_jaeger: bool,
    /// Record source holding the dataset
    #[arg(long, value_enum, default_value_t = SourceKind::S3, env = "DIET_INSIGHTS_SOURCE")]
    pub source: SourceKind,
    /// Object storage API URL
    #[arg(long, default_value = "http://localhost:9000", env = "DIET_INSIGHTS_S3_URL")]
    pub s3_url: Url,
    /// Object storage access key. Requests are unsigned when absent.
    #[arg(long, env = "DIET_INSIGHTS_S3_ACCESS_KEY")]
    pub s3_access_key: Option<String>,
    /// Object storage secret key
    #[arg(long, env = "DIET_INSIGHTS_S3_SECRET_KEY", hide_env_values = true)]
    pub s3_secret_key: Option<String>,
    /// Object storage region
    #[arg(long, default_value = "us-east-1", env = "DIET_INSIGHTS_S3_REGION")]
    pub s3_region: String,
    /// Root directory of the local record source
    #[arg(long, default_value = "./data", env = "DIET_INSIGHTS_DATA_DIR")]
    pub data_dir: String,
    /// Container (bucket or directory) holding the dataset
    #[arg(long, default_value = "datasets", env = "DIETS_CONTAINER")]
    pub container: String,
    /// Name of the dataset object
    #[arg(long, default_value = "All_Diets_clean.csv", env = "DIETS_BLOB")]
    pub object: String,
    /// Number of dataset rows read when a request gives no limit
    #[arg(long, default_value_t = 500, env = "DIET_INSIGHTS_DEFAULT_ROW_LIMIT")]
    pub default_row_limit: usize,
    /// Largest row limit a request may ask for
    #[arg(long, default_value_t = 100_000, env = "DIET_INSIGHTS_MAX_ROW_LIMIT")]
    pub max_row_limit: usize,
    /// Categorical field used for filtering and distribution
    #[arg(long, default_value = "DietType", env = "DIET_INSIGHTS_CATEGORY_FIELD")]
    pub category_field: String,
    /// Comma-separated numeric fields to average and correlate
    #[arg(
        long,
        default_value = "Protein,Carbs,Fat",
        value_delimiter = ',',
        env = "DIET_INSIGHTS_NUTRIENTS"
    )]
    pub nutrients: Vec<String>,
    /// Maximum number of simultaneous record source connections
    #[arg(long, env = "DIET_INSIGHTS_CONNECTION_LIMIT")]
    pub connection_limit: Option<usize>,
    /// Maximum number of simultaneous decode tasks. Defaults to the number of CPUs.
    #[arg(long, env = "DIET_INSIGHTS_TASK_LIMIT")]
    pub task_limit: Option<usize>,
}

impl CommandLineArgs {
    /// Return the dataset pipeline configuration described by the arguments.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            container: self.container.clone(),
            object: self.object.clone(),
            default_limit: self.default_row_limit,
            max_limit: self.max_row_limit,
            schema: DatasetSchema {
                category_field: self.category_field.clone(),
                nutrient_fields: self
                    .nutrients
                    .iter()
                    .map(|nutrient| nutrient.trim().to_string())
                    .filter(|nutrient| !nutrient.is_empty())
                    .collect(),
            },
        }
    }
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
