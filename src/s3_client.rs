//! A record source backed by S3-compatible object storage.
//! Buckets are containers and object keys are dataset names.

use crate::error::InsightsError;
use crate::source::{ObjectReader, RecordSource};

use std::io::{self, Read};

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::BehaviorVersion;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use bytes::{Buf, Bytes};
use tokio::runtime::Handle;
use tracing::Instrument;
use url::Url;

#[derive(Clone, Eq, Hash, PartialEq)]
pub enum S3Credentials {
    AccessKey {
        access_key: String,
        secret_key: String,
    },
    None,
}

impl S3Credentials {
    /// Create an access key credential.
    pub fn access_key(access_key: &str, secret_key: &str) -> Self {
        S3Credentials::AccessKey {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        }
    }
}

/// S3 client object.
#[derive(Clone)]
pub struct S3Client {
    /// Underlying AWS SDK S3 client object.
    client: Client,
}

impl S3Client {
    /// Creates an S3Client object
    ///
    /// # Arguments
    ///
    /// * `url`: Object storage API URL
    /// * `credentials`: Object storage account credentials
    /// * `region`: Object storage region
    pub fn new(url: &Url, credentials: S3Credentials, region: &str) -> Self {
        let region = Region::new(region.to_string());
        let builder = aws_sdk_s3::Config::builder().behavior_version(BehaviorVersion::latest());
        let builder = match credentials {
            S3Credentials::AccessKey {
                access_key,
                secret_key,
            } => {
                let credentials = Credentials::from_keys(access_key, secret_key, None);
                builder.credentials_provider(credentials)
            }
            S3Credentials::None => builder,
        };
        let s3_config = builder
            .region(Some(region))
            .endpoint_url(url.to_string())
            .force_path_style(true)
            .build();
        let client = Client::from_conf(s3_config);
        Self { client }
    }

    /// List the objects in a container for a not found response.
    ///
    /// A failed listing is logged and reported as no available objects so that it does not replace
    /// the not found error.
    async fn available_objects(&self, container: &str) -> Vec<String> {
        match self.list(container).await {
            Ok(names) => names,
            Err(error) => {
                tracing::warn!("failed to list objects in {}: {}", container, error);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl RecordSource for S3Client {
    /// Start a download of an object and return a reader over its body.
    ///
    /// Only the response headers have been received when this returns. The body is pulled as the
    /// reader is consumed.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn open(&self, container: &str, object: &str) -> Result<ObjectReader, InsightsError> {
        let result = self
            .client
            .get_object()
            .bucket(container)
            .key(object)
            .send()
            .instrument(tracing::Span::current())
            .await;
        match result {
            Ok(response) => Ok(Box::new(ByteStreamReader::new(
                response.body,
                Handle::current(),
            ))),
            Err(error) => match error.as_service_error() {
                Some(e) if e.is_no_such_key() => Err(InsightsError::ObjectNotFound {
                    container: container.to_string(),
                    object: object.to_string(),
                    available: self.available_objects(container).await,
                }),
                Some(e) if e.code() == Some("NoSuchBucket") => {
                    Err(InsightsError::ContainerNotFound {
                        container: container.to_string(),
                    })
                }
                _ => Err(error.into()),
            },
        }
    }

    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn list(&self, container: &str) -> Result<Vec<String>, InsightsError> {
        let mut names = Vec::new();
        let mut continuation_token = None;
        loop {
            let result = self
                .client
                .list_objects_v2()
                .bucket(container)
                .set_continuation_token(continuation_token)
                .send()
                .instrument(tracing::Span::current())
                .await;
            let response = match result {
                Ok(response) => response,
                Err(error) => {
                    let no_such_bucket = error
                        .as_service_error()
                        .map_or(false, |e| e.is_no_such_bucket());
                    if no_such_bucket {
                        return Err(InsightsError::ContainerNotFound {
                            container: container.to_string(),
                        });
                    }
                    return Err(error.into());
                }
            };
            names.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
            match response.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Blocking [Read] adapter over a streaming object body.
///
/// Each read that exhausts the current chunk waits on the runtime for the next one, so the
/// reader must only be used from a blocking task (see [tokio::task::spawn_blocking]).
pub struct ByteStreamReader {
    body: ByteStream,
    chunk: Bytes,
    handle: Handle,
}

impl ByteStreamReader {
    /// Return a new ByteStreamReader that drives `body` on the runtime behind `handle`.
    pub fn new(body: ByteStream, handle: Handle) -> Self {
        Self {
            body,
            chunk: Bytes::new(),
            handle,
        }
    }
}

impl Read for ByteStreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.chunk.is_empty() {
            match self.handle.block_on(self.body.try_next()) {
                Ok(Some(chunk)) => self.chunk = chunk,
                Ok(None) => return Ok(0),
                Err(error) => return Err(io::Error::new(io::ErrorKind::Other, error)),
            }
        }
        let n = buf.len().min(self.chunk.len());
        buf[..n].copy_from_slice(&self.chunk[..n]);
        self.chunk.advance(n);
        Ok(n)
    }
}
