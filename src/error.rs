//! Error handling.

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use axum::{
    extract::rejection::QueryRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tokio::sync::AcquireError;
use tokio::task::JoinError;
use tracing::{event, Level};

use crate::decoder::ParseError;

/// Diet insights server error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum InsightsError {
    /// The requested container does not exist
    #[error("container {container} not found")]
    ContainerNotFound { container: String },

    /// Container or object name that cannot be used to address a dataset
    #[error("invalid object name {name:?}")]
    InvalidObjectName { name: String },

    /// Requested row limit is above the configured maximum
    #[error("row limit {requested} exceeds the maximum of {max}")]
    LimitExceeded { requested: usize, max: usize },

    /// The requested object does not exist in its container
    #[error("object {object} not found in container {container}")]
    ObjectNotFound {
        container: String,
        object: String,
        available: Vec<String>,
    },

    /// The stored dataset could not be decoded
    #[error("failed to parse dataset")]
    Parse(#[from] ParseError),

    /// Error deserialising query parameters
    #[error("request query is not valid")]
    QueryRejection(#[from] QueryRejection),

    /// Error validating query parameters
    #[error("request query is not valid")]
    RequestValidation(#[from] validator::ValidationErrors),

    /// Error while retrieving an object from S3
    #[error("error retrieving object from S3 storage")]
    S3GetObject(#[from] SdkError<GetObjectError>),

    /// Error while listing the objects in an S3 bucket
    #[error("error listing objects in S3 storage")]
    S3ListObjects(#[from] SdkError<ListObjectsV2Error>),

    /// Error acquiring a semaphore
    #[error("error acquiring resources")]
    SemaphoreAcquire(#[from] AcquireError),

    /// Error accessing a local dataset
    #[error("error reading dataset from local storage")]
    SourceIo(#[from] std::io::Error),

    /// A blocking decode task panicked or was cancelled
    #[error("dataset decode task failed")]
    TaskJoin(#[from] JoinError),
}

impl IntoResponse for InsightsError {
    /// Convert from an `InsightsError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,

    /// Objects present in the container, when the requested one is missing
    #[serde(skip_serializing_if = "Option::is_none")]
    available_objects: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut causes = Vec::new();
        let mut current = error.source();
        while let Some(source) = current {
            causes.push(source.to_string());
            current = source.source();
        }
        // Remove duplicate entries.
        causes.dedup();
        let caused_by = (!causes.is_empty()).then_some(causes);
        ErrorBody {
            message,
            caused_by,
            available_objects: None,
        }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 401 unauthorised ErrorResponse
    fn unauthorised<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::UNAUTHORIZED, error)
    }

    /// Return a 404 not found ErrorResponse
    fn not_found<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    /// Return an ErrorResponse for an S3 error, based on its error code.
    fn from_s3_code<E>(code: Option<&str>, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        match code {
            // Not found
            Some("NoSuchBucket") | Some("NoSuchKey") => Self::not_found(error),

            // Unauthorised
            Some("InvalidAccessKeyId") | Some("SignatureDoesNotMatch") | Some("AccessDenied") => {
                Self::unauthorised(error)
            }

            // Internal server error
            _ => Self::internal_server_error(error),
        }
    }
}

impl From<InsightsError> for ErrorResponse {
    /// Convert from an `InsightsError` into an `ErrorResponse`.
    fn from(error: InsightsError) -> Self {
        let mut response = match &error {
            // Bad request
            InsightsError::InvalidObjectName { .. }
            | InsightsError::LimitExceeded { .. }
            | InsightsError::QueryRejection(_)
            | InsightsError::RequestValidation(_) => Self::bad_request(&error),

            // Not found
            InsightsError::ContainerNotFound { .. } | InsightsError::ObjectNotFound { .. } => {
                Self::not_found(&error)
            }

            // Internal server error
            InsightsError::Parse(_)
            | InsightsError::SemaphoreAcquire(_)
            | InsightsError::SourceIo(_)
            | InsightsError::TaskJoin(_) => Self::internal_server_error(&error),

            InsightsError::S3GetObject(sdk_error) => match sdk_error {
                SdkError::ServiceError(get_obj_error) => match get_obj_error.err() {
                    GetObjectError::NoSuchKey(_) => Self::not_found(&error),
                    other => Self::from_s3_code(other.code(), &error),
                },
                _ => Self::internal_server_error(&error),
            },

            InsightsError::S3ListObjects(sdk_error) => match sdk_error {
                SdkError::ServiceError(list_error) => {
                    Self::from_s3_code(list_error.err().code(), &error)
                }
                _ => Self::internal_server_error(&error),
            },
        };

        if let InsightsError::ObjectNotFound { available, .. } = &error {
            response.error.available_objects = Some(available.clone());
        }

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use aws_sdk_s3::types::error::NoSuchKey;
    use aws_smithy_runtime_api::http::Response as SmithyResponse;
    use aws_smithy_runtime_api::http::StatusCode as SmithyStatusCode;
    use aws_smithy_types::error::ErrorMetadata as SmithyError;
    use hyper::HeaderMap;

    // Jump through the hoops to get the body as a string.
    async fn body_string(response: Response) -> String {
        String::from_utf8(
            hyper::body::to_bytes(response.into_body())
                .await
                .unwrap()
                .to_vec(),
        )
        .unwrap()
    }

    async fn error_body(error: InsightsError, status: StatusCode) -> ErrorBody {
        let response = error.into_response();
        assert_eq!(status, response.status());
        let mut headers = HeaderMap::new();
        headers.insert(&header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert_eq!(headers, *response.headers());
        let error_response: ErrorResponse =
            serde_json::from_str(&body_string(response).await).unwrap();
        error_response.error
    }

    async fn test_insights_error(
        error: InsightsError,
        status: StatusCode,
        message: &str,
        caused_by: Option<Vec<&'static str>>,
    ) {
        let body = error_body(error, status).await;
        assert_eq!(message.to_string(), body.message);
        // Map Vec items from str to String
        let caused_by = caused_by.map(|cb| cb.iter().map(|s| s.to_string()).collect());
        assert_eq!(caused_by, body.caused_by);
        assert_eq!(None, body.available_objects);
    }

    #[tokio::test]
    async fn container_not_found() {
        let error = InsightsError::ContainerNotFound {
            container: "datasets".to_string(),
        };
        let message = "container datasets not found";
        test_insights_error(error, StatusCode::NOT_FOUND, message, None).await;
    }

    #[tokio::test]
    async fn object_not_found_lists_available() {
        let error = InsightsError::ObjectNotFound {
            container: "datasets".to_string(),
            object: "diets.csv".to_string(),
            available: vec!["All_Diets.csv".to_string(), "recipes.csv".to_string()],
        };
        let body = error_body(error, StatusCode::NOT_FOUND).await;
        assert_eq!(
            "object diets.csv not found in container datasets",
            body.message
        );
        assert_eq!(None, body.caused_by);
        assert_eq!(
            Some(vec!["All_Diets.csv".to_string(), "recipes.csv".to_string()]),
            body.available_objects
        );
    }

    #[tokio::test]
    async fn invalid_object_name() {
        let error = InsightsError::InvalidObjectName {
            name: "../etc".to_string(),
        };
        let message = "invalid object name \"../etc\"";
        test_insights_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn limit_exceeded() {
        let error = InsightsError::LimitExceeded {
            requested: 11,
            max: 10,
        };
        let message = "row limit 11 exceeds the maximum of 10";
        test_insights_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn parse_error() {
        let error = InsightsError::Parse(ParseError::UnterminatedQuote { line: 3, byte: 42 });
        let message = "failed to parse dataset";
        let caused_by = Some(vec![
            "unterminated quoted field starting at line 3 (byte 42)",
        ]);
        test_insights_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by).await;
    }

    #[tokio::test]
    async fn request_validation() {
        let mut validation_errors = validator::ValidationErrors::new();
        let validation_error = validator::ValidationError::new("foo");
        validation_errors.add("bar", validation_error);
        let error = InsightsError::RequestValidation(validation_errors);
        let message = "request query is not valid";
        let caused_by = Some(vec!["bar: Validation error: foo [{}]"]);
        test_insights_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn source_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = InsightsError::SourceIo(io_error);
        let message = "error reading dataset from local storage";
        let caused_by = Some(vec!["denied"]);
        test_insights_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by).await;
    }

    #[tokio::test]
    async fn semaphore_acquire_error() {
        let sem = tokio::sync::Semaphore::new(1);
        sem.close();
        let error = InsightsError::SemaphoreAcquire(sem.acquire().await.unwrap_err());
        let message = "error acquiring resources";
        let caused_by = Some(vec!["semaphore closed"]);
        test_insights_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by).await;
    }

    #[tokio::test]
    async fn task_join_error() {
        let join_error = tokio::spawn(async { panic!("boom") }).await.unwrap_err();
        let body = error_body(
            InsightsError::TaskJoin(join_error),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .await;
        assert_eq!("dataset decode task failed", body.message);
    }

    fn get_smithy_response() -> SmithyResponse {
        let sdk_body = "body";
        let status: SmithyStatusCode = 400.try_into().unwrap();
        SmithyResponse::new(status, sdk_body.into())
    }

    // Helper function for S3 GetObjectError errors with a given code.
    async fn test_s3_get_object_code(code: &'static str, status: StatusCode) {
        let smithy_error = SmithyError::builder()
            .message("fake smithy error")
            .code(code)
            .build();
        let get_object_error = GetObjectError::generic(smithy_error);
        let sdk_error = SdkError::service_error(get_object_error, get_smithy_response());
        let error = InsightsError::S3GetObject(sdk_error);
        let body = error_body(error, status).await;
        assert_eq!("error retrieving object from S3 storage", body.message);
        let caused_by = body.caused_by.unwrap();
        assert_eq!("service error", caused_by[0]);
        assert_eq!(format!("unhandled error ({code})"), caused_by[1]);
    }

    #[tokio::test]
    async fn s3_get_object_no_such_key() {
        // Jump through hoops to create an SdkError.
        let no_such_key = NoSuchKey::builder().build();
        let get_object_error = GetObjectError::NoSuchKey(no_such_key);
        let sdk_error = SdkError::service_error(get_object_error, get_smithy_response());
        let error = InsightsError::S3GetObject(sdk_error);
        let message = "error retrieving object from S3 storage";
        let caused_by = Some(vec!["service error", "NoSuchKey"]);
        test_insights_error(error, StatusCode::NOT_FOUND, message, caused_by).await;
    }

    #[tokio::test]
    async fn s3_get_object_no_such_bucket() {
        test_s3_get_object_code("NoSuchBucket", StatusCode::NOT_FOUND).await;
    }

    #[tokio::test]
    async fn s3_get_object_invalid_access_key() {
        test_s3_get_object_code("InvalidAccessKeyId", StatusCode::UNAUTHORIZED).await;
    }

    #[tokio::test]
    async fn s3_get_object_sig_does_not_match() {
        test_s3_get_object_code("SignatureDoesNotMatch", StatusCode::UNAUTHORIZED).await;
    }

    #[tokio::test]
    async fn s3_get_object_access_denied() {
        test_s3_get_object_code("AccessDenied", StatusCode::UNAUTHORIZED).await;
    }

    #[tokio::test]
    async fn s3_get_object_other_code() {
        test_s3_get_object_code("SlowDown", StatusCode::INTERNAL_SERVER_ERROR).await;
    }

    #[tokio::test]
    async fn s3_list_objects_access_denied() {
        let smithy_error = SmithyError::builder()
            .message("fake smithy error")
            .code("AccessDenied")
            .build();
        let list_error = ListObjectsV2Error::generic(smithy_error);
        let sdk_error = SdkError::service_error(list_error, get_smithy_response());
        let error = InsightsError::S3ListObjects(sdk_error);
        let body = error_body(error, StatusCode::UNAUTHORIZED).await;
        assert_eq!("error listing objects in S3 storage", body.message);
    }
}
