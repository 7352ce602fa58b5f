//! This crate provides a nutritional insights server for diet datasets. It reads a CSV dataset of
//! recipes from object storage, decodes a bounded number of rows from the object stream, and
//! computes per-diet views of it: average macronutrients, recipe counts per diet type and a
//! correlation matrix between the nutrients.
//!
//! Datasets are never cached. Each request streams the object, stops reading as soon as its row
//! limit is reached and releases the connection straight away.
//!
//! The server is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team, on top of the [hyper] HTTP library.
//! * [csv] performs incremental decoding of the dataset.
//! * [Serde](serde) performs (de)serialisation of request and response data.
//! * [AWS SDK for S3](aws-sdk-s3) is used to interact with S3-compatible object stores.
//! * [ndarray] provides the numeric columns used for the statistics.

pub mod aggregation;
pub mod app;
pub mod app_state;
pub mod cli;
pub mod decoder;
pub mod error;
pub mod filter;
pub mod insights;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod record;
pub mod resource_manager;
pub mod s3_client;
pub mod server;
pub mod source;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod validated_query;
