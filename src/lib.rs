//! Fetch one image per row of a CSV and bundle everything into `results.zip`.
//!
//! The pipeline is: [`table`] ingestion, the sequential [`processor`] calling
//! the [`fetcher`] (backed by a [`search`] provider) per row, and the
//! [`archive`] builder. [`job`] drives a run on the tokio runtime and
//! [`app`] is the desktop front end over a [`session`].

pub mod app;
pub mod archive;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod job;
pub mod logging;
pub mod processor;
pub mod search;
pub mod session;
pub mod table;

pub use config::AppConfig;
pub use error::{ArchiveError, FetchError, IngestError, JobError};
pub use table::{Row, Table};
