// ai
//! 🪣 cosx — cloud object storage as a pipeline sink and a pipeline source.
//!
//! 🎬 *[records flow into buckets. buckets flow into records. the circle of object life.]*
//!
//! 🧠 Knowledge graph:
//! - Building blocks, usable on their own:
//!   `credentials` (who are we) → `storage` (connect) → `writer` / `scanner` / `reader`.
//!   `rollover` and `object_name` decide when an object ends and what it is called.
//! - The pipeline: `app_config` → `supervisors` → `backends` (source → channel → sink).
//! - `run` is the front door the CLI uses. `run_with_connector` lets callers (and tests) hand
//!   in their own store. 🦆

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

pub mod app_config;
pub(crate) mod backends;
pub(crate) mod common;
pub mod credentials;
pub mod error;
pub mod object_name;
pub(crate) mod progress;
pub mod reader;
pub mod rollover;
pub mod scanner;
pub mod storage;
pub(crate) mod supervisors;
pub mod writer;

pub use backends::{
    CommonSourceConfig, FileSourceConfig, InMemorySinkConfig, InMemorySourceConfig, ObjectScanSourceConfig,
    ObjectSinkConfig, ParquetSinkConfig, RolloverConfig, StdoutSinkConfig,
};
pub use common::RunSummary;

use crate::app_config::AppConfig;
use crate::storage::{Connector, S3Connector};
use crate::supervisors::Supervisor;

/// 🚀 Run the configured pipeline against real object storage until the source runs dry,
/// `run_for_secs` passes, or `cancel` fires.
pub async fn run(app_config: AppConfig, cancel: CancellationToken) -> Result<RunSummary> {
    let connector = S3Connector::new(app_config.app_config_store())
        .context("💀 could not set up the object storage client")?;
    run_with_connector(app_config, &connector, cancel).await
}

/// 🔌 Same as `run`, but every bucket is opened through `connector`.
pub async fn run_with_connector(
    app_config: AppConfig,
    connector: &dyn Connector,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    Supervisor::new(app_config).start_workers(connector, cancel).await
}
