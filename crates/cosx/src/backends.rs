// ai
//! 🔌 Backends — where the real I/O happens.
//!
//! 🚰 Source backends pour records, Sink backends slurp them up. The object store sits on
//! both ends: the object sinks fill buckets, the scan source drains them.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait → concrete impls → `SourceBackend` / `SinkBackend` enum dispatch.
//! - Sources: `InMemory` (a list from config), `File` (lines of a local file),
//!   `ObjectScan` (scanner → reader over a bucket).
//! - Sinks: `InMemory` (a Vec, for tests), `Stdout`, `Object` (text objects), `Parquet`.
//! - Configs live next to the backend that reads them. `app_config` only holds the enums.
//! - `from_config` is the casting agency: config variant in, constructed backend out.
//!   Anything touching a bucket asks the `Connector` for its store. 🦆

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::app_config::{SinkConfig, SourceConfig};
use crate::common::{LineBatch, PipelineStats};
use crate::storage::Connector;

mod common_config;
pub(crate) mod cos;
pub(crate) mod file;
pub(crate) mod in_mem;
pub(crate) mod stdout;

pub use common_config::{CommonSourceConfig, RolloverConfig};
pub use cos::{ObjectScanSourceConfig, ObjectSinkConfig, ParquetSinkConfig};
pub use file::FileSourceConfig;
pub use in_mem::{InMemorySinkConfig, InMemorySourceConfig};
pub use stdout::StdoutSinkConfig;

/// 🚰 A source that produces pages of records.
///
/// # Contract 📜
/// - `next_batch` returns `Ok(Some(batch))` while data flows, never an empty batch.
/// - `Ok(None)` = EOF. A bucket scan only reaches it when its scanner is gone.
/// - Cancellation is the caller's job: the source worker races `next_batch` against the
///   token, so a source may block for as long as it likes waiting on new keys.
#[async_trait]
pub(crate) trait Source: std::fmt::Debug + Send {
    async fn next_batch(&mut self) -> Result<Option<LineBatch>>;
}

/// 🕳️ A sink that consumes pages of records.
///
/// # Contract 📜
/// - `receive` takes one page. Recoverable trouble (a failed upload) is logged and
///   counted in `PipelineStats`; an `Err` stops the pipeline.
/// - `close` flushes whatever is buffered. MUST be called. Skipping it loses the tail.
#[async_trait]
pub(crate) trait Sink: std::fmt::Debug + Send {
    async fn receive(&mut self, batch: LineBatch) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a Source.
#[derive(Debug)]
pub(crate) enum SourceBackend {
    InMemory(in_mem::InMemorySource),
    File(file::FileSource),
    ObjectScan(cos::ObjectScanSource),
}

impl SourceBackend {
    /// 🏗️ Build the configured source, connecting to the store if it needs one.
    pub(crate) async fn from_config(
        config: &SourceConfig,
        connector: &dyn Connector,
        stats: Arc<PipelineStats>,
    ) -> Result<Self> {
        let backend = match config {
            SourceConfig::InMemory(c) => SourceBackend::InMemory(in_mem::InMemorySource::new(c.clone())),
            SourceConfig::File(c) => SourceBackend::File(
                file::FileSource::new(c.clone())
                    .await
                    .context("💀 the file source could not be opened")?,
            ),
            SourceConfig::ObjectScan(c) => SourceBackend::ObjectScan(
                cos::ObjectScanSource::new(c.clone(), connector, stats)
                    .await
                    .context(format!(
                        "💀 the scan source for bucket '{}' could not start",
                        c.storage.bucket
                    ))?,
            ),
        };
        Ok(backend)
    }
}

#[async_trait]
impl Source for SourceBackend {
    async fn next_batch(&mut self) -> Result<Option<LineBatch>> {
        match self {
            SourceBackend::InMemory(s) => s.next_batch().await,
            SourceBackend::File(s) => s.next_batch().await,
            SourceBackend::ObjectScan(s) => s.next_batch().await,
        }
    }
}

/// 🎭 The many faces of a Sink. Mirrors `SourceBackend` on the other end of the pipe.
#[derive(Debug)]
pub(crate) enum SinkBackend {
    InMemory(in_mem::InMemorySink),
    Stdout(stdout::StdoutSink),
    Object(cos::ObjectSink),
    Parquet(cos::ParquetSink),
}

impl SinkBackend {
    /// 🏗️ Build the configured sink. Configuration and credential errors surface here,
    /// before a single record moves.
    pub(crate) async fn from_config(
        config: &SinkConfig,
        connector: &dyn Connector,
        stats: Arc<PipelineStats>,
    ) -> Result<Self> {
        let backend = match config {
            SinkConfig::InMemory(_) => SinkBackend::InMemory(in_mem::InMemorySink::new(stats)),
            SinkConfig::Stdout(_) => SinkBackend::Stdout(stdout::StdoutSink::new(stats)),
            SinkConfig::Object(c) => SinkBackend::Object(
                cos::ObjectSink::new(c.clone(), connector, stats)
                    .await
                    .context(format!(
                        "💀 the object sink for bucket '{}' could not start",
                        c.storage.bucket
                    ))?,
            ),
            SinkConfig::Parquet(c) => SinkBackend::Parquet(
                cos::ParquetSink::new(c.clone(), connector, stats)
                    .await
                    .context(format!(
                        "💀 the parquet sink for bucket '{}' could not start",
                        c.storage.bucket
                    ))?,
            ),
        };
        Ok(backend)
    }
}

#[async_trait]
impl Sink for SinkBackend {
    async fn receive(&mut self, batch: LineBatch) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.receive(batch).await,
            SinkBackend::Stdout(sink) => sink.receive(batch).await,
            SinkBackend::Object(sink) => sink.receive(batch).await,
            SinkBackend::Parquet(sink) => sink.receive(batch).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.close().await,
            SinkBackend::Stdout(sink) => sink.close().await,
            SinkBackend::Object(sink) => sink.close().await,
            SinkBackend::Parquet(sink) => sink.close().await,
        }
    }
}
