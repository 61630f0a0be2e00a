// ai
//! 🔭 ObjectScanSource — tails a bucket: new objects in, their lines out.
//!
//! ```text
//! ObjectScanner task ──keys──► [async_channel] ──► ObjectReader ──lines──► LineBatch pages
//! ```
//!
//! The scanner runs on its own task with a child token of this source's token, so dropping
//! the source (or cancelling the pipeline) stops the polling. A key that disappears between
//! listing and reading is skipped with a warning. 🦆

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backends::{CommonSourceConfig, Source};
use crate::common::{LineBatch, PipelineStats};
use crate::progress::ProgressMetrics;
use crate::reader::{ObjectLines, ObjectReader};
use crate::scanner::{DEFAULT_POLL_INTERVAL, ObjectScanner, ScanFilter};
use crate::storage::{Connector, ObjectStorageConfig};

/// 🔧 `[source_config.ObjectScan]`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ObjectScanSourceConfig {
    #[serde(flatten)]
    pub storage: ObjectStorageConfig,
    /// 📁 Only keys under this directory. Omitted → the whole bucket.
    #[serde(default)]
    pub directory: Option<String>,
    /// 🔍 Regex the file name (last path segment) must match in full
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,
    #[serde(default)]
    pub common_config: CommonSourceConfig,
}

fn default_poll_interval_secs() -> f64 {
    DEFAULT_POLL_INTERVAL.as_secs_f64()
}

pub(crate) struct ObjectScanSource {
    keys: async_channel::Receiver<String>,
    reader: ObjectReader,
    current: Option<ObjectLines>,
    common_config: CommonSourceConfig,
    cancel: CancellationToken,
    scanner: Option<JoinHandle<()>>,
    stats: Arc<PipelineStats>,
    progress: ProgressMetrics,
    bucket: String,
}

impl std::fmt::Debug for ObjectScanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectScanSource")
            .field("bucket", &self.bucket)
            .field("current", &self.current)
            .field("common_config", &self.common_config)
            .finish()
    }
}

impl ObjectScanSource {
    /// 🚀 Connect, compile the filter, start the scanner.
    pub(crate) async fn new(
        config: ObjectScanSourceConfig,
        connector: &dyn Connector,
        stats: Arc<PipelineStats>,
    ) -> Result<Self> {
        let filter = ScanFilter::new(config.directory.as_deref(), config.pattern.as_deref())?;
        let poll_interval = Duration::try_from_secs_f64(config.poll_interval_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .context(format!(
                "💀 poll_interval_secs = {} is not a usable interval",
                config.poll_interval_secs
            ))?;
        let store = connector
            .connect(&config.storage)
            .await
            .context("💀 could not connect to the object store")?;

        let (tx, rx) = async_channel::bounded(1024);
        let cancel = CancellationToken::new();
        let scanner = ObjectScanner::new(store.clone(), filter)
            .with_poll_interval(poll_interval)
            .spawn(tx, cancel.child_token());

        Ok(Self {
            keys: rx,
            reader: ObjectReader::new(store),
            current: None,
            common_config: config.common_config,
            cancel,
            scanner: Some(scanner),
            stats,
            progress: ProgressMetrics::new(format!("cos://{}", config.storage.bucket), 0),
            bucket: config.storage.bucket,
        })
    }

    /// 📥 The object to read from next: the one in progress, or the next key that still
    /// exists. `None` once the scanner has hung up.
    async fn current_object(&mut self) -> Result<Option<&mut ObjectLines>> {
        if self.current.is_none() {
            loop {
                let Ok(key) = self.keys.recv().await else {
                    return Ok(None);
                };
                match self.reader.read(&key).await {
                    Ok(lines) => {
                        debug!("📖 reading '{}' from bucket '{}'", key, self.bucket);
                        self.current = Some(lines);
                        break;
                    }
                    Err(e) if e.is_not_found() => {
                        warn!("👻 '{}' vanished before we could read it, skipping", key);
                        self.stats.add_missing_object();
                    }
                    Err(e) => return Err(e).context(format!("💀 reading from bucket '{}' failed", self.bucket)),
                }
            }
        }
        Ok(self.current.as_mut())
    }
}

#[async_trait]
impl Source for ObjectScanSource {
    async fn next_batch(&mut self) -> Result<Option<LineBatch>> {
        let max_docs = self.common_config.max_batch_size_docs;
        let max_bytes = self.common_config.max_batch_size_bytes;
        let mut records = Vec::new();
        let mut bytes = 0usize;

        while records.len() < max_docs && bytes < max_bytes {
            // -- a partial page goes out rather than waiting on the next poll
            if !records.is_empty() && self.current.is_none() && self.keys.is_empty() {
                break;
            }
            let Some(object) = self.current_object().await? else {
                break;
            };
            match object.next_record().await {
                Ok(Some(record)) => {
                    bytes += record.len();
                    records.push(record);
                }
                Ok(None) => {
                    debug!("🏁 '{}' done after {} records", object.key(), object.records_read());
                    self.current = None;
                }
                Err(e) if e.is_not_found() => {
                    warn!("👻 '{}' vanished mid-read, skipping the rest of it", object.key());
                    self.stats.add_missing_object();
                    self.current = None;
                }
                Err(e) => return Err(e).context(format!("💀 reading from bucket '{}' failed", self.bucket)),
            }
        }

        if records.is_empty() {
            debug!("🔭 scanner hung up after {} records from bucket '{}'", self.progress.total_docs(), self.bucket);
            self.progress.finish();
            return Ok(None);
        }
        self.progress.update(bytes as u64, records.len() as u64);
        Ok(Some(LineBatch::new(records)))
    }
}

impl Drop for ObjectScanSource {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(scanner) = self.scanner.take() {
            scanner.abort();
        }
    }
}
