// ai
//! 📤 ObjectSink — records in, rolled-over text objects out.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::backends::{RolloverConfig, Sink};
use crate::common::{LineBatch, PipelineStats};
use crate::error::WriteError;
use crate::storage::{Connector, ObjectStorageConfig};
use crate::writer::{ObjectWriter, ObjectWriterConfig, TextCompression};

/// 🔧 `[sink_config.Object]` — connection, naming, header, compression and rollover, all
/// in one flat table.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ObjectSinkConfig {
    #[serde(flatten)]
    pub storage: ObjectStorageConfig,
    /// 🏷️ Name template, e.g. `"logs/part-%OBJECTNUM.txt"`
    pub object: String,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub compression: TextCompression,
    #[serde(flatten)]
    pub rollover: RolloverConfig,
}

/// 📤 Feeds every record of every page into one `ObjectWriter`.
#[derive(Debug)]
pub(crate) struct ObjectSink {
    writer: ObjectWriter,
    stats: Arc<PipelineStats>,
    bucket: String,
    reported_objects: u64,
    reported_records: u64,
}

impl ObjectSink {
    /// 🚀 Connect, validate the rollover knobs and the template, build the writer.
    pub(crate) async fn new(
        config: ObjectSinkConfig,
        connector: &dyn Connector,
        stats: Arc<PipelineStats>,
    ) -> Result<Self> {
        let store = connector
            .connect(&config.storage)
            .await
            .context("💀 could not connect to the object store")?;
        let rollover = config.rollover.to_policy()?;

        let mut writer_config = ObjectWriterConfig::new(config.object.clone())
            .with_rollover(rollover)
            .with_compression(config.compression);
        if let Some(header) = config.header {
            writer_config = writer_config.with_header(header);
        }
        let writer = ObjectWriter::new(store, writer_config)?;

        info!(
            "📤 object sink ready: bucket '{}', objects '{}', rollover {:?}",
            config.storage.bucket, config.object, rollover
        );
        Ok(Self {
            writer,
            stats,
            bucket: config.storage.bucket,
            reported_objects: 0,
            reported_records: 0,
        })
    }

    /// 🔢 Push whatever the writer delivered since last time into the run stats.
    fn report_progress(&mut self) {
        let objects = self.writer.objects_written();
        let records = self.writer.records_written();
        self.stats.add_objects_written(objects - self.reported_objects);
        self.stats.add_records_written(records - self.reported_records);
        self.reported_objects = objects;
        self.reported_records = records;
    }

    fn absorb(&self, result: Result<(), WriteError>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(WriteError::Upload(e)) => {
                // -- the buffer survived. the next write or tick tries again.
                warn!("💀 upload to bucket '{}' failed, records stay buffered: {}", self.bucket, e);
                self.stats.add_upload_failure();
                Ok(())
            }
            Err(e) => Err(e).context(format!("💀 writing to bucket '{}' failed", self.bucket)),
        }
    }
}

#[async_trait]
impl Sink for ObjectSink {
    async fn receive(&mut self, batch: LineBatch) -> Result<()> {
        for record in &batch.records {
            let result = self.writer.write(record).await;
            self.absorb(result)?;
        }
        self.report_progress();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let result = self.writer.close().await;
        self.report_progress();
        match result {
            Ok(last) => {
                info!(
                    "🏁 object sink closed: {} objects, {} records (last '{}')",
                    self.writer.objects_written(),
                    self.writer.records_written(),
                    last.as_deref().unwrap_or("-")
                );
                Ok(())
            }
            Err(WriteError::Upload(e)) => {
                self.stats.add_upload_failure();
                Err(e).context(format!(
                    "💀 the final object for bucket '{}' never made it. its records are lost.",
                    self.bucket
                ))
            }
            Err(e) => Err(e).context("💀 closing the object writer failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SharedStoreConnector;
    use futures::TryStreamExt;
    use object_store::ObjectStore;
    use object_store::memory::InMemory;

    fn sink_toml(extra: &str) -> ObjectSinkConfig {
        toml::from_str(&format!(
            "bucket = \"landing\"\nendpoint = \"cos.example\"\nobject = \"out/part%OBJECTNUM.txt\"\n{extra}"
        ))
        .unwrap()
    }

    #[test]
    fn the_one_where_the_flat_table_lands_in_the_right_fields() {
        let the_config = sink_toml("header = \"id,name\"\ntuples_per_object = 2\ncompression = \"gzip\"");
        assert_eq!(the_config.storage.bucket, "landing");
        assert_eq!(the_config.header.as_deref(), Some("id,name"));
        assert_eq!(the_config.rollover.tuples_per_object, Some(2));
        assert_eq!(the_config.compression, TextCompression::Gzip);
    }

    #[tokio::test]
    async fn the_one_where_pages_become_objects_and_stats_keep_up() {
        let the_store = Arc::new(InMemory::new());
        let the_connector = SharedStoreConnector::new(the_store.clone());
        let the_stats = Arc::new(PipelineStats::default());
        let mut the_sink = ObjectSink::new(sink_toml("tuples_per_object = 2"), &the_connector, the_stats.clone())
            .await
            .unwrap();

        the_sink
            .receive(LineBatch::new(vec!["a".into(), "b".into(), "c".into()]))
            .await
            .unwrap();
        let the_midway = the_stats.summary(std::time::Duration::ZERO);
        assert_eq!(the_midway.objects_written, 1);
        assert_eq!(the_midway.records_written, 2);

        the_sink.close().await.unwrap();
        let the_summary = the_stats.summary(std::time::Duration::ZERO);
        assert_eq!(the_summary.objects_written, 2);
        assert_eq!(the_summary.records_written, 3);

        let mut the_keys: Vec<String> = the_store
            .list(None)
            .map_ok(|m| m.location.to_string())
            .try_collect()
            .await
            .unwrap();
        the_keys.sort();
        assert_eq!(the_keys, vec!["out/part0.txt", "out/part1.txt"]);
    }

    #[tokio::test]
    async fn the_one_where_two_rollover_knobs_stop_the_sink_before_it_starts() {
        let the_connector = SharedStoreConnector::new(Arc::new(InMemory::new()));
        let the_result = ObjectSink::new(
            sink_toml("tuples_per_object = 2\ntime_per_object = 5"),
            &the_connector,
            Arc::new(PipelineStats::default()),
        )
        .await;
        assert!(the_result.is_err());
    }

    #[tokio::test]
    async fn the_one_where_a_bounced_upload_is_counted_not_fatal() {
        use object_store::local::LocalFileSystem;

        let the_dir = tempfile::tempdir().unwrap();
        let the_squatter = the_dir.path().join("out");
        std::fs::write(&the_squatter, b"in the way").unwrap();
        let the_connector =
            SharedStoreConnector::new(Arc::new(LocalFileSystem::new_with_prefix(the_dir.path()).unwrap()));
        let the_stats = Arc::new(PipelineStats::default());
        let mut the_sink = ObjectSink::new(sink_toml("tuples_per_object = 1"), &the_connector, the_stats.clone())
            .await
            .unwrap();

        the_sink.receive(LineBatch::new(vec!["lost?".into()])).await.unwrap();
        assert_eq!(the_stats.summary(std::time::Duration::ZERO).upload_failures, 1);

        // -- the squatter leaves, the buffered record rides out with the next page
        std::fs::remove_file(&the_squatter).unwrap();
        the_sink.receive(LineBatch::new(vec!["found".into()])).await.unwrap();
        the_sink.close().await.unwrap();

        let the_summary = the_stats.summary(std::time::Duration::ZERO);
        assert_eq!(the_summary.records_written, 2);
        assert_eq!(the_summary.objects_written, 1);
        let the_text = std::fs::read_to_string(the_dir.path().join("out/part0.txt")).unwrap();
        assert_eq!(the_text, "lost?\nfound\n");
    }
}
