// ai
//! 🧱 ParquetSink — every record is a row, every rollover a parquet object.
//!
//! Lines that parse as JSON objects become rows field by field; anything else arrives as
//! `{"string": line}`. The first row fixes the columns for the whole run, and a row that
//! disagrees stops the pipeline. A parquet file with a surprise column is not a file
//! anybody downstream wants. 🦆

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::backends::{RolloverConfig, Sink};
use crate::common::{LineBatch, PipelineStats};
use crate::error::WriteError;
use crate::storage::{Connector, ObjectStorageConfig};
use crate::writer::{ParquetCompression, ParquetWriter, ParquetWriterConfig, Row};

/// 🔧 `[sink_config.Parquet]`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ParquetSinkConfig {
    #[serde(flatten)]
    pub storage: ObjectStorageConfig,
    /// 🏷️ Name template, e.g. `"tables/events-%OBJECTNUM.parquet"`
    pub object: String,
    #[serde(default)]
    pub compression: ParquetCompression,
    #[serde(flatten)]
    pub rollover: RolloverConfig,
}

#[derive(Debug)]
pub(crate) struct ParquetSink {
    writer: ParquetWriter,
    stats: Arc<PipelineStats>,
    bucket: String,
    reported_objects: u64,
    reported_records: u64,
}

impl ParquetSink {
    pub(crate) async fn new(
        config: ParquetSinkConfig,
        connector: &dyn Connector,
        stats: Arc<PipelineStats>,
    ) -> Result<Self> {
        let store = connector
            .connect(&config.storage)
            .await
            .context("💀 could not connect to the object store")?;
        let rollover = config.rollover.to_policy()?;
        let writer = ParquetWriter::new(
            store,
            ParquetWriterConfig::new(config.object.clone())
                .with_rollover(rollover)
                .with_compression(config.compression),
        )?;

        info!(
            "🧱 parquet sink ready: bucket '{}', objects '{}', rollover {:?}, compression {:?}",
            config.storage.bucket, config.object, rollover, config.compression
        );
        Ok(Self {
            writer,
            stats,
            bucket: config.storage.bucket,
            reported_objects: 0,
            reported_records: 0,
        })
    }

    fn report_progress(&mut self) {
        let objects = self.writer.objects_written();
        let records = self.writer.records_written();
        self.stats.add_objects_written(objects - self.reported_objects);
        self.stats.add_records_written(records - self.reported_records);
        self.reported_objects = objects;
        self.reported_records = records;
    }
}

#[async_trait]
impl Sink for ParquetSink {
    async fn receive(&mut self, batch: LineBatch) -> Result<()> {
        for record in &batch.records {
            match self.writer.write(Row::from_line(record)).await {
                Ok(()) => {}
                Err(WriteError::Upload(e)) => {
                    warn!("💀 parquet upload to bucket '{}' failed, rows stay buffered: {}", self.bucket, e);
                    self.stats.add_upload_failure();
                }
                Err(e) => {
                    self.report_progress();
                    return Err(e).context(format!(
                        "💀 a row did not fit the parquet schema for bucket '{}'",
                        self.bucket
                    ));
                }
            }
        }
        self.report_progress();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let result = self.writer.close().await;
        self.report_progress();
        match result {
            Ok(_) => {
                info!(
                    "🏁 parquet sink closed: {} objects, {} rows",
                    self.writer.objects_written(),
                    self.writer.records_written()
                );
                Ok(())
            }
            Err(WriteError::Upload(e)) => {
                self.stats.add_upload_failure();
                Err(e).context(format!(
                    "💀 the final parquet object for bucket '{}' never made it",
                    self.bucket
                ))
            }
            Err(e) => Err(e).context("💀 closing the parquet writer failed"),
        }
    }
}
