// ai
//! 📝 Text objects — one record per line, an optional header on top, gzip if you ask nicely.
//!
//! The `ObjectWriter` is the plain-text flavor of `RollingWriter`. Each `write` appends the
//! record bytes plus `\n`. When the object rolls over, the header (if configured) is glued
//! onto the front of *every* object, not just the first one. CSV readers everywhere rejoice.
//!
//! 📏 Size rollover counts the bytes before compression (header included). A gzip writer with
//! `Size(n)` rolls over after about `n` bytes of text, and the object it uploads is smaller.

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use object_store::ObjectStore;
use serde::Deserialize;

use super::{ObjectEncoder, RollingWriter};
use crate::error::{ConfigurationError, WriteError};
use crate::object_name::ObjectNameTemplate;
use crate::rollover::RolloverPolicy;

/// 🫁 Body compression for text objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextCompression {
    #[default]
    None,
    Gzip,
}

/// 🔧 Everything an `ObjectWriter` needs besides the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectWriterConfig {
    /// 🏷️ Object name template, must contain `%OBJECTNUM` once
    pub object: String,
    pub rollover: RolloverPolicy,
    /// 📋 Line re-emitted at the top of every object
    pub header: Option<String>,
    pub compression: TextCompression,
}

impl ObjectWriterConfig {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            rollover: RolloverPolicy::default(),
            header: None,
            compression: TextCompression::None,
        }
    }

    #[must_use]
    pub fn with_rollover(mut self, rollover: RolloverPolicy) -> Self {
        self.rollover = rollover;
        self
    }

    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: TextCompression) -> Self {
        self.compression = compression;
        self
    }
}

pub(crate) struct TextEncoder {
    header: Option<String>,
    body: Vec<u8>,
    records: usize,
    compression: TextCompression,
}

impl TextEncoder {
    fn new(header: Option<String>, compression: TextCompression) -> Self {
        Self {
            header,
            body: Vec::new(),
            records: 0,
            compression,
        }
    }

    fn header_len(&self) -> usize {
        self.header.as_ref().map_or(0, |h| h.len() + 1)
    }
}

impl ObjectEncoder for TextEncoder {
    type Item = String;

    fn append(&mut self, item: String) -> Result<(), WriteError> {
        self.body.reserve(item.len() + 1);
        self.body.extend_from_slice(item.as_bytes());
        self.body.push(b'\n');
        self.records += 1;
        Ok(())
    }

    fn buffered_records(&self) -> usize {
        self.records
    }

    // -- measured before compression
    fn buffered_bytes(&self) -> usize {
        self.header_len() + self.body.len()
    }

    fn encode(&self) -> Result<Bytes, WriteError> {
        let mut plain = Vec::with_capacity(self.buffered_bytes());
        if let Some(header) = &self.header {
            plain.extend_from_slice(header.as_bytes());
            plain.push(b'\n');
        }
        plain.extend_from_slice(&self.body);

        match self.compression {
            TextCompression::None => Ok(Bytes::from(plain)),
            TextCompression::Gzip => {
                let mut gz = GzEncoder::new(Vec::with_capacity(plain.len() / 2), Compression::default());
                gz.write_all(&plain)
                    .and_then(|_| gz.finish())
                    .map(Bytes::from)
                    .map_err(|e| WriteError::Encode(format!("gzip: {e}")))
            }
        }
    }

    fn reset(&mut self) {
        self.body.clear();
        self.records = 0;
    }
}

/// 🪣 Batching text sink: records in, sequentially numbered objects out.
///
/// Safe to share across tasks (`&self` methods); appends and flushes are serialized
/// internally, so the timer can never cut an object in half.
pub struct ObjectWriter {
    inner: RollingWriter<TextEncoder>,
}

impl std::fmt::Debug for ObjectWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectWriter")
            .field("policy", &self.inner.policy())
            .field("objects_written", &self.inner.objects_written())
            .finish()
    }
}

impl ObjectWriter {
    /// 🚀 Validate the template and rollover policy, start the timer if time-based.
    ///
    /// 💀 `ConfigurationError` for a template without exactly one `%OBJECTNUM`, a sub-second
    /// interval, or a zero threshold.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        config: ObjectWriterConfig,
    ) -> Result<Self, ConfigurationError> {
        let template = ObjectNameTemplate::parse(&config.object)?;
        let encoder = TextEncoder::new(config.header, config.compression);
        let inner = RollingWriter::new(store, template, config.rollover, encoder)?;
        Ok(Self { inner })
    }

    /// 📥 Append one record. May upload an object if the count/size threshold is hit.
    pub async fn write(&self, record: &str) -> Result<(), WriteError> {
        self.inner.write(record.to_owned()).await
    }

    /// 📤 Roll over now. `Ok(None)` when there was nothing to write.
    pub async fn flush(&self) -> Result<Option<String>, WriteError> {
        self.inner.flush().await
    }

    /// 🗑️ Stop the timer and flush the tail. Call it. The buffer is not going to upload itself.
    pub async fn close(&mut self) -> Result<Option<String>, WriteError> {
        self.inner.close().await
    }

    pub async fn buffered_records(&self) -> usize {
        self.inner.buffered_records().await
    }

    pub fn objects_written(&self) -> u64 {
        self.inner.objects_written()
    }

    pub fn records_written(&self) -> u64 {
        self.inner.records_written()
    }
}
