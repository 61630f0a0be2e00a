use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt},
};
use tracing::trace;

use crate::backends::{CommonSourceConfig, Source};
use crate::common::LineBatch;
use crate::progress::ProgressMetrics;

// -- 📂 FileSourceConfig lives next to the FileSource that reads it.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FileSourceConfig {
    pub file_name: String,
    #[serde(default)]
    pub common_config: CommonSourceConfig,
}

/// 📂 FileSource — reads a file line by line and hands out pages.
///
/// A page ends at EOF, at `max_batch_size_docs` lines, or once `max_batch_size_bytes` is
/// crossed, whichever comes first. Blank lines are skipped, line endings are stripped.
pub(crate) struct FileSource {
    buf_reader: io::BufReader<File>,
    source_config: FileSourceConfig,
    progress: ProgressMetrics,
}

// 🐛 progress is left out on purpose. Nobody debugging a FileSource wants a progress bar dump.
impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("source_config", &self.source_config)
            .finish()
    }
}

impl FileSource {
    /// 🚀 Open the file and size it for the progress bar. Unknown size → spinner.
    pub(crate) async fn new(source_config: FileSourceConfig) -> Result<Self> {
        let file_handle = File::open(&source_config.file_name).await.context(format!(
            "💀 The door to '{}' would not budge. We knocked. We checked whether it exists \
            (it might not) and whether the permissions like us (they might not).",
            source_config.file_name
        ))?;

        let file_size = file_handle.metadata().await.map(|m| m.len()).unwrap_or(0);
        let buf_reader = io::BufReader::new(file_handle);
        let progress = ProgressMetrics::new(source_config.file_name.clone(), file_size);

        Ok(Self {
            buf_reader,
            source_config,
            progress,
        })
    }
}

#[async_trait]
impl Source for FileSource {
    async fn next_batch(&mut self) -> Result<Option<LineBatch>> {
        let limits = &self.source_config.common_config;
        let mut records = Vec::new();
        let mut total_bytes_read = 0usize;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = self.buf_reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                break;
            }
            total_bytes_read += bytes_read;

            let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
            if !trimmed.is_empty() {
                records.push(trimmed.to_string());
            }

            if total_bytes_read >= limits.max_batch_size_bytes
                || records.len() >= limits.max_batch_size_docs
            {
                break;
            }
        }

        trace!(
            "📖 hauled {} bytes / {} lines out of '{}'",
            total_bytes_read,
            records.len(),
            self.source_config.file_name
        );
        self.progress
            .update(total_bytes_read as u64, records.len() as u64);

        // 📄 Empty page = EOF. The well is dry. 🏁
        if records.is_empty() {
            self.progress.finish();
            Ok(None)
        } else {
            Ok(Some(LineBatch::new(records)))
        }
    }
}
