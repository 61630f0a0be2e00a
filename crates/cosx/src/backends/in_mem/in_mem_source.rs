use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::backends::{CommonSourceConfig, Source};
use crate::common::LineBatch;

/// 📋 The records to pour, straight from config.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct InMemorySourceConfig {
    #[serde(default)]
    pub records: Vec<String>,
    #[serde(default)]
    pub common_config: CommonSourceConfig,
}

/// 📦 Hands out the configured records in pages, then runs dry.
#[derive(Debug)]
pub(crate) struct InMemorySource {
    remaining: VecDeque<String>,
    common_config: CommonSourceConfig,
}

impl InMemorySource {
    pub(crate) fn new(config: InMemorySourceConfig) -> Self {
        Self {
            remaining: config.records.into(),
            common_config: config.common_config,
        }
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn next_batch(&mut self) -> Result<Option<LineBatch>> {
        let mut records = Vec::new();
        let mut bytes = 0usize;
        while let Some(record) = self.remaining.pop_front() {
            bytes += record.len();
            records.push(record);
            if records.len() >= self.common_config.max_batch_size_docs
                || bytes >= self.common_config.max_batch_size_bytes
            {
                break;
            }
        }
        // -- 💀 nothing left. the larder is bare.
        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some(LineBatch::new(records)))
    }
}
