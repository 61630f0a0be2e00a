// ai
//! 🔧 App Configuration — the TOML-and-env-vars-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🧠 Knowledge graph:
//! - `AppConfig` = one `SourceConfig` + one `SinkConfig` + `RuntimeConfig` + named app configs.
//! - Source/sink enums are externally tagged: `[source_config.ObjectScan]`,
//!   `[sink_config.Parquet]`, and so on. The variant configs live in `backends`.
//! - `app_configs` stands in for the platform's named property bags. Credentials that name
//!   an app config (or name none, meaning `cos`) are looked up here under `cos.creds`.
//! - Env vars (`COSX_*`, `__` for nesting) are the base layer; the TOML file wins.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{
    FileSourceConfig, InMemorySinkConfig, InMemorySourceConfig, ObjectScanSourceConfig, ObjectSinkConfig,
    ParquetSinkConfig, StdoutSinkConfig,
};
use crate::credentials::{AppConfigStore, StaticAppConfigStore};

/// 📦 Everything one run needs to know about itself.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub source_config: SourceConfig,
    pub sink_config: SinkConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// 🗂️ Named property bags, e.g. `[app_configs.cos]` with a `"cos.creds"` entry
    #[serde(default)]
    pub app_configs: HashMap<String, BTreeMap<String, String>>,
}

impl AppConfig {
    /// 🗂️ The named app configs as a lookup store for credential resolution.
    pub fn app_config_store(&self) -> Arc<dyn AppConfigStore> {
        Arc::new(StaticAppConfigStore::new(self.app_configs.clone()))
    }
}

/// 🚰 Where records come from.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum SourceConfig {
    InMemory(InMemorySourceConfig),
    File(FileSourceConfig),
    ObjectScan(ObjectScanSourceConfig),
}

/// 🕳️ Where records go.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum SinkConfig {
    InMemory(InMemorySinkConfig),
    Stdout(StdoutSinkConfig),
    Object(ObjectSinkConfig),
    Parquet(ParquetSinkConfig),
}

/// ⚙️ Knobs for the pipeline itself rather than either end of it.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// 📬 Pages allowed in flight between the source and sink workers
    #[serde(default = "default_queue_capacity", alias = "channel_size")]
    pub queue_capacity: usize,
    /// ⏱️ Stop on our own after this many seconds. Omitted → run until the source runs
    /// dry or someone hits ctrl-c.
    #[serde(default)]
    pub run_for_secs: Option<u64>,
}

fn default_queue_capacity() -> usize {
    10
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            run_for_secs: None,
        }
    }
}

/// 🚀 Load the config from env vars (`COSX_*`) and, if given, a TOML file on top.
///
/// 📐 No file → env vars only. No silent fallback to some `config.toml` in the cwd.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("COSX_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (COSX_*). \
             The file exists in our hearts, but apparently not on disk. Or it does, and a key is off.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (COSX_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    config.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollover::TimePerObject;
    use std::io::Write;

    fn write_test_config(contents: &str) -> tempfile::NamedTempFile {
        let mut the_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        the_file.write_all(contents.as_bytes()).unwrap();
        the_file
    }

    #[test]
    fn the_one_where_a_bucket_to_bucket_run_parses_end_to_end() {
        let the_file = write_test_config(
            r#"
            [runtime]
            queue_capacity = 4
            run_for_secs = 60

            [source_config.ObjectScan]
            bucket = "incoming"
            endpoint = "s3.us-south.cloud-object-storage.appdomain.cloud"
            directory = "logs"
            pattern = '.*\.txt'

            [sink_config.Object]
            bucket = "archive"
            endpoint = "s3.us-south.cloud-object-storage.appdomain.cloud"
            object = "merged/part-%OBJECTNUM.txt"
            header = "line"
            time_per_object = 30
            credentials = { cos_hmac_keys = { access_key_id = "AK", secret_access_key = "SK" } }

            [app_configs.cos]
            "cos.creds" = '{"apikey": "k", "resource_instance_id": "crn:1"}'
            "#,
        );

        let the_config = load_config(Some(the_file.path())).unwrap();
        assert_eq!(the_config.runtime.queue_capacity, 4);
        assert_eq!(the_config.runtime.run_for_secs, Some(60));
        match &the_config.source_config {
            SourceConfig::ObjectScan(c) => {
                assert_eq!(c.storage.bucket, "incoming");
                assert_eq!(c.directory.as_deref(), Some("logs"));
                assert_eq!(c.pattern.as_deref(), Some(r".*\.txt"));
            }
            honestly_who_knows => panic!("💀 expected an ObjectScan source, got {:?}", honestly_who_knows),
        }
        match &the_config.sink_config {
            SinkConfig::Object(c) => {
                assert_eq!(c.storage.bucket, "archive");
                assert_eq!(c.header.as_deref(), Some("line"));
                assert_eq!(c.rollover.time_per_object, Some(TimePerObject::Seconds(30.0)));
                assert!(c.storage.credentials.as_ref().is_some_and(|v| v.is_object()));
            }
            honestly_who_knows => panic!("💀 expected an Object sink, got {:?}", honestly_who_knows),
        }
        assert!(the_config.app_config_store().properties("cos").is_some());
    }

    #[test]
    fn the_one_where_runtime_defaults_show_up_uninvited_but_helpful() {
        let the_file = write_test_config(
            r#"
            [source_config.File]
            file_name = "input.txt"

            [sink_config.Stdout]
            "#,
        );
        let the_config = load_config(Some(the_file.path())).unwrap();
        assert_eq!(the_config.runtime, RuntimeConfig::default());
        assert_eq!(the_config.runtime.queue_capacity, 10);
        assert!(the_config.app_configs.is_empty());
    }

    #[test]
    fn the_one_where_runtime_accepts_its_former_stage_name() {
        let the_file = write_test_config(
            r#"
            [runtime]
            channel_size = 12

            [source_config.InMemory]
            records = ["a", "b"]

            [sink_config.InMemory]
            "#,
        );
        let the_config = load_config(Some(the_file.path())).unwrap();
        assert_eq!(the_config.runtime.queue_capacity, 12);
    }

    #[test]
    fn the_one_where_a_parquet_sink_keeps_its_compression() {
        let the_file = write_test_config(
            r#"
            [source_config.InMemory]

            [sink_config.Parquet]
            bucket = "tables"
            endpoint = "cos.example"
            object = "t/%OBJECTNUM.parquet"
            compression = "gzip"
            tuples_per_object = 100
            "#,
        );
        let the_config = load_config(Some(the_file.path())).unwrap();
        match the_config.sink_config {
            SinkConfig::Parquet(c) => {
                assert_eq!(c.compression, crate::writer::ParquetCompression::Gzip);
                assert_eq!(c.rollover.tuples_per_object, Some(100));
            }
            honestly_who_knows => panic!("💀 expected a Parquet sink, got {:?}", honestly_who_knows),
        }
    }

    #[test]
    fn the_one_where_an_unknown_backend_is_a_loud_error() {
        let the_file = write_test_config(
            r#"
            [source_config.Carrier_Pigeon]
            coop = "roof"

            [sink_config.Stdout]
            "#,
        );
        let the_error = load_config(Some(the_file.path())).unwrap_err();
        assert!(the_error.to_string().contains("Failed to parse configuration"));
    }
}
