// ai
//! 🎬 *[two configs walk into a struct. one sizes pages. one decides when objects roll over.]*
//!
//! 📦 **Common Backend Configs** — the shared DNA of source and sink configuration.
//!
//! 🧠 Knowledge graph:
//! - `CommonSourceConfig`: embedded in every source config. How big a page do we pour
//!   into the channel, in records and in bytes?
//! - `RolloverConfig`: flattened into both object sinks. The three optional rollover knobs
//!   exactly as they appear in TOML, turned into one `RolloverPolicy` by `to_policy`.
//! - Both are re-exported from `backends.rs`. 🦆

use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::rollover::{RolloverPolicy, TimePerObject};

/// 📦 Page sizing shared by every source backend.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CommonSourceConfig {
    /// 📦 Max records per page
    #[serde(default = "default_max_batch_size_docs")]
    pub max_batch_size_docs: usize,
    /// 📦 Max payload bytes per page
    #[serde(default = "default_max_batch_size_bytes")]
    pub max_batch_size_bytes: usize,
}

fn default_max_batch_size_docs() -> usize {
    1000
}

// -- 1 MiB. records are lines, lines are small, usually
fn default_max_batch_size_bytes() -> usize {
    1024 * 1024
}

impl Default for CommonSourceConfig {
    fn default() -> Self {
        Self {
            max_batch_size_docs: default_max_batch_size_docs(),
            max_batch_size_bytes: default_max_batch_size_bytes(),
        }
    }
}

/// ⏱️ The rollover knobs as written in config. At most one may be set.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct RolloverConfig {
    #[serde(default)]
    pub tuples_per_object: Option<usize>,
    #[serde(default)]
    pub time_per_object: Option<TimePerObject>,
    #[serde(default)]
    pub bytes_per_object: Option<usize>,
}

impl RolloverConfig {
    pub fn to_policy(&self) -> Result<RolloverPolicy, ConfigurationError> {
        RolloverPolicy::from_params(
            self.tuples_per_object,
            self.time_per_object.as_ref(),
            self.bytes_per_object,
        )
    }
}
