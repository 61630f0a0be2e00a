// ai
//! 🪣 Cloud object storage backends — the reason this crate exists.
//!
//! 🎬 *[records go in the top. objects come out the bottom. on the other side of the bucket,
//! a scanner is already waiting for them.]*
//!
//! 🧠 Knowledge graph:
//! - `ObjectSink`: every record becomes a line in a text object via `ObjectWriter`.
//! - `ParquetSink`: every record becomes a row via `Row::from_line`, written by `ParquetWriter`.
//! - `ObjectScanSource`: an `ObjectScanner` task feeds keys into a channel, an `ObjectReader`
//!   turns each key into lines. Runs until cancelled.
//! - All three open their store through the pipeline's `Connector` using the flattened
//!   `ObjectStorageConfig` (bucket, endpoint, credentials, ...).
//! - Policy: upload failures are warned about and counted, never fatal. Schema mismatches,
//!   bad config and bad credentials stop the pipeline. 🦆

mod object_sink;
mod parquet_sink;
mod scan_source;

pub use object_sink::ObjectSinkConfig;
pub(crate) use object_sink::ObjectSink;
pub use parquet_sink::ParquetSinkConfig;
pub(crate) use parquet_sink::ParquetSink;
pub use scan_source::ObjectScanSourceConfig;
pub(crate) use scan_source::ObjectScanSource;
