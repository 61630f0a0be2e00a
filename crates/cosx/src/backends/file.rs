// ai
//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The file didn't exist. The disk was full. The metadata lied about the size.
//! And somewhere in a BufReader, a line was growing to 1MB because someone forgot a newline.
//!
//! This module reads a local file line by line, respecting page limits in records AND bytes,
//! and feeds the lines to whatever sink is waiting. Local file → bucket is the classic upload.
//!
//! 🚰 File → BufReader → LineBatch → channel → SinkWorker → sink
//! 🦆 (mandatory, no notes)

mod file_source;

pub use file_source::FileSourceConfig;
pub(crate) use file_source::FileSource;
