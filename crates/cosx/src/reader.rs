// ai
//! 📖 Object reader — fetch one object, hand back its lines, one record at a time.
//!
//! 🧠 Knowledge graph:
//! - Plain objects stream: `GetResult::into_stream()` → `StreamReader` → `BufReader::read_line()`.
//!   Same read loop as the file source, different origin. Memory stays flat for big objects.
//! - `.gz` keys are fetched whole, gunzipped, and split with `memchr`. Gzip is not seekable
//!   and our objects are rollover-sized, so whole-object is fine.
//! - `\n` and `\r\n` both end a record. A missing final newline does not lose the last line.
//! - A key that vanished between scan and read is `FetchError::NotFound`. Log it, skip it,
//!   carry on. Same if it vanishes halfway through the stream: the store's NotFound comes back
//!   wrapped in an `io::Error`, and gets unwrapped again. Everything else is
//!   `FetchError::Store` or `FetchError::Decode`.

use std::io::{self, Read};
use std::sync::Arc;

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;
use tracing::trace;

use crate::error::FetchError;

type BodyReader = BufReader<StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>>;

/// 📖 Opens objects for line-by-line reading.
#[derive(Debug, Clone)]
pub struct ObjectReader {
    store: Arc<dyn ObjectStore>,
}

impl ObjectReader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// 📥 Fetch `key`. The body is streamed lazily by the returned `ObjectLines`.
    pub async fn read(&self, key: &str) -> Result<ObjectLines, FetchError> {
        let location = ObjectPath::from(key);
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| FetchError::from_store(key, e))?;

        if key.ends_with(".gz") {
            let compressed = result
                .bytes()
                .await
                .map_err(|e| FetchError::from_store(key, e))?;
            let mut plain = Vec::with_capacity(compressed.len() * 4);
            MultiGzDecoder::new(&compressed[..])
                .read_to_end(&mut plain)
                .map_err(|source| FetchError::Decode {
                    key: key.to_string(),
                    source,
                })?;
            trace!("📖 gunzipped '{}' into {} bytes", key, plain.len());
            return Ok(ObjectLines {
                key: key.to_string(),
                body: Body::Buffered {
                    bytes: Bytes::from(plain),
                    pos: 0,
                },
                records: 0,
            });
        }

        let stream = result.into_stream().map_err(io::Error::other).boxed();
        Ok(ObjectLines {
            key: key.to_string(),
            body: Body::Streaming {
                reader: BufReader::new(StreamReader::new(stream)),
                line: String::new(),
            },
            records: 0,
        })
    }
}

enum Body {
    Streaming { reader: BodyReader, line: String },
    Buffered { bytes: Bytes, pos: usize },
}

/// 📜 The records of one object, in order.
pub struct ObjectLines {
    key: String,
    body: Body,
    records: u64,
}

impl std::fmt::Debug for ObjectLines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectLines")
            .field("key", &self.key)
            .field("records", &self.records)
            .finish()
    }
}

/// 🔍 Body read errors arrive as `io::Error`. A store NotFound inside one is still a
/// vanished object, not a decoding problem.
fn from_body_error(key: &str, source: io::Error) -> FetchError {
    let vanished = source
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<object_store::Error>())
        .is_some_and(|e| matches!(e, object_store::Error::NotFound { .. }));
    if vanished {
        FetchError::NotFound(key.to_string())
    } else {
        FetchError::Decode {
            key: key.to_string(),
            source,
        }
    }
}

fn trim_line_ending(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}

impl ObjectLines {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 🔢 Records handed out so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// 📄 The next record without its line ending, or `None` at the end of the object.
    pub async fn next_record(&mut self) -> Result<Option<String>, FetchError> {
        let record = match &mut self.body {
            Body::Streaming { reader, line } => {
                line.clear();
                let read = reader
                    .read_line(line)
                    .await
                    .map_err(|source| from_body_error(&self.key, source))?;
                if read == 0 {
                    return Ok(None);
                }
                trim_line_ending(line);
                std::mem::take(line)
            }
            Body::Buffered { bytes, pos } => {
                if *pos >= bytes.len() {
                    return Ok(None);
                }
                let rest = &bytes[*pos..];
                let (raw, advance) = match memchr::memchr(b'\n', rest) {
                    Some(i) => (&rest[..i], i + 1),
                    None => (rest, rest.len()),
                };
                *pos += advance;
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                String::from_utf8(raw.to_vec()).map_err(|e| FetchError::Decode {
                    key: self.key.clone(),
                    source: io::Error::new(io::ErrorKind::InvalidData, e),
                })?
            }
        };
        self.records += 1;
        Ok(Some(record))
    }

    /// 🧺 Drain every remaining record.
    pub async fn collect_records(mut self) -> Result<Vec<String>, FetchError> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use object_store::PutPayload;
    use object_store::memory::InMemory;
    use std::io::Write;

    async fn store_with(key: &str, body: Vec<u8>) -> Arc<InMemory> {
        let the_store = Arc::new(InMemory::new());
        the_store
            .put(&ObjectPath::from(key), PutPayload::from(body))
            .await
            .unwrap();
        the_store
    }

    #[tokio::test]
    async fn the_one_where_every_line_is_a_record_in_order() {
        let the_store = store_with("sample/hw0.txt", b"Hello\r\nWorld!\nno newline".to_vec()).await;
        let the_reader = ObjectReader::new(the_store);
        let mut the_lines = the_reader.read("sample/hw0.txt").await.unwrap();
        assert_eq!(the_lines.next_record().await.unwrap().as_deref(), Some("Hello"));
        assert_eq!(the_lines.next_record().await.unwrap().as_deref(), Some("World!"));
        assert_eq!(the_lines.next_record().await.unwrap().as_deref(), Some("no newline"));
        assert_eq!(the_lines.next_record().await.unwrap(), None);
        assert_eq!(the_lines.records_read(), 3);
    }

    #[tokio::test]
    async fn the_one_where_empty_lines_in_the_middle_still_count() {
        let the_store = store_with("e.txt", b"a\n\nb\n".to_vec()).await;
        let the_records = ObjectReader::new(the_store)
            .read("e.txt")
            .await
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(the_records, vec!["a", "", "b"]);
    }

    #[tokio::test]
    async fn the_one_where_a_missing_key_is_a_recoverable_not_found() {
        let the_reader = ObjectReader::new(Arc::new(InMemory::new()));
        let the_error = the_reader.read("sample/ghost.txt").await.unwrap_err();
        assert!(the_error.is_not_found());
    }

    #[test]
    fn the_one_where_an_object_vanishing_mid_stream_is_still_not_found() {
        let the_gone = io::Error::other(object_store::Error::NotFound {
            path: "sample/half.txt".to_string(),
            source: "deleted while we were reading".into(),
        });
        assert!(from_body_error("sample/half.txt", the_gone).is_not_found());

        let the_garbage = io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8");
        assert!(matches!(
            from_body_error("sample/half.txt", the_garbage),
            FetchError::Decode { .. }
        ));
    }

    #[tokio::test]
    async fn the_one_where_gz_objects_get_gunzipped_first() {
        let mut the_gz = GzEncoder::new(Vec::new(), Compression::default());
        the_gz.write_all(b"HEADER\nrow 1\r\nrow 2\n").unwrap();
        let the_store = store_with("z/part0.txt.gz", the_gz.finish().unwrap()).await;

        let the_records = ObjectReader::new(the_store)
            .read("z/part0.txt.gz")
            .await
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(the_records, vec!["HEADER", "row 1", "row 2"]);
    }

    #[tokio::test]
    async fn the_one_where_garbage_with_a_gz_suffix_is_a_decode_error() {
        let the_store = store_with("bad.gz", b"definitely not gzip".to_vec()).await;
        let the_error = ObjectReader::new(the_store).read("bad.gz").await.unwrap_err();
        assert!(matches!(the_error, FetchError::Decode { .. }));
    }
}
