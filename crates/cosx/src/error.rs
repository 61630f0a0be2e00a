// ai
//! 💀 Errors — the five flavors of "it didn't work", each with its own retry policy.
//!
//! 🧠 Knowledge graph:
//! - `ConfigurationError`: bad template, bad duration, wrong type, bad regex. Fatal at construction.
//! - `CredentialError`: malformed JSON, unknown app config, IAM said no. Fatal at construction.
//! - `UploadError` / `FetchError`: transient. Surfaced per operation. Buffered data survives.
//! - `SchemaMismatchError`: the parquet columns were decided by row one. Row two disagreed.
//! - `WriteError` / `ConnectError`: thin wrappers so one call site can return either kind.
//!
//! The pipeline glue speaks `anyhow`. Library calls speak these. Translation happens at
//! the sink/source boundary with `.context(...)`, same as everywhere else in this crate. 🦆

use thiserror::Error;

/// 🔧 Configuration rejected at construction time. Never retried. Fix the config.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("object name template '{template}' must contain {placeholder} exactly once, found it {found} time(s)")]
    InvalidTemplate {
        template: String,
        placeholder: &'static str,
        found: usize,
    },

    #[error("time_per_object of {given} is below the one second minimum granularity")]
    UnsupportedGranularity { given: String },

    #[error("time_per_object must be a number of seconds or a duration, got {found}")]
    WrongType { found: String },

    #[error("only one rollover policy may be set per writer, got: {given}")]
    ConflictingRollover { given: String },

    #[error("{parameter} must be greater than zero")]
    ZeroThreshold { parameter: &'static str },

    #[error("pattern '{pattern}' is not a valid regular expression: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("endpoint '{endpoint}' is not usable: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("{parameter} is required and may not be empty")]
    MissingParameter { parameter: &'static str },
}

/// 🔒 Credentials that could not be turned into an access context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CredentialError {
    #[error("credentials are malformed: {0}")]
    Malformed(String),

    #[error("application configuration '{0}' was not found")]
    NotFound(String),

    #[error("IAM token exchange failed: {0}")]
    TokenExchange(String),
}

/// 📤 An object could not be uploaded. The buffer that produced it is still intact.
#[derive(Error, Debug)]
#[error("upload of '{key}' failed: {source}")]
pub struct UploadError {
    pub key: String,
    #[source]
    pub source: object_store::Error,
}

/// 📥 An object could not be fetched or decoded.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Recoverable miss: the key vanished between scan and read.
    #[error("object '{0}' does not exist")]
    NotFound(String),

    #[error("fetching '{key}' failed: {source}")]
    Store {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("decoding '{key}' failed: {source}")]
    Decode {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub(crate) fn from_store(key: &str, source: object_store::Error) -> Self {
        match source {
            object_store::Error::NotFound { .. } => FetchError::NotFound(key.to_string()),
            other => FetchError::Store {
                key: key.to_string(),
                source: other,
            },
        }
    }

    /// ✅ True for the "it was here a second ago" case. Callers skip and move on.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}

/// 🧱 A row whose shape disagrees with the schema fixed by the first row.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("row does not match the established schema: {reason}")]
pub struct SchemaMismatchError {
    pub reason: String,
}

/// ✍️ Anything a writer can fail with after construction.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatchError),

    #[error("encoding object body failed: {0}")]
    Encode(String),
}

/// 🔌 Failures while opening a connection to the object store.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("building the object store client failed: {0}")]
    Store(#[from] object_store::Error),
}
