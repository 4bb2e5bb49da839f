use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),
}

/// Failures talking to the WordPress XML-RPC endpoint. All of these are
/// fatal to a run.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed XML-RPC response: {0}")]
    Xml(String),

    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("unexpected post shape: {0}")]
    Post(String),

    #[error("client used before login")]
    NotLoggedIn,
}

impl From<quick_xml::Error> for ApiError {
    fn from(e: quick_xml::Error) -> Self {
        ApiError::Xml(e.to_string())
    }
}

/// Failure fetching a single image. Tolerated: logged and skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP Error {status}: {reason}")]
    Status { status: u16, reason: String },
}

/// Failures that abort the materialization of one post.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unicode failure: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot {path} has version {found}, expected {expected}")]
    SnapshotVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("snapshot {path}: bad image data for {filename}")]
    SnapshotImage { path: PathBuf, filename: String },
}

impl ArchiveError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArchiveError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
