use std::{io, path::PathBuf};
use thiserror::Error;

/// Boxed cause carried by errors that originate in the NATS client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum KvError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Usage(String),

    #[error("specify either --creds or --nkey, not both")]
    ConflictingAuth,

    #[error("nkey seed {}: {reason}", path.display())]
    NkeySeed { path: PathBuf, reason: String },

    #[error("credentials file {}: {source}", path.display())]
    Credentials {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid server url {url:?}: {source}")]
    InvalidServer {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error("connect failed: {0}")]
    Connect(#[source] BoxError),

    #[error("jetstream unavailable: {0}")]
    JetStream(#[source] BoxError),

    #[error("bucket {bucket:?}: {source}")]
    Bucket {
        bucket: String,
        #[source]
        source: BoxError,
    },

    #[error("[{bucket}]: key not found: {key}")]
    KeyNotFound { bucket: String, key: String },

    #[error("put failed: {0}")]
    Put(#[source] BoxError),

    #[error("get failed: {0}")]
    Get(#[source] BoxError),

    #[error("history failed: {0}")]
    History(#[source] BoxError),

    #[error("flush failed: {0}")]
    Flush(#[source] BoxError),

    #[error("{0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, KvError>;
