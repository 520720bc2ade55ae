//! Key-value bucket handles.
//!
//! The executor talks to a bucket only through [`Bucket`]; [`NatsBucket`]
//! wraps a JetStream key-value store; the in-process bucket used by the
//! tests lives in `memory`.

use async_nats::jetstream::kv;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use std::fmt;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::{KvError, Result};

/// What produced a revision of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Put,
    Delete,
    Purge,
}

impl From<kv::Operation> for Operation {
    fn from(op: kv::Operation) -> Self {
        match op {
            kv::Operation::Put => Operation::Put,
            kv::Operation::Delete => Operation::Delete,
            kv::Operation::Purge => Operation::Purge,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Put => write!(f, "PUT"),
            Operation::Delete => write!(f, "DEL"),
            Operation::Purge => write!(f, "PURGE"),
        }
    }
}

/// One revision of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: Bytes,
    pub revision: u64,
    pub created: OffsetDateTime,
    pub operation: Operation,
}

impl Entry {
    /// The value as text, with invalid UTF-8 replaced.
    pub fn value_lossy(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// Delete and purge markers carry no value.
    pub fn is_live(&self) -> bool {
        self.operation == Operation::Put
    }
}

impl From<kv::Entry> for Entry {
    fn from(entry: kv::Entry) -> Self {
        Entry {
            key: entry.key,
            value: entry.value,
            revision: entry.revision,
            created: entry.created,
            operation: entry.operation.into(),
        }
    }
}

#[async_trait]
pub trait Bucket: Send + Sync {
    fn name(&self) -> &str;

    /// Writes `value` as a new revision of `key`, returning the revision.
    async fn put(&self, key: &str, value: &str) -> Result<u64>;

    /// Latest entry of `key`, or `None` when the key was never written.
    async fn entry(&self, key: &str) -> Result<Option<Entry>>;

    /// Every retained revision of `key`, oldest first.
    async fn history(&self, key: &str) -> Result<Vec<Entry>>;
}

/// A JetStream key-value store.
pub struct NatsBucket {
    store: kv::Store,
}

impl NatsBucket {
    pub fn new(store: kv::Store) -> Self {
        NatsBucket { store }
    }
}

#[async_trait]
impl Bucket for NatsBucket {
    fn name(&self) -> &str {
        &self.store.name
    }

    async fn put(&self, key: &str, value: &str) -> Result<u64> {
        let revision = self
            .store
            .put(key, Bytes::copy_from_slice(value.as_bytes()))
            .await
            .map_err(|e| KvError::Put(e.into()))?;
        debug!(bucket = %self.store.name, key, revision, "put");
        Ok(revision)
    }

    async fn entry(&self, key: &str) -> Result<Option<Entry>> {
        let entry = self
            .store
            .entry(key)
            .await
            .map_err(|e| KvError::Get(e.into()))?;
        Ok(entry.map(Entry::from))
    }

    async fn history(&self, key: &str) -> Result<Vec<Entry>> {
        let history = self
            .store
            .history(key)
            .await
            .map_err(|e| KvError::History(e.into()))?;
        history
            .map_ok(Entry::from)
            .try_collect()
            .await
            .map_err(|e| KvError::History(e.into()))
    }
}
