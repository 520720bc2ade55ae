use async_trait::async_trait;
use bytes::Bytes;
use std::{collections::HashMap, sync::Mutex};
use time::OffsetDateTime;

use crate::bucket::{Bucket, Entry, Operation};
use crate::error::Result;

/// An in-process versioned bucket.
///
/// Revisions are numbered per bucket starting at 1, like a JetStream stream
/// sequence, and every revision of every key is retained.
pub struct MemoryBucket {
    name: String,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    revisions: HashMap<String, Vec<Entry>>, // key → revisions, oldest first
    last_revision: u64,
}

impl MemoryBucket {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryBucket {
            name: name.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Records a delete marker for `key`.
    pub fn delete(&self, key: &str) -> u64 {
        self.append(key, Bytes::new(), Operation::Delete)
    }

    fn append(&self, key: &str, value: Bytes, operation: Operation) -> u64 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.last_revision += 1;
        let revision = inner.last_revision;
        inner.revisions.entry(key.to_string()).or_default().push(Entry {
            key: key.to_string(),
            value,
            revision,
            created: OffsetDateTime::now_utc(),
            operation,
        });
        revision
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &str, value: &str) -> Result<u64> {
        Ok(self.append(key, Bytes::copy_from_slice(value.as_bytes()), Operation::Put))
    }

    async fn entry(&self, key: &str) -> Result<Option<Entry>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.revisions.get(key).and_then(|r| r.last()).cloned())
    }

    async fn history(&self, key: &str) -> Result<Vec<Entry>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.revisions.get(key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn revisions_are_bucket_wide() {
        let bucket = MemoryBucket::new("b");
        assert_eq!(bucket.put("a", "1").await.unwrap(), 1);
        assert_eq!(bucket.put("b", "2").await.unwrap(), 2);
        assert_eq!(bucket.put("a", "3").await.unwrap(), 3);

        let latest = bucket.entry("a").await.unwrap().unwrap();
        assert_eq!(latest.revision, 3);
        assert_eq!(latest.value_lossy(), "3");
        assert_eq!(bucket.history("a").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_leaves_a_marker() {
        let bucket = MemoryBucket::new("b");
        bucket.put("a", "1").await.unwrap();
        bucket.delete("a");

        let latest = bucket.entry("a").await.unwrap().unwrap();
        assert!(!latest.is_live());
        assert_eq!(latest.operation, Operation::Delete);
        assert!(bucket.entry("missing").await.unwrap().is_none());
    }
}
