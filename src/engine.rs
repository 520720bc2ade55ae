use std::fmt;
use tracing::info;

use crate::bucket::{Bucket, Entry, Operation};
use crate::cmd::{Command, Intent};
use crate::error::{KvError, Result};

/// Result of the primary operation, reported once the session is flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Put {
        bucket: String,
        key: String,
        value: String,
        revision: u64,
    },
    Get {
        bucket: String,
        key: String,
        value: String,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Put { bucket, key, value, .. } => {
                write!(f, "[{}]: Put [{}] in [{}]", bucket, value, key)
            }
            Outcome::Get { bucket, key, value } => {
                write!(f, "[{}]: Get [{}] returns [{}]", bucket, key, value)
            }
        }
    }
}

/// Runs the intent's single operation against `bucket`, then logs the key's
/// history when asked to.
pub async fn execute<B: Bucket + ?Sized>(bucket: &B, intent: &Intent) -> Result<Outcome> {
    let outcome = match &intent.command {
        Command::Put { value } => {
            let revision = bucket.put(&intent.key, value).await?;
            Outcome::Put {
                bucket: intent.bucket.clone(),
                key: intent.key.clone(),
                value: value.clone(),
                revision,
            }
        }
        Command::Get => {
            let entry = get(bucket, &intent.key).await?;
            Outcome::Get {
                bucket: intent.bucket.clone(),
                key: intent.key.clone(),
                value: entry.value_lossy(),
            }
        }
    };

    if intent.history {
        let entries = history(bucket, &intent.key).await?;
        info!("History [{}][{}]:", bucket.name(), intent.key);
        for entry in &entries {
            info!("{}", history_line(entry));
        }
    }

    Ok(outcome)
}

/// Latest live value of `key`; deleted and purged keys read as missing.
pub async fn get<B: Bucket + ?Sized>(bucket: &B, key: &str) -> Result<Entry> {
    match bucket.entry(key).await? {
        Some(entry) if entry.is_live() => Ok(entry),
        _ => Err(not_found(bucket, key)),
    }
}

/// All revisions of `key`, oldest first.
pub async fn history<B: Bucket + ?Sized>(bucket: &B, key: &str) -> Result<Vec<Entry>> {
    // The store's history stream only ends after delivering the key's last
    // message, so on a key with no messages it never finishes. Costs one
    // extra lookup per history call.
    if bucket.entry(key).await?.is_none() {
        return Err(not_found(bucket, key));
    }
    let entries = bucket.history(key).await?;
    if entries.is_empty() {
        return Err(not_found(bucket, key));
    }
    Ok(entries)
}

pub fn history_line(entry: &Entry) -> String {
    match entry.operation {
        Operation::Put => format!("[{}][{}]", entry.created, entry.value_lossy()),
        op => format!("[{}][{}] {}", entry.created, entry.value_lossy(), op),
    }
}

fn not_found<B: Bucket + ?Sized>(bucket: &B, key: &str) -> KvError {
    KvError::KeyNotFound {
        bucket: bucket.name().to_string(),
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBucket;

    fn intent(key: &str, command: Command, history: bool) -> Intent {
        Intent {
            bucket: "b".into(),
            key: key.into(),
            command,
            history,
        }
    }

    fn put(key: &str, value: &str) -> Intent {
        intent(key, Command::Put { value: value.into() }, false)
    }

    #[tokio::test]
    async fn put_then_get() {
        let bucket = MemoryBucket::new("b");

        let outcome = execute(&bucket, &put("k", "v")).await.unwrap();
        assert_eq!(outcome.to_string(), "[b]: Put [v] in [k]");

        let outcome = execute(&bucket, &intent("k", Command::Get, false)).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Get {
                bucket: "b".into(),
                key: "k".into(),
                value: "v".into(),
            }
        );
        assert_eq!(outcome.to_string(), "[b]: Get [k] returns [v]");
    }

    #[tokio::test]
    async fn get_reads_latest_revision() {
        let bucket = MemoryBucket::new("b");
        execute(&bucket, &put("k", "old")).await.unwrap();
        execute(&bucket, &put("k", "new")).await.unwrap();

        let entry = get(&bucket, "k").await.unwrap();
        assert_eq!(entry.value_lossy(), "new");
        assert_eq!(entry.revision, 2);
    }

    #[tokio::test]
    async fn get_missing_key() {
        let bucket = MemoryBucket::new("b");
        let err = execute(&bucket, &intent("nope", Command::Get, false))
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::KeyNotFound { ref key, .. } if key == "nope"));
        assert!(err.to_string().contains("key not found"));
    }

    #[tokio::test]
    async fn get_deleted_key() {
        let bucket = MemoryBucket::new("b");
        execute(&bucket, &put("k", "v")).await.unwrap();
        bucket.delete("k");
        assert!(matches!(
            get(&bucket, "k").await,
            Err(KvError::KeyNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn history_keeps_write_order() {
        let bucket = MemoryBucket::new("b");
        let values = ["v1", "v2", "v3", "v4"];
        for value in values {
            execute(&bucket, &put("k", value)).await.unwrap();
        }

        let outcome = execute(&bucket, &intent("k", Command::Get, true)).await.unwrap();
        assert_eq!(outcome.to_string(), "[b]: Get [k] returns [v4]");

        let entries = history(&bucket, "k").await.unwrap();
        let seen: Vec<_> = entries.iter().map(Entry::value_lossy).collect();
        assert_eq!(seen, values);
        assert!(entries.windows(2).all(|w| w[0].revision < w[1].revision));
    }

    #[tokio::test]
    async fn history_with_put() {
        let bucket = MemoryBucket::new("b");
        let mut with_history = put("k", "v");
        with_history.history = true;
        execute(&bucket, &with_history).await.unwrap();
        assert_eq!(history(&bucket, "k").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_of_missing_key() {
        let bucket = MemoryBucket::new("b");
        assert!(matches!(
            history(&bucket, "k").await,
            Err(KvError::KeyNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn history_line_marks_deletes() {
        let bucket = MemoryBucket::new("b");
        execute(&bucket, &put("k", "v")).await.unwrap();
        bucket.delete("k");

        let entries = history(&bucket, "k").await.unwrap();
        assert!(history_line(&entries[0]).ends_with("[v]"));
        assert!(history_line(&entries[1]).ends_with("[] DEL"));
    }
}
