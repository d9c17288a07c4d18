//! Disk-backed entry store.
//!
//! Each cached key is stored as up to two files in one directory:
//!
//! - `<digest>.json`: the [`CacheRecord`] without binary data
//! - `<digest>_blob.bin`: the screenshot bytes, when present
//!
//! `<digest>` is [`entry_digest`] of the key. Unreadable or undecodable
//! records are deleted on read and reported as absent.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use serde::Deserialize;
use tokio::fs;

use super::hash::entry_digest;
use super::payload::CacheRecord;
use crate::Error;

const PRIMARY_SUFFIX: &str = ".json";
const BLOB_SUFFIX: &str = "_blob.bin";

/// Just enough of a primary file to recover its key.
#[derive(Deserialize)]
struct RecordHeader {
    url: String,
}

/// Durable key to record mapping on local disk.
#[derive(Debug, Clone)]
pub struct EntryStore {
    dir: PathBuf,
}

impl EntryStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| Error::StorageWrite { path: dir.clone(), source })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the JSON primary file for `key`.
    pub fn primary_path(&self, key: &str) -> PathBuf {
        self.primary_path_for(&entry_digest(key))
    }

    /// Path of the binary side-file for `key`.
    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.blob_path_for(&entry_digest(key))
    }

    fn primary_path_for(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}{PRIMARY_SUFFIX}"))
    }

    fn blob_path_for(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}{BLOB_SUFFIX}"))
    }

    /// Persist a record, moving its screenshot to the side-file.
    ///
    /// The blob is written before the primary file so a primary file with
    /// `has_screenshot` never points at a blob that was not written.
    pub async fn write(&self, record: &CacheRecord) -> Result<(), Error> {
        let (payload, blob) = record.result.externalize();
        let primary = self.primary_path(&record.url);
        let blob_path = self.blob_path(&record.url);

        match blob {
            Some(bytes) => fs::write(&blob_path, &bytes)
                .await
                .map_err(|source| Error::StorageWrite { path: blob_path.clone(), source })?,
            None => remove_if_exists(&blob_path).await?,
        }

        let disk = CacheRecord {
            url: record.url.clone(),
            timestamp: record.timestamp,
            result: payload,
            content_hash: record.content_hash.clone(),
        };
        let json = serde_json::to_vec_pretty(&disk).map_err(|e| Error::Serialize(e.to_string()))?;

        fs::write(&primary, json)
            .await
            .map_err(|source| Error::StorageWrite { path: primary.clone(), source })?;

        tracing::trace!(key = %record.url, path = %primary.display(), "wrote cache record");
        Ok(())
    }

    /// Read the record for `key`.
    ///
    /// Returns `None` if the entry does not exist or is corrupt; corrupt
    /// entries are removed from disk.
    pub async fn read(&self, key: &str) -> Option<CacheRecord> {
        let stem = entry_digest(key);
        let record = self.read_stem(&stem).await?;
        if record.url != key {
            tracing::warn!(key, stored = %record.url, "cache record key mismatch, discarding");
            self.discard(&stem).await;
            return None;
        }
        Some(record)
    }

    async fn read_stem(&self, stem: &str) -> Option<CacheRecord> {
        let primary = self.primary_path_for(stem);
        let bytes = match fs::read(&primary).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %primary.display(), error = %e, "failed to read cache record");
                return None;
            }
        };

        match self.decode(stem, &bytes).await {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(error = %err, "discarding corrupt cache record");
                self.discard(stem).await;
                None
            }
        }
    }

    async fn decode(&self, stem: &str, bytes: &[u8]) -> Result<CacheRecord, Error> {
        let primary = self.primary_path_for(stem);
        let mut record: CacheRecord = serde_json::from_slice(bytes)
            .map_err(|e| Error::StorageRead { path: primary.clone(), reason: e.to_string() })?;

        if record.result.has_screenshot {
            let blob_path = self.blob_path_for(stem);
            let blob = fs::read(&blob_path)
                .await
                .map_err(|e| Error::StorageRead { path: blob_path, reason: e.to_string() })?;
            record.result.reinstate(Bytes::from(blob));
        }

        Ok(record)
    }

    /// Best-effort removal of both files for a corrupt entry.
    async fn discard(&self, stem: &str) {
        for path in [self.primary_path_for(stem), self.blob_path_for(stem)] {
            if let Err(e) = remove_if_exists(&path).await {
                tracing::warn!(error = %e, "failed to remove corrupt cache file");
            }
        }
    }

    /// Remove both files for `key`. Missing files are not an error.
    pub async fn delete(&self, key: &str) -> Result<(), Error> {
        remove_if_exists(&self.primary_path(key)).await?;
        remove_if_exists(&self.blob_path(key)).await
    }

    /// Keys of the `limit` most recently modified entries, newest first.
    ///
    /// Corrupt primary files encountered here are removed and skipped.
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<String>, Error> {
        let mut candidates: Vec<(SystemTime, String)> = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::StorageRead { path: self.dir.clone(), reason: e.to_string() })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::StorageRead { path: self.dir.clone(), reason: e.to_string() })?
        {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(PRIMARY_SUFFIX)) else {
                continue;
            };
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::debug!(file = %entry.path().display(), error = %e, "skipping unreadable cache file");
                    continue;
                }
            };
            candidates.push((modified, stem.to_string()));
        }

        candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        candidates.truncate(limit);

        let mut keys = Vec::with_capacity(candidates.len());
        for (_, stem) in candidates {
            let primary = self.primary_path_for(&stem);
            let header = match fs::read(&primary).await {
                Ok(bytes) => serde_json::from_slice::<RecordHeader>(&bytes),
                Err(e) => {
                    tracing::debug!(path = %primary.display(), error = %e, "cache file vanished during listing");
                    continue;
                }
            };
            match header {
                Ok(header) => keys.push(header.url),
                Err(e) => {
                    tracing::warn!(path = %primary.display(), error = %e, "discarding corrupt cache record");
                    self.discard(&stem).await;
                }
            }
        }

        Ok(keys)
    }

    /// Remove every primary and side-file managed by this store.
    ///
    /// Returns the number of files removed.
    pub async fn clear_all(&self) -> Result<usize, Error> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::StorageRead { path: self.dir.clone(), reason: e.to_string() })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::StorageRead { path: self.dir.clone(), reason: e.to_string() })?
        {
            let name = entry.file_name();
            let managed = name
                .to_str()
                .is_some_and(|n| n.ends_with(PRIMARY_SUFFIX) || n.ends_with(BLOB_SUFFIX));
            if managed {
                remove_if_exists(&entry.path()).await?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::StorageWrite { path: path.to_path_buf(), source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::payload::AnalysisPayload;
    use chrono::Utc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn record(key: &str, screenshot: Option<&'static [u8]>) -> CacheRecord {
        let mut payload = AnalysisPayload::new(key, format!("summary of {key}"));
        payload.title = Some("Title".to_string());
        payload.screenshot = screenshot.map(Bytes::from_static);
        CacheRecord::new(key, Utc::now(), payload, None)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::open(dir.path()).await.unwrap();

        store.write(&record("https://example.com", None)).await.unwrap();

        let read = store.read("https://example.com").await.unwrap();
        assert_eq!(read.url, "https://example.com");
        assert_eq!(read.result.result, "summary of https://example.com");
        assert!(read.result.screenshot.is_none());
        assert!(!store.blob_path("https://example.com").exists());
    }

    #[tokio::test]
    async fn test_blob_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::open(dir.path()).await.unwrap();
        let bytes: &'static [u8] = b"\x89PNG\r\n\x1a\n\x00\x00binary";

        store.write(&record("https://example.com/shot", Some(bytes))).await.unwrap();

        let primary = std::fs::read_to_string(store.primary_path("https://example.com/shot")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&primary).unwrap();
        assert!(json["result"].get("screenshot").is_none());
        assert_eq!(json["result"]["has_screenshot"], serde_json::Value::Bool(true));

        let read = store.read("https://example.com/shot").await.unwrap();
        assert_eq!(read.result.screenshot.as_deref(), Some(bytes));
        assert!(!read.result.has_screenshot);
    }

    #[tokio::test]
    async fn test_rewrite_without_blob_removes_stale_blob() {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::open(dir.path()).await.unwrap();

        store.write(&record("https://example.com", Some(b"old"))).await.unwrap();
        store.write(&record("https://example.com", None)).await.unwrap();

        assert!(!store.blob_path("https://example.com").exists());
        assert!(store.read("https://example.com").await.unwrap().result.screenshot.is_none());
    }

    #[tokio::test]
    async fn test_read_missing() {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::open(dir.path()).await.unwrap();
        assert!(store.read("https://nothing.example").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_deleted() {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::open(dir.path()).await.unwrap();
        let key = "https://example.com/corrupt";
        std::fs::write(store.primary_path(key), b"{not json at all").unwrap();
        std::fs::write(store.blob_path(key), b"orphan").unwrap();

        assert!(store.read(key).await.is_none());
        assert!(!store.primary_path(key).exists());
        assert!(!store.blob_path(key).exists());
    }

    #[tokio::test]
    async fn test_missing_fields_treated_as_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::open(dir.path()).await.unwrap();
        let key = "https://example.com/partial";
        std::fs::write(store.primary_path(key), br#"{"url": "https://example.com/partial"}"#).unwrap();

        assert!(store.read(key).await.is_none());
        assert!(!store.primary_path(key).exists());
    }

    #[tokio::test]
    async fn test_missing_blob_treated_as_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::open(dir.path()).await.unwrap();
        let key = "https://example.com/shot";
        store.write(&record(key, Some(b"bytes"))).await.unwrap();
        std::fs::remove_file(store.blob_path(key)).unwrap();

        assert!(store.read(key).await.is_none());
        assert!(!store.primary_path(key).exists());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::open(dir.path()).await.unwrap();
        let key = "https://example.com";
        store.write(&record(key, Some(b"bytes"))).await.unwrap();

        store.delete(key).await.unwrap();
        assert!(!store.primary_path(key).exists());
        assert!(!store.blob_path(key).exists());

        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::open(dir.path()).await.unwrap();

        for key in ["https://a.example", "https://b.example", "https://c.example"] {
            store.write(&record(key, None)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let keys = store.list_recent(2).await.unwrap();
        assert_eq!(keys, vec!["https://c.example".to_string(), "https://b.example".to_string()]);

        let all = store.list_recent(10).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_list_recent_skips_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::open(dir.path()).await.unwrap();
        store.write(&record("https://a.example", None)).await.unwrap();
        let bad = dir.path().join("deadbeef.json");
        std::fs::write(&bad, b"garbage").unwrap();

        let keys = store.list_recent(10).await.unwrap();
        assert_eq!(keys, vec!["https://a.example".to_string()]);
        assert!(!bad.exists());
    }

    #[tokio::test]
    async fn test_clear_all_only_removes_managed_files() {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::open(dir.path()).await.unwrap();
        store.write(&record("https://a.example", Some(b"bytes"))).await.unwrap();
        store.write(&record("https://b.example", None)).await.unwrap();
        let unrelated = dir.path().join("notes.txt");
        std::fs::write(&unrelated, b"keep me").unwrap();

        let removed = store.clear_all().await.unwrap();
        assert_eq!(removed, 3);
        assert!(unrelated.exists());
        assert!(store.list_recent(10).await.unwrap().is_empty());
    }
}
