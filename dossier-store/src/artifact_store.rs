use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use dossier_core::storage::ArtifactStore;
use dossier_core::BoxError;

use crate::app_config::{StorageConfig, StorageMode};

/// Builds the artifact store selected by configuration. Credentials and
/// keys come in as plain config fields; no lazy global initialization.
pub fn from_config(cfg: &StorageConfig, base_url: &str) -> Arc<dyn ArtifactStore> {
    match cfg.mode {
        StorageMode::Local => Arc::new(LocalArtifactStore::new(&cfg.local_dir, base_url)),
        StorageMode::Remote => Arc::new(SignedArtifactStore::new(
            &cfg.local_dir,
            base_url,
            &cfg.signing_key,
            Duration::seconds(cfg.url_ttl_seconds as i64),
        )),
    }
}

async fn write_blob(dir: &Path, key: &str, bytes: &[u8]) -> Result<(), BoxError> {
    let path = dir.join(key);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&path, bytes).await?;
    Ok(())
}

/// Dev-mode store: blobs land in a local directory served statically
/// under `/storage`, URLs are plain and unexpiring.
pub struct LocalArtifactStore {
    dir: PathBuf,
    base_url: String,
}

impl LocalArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String, BoxError> {
        write_blob(&self.dir, key, bytes).await?;
        tracing::debug!(key, size = bytes.len(), "artifact stored locally");
        Ok(format!("{}/storage/{}", self.base_url, key))
    }
}

/// Production-mode store: issues signed, time-limited read URLs
/// (7-day default expiry).
pub struct SignedArtifactStore {
    dir: PathBuf,
    base_url: String,
    signing_key: String,
    url_ttl: Duration,
}

impl SignedArtifactStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        base_url: &str,
        signing_key: &str,
        url_ttl: Duration,
    ) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            signing_key: signing_key.to_string(),
            url_ttl,
        }
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.signing_key.as_bytes());
        hasher
            .finalize()
            .iter()
            .fold(String::with_capacity(64), |mut s, b| {
                use std::fmt::Write;
                let _ = write!(s, "{b:02x}");
                s
            })
    }

    /// Checks a previously issued signature against the key, expiry, and
    /// current time.
    pub fn verify(&self, key: &str, expires: i64, sig: &str, now: DateTime<Utc>) -> bool {
        expires > now.timestamp() && self.signature(key, expires) == sig
    }
}

#[async_trait]
impl ArtifactStore for SignedArtifactStore {
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String, BoxError> {
        write_blob(&self.dir, key, bytes).await?;
        let expires = (Utc::now() + self.url_ttl).timestamp();
        let sig = self.signature(key, expires);
        tracing::debug!(key, expires, "artifact stored with signed url");
        Ok(format!(
            "{}/storage/{}?expires={}&sig={}",
            self.base_url, key, expires, sig
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("dossier-store-test-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_local_put_writes_and_links() {
        let dir = scratch_dir();
        let store = LocalArtifactStore::new(&dir, "http://localhost:3000/");

        let url = store.put(b"report body", "abc.pdf").await.unwrap();
        assert_eq!(url, "http://localhost:3000/storage/abc.pdf");
        assert_eq!(fs::read(dir.join("abc.pdf")).await.unwrap(), b"report body");

        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_put_creates_nested_dirs() {
        let dir = scratch_dir();
        let store = LocalArtifactStore::new(&dir, "http://localhost:3000");

        let url = store.put(b"proof", "proofs/abc").await.unwrap();
        assert_eq!(url, "http://localhost:3000/storage/proofs/abc");
        assert!(dir.join("proofs/abc").exists());

        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_signed_url_verification() {
        let dir = scratch_dir();
        let store = SignedArtifactStore::new(&dir, "http://x", "secret", Duration::days(7));

        let url = store.put(b"data", "abc.zip").await.unwrap();
        let query = url.split('?').nth(1).unwrap();
        let expires: i64 = query
            .split('&')
            .find_map(|p| p.strip_prefix("expires="))
            .unwrap()
            .parse()
            .unwrap();
        let sig = query
            .split('&')
            .find_map(|p| p.strip_prefix("sig="))
            .unwrap();

        let now = Utc::now();
        assert!(store.verify("abc.zip", expires, sig, now));
        assert!(!store.verify("other.zip", expires, sig, now));
        assert!(!store.verify("abc.zip", expires, "deadbeef", now));
        assert!(!store.verify("abc.zip", expires, sig, now + Duration::days(8)));

        fs::remove_dir_all(&dir).await.unwrap();
    }
}
