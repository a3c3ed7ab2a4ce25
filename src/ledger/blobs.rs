use crate::error::LedgerError;
use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

/// Opaque binary attachments filed under a record key.
pub trait BlobSink: Send + Sync {
    fn store(&self, key: &str, kind: &str, bytes: &[u8], ext: &str) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct FsBlobSink {
    root: PathBuf,
    max_bytes: u64,
}

impl FsBlobSink {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }
}

fn sanitize_slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || ch == '@' || ch == '.' {
            out.push(ch.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }
    let trimmed = out.trim_matches(|c| c == '-' || c == '.');
    trimmed.to_string()
}

fn digest_prefix(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest[..6].iter().map(|b| format!("{b:02x}")).collect()
}

impl BlobSink for FsBlobSink {
    fn store(&self, key: &str, kind: &str, bytes: &[u8], ext: &str) -> Result<PathBuf> {
        if bytes.is_empty() {
            return Err(LedgerError::BlobRejected("empty payload".to_string()).into());
        }
        if bytes.len() as u64 > self.max_bytes {
            return Err(LedgerError::BlobRejected(format!(
                "{} bytes exceeds limit of {}",
                bytes.len(),
                self.max_bytes
            ))
            .into());
        }

        let dir_name = match sanitize_slug(key) {
            slug if slug.is_empty() => "unknown".to_string(),
            slug => slug,
        };
        let kind = match sanitize_slug(kind) {
            slug if slug.is_empty() => "blob".to_string(),
            slug => slug,
        };
        let ext = match sanitize_slug(ext) {
            slug if slug.is_empty() => "bin".to_string(),
            slug => slug,
        };

        let dir = self.root.join(dir_name);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{kind}_{stamp}_{}.{ext}", digest_prefix(bytes)));
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(key, kind = %kind, path = %path.display(), bytes = bytes.len(), "stored blob");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn slug_sanitization_is_stable() {
        assert_eq!(sanitize_slug("A@B.com"), "a@b.com");
        assert_eq!(sanitize_slug("../../etc/passwd"), "etc-passwd");
        assert_eq!(sanitize_slug("---"), "");
    }

    #[test]
    fn stores_under_key_directory() {
        let tmp = tempdir().expect("tempdir");
        let sink = FsBlobSink::new(tmp.path(), 1024);
        let path = sink
            .store("a@b.com", "snapshot", b"\x89PNG", "png")
            .expect("store");

        assert!(path.starts_with(tmp.path().join("a@b.com")));
        assert_eq!(fs::read(&path).expect("read"), b"\x89PNG");
        let name = path.file_name().and_then(|s| s.to_str()).expect("name");
        assert!(name.starts_with("snapshot_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn rejects_empty_and_oversized_payloads() {
        let tmp = tempdir().expect("tempdir");
        let sink = FsBlobSink::new(tmp.path(), 4);
        assert!(sink.store("d1", "audio", b"", "mp3").is_err());
        assert!(sink.store("d1", "audio", b"12345", "mp3").is_err());
    }
}
