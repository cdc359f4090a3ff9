//! Storage of downloaded report PDFs on disk.
//!
//! Layout: `{root}/{sanitized company}/{sanitized filename}.pdf`. Files are
//! never overwritten; a name collision gets a `_1`, `_2`, ... suffix.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Fallback company folder name.
const UNKNOWN_COMPANY: &str = "unknown_company";
/// Fallback file stem.
const DEFAULT_STEM: &str = "report";
const MAX_NAME_LEN: usize = 100;

/// Error type for document storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A document written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Compute SHA-256 hash of content.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Reduce a name to a safe filename component.
///
/// Keeps only the last path segment, replaces every character outside
/// `[A-Za-z0-9._-]` with `_`, and trims underscores from both ends.
pub fn sanitize_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    let sanitized: String = base
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();

    let trimmed = sanitized.trim_matches('_');
    trimmed.chars().take(MAX_NAME_LEN).collect()
}

/// Report PDF store rooted at a directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Folder holding a company's documents.
    pub fn company_dir(&self, company: &str) -> PathBuf {
        let name = sanitize_name(company);
        if name.is_empty() {
            self.root.join(UNKNOWN_COMPANY)
        } else {
            self.root.join(name)
        }
    }

    /// Write `content` under the company folder without overwriting anything.
    ///
    /// The extension is always `.pdf`, whatever `suggested_name` ends with.
    pub fn save(
        &self,
        company: &str,
        suggested_name: &str,
        content: &[u8],
    ) -> Result<StoredDocument, StorageError> {
        let dir = self.company_dir(company);
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let stem = pdf_stem(suggested_name);
        let mut attempt = 0u32;
        loop {
            let filename = if attempt == 0 {
                format!("{}.pdf", stem)
            } else {
                format!("{}_{}.pdf", stem, attempt)
            };
            let path = dir.join(filename);

            // create_new makes the existence check and creation one step.
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::io(&path, e))?;
                    debug!("Saved {} bytes to {}", content.len(), path.display());
                    return Ok(StoredDocument {
                        path,
                        sha256: compute_hash(content),
                        size_bytes: content.len() as u64,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(StorageError::io(&path, e)),
            }
        }
    }

    /// Like [`save`](Self::save), but skips content already stored for the company.
    ///
    /// Returns `None` when a file with the same SHA-256 exists in the folder.
    pub fn save_unique(
        &self,
        company: &str,
        suggested_name: &str,
        content: &[u8],
    ) -> Result<Option<StoredDocument>, StorageError> {
        let hash = compute_hash(content);
        if let Some(existing) = self.find_by_hash(company, &hash)? {
            debug!("Content already stored at {}", existing.display());
            return Ok(None);
        }
        self.save(company, suggested_name, content).map(Some)
    }

    /// Path of a stored PDF with the given SHA-256, if any.
    pub fn find_by_hash(&self, company: &str, hash: &str) -> Result<Option<PathBuf>, StorageError> {
        let dir = self.company_dir(company);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&dir, e)),
        };

        for entry in entries {
            let path = entry.map_err(|e| StorageError::io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("pdf") {
                continue;
            }
            let content = std::fs::read(&path).map_err(|e| StorageError::io(&path, e))?;
            if compute_hash(&content) == hash {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

/// Sanitized file stem with any extension removed.
fn pdf_stem(suggested_name: &str) -> String {
    let safe = sanitize_name(suggested_name);
    let stem = match safe.rfind('.') {
        Some(idx) if idx > 0 => &safe[..idx],
        _ => safe.as_str(),
    };
    let stem = stem.trim_matches(['_', '.']);
    if stem.is_empty() {
        DEFAULT_STEM.to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Acme Corp"), "Acme_Corp");
        assert_eq!(sanitize_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_name("Q3 (2024) résumé.pdf"), "Q3__2024__r_sum_.pdf");
        assert_eq!(sanitize_name("__x__"), "x");
        assert_eq!(sanitize_name("???"), "");
        assert_eq!(sanitize_name(&"a".repeat(300)).len(), 100);
    }

    #[test]
    fn test_pdf_stem() {
        assert_eq!(pdf_stem("annual-report.PDF"), "annual-report");
        assert_eq!(pdf_stem("download.aspx"), "download");
        assert_eq!(pdf_stem("noext"), "noext");
        assert_eq!(pdf_stem(".pdf"), "pdf");
        assert_eq!(pdf_stem(""), "report");
        assert_eq!(pdf_stem("v1.2.final.pdf"), "v1.2.final");
    }

    #[test]
    fn test_compute_hash() {
        assert_eq!(
            compute_hash(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_layout_and_forced_extension() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        let doc = store
            .save("Acme Corp", "https://acme.example/get?id=7/AR 2023.htm", b"%PDF-1.7")
            .unwrap();

        assert_eq!(doc.path, dir.path().join("Acme_Corp").join("AR_2023.pdf"));
        assert_eq!(doc.size_bytes, 8);
        assert_eq!(std::fs::read(&doc.path).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn test_collisions_never_overwrite() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        let first = store.save("Acme", "report.pdf", b"first").unwrap();
        let second = store.save("Acme", "report.pdf", b"second").unwrap();
        let third = store.save("Acme", "report.pdf", b"third").unwrap();

        assert_ne!(first.path, second.path);
        assert!(second.path.ends_with("report_1.pdf"));
        assert!(third.path.ends_with("report_2.pdf"));
        assert_eq!(std::fs::read(&first.path).unwrap(), b"first");
        assert_eq!(std::fs::read(&second.path).unwrap(), b"second");
    }

    #[test]
    fn test_unknown_company_folder() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        assert_eq!(store.company_dir("  "), dir.path().join("unknown_company"));
    }

    #[test]
    fn test_save_unique_skips_known_content() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        let saved = store.save_unique("Acme", "a.pdf", b"same").unwrap();
        assert!(saved.is_some());
        assert!(store.save_unique("Acme", "b.pdf", b"same").unwrap().is_none());
        assert!(store.save_unique("Acme", "b.pdf", b"different").unwrap().is_some());
        assert!(store.save_unique("Globex", "a.pdf", b"same").unwrap().is_some());
    }
}
