//! Run-scoped memoization of file reads, parsed documents and compiled patterns.
//!
//! One [`SharedCache`] is constructed per pipeline run and handed by `Arc` to
//! every detector. Entries are keyed by path and modification time: a changed
//! mtime replaces the entry instead of returning stale content. Each key is
//! computed at most once even when several detectors ask for it concurrently,
//! because every slot holds a `tokio::sync::OnceCell` that serializes first
//! access. Failed computations leave the cell empty, so errors are never cached.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use regex::Regex;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::parser::{sniff_encoding, DocumentEncoding, HybridParser, ParseResult, ParsedDocument};

/// Errors returned by cache lookups.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The file could not be inspected or read.
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A pattern source failed to compile.
    #[error("Invalid pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Type alias for Result with CacheError.
pub type CacheResult<T> = Result<T, CacheError>;

/// A file as read from disk. Immutable once read.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub modified: SystemTime,
    pub encoding: DocumentEncoding,
}

impl RawDocument {
    /// The content as text; invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Hit and miss counters per entry kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub file_hits: u64,
    pub file_misses: u64,
    pub parsed_hits: u64,
    pub parsed_misses: u64,
    pub pattern_hits: u64,
    pub pattern_misses: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.file_hits + self.parsed_hits + self.pattern_hits
    }

    pub fn misses(&self) -> u64 {
        self.file_misses + self.parsed_misses + self.pattern_misses
    }
}

#[derive(Default)]
struct Counter {
    lookups: AtomicU64,
    misses: AtomicU64,
}

impl Counter {
    fn lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> (u64, u64) {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        (lookups.saturating_sub(misses), misses)
    }
}

struct Slot<T> {
    modified: SystemTime,
    cell: Arc<OnceCell<Arc<T>>>,
}

impl<T> Slot<T> {
    fn new(modified: SystemTime) -> Self {
        Self {
            modified,
            cell: Arc::new(OnceCell::new()),
        }
    }
}

/// Shared, concurrency-safe cache for one pipeline run.
#[derive(Default)]
pub struct SharedCache {
    files: Mutex<HashMap<PathBuf, Slot<RawDocument>>>,
    parsed: Mutex<HashMap<PathBuf, Slot<ParsedDocument>>>,
    patterns: Mutex<HashMap<String, Arc<Regex>>>,
    file_counter: Counter,
    parsed_counter: Counter,
    pattern_counter: Counter,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the file content, reading it when absent or modified.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::FileRead` when the file is missing or unreadable.
    /// The failure is not remembered; the next call reads again.
    pub async fn get_file(&self, path: &Path) -> CacheResult<Arc<RawDocument>> {
        let modified = modified_time(path).await?;
        self.file_counter.lookup();

        let cell = {
            let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = files
                .entry(path.to_path_buf())
                .or_insert_with(|| Slot::new(modified));
            if slot.modified != modified {
                debug!(path = %path.display(), "file modified, replacing cache entry");
                *slot = Slot::new(modified);
            }
            Arc::clone(&slot.cell)
        };

        let document = cell
            .get_or_try_init(|| async {
                self.file_counter.miss();
                read_document(path, modified).await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(document))
    }

    /// Returns the parsed, include-expanded document at `path`.
    ///
    /// The entry is also invalidated when any document it included has been
    /// modified since it was parsed.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` when the file cannot be read or contains no
    /// usable YAML at all. Partial failures are recorded inside the document.
    pub async fn get_parsed(&self, path: &Path) -> ParseResult<Arc<ParsedDocument>> {
        let modified = modified_time(path).await?;
        self.parsed_counter.lookup();

        let mut cell = self.parsed_cell(path, modified);
        let stale = match cell.get() {
            Some(document) => !self.dependencies_fresh(document).await,
            None => false,
        };
        if stale {
            debug!(path = %path.display(), "included document modified, reparsing");
            cell = self.replace_parsed_cell(path, modified, &cell);
        }

        let document = cell
            .get_or_try_init(|| async {
                self.parsed_counter.miss();
                HybridParser::new(self).parse_file(path).await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(document))
    }

    /// Returns the compiled regular expression for `source`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Pattern` when the source does not compile.
    pub fn get_pattern(&self, source: &str) -> CacheResult<Arc<Regex>> {
        self.pattern_counter.lookup();
        let mut patterns = self.patterns.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(regex) = patterns.get(source) {
            return Ok(Arc::clone(regex));
        }

        self.pattern_counter.miss();
        let regex = Regex::new(source).map_err(|err| CacheError::Pattern {
            pattern: source.to_string(),
            source: err,
        })?;
        let regex = Arc::new(regex);
        patterns.insert(source.to_string(), Arc::clone(&regex));
        Ok(regex)
    }

    pub fn stats(&self) -> CacheStats {
        let (file_hits, file_misses) = self.file_counter.snapshot();
        let (parsed_hits, parsed_misses) = self.parsed_counter.snapshot();
        let (pattern_hits, pattern_misses) = self.pattern_counter.snapshot();
        CacheStats {
            file_hits,
            file_misses,
            parsed_hits,
            parsed_misses,
            pattern_hits,
            pattern_misses,
        }
    }

    fn parsed_cell(&self, path: &Path, modified: SystemTime) -> Arc<OnceCell<Arc<ParsedDocument>>> {
        let mut parsed = self.parsed.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = parsed
            .entry(path.to_path_buf())
            .or_insert_with(|| Slot::new(modified));
        if slot.modified != modified {
            *slot = Slot::new(modified);
        }
        Arc::clone(&slot.cell)
    }

    /// Swaps in a fresh slot unless another task already replaced `stale`.
    fn replace_parsed_cell(
        &self,
        path: &Path,
        modified: SystemTime,
        stale: &Arc<OnceCell<Arc<ParsedDocument>>>,
    ) -> Arc<OnceCell<Arc<ParsedDocument>>> {
        let mut parsed = self.parsed.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = parsed
            .entry(path.to_path_buf())
            .or_insert_with(|| Slot::new(modified));
        if Arc::ptr_eq(&slot.cell, stale) {
            *slot = Slot::new(modified);
        }
        Arc::clone(&slot.cell)
    }

    async fn dependencies_fresh(&self, document: &ParsedDocument) -> bool {
        for (path, recorded) in document.sources.iter().skip(1) {
            match modified_time(path).await {
                Ok(current) if current == *recorded => {}
                _ => return false,
            }
        }
        true
    }
}

async fn modified_time(path: &Path) -> CacheResult<SystemTime> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| CacheError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
    metadata.modified().map_err(|source| CacheError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_document(path: &Path, modified: SystemTime) -> CacheResult<RawDocument> {
    debug!(path = %path.display(), "reading file");
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| CacheError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
    let encoding = sniff_encoding(&String::from_utf8_lossy(&bytes));
    Ok(RawDocument {
        path: path.to_path_buf(),
        bytes,
        modified,
        encoding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn bump_mtime(path: &Path) {
        let file = fs::File::options()
            .write(true)
            .open(path)
            .expect("Failed to open file");
        let later = SystemTime::now() + Duration::from_secs(60);
        file.set_modified(later).expect("Failed to set mtime");
    }

    #[tokio::test]
    async fn test_get_file_hits_after_first_read() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("a.yml");
        fs::write(&path, "name: a\n").expect("Failed to write file");

        let cache = SharedCache::new();
        let first = cache.get_file(&path).await.expect("Failed to read file");
        let second = cache.get_file(&path).await.expect("Failed to read file");

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.file_misses, 1);
        assert_eq!(stats.file_hits, 1);
        assert_eq!(first.encoding, DocumentEncoding::PlainYaml);
    }

    #[tokio::test]
    async fn test_modified_file_is_reread() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("a.yml");
        fs::write(&path, "name: a\n").expect("Failed to write file");

        let cache = SharedCache::new();
        let first = cache.get_file(&path).await.expect("Failed to read file");

        fs::write(&path, "name: b\n").expect("Failed to rewrite file");
        bump_mtime(&path);
        let second = cache.get_file(&path).await.expect("Failed to read file");

        assert_eq!(first.text(), "name: a\n");
        assert_eq!(second.text(), "name: b\n");
        assert_eq!(cache.stats().file_misses, 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_cached() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("later.yml");

        let cache = SharedCache::new();
        let result = cache.get_file(&path).await;
        assert!(matches!(result, Err(CacheError::FileRead { .. })));

        fs::write(&path, "key: value\n").expect("Failed to write file");
        let document = cache.get_file(&path).await.expect("Retry should succeed");
        assert_eq!(document.text(), "key: value\n");
    }

    #[tokio::test]
    async fn test_concurrent_first_access_reads_once() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("shared.yml");
        fs::write(&path, "shared: true\n").expect("Failed to write file");

        let cache = Arc::new(SharedCache::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let path = path.clone();
            handles.push(tokio::spawn(async move { cache.get_file(&path).await.is_ok() }));
        }
        for handle in handles {
            assert!(handle.await.expect("Task panicked"));
        }

        let stats = cache.stats();
        assert_eq!(stats.file_misses, 1);
        assert_eq!(stats.file_hits, 15);
    }

    #[tokio::test]
    async fn test_parsed_entry_tracks_included_files() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path().join("root.yml");
        let shared = temp_dir.path().join("shared.yml");
        fs::write(&root, "settings: \"@include shared.yml\"\n").expect("Failed to write root");
        fs::write(&shared, "level: 1\n").expect("Failed to write shared");

        let cache = SharedCache::new();
        let first = cache.get_parsed(&root).await.expect("Failed to parse");
        assert_eq!(
            first.root.get("settings").and_then(|n| n.get("level")).and_then(|n| n.as_i64()),
            Some(1)
        );

        fs::write(&shared, "level: 2\n").expect("Failed to rewrite shared");
        bump_mtime(&shared);
        let second = cache.get_parsed(&root).await.expect("Failed to parse");
        assert_eq!(
            second.root.get("settings").and_then(|n| n.get("level")).and_then(|n| n.as_i64()),
            Some(2)
        );
        assert_eq!(cache.stats().parsed_misses, 2);
    }

    #[test]
    fn test_get_pattern_memoizes_and_reports_errors() {
        let cache = SharedCache::new();
        let first = cache.get_pattern(r"--(\w+)").expect("Pattern should compile");
        let second = cache.get_pattern(r"--(\w+)").expect("Pattern should compile");
        assert!(Arc::ptr_eq(&first, &second));

        let invalid = cache.get_pattern("(unclosed");
        assert!(matches!(invalid, Err(CacheError::Pattern { .. })));

        let stats = cache.stats();
        assert_eq!(stats.pattern_hits, 1);
        assert_eq!(stats.pattern_misses, 2);
    }
}
