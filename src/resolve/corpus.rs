//! Workspace document access
//!
//! The engine never touches the filesystem itself. It enumerates and opens
//! documents through a [`Corpus`], and treats every document it gets back as
//! an immutable snapshot for the duration of one call.

use super::cancel::CancellationToken;
use super::document::Document;
use crate::config::KpcConfig;
use crate::error::{KpcError, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Glob selecting KPC sources
pub const SOURCE_GLOB: &str = "**/*.kpc";

/// Enumerates and opens the documents of a workspace
pub trait Corpus {
    /// URIs of every file matching `glob`, in enumeration order
    fn find_files(&self, glob: &str) -> Result<Vec<String>>;

    /// Load a document snapshot
    fn open(&self, uri: &str) -> Result<Document>;

    /// URIs of every source file the engine should consider
    fn source_files(&self) -> Result<Vec<String>> {
        self.find_files(SOURCE_GLOB)
    }
}

/// Visit every source document until `visit` breaks or `cancel` fires
///
/// Files that fail to open are logged and skipped, and a file whose open
/// raced a cancellation is never visited. Returns the break value, or `None`
/// when the scan ran out of files or was cancelled.
pub fn scan_documents<B>(
    corpus: &dyn Corpus,
    cancel: &CancellationToken,
    mut visit: impl FnMut(&Document) -> ControlFlow<B>,
) -> Option<B> {
    let files = match corpus.source_files() {
        Ok(files) => files,
        Err(e) => {
            warn!("Failed to enumerate workspace files: {}", e);
            return None;
        }
    };

    for uri in files {
        if cancel.is_cancelled() {
            debug!("Workspace scan cancelled before {}", uri);
            return None;
        }
        let document = match corpus.open(&uri) {
            Ok(document) => document,
            Err(e) => {
                warn!("Skipping {}: {}", uri, e);
                continue;
            }
        };
        if cancel.is_cancelled() {
            debug!("Workspace scan cancelled while opening {}", uri);
            return None;
        }
        if let ControlFlow::Break(found) = visit(&document) {
            return Some(found);
        }
    }

    None
}

/// Compile a workspace glob over `/`-separated relative paths
///
/// `*` and `?` stay within one path component; `**/` spans directories,
/// including none.
pub fn glob_matcher(glob: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| KpcError::InvalidConfig(format!("Bad glob {:?}: {}", glob, e)))
}

/// Convert a filesystem path to a `file://` URI
pub fn path_to_uri(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{}", path)
    } else {
        format!("file:///{}", path)
    }
}

/// Convert a `file://` URI back to a path
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    let path = uri.strip_prefix("file://")?;
    // file:///C:/x on Windows
    let path = match path.as_bytes() {
        [b'/', _, b':', ..] => &path[1..],
        _ => path,
    };
    Some(PathBuf::from(path))
}

/// In-memory corpus, enumerated in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemoryCorpus {
    documents: Vec<Document>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, replacing any earlier one with the same URI
    pub fn insert(&mut self, document: Document) {
        match self.documents.iter_mut().find(|d| d.uri() == document.uri()) {
            Some(existing) => *existing = document,
            None => self.documents.push(document),
        }
    }

    /// Builder-style [`insert`](Self::insert) from raw text
    pub fn with(mut self, uri: &str, text: &str) -> Self {
        self.insert(Document::new(uri, text));
        self
    }

    pub fn get(&self, uri: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.uri() == uri)
    }
}

impl Corpus for MemoryCorpus {
    fn find_files(&self, glob: &str) -> Result<Vec<String>> {
        let matcher = glob_matcher(glob)?;
        Ok(self
            .documents
            .iter()
            .map(Document::uri)
            .filter(|uri| {
                let path = uri.strip_prefix("file://").unwrap_or(uri);
                matcher.is_match(path.trim_start_matches('/'))
            })
            .map(str::to_string)
            .collect())
    }

    fn open(&self, uri: &str) -> Result<Document> {
        self.get(uri)
            .cloned()
            .ok_or_else(|| KpcError::DocumentNotFound(uri.to_string()))
    }
}

/// Filesystem corpus rooted at a workspace directory
#[derive(Debug, Clone)]
pub struct FsCorpus {
    root: PathBuf,
    glob: String,
    exclude: Vec<String>,
}

impl FsCorpus {
    /// Create a corpus with default settings
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, &KpcConfig::default())
    }

    /// Create a corpus honouring the configured extension and excludes
    pub fn with_config(root: impl Into<PathBuf>, config: &KpcConfig) -> Self {
        Self {
            root: root.into(),
            glob: config.glob(),
            exclude: config.exclude.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_excluded(&self, entry: &walkdir::DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.exclude.iter().any(|e| e == name))
    }
}

impl Corpus for FsCorpus {
    fn find_files(&self, glob: &str) -> Result<Vec<String>> {
        let matcher = glob_matcher(glob)?;
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e))
        {
            let entry = match entry {
                Ok(entry) => entry,
                // the root itself is unreadable
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    warn!("Failed to read workspace entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if matcher.is_match(&relative) {
                files.push(path_to_uri(entry.path()));
            }
        }

        debug!("Found {} files matching {} under {}", files.len(), glob, self.root.display());
        Ok(files)
    }

    fn open(&self, uri: &str) -> Result<Document> {
        let path = uri_to_path(uri).ok_or_else(|| KpcError::DocumentNotFound(uri.to_string()))?;
        let text = std::fs::read_to_string(&path)?;
        Ok(Document::new(uri, &text))
    }

    fn source_files(&self) -> Result<Vec<String>> {
        self.find_files(&self.glob)
    }
}

/// Open editor buffers layered over another corpus
///
/// Buffers shadow the base corpus's copy of the same URI, and buffers that
/// are not on disk yet are enumerated after the base files.
pub struct OverlayCorpus<'a> {
    base: Option<&'a dyn Corpus>,
    buffers: &'a HashMap<String, String>,
}

impl<'a> OverlayCorpus<'a> {
    pub fn new(base: Option<&'a dyn Corpus>, buffers: &'a HashMap<String, String>) -> Self {
        Self { base, buffers }
    }

    /// Files from the base corpus; buffers stay usable when it fails
    fn base_files(&self, list: impl FnOnce(&dyn Corpus) -> Result<Vec<String>>) -> Vec<String> {
        let Some(base) = self.base else {
            return Vec::new();
        };
        list(base).unwrap_or_else(|e| {
            warn!("Failed to enumerate workspace files: {}", e);
            Vec::new()
        })
    }
}

impl Corpus for OverlayCorpus<'_> {
    fn find_files(&self, glob: &str) -> Result<Vec<String>> {
        let mut files = self.base_files(|base| base.find_files(glob));

        let matcher = glob_matcher(glob)?;
        let mut extra: Vec<&String> = self
            .buffers
            .keys()
            .filter(|uri| !files.contains(uri))
            .filter(|uri| {
                let path = uri.strip_prefix("file://").unwrap_or(uri);
                matcher.is_match(path.trim_start_matches('/'))
            })
            .collect();
        extra.sort();
        files.extend(extra.into_iter().cloned());
        Ok(files)
    }

    fn open(&self, uri: &str) -> Result<Document> {
        if let Some(text) = self.buffers.get(uri) {
            return Ok(Document::new(uri, text));
        }
        match self.base {
            Some(base) => base.open(uri),
            None => Err(KpcError::DocumentNotFound(uri.to_string())),
        }
    }

    fn source_files(&self) -> Result<Vec<String>> {
        let mut files = self.base_files(|base| base.source_files());
        let mut extra: Vec<&String> = self
            .buffers
            .keys()
            .filter(|uri| !files.contains(uri))
            .collect();
        extra.sort();
        files.extend(extra.into_iter().cloned());
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_glob_matcher() {
        let re = glob_matcher("**/*.kpc").unwrap();
        assert!(re.is_match("main.kpc"));
        assert!(re.is_match("lib/math/add.kpc"));
        assert!(!re.is_match("main.kpc.bak"));
        assert!(!re.is_match("notes.txt"));

        let flat = glob_matcher("*.kpc").unwrap();
        assert!(flat.is_match("main.kpc"));
        assert!(!flat.is_match("lib/main.kpc"));

        let alternatives = glob_matcher("src/**/{main,lib}.kpc").unwrap();
        assert!(alternatives.is_match("src/lib.kpc"));
        assert!(alternatives.is_match("src/a/b/main.kpc"));
        assert!(!alternatives.is_match("src/other.kpc"));

        assert!(matches!(glob_matcher("src/[a-"), Err(KpcError::InvalidConfig(_))));
    }

    #[test]
    fn test_uri_round_trip() {
        let uri = path_to_uri(Path::new("/work/src/main.kpc"));
        assert_eq!(uri, "file:///work/src/main.kpc");
        assert_eq!(uri_to_path(&uri).unwrap(), PathBuf::from("/work/src/main.kpc"));
        assert!(uri_to_path("untitled:1").is_none());
    }

    #[test]
    fn test_memory_corpus_order_and_replace() {
        let mut corpus = MemoryCorpus::new()
            .with("file:///b.kpc", "*B")
            .with("file:///a.kpc", "*A")
            .with("file:///readme.md", "# hi");
        corpus.insert(Document::new("file:///b.kpc", "*B2"));

        let files = corpus.source_files().unwrap();
        assert_eq!(files, vec!["file:///b.kpc", "file:///a.kpc"]);
        assert_eq!(corpus.open("file:///b.kpc").unwrap().line_at(0), "*B2");
        assert!(corpus.open("file:///missing.kpc").is_err());
    }

    #[test]
    fn test_fs_corpus_walks_and_excludes() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("lib")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("main.kpc"), "*@module Main\n").unwrap();
        std::fs::write(root.join("lib/math.kpc"), "*@module Math\n").unwrap();
        std::fs::write(root.join("node_modules/pkg/x.kpc"), "*@module X\n").unwrap();
        std::fs::write(root.join("notes.txt"), "nothing").unwrap();

        let corpus = FsCorpus::new(root);
        let files = corpus.source_files().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("lib/math.kpc"));
        assert!(files[1].ends_with("main.kpc"));

        let doc = corpus.open(&files[1]).unwrap();
        assert_eq!(doc.line_at(0), "*@module Main");
    }

    #[test]
    fn test_missing_root_is_a_walk_error() {
        let temp = tempdir().unwrap();
        let corpus = FsCorpus::new(temp.path().join("gone"));
        assert!(matches!(corpus.source_files(), Err(KpcError::Walk(_))));

        // open buffers still enumerate over a broken workspace
        let mut buffers = HashMap::new();
        buffers.insert("file:///b.kpc".to_string(), "*B".to_string());
        let overlay = OverlayCorpus::new(Some(&corpus), &buffers);
        assert_eq!(overlay.source_files().unwrap(), vec!["file:///b.kpc"]);
    }

    #[test]
    fn test_scan_skips_unreadable_and_stops_on_cancel() {
        struct Flaky;
        impl Corpus for Flaky {
            fn find_files(&self, _glob: &str) -> Result<Vec<String>> {
                Ok(vec!["file:///bad.kpc".into(), "file:///good.kpc".into()])
            }
            fn open(&self, uri: &str) -> Result<Document> {
                if uri.contains("bad") {
                    Err(KpcError::DocumentNotFound(uri.to_string()))
                } else {
                    Ok(Document::new(uri, "*A"))
                }
            }
        }

        let cancel = CancellationToken::new();
        let found = scan_documents(&Flaky, &cancel, |doc| {
            ControlFlow::Break(doc.uri().to_string())
        });
        assert_eq!(found.as_deref(), Some("file:///good.kpc"));

        cancel.cancel();
        let found = scan_documents(&Flaky, &cancel, |doc| {
            ControlFlow::Break(doc.uri().to_string())
        });
        assert!(found.is_none());
    }

    #[test]
    fn test_overlay_prefers_buffers() {
        let base = MemoryCorpus::new().with("file:///a.kpc", "*Old");
        let mut buffers = HashMap::new();
        buffers.insert("file:///a.kpc".to_string(), "*New".to_string());
        buffers.insert("file:///b.kpc".to_string(), "*B".to_string());

        let overlay = OverlayCorpus::new(Some(&base), &buffers);
        assert_eq!(
            overlay.source_files().unwrap(),
            vec!["file:///a.kpc", "file:///b.kpc"]
        );
        assert_eq!(overlay.open("file:///a.kpc").unwrap().line_at(0), "*New");
    }
}
