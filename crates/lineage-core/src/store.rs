//! # Record Stores
//!
//! Sources of record text, grouped by category.
//!
//! - `FsRecordStore`: a repository checkout on disk
//! - `MemoryRecordStore`: path -> text pairs held in memory
//!
//! Both yield records in path order so every compile sees the same sequence.

use crate::config::LayoutConfig;
use crate::primitives::RECORD_EXTENSION;
use crate::{Category, LineageError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One record file: repository-relative path (with `/` separators) and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSource {
    pub path: String,
    pub text: String,
}

/// A source of records for the assembler.
pub trait RecordStore {
    /// All records of `category`, in path order.
    fn records(&self, category: Category) -> Result<Vec<RecordSource>, LineageError>;
}

// =============================================================================
// FILESYSTEM STORE
// =============================================================================

/// Records read from a repository checkout.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    root: PathBuf,
    layout: LayoutConfig,
}

impl FsRecordStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, layout: LayoutConfig) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record files of `category`, sorted by path.
    ///
    /// A missing category directory yields no files.
    pub fn files(&self, category: Category) -> Result<Vec<PathBuf>, LineageError> {
        let dir = self.root.join(self.layout.dir(category));
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(|e| LineageError::Io(e.to_string()))?;
            let is_record = entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == RECORD_EXTENSION);
            if is_record {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Repository-relative form of `path`, with `/` separators.
    #[must_use]
    pub fn relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl RecordStore for FsRecordStore {
    fn records(&self, category: Category) -> Result<Vec<RecordSource>, LineageError> {
        self.files(category)?
            .into_iter()
            .map(|file| {
                let text = std::fs::read_to_string(&file)
                    .map_err(|e| LineageError::Io(format!("{}: {}", file.display(), e)))?;
                Ok(RecordSource {
                    path: self.relative(&file),
                    text,
                })
            })
            .collect()
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Records held in memory, keyed by repository-relative path.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    layout: LayoutConfig,
    files: BTreeMap<String, String>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new(layout: LayoutConfig) -> Self {
        Self {
            layout,
            files: BTreeMap::new(),
        }
    }

    /// Add or replace a record.
    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }

    /// Builder form of `insert`.
    #[must_use]
    pub fn with(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }
}

impl RecordStore for MemoryRecordStore {
    fn records(&self, category: Category) -> Result<Vec<RecordSource>, LineageError> {
        Ok(self
            .files
            .iter()
            .filter(|(path, _)| self.layout.category_of(path) == Some(category))
            .map(|(path, text)| RecordSource {
                path: path.clone(),
                text: text.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_filters_by_category() {
        let store = MemoryRecordStore::new(LayoutConfig::default())
            .with("zoos/japan/0001_zoo.txt", "[zoo]\n_id: 1\n")
            .with("pandas/japan/1_zoo/0002_b.txt", "[panda]\n_id: 2\n")
            .with("pandas/japan/1_zoo/0001_a.txt", "[panda]\n_id: 1\n");

        let pandas = store.records(Category::Animal).expect("records");
        let paths: Vec<_> = pandas.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["pandas/japan/1_zoo/0001_a.txt", "pandas/japan/1_zoo/0002_b.txt"]
        );
        assert_eq!(store.records(Category::Link).expect("records").len(), 0);
    }

    #[test]
    fn fs_store_walks_sorted_and_skips_other_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pandas = dir.path().join("pandas/japan/1_zoo");
        std::fs::create_dir_all(&pandas).expect("mkdir");
        std::fs::write(pandas.join("0002_b.txt"), "[panda]\n_id: 2\n").expect("write");
        std::fs::write(pandas.join("0001_a.txt"), "[panda]\n_id: 1\n").expect("write");
        std::fs::write(pandas.join("notes.md"), "ignored").expect("write");

        let store = FsRecordStore::new(dir.path(), LayoutConfig::default());
        let records = store.records(Category::Animal).expect("records");
        let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["pandas/japan/1_zoo/0001_a.txt", "pandas/japan/1_zoo/0002_b.txt"]
        );
        assert!(store.records(Category::Media).expect("records").is_empty());
    }
}
