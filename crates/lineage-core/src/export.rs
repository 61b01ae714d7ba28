//! # Export Module
//!
//! Serializes a finished compile into the single JSON document consumed
//! downstream.
//!
//! Layout:
//! ```text
//! {
//!   "vertices": [...],        // tagged with "kind"
//!   "edges": [...],           // {out, in, label, [field], [confidence]}
//!   "_totals": {...},         // counts per category, last_born, last_died
//!   "_photo": {...},          // entity_max, photos, credit
//!   "_updates": {...},        // recent-activity digest
//!   "compound_names": [...]
//! }
//! ```
//!
//! Every collection is ordered (`BTreeMap`/`BTreeSet` upstream), so the same
//! records and history always produce byte-identical output.

use crate::assembler::Compilation;
use crate::graph::Vertex;
use crate::provenance::RecentDigest;
use crate::{Category, Edge, LineageDate, LineageError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Dataset-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    #[serde(flatten)]
    pub counts: BTreeMap<Category, u64>,
    pub last_born: Option<LineageDate>,
    pub last_died: Option<LineageDate>,
}

/// Photo statistics. Also read back by maintenance commands, which need
/// `entity_max` as the compaction bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoStats {
    pub entity_max: u32,
    #[serde(default)]
    pub photos: u64,
    #[serde(default)]
    pub credit: BTreeMap<String, u64>,
}

impl PhotoStats {
    /// Read the `_photo` block of a previously written export.
    pub fn from_export_json(text: &str) -> Result<Self, LineageError> {
        let document: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| LineageError::Serialization(format!("export: {}", e)))?;
        let block = document
            .get("_photo")
            .ok_or_else(|| LineageError::Serialization("export has no _photo block".to_string()))?;
        Self::deserialize(block)
            .map_err(|e| LineageError::Serialization(format!("_photo: {}", e)))
    }

    /// Read the `_photo` block from an export file.
    pub fn load(path: &Path) -> Result<Self, LineageError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LineageError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_export_json(&text)
    }
}

/// The exported document.
#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument<'a> {
    pub vertices: Vec<&'a Vertex>,
    pub edges: Vec<&'a Edge>,
    #[serde(rename = "_totals")]
    pub totals: Totals,
    #[serde(rename = "_photo")]
    pub photo: PhotoStats,
    #[serde(rename = "_updates")]
    pub updates: RecentDigest,
    pub compound_names: Vec<&'a str>,
}

impl<'a> ExportDocument<'a> {
    #[must_use]
    pub fn new(compilation: &'a Compilation, updates: RecentDigest) -> Self {
        let state = &compilation.state;
        Self {
            vertices: compilation.graph.vertices().collect(),
            edges: compilation.graph.edges().collect(),
            totals: Totals {
                counts: state.category_counts.clone(),
                last_born: state.last_born,
                last_died: state.last_died,
            },
            photo: PhotoStats {
                entity_max: state.entity_photo_max,
                photos: state.photo_count,
                credit: state.credits.clone(),
            },
            updates,
            compound_names: state.compound_names.iter().map(String::as_str).collect(),
        }
    }

    /// Pretty-printed JSON, newline terminated.
    pub fn to_json_pretty(&self) -> Result<String, LineageError> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| LineageError::Serialization(e.to_string()))?;
        json.push('\n');
        Ok(json)
    }

    /// Write the document to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), LineageError> {
        let json = self.to_json_pretty()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LineageError::Io(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, json)
            .map_err(|e| LineageError::Io(format!("{}: {}", path.display(), e)))?;
        info!(
            path = %path.display(),
            vertices = self.vertices.len(),
            edges = self.edges.len(),
            "export written"
        );
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
