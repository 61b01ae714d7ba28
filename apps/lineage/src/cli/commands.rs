//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Maintenance commands load each record through `PhotoFile`, apply the
//! photo-slot operations from lineage-core, and rewrite only the files that
//! changed.

use lineage_core::primitives::RECORD_EXTENSION;
use lineage_core::{
    Assembler, Category, EntityKey, ExportDocument, FsRecordStore, GitHistory, HistoryReader,
    LineageConfig, LineageError, PhotoFile, PhotoStats, ProviderLocator, ProvenanceMiner,
    RecentDigest, last_removal_by, removed_slots,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Categories whose records carry photo slots.
const PHOTO_CATEGORIES: [Category; 3] = [Category::Animal, Category::ManagedLocation, Category::Media];

// =============================================================================
// WORKSPACE
// =============================================================================

/// A repository checkout plus its configuration.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: LineageConfig,
}

impl Workspace {
    /// Open `root`, reading `config` (relative to `root` unless absolute)
    /// when it exists.
    pub fn open(root: &Path, config: &Path) -> Result<Self, LineageError> {
        if !root.is_dir() {
            return Err(LineageError::Io(format!(
                "repository root '{}' is not a directory",
                root.display()
            )));
        }
        let config_path = if config.is_absolute() {
            config.to_path_buf()
        } else {
            root.join(config)
        };
        let config = LineageConfig::load_or_default(&config_path)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    fn store(&self) -> FsRecordStore {
        FsRecordStore::new(&self.root, self.config.layout.clone())
    }

    fn history(&self) -> GitHistory {
        GitHistory::new(&self.root)
    }

    fn has_history(&self) -> bool {
        self.root.join(".git").exists()
    }

    fn miner(&self) -> ProvenanceMiner {
        ProvenanceMiner::new(self.config.layout.clone())
    }

    fn provider(&self) -> ProviderLocator {
        ProviderLocator::new(&self.config.provider)
    }

    /// A path given on the command line, relative to the root unless
    /// absolute.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Every record file that can carry photos.
    fn photo_files(&self) -> Result<Vec<PathBuf>, LineageError> {
        let store = self.store();
        let mut files = Vec::new();
        for category in PHOTO_CATEGORIES {
            files.extend(store.files(category)?);
        }
        Ok(files)
    }

    /// Compaction bound: the dataset-wide photo maximum from the last export.
    ///
    /// Without an export, 0 is used; `compact` never goes below a record's
    /// own last index.
    fn photo_bound(&self) -> u32 {
        let path = self.config.export_path(&self.root);
        match PhotoStats::load(&path) {
            Ok(stats) => stats.entity_max,
            Err(error) => {
                warn!(%error, "no photo statistics, run `lineage build` first for a dataset-wide bound");
                0
            }
        }
    }

    fn relative(&self, path: &Path) -> String {
        self.store().relative(path)
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Output mode selected by the global flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    /// Print `value` as JSON in JSON mode, otherwise print `text` unless quiet.
    ///
    /// # Errors
    /// `LineageError::Serialization` when `value` cannot be rendered as JSON.
    pub fn print<T: Serialize>(
        &self,
        value: &T,
        text: impl FnOnce() -> String,
    ) -> Result<(), LineageError> {
        if self.json {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| LineageError::Serialization(format!("command output: {}", e)))?;
            println!("{}", json);
        } else if !self.quiet {
            println!("{}", text());
        }
        Ok(())
    }
}

/// Result of a maintenance command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaintenanceReport {
    pub command: &'static str,
    /// Record files rewritten, relative to the root.
    pub files: Vec<String>,
    /// Slots or dates changed across those files.
    pub changed: usize,
    /// Record files that could not be updated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

impl MaintenanceReport {
    fn new(command: &'static str) -> Self {
        Self {
            command,
            ..Self::default()
        }
    }

    fn summary(&self, what: &str) -> String {
        let mut text = format!("{} {} in {} file(s)", self.changed, what, self.files.len());
        for file in &self.files {
            text.push_str(&format!("\n  {}", file));
        }
        for file in &self.skipped {
            text.push_str(&format!("\n  skipped: {}", file));
        }
        text
    }
}

// =============================================================================
// BUILD / CHECK COMMANDS
// =============================================================================

/// Compile, validate and write the export.
pub fn cmd_build(workspace: &Workspace, output: Output, use_history: bool) -> Result<(), LineageError> {
    let store = workspace.store();
    let (provenance, history) = if use_history && workspace.has_history() {
        let history = workspace.history();
        (Some(workspace.miner().mine(&history, None)?), Some(history))
    } else {
        info!("compiling without version-control history");
        (None, None)
    };

    let compilation = Assembler::new(&workspace.config).compile(&store, provenance.as_ref())?;

    let updates = match (&provenance, &history) {
        (Some(provenance), Some(history)) => workspace.miner().recent_digest(
            history,
            provenance,
            &compilation.state.credits,
            workspace.config.history.recent_window_seconds,
        )?,
        _ => RecentDigest::default(),
    };

    let path = workspace.config.export_path(&workspace.root);
    ExportDocument::new(&compilation, updates).write(&path)?;

    let summary = serde_json::json!({
        "export": path.display().to_string(),
        "vertices": compilation.graph.vertex_count(),
        "edges": compilation.graph.edge_count(),
        "photos": compilation.state.photo_count,
        "entity_max": compilation.state.entity_photo_max,
    });
    output.print(&summary, || {
        format!(
            "Wrote {}\n  Vertices: {}\n  Edges:    {}\n  Photos:   {}",
            path.display(),
            compilation.graph.vertex_count(),
            compilation.graph.edge_count(),
            compilation.state.photo_count
        )
    })?;
    Ok(())
}

/// Compile and validate, writing nothing.
pub fn cmd_check(workspace: &Workspace, output: Output) -> Result<(), LineageError> {
    let compilation = Assembler::new(&workspace.config).compile(&workspace.store(), None)?;
    let counts = compilation.graph.count_by_category();

    let summary = serde_json::json!({
        "valid": true,
        "counts": counts,
        "edges": compilation.graph.edge_count(),
    });
    output.print(&summary, || {
        let mut text = String::from("Dataset is valid");
        for (category, count) in &counts {
            text.push_str(&format!("\n  {:<18} {}", category.to_string(), count));
        }
        text.push_str(&format!("\n  {:<18} {}", "edges", compilation.graph.edge_count()));
        text
    })?;
    Ok(())
}

// =============================================================================
// PHOTO MAINTENANCE COMMANDS
// =============================================================================

/// Remove one photo from a record and renumber the rest.
pub fn cmd_remove_photo(
    workspace: &Workspace,
    output: Output,
    path: &Path,
    index: u32,
) -> Result<(), LineageError> {
    let path = workspace.resolve(path);
    let mut file = PhotoFile::load(&path)?;
    let mut report = MaintenanceReport::new("remove-photo");

    if file.record.delete(index) {
        file.record.compact(workspace.photo_bound());
        file.save()?;
        report.changed = 1;
        report.files.push(workspace.relative(&path));
    } else {
        info!(path = %path.display(), index, "no such photo");
    }
    output.print(&report, || report.summary("photo(s) removed"))?;
    Ok(())
}

/// Remove every photo credited to `author`.
pub fn cmd_remove_author(workspace: &Workspace, output: Output, author: &str) -> Result<(), LineageError> {
    let bound = workspace.photo_bound();
    let mut report = MaintenanceReport::new("remove-author");

    for path in workspace.photo_files()? {
        let mut file = PhotoFile::load(&path)?;
        let removed = file.record.remove_author(author, bound);
        if removed > 0 {
            file.save()?;
            info!(path = %path.display(), removed, author, "photos removed");
            report.changed += removed;
            report.files.push(workspace.relative(&path));
        }
    }
    output.print(&report, || report.summary("photo(s) removed"))?;
    Ok(())
}

/// Re-add the photos of `author` removed by `commit` (default: the most
/// recent commit that removed any), then sort the touched records.
pub fn cmd_restore_author(
    workspace: &Workspace,
    output: Output,
    author: &str,
    commit: Option<&str>,
) -> Result<(), LineageError> {
    let history = workspace.history();
    let commit = match commit {
        Some(commit) => commit.to_string(),
        None => last_removal_by(&history, author)?
            .map(|c| c.id)
            .ok_or_else(|| {
                LineageError::Provenance(format!("no commit removed photos by {}", author))
            })?,
    };
    info!(%commit, author, "restoring photos");

    let provider = workspace.provider();
    let mut report = MaintenanceReport::new("restore-author");
    for (relative, slots) in removed_slots(&history, &commit, author)? {
        if slots.is_empty() {
            continue;
        }
        let path = workspace.root.join(&relative);
        if !path.is_file() {
            warn!(path = %relative, slots = slots.len(), "record no longer exists, photos not restored");
            for slot in &slots {
                warn!(path = %relative, uri = %slot.uri, "unrestored photo");
            }
            report.skipped.push(relative);
            continue;
        }
        let mut file = PhotoFile::load(&path)?;
        report.changed += file.record.append_slots(slots)?.len();
        file.record.reorder_by_provider_locator(&provider);
        file.save()?;
        report.files.push(relative);
    }
    output.print(&report, || report.summary("photo(s) restored"))?;
    Ok(())
}

/// Sort a record's provider photos into upload order.
pub fn cmd_sort_locators(workspace: &Workspace, output: Output, path: &Path) -> Result<(), LineageError> {
    let path = workspace.resolve(path);
    let mut file = PhotoFile::load(&path)?;
    let mut report = MaintenanceReport::new("sort-locators");

    if file.record.reorder_by_provider_locator(&workspace.provider()) {
        file.save()?;
        report.changed = file.record.photos.len();
        report.files.push(workspace.relative(&path));
    }
    output.print(&report, || report.summary("photo(s) sorted"))?;
    Ok(())
}

/// Sort every record that gained lines in the last commit, then backfill
/// commit dates mined from that commit's parent onward.
pub fn cmd_sort_updates(workspace: &Workspace, output: Output) -> Result<(), LineageError> {
    let history = workspace.history();
    let commits = history.commits()?;
    let mut report = MaintenanceReport::new("sort-updates");
    let [.., parent, head] = commits.as_slice() else {
        info!("fewer than two commits, nothing to sort");
        output.print(&report, || report.summary("photo(s) sorted"))?;
        return Ok(());
    };

    let provider = workspace.provider();
    let suffix = format!(".{}", RECORD_EXTENSION);
    for diff in history.diff(&parent.id, &head.id)? {
        if diff.added.is_empty() || !diff.path.ends_with(&suffix) {
            continue;
        }
        let path = workspace.root.join(&diff.path);
        if !path.is_file() {
            continue;
        }
        let mut file = PhotoFile::load(&path)?;
        if file.record.reorder_by_provider_locator(&provider) {
            file.save()?;
            report.files.push(diff.path);
        }
    }

    let dated = backfill_commit_dates(workspace, Some(&parent.id), false)?;
    report.changed = dated.changed;
    for file in dated.files {
        if !report.files.contains(&file) {
            report.files.push(file);
        }
    }
    output.print(&report, || report.summary("date(s) written"))?;
    Ok(())
}

/// Merge photos that share a URI, in every record.
pub fn cmd_dedupe(workspace: &Workspace, output: Output) -> Result<(), LineageError> {
    let bound = workspace.photo_bound();
    let provider = workspace.provider();
    let mut report = MaintenanceReport::new("dedupe");

    for path in workspace.photo_files()? {
        let mut file = PhotoFile::load(&path)?;
        let merged = file.record.merge_duplicates(&provider, bound);
        if merged > 0 {
            file.save()?;
            info!(path = %path.display(), merged, "duplicate photos merged");
            report.changed += merged;
            report.files.push(workspace.relative(&path));
        }
    }
    output.print(&report, || report.summary("duplicate(s) merged"))?;
    Ok(())
}

/// Backfill entity and photo commit dates from history.
pub fn cmd_update_commit_dates(
    workspace: &Workspace,
    output: Output,
    commit: Option<&str>,
    force: bool,
) -> Result<(), LineageError> {
    let report = backfill_commit_dates(workspace, commit, force)?;
    output.print(&report, || report.summary("date(s) written"))?;
    Ok(())
}

fn backfill_commit_dates(
    workspace: &Workspace,
    start: Option<&str>,
    force: bool,
) -> Result<MaintenanceReport, LineageError> {
    let provenance = workspace
        .miner()
        .with_force(force)
        .mine(&workspace.history(), start)?;

    let mut report = MaintenanceReport::new("update-commit-dates");
    for path in workspace.photo_files()? {
        let relative = workspace.relative(&path);
        let key = EntityKey::from_path(&relative, &workspace.config.layout);
        let mut file = PhotoFile::load(&path)?;
        let written = file
            .record
            .backfill_commit_dates(key.as_ref(), &provenance, force);
        if written > 0 {
            file.save()?;
            report.changed += written;
            report.files.push(relative);
        }
    }
    Ok(report)
}

// =============================================================================
// DIGEST COMMAND
// =============================================================================

/// Show the entities, photos and contributors added within the recent window.
pub fn cmd_digest(workspace: &Workspace, output: Output) -> Result<(), LineageError> {
    let history = workspace.history();
    let miner = workspace.miner();
    let provenance = miner.mine(&history, None)?;
    let compilation =
        Assembler::new(&workspace.config).compile(&workspace.store(), Some(&provenance))?;
    let digest = miner.recent_digest(
        &history,
        &provenance,
        &compilation.state.credits,
        workspace.config.history.recent_window_seconds,
    )?;

    output.print(&digest, || {
        let mut text = String::new();
        for (title, items) in [
            ("New entities", &digest.entities),
            ("New photos", &digest.photos),
            ("New contributors", &digest.authors),
        ] {
            text.push_str(&format!("{} ({}):\n", title, items.len()));
            for item in items {
                text.push_str(&format!("  {}\n", item));
            }
        }
        text.trim_end().to_string()
    })?;
    Ok(())
}
