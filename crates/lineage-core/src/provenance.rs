//! # Provenance Miner
//!
//! Walks version-control history to find when each record file and each
//! photo URI first appeared.
//!
//! History access goes through the `HistoryReader` trait:
//! - `GitHistory` shells out to the `git` executable
//! - `MemoryHistory` holds snapshots in memory, for tests and embedding
//!
//! The miner only reads history. Writing mined dates back into records is
//! done by `Record::backfill_commit_dates`.

use crate::codec::split_photo_key;
use crate::config::LayoutConfig;
use crate::diff::{FileDiff, parse_unified_diff};
use crate::photo::PhotoSlot;
use crate::primitives::RECORD_EXTENSION;
use crate::{Category, LineageDate, LineageError};
use chrono::{DateTime, Duration, FixedOffset};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::process::Command;
use std::sync::LazyLock;
use tracing::{debug, info};

/// `photo.N: <value>` as it appears in a diff line.
static PHOTO_LINE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^photo\.(\d+):\s+(\S.*)$"));

// =============================================================================
// HISTORY ACCESS
// =============================================================================

/// One commit: its id and committer timestamp (with the committer's offset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub time: DateTime<FixedOffset>,
}

impl Commit {
    /// Calendar date of the commit in the committer's own offset.
    #[must_use]
    pub fn date(&self) -> LineageDate {
        LineageDate(self.time.date_naive())
    }
}

/// Read-only access to a linear commit history.
pub trait HistoryReader {
    /// All commits, oldest first.
    fn commits(&self) -> Result<Vec<Commit>, LineageError>;

    /// Per-file changes going from commit `from` to commit `to`.
    fn diff(&self, from: &str, to: &str) -> Result<Vec<FileDiff>, LineageError>;

    /// True when the history is truncated.
    fn is_shallow(&self) -> Result<bool, LineageError>;
}

/// History read from a git working tree through the `git` executable.
#[derive(Debug, Clone)]
pub struct GitHistory {
    repo: PathBuf,
}

impl GitHistory {
    #[must_use]
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    fn git(&self, args: &[&str]) -> Result<String, LineageError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(args)
            .output()
            .map_err(|e| LineageError::History(format!("cannot run git: {}", e)))?;
        if !output.status.success() {
            return Err(LineageError::History(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| LineageError::History(format!("git output is not UTF-8: {}", e)))
    }
}

impl HistoryReader for GitHistory {
    fn commits(&self) -> Result<Vec<Commit>, LineageError> {
        let log = self.git(&["log", "--reverse", "--format=%H %cI", "HEAD"])?;
        log.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let (id, stamp) = line.trim().split_once(' ').ok_or_else(|| {
                    LineageError::History(format!("unexpected log line: {}", line))
                })?;
                let time = DateTime::parse_from_rfc3339(stamp).map_err(|e| {
                    LineageError::History(format!("bad commit time {}: {}", stamp, e))
                })?;
                Ok(Commit {
                    id: id.to_string(),
                    time,
                })
            })
            .collect()
    }

    fn diff(&self, from: &str, to: &str) -> Result<Vec<FileDiff>, LineageError> {
        let raw = self.git(&[
            "diff",
            "--no-color",
            "--no-ext-diff",
            "--no-renames",
            "--ignore-blank-lines",
            "--ignore-space-at-eol",
            from,
            to,
        ])?;
        Ok(parse_unified_diff(&raw))
    }

    fn is_shallow(&self) -> Result<bool, LineageError> {
        Ok(self.git(&["rev-parse", "--is-shallow-repository"])?.trim() == "true")
    }
}

/// History held as full-tree snapshots, one per commit.
///
/// Diffs are line-set differences per file, which is all the miner looks at.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    commits: Vec<(Commit, BTreeMap<String, String>)>,
    shallow: bool,
}

impl MemoryHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a commit whose tree is exactly `files` (path -> text).
    pub fn commit(
        &mut self,
        id: impl Into<String>,
        time: DateTime<FixedOffset>,
        files: BTreeMap<String, String>,
    ) {
        self.commits.push((
            Commit {
                id: id.into(),
                time,
            },
            files,
        ));
    }

    /// Append a commit that copies the previous tree and applies `changes`.
    /// A `None` text deletes the file.
    pub fn commit_changes(
        &mut self,
        id: impl Into<String>,
        time: DateTime<FixedOffset>,
        changes: &[(&str, Option<&str>)],
    ) {
        let mut files = self
            .commits
            .last()
            .map(|(_, files)| files.clone())
            .unwrap_or_default();
        for (path, text) in changes {
            match text {
                Some(text) => {
                    files.insert((*path).to_string(), (*text).to_string());
                }
                None => {
                    files.remove(*path);
                }
            }
        }
        self.commit(id, time, files);
    }

    pub fn set_shallow(&mut self, shallow: bool) {
        self.shallow = shallow;
    }

    fn tree(&self, id: &str) -> Result<&BTreeMap<String, String>, LineageError> {
        self.commits
            .iter()
            .find(|(commit, _)| commit.id == id)
            .map(|(_, files)| files)
            .ok_or_else(|| LineageError::History(format!("unknown commit {}", id)))
    }
}

impl HistoryReader for MemoryHistory {
    fn commits(&self) -> Result<Vec<Commit>, LineageError> {
        Ok(self.commits.iter().map(|(commit, _)| commit.clone()).collect())
    }

    fn diff(&self, from: &str, to: &str) -> Result<Vec<FileDiff>, LineageError> {
        let before = self.tree(from)?;
        let after = self.tree(to)?;
        let paths: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

        let mut files = Vec::new();
        for path in paths {
            let old = before.get(path);
            let new = after.get(path);
            if old == new {
                continue;
            }
            let old_lines: BTreeSet<&str> = old.map(|t| t.lines().collect()).unwrap_or_default();
            let new_lines: BTreeSet<&str> = new.map(|t| t.lines().collect()).unwrap_or_default();
            files.push(FileDiff {
                path: path.clone(),
                is_added_file: old.is_none(),
                is_removed_file: new.is_none(),
                added: new_lines
                    .difference(&old_lines)
                    .map(|l| (*l).to_string())
                    .collect(),
                removed: old_lines
                    .difference(&new_lines)
                    .map(|l| (*l).to_string())
                    .collect(),
            });
        }
        Ok(files)
    }

    fn is_shallow(&self) -> Result<bool, LineageError> {
        Ok(self.shallow)
    }
}

// =============================================================================
// PROVENANCE
// =============================================================================

/// Identity of a tracked record file: its kind and its ID.
///
/// Animals and managed locations use the numeric prefix of the file name;
/// media use their path below the media directory, without extension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityKey {
    pub kind: String,
    pub id: String,
}

impl EntityKey {
    #[must_use]
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Key of a repository-relative record path, if its category is tracked.
    #[must_use]
    pub fn from_path(path: &str, layout: &LayoutConfig) -> Option<Self> {
        let path = path.trim_start_matches("./");
        let stem = path.strip_suffix(&format!(".{}", RECORD_EXTENSION))?;
        let category = layout.category_of(path)?;
        match category {
            Category::Animal | Category::ManagedLocation => {
                let file = stem.rsplit('/').next()?;
                let prefix = file.split('_').next()?;
                let id = prefix.parse::<i64>().ok()?;
                Some(Self::new(category.section(), id.to_string()))
            }
            Category::Media => {
                let dir = format!("{}/", layout.dir(Category::Media));
                let id = stem.strip_prefix(dir.as_str())?;
                Some(Self::new(category.section(), id))
            }
            Category::WildLocation | Category::Link => None,
        }
    }

    /// Dotted locator used in digests (`panda.12`, `zoo.7`, `media.x/y`).
    #[must_use]
    pub fn locator(&self) -> String {
        format!("{}.{}", self.kind, self.id)
    }
}

/// First-seen dates mined from history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub entity_first_seen: BTreeMap<EntityKey, LineageDate>,
    pub uri_first_seen: BTreeMap<String, LineageDate>,
}

impl Provenance {
    /// Merge `other` into `self`. Existing keys are kept unless `force`.
    pub fn merge(&mut self, other: Provenance, force: bool) {
        for (key, date) in other.entity_first_seen {
            if force || !self.entity_first_seen.contains_key(&key) {
                self.entity_first_seen.insert(key, date);
            }
        }
        for (uri, date) in other.uri_first_seen {
            if force || !self.uri_first_seen.contains_key(&uri) {
                self.uri_first_seen.insert(uri, date);
            }
        }
    }
}

/// Split a diff line into `(index, uri)` when it is a photo line with an
/// `http` value.
///
/// # Errors
/// `LineageError::History` when the photo line pattern does not compile.
pub fn photo_line(line: &str) -> Result<Option<(u32, &str)>, LineageError> {
    let regex = PHOTO_LINE
        .as_ref()
        .map_err(|e| LineageError::History(format!("photo line pattern: {}", e)))?;
    let Some(captures) = regex.captures(line.trim()) else {
        return Ok(None);
    };
    let (Some(index), Some(value)) = (captures.get(1), captures.get(2)) else {
        return Ok(None);
    };
    let Ok(index) = index.as_str().parse() else {
        return Ok(None);
    };
    let value = value.as_str().trim();
    Ok(value.starts_with("http").then_some((index, value)))
}

fn is_record_path(path: &str) -> bool {
    path.ends_with(&format!(".{}", RECORD_EXTENSION))
}

// =============================================================================
// MINER
// =============================================================================

/// A recent-activity digest: sorted locators of new entities, new photos
/// and first-time contributors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecentDigest {
    pub entities: Vec<String>,
    pub photos: Vec<String>,
    pub authors: Vec<String>,
}

/// Computes provenance over a `HistoryReader`.
#[derive(Debug, Clone)]
pub struct ProvenanceMiner {
    layout: LayoutConfig,
    force: bool,
}

impl ProvenanceMiner {
    #[must_use]
    pub fn new(layout: LayoutConfig) -> Self {
        Self {
            layout,
            force: false,
        }
    }

    /// Overwrite previously recorded dates when merging.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Mine first-seen dates from `start` (inclusive) to head.
    ///
    /// With no `start`, the whole history is walked. `start` may be a full
    /// commit id or a unique prefix.
    ///
    /// # Errors
    /// `LineageError::Provenance` when `start` is not in the history.
    pub fn mine<H: HistoryReader>(
        &self,
        reader: &H,
        start: Option<&str>,
    ) -> Result<Provenance, LineageError> {
        let commits = reader.commits()?;
        let from = match start {
            Some(start) => find_commit(&commits, start)?,
            None => 0,
        };

        let mut provenance = Provenance::default();
        let walked = commits.get(from..).unwrap_or_default();
        for pair in walked.windows(2) {
            let (before, after) = (&pair[0], &pair[1]);
            let date = after.date();
            for file in reader.diff(&before.id, &after.id)? {
                if !is_record_path(&file.path) {
                    continue;
                }
                if file.is_added_file {
                    if let Some(key) = EntityKey::from_path(&file.path, &self.layout) {
                        provenance.entity_first_seen.entry(key).or_insert(date);
                    }
                }
                for line in &file.added {
                    if let Some((_, uri)) = photo_line(line)? {
                        provenance
                            .uri_first_seen
                            .entry(uri.to_string())
                            .or_insert(date);
                    }
                }
            }
        }

        info!(
            commits = walked.len(),
            entities = provenance.entity_first_seen.len(),
            uris = provenance.uri_first_seen.len(),
            "provenance mined"
        );
        Ok(provenance)
    }

    /// Mine and merge into `existing`, honoring the force flag.
    pub fn mine_into<H: HistoryReader>(
        &self,
        reader: &H,
        start: Option<&str>,
        existing: &mut Provenance,
    ) -> Result<(), LineageError> {
        let mined = self.mine(reader, start)?;
        existing.merge(mined, self.force);
        Ok(())
    }

    /// Summarize what was added within `window_seconds` of head.
    ///
    /// The watermark is the newest commit at least one window older than
    /// head. When history does not reach that far (young or shallow
    /// repositories), the oldest available commit is used instead.
    ///
    /// An entity or photo counts as new only if its first-seen date falls
    /// inside the window, so moved files are not reported again. An author
    /// is new when every photo credited to them in `credits` is new.
    pub fn recent_digest<H: HistoryReader>(
        &self,
        reader: &H,
        provenance: &Provenance,
        credits: &BTreeMap<String, u64>,
        window_seconds: i64,
    ) -> Result<RecentDigest, LineageError> {
        let commits = reader.commits()?;
        let (Some(oldest), Some(head)) = (commits.first(), commits.last()) else {
            return Ok(RecentDigest::default());
        };
        let cutoff = head.time - Duration::seconds(window_seconds);
        let watermark = match commits.iter().rev().find(|c| c.time <= cutoff) {
            Some(commit) => commit,
            None => {
                debug!(
                    shallow = reader.is_shallow().unwrap_or(false),
                    oldest = %oldest.id,
                    "no commit older than the window, using oldest commit as watermark"
                );
                oldest
            }
        };
        if watermark.id == head.id {
            return Ok(RecentDigest::default());
        }

        let window_start = LineageDate(cutoff.date_naive());
        let inside = |date: Option<&LineageDate>| date.is_none_or(|d| *d >= window_start);

        let mut entities = BTreeSet::new();
        let mut photos = BTreeSet::new();
        let mut new_per_author: BTreeMap<String, u64> = BTreeMap::new();

        for file in reader.diff(&watermark.id, &head.id)? {
            if !is_record_path(&file.path) {
                continue;
            }
            let Some(key) = EntityKey::from_path(&file.path, &self.layout) else {
                continue;
            };
            if file.is_added_file && inside(provenance.entity_first_seen.get(&key)) {
                entities.insert(key.locator());
            }

            let authors = added_authors(&file.added);
            for line in &file.added {
                let Some((index, uri)) = photo_line(line)? else {
                    continue;
                };
                if !inside(provenance.uri_first_seen.get(uri)) {
                    continue;
                }
                if photos.insert(format!("{}.photo.{}", key.locator(), index)) {
                    if let Some(author) = authors.get(&index) {
                        *new_per_author.entry(author.clone()).or_insert(0) += 1;
                    }
                }
            }
        }

        let authors = new_per_author
            .into_iter()
            .filter(|(author, count)| credits.get(author) == Some(count))
            .map(|(author, _)| author)
            .collect();

        Ok(RecentDigest {
            entities: entities.into_iter().collect(),
            photos: photos.into_iter().collect(),
            authors,
        })
    }
}

/// `photo.N.author` values among added lines, by slot index.
fn added_authors(lines: &[String]) -> BTreeMap<u32, String> {
    let mut authors = BTreeMap::new();
    for line in lines {
        let Some((key, value)) = line.trim().split_once(": ") else {
            continue;
        };
        if let Some((index, "author")) = split_photo_key(key.trim()) {
            authors.insert(index, value.trim().to_string());
        }
    }
    authors
}

fn find_commit(commits: &[Commit], wanted: &str) -> Result<usize, LineageError> {
    commits
        .iter()
        .position(|c| c.id == wanted)
        .or_else(|| {
            let mut matches = commits
                .iter()
                .enumerate()
                .filter(|(_, c)| !wanted.is_empty() && c.id.starts_with(wanted));
            match (matches.next(), matches.next()) {
                (Some((index, _)), None) => Some(index),
                _ => None,
            }
        })
        .ok_or_else(|| {
            LineageError::Provenance(format!("{} is not a commit in this history", wanted))
        })
}

// =============================================================================
// REMOVAL QUERIES
// =============================================================================

/// Newest commit whose diff removed a line credited to `author`
/// (a line ending in `: <author>`).
pub fn last_removal_by<H: HistoryReader>(
    reader: &H,
    author: &str,
) -> Result<Option<Commit>, LineageError> {
    let commits = reader.commits()?;
    let needle = format!(": {}", author);
    for pair in commits.windows(2).rev() {
        let (parent, child) = (&pair[0], &pair[1]);
        let removed = reader.diff(&parent.id, &child.id)?.into_iter().any(|file| {
            is_record_path(&file.path)
                && file.removed.iter().any(|line| {
                    let line = line.trim();
                    line.len() > needle.len() && line.ends_with(&needle)
                })
        });
        if removed {
            return Ok(Some(child.clone()));
        }
    }
    Ok(None)
}

/// Photo slots credited to `author` that `commit` removed, per file path.
///
/// Slots keep their original relative order; their indices are dropped
/// since they are re-appended on restore.
///
/// # Errors
/// `LineageError::Provenance` when `commit` is unknown or has no parent.
pub fn removed_slots<H: HistoryReader>(
    reader: &H,
    commit: &str,
    author: &str,
) -> Result<BTreeMap<String, Vec<PhotoSlot>>, LineageError> {
    let commits = reader.commits()?;
    let index = find_commit(&commits, commit)?;
    let Some(parent) = index.checked_sub(1).and_then(|i| commits.get(i)) else {
        return Err(LineageError::Provenance(format!(
            "{} has no parent commit",
            commit
        )));
    };
    let child = &commits[index];

    let mut restored = BTreeMap::new();
    for file in reader.diff(&parent.id, &child.id)? {
        if !is_record_path(&file.path) || file.removed.is_empty() {
            continue;
        }
        let mut slots: BTreeMap<u32, PhotoSlot> = BTreeMap::new();
        for line in &file.removed {
            let Some((key, value)) = line.trim().split_once(':') else {
                continue;
            };
            if let Some((slot_index, subkey)) = split_photo_key(key.trim()) {
                slots
                    .entry(slot_index)
                    .or_default()
                    .set(subkey, value.trim());
            }
        }
        let credited: Vec<PhotoSlot> = slots
            .into_values()
            .filter(|slot| slot.author.as_deref() == Some(author) && !slot.uri.is_empty())
            .collect();
        if !credited.is_empty() {
            restored.insert(file.path, credited);
        }
    }
    Ok(restored)
}

// =============================================================================
// TESTS
// =============================================================================
