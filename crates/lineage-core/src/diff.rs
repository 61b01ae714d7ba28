//! # Unified Diff Reader
//!
//! Parses the output of `git diff` into per-file added and removed lines.
//! Only the information the provenance miner needs is kept: the target path,
//! whether the file was created or deleted, and the changed line bodies.

/// Changes to one file between two commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDiff {
    /// Repository-relative path (the post-image path).
    pub path: String,
    /// The file did not exist before.
    pub is_added_file: bool,
    /// The file no longer exists after.
    pub is_removed_file: bool,
    /// Added lines, without the leading `+`.
    pub added: Vec<String>,
    /// Removed lines, without the leading `-`.
    pub removed: Vec<String>,
}

/// Parse unified diff text into one `FileDiff` per file.
///
/// Hunk bodies are delimited by the line counts in their `@@` headers, so
/// a content line that happens to start with `+++` is not mistaken for a
/// file header.
#[must_use]
pub fn parse_unified_diff(text: &str) -> Vec<FileDiff> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut old_remaining: u64 = 0;
    let mut new_remaining: u64 = 0;

    for line in text.lines() {
        if old_remaining > 0 || new_remaining > 0 {
            let Some(current) = files.last_mut() else {
                break;
            };
            match line.as_bytes().first() {
                Some(b'+') => {
                    current.added.push(line[1..].to_string());
                    new_remaining = new_remaining.saturating_sub(1);
                }
                Some(b'-') => {
                    current.removed.push(line[1..].to_string());
                    old_remaining = old_remaining.saturating_sub(1);
                }
                Some(b'\\') => {}
                _ => {
                    old_remaining = old_remaining.saturating_sub(1);
                    new_remaining = new_remaining.saturating_sub(1);
                }
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            files.push(FileDiff {
                path: header_path(rest),
                ..FileDiff::default()
            });
        } else if let Some(current) = files.last_mut() {
            if line.starts_with("new file mode") {
                current.is_added_file = true;
            } else if line.starts_with("deleted file mode") {
                current.is_removed_file = true;
            } else if let Some(path) = line.strip_prefix("+++ ") {
                if let Some(path) = path.trim().strip_prefix("b/") {
                    current.path = path.to_string();
                }
            } else if let Some(path) = line.strip_prefix("rename to ") {
                current.path = path.trim().to_string();
            } else if let Some(header) = line.strip_prefix("@@ ") {
                let (old, new) = hunk_counts(header);
                old_remaining = old;
                new_remaining = new;
            }
        }
    }
    files
}

/// Post-image path from `a/<old> b/<new>`.
fn header_path(rest: &str) -> String {
    match rest.rsplit_once(" b/") {
        Some((_, path)) => path.trim().to_string(),
        None => rest.trim().to_string(),
    }
}

/// Line counts from `-a[,b] +c[,d] @@`. A missing count means one line.
fn hunk_counts(header: &str) -> (u64, u64) {
    let mut old = 0;
    let mut new = 0;
    for part in header.split_whitespace() {
        if let Some(range) = part.strip_prefix('-') {
            old = range_count(range);
        } else if let Some(range) = part.strip_prefix('+') {
            new = range_count(range);
        } else if part == "@@" {
            break;
        }
    }
    (old, new)
}

fn range_count(range: &str) -> u64 {
    match range.split_once(',') {
        Some((_, count)) => count.parse().unwrap_or(0),
        None => 1,
    }
}
