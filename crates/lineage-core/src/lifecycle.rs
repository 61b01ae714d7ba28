//! # Photo-Slot Lifecycle
//!
//! Maintenance operations on the photo slots of a single record.
//!
//! Every operation:
//! - Touches exactly one record and never the compiled graph
//! - Is a no-op on a record that is already consistent
//! - Reports "nothing to do" through its return value, not an error
//!
//! Callers compose them, e.g. `delete` then `compact`, and persist the
//! result through `PhotoFile::save`.

use crate::codec::Record;
use crate::photo::{PhotoSlot, ProviderLocator};
use crate::primitives::MAX_PHOTO_INDEX;
use crate::provenance::{EntityKey, Provenance};
use crate::{LineageDate, LineageError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

impl Record {
    /// Remove slot `index` and all of its fields.
    ///
    /// Returns false when the slot does not exist.
    pub fn delete(&mut self, index: u32) -> bool {
        self.photos.remove(index).is_some()
    }

    /// Close every gap in the slot numbering, keeping relative order.
    ///
    /// `upper_bound` is the dataset-wide maximum slot count. Slots above it
    /// are still moved down, so the result is always dense.
    ///
    /// Returns true if any slot changed index.
    pub fn compact(&mut self, upper_bound: u32) -> bool {
        let last = self.photos.last_index();
        if last > upper_bound {
            debug!(last, upper_bound, "slot index above the dataset maximum");
        }
        let mut changed = false;
        for (next, index) in (1u32..).zip(self.photos.indices()) {
            if index == next {
                continue;
            }
            if let Some(slot) = self.photos.remove(index) {
                self.photos.insert(next, slot);
                changed = true;
            }
        }
        changed
    }

    /// Reorder provider slots into upload order.
    ///
    /// Slots whose URI belongs to the provider are sorted by locator code and
    /// placed in the lowest indices not held by other slots. Other slots keep
    /// their index.
    ///
    /// Returns true if any slot changed index.
    pub fn reorder_by_provider_locator(&mut self, provider: &ProviderLocator) -> bool {
        let mut fixed: BTreeSet<u32> = BTreeSet::new();
        let mut staged: Vec<((usize, Vec<usize>), u32)> = Vec::new();
        for (index, slot) in self.photos.iter() {
            match provider.code(&slot.uri) {
                Some(code) => staged.push((provider.sort_key(code), index)),
                None => {
                    fixed.insert(index);
                }
            }
        }
        staged.sort();

        let mut moved: Vec<(u32, PhotoSlot)> = Vec::with_capacity(staged.len());
        let mut changed = false;
        let mut candidate = 1;
        for (_, old_index) in staged {
            while fixed.contains(&candidate) {
                candidate += 1;
            }
            if candidate != old_index {
                changed = true;
            }
            if let Some(slot) = self.photos.remove(old_index) {
                moved.push((candidate, slot));
            }
            candidate += 1;
        }
        for (index, slot) in moved {
            self.photos.insert(index, slot);
        }
        changed
    }

    /// Merge slots that share a resolved URI into the lowest-indexed one.
    ///
    /// The survivor gets the sorted union of tags, the earliest valid commit
    /// date, and any author, link or annotation it was missing. The
    /// redundant slots are deleted and the record is compacted.
    ///
    /// Returns the number of slots removed.
    pub fn merge_duplicates(&mut self, provider: &ProviderLocator, upper_bound: u32) -> usize {
        let mut keepers: BTreeMap<String, u32> = BTreeMap::new();
        let mut merges: Vec<(u32, u32)> = Vec::new();
        for (index, slot) in self.photos.iter() {
            let resolved = provider.resolve(&slot.uri);
            match keepers.get(&resolved) {
                Some(keeper) => merges.push((*keeper, index)),
                None => {
                    keepers.insert(resolved, index);
                }
            }
        }
        for (keeper, duplicate) in &merges {
            let Some(extra) = self.photos.remove(*duplicate) else {
                continue;
            };
            if let Some(survivor) = self.photos.get_mut(*keeper) {
                absorb(survivor, extra);
            }
        }
        self.compact(upper_bound);
        merges.len()
    }

    /// Delete every slot credited to `author`, then compact.
    ///
    /// Returns the number of slots removed.
    pub fn remove_author(&mut self, author: &str, upper_bound: u32) -> usize {
        let doomed: Vec<u32> = self
            .photos
            .iter()
            .filter(|(_, slot)| slot.author.as_deref() == Some(author))
            .map(|(index, _)| index)
            .collect();
        for index in &doomed {
            self.delete(*index);
        }
        if !doomed.is_empty() {
            self.compact(upper_bound);
        }
        doomed.len()
    }

    /// Append slots after the current last index, in the given order.
    ///
    /// Returns the indices assigned.
    ///
    /// # Errors
    /// `LineageError::Format` when an index would exceed `MAX_PHOTO_INDEX`;
    /// the record is left unchanged.
    pub fn append_slots(&mut self, slots: Vec<PhotoSlot>) -> Result<Vec<u32>, LineageError> {
        let last = self.photos.last_index();
        let count = u32::try_from(slots.len()).unwrap_or(u32::MAX);
        if last.checked_add(count).is_none_or(|end| end > MAX_PHOTO_INDEX) {
            return Err(LineageError::format(
                "",
                format!("photo.{}", last),
                count.to_string(),
                format!("cannot append past photo index {}", MAX_PHOTO_INDEX),
            ));
        }
        let assigned: Vec<u32> = (last + 1..=last + count).collect();
        for (index, slot) in assigned.iter().zip(slots) {
            self.photos.insert(*index, slot);
        }
        Ok(assigned)
    }

    /// Fill commit dates from mined provenance.
    ///
    /// The record-level `commitdate` comes from `entity_first_seen[key]`,
    /// each photo's from `uri_first_seen[uri]`. Existing dates are only
    /// replaced when `force` is set.
    ///
    /// Returns the number of dates written.
    pub fn backfill_commit_dates(
        &mut self,
        key: Option<&EntityKey>,
        provenance: &Provenance,
        force: bool,
    ) -> usize {
        let mut written = 0;

        if let Some(date) = key.and_then(|k| provenance.entity_first_seen.get(k)) {
            let date = date.to_string();
            let current = self.fields.get("commitdate");
            if current.is_none() || (force && current != Some(&date)) {
                self.fields.insert("commitdate".to_string(), date);
                written += 1;
            }
        }

        for (_, slot) in self.photos.iter_mut() {
            let Some(date) = provenance.uri_first_seen.get(&slot.uri) else {
                continue;
            };
            let date = date.to_string();
            let replace = match &slot.commitdate {
                None => true,
                Some(current) => force && *current != date,
            };
            if replace {
                slot.commitdate = Some(date);
                written += 1;
            }
        }
        written
    }
}

/// Fold a duplicate slot into its survivor.
fn absorb(survivor: &mut PhotoSlot, duplicate: PhotoSlot) {
    let mut tags: BTreeSet<String> = survivor.tags.drain(..).collect();
    tags.extend(duplicate.tags);
    survivor.tags = tags.into_iter().collect();

    let earliest = match (
        survivor.commitdate.as_deref().and_then(LineageDate::parse),
        duplicate.commitdate.as_deref().and_then(LineageDate::parse),
    ) {
        (Some(kept), Some(other)) if other < kept => Some(other),
        (None, Some(other)) => Some(other),
        _ => None,
    };
    if let Some(date) = earliest {
        survivor.commitdate = Some(date.to_string());
    }

    if survivor.author.is_none() {
        survivor.author = duplicate.author;
    }
    if survivor.link.is_none() {
        survivor.link = duplicate.link;
    }
    for (subject, location) in duplicate.locations {
        survivor.locations.entry(subject).or_insert(location);
    }
    for (key, value) in duplicate.extra {
        survivor.extra.entry(key).or_insert(value);
    }
}

// =============================================================================
// PHOTO FILE
// =============================================================================

/// A record file opened for maintenance.
#[derive(Debug, Clone)]
pub struct PhotoFile {
    path: PathBuf,
    pub record: Record,
}

impl PhotoFile {
    /// Read and parse a record file.
    pub fn load(path: &Path) -> Result<Self, LineageError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LineageError::Io(format!("{}: {}", path.display(), e)))?;
        let record = Record::parse(&text, &path.display().to_string())?;
        Ok(Self {
            path: path.to_path_buf(),
            record,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the whole file from the in-memory record.
    pub fn save(&self) -> Result<(), LineageError> {
        std::fs::write(&self.path, self.record.to_text())
            .map_err(|e| LineageError::Io(format!("{}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), photos = self.record.photos.len(), "record saved");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(uri: &str) -> PhotoSlot {
        PhotoSlot::new(uri)
    }

    fn record_with(indices: &[(u32, &str)]) -> Record {
        let mut record = Record::new("panda");
        for (index, uri) in indices {
            record.photos.insert(*index, slot(uri));
        }
        record
    }

    fn uris(record: &Record) -> Vec<(u32, String)> {
        record
            .photos
            .iter()
            .map(|(i, s)| (i, s.uri.clone()))
            .collect()
    }

    #[test]
    fn delete_absent_slot_is_false() {
        let mut record = record_with(&[(1, "a")]);
        assert!(!record.delete(2));
        assert!(record.delete(1));
        assert!(record.photos.is_empty());
    }

    #[test]
    fn delete_removes_annotations() {
        let mut record = Record::new("media");
        let mut group = slot("a");
        group.locations.insert("4".to_string(), "1".to_string());
        record.photos.insert(1, group);
        assert!(record.delete(1));
        assert!(!record.to_text().contains("location"));
    }

    #[test]
    fn compact_fills_holes_in_order() {
        let mut record = record_with(&[(1, "a"), (3, "c"), (6, "f")]);
        assert!(record.compact(10));
        assert_eq!(
            uris(&record),
            vec![(1, "a".into()), (2, "c".into()), (3, "f".into())]
        );
        assert!(!record.compact(10));
    }

    #[test]
    fn compact_ignores_stale_upper_bound() {
        let mut record = record_with(&[(2, "b"), (9, "i")]);
        assert!(record.compact(3));
        assert!(record.photos.is_dense());
        assert_eq!(record.photos.len(), 2);
    }

    #[test]
    fn reorder_keeps_foreign_slots_in_place() {
        let provider = ProviderLocator::default();
        let p = |code: &str| format!("https://www.instagram.com/p/{}/media/?size=m", code);
        let (b, a, long) = (p("Bb"), p("Ab"), p("AAA"));
        let mut record = record_with(&[
            (1, long.as_str()),
            (2, "https://example.com/x.jpg"),
            (3, b.as_str()),
            (4, a.as_str()),
        ]);

        assert!(record.reorder_by_provider_locator(&provider));
        assert_eq!(
            uris(&record),
            vec![
                (1, a.clone()),
                (2, "https://example.com/x.jpg".to_string()),
                (3, b.clone()),
                (4, long.clone()),
            ]
        );
        assert!(!record.reorder_by_provider_locator(&provider));
    }

    #[test]
    fn merge_duplicates_example() {
        let provider = ProviderLocator::default();
        let mut record = Record::new("panda");
        let mut first = slot("X");
        first.tags = vec!["a".to_string()];
        first.commitdate = Some("2020/01/01".to_string());
        let mut second = slot("X");
        second.tags = vec!["b".to_string()];
        second.commitdate = Some("2020/02/01".to_string());
        record.photos.insert(1, first);
        record.photos.insert(2, second);
        record.photos.insert(3, slot("Y"));

        assert_eq!(record.merge_duplicates(&provider, 3), 1);
        let merged = record.photos.get(1).expect("survivor");
        assert_eq!(merged.tags, vec!["a", "b"]);
        assert_eq!(merged.commitdate.as_deref(), Some("2020/01/01"));
        assert_eq!(record.photos.get(2).map(|s| s.uri.as_str()), Some("Y"));
        assert!(record.photos.is_dense());
        assert_eq!(record.merge_duplicates(&provider, 3), 0);
    }

    #[test]
    fn merge_takes_earlier_date_from_duplicate() {
        let provider = ProviderLocator::default();
        let mut record = Record::new("panda");
        let mut first = slot("ig://Abc");
        first.commitdate = Some("2021/05/05".to_string());
        let mut second = slot("https://www.instagram.com/p/Abc/");
        second.commitdate = Some("2019/5/5".to_string());
        second.author = Some("bob".to_string());
        record.photos.insert(1, first);
        record.photos.insert(2, second);

        assert_eq!(record.merge_duplicates(&provider, 2), 1);
        let merged = record.photos.get(1).expect("survivor");
        assert_eq!(merged.commitdate.as_deref(), Some("2019/05/05"));
        assert_eq!(merged.author.as_deref(), Some("bob"));
    }

    #[test]
    fn remove_author_then_compact() {
        let mut record = record_with(&[(1, "a"), (2, "b"), (3, "c")]);
        if let Some(s) = record.photos.get_mut(2) {
            s.author = Some("gone".to_string());
        }
        assert_eq!(record.remove_author("gone", 3), 1);
        assert_eq!(uris(&record), vec![(1, "a".into()), (2, "c".into())]);
        assert_eq!(record.remove_author("gone", 3), 0);
    }

    #[test]
    fn append_starts_after_last_index() {
        let mut record = record_with(&[(1, "a"), (2, "b")]);
        let assigned = record.append_slots(vec![slot("c"), slot("d")]).expect("append");
        assert_eq!(assigned, vec![3, 4]);
    }

    #[test]
    fn append_past_max_index_fails_without_change() {
        let mut record = record_with(&[(MAX_PHOTO_INDEX - 1, "a")]);
        assert!(matches!(
            record.append_slots(vec![slot("b"), slot("c")]),
            Err(LineageError::Format { .. })
        ));
        assert_eq!(record.photos.len(), 1);

        let mut full = record_with(&[(u32::MAX, "a")]);
        assert!(full.append_slots(vec![slot("b")]).is_err());
    }

    #[test]
    fn compact_walks_occupied_slots_only() {
        let mut record = record_with(&[(2, "b"), (u32::MAX, "z")]);
        assert!(record.compact(0));
        assert_eq!(uris(&record), vec![(1, "b".into()), (2, "z".into())]);
    }

    #[test]
    fn backfill_respects_force() {
        let mut provenance = Provenance::default();
        let date = LineageDate::from_ymd(2019, 3, 4).expect("date");
        provenance.uri_first_seen.insert("a".to_string(), date);
        let key = EntityKey::new("panda", "12");
        provenance.entity_first_seen.insert(key.clone(), date);

        let mut record = record_with(&[(1, "a"), (2, "b")]);
        if let Some(s) = record.photos.get_mut(1) {
            s.commitdate = Some("2020/01/01".to_string());
        }

        assert_eq!(record.backfill_commit_dates(Some(&key), &provenance, false), 1);
        assert_eq!(record.field("commitdate"), Some("2019/03/04"));
        assert_eq!(
            record.photos.get(1).and_then(|s| s.commitdate.as_deref()),
            Some("2020/01/01")
        );

        assert_eq!(record.backfill_commit_dates(Some(&key), &provenance, true), 1);
        assert_eq!(
            record.photos.get(1).and_then(|s| s.commitdate.as_deref()),
            Some("2019/03/04")
        );
        assert_eq!(record.backfill_commit_dates(Some(&key), &provenance, true), 0);
    }

    #[test]
    fn photo_file_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("0012_bao.txt");
        std::fs::write(&path, "[panda]\n_id: 12\nphoto.1: a\nphoto.3: c\n").expect("write");

        let mut file = PhotoFile::load(&path).expect("load");
        assert!(file.record.compact(3));
        file.save().expect("save");

        let reloaded = PhotoFile::load(&path).expect("reload");
        assert_eq!(reloaded.record.photos.indices(), vec![1, 2]);
    }
}
