//! # Photo Slots
//!
//! Entity records carry a numbered group of photo fields:
//!
//! ```text
//! photo.3: https://www.instagram.com/p/B1a2C3/media/?size=m
//! photo.3.author: someone
//! photo.3.commitdate: 2020/01/01
//! photo.3.link: https://www.instagram.com/someone/
//! photo.3.tags: portrait, tongue
//! photo.3.tags.12.location: 1, 3
//! ```
//!
//! On disk this is a flat set of dotted keys. In memory each index is one
//! `PhotoSlot`, and a record's slots are a `PhotoSlots` collection keyed by
//! the 1-based index.

use crate::config::ProviderConfig;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

// =============================================================================
// PHOTO SLOT
// =============================================================================

/// One numbered photo sub-record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhotoSlot {
    /// The media URI (`photo.N`).
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Kept verbatim; validated by the codec at compile time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitdate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Per-subject annotations (`photo.N.tags.<subject>.location`), media only.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub locations: BTreeMap<String, String>,
    /// Any other `photo.N.<key>` field, preserved verbatim.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl PhotoSlot {
    /// A slot holding only a URI.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Assign one field by its sub-key (the part after `photo.N`).
    ///
    /// An empty sub-key is the URI itself.
    pub fn set(&mut self, subkey: &str, value: &str) {
        match subkey {
            "" => self.uri = value.to_string(),
            "author" => self.author = Some(value.to_string()),
            "commitdate" => self.commitdate = Some(value.to_string()),
            "link" => self.link = Some(value.to_string()),
            "tags" => self.tags = split_list(value),
            other => {
                let subject = other
                    .strip_prefix("tags.")
                    .and_then(|rest| rest.strip_suffix(".location"));
                match subject {
                    Some(subject) if !subject.is_empty() => {
                        self.locations
                            .insert(subject.to_string(), value.to_string());
                    }
                    _ => {
                        self.extra.insert(other.to_string(), value.to_string());
                    }
                }
            }
        }
    }

    /// True when the field named by `subkey` is set.
    #[must_use]
    pub fn has(&self, subkey: &str) -> bool {
        match subkey {
            "" => !self.uri.is_empty(),
            "author" => self.author.is_some(),
            "commitdate" => self.commitdate.is_some(),
            "link" => self.link.is_some(),
            "tags" => !self.tags.is_empty(),
            other => {
                let subject = other
                    .strip_prefix("tags.")
                    .and_then(|rest| rest.strip_suffix(".location"));
                match subject {
                    Some(subject) if self.locations.contains_key(subject) => true,
                    _ => self.extra.contains_key(other),
                }
            }
        }
    }

    /// Flatten back to dotted `(key, value)` pairs for slot `index`.
    #[must_use]
    pub fn fields(&self, index: u32) -> Vec<(String, String)> {
        let base = format!("photo.{}", index);
        let mut out = vec![(base.clone(), self.uri.clone())];
        if let Some(author) = &self.author {
            out.push((format!("{}.author", base), author.clone()));
        }
        if let Some(date) = &self.commitdate {
            out.push((format!("{}.commitdate", base), date.clone()));
        }
        if let Some(link) = &self.link {
            out.push((format!("{}.link", base), link.clone()));
        }
        if !self.tags.is_empty() {
            out.push((format!("{}.tags", base), self.tags.join(", ")));
        }
        for (subject, location) in &self.locations {
            out.push((
                format!("{}.tags.{}.location", base, subject),
                location.clone(),
            ));
        }
        for (key, value) in &self.extra {
            out.push((format!("{}.{}", base, key), value.clone()));
        }
        out
    }
}

/// Split a comma / comma-space delimited value, dropping empty items.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// PHOTO SLOTS
// =============================================================================

/// The photo slots of one record, keyed by 1-based index.
///
/// At rest the indices are dense (`1..=len`). Gaps only exist between a
/// deletion and the following compaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoSlots(BTreeMap<u32, PhotoSlot>);

impl PhotoSlots {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, index: u32) -> Option<&PhotoSlot> {
        self.0.get(&index)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut PhotoSlot> {
        self.0.get_mut(&index)
    }

    /// Get the slot at `index`, creating an empty one if absent.
    pub fn entry(&mut self, index: u32) -> &mut PhotoSlot {
        self.0.entry(index).or_default()
    }

    pub fn insert(&mut self, index: u32, slot: PhotoSlot) -> Option<PhotoSlot> {
        self.0.insert(index, slot)
    }

    pub fn remove(&mut self, index: u32) -> Option<PhotoSlot> {
        self.0.remove(&index)
    }

    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.0.contains_key(&index)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest occupied index, 0 when empty.
    #[must_use]
    pub fn last_index(&self) -> u32 {
        self.0.keys().next_back().copied().unwrap_or(0)
    }

    /// True when slots occupy exactly `1..=len`.
    #[must_use]
    pub fn is_dense(&self) -> bool {
        self.0
            .keys()
            .enumerate()
            .all(|(position, index)| *index as usize == position + 1)
    }

    /// Slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &PhotoSlot)> {
        self.0.iter().map(|(index, slot)| (*index, slot))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut PhotoSlot)> {
        self.0.iter_mut().map(|(index, slot)| (*index, slot))
    }

    /// Occupied indices in order.
    #[must_use]
    pub fn indices(&self) -> Vec<u32> {
        self.0.keys().copied().collect()
    }
}

#[derive(Serialize)]
struct IndexedSlot<'a> {
    index: u32,
    #[serde(flatten)]
    slot: &'a PhotoSlot,
}

impl Serialize for PhotoSlots {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (index, slot) in self.iter() {
            seq.serialize_element(&IndexedSlot { index, slot })?;
        }
        seq.end()
    }
}

// =============================================================================
// PROVIDER LOCATOR
// =============================================================================

/// A media provider whose URIs embed an opaque, upload-ordered code.
///
/// Shorter codes are older; equal-length codes compare character by
/// character under the provider alphabet.
#[derive(Debug, Clone)]
pub struct ProviderLocator {
    prefix: String,
    shorthand: String,
    alphabet: Vec<char>,
}

impl ProviderLocator {
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            shorthand: config.shorthand.clone(),
            alphabet: config.alphabet.chars().collect(),
        }
    }

    /// The locator code of a URI, if it belongs to this provider.
    #[must_use]
    pub fn code<'a>(&self, uri: &'a str) -> Option<&'a str> {
        let uri = uri.trim();
        let rest = uri
            .strip_prefix(self.shorthand.as_str())
            .or_else(|| uri.strip_prefix(self.prefix.as_str()))?;
        let code = rest.split('/').next()?;
        if code.is_empty() { None } else { Some(code) }
    }

    /// Canonical form of a URI, used to detect duplicates.
    ///
    /// Provider URIs (including the shorthand) collapse to `<prefix><code>/`;
    /// other URIs are only trimmed.
    #[must_use]
    pub fn resolve(&self, uri: &str) -> String {
        match self.code(uri) {
            Some(code) => format!("{}{}/", self.prefix, code),
            None => uri.trim().to_string(),
        }
    }

    /// Chronological sort key of a code: length first, then per-character
    /// rank. Characters outside the alphabet rank after every known one.
    #[must_use]
    pub fn sort_key(&self, code: &str) -> (usize, Vec<usize>) {
        let ranks = code
            .chars()
            .map(|c| {
                self.alphabet
                    .iter()
                    .position(|a| *a == c)
                    .unwrap_or(self.alphabet.len())
            })
            .collect();
        (code.chars().count(), ranks)
    }
}

impl Default for ProviderLocator {
    fn default() -> Self {
        Self::new(&ProviderConfig::default())
    }
}

// =============================================================================
// TESTS
// =============================================================================
