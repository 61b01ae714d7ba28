//! # Record Codec
//!
//! Reads and writes the plain-text record format:
//!
//! ```text
//! [panda]
//! _id: 12
//! en.name: Harumaki
//! birthday: 2015/6/27
//! photo.1: https://www.instagram.com/p/B1a2C3/
//! photo.1.author: someone
//! ```
//!
//! `Record` is the lossless, syntactic view used by maintenance operations.
//! `Normalizer` turns a `Record` into a typed `FieldMap` for the assembler,
//! enforcing the per-field format rules.

use crate::accumulator::CompileState;
use crate::config::ValidationConfig;
use crate::photo::{PhotoSlots, split_list};
use crate::primitives::{
    ABSENT_SENTINELS, DATE_FIELDS, LIST_FIELD_SUFFIXES, LIST_FIELDS, MAX_PHOTO_INDEX,
};
use crate::{Category, FieldMap, FieldValue, Gender, LineageDate, LineageError};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// =============================================================================
// RECORD
// =============================================================================

/// One record file, split into plain fields and photo slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Section name from the `[section]` header.
    pub section: String,
    /// Every field that is not part of a photo slot, verbatim.
    pub fields: BTreeMap<String, String>,
    /// The numbered photo slots.
    pub photos: PhotoSlots,
}

impl Record {
    /// An empty record with the given section.
    #[must_use]
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            ..Self::default()
        }
    }

    /// Parse record text. `path` is only used in error messages.
    ///
    /// # Errors
    /// Returns `LineageError::Format` for a missing or repeated section
    /// header, a line without a `:` delimiter, a repeated key, or a photo
    /// index above `MAX_PHOTO_INDEX`.
    pub fn parse(text: &str, path: &str) -> Result<Self, LineageError> {
        let mut section: Option<String> = None;
        let mut entries: Vec<(String, String)> = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            // Continuation of the previous value.
            if line.starts_with([' ', '\t']) {
                match entries.last_mut() {
                    Some((_, value)) => {
                        value.push('\n');
                        value.push_str(trimmed);
                        continue;
                    }
                    None => {
                        return Err(LineageError::format(
                            path,
                            "",
                            trimmed,
                            "continuation line without a preceding field",
                        ));
                    }
                }
            }

            if let Some(name) = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            {
                if let Some(existing) = &section {
                    return Err(LineageError::format(
                        path,
                        "section",
                        name,
                        format!("record already has section [{}]", existing),
                    ));
                }
                section = Some(name.trim().to_string());
                continue;
            }

            let Some((key, value)) = trimmed.split_once(':') else {
                return Err(LineageError::format(
                    path,
                    "",
                    trimmed,
                    "expected `key: value`",
                ));
            };
            if section.is_none() {
                return Err(LineageError::format(
                    path,
                    "section",
                    key.trim(),
                    "field appears before the section header",
                ));
            }
            entries.push((key.trim().to_string(), value.trim().to_string()));
        }

        let Some(section) = section else {
            return Err(LineageError::format(
                path,
                "section",
                "",
                "missing section header",
            ));
        };

        let mut record = Self::new(section);
        for (key, value) in entries {
            if record.has_key(&key) {
                return Err(LineageError::format(path, key, value, "repeated field"));
            }
            if split_photo_key(&key).is_some_and(|(index, _)| index > MAX_PHOTO_INDEX) {
                return Err(LineageError::format(
                    path,
                    key,
                    value,
                    format!("photo index above {}", MAX_PHOTO_INDEX),
                ));
            }
            record.set(&key, &value);
        }
        Ok(record)
    }

    /// True when `key` is present, as a plain field or a photo field.
    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        match split_photo_key(key) {
            Some((index, subkey)) => self
                .photos
                .get(index)
                .is_some_and(|slot| slot.has(subkey)),
            None => self.fields.contains_key(key),
        }
    }

    /// Assign a field by its dotted key. Photo keys land in their slot.
    pub fn set(&mut self, key: &str, value: &str) {
        match split_photo_key(key) {
            Some((index, subkey)) => self.photos.entry(index).set(subkey, value),
            None => {
                self.fields.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Plain field value.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// All `(key, value)` pairs in number-sensitive key order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (index, slot) in self.photos.iter() {
            entries.extend(slot.fields(index));
        }
        entries.sort_by(|a, b| number_sensitive_cmp(&a.0, &b.0));
        entries
    }

    /// Serialize back to record text.
    ///
    /// Multi-line values are written with tab-indented continuation lines.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = format!("[{}]\n", self.section);
        for (key, value) in self.entries() {
            out.push_str(&key);
            out.push_str(": ");
            out.push_str(&value.replace('\n', "\n\t"));
            out.push('\n');
        }
        out
    }
}

/// Split `photo.N[.sub]` into `(N, sub)`. Any other key yields `None`.
#[must_use]
pub fn split_photo_key(key: &str) -> Option<(u32, &str)> {
    let rest = key.strip_prefix("photo.")?;
    let (number, subkey) = match rest.split_once('.') {
        Some((number, subkey)) => (number, subkey),
        None => (rest, ""),
    };
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = number.parse::<u32>().ok()?;
    if index == 0 {
        return None;
    }
    Some((index, subkey))
}

/// Compare dotted keys component by component.
///
/// Numeric components compare as numbers and sort before words, so
/// `photo.2` precedes `photo.10` and `photo.2` precedes `photo.2.author`.
#[must_use]
pub fn number_sensitive_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (numeric(x), numeric(y)) {
                    (Some(m), Some(n)) => m.cmp(&n).then_with(|| x.cmp(y)),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => x.cmp(y),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn numeric(component: &str) -> Option<u64> {
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    component.parse().ok()
}

// =============================================================================
// NORMALIZER
// =============================================================================

/// True for `none` / `unknown` in any letter case.
#[must_use]
pub fn is_absent(value: &str) -> bool {
    let value = value.trim();
    ABSENT_SENTINELS
        .iter()
        .any(|sentinel| value.eq_ignore_ascii_case(sentinel))
}

/// True for fields holding a display name.
#[must_use]
pub fn is_name_field(key: &str) -> bool {
    key == "name"
        || key.ends_with(".name")
        || key.ends_with(".nicknames")
        || key.ends_with(".othernames")
}

fn is_list_field(key: &str) -> bool {
    LIST_FIELDS.contains(&key) || LIST_FIELD_SUFFIXES.iter().any(|s| key.ends_with(s))
}

/// `location.N` field names.
#[must_use]
pub fn is_location_event(key: &str) -> bool {
    key.strip_prefix("location.")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Split a `location.N` value into its location reference and optional date.
#[must_use]
pub fn split_location_event(value: &str) -> (&str, Option<&str>) {
    match value.split_once(',') {
        Some((location, date)) => (location.trim(), Some(date.trim())),
        None => (value.trim(), None),
    }
}

/// Applies the per-field format rules to a parsed record.
#[derive(Debug, Clone)]
pub struct Normalizer {
    max_name_length: usize,
}

impl Normalizer {
    #[must_use]
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            max_name_length: config.max_name_length,
        }
    }

    /// Produce the typed field map of a record.
    ///
    /// Sentinel values are dropped, dates are zero-padded, genders are
    /// canonicalized and list fields are split. Compound names are added to
    /// `state`.
    ///
    /// # Errors
    /// Returns `LineageError::Format` naming the first offending field.
    pub fn normalize(
        &self,
        record: &Record,
        category: Category,
        path: &str,
        state: &mut CompileState,
    ) -> Result<FieldMap, LineageError> {
        if record.section != category.section() {
            return Err(LineageError::format(
                path,
                "section",
                record.section.as_str(),
                format!("expected [{}]", category.section()),
            ));
        }

        let mut fields = FieldMap::new();
        for (key, value) in &record.fields {
            if is_absent(value) {
                continue;
            }
            let normalized = self.normalize_field(key, value, path, state)?;
            fields.insert(key.as_str(), normalized);
        }

        for (index, slot) in record.photos.iter() {
            if let Some(date) = &slot.commitdate {
                if !is_absent(date) && LineageDate::parse(date).is_none() {
                    return Err(LineageError::format(
                        path,
                        format!("photo.{}.commitdate", index),
                        date.as_str(),
                        "expected a calendar date as YYYY/MM/DD",
                    ));
                }
            }
        }

        Ok(fields)
    }

    fn normalize_field(
        &self,
        key: &str,
        value: &str,
        path: &str,
        state: &mut CompileState,
    ) -> Result<FieldValue, LineageError> {
        if DATE_FIELDS.contains(&key) {
            let date = LineageDate::parse(value).ok_or_else(|| {
                LineageError::format(path, key, value, "expected a calendar date as YYYY/MM/DD")
            })?;
            return Ok(FieldValue::Text(date.to_string()));
        }

        if key == "gender" {
            let gender = Gender::from_token(value).ok_or_else(|| {
                LineageError::format(path, key, value, "unrecognized gender token")
            })?;
            return Ok(FieldValue::Text(gender.as_str().to_string()));
        }

        if is_location_event(key) {
            if let (_, Some(date)) = split_location_event(value) {
                if LineageDate::parse(date).is_none() {
                    return Err(LineageError::format(
                        path,
                        key,
                        value,
                        "location date must be YYYY/MM/DD",
                    ));
                }
            }
            return Ok(FieldValue::Text(value.to_string()));
        }

        let normalized = if is_list_field(key) {
            FieldValue::List(split_list(value))
        } else {
            FieldValue::Text(value.to_string())
        };

        if is_name_field(key) {
            for name in normalized.as_list() {
                if name.chars().count() > self.max_name_length {
                    return Err(LineageError::format(
                        path,
                        key,
                        name.as_str(),
                        format!("longer than {} characters", self.max_name_length),
                    ));
                }
                state.register_compound_name(&name);
            }
        }

        Ok(normalized)
    }
}

// =============================================================================
// TESTS
// =============================================================================
