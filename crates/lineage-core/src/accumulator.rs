//! # Compile State
//!
//! Per-run accumulators threaded through one compile: the compound-name
//! registry, photo credits, running maxima and category counts.
//!
//! A `CompileState` is created by the assembler at the start of a run and
//! returned with the finished graph. Nothing here outlives the run.

use crate::photo::PhotoSlots;
use crate::{Category, LineageDate};
use std::collections::{BTreeMap, BTreeSet};

/// Accumulated statistics for one compile run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileState {
    /// Name-like values containing internal whitespace.
    pub compound_names: BTreeSet<String>,
    /// Photos credited per author.
    pub credits: BTreeMap<String, u64>,
    /// Highest photo-slot count of any single record.
    pub entity_photo_max: u32,
    /// Total photo slots across all records.
    pub photo_count: u64,
    /// Records loaded per category.
    pub category_counts: BTreeMap<Category, u64>,
    /// Most recent animal birthday seen.
    pub last_born: Option<LineageDate>,
    /// Most recent animal death seen.
    pub last_died: Option<LineageDate>,
}

impl CompileState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a compound name. The registry is a set, so insertion order and
    /// repeats do not matter.
    pub fn register_compound_name(&mut self, name: &str) {
        let name = name.trim();
        if name.split_whitespace().nth(1).is_some() {
            self.compound_names.insert(name.to_string());
        }
    }

    /// Count one loaded record.
    pub fn count_record(&mut self, category: Category) {
        *self.category_counts.entry(category).or_insert(0) += 1;
    }

    /// Fold one record's photo slots into the photo statistics.
    pub fn record_photos(&mut self, photos: &PhotoSlots) {
        let count = photos.len();
        self.photo_count = self.photo_count.saturating_add(count as u64);
        self.entity_photo_max = self
            .entity_photo_max
            .max(u32::try_from(count).unwrap_or(u32::MAX));
        for (_, slot) in photos.iter() {
            if let Some(author) = &slot.author {
                *self.credits.entry(author.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn observe_birth(&mut self, date: LineageDate) {
        self.last_born = Some(self.last_born.map_or(date, |d| d.max(date)));
    }

    pub fn observe_death(&mut self, date: LineageDate) {
        self.last_died = Some(self.last_died.map_or(date, |d| d.max(date)));
    }

    /// Credit count of an author, 0 if unknown.
    #[must_use]
    pub fn credit(&self, author: &str) -> u64 {
        self.credits.get(author).copied().unwrap_or(0)
    }
}
