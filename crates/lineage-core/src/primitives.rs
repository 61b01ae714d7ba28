//! # Dataset Primitives
//!
//! Hardcoded constants for the lineage compiler.
//!
//! Most of these are defaults: `LineageConfig` can override the ones that
//! describe repository layout or validation bounds.

/// Maximum number of characters in a name-like field.
///
/// Applies to animals, locations, and media alike and keeps text layout
/// manageable downstream.
pub const MAX_NAME_LENGTH: usize = 80;

/// Tolerance, in days, between the birth dates of two litter mates.
///
/// Birth dates exactly this many days apart still pass; one more day fails.
pub const LITTER_TOLERANCE_DAYS: i64 = 2;

/// Maximum number of parent edges a single animal may have.
pub const MAX_PARENTS: usize = 2;

/// Highest photo slot index a record may use.
pub const MAX_PHOTO_INDEX: u32 = 100_000;

/// How far back the recent-activity digest looks, in seconds (7 days).
pub const RECENT_WINDOW_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Sentinel values meaning "explicitly absent". Compared case-insensitively.
pub const ABSENT_SENTINELS: [&str; 2] = ["none", "unknown"];

/// Fields whose values are comma-delimited lists.
pub const LIST_FIELDS: [&str; 4] = ["children", "litter", "panda.tags", "language.order"];

/// Suffixes of list-valued, name-like fields (`en.nicknames`).
pub const LIST_FIELD_SUFFIXES: [&str; 2] = [".nicknames", ".othernames"];

/// Fields holding a single `YYYY/MM/DD` date.
pub const DATE_FIELDS: [&str; 4] = ["birthday", "death", "date", "commitdate"];

/// Fields that place an animal at a location.
pub const PLACEMENT_FIELDS: [&str; 3] = ["birthplace", "zoo", "wild"];

/// Default data directories, relative to the repository root.
pub const ZOO_DIR: &str = "zoos";
pub const WILD_DIR: &str = "wild";
pub const PANDA_DIR: &str = "pandas";
pub const MEDIA_DIR: &str = "media";
pub const LINK_DIR: &str = "links";

/// Default export document path, relative to the repository root.
pub const EXPORT_PATH: &str = "export/redpanda.json";

/// Extension of record files.
pub const RECORD_EXTENSION: &str = "txt";

/// Default media provider whose URIs encode upload order.
pub const PROVIDER_PREFIX: &str = "https://www.instagram.com/p/";

/// Shorthand scheme for provider URIs (`ig://<code>`).
pub const PROVIDER_SHORTHAND: &str = "ig://";

/// Provider code alphabet, in chronological rank order.
pub const PROVIDER_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_alphabet_has_unique_symbols() {
        let mut chars: Vec<char> = PROVIDER_ALPHABET.chars().collect();
        let total = chars.len();
        chars.sort_unstable();
        chars.dedup();
        assert_eq!(chars.len(), total);
        assert_eq!(total, 64);
    }

    #[test]
    fn recent_window_is_one_week() {
        assert_eq!(RECENT_WINDOW_SECONDS, 604_800);
    }
}
