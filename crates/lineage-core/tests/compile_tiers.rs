//! # Compile Tier Tests (T0-T4)
//!
//! If ANY tier fails, the compiled dataset cannot be trusted.
//!
//! ## Tiers
//! - T0: Record Integrity
//! - T1: Assembly & References
//! - T2: Whole-Dataset Validation
//! - T3: Photo-Slot Maintenance
//! - T4: Provenance

#![allow(clippy::panic)]

use chrono::{DateTime, FixedOffset};
use lineage_core::{
    Assembler, Category, EdgeLabel, ExportDocument, LayoutConfig, LineageConfig, LineageDate,
    LineageError, MemoryHistory, MemoryRecordStore, PhotoSlot, ProviderLocator, ProvenanceMiner,
    Record, RecentDigest, ValidationConfig, VertexId,
};

fn at(stamp: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(stamp).expect("timestamp")
}

fn base_store() -> MemoryRecordStore {
    MemoryRecordStore::new(LayoutConfig::default())
        .with("zoos/china/0007_chengdu.txt", "[zoo]\n_id: 7\nen.name: Chengdu Base\n")
        .with(
            "pandas/china/7_chengdu/0005_hua.txt",
            "[panda]\n_id: 5\nen.name: Hua\nbirthday: 2012/07/04\ngender: Female\nzoo: 7\n",
        )
}

fn validation_error(result: Result<lineage_core::Compilation, LineageError>) -> Vec<LineageError> {
    match result {
        Err(LineageError::Validation(failure)) => failure.errors,
        Err(other) => vec![other],
        Ok(_) => Vec::new(),
    }
}

// =============================================================================
// TIER T0: RECORD INTEGRITY
// =============================================================================

mod t0_record_integrity {
    use super::*;

    /// T0.1: Written records parse back to the same record.
    #[test]
    fn write_then_parse_is_stable() {
        let text = "[panda]\n_id: 3\nen.name: Lai Lai\nphoto.10: https://e.com/10.jpg\n\
                    photo.2: https://e.com/2.jpg\nphoto.2.tags: 3, 4\n\
                    en.notes: first line\n  second line\n";
        let record = Record::parse(text, "pandas/x/0003_lai.txt").expect("parse");
        let written = record.to_text();
        let reparsed = Record::parse(&written, "pandas/x/0003_lai.txt").expect("reparse");
        assert_eq!(record, reparsed);
        assert_eq!(written, reparsed.to_text());
    }

    /// T0.2: Photo keys are written in number-sensitive order.
    #[test]
    fn photo_keys_sort_numerically() {
        let record = Record::parse(
            "[panda]\nphoto.10: https://e.com/10.jpg\nphoto.2: https://e.com/2.jpg\n",
            "p.txt",
        )
        .expect("parse");
        let text = record.to_text();
        let two = text.find("photo.2:").expect("photo.2");
        let ten = text.find("photo.10:").expect("photo.10");
        assert!(two < ten);
    }

    /// T0.3: A second section header is a format error.
    #[test]
    fn repeated_section_rejected() {
        let result = Record::parse("[panda]\n_id: 1\n[panda]\n", "p.txt");
        assert!(matches!(result, Err(LineageError::Format { .. })));
    }

    /// T0.4: Malformed genders abort the compile.
    #[test]
    fn bad_gender_aborts_compile() {
        let store = base_store().with(
            "pandas/china/7_chengdu/0006_x.txt",
            "[panda]\n_id: 6\ngender: maybe\nzoo: 7\n",
        );
        let result = Assembler::new(&LineageConfig::default()).compile(&store, None);
        assert!(matches!(result, Err(LineageError::Format { .. })));
    }
}

// =============================================================================
// TIER T1: ASSEMBLY & REFERENCES
// =============================================================================

mod t1_assembly {
    use super::*;

    /// T1.1: Managed location 7 lives at -7; animal 5 lives at 5.
    #[test]
    fn managed_locations_are_negated() {
        let compilation = Assembler::new(&LineageConfig::default())
            .compile(&base_store(), None)
            .expect("compile");
        let graph = &compilation.graph;

        let zoo = graph.vertex(&VertexId::Entity(-7)).expect("zoo");
        assert_eq!(zoo.category(), Category::ManagedLocation);
        let panda = graph.vertex(&VertexId::Entity(5)).expect("panda");
        assert_eq!(panda.category(), Category::Animal);
        assert!(graph.vertex(&VertexId::Entity(7)).is_none());

        let placements: Vec<_> = graph.placements(&VertexId::Entity(5)).collect();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].into, VertexId::Entity(-7));
        assert_eq!(placements[0].label, EdgeLabel::Placement);
    }

    /// T1.2: An animal can never take a managed location's id.
    #[test]
    fn negative_animal_id_rejected() {
        let store = base_store().with("pandas/china/7_chengdu/0007_x.txt", "[panda]\n_id: -7\n");
        let result = Assembler::new(&LineageConfig::default()).compile(&store, None);
        assert!(result.is_err());
    }

    /// T1.3: A birthplace that was never loaded fails before validation.
    #[test]
    fn dangling_birthplace_is_reference_error() {
        // Also a duplicate id, which only the validator would report.
        let store = base_store().with(
            "pandas/china/7_chengdu/0005_dup.txt",
            "[panda]\n_id: 5\nbirthplace: 99\nzoo: 7\n",
        );
        let result = Assembler::new(&LineageConfig::default()).compile(&store, None);
        assert!(matches!(result, Err(LineageError::Reference { .. })));
    }

    /// T1.4: Family edges carry their confidence.
    #[test]
    fn family_edges_carry_confidence() {
        let store = base_store()
            .with(
                "pandas/china/7_chengdu/0008_mom.txt",
                "[panda]\n_id: 8\nbirthday: 2005/08/01\nzoo: 7\nchildren: 5(80%)\n",
            );
        let compilation = Assembler::new(&LineageConfig::default())
            .compile(&store, None)
            .expect("compile");
        let parents: Vec<_> = compilation.graph.parents(&VertexId::Entity(5)).collect();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].confidence, Some(80));
    }
}

// =============================================================================
// TIER T2: WHOLE-DATASET VALIDATION
// =============================================================================

mod t2_validation {
    use super::*;

    fn twins(second_birthday: &str) -> MemoryRecordStore {
        base_store()
            .with(
                "pandas/china/7_chengdu/0010_a.txt",
                "[panda]\n_id: 10\nbirthday: 2020/01/01\nzoo: 7\nlitter: 11\n",
            )
            .with(
                "pandas/china/7_chengdu/0011_b.txt",
                format!("[panda]\n_id: 11\nbirthday: {}\nzoo: 7\nlitter: 10\n", second_birthday),
            )
    }

    fn config(tolerance: i64) -> LineageConfig {
        LineageConfig {
            validation: ValidationConfig {
                litter_tolerance_days: tolerance,
                ..ValidationConfig::default()
            },
            ..LineageConfig::default()
        }
    }

    /// T2.1: Two days apart passes at the default tolerance of two days.
    #[test]
    fn litter_two_days_passes_by_default() {
        let result = Assembler::new(&LineageConfig::default()).compile(&twins("2020/01/03"), None);
        assert!(result.is_ok());
    }

    /// T2.2: Two days apart fails at a one-day tolerance.
    #[test]
    fn litter_two_days_fails_at_one() {
        let errors = validation_error(Assembler::new(&config(1)).compile(&twins("2020/01/03"), None));
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LineageError::DateConsistency { .. }));
    }

    /// T2.3: Duplicate animal ids name both records.
    #[test]
    fn duplicate_animal_ids_name_both() {
        let store = base_store().with(
            "pandas/china/7_chengdu/0005_other.txt",
            "[panda]\n_id: 5\nen.name: Other Hua\nzoo: 7\n",
        );
        let errors = validation_error(Assembler::new(&LineageConfig::default()).compile(&store, None));
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            LineageError::DuplicateId { names, .. } => {
                assert!(names.contains(&"Hua".to_string()));
                assert!(names.contains(&"Other Hua".to_string()));
            }
            other => panic!("expected duplicate id, got {:?}", other),
        }
    }

    /// T2.4: Every violation is reported, not just the first.
    #[test]
    fn violations_are_collected() {
        let store = twins("2020/03/01")
            .with(
                "pandas/china/7_chengdu/0005_other.txt",
                "[panda]\n_id: 5\nen.name: Other\nzoo: 7\n",
            );
        let errors = validation_error(Assembler::new(&LineageConfig::default()).compile(&store, None));
        assert_eq!(errors.len(), 2);
    }

    /// T2.5: A parent born after its child is rejected.
    #[test]
    fn parent_younger_than_child_rejected() {
        let store = base_store().with(
            "pandas/china/7_chengdu/0008_mom.txt",
            "[panda]\n_id: 8\nbirthday: 2018/01/01\nzoo: 7\nchildren: 5\n",
        );
        let errors = validation_error(Assembler::new(&LineageConfig::default()).compile(&store, None));
        assert!(errors
            .iter()
            .any(|e| matches!(e, LineageError::DateConsistency { .. })));
    }

    /// T2.6: Mutual parenthood is a cycle.
    #[test]
    fn ancestry_cycle_rejected() {
        let store = base_store()
            .with("pandas/china/7_chengdu/0020_a.txt", "[panda]\n_id: 20\nzoo: 7\nchildren: 21\n")
            .with("pandas/china/7_chengdu/0021_b.txt", "[panda]\n_id: 21\nzoo: 7\nchildren: 20\n");
        let errors = validation_error(Assembler::new(&LineageConfig::default()).compile(&store, None));
        assert!(errors.iter().any(|e| matches!(e, LineageError::Lineage { .. })));
    }
}

// =============================================================================
// TIER T3: PHOTO-SLOT MAINTENANCE
// =============================================================================

mod t3_maintenance {
    use super::*;

    /// T3.1: Duplicate URIs merge tags and keep the earliest date.
    #[test]
    fn duplicate_merge_correctness() {
        let mut record = Record::parse(
            "[panda]\nphoto.1: X\nphoto.1.tags: a\nphoto.1.commitdate: 2020/01/01\n\
             photo.2: X\nphoto.2.tags: b\nphoto.2.commitdate: 2020/02/01\n",
            "p.txt",
        )
        .expect("parse");
        let removed = record.merge_duplicates(&ProviderLocator::default(), 0);
        assert_eq!(removed, 1);
        assert_eq!(record.photos.len(), 1);
        let slot = record.photos.get(1).expect("slot 1");
        assert_eq!(slot.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(slot.commitdate.as_deref(), Some("2020/01/01"));
    }

    /// T3.2: Delete then compact leaves a dense sequence.
    #[test]
    fn delete_then_compact_is_dense() {
        let mut record = Record::new("panda");
        for i in 1..=5 {
            record.photos.insert(i, PhotoSlot::new(format!("https://e.com/{}.jpg", i)));
        }
        assert!(record.delete(2));
        assert!(!record.delete(2));
        assert!(record.compact(5));
        assert!(record.photos.is_dense());
        assert_eq!(record.photos.len(), 4);
        assert_eq!(
            record.photos.get(2).map(|s| s.uri.as_str()),
            Some("https://e.com/3.jpg")
        );
        assert!(!record.compact(5));
    }

    /// T3.3: Provider slots reorder by code, others keep their index.
    #[test]
    fn provider_reorder_is_idempotent() {
        let mut record = Record::parse(
            "[panda]\nphoto.1: ig://Bb\nphoto.2: https://e.com/x.jpg\nphoto.3: ig://A\n",
            "p.txt",
        )
        .expect("parse");
        let provider = ProviderLocator::default();
        assert!(record.reorder_by_provider_locator(&provider));
        assert_eq!(record.photos.get(1).map(|s| s.uri.as_str()), Some("ig://A"));
        assert_eq!(
            record.photos.get(2).map(|s| s.uri.as_str()),
            Some("https://e.com/x.jpg")
        );
        assert_eq!(record.photos.get(3).map(|s| s.uri.as_str()), Some("ig://Bb"));
        let once = record.clone();
        assert!(!record.reorder_by_provider_locator(&provider));
        assert_eq!(record, once);
    }
}

// =============================================================================
// TIER T4: PROVENANCE
// =============================================================================

mod t4_provenance {
    use super::*;

    const PANDA: &str = "pandas/china/7_chengdu/0005_hua.txt";

    fn history() -> MemoryHistory {
        let mut history = MemoryHistory::new();
        history.commit_changes("a0", at("2019-12-01T09:00:00+08:00"), &[("README.md", Some("x"))]);
        history.commit_changes(
            "a1",
            at("2020-01-05T09:00:00+08:00"),
            &[(PANDA, Some("[panda]\n_id: 5\nphoto.1: https://e.com/u.jpg\n"))],
        );
        history.commit_changes(
            "a2",
            at("2020-02-05T09:00:00+08:00"),
            &[(
                PANDA,
                Some("[panda]\n_id: 5\nen.name: Hua\nphoto.1: https://e.com/u.jpg\n"),
            )],
        );
        history.commit_changes(
            "a3",
            at("2020-03-05T09:00:00+08:00"),
            &[(
                "pandas/china/7_chengdu/0006_copy.txt",
                Some("[panda]\n_id: 6\nphoto.1: https://e.com/u.jpg\n"),
            )],
        );
        history
    }

    /// T4.1: A URI keeps the date of the commit that introduced it.
    #[test]
    fn uri_first_seen_is_monotonic() {
        let provenance = ProvenanceMiner::new(LayoutConfig::default())
            .mine(&history(), None)
            .expect("mine");
        assert_eq!(
            provenance.uri_first_seen.get("https://e.com/u.jpg"),
            LineageDate::from_ymd(2020, 1, 5).as_ref()
        );
    }

    /// T4.2: An unknown start commit is a provenance error.
    #[test]
    fn unknown_start_commit() {
        let result = ProvenanceMiner::new(LayoutConfig::default()).mine(&history(), Some("zz"));
        assert!(matches!(result, Err(LineageError::Provenance(_))));
    }

    /// T4.3: Mined dates fill the exported commit dates.
    #[test]
    fn provenance_flows_into_export() {
        let provenance = ProvenanceMiner::new(LayoutConfig::default())
            .mine(&history(), None)
            .expect("mine");
        let store = MemoryRecordStore::new(LayoutConfig::default())
            .with("zoos/china/0007_chengdu.txt", "[zoo]\n_id: 7\n")
            .with(
                PANDA,
                "[panda]\n_id: 5\nen.name: Hua\nzoo: 7\nphoto.1: https://e.com/u.jpg\n",
            );
        let compilation = Assembler::new(&LineageConfig::default())
            .compile(&store, Some(&provenance))
            .expect("compile");
        let json = ExportDocument::new(&compilation, RecentDigest::default())
            .to_json_pretty()
            .expect("json");
        assert!(json.contains("2020/01/05"));
    }
}
