//! # lineage-core
//!
//! The dataset compiler for the lineage records - THE LOGIC.
//!
//! Hand-edited plain-text records (animals, zoos, wild areas, media, links)
//! are compiled into one validated, cross-referenced graph and exported as a
//! single JSON document.
//!
//! ## Pipeline
//!
//! ```text
//! RecordStore ──> codec ──> assembler ──> validator ──> export
//!                               ^
//!          HistoryReader ──> provenance (first-seen dates, digest)
//! ```
//!
//! Photo maintenance (`lifecycle`) works on single records and never runs as
//! part of a compile.
//!
//! ## Architectural Constraints
//!
//! - Synchronous and single-threaded; every run rebuilds the graph from scratch
//! - Deterministic: ordered collections only, integer arithmetic only
//! - Fail-fast: records and references abort on the first error, the
//!   validator reports every violation it finds before aborting

// =============================================================================
// MODULES
// =============================================================================

pub mod accumulator;
pub mod assembler;
pub mod codec;
pub mod config;
pub mod diff;
pub mod export;
pub mod graph;
pub mod lifecycle;
pub mod photo;
pub mod primitives;
pub mod provenance;
pub mod store;
pub mod types;
pub mod validator;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Category, Edge, EdgeLabel, FieldMap, FieldValue, Gender, LineageDate, LineageError,
    ValidationFailure, VertexId,
};

// =============================================================================
// RE-EXPORTS: Compiler
// =============================================================================

pub use accumulator::CompileState;
pub use assembler::{Assembler, Compilation};
pub use codec::{Normalizer, Record};
pub use config::{HistoryConfig, LayoutConfig, LineageConfig, ProviderConfig, ValidationConfig};
pub use export::{ExportDocument, PhotoStats, Totals};
pub use graph::{Claim, Graph, Vertex, VertexBase};
pub use store::{FsRecordStore, MemoryRecordStore, RecordSource, RecordStore};
pub use validator::Validator;

// =============================================================================
// RE-EXPORTS: Maintenance & History
// =============================================================================

pub use diff::{FileDiff, parse_unified_diff};
pub use lifecycle::PhotoFile;
pub use photo::{PhotoSlot, PhotoSlots, ProviderLocator};
pub use provenance::{
    Commit, EntityKey, GitHistory, HistoryReader, MemoryHistory, Provenance, ProvenanceMiner,
    RecentDigest, last_removal_by, removed_slots,
};
