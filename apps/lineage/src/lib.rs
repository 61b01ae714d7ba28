//! # lineage
//!
//! The lineage dataset tool - THE BINARY.
//!
//! Wires lineage-core to the file system and to the `git` executable. The
//! CLI lives in [`cli`]; `main.rs` only sets up logging and dispatches.

pub mod cli;
