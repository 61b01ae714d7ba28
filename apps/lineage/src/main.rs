//! # Lineage - red panda dataset tool
//!
//! The main binary for compiling and maintaining the lineage records.
//!
//! This application provides:
//! - Dataset build (compile + validate + export)
//! - Photo maintenance on individual records
//! - Commit-date backfill and the recent-activity digest
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            apps/lineage (THE BINARY)         │
//! │                                              │
//! │   ┌─────────────┐       ┌────────────────┐   │
//! │   │    CLI      │       │  git executable│   │
//! │   │   (clap)    │       │  (history)     │   │
//! │   └──────┬──────┘       └───────┬────────┘   │
//! │          └───────────┬──────────┘            │
//! │                      ▼                       │
//! │              ┌───────────────┐               │
//! │              │ lineage-core  │               │
//! │              │ (THE LOGIC)   │               │
//! │              └───────────────┘               │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Compile and write export/redpanda.json
//! lineage build
//!
//! # Maintenance
//! lineage remove-photo pandas/japan/1_zoo/0012_bao.txt 3
//! lineage dedupe
//! lineage update-commit-dates --force
//! ```

use clap::Parser;
use lineage::cli;
use lineage_core::LineageError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Initialize tracing; LINEAGE_LOG_FORMAT=json switches to JSON lines.
    let log_format = std::env::var("LINEAGE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lineage=info,lineage_core=info".into());

    // Logs go to stderr; stdout carries command output.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        if let LineageError::Validation(failure) = &e {
            eprintln!("{}", failure.report());
        }
        std::process::exit(1);
    }
}
