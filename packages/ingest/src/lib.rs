//! Controlmap ingestion - Turn security control catalogs and mapping tables
//! into STIX documents with stable ids, and score taxonomy coverage.
//!
//! A catalog table (NIST 800-53 Revision 4 or 5 layout) is classified row by
//! row, assembled into entries with nested statements, given ids that
//! survive regeneration, and linked to a taxonomy dataset through a table of
//! regular-expression mappings.
//!
//! # Example
//!
//! ```
//! use controlmap_ingest::linkage::anchor_pattern;
//! use controlmap_ingest::Edition;
//!
//! assert_eq!("rev5".parse::<Edition>().unwrap(), Edition::Rev5);
//! assert_eq!(anchor_pattern("AC-1"), "^(?:AC-1)$");
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Constants and validation
//! - [`error`]: Error types, diagnostics and Result alias
//! - [`types`]: Entries, statements and relationships
//! - [`table`]: Tab-delimited tables and column mapping
//! - [`classify`]: Row classification by ordered patterns
//! - [`assemble`]: Streaming (r4) and chunked (r5) catalog parsers
//! - [`edition`]: Catalog edition presets
//! - [`identity`]: Stable internal ids
//! - [`derive`]: `subcontrol-of` and `related-to` relationships
//! - [`linkage`]: Pattern-based `mitigates` relationships
//! - [`document`]: STIX-like objects and bundles
//! - [`pipeline`]: Catalog build service
//! - [`coverage`]: Coverage aggregation and navigator layers
//! - [`substitute`]: Catalog projection into a taxonomy bundle
//! - [`listing`]: Tabular mapping listings
//! - [`output`]: Atomic file output
//! - [`cli`]: Command-line interface

pub mod assemble;
pub mod classify;
pub mod cli;
pub mod config;
pub mod coverage;
pub mod derive;
pub mod document;
pub mod edition;
pub mod error;
pub mod identity;
pub mod linkage;
pub mod listing;
pub mod output;
pub mod pipeline;
pub mod substitute;
pub mod table;
pub mod types;

// Re-export the build service
pub use pipeline::{build, build_with_registry, BuildInputs, BuildOptions, BuildOutput};

// Re-export commonly used items
pub use assemble::{CatalogParser, ChunkedParser, StreamingParser};
pub use coverage::{Coverage, Heatmap};
pub use document::{Bundle, StixObject};
pub use edition::Edition;
pub use error::{Diagnostic, IngestError, Result};
pub use identity::IdentityRegistry;
pub use linkage::LinkagePolicy;
pub use types::{Entry, Relationship, RelationshipKind, Statement};
