//! tempora - Time-series indicator query engine backed by a document search
//! index
//!
//! This library serves economic and statistical time-series indicators out of
//! a search index populated by an external ingestion pipeline. Its core is
//! the query and aggregation orchestrator: given N named series, each with an
//! independent representation mode, periodicity and collapse aggregation, it
//! produces one correctly time-aligned, gap-free, null-padded, globally
//! paginated table.
//!
//! - Per-series search construction with a closed set of collapse strategies
//! - Single batched round trip to the search backend per request
//! - Calendar-exact period arithmetic (months, leap years, semesters)
//! - Deterministic alignment of heterogeneous per-series result sets

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod period;
pub mod query;
pub mod types;

/// Configuration management with TOML support
pub mod config;

// Re-export main types
pub use backend::{MemorySearchBackend, SearchBackend};
pub use error::{BackendError, Error, Result};
pub use query::{QueryError, QueryOrchestrator, QueryOutput};
pub use types::{
    CollapseAggregation, Periodicity, RepresentationMode, SeriesId, SortDirection,
};
