//! Query engine for multi-series indicator retrieval
//!
//! This module turns a request for N named series, each with its own
//! representation mode, periodicity and collapse aggregation, into one
//! time-aligned, null-padded, globally paginated table.
//!
//! # Architecture
//!
//! ```text
//! add_series / add_filter / add_pagination / sort / add_collapse
//!      │
//!      ▼
//! ┌──────────────────┐
//! │ QueryOrchestrator │  one SeriesSearchBuilder per series
//! └──────────────────┘
//!      │  single batched multi_search round trip
//!      ▼
//! ┌──────────────────┐
//! │  SearchBackend   │  per-series hit lists or bucket lists
//! └──────────────────┘
//!      │
//!      ▼
//! ┌──────────────────┐
//! │ ResponseFormatter │  align, gap-fill, null-pad, paginate
//! └──────────────────┘
//!      │
//!      ▼
//!   QueryOutput (table + series ids + date bounds)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tempora::query::QueryOrchestrator;
//! use tempora::types::{CollapseAggregation, Periodicity, RepresentationMode};
//!
//! let mut query = QueryOrchestrator::new(backend, "indicators");
//! query.add_series("emae", RepresentationMode::Value,
//!                  Periodicity::Month, CollapseAggregation::Avg);
//! query.add_pagination(0, 100, None)?;
//! query.sort("asc")?;
//! let output = query.run().await?;
//! ```

pub mod error;
pub mod formatter;
pub mod orchestrator;
pub mod series;

// Re-export main types
pub use error::{QueryError, QueryErrorKind, QueryResult};
pub use formatter::{ResponseFormatter, Row};
pub use orchestrator::{QueryOrchestrator, QueryOutput};
pub use series::{AggregationStrategy, SeriesQuerySpec, SeriesSearchBuilder};
