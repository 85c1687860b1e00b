//! Search backend abstraction
//!
//! The query engine talks to its document search index through the
//! [`SearchBackend`] trait, keeping the orchestrator independent of any
//! concrete transport. The request model is deliberately narrow: match
//! filters over the closed set of keyword fields, inclusive timestamp range
//! filters, sort by time, offset/size slicing, and an optional temporal
//! histogram with a nested metric aggregation.
//!
//! Responses are a typed variant: either an ordered list of raw document
//! hits, or an ordered list of histogram buckets when the request carried an
//! aggregation clause. A batched execution returns one response slot per
//! sub-request; a failed sub-request occupies its slot with an error rather
//! than disappearing from the batch.

pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::types::{CollapseAggregation, Periodicity, RepresentationMode, SeriesId, SortDirection};

pub use memory::MemorySearchBackend;

// =============================================================================
// Index documents
// =============================================================================

/// One indexed observation of a series
///
/// Produced by the ingestion pipeline: per (series, interval, aggregation,
/// period) one document carrying the raw value and its four derived
/// transforms. Transform fields are absent for periods where the transform is
/// undefined (e.g. no year-ago counterpart).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Series keyword
    pub series_id: SeriesId,
    /// Period start date
    pub timestamp: NaiveDate,
    /// Aggregation this document was computed with
    pub aggregation: CollapseAggregation,
    /// Interval this document was computed at
    pub interval: Periodicity,
    /// Raw observation value
    pub value: Option<f64>,
    /// Change from the previous period
    pub change: Option<f64>,
    /// Percent change from the previous period
    pub percent_change: Option<f64>,
    /// Change from a year ago
    pub change_a_year_ago: Option<f64>,
    /// Percent change from a year ago
    pub percent_change_a_year_ago: Option<f64>,
}

impl IndexDocument {
    /// Read the field selected by a representation mode
    pub fn field(&self, mode: RepresentationMode) -> Option<f64> {
        match mode {
            RepresentationMode::Value => self.value,
            RepresentationMode::Change => self.change,
            RepresentationMode::PercentChange => self.percent_change,
            RepresentationMode::ChangeAYearAgo => self.change_a_year_ago,
            RepresentationMode::PercentChangeAYearAgo => self.percent_change_a_year_ago,
        }
    }
}

// =============================================================================
// Search requests
// =============================================================================

/// Exact-match filter over one of the index keyword fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchFilter {
    /// `series_id == value`
    SeriesId(SeriesId),
    /// `aggregation == value`
    Aggregation(CollapseAggregation),
    /// `interval == value`
    Interval(Periodicity),
}

/// Inclusive timestamp range filter; open bounds are unconstrained
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeFilter {
    /// Lower bound, `timestamp >= gte`
    pub gte: Option<NaiveDate>,
    /// Upper bound, `timestamp <= lte`
    pub lte: Option<NaiveDate>,
}

impl RangeFilter {
    /// Whether a date satisfies both bounds
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.gte.map_or(true, |start| date >= start) && self.lte.map_or(true, |end| date <= end)
    }
}

/// Temporal histogram with a nested metric aggregation
///
/// Buckets documents by `timestamp` at `interval` granularity and reduces
/// each bucket with `metric` over the field selected by `field`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateHistogram {
    /// Bucket width
    pub interval: Periodicity,
    /// Metric aggregation applied inside each bucket
    pub metric: CollapseAggregation,
    /// Document field the metric reads
    pub field: RepresentationMode,
}

/// One sub-query of a batched search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Match filters, combined with AND
    pub match_filters: Vec<MatchFilter>,
    /// Range filters, combined with AND
    pub range_filters: Vec<RangeFilter>,
    /// Hit ordering by timestamp
    pub sort: SortDirection,
    /// Number of hits to skip
    pub offset: usize,
    /// Maximum number of hits to return
    pub size: usize,
    /// Optional bucket aggregation; when present the response carries
    /// buckets instead of hits
    pub histogram: Option<DateHistogram>,
}

impl SearchRequest {
    /// Create a request with no filters, ascending sort and an empty window
    pub fn new() -> Self {
        Self {
            match_filters: Vec::new(),
            range_filters: Vec::new(),
            sort: SortDirection::Asc,
            offset: 0,
            size: 0,
            histogram: None,
        }
    }

    /// Whether a document passes every filter of this request
    pub fn matches(&self, doc: &IndexDocument) -> bool {
        let matched = self.match_filters.iter().all(|f| match f {
            MatchFilter::SeriesId(id) => doc.series_id == *id,
            MatchFilter::Aggregation(agg) => doc.aggregation == *agg,
            MatchFilter::Interval(interval) => doc.interval == *interval,
        });
        matched && self.range_filters.iter().all(|r| r.contains(doc.timestamp))
    }
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Search responses
// =============================================================================

/// One histogram bucket: period key plus the metric value
///
/// The metric value is absent for buckets the backend could not reduce
/// (empty buckets in a sparse series).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Period start date of the bucket
    pub key: NaiveDate,
    /// Metric value computed over the bucket
    pub value: Option<f64>,
}

/// Result of one sub-query
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResponse {
    /// Ordered raw document hits (no aggregation clause was attached)
    Hits(Vec<IndexDocument>),
    /// Ordered histogram buckets (an aggregation clause was attached)
    Buckets(Vec<Bucket>),
}

impl SearchResponse {
    /// Whether this response carries no data at all
    pub fn is_empty(&self) -> bool {
        match self {
            SearchResponse::Hits(hits) => hits.is_empty(),
            SearchResponse::Buckets(buckets) => buckets.is_empty(),
        }
    }
}

/// Per-slot outcome of a batched search
pub type SubResponse = std::result::Result<SearchResponse, BackendError>;

// =============================================================================
// SearchBackend trait
// =============================================================================

/// Connection to a document search index
///
/// One batched call executes every sub-request in a single round trip; any
/// parallelism across sub-queries is the backend's concern. Implementations
/// must keep response slots positionally aligned with the request slice.
#[async_trait]
pub trait SearchBackend: Send + Sync + 'static {
    /// Unique identifier for this backend implementation
    fn backend_id(&self) -> &str;

    /// Execute a batch of sub-queries against `index`
    ///
    /// Returns exactly one [`SubResponse`] per request, in request order. A
    /// transport failure of the whole batch is the outer error; a failure of
    /// one sub-query is carried in its slot.
    async fn multi_search(
        &self,
        index: &str,
        requests: &[SearchRequest],
    ) -> std::result::Result<Vec<SubResponse>, BackendError>;
}
