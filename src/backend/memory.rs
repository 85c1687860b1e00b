//! In-memory search backend
//!
//! A lightweight [`SearchBackend`] for unit and integration testing without a
//! running search cluster, and for prototyping against small datasets. It
//! honors the full request model: match filters, range filters, sort,
//! offset/size slicing, and date-histogram aggregations with nested metrics.
//!
//! # Warning
//!
//! **Not suitable for production use:**
//!
//! - all documents live in memory and are lost on drop
//! - filtering is a linear scan per sub-query
//!
//! # Example
//!
//! ```rust,ignore
//! use tempora::backend::{MemorySearchBackend, SearchBackend};
//!
//! let backend = MemorySearchBackend::new();
//! backend.index_documents("indicators", docs);
//! let responses = backend.multi_search("indicators", &requests).await?;
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{
    Bucket, DateHistogram, IndexDocument, SearchBackend, SearchRequest, SearchResponse,
    SubResponse,
};
use crate::error::BackendError;
use crate::period::period_start;
use crate::types::{CollapseAggregation, SortDirection};

/// In-memory document store implementing [`SearchBackend`]
pub struct MemorySearchBackend {
    indices: RwLock<HashMap<String, Vec<IndexDocument>>>,
    searches_executed: AtomicU64,
}

impl MemorySearchBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            indices: RwLock::new(HashMap::new()),
            searches_executed: AtomicU64::new(0),
        }
    }

    /// Add documents to an index, creating it if needed
    pub fn index_documents(&self, index: &str, docs: impl IntoIterator<Item = IndexDocument>) {
        let mut indices = self.indices.write();
        indices.entry(index.to_string()).or_default().extend(docs);
    }

    /// Number of sub-queries executed so far
    pub fn searches_executed(&self) -> u64 {
        self.searches_executed.load(Ordering::Relaxed)
    }

    fn execute(&self, index: &str, request: &SearchRequest) -> SearchResponse {
        let indices = self.indices.read();
        let mut hits: Vec<IndexDocument> = indices
            .get(index)
            .map(|docs| docs.iter().filter(|d| request.matches(d)).cloned().collect())
            .unwrap_or_default();

        hits.sort_by_key(|d| d.timestamp);
        if request.sort == SortDirection::Desc {
            hits.reverse();
        }

        match &request.histogram {
            Some(histogram) => {
                SearchResponse::Buckets(Self::bucketize(&hits, histogram, request.sort))
            }
            None => {
                // from/size slicing applies to hits only; aggregations see
                // every matching document
                let sliced = hits
                    .into_iter()
                    .skip(request.offset)
                    .take(request.size)
                    .collect();
                SearchResponse::Hits(sliced)
            }
        }
    }

    fn bucketize(
        hits: &[IndexDocument],
        histogram: &DateHistogram,
        sort: SortDirection,
    ) -> Vec<Bucket> {
        let mut grouped: BTreeMap<chrono::NaiveDate, Vec<&IndexDocument>> = BTreeMap::new();
        for hit in hits {
            grouped
                .entry(period_start(hit.timestamp, histogram.interval))
                .or_default()
                .push(hit);
        }

        let mut buckets: Vec<Bucket> = grouped
            .into_iter()
            .map(|(key, docs)| Bucket {
                key,
                value: Self::reduce(&docs, histogram),
            })
            .collect();

        // bucket keys mirror the requested sort, as a date_histogram ordered
        // by _key would
        if sort == SortDirection::Desc {
            buckets.reverse();
        }
        buckets
    }

    fn reduce(docs: &[&IndexDocument], histogram: &DateHistogram) -> Option<f64> {
        match histogram.metric {
            CollapseAggregation::EndOfPeriod => docs
                .iter()
                .max_by_key(|d| d.timestamp)
                .and_then(|d| d.field(histogram.field)),
            _ => {
                let values: Vec<f64> =
                    docs.iter().filter_map(|d| d.field(histogram.field)).collect();
                if values.is_empty() {
                    return None;
                }
                match histogram.metric {
                    CollapseAggregation::Avg => {
                        Some(values.iter().sum::<f64>() / values.len() as f64)
                    }
                    CollapseAggregation::Sum => Some(values.iter().sum()),
                    CollapseAggregation::Min => values.iter().copied().reduce(f64::min),
                    CollapseAggregation::Max => values.iter().copied().reduce(f64::max),
                    CollapseAggregation::EndOfPeriod => unreachable!("handled above"),
                }
            }
        }
    }
}

impl Default for MemorySearchBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for MemorySearchBackend {
    fn backend_id(&self) -> &str {
        "memory"
    }

    async fn multi_search(
        &self,
        index: &str,
        requests: &[SearchRequest],
    ) -> Result<Vec<SubResponse>, BackendError> {
        self.searches_executed
            .fetch_add(requests.len() as u64, Ordering::Relaxed);
        Ok(requests
            .iter()
            .map(|request| Ok(self.execute(index, request)))
            .collect())
    }
}
