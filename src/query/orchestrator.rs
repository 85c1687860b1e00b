//! Query orchestration
//!
//! The [`QueryOrchestrator`] owns the set of requested series and the global
//! pagination/sort/collapse parameters, builds one backend sub-query per
//! series, dispatches them as a single batched round trip, and delegates
//! table assembly to the [`ResponseFormatter`].
//!
//! One orchestrator instance serves one logical request: build it up with
//! `add_series` / `add_filter` / `add_pagination` / `sort` / `add_collapse`,
//! then call [`QueryOrchestrator::run`] once. `run` is atomic from the
//! caller's perspective: either a complete aligned table or an error.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::{SearchBackend, SearchRequest, SearchResponse};
use crate::config::Config;
use crate::query::error::{QueryError, QueryResult};
use crate::query::formatter::{ResponseFormatter, Row};
use crate::query::series::SeriesSearchBuilder;
use crate::types::{
    CollapseAggregation, Periodicity, RepresentationMode, SeriesId, SortDirection, DEFAULT_LIMIT,
    DEFAULT_START,
};

/// Result envelope of one query run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutput {
    /// Aligned table, at most `limit` rows
    pub data: Vec<Row>,
    /// Requested series ids, in column order
    pub series_ids: Vec<SeriesId>,
    /// Period label of the first returned row
    pub start_date: Option<NaiveDate>,
    /// Period label of the last returned row
    pub end_date: Option<NaiveDate>,
    /// Requested series that matched no documents at all
    ///
    /// Not an error at this layer: callers typically report these as
    /// "series does not exist" while still returning the rest of the table.
    pub empty_series: Vec<SeriesId>,
}

/// Builds, dispatches and assembles one multi-series query
pub struct QueryOrchestrator {
    backend: Arc<dyn SearchBackend>,
    index: String,
    series: Vec<SeriesSearchBuilder>,
    periodicity: Option<Periodicity>,
    start: usize,
    limit: usize,
    max_limit: usize,
    paginated: bool,
    sort: SortDirection,
}

impl QueryOrchestrator {
    /// Create an orchestrator against `index` on the given backend
    pub fn new(backend: Arc<dyn SearchBackend>, index: impl Into<String>) -> Self {
        Self {
            backend,
            index: index.into(),
            series: Vec::new(),
            periodicity: None,
            start: DEFAULT_START,
            limit: DEFAULT_LIMIT,
            max_limit: usize::MAX,
            paginated: false,
            sort: SortDirection::default(),
        }
    }

    /// Create an orchestrator from application configuration
    ///
    /// Takes the index name and the pagination defaults from `config`;
    /// limits passed to [`QueryOrchestrator::add_pagination`] are clamped to
    /// the configured maximum.
    pub fn from_config(backend: Arc<dyn SearchBackend>, config: &Config) -> Self {
        let mut orchestrator = Self::new(backend, config.backend.index.clone());
        orchestrator.start = config.query.default_start;
        orchestrator.limit = config.query.default_limit;
        orchestrator.max_limit = config.query.max_limit;
        orchestrator
    }

    /// Append one requested series
    ///
    /// At the coarsest supported interval only one raw point per period is
    /// indexed, so every aggregation is numerically identical to the
    /// default; a non-default request there is overridden rather than
    /// honored misleadingly.
    pub fn add_series(
        &mut self,
        series_id: impl Into<SeriesId>,
        rep_mode: RepresentationMode,
        periodicity: Periodicity,
        collapse_agg: CollapseAggregation,
    ) {
        let collapse_agg = if periodicity.is_coarsest() {
            CollapseAggregation::default()
        } else {
            collapse_agg
        };

        self.series.push(SeriesSearchBuilder::new(
            series_id.into(),
            rep_mode,
            periodicity,
            collapse_agg,
        ));
        self.periodicity = Some(periodicity);
    }

    /// Requested series ids, in column order
    pub fn series_ids(&self) -> Vec<SeriesId> {
        self.series.iter().map(|s| s.series_id().clone()).collect()
    }

    /// Add an inclusive date range filter to every series
    pub fn add_filter(
        &mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> QueryResult<()> {
        if self.series.is_empty() {
            return Err(QueryError::empty_query());
        }
        for series in &mut self.series {
            series.add_range_filter(start, end);
        }
        Ok(())
    }

    /// Set the global pagination window
    ///
    /// `request_start_dates` maps each series to its first observation date
    /// (from catalog metadata); it lets a series starting later than the
    /// earliest requested series correct its own slice offset.
    pub fn add_pagination(
        &mut self,
        start: usize,
        limit: usize,
        request_start_dates: Option<&HashMap<SeriesId, NaiveDate>>,
    ) -> QueryResult<()> {
        if self.series.is_empty() {
            return Err(QueryError::empty_query());
        }

        let limit = limit.min(self.max_limit);
        let empty = HashMap::new();
        let start_dates = request_start_dates.unwrap_or(&empty);
        for series in &mut self.series {
            series.add_pagination(start, limit, start_dates);
        }

        self.start = start;
        self.limit = limit;
        self.paginated = true;
        Ok(())
    }

    /// Sort the merged table ascending or descending by period
    ///
    /// Accepts the request token; anything other than `asc`/`desc` is an
    /// invalid-sort configuration error.
    pub fn sort(&mut self, how: &str) -> QueryResult<()> {
        if self.series.is_empty() {
            return Err(QueryError::empty_query());
        }

        let direction: SortDirection =
            how.parse().map_err(|_| QueryError::invalid_sort(how))?;
        for series in &mut self.series {
            series.sort(direction);
        }
        self.sort = direction;
        Ok(())
    }

    /// Collapse every series to a coarser reporting interval
    pub fn add_collapse(&mut self, interval: Periodicity) {
        for series in &mut self.series {
            series.add_collapse(interval);
        }
        self.periodicity = Some(interval);
    }

    /// Execute the query and assemble the aligned table
    pub async fn run(&mut self) -> QueryResult<QueryOutput> {
        if self.series.is_empty() {
            return Err(QueryError::empty_query());
        }
        let periodicity = self
            .periodicity
            .unwrap_or_else(|| self.series[0].periodicity());

        // a request without an explicit window still gets the default one;
        // an unpaginated sub-query would carry an empty slice and return
        // nothing
        if !self.paginated {
            let empty = HashMap::new();
            for series in &mut self.series {
                series.add_pagination(self.start, self.limit, &empty);
            }
            self.paginated = true;
        }

        // final guard: every sub-query selects documents of the target
        // interval even when no explicit collapse was requested
        let requests: Vec<SearchRequest> = self
            .series
            .iter()
            .map(|series| {
                let mut series = series.clone();
                series.add_interval_guard(periodicity);
                series.build()
            })
            .collect();

        debug!(
            "Dispatching {} sub-queries to index '{}' at interval {}",
            requests.len(),
            self.index,
            periodicity
        );

        let sub_responses = self
            .backend
            .multi_search(&self.index, &requests)
            .await
            .map_err(|e| QueryError::backend("batched search failed").with_source(e))?;

        // a failed sub-query cannot be dropped: its column would silently
        // vanish from every row
        let mut responses = Vec::with_capacity(sub_responses.len());
        for (i, sub) in sub_responses.into_iter().enumerate() {
            match sub {
                Ok(response) => responses.push(response),
                Err(e) => {
                    warn!("Sub-query {} ({}) failed: {}", i, self.series[i].series_id(), e);
                    return Err(QueryError::backend(format!(
                        "sub-query for series '{}' failed",
                        self.series[i].series_id()
                    ))
                    .with_source(e));
                }
            }
        }

        let empty_series = self.collect_empty_series(&responses);

        let formatter =
            ResponseFormatter::new(&self.series, self.start, self.limit, self.sort, periodicity);
        let mut data = formatter.format(responses);
        data.truncate(self.limit);

        Ok(QueryOutput {
            series_ids: self.series_ids(),
            start_date: data.first().map(|r| r.period),
            end_date: data.last().map(|r| r.period),
            empty_series,
            data,
        })
    }

    fn collect_empty_series(&self, responses: &[SearchResponse]) -> Vec<SeriesId> {
        self.series
            .iter()
            .zip(responses)
            .filter(|(_, response)| response.is_empty())
            .map(|(series, _)| series.series_id().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemorySearchBackend;
    use crate::query::error::QueryErrorKind;

    fn orchestrator() -> QueryOrchestrator {
        QueryOrchestrator::new(Arc::new(MemorySearchBackend::new()), "indicators")
    }

    #[test]
    fn test_filter_before_series_is_empty_query() {
        let mut q = orchestrator();
        let err = q.add_filter(None, None).unwrap_err();
        assert_eq!(err.kind, QueryErrorKind::EmptyQuery);
    }

    #[test]
    fn test_pagination_before_series_is_empty_query() {
        let mut q = orchestrator();
        let err = q.add_pagination(0, 10, None).unwrap_err();
        assert_eq!(err.kind, QueryErrorKind::EmptyQuery);
    }

    #[test]
    fn test_sort_before_series_is_empty_query() {
        let mut q = orchestrator();
        let err = q.sort("asc").unwrap_err();
        assert_eq!(err.kind, QueryErrorKind::EmptyQuery);
    }

    #[test]
    fn test_invalid_sort_token() {
        let mut q = orchestrator();
        q.add_series(
            "emae",
            RepresentationMode::Value,
            Periodicity::Month,
            CollapseAggregation::Avg,
        );
        let err = q.sort("upward").unwrap_err();
        assert_eq!(err.kind, QueryErrorKind::InvalidSort);
        assert!(err.message.contains("upward"));
    }

    #[tokio::test]
    async fn test_run_without_series_is_empty_query() {
        let backend = Arc::new(MemorySearchBackend::new());
        let mut q = QueryOrchestrator::new(backend.clone(), "indicators");
        let err = q.run().await.unwrap_err();
        assert_eq!(err.kind, QueryErrorKind::EmptyQuery);
        // no backend call was made
        assert_eq!(backend.searches_executed(), 0);
    }

    #[test]
    fn test_coarsest_interval_forces_default_aggregation() {
        let mut q = orchestrator();
        q.add_series(
            "emae",
            RepresentationMode::Value,
            Periodicity::Year,
            CollapseAggregation::Max,
        );
        assert_eq!(q.series[0].collapse_agg(), CollapseAggregation::Avg);
    }

    #[tokio::test]
    async fn test_run_applies_default_window_when_unpaginated() {
        let mut q = orchestrator();
        q.add_series(
            "emae",
            RepresentationMode::Value,
            Periodicity::Month,
            CollapseAggregation::Avg,
        );
        q.run().await.unwrap();
        assert_eq!(q.series[0].request().offset, DEFAULT_START);
        assert_eq!(q.series[0].request().size, DEFAULT_LIMIT);
    }

    #[test]
    fn test_from_config_takes_index_and_defaults() {
        let mut config = crate::config::Config::default();
        config.backend.index = "series".to_string();
        config.query.default_limit = 25;
        let q = QueryOrchestrator::from_config(Arc::new(MemorySearchBackend::new()), &config);
        assert_eq!(q.index, "series");
        assert_eq!(q.limit, 25);
    }

    #[test]
    fn test_pagination_limit_clamped_to_configured_max() {
        let mut config = crate::config::Config::default();
        config.query.max_limit = 50;
        let mut q = QueryOrchestrator::from_config(Arc::new(MemorySearchBackend::new()), &config);
        q.add_series(
            "emae",
            RepresentationMode::Value,
            Periodicity::Month,
            CollapseAggregation::Avg,
        );
        q.add_pagination(0, 5000, None).unwrap();
        assert_eq!(q.limit, 50);
        assert_eq!(q.series[0].request().size, 50);
    }

    #[test]
    fn test_series_ids_keep_request_order() {
        let mut q = orchestrator();
        q.add_series(
            "b_series",
            RepresentationMode::Value,
            Periodicity::Month,
            CollapseAggregation::Avg,
        );
        q.add_series(
            "a_series",
            RepresentationMode::Value,
            Periodicity::Month,
            CollapseAggregation::Avg,
        );
        assert_eq!(
            q.series_ids(),
            vec![SeriesId::from("b_series"), SeriesId::from("a_series")]
        );
    }
}
