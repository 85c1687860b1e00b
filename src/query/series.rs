//! Per-series search construction
//!
//! One [`SeriesSearchBuilder`] produces the backend sub-query for exactly one
//! requested series: its identity filters, the collapse policy, and the
//! per-series pagination window that compensates for series starting later
//! than the global result.
//!
//! # Collapse policy
//!
//! The index stores pre-aggregated documents for every standard interval, but
//! only for aggregations that can be pre-computed. The closed set of
//! strategies in [`AggregationStrategy`] captures the three cases:
//!
//! - **`BackendStored`**: the aggregation is index-stored; selecting the
//!   right interval is a plain match filter.
//! - **`BackendBucket`**: the aggregation exists only at raw granularity and
//!   the requested interval differs from the native one; a date-histogram
//!   bucket aggregation computes the collapse at query time.
//! - **`RedundantFallback`**: the aggregation exists only at raw granularity
//!   but the requested interval equals the native one, so no collapsing is
//!   needed; fall back to the stored default aggregation.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

use crate::backend::{DateHistogram, MatchFilter, RangeFilter, SearchRequest};
use crate::period::periods_between;
use crate::types::{
    CollapseAggregation, Periodicity, RepresentationMode, SeriesId, SortDirection,
};

/// Immutable description of one requested series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesQuerySpec {
    /// Series keyword
    pub series_id: SeriesId,
    /// Transform of the value to return
    pub rep_mode: RepresentationMode,
    /// Requested reporting interval; starts at the native interval and moves
    /// when a collapse is applied
    pub periodicity: Periodicity,
    /// Native interval the series is indexed at
    pub original_periodicity: Periodicity,
    /// Aggregation used when collapsing
    pub collapse_agg: CollapseAggregation,
}

/// How a requested collapse is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStrategy {
    /// Aggregation pre-computed at index time; filter by interval
    BackendStored,
    /// Aggregation computed by the backend at query time via bucketing
    BackendBucket,
    /// Requested interval equals the native one; use the stored default
    RedundantFallback,
}

impl AggregationStrategy {
    /// Select the strategy for a collapse request
    pub fn select(
        collapse_agg: CollapseAggregation,
        requested: Periodicity,
        original: Periodicity,
    ) -> Self {
        if !collapse_agg.is_in_memory() {
            AggregationStrategy::BackendStored
        } else if requested != original {
            AggregationStrategy::BackendBucket
        } else {
            AggregationStrategy::RedundantFallback
        }
    }
}

/// Builder of the backend sub-query for one series
#[derive(Debug, Clone)]
pub struct SeriesSearchBuilder {
    spec: SeriesQuerySpec,
    request: SearchRequest,
}

impl SeriesSearchBuilder {
    /// Create a builder for one series
    ///
    /// The initial request filters by series id and by stored aggregation:
    /// the configured one when it is index-stored, the raw-granularity
    /// default otherwise (the requested aggregation is then computed at
    /// query time). Sort defaults ascending by time.
    pub fn new(
        series_id: SeriesId,
        rep_mode: RepresentationMode,
        periodicity: Periodicity,
        collapse_agg: CollapseAggregation,
    ) -> Self {
        let stored_agg = if collapse_agg.is_in_memory() {
            CollapseAggregation::default()
        } else {
            collapse_agg
        };

        let mut request = SearchRequest::new();
        request
            .match_filters
            .push(MatchFilter::SeriesId(series_id.clone()));
        request.match_filters.push(MatchFilter::Aggregation(stored_agg));

        Self {
            spec: SeriesQuerySpec {
                series_id,
                rep_mode,
                periodicity,
                original_periodicity: periodicity,
                collapse_agg,
            },
            request,
        }
    }

    /// The series this builder queries
    pub fn series_id(&self) -> &SeriesId {
        &self.spec.series_id
    }

    /// The representation mode of this series
    pub fn rep_mode(&self) -> RepresentationMode {
        self.spec.rep_mode
    }

    /// The currently requested reporting interval
    pub fn periodicity(&self) -> Periodicity {
        self.spec.periodicity
    }

    /// The collapse aggregation currently in effect
    pub fn collapse_agg(&self) -> CollapseAggregation {
        self.spec.collapse_agg
    }

    /// Add an inclusive timestamp range filter
    ///
    /// Range filters are additive: adding a second range ANDs it with the
    /// first, it never replaces it.
    pub fn add_range_filter(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        self.request.range_filters.push(RangeFilter { gte: start, lte: end });
    }

    /// Apply a collapse to `periodicity`
    pub fn add_collapse(&mut self, periodicity: Periodicity) {
        let strategy = AggregationStrategy::select(
            self.spec.collapse_agg,
            periodicity,
            self.spec.original_periodicity,
        );
        debug!(
            "Collapsing {} to {} via {:?}",
            self.spec.series_id, periodicity, strategy
        );

        match strategy {
            AggregationStrategy::BackendStored => {
                self.request
                    .match_filters
                    .push(MatchFilter::Interval(periodicity));
            }
            AggregationStrategy::BackendBucket => {
                // the histogram reduces raw-granularity documents; pin the
                // native interval so pre-aggregated coarser documents are
                // never mixed into the buckets
                self.request
                    .match_filters
                    .push(MatchFilter::Interval(self.spec.original_periodicity));
                self.request.histogram = Some(DateHistogram {
                    interval: periodicity,
                    metric: self.spec.collapse_agg,
                    field: self.spec.rep_mode,
                });
            }
            AggregationStrategy::RedundantFallback => {
                // the raw interval already holds one document per period
                // under the default aggregation
                self.spec.collapse_agg = CollapseAggregation::default();
                self.request
                    .match_filters
                    .push(MatchFilter::Interval(periodicity));
            }
        }

        self.spec.periodicity = periodicity;
    }

    /// Require `interval` to match the target periodicity
    ///
    /// Applied once more just before dispatch as a final guard, so a series
    /// without an explicit collapse still selects documents of the right
    /// granularity. In bucket mode the request already pins the native
    /// interval the histogram reduces over, and the guard must not displace
    /// it.
    pub fn add_interval_guard(&mut self, periodicity: Periodicity) {
        if self.request.histogram.is_some() {
            return;
        }
        self.request
            .match_filters
            .push(MatchFilter::Interval(periodicity));
    }

    /// Set hit ordering
    pub fn sort(&mut self, direction: SortDirection) {
        self.request.sort = direction;
    }

    /// Compute and apply this series' slice window
    ///
    /// `start` and `limit` are global: `start` indexes the merged table,
    /// whose row 0 is the earliest first observation across all requested
    /// series. A series beginning later must not skip `start` of its own
    /// documents, or real values would be lost; its start is corrected by
    /// the period distance between its first date and the global earliest
    /// first date.
    ///
    /// Derived representation modes extend the limit side by one year's
    /// worth of periods so boundary values have their lookback available.
    pub fn add_pagination(
        &mut self,
        start: usize,
        limit: usize,
        request_start_dates: &HashMap<SeriesId, NaiveDate>,
    ) {
        let es_start = self.series_slice_start(start, request_start_dates);

        let mut es_end = start + limit;
        if self.spec.rep_mode.is_derived() {
            es_end += self.spec.periodicity.extra_offset();
        }

        self.request.offset = es_start;
        self.request.size = es_end.saturating_sub(es_start);
    }

    /// Per-series corrected start offset
    fn series_slice_start(
        &self,
        start: usize,
        request_start_dates: &HashMap<SeriesId, NaiveDate>,
    ) -> usize {
        let min_date = request_start_dates.values().min().copied();
        let series_date = request_start_dates.get(&self.spec.series_id).copied();

        let offset = match (series_date, min_date) {
            (Some(series_date), Some(min_date)) => {
                periods_between(series_date, min_date, self.spec.periodicity)
            }
            _ => 0,
        };

        usize::try_from(start as i64 - offset).unwrap_or(0)
    }

    /// Finish building and return the backend request
    pub fn build(self) -> SearchRequest {
        self.request
    }

    /// Inspect the request built so far
    pub fn request(&self) -> &SearchRequest {
        &self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SearchRequest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn builder(collapse_agg: CollapseAggregation) -> SeriesSearchBuilder {
        SeriesSearchBuilder::new(
            SeriesId::from("emae"),
            RepresentationMode::Value,
            Periodicity::Month,
            collapse_agg,
        )
    }

    fn match_filters(request: &SearchRequest) -> &[MatchFilter] {
        &request.match_filters
    }

    #[test]
    fn test_init_filters_stored_aggregation() {
        let b = builder(CollapseAggregation::Sum);
        assert!(match_filters(b.request())
            .contains(&MatchFilter::Aggregation(CollapseAggregation::Sum)));
    }

    #[test]
    fn test_init_filters_default_for_in_memory_aggregation() {
        let b = builder(CollapseAggregation::Max);
        assert!(match_filters(b.request())
            .contains(&MatchFilter::Aggregation(CollapseAggregation::Avg)));
        assert!(!match_filters(b.request())
            .contains(&MatchFilter::Aggregation(CollapseAggregation::Max)));
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(
            AggregationStrategy::select(
                CollapseAggregation::Sum,
                Periodicity::Year,
                Periodicity::Month
            ),
            AggregationStrategy::BackendStored
        );
        assert_eq!(
            AggregationStrategy::select(
                CollapseAggregation::Max,
                Periodicity::Year,
                Periodicity::Month
            ),
            AggregationStrategy::BackendBucket
        );
        assert_eq!(
            AggregationStrategy::select(
                CollapseAggregation::Max,
                Periodicity::Month,
                Periodicity::Month
            ),
            AggregationStrategy::RedundantFallback
        );
    }

    #[test]
    fn test_collapse_stored_adds_interval_filter() {
        let mut b = builder(CollapseAggregation::Avg);
        b.add_collapse(Periodicity::Quarter);
        assert!(match_filters(b.request()).contains(&MatchFilter::Interval(Periodicity::Quarter)));
        assert!(b.request().histogram.is_none());
        assert_eq!(b.periodicity(), Periodicity::Quarter);
    }

    #[test]
    fn test_collapse_bucket_attaches_histogram() {
        let mut b = builder(CollapseAggregation::Max);
        b.add_collapse(Periodicity::Year);
        let histogram = b.request().histogram.as_ref().expect("histogram attached");
        assert_eq!(histogram.interval, Periodicity::Year);
        assert_eq!(histogram.metric, CollapseAggregation::Max);
        assert_eq!(histogram.field, RepresentationMode::Value);
        // buckets reduce over native-interval documents
        assert!(match_filters(b.request()).contains(&MatchFilter::Interval(Periodicity::Month)));
    }

    #[test]
    fn test_interval_guard_skipped_in_bucket_mode() {
        let mut b = builder(CollapseAggregation::Max);
        b.add_collapse(Periodicity::Year);
        let filters_before = b.request().match_filters.len();
        b.add_interval_guard(Periodicity::Year);
        assert_eq!(b.request().match_filters.len(), filters_before);
        assert!(!match_filters(b.request()).contains(&MatchFilter::Interval(Periodicity::Year)));
    }

    #[test]
    fn test_collapse_redundant_falls_back_to_default() {
        let mut b = builder(CollapseAggregation::Min);
        b.add_collapse(Periodicity::Month);
        assert_eq!(b.collapse_agg(), CollapseAggregation::Avg);
        assert!(b.request().histogram.is_none());
        assert!(match_filters(b.request()).contains(&MatchFilter::Interval(Periodicity::Month)));
    }

    #[test]
    fn test_range_filters_additive() {
        let mut b = builder(CollapseAggregation::Avg);
        b.add_range_filter(Some(d(2018, 1, 1)), None);
        b.add_range_filter(None, Some(d(2018, 12, 1)));
        assert_eq!(b.request().range_filters.len(), 2);
    }

    #[test]
    fn test_pagination_without_start_dates() {
        let mut b = builder(CollapseAggregation::Avg);
        b.add_pagination(10, 50, &HashMap::new());
        assert_eq!(b.request().offset, 10);
        assert_eq!(b.request().size, 50);
    }

    #[test]
    fn test_pagination_corrects_later_series_start() {
        let mut b = builder(CollapseAggregation::Avg);
        let mut start_dates = HashMap::new();
        // this series starts 3 months after the earliest requested series
        start_dates.insert(SeriesId::from("emae"), d(2018, 4, 1));
        start_dates.insert(SeriesId::from("ipc"), d(2018, 1, 1));

        b.add_pagination(10, 50, &start_dates);
        assert_eq!(b.request().offset, 7);
        // window end stays at the global start + limit
        assert_eq!(b.request().size, 60 - 7);
    }

    #[test]
    fn test_pagination_clamps_at_zero() {
        let mut b = builder(CollapseAggregation::Avg);
        let mut start_dates = HashMap::new();
        start_dates.insert(SeriesId::from("emae"), d(2019, 1, 1));
        start_dates.insert(SeriesId::from("ipc"), d(2015, 1, 1));

        b.add_pagination(5, 20, &start_dates);
        assert_eq!(b.request().offset, 0);
    }

    #[test]
    fn test_pagination_extra_offset_for_derived_mode() {
        let mut b = SeriesSearchBuilder::new(
            SeriesId::from("emae"),
            RepresentationMode::ChangeAYearAgo,
            Periodicity::Month,
            CollapseAggregation::Avg,
        );
        b.add_pagination(0, 100, &HashMap::new());
        // one extra year of monthly periods on the limit side only
        assert_eq!(b.request().offset, 0);
        assert_eq!(b.request().size, 112);
    }
}
