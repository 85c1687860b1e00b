//! Response alignment and formatting
//!
//! The formatter turns N independent per-series result sets into one dense,
//! gap-free table keyed by a single continuous time index. This is the core
//! reconciliation step: the sub-responses may start at different dates, carry
//! different shapes (raw hits vs histogram buckets), and be paginated
//! differently, yet every output row must hold exactly one period label plus
//! one slot per requested series.
//!
//! Values are merged into a sparse period → row map first and the map is
//! materialized to a dense ordered table only after every response has been
//! processed; gap periods between the earliest and latest observed period are
//! synthesized with all-null rows. Column identity is positional: column `i`
//! belongs to the `i`-th requested series, never to an iteration order.

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::collections::BTreeMap;
use tracing::debug;

use crate::backend::SearchResponse;
use crate::period::{next_period, period_start};
use crate::query::series::SeriesSearchBuilder;
use crate::types::{Periodicity, SortDirection};

/// One row of the aligned table: a period label plus one value slot per
/// requested series
///
/// Serializes to the wire shape `[period_label, v1, v2, ...]` with explicit
/// nulls for missing values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Period start date labeling this row
    pub period: NaiveDate,
    /// One slot per requested series, in request order
    pub values: Vec<Option<f64>>,
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.values.len() + 1))?;
        seq.serialize_element(&self.period.format("%Y-%m-%d").to_string())?;
        for value in &self.values {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

/// Merges per-series responses into the aligned table
pub struct ResponseFormatter<'a> {
    series: &'a [SeriesSearchBuilder],
    start: usize,
    limit: usize,
    sort: SortDirection,
    periodicity: Periodicity,
}

impl<'a> ResponseFormatter<'a> {
    /// Create a formatter for one dispatched request
    ///
    /// `start`/`limit` are the global pagination window; `periodicity` is the
    /// target reporting interval of the whole table.
    pub fn new(
        series: &'a [SeriesSearchBuilder],
        start: usize,
        limit: usize,
        sort: SortDirection,
        periodicity: Periodicity,
    ) -> Self {
        Self {
            series,
            start,
            limit,
            sort,
            periodicity,
        }
    }

    /// Align all responses into a dense table
    ///
    /// The returned table covers the full reconciled window; the caller caps
    /// it to the global limit. Truncating before alignment would manufacture
    /// false gaps at the boundary.
    pub fn format(&self, responses: Vec<SearchResponse>) -> Vec<Row> {
        let columns = self.series.len();
        let mut table: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();

        // processing order: by first period ascending; column identity stays
        // with the original request position
        let mut ordered: Vec<(usize, SearchResponse)> = responses.into_iter().enumerate().collect();
        ordered.sort_by_key(|(_, response)| first_period(response));

        for (column, response) in ordered {
            self.merge_response(&mut table, column, &response);
        }

        let rows = self.densify(table, columns);
        debug!("Aligned response table: {} rows x {} columns", rows.len(), columns);

        match self.sort {
            SortDirection::Asc => rows,
            SortDirection::Desc => rows.into_iter().rev().collect(),
        }
    }

    /// Write one response's values into its column of the sparse table
    fn merge_response(
        &self,
        table: &mut BTreeMap<NaiveDate, Vec<Option<f64>>>,
        column: usize,
        response: &SearchResponse,
    ) {
        let rep_mode = self.series[column].rep_mode();

        match response {
            // hit windows were already sliced by the backend
            SearchResponse::Hits(hits) => {
                for hit in hits {
                    self.write_value(table, column, hit.timestamp, hit.field(rep_mode));
                }
            }
            // the backend cannot slice buckets, so the global window is
            // applied here
            SearchResponse::Buckets(buckets) => {
                for bucket in buckets.iter().skip(self.start).take(self.limit) {
                    self.write_value(table, column, bucket.key, bucket.value);
                }
            }
        }
    }

    fn write_value(
        &self,
        table: &mut BTreeMap<NaiveDate, Vec<Option<f64>>>,
        column: usize,
        date: NaiveDate,
        value: Option<f64>,
    ) {
        let period = period_start(date, self.periodicity);
        let row = table
            .entry(period)
            .or_insert_with(|| vec![None; self.series.len()]);
        // first write wins; a (row, column) pair is never overwritten
        if row[column].is_none() {
            row[column] = value.filter(|v| v.is_finite());
        }
    }

    /// Materialize the sparse map into a contiguous ascending table
    fn densify(&self, table: BTreeMap<NaiveDate, Vec<Option<f64>>>, columns: usize) -> Vec<Row> {
        let (first, last) = match (table.keys().next(), table.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Vec::new(),
        };

        let mut table = table;
        let mut rows = Vec::new();
        let mut period = first;
        while period <= last {
            let values = table.remove(&period).unwrap_or_else(|| vec![None; columns]);
            rows.push(Row { period, values });
            period = next_period(period, self.periodicity);
        }
        rows
    }
}

/// First period carried by a response, used only for processing order
fn first_period(response: &SearchResponse) -> Option<NaiveDate> {
    match response {
        SearchResponse::Hits(hits) => hits.first().map(|h| h.timestamp),
        SearchResponse::Buckets(buckets) => buckets.first().map(|b| b.key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Bucket, IndexDocument};
    use crate::types::{CollapseAggregation, Periodicity, RepresentationMode, SeriesId};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn hit(series: &str, date: NaiveDate, value: f64) -> IndexDocument {
        IndexDocument {
            series_id: SeriesId::from(series),
            timestamp: date,
            aggregation: CollapseAggregation::Avg,
            interval: Periodicity::Month,
            value: Some(value),
            change: None,
            percent_change: None,
            change_a_year_ago: None,
            percent_change_a_year_ago: None,
        }
    }

    fn builders(n: usize) -> Vec<SeriesSearchBuilder> {
        (0..n)
            .map(|i| {
                SeriesSearchBuilder::new(
                    SeriesId::new(format!("series_{}", i)),
                    RepresentationMode::Value,
                    Periodicity::Month,
                    CollapseAggregation::Avg,
                )
            })
            .collect()
    }

    fn values(rows: &[Row]) -> Vec<(NaiveDate, Vec<Option<f64>>)> {
        rows.iter().map(|r| (r.period, r.values.clone())).collect()
    }

    #[test]
    fn test_two_series_with_offset_starts() {
        let series = builders(2);
        let formatter =
            ResponseFormatter::new(&series, 0, 10, SortDirection::Asc, Periodicity::Month);

        let responses = vec![
            SearchResponse::Hits(vec![
                hit("series_0", d(2018, 1, 1), 10.0),
                hit("series_0", d(2018, 2, 1), 20.0),
                hit("series_0", d(2018, 3, 1), 30.0),
            ]),
            SearchResponse::Hits(vec![
                hit("series_1", d(2018, 2, 1), 100.0),
                hit("series_1", d(2018, 3, 1), 200.0),
            ]),
        ];

        let rows = formatter.format(responses);
        assert_eq!(
            values(&rows),
            vec![
                (d(2018, 1, 1), vec![Some(10.0), None]),
                (d(2018, 2, 1), vec![Some(20.0), Some(100.0)]),
                (d(2018, 3, 1), vec![Some(30.0), Some(200.0)]),
            ]
        );
    }

    #[test]
    fn test_rows_always_equal_length() {
        let series = builders(3);
        let formatter =
            ResponseFormatter::new(&series, 0, 100, SortDirection::Asc, Periodicity::Month);

        let responses = vec![
            SearchResponse::Hits(vec![hit("series_0", d(2018, 1, 1), 1.0)]),
            SearchResponse::Hits(vec![]),
            SearchResponse::Hits(vec![hit("series_2", d(2018, 4, 1), 4.0)]),
        ];

        let rows = formatter.format(responses);
        assert_eq!(rows.len(), 4);
        for row in &rows {
            assert_eq!(row.values.len(), 3);
        }
        // the empty series' column is null everywhere
        assert!(rows.iter().all(|r| r.values[1].is_none()));
    }

    #[test]
    fn test_gap_fill_synthesizes_missing_periods() {
        let series = builders(1);
        let formatter =
            ResponseFormatter::new(&series, 0, 100, SortDirection::Asc, Periodicity::Month);

        let responses = vec![SearchResponse::Hits(vec![
            hit("series_0", d(2018, 1, 1), 1.0),
            hit("series_0", d(2018, 5, 1), 5.0),
        ])];

        let rows = formatter.format(responses);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[2].period, d(2018, 3, 1));
        assert_eq!(rows[2].values, vec![None]);
    }

    #[test]
    fn test_column_identity_follows_request_order() {
        let series = builders(2);
        let formatter =
            ResponseFormatter::new(&series, 0, 100, SortDirection::Asc, Periodicity::Month);

        // second requested series starts earlier; processing order changes,
        // column order must not
        let responses = vec![
            SearchResponse::Hits(vec![hit("series_0", d(2018, 3, 1), 30.0)]),
            SearchResponse::Hits(vec![hit("series_1", d(2018, 1, 1), 100.0)]),
        ];

        let rows = formatter.format(responses);
        assert_eq!(rows[0].values, vec![None, Some(100.0)]);
        assert_eq!(rows[2].values, vec![Some(30.0), None]);
    }

    #[test]
    fn test_bucket_responses_use_global_window() {
        let series = builders(1);
        let formatter =
            ResponseFormatter::new(&series, 1, 2, SortDirection::Asc, Periodicity::Year);

        let responses = vec![SearchResponse::Buckets(vec![
            Bucket { key: d(2015, 1, 1), value: Some(1.0) },
            Bucket { key: d(2016, 1, 1), value: Some(2.0) },
            Bucket { key: d(2017, 1, 1), value: Some(3.0) },
            Bucket { key: d(2018, 1, 1), value: Some(4.0) },
        ])];

        let rows = formatter.format(responses);
        assert_eq!(
            values(&rows),
            vec![
                (d(2016, 1, 1), vec![Some(2.0)]),
                (d(2017, 1, 1), vec![Some(3.0)]),
            ]
        );
    }

    #[test]
    fn test_descending_is_exact_reversal() {
        let series = builders(1);
        let responses = || {
            vec![SearchResponse::Hits(vec![
                hit("series_0", d(2018, 1, 1), 1.0),
                hit("series_0", d(2018, 2, 1), 2.0),
                hit("series_0", d(2018, 3, 1), 3.0),
            ])]
        };

        let asc = ResponseFormatter::new(&series, 0, 100, SortDirection::Asc, Periodicity::Month)
            .format(responses());
        let desc = ResponseFormatter::new(&series, 0, 100, SortDirection::Desc, Periodicity::Month)
            .format(responses());

        let mut reversed = asc;
        reversed.reverse();
        assert_eq!(desc, reversed);
    }

    #[test]
    fn test_non_finite_values_become_null() {
        let series = builders(1);
        let formatter =
            ResponseFormatter::new(&series, 0, 100, SortDirection::Asc, Periodicity::Month);

        let mut nan_hit = hit("series_0", d(2018, 1, 1), 0.0);
        nan_hit.value = Some(f64::NAN);
        let mut inf_hit = hit("series_0", d(2018, 2, 1), 0.0);
        inf_hit.value = Some(f64::INFINITY);

        let rows = formatter.format(vec![SearchResponse::Hits(vec![nan_hit, inf_hit])]);
        assert_eq!(rows[0].values, vec![None]);
        assert_eq!(rows[1].values, vec![None]);
    }

    #[test]
    fn test_value_written_once_per_cell() {
        let series = builders(1);
        let formatter =
            ResponseFormatter::new(&series, 0, 100, SortDirection::Asc, Periodicity::Month);

        let rows = formatter.format(vec![SearchResponse::Hits(vec![
            hit("series_0", d(2018, 1, 1), 1.0),
            hit("series_0", d(2018, 1, 1), 99.0),
        ])]);
        assert_eq!(rows[0].values, vec![Some(1.0)]);
    }

    #[test]
    fn test_empty_responses_produce_empty_table() {
        let series = builders(2);
        let formatter =
            ResponseFormatter::new(&series, 0, 100, SortDirection::Asc, Periodicity::Month);
        let rows = formatter.format(vec![
            SearchResponse::Hits(vec![]),
            SearchResponse::Buckets(vec![]),
        ]);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_row_serializes_to_wire_shape() {
        let row = Row {
            period: d(2018, 1, 1),
            values: vec![Some(10.0), None],
        };
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"["2018-01-01",10.0,null]"#);
    }
}
