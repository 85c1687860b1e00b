//! Core domain types shared across the query engine
//!
//! This module defines the vocabulary of the indicator index and the request
//! parameters built on top of it:
//!
//! # Key Types
//!
//! - **`SeriesId`**: Opaque identifier of one indexed time series
//! - **`Periodicity`**: Calendar reporting interval (day .. year)
//! - **`RepresentationMode`**: Which derived transform of a value to return
//! - **`CollapseAggregation`**: Aggregation used when resampling to a coarser
//!   periodicity
//! - **`SortDirection`**: Ascending/descending ordering of the result table
//!
//! # Example
//!
//! ```rust
//! use tempora::types::{CollapseAggregation, Periodicity, RepresentationMode};
//!
//! let p: Periodicity = "quarter".parse().unwrap();
//! assert_eq!(p, Periodicity::Quarter);
//!
//! // min/max are not pre-computed at index time
//! assert!(CollapseAggregation::Max.is_in_memory());
//! assert!(!CollapseAggregation::Avg.is_in_memory());
//!
//! assert_eq!(RepresentationMode::PercentChange.field_name(), "percent_change");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the time index field in indexed documents
pub const TIME_INDEX_FIELD: &str = "timestamp";

/// Name of the series identifier field in indexed documents
pub const SERIES_ID_FIELD: &str = "series_id";

/// Name of the stored-aggregation field in indexed documents
pub const AGGREGATION_FIELD: &str = "aggregation";

/// Name of the stored-interval field in indexed documents
pub const INTERVAL_FIELD: &str = "interval";

/// Default pagination offset
pub const DEFAULT_START: usize = 0;

/// Default pagination limit
pub const DEFAULT_LIMIT: usize = 100;

/// Opaque identifier of one indexed time series
///
/// Series ids come from the catalog metadata and are treated as plain
/// keywords; the query layer never inspects their structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesId(String);

impl SeriesId {
    /// Create a series id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw keyword as stored in the index
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SeriesId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SeriesId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Calendar reporting interval of a series or a collapse request
///
/// Ordered from finest to coarsest; `Year` is the coarsest supported
/// collapse interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    /// Daily observations
    Day,
    /// Monthly observations
    Month,
    /// Quarterly observations (3 months)
    Quarter,
    /// Semestral observations (6 months)
    Semester,
    /// Yearly observations
    Year,
}

impl Periodicity {
    /// Keyword used for the `interval` field in indexed documents
    pub fn keyword(&self) -> &'static str {
        match self {
            Periodicity::Day => "day",
            Periodicity::Month => "month",
            Periodicity::Quarter => "quarter",
            Periodicity::Semester => "semester",
            Periodicity::Year => "year",
        }
    }

    /// Whether this is the coarsest supported collapse interval
    ///
    /// At this granularity only one raw point per period is ever indexed, so
    /// every aggregation choice collapses to the same value.
    pub fn is_coarsest(&self) -> bool {
        matches!(self, Periodicity::Year)
    }

    /// Number of whole months per period, if the period is month-based
    pub fn months(&self) -> Option<u32> {
        match self {
            Periodicity::Day => None,
            Periodicity::Month => Some(1),
            Periodicity::Quarter => Some(3),
            Periodicity::Semester => Some(6),
            Periodicity::Year => Some(12),
        }
    }

    /// Extra periods fetched past the requested window for derived
    /// representation modes
    ///
    /// One year expressed in periods of this periodicity, so year-ago
    /// transforms have enough raw lookback at the window edges. This is a
    /// fixed constant irrespective of leading gaps in the series, and can
    /// under-fetch very sparse series.
    pub fn extra_offset(&self) -> usize {
        match self {
            Periodicity::Day => 365,
            Periodicity::Month => 12,
            Periodicity::Quarter => 4,
            Periodicity::Semester => 2,
            Periodicity::Year => 1,
        }
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

impl FromStr for Periodicity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Periodicity::Day),
            "month" => Ok(Periodicity::Month),
            "quarter" => Ok(Periodicity::Quarter),
            "semester" => Ok(Periodicity::Semester),
            "year" => Ok(Periodicity::Year),
            other => Err(format!("invalid periodicity: '{}'", other)),
        }
    }
}

/// Derived transform of a series value to return to the caller
///
/// All transforms are pre-computed by the ingestion pipeline and stored as
/// separate fields of each indexed document; the query layer only selects
/// which field to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepresentationMode {
    /// Raw observation value
    #[default]
    Value,
    /// Absolute change from the previous period
    Change,
    /// Absolute change from the same period a year ago
    ChangeAYearAgo,
    /// Relative change from the previous period
    PercentChange,
    /// Relative change from the same period a year ago
    PercentChangeAYearAgo,
}

impl RepresentationMode {
    /// Name of the document field holding this transform
    pub fn field_name(&self) -> &'static str {
        match self {
            RepresentationMode::Value => "value",
            RepresentationMode::Change => "change",
            RepresentationMode::ChangeAYearAgo => "change_a_year_ago",
            RepresentationMode::PercentChange => "percent_change",
            RepresentationMode::PercentChangeAYearAgo => "percent_change_a_year_ago",
        }
    }

    /// Whether this mode needs extra raw periods at the window edges
    pub fn is_derived(&self) -> bool {
        !matches!(self, RepresentationMode::Value)
    }
}

impl fmt::Display for RepresentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field_name())
    }
}

impl FromStr for RepresentationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "value" => Ok(RepresentationMode::Value),
            "change" => Ok(RepresentationMode::Change),
            "change_a_year_ago" => Ok(RepresentationMode::ChangeAYearAgo),
            "percent_change" => Ok(RepresentationMode::PercentChange),
            "percent_change_a_year_ago" => Ok(RepresentationMode::PercentChangeAYearAgo),
            other => Err(format!("invalid representation mode: '{}'", other)),
        }
    }
}

/// Aggregation applied when collapsing a series to a coarser periodicity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapseAggregation {
    /// Arithmetic mean over the period (the default, always index-stored)
    #[default]
    Avg,
    /// Sum over the period
    Sum,
    /// Minimum over the period
    Min,
    /// Maximum over the period
    Max,
    /// Last raw observation of the period
    EndOfPeriod,
}

impl CollapseAggregation {
    /// Keyword used for the `aggregation` field in indexed documents
    pub fn keyword(&self) -> &'static str {
        match self {
            CollapseAggregation::Avg => "avg",
            CollapseAggregation::Sum => "sum",
            CollapseAggregation::Min => "min",
            CollapseAggregation::Max => "max",
            CollapseAggregation::EndOfPeriod => "end_of_period",
        }
    }

    /// Whether this aggregation must be computed from raw documents at query
    /// time
    ///
    /// min/max are not pre-computed at index time; everything else is stored
    /// per interval and can be selected with a plain match filter.
    pub fn is_in_memory(&self) -> bool {
        matches!(self, CollapseAggregation::Min | CollapseAggregation::Max)
    }
}

impl fmt::Display for CollapseAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

impl FromStr for CollapseAggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(CollapseAggregation::Avg),
            "sum" => Ok(CollapseAggregation::Sum),
            "min" => Ok(CollapseAggregation::Min),
            "max" => Ok(CollapseAggregation::Max),
            "end_of_period" => Ok(CollapseAggregation::EndOfPeriod),
            other => Err(format!("invalid collapse aggregation: '{}'", other)),
        }
    }
}

/// Ordering of the aligned result table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Oldest period first
    #[default]
    Asc,
    /// Newest period first
    Desc,
}

impl SortDirection {
    /// Token accepted in request parameters
    pub fn token(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("invalid sort direction: '{}'", other)),
        }
    }
}
