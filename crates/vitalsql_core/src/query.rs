use serde::{Deserialize, Serialize};

use crate::{CriteriaContainer, GraphObject, Value};

/// Default page size applied when a select query carries no limit.
pub const DEFAULT_LIMIT: usize = 10_000;

/// A logical shard. Its physical table is derived from the URI.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub uri: String,
}

impl Segment {
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortProperty {
    pub property: String,
    pub reverse: bool,
}

impl SortProperty {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            reverse: false,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            reverse: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistinctSpec {
    pub property: String,
    pub expand_property: bool,
    pub sort: Option<SortDirection>,
    /// Keep only the first value after sorting.
    pub first: bool,
    /// Keep only the last value after sorting.
    pub last: bool,
}

impl DistinctSpec {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            expand_property: false,
            sort: None,
            first: false,
            last: false,
        }
    }

    pub fn sorted(mut self, direction: SortDirection) -> Self {
        self.sort = Some(direction);
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    Average,
    Count,
    Sum,
    Min,
    Max,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub kind: AggregationKind,
    pub property: Option<String>,
    pub distinct: bool,
}

impl Aggregation {
    pub fn new(kind: AggregationKind, property: impl Into<String>) -> Self {
        Self {
            kind,
            property: Some(property.into()),
            distinct: false,
        }
    }

    pub fn count_all() -> Self {
        Self {
            kind: AggregationKind::Count,
            property: None,
            distinct: false,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectStats {
    #[default]
    None,
    Normal,
    Detailed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    pub segments: Vec<Segment>,
    pub criteria: CriteriaContainer,
    pub sort: Vec<SortProperty>,
    pub offset: usize,
    /// Zero selects [`DEFAULT_LIMIT`].
    pub limit: usize,
    pub projection_only: bool,
    pub distinct: Option<DistinctSpec>,
    pub aggregation: Option<Aggregation>,
    pub collect_stats: CollectStats,
}

impl SelectQuery {
    pub fn new(segments: Vec<Segment>, criteria: CriteriaContainer) -> Self {
        Self {
            segments,
            criteria,
            sort: Vec::new(),
            offset: 0,
            limit: 0,
            projection_only: false,
            distinct: None,
            aggregation: None,
            collect_stats: CollectStats::None,
        }
    }

    pub fn sort_by(mut self, sort: SortProperty) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn projection_only(mut self) -> Self {
        self.projection_only = true;
        self
    }

    pub fn distinct(mut self, distinct: DistinctSpec) -> Self {
        self.distinct = Some(distinct);
        self
    }

    pub fn aggregate(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn stats(mut self, collect: CollectStats) -> Self {
        self.collect_stats = collect;
        self
    }

    pub fn effective_limit(&self) -> usize {
        if self.limit > 0 {
            self.limit
        } else {
            DEFAULT_LIMIT
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultElement {
    pub object: GraphObject,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub kind: AggregationKind,
    pub value: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryTime {
    pub label: String,
    pub sql: String,
    pub time_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryStats {
    pub database_time_ms: u64,
    pub probing_time_ms: u64,
    pub objects_batch_get_ms: u64,
    pub attributes_time_ms: u64,
    pub resolving_time_ms: u64,
    pub total_time_ms: u64,
    pub queries: Option<Vec<QueryTime>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultList {
    pub results: Vec<ResultElement>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub distinct_values: Option<Vec<Value>>,
    pub aggregation: Option<AggregationResult>,
    pub stats: Option<QueryStats>,
}

impl ResultList {
    pub fn uris(&self) -> Vec<&str> {
        self.results
            .iter()
            .map(|element| element.object.uri.as_str())
            .collect()
    }
}

/// One page of a segment export, ordered by URI.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportPage {
    pub objects: Vec<GraphObject>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}
