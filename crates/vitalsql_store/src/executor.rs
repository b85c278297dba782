use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use sea_orm::ConnectionTrait;
use sea_orm::sea_query::SelectStatement;

use crate::codec::{self, OverflowMode};
use crate::compile::SegmentCompiler;
use crate::config::ExecutionMode;
use crate::db::render;
use crate::dialect::SqlDialect;
use crate::normalize::Normalizer;
use crate::operations;
use crate::optimize;
use crate::rows::{self, ReadOptions};
use crate::segments;
use vitalsql_core::{
    Aggregation, AggregationKind, AggregationResult, CollectStats, ContainerKind,
    CriteriaContainer, CriteriaElement, Criterion, GraphObject, OrderedValue, QueryStats,
    QueryTime, Registry, ResultElement, ResultList, SelectQuery, SortDirection, SortProperty,
    Value, VitalSqlError, VitalSqlResult, versionless, vocab,
};

#[derive(Clone, Debug)]
pub struct ExecutorSettings {
    pub tables_prefix: String,
    pub probing: bool,
    pub fold_types: bool,
    pub mode: ExecutionMode,
    pub read: ReadOptions,
}

type UriSet = BTreeSet<String>;
type UriSetFuture<'b> = Pin<Box<dyn Future<Output = VitalSqlResult<UriSet>> + Send + 'b>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Query,
    Probe,
    BatchGet,
    Attributes,
    Resolving,
}

struct StatsRecorder {
    level: CollectStats,
    stats: QueryStats,
    started: Instant,
}

impl StatsRecorder {
    fn new(level: CollectStats) -> Self {
        Self {
            level,
            stats: QueryStats::default(),
            started: Instant::now(),
        }
    }

    fn detailed(&self) -> bool {
        self.level == CollectStats::Detailed
    }

    fn record(&mut self, phase: Phase, label: &str, sql: impl FnOnce() -> String, elapsed: Duration) {
        if self.level == CollectStats::None {
            return;
        }
        let time_ms = elapsed.as_millis() as u64;
        self.stats.database_time_ms += time_ms;
        match phase {
            Phase::Query => {}
            Phase::Probe => self.stats.probing_time_ms += time_ms,
            Phase::BatchGet => self.stats.objects_batch_get_ms += time_ms,
            Phase::Attributes => self.stats.attributes_time_ms += time_ms,
            Phase::Resolving => self.stats.resolving_time_ms += time_ms,
        }
        if self.detailed() {
            self.stats.queries.get_or_insert_with(Vec::new).push(QueryTime {
                label: label.to_string(),
                sql: sql(),
                time_ms,
            });
        }
    }

    fn finish(mut self) -> Option<QueryStats> {
        if self.level == CollectStats::None {
            return None;
        }
        self.stats.total_time_ms = self.started.elapsed().as_millis() as u64;
        Some(self.stats)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum SortMode {
    IndexOrder,
    Uri,
    Timestamp,
    Property(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ResolvedSort {
    mode: SortMode,
    reverse: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Position(usize, usize),
    Text(String),
    Value(Option<OrderedValue>),
}

#[derive(Clone, Debug)]
struct Hit {
    uri: String,
    segment: usize,
    keys: Vec<SortKey>,
    score: f64,
}

/// Sort keys first, then score descending, then URI ascending.
fn compare_hits(left: &Hit, right: &Hit, reverse: &[bool]) -> Ordering {
    for ((left_key, right_key), reversed) in left.keys.iter().zip(&right.keys).zip(reverse) {
        let ordering = left_key.cmp(right_key);
        let ordering = if *reversed { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    right
        .score
        .total_cmp(&left.score)
        .then_with(|| left.uri.cmp(&right.uri))
}

/// Keeps the best `capacity` hits seen so far, in result order.
struct PriorityBuffer {
    capacity: usize,
    reverse: Vec<bool>,
    entries: Vec<Hit>,
}

impl PriorityBuffer {
    fn new(capacity: usize, reverse: Vec<bool>) -> Self {
        Self {
            capacity,
            reverse,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, hit: Hit) {
        let position = self
            .entries
            .partition_point(|entry| compare_hits(entry, &hit, &self.reverse) != Ordering::Greater);
        if position >= self.capacity {
            return;
        }
        self.entries.insert(position, hit);
        self.entries.truncate(self.capacity);
    }

    fn into_sorted(self) -> Vec<Hit> {
        self.entries
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    count: usize,
    numeric: usize,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
    distinct: BTreeSet<OrderedValue>,
}

impl Accumulator {
    fn add(&mut self, value: &Value) {
        self.count += 1;
        if let Some(number) = value.as_f64() {
            self.numeric += 1;
            self.sum += number;
            self.min = Some(self.min.map_or(number, |min| min.min(number)));
            self.max = Some(self.max.map_or(number, |max| max.max(number)));
        }
    }

    fn finish(mut self, aggregation: &Aggregation) -> AggregationResult {
        if aggregation.distinct {
            for value in std::mem::take(&mut self.distinct) {
                self.add(&value.0);
            }
        }
        let value = match aggregation.kind {
            AggregationKind::Count => self.count as f64,
            AggregationKind::Sum => self.sum,
            AggregationKind::Average if self.numeric == 0 => f64::NAN,
            AggregationKind::Average => self.sum / self.numeric as f64,
            AggregationKind::Min => self.min.unwrap_or(f64::NAN),
            AggregationKind::Max => self.max.unwrap_or(f64::NAN),
        };
        AggregationResult {
            kind: aggregation.kind,
            value,
        }
    }
}

struct SegmentScope<'a> {
    compiler: SegmentCompiler<'a>,
    all: Option<UriSet>,
}

/// Runs one select query across its segments.
pub struct QueryExecutor<'a, C> {
    conn: &'a C,
    registry: &'a Registry,
    dialect: &'a dyn SqlDialect,
    settings: &'a ExecutorSettings,
    stats: StatsRecorder,
}

impl<'a, C> QueryExecutor<'a, C>
where
    C: ConnectionTrait + Sync,
{
    pub fn new(
        conn: &'a C,
        registry: &'a Registry,
        dialect: &'a dyn SqlDialect,
        settings: &'a ExecutorSettings,
    ) -> Self {
        Self {
            conn,
            registry,
            dialect,
            settings,
            stats: StatsRecorder::new(CollectStats::None),
        }
    }

    pub async fn select(mut self, query: &SelectQuery) -> VitalSqlResult<ResultList> {
        validate(query)?;
        self.stats = StatsRecorder::new(query.collect_stats);
        let criteria = Normalizer::new(self.registry).normalize(&query.criteria)?;
        let sort = self.resolve_sort(&query.sort)?;
        let limit = query.effective_limit();

        let mut total = 0;
        let mut buffer = PriorityBuffer::new(
            query.offset.saturating_add(limit),
            sort.iter().map(|sort| sort.reverse).collect(),
        );
        let mut accumulator = Accumulator::default();
        let mut distinct_values = BTreeSet::new();

        for (segment_index, segment) in query.segments.iter().enumerate() {
            let table = segments::table_name(&self.settings.tables_prefix, &segment.uri);
            let matched = self.match_segment(&table, &criteria).await?;
            log::debug!("segment {} matched {} objects", segment.uri, matched.len());
            total += matched.len();
            if matched.is_empty() {
                continue;
            }
            let uris: Vec<String> = matched.into_iter().collect();
            if let Some(aggregation) = &query.aggregation {
                self.accumulate(&table, aggregation, &uris, &mut accumulator)
                    .await?;
                continue;
            }
            if let Some(spec) = &query.distinct {
                let names = [versionless(&spec.property)];
                for (_, value) in self.property_values(&table, &names, &uris).await? {
                    distinct_values.insert(OrderedValue(value));
                }
                continue;
            }
            if query.projection_only {
                continue;
            }
            for hit in self.rank_segment(&table, segment_index, &sort, uris).await? {
                buffer.push(hit);
            }
        }

        let mut result = ResultList {
            total,
            offset: query.offset,
            limit,
            ..ResultList::default()
        };
        if let Some(aggregation) = &query.aggregation {
            result.aggregation = Some(accumulator.finish(aggregation));
        } else if let Some(spec) = &query.distinct {
            let mut values: Vec<Value> = distinct_values.into_iter().map(|value| value.0).collect();
            if spec.sort == Some(SortDirection::Desc) {
                values.reverse();
            }
            result.total = values.len();
            if spec.first {
                values.truncate(1);
            } else if spec.last {
                values = values.pop().into_iter().collect();
            }
            result.distinct_values = Some(values);
        } else if !query.projection_only {
            let page: Vec<Hit> = buffer.into_sorted().into_iter().skip(query.offset).collect();
            result.results = self.load_objects(query, &page).await?;
        }
        result.stats = self.stats.finish();
        Ok(result)
    }

    fn resolve_sort(&self, sort: &[SortProperty]) -> VitalSqlResult<Vec<ResolvedSort>> {
        let mut resolved = Vec::with_capacity(sort.len());
        for property in sort {
            let mode = match property.property.as_str() {
                vocab::INDEX_ORDER => SortMode::IndexOrder,
                vocab::URI => SortMode::Uri,
                vocab::RELEVANCE => {
                    return Err(VitalSqlError::query("relevance sorting is not supported"));
                }
                other => {
                    let name = versionless(other);
                    let def = self.registry.property(&name).ok_or_else(|| {
                        VitalSqlError::query(format!("cannot sort by unknown property {name}"))
                    })?;
                    if def.multi_valued {
                        return Err(VitalSqlError::query(format!(
                            "cannot sort by multi-valued property {name}"
                        )));
                    }
                    if name == vocab::HAS_TIMESTAMP && sort.len() == 1 {
                        SortMode::Timestamp
                    } else {
                        SortMode::Property(name)
                    }
                }
            };
            resolved.push(ResolvedSort {
                mode,
                reverse: property.reverse,
            });
        }
        Ok(resolved)
    }

    async fn match_segment(&mut self, table: &str, criteria: &CriteriaContainer) -> VitalSqlResult<UriSet> {
        let mut scope = SegmentScope {
            compiler: SegmentCompiler::new(self.registry, self.dialect, table),
            all: None,
        };
        match self.settings.mode {
            ExecutionMode::SetAlgebra => self.evaluate(&mut scope, criteria).await,
            ExecutionMode::SingleStatement => {
                if self.settings.probing && !self.probe_conjunction(&mut scope, criteria).await? {
                    return Ok(UriSet::new());
                }
                let statement = scope.compiler.container(criteria, self.settings.fold_types)?;
                Ok(self.run_uris(Phase::Query, "SELECT", &statement).await?.into_iter().collect())
            }
        }
    }

    fn evaluate<'b>(
        &'b mut self,
        scope: &'b mut SegmentScope<'a>,
        container: &'b CriteriaContainer,
    ) -> UriSetFuture<'b> {
        Box::pin(async move {
            match (container.kind, container.elements.is_empty()) {
                (ContainerKind::And, true) => self.all_uris(scope).await,
                (ContainerKind::Or, true) => Ok(UriSet::new()),
                (ContainerKind::And, false) => self.evaluate_and(scope, container).await,
                (ContainerKind::Or, false) => self.evaluate_or(scope, container).await,
            }
        })
    }

    async fn evaluate_and(
        &mut self,
        scope: &mut SegmentScope<'a>,
        container: &CriteriaContainer,
    ) -> VitalSqlResult<UriSet> {
        if self.settings.probing && !self.probe(scope, container).await? {
            return Ok(UriSet::new());
        }
        let fold = if self.settings.fold_types {
            optimize::fold_type_and(container)?
        } else {
            None
        };
        if fold.as_ref().is_some_and(|fold| fold.unsatisfiable) {
            return Ok(UriSet::new());
        }

        let mut matched: Option<UriSet> = None;
        let mut negatives = Vec::new();
        let mut fold_applied = false;
        for (index, element) in container.elements.iter().enumerate() {
            if fold.as_ref().is_some_and(|fold| fold.covers(index)) {
                continue;
            }
            let found = match element {
                CriteriaElement::Container(child) => match self.fold_child(child) {
                    Some(criterion) => {
                        fold_applied |= fold.is_some();
                        self.run_leaf(scope, &criterion, fold.as_ref()).await?
                    }
                    None => self.evaluate(scope, child).await?,
                },
                CriteriaElement::Criterion(criterion) => {
                    if is_set_negation(criterion) {
                        negatives.push(criterion);
                        continue;
                    }
                    fold_applied |= fold.is_some();
                    self.run_leaf(scope, criterion, fold.as_ref()).await?
                }
            };
            let next = match matched.take() {
                None => found,
                Some(current) => current.intersection(&found).cloned().collect(),
            };
            if next.is_empty() {
                return Ok(next);
            }
            matched = Some(next);
        }

        if !fold_applied && let Some(fold) = &fold {
            let statement = scope.compiler.fold_only(fold);
            let folded: UriSet = self
                .run_uris(Phase::Query, "FOLD", &statement)
                .await?
                .into_iter()
                .collect();
            matched = Some(match matched {
                Some(current) => current.intersection(&folded).cloned().collect(),
                None => folded,
            });
        }
        let mut matched = match matched {
            Some(matched) => matched,
            None => self.all_uris(scope).await?,
        };
        for criterion in negatives {
            if matched.is_empty() {
                break;
            }
            let excluded = self.run_leaf(scope, criterion, None).await?;
            matched.retain(|uri| !excluded.contains(uri));
        }
        Ok(matched)
    }

    async fn evaluate_or(
        &mut self,
        scope: &mut SegmentScope<'a>,
        container: &CriteriaContainer,
    ) -> VitalSqlResult<UriSet> {
        let mut matched = UriSet::new();
        for element in &container.elements {
            match element {
                CriteriaElement::Container(child) => {
                    let found = match self.fold_child(child) {
                        Some(criterion) => self.run_leaf(scope, &criterion, None).await?,
                        None => self.evaluate(scope, child).await?,
                    };
                    matched.extend(found);
                }
                CriteriaElement::Criterion(criterion) => {
                    let found = self.run_leaf(scope, criterion, None).await?;
                    if is_set_negation(criterion) {
                        let all = self.all_uris(scope).await?;
                        matched.extend(all.difference(&found).cloned());
                    } else {
                        matched.extend(found);
                    }
                }
            }
        }
        Ok(matched)
    }

    fn fold_child(&self, child: &CriteriaContainer) -> Option<Criterion> {
        if !self.settings.fold_types {
            return None;
        }
        optimize::fold_type_or(child)
            .or_else(|| optimize::fold_type_ne_and(child))
            .map(Criterion::Type)
    }

    /// `false` when some criterion of the AND container matches nothing in the segment.
    async fn probe(&mut self, scope: &mut SegmentScope<'a>, container: &CriteriaContainer) -> VitalSqlResult<bool> {
        for criterion in optimize::probe_candidates(container) {
            let statement = scope.compiler.probe(criterion)?;
            let found = self.run_uris(Phase::Probe, "PROBE", &statement).await?;
            if found.is_empty() {
                log::debug!("probe found no match in {}", scope.compiler.table());
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Probes an AND container and, recursively, its AND children. Any empty probe means the
    /// composed statement cannot match.
    fn probe_conjunction<'b>(
        &'b mut self,
        scope: &'b mut SegmentScope<'a>,
        container: &'b CriteriaContainer,
    ) -> Pin<Box<dyn Future<Output = VitalSqlResult<bool>> + Send + 'b>> {
        Box::pin(async move {
            if container.kind != ContainerKind::And {
                return Ok(true);
            }
            if !self.probe(scope, container).await? {
                return Ok(false);
            }
            for child in container.containers() {
                if !self.probe_conjunction(scope, child).await? {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }

    /// URIs matching the positive form of a criterion.
    async fn run_leaf(
        &mut self,
        scope: &mut SegmentScope<'a>,
        criterion: &Criterion,
        fold: Option<&optimize::TypeAndFold>,
    ) -> VitalSqlResult<UriSet> {
        let leaf = scope.compiler.leaf(criterion, fold)?;
        Ok(self
            .run_uris(Phase::Query, "LEAF", &leaf.statement)
            .await?
            .into_iter()
            .collect())
    }

    async fn all_uris(&mut self, scope: &mut SegmentScope<'a>) -> VitalSqlResult<UriSet> {
        if let Some(all) = &scope.all {
            return Ok(all.clone());
        }
        let table = scope.compiler.table().to_string();
        let started = Instant::now();
        let all: UriSet = operations::all_uris(self.conn, &table).await?.into_iter().collect();
        self.stats.record(
            Phase::Query,
            "ALL URIS",
            || format!("SELECT DISTINCT uri FROM {table}"),
            started.elapsed(),
        );
        scope.all = Some(all.clone());
        Ok(all)
    }

    async fn run_uris(&mut self, phase: Phase, label: &str, statement: &SelectStatement) -> VitalSqlResult<Vec<String>> {
        let started = Instant::now();
        let uris = operations::select_uris(self.conn, statement).await?;
        let backend = self.conn.get_database_backend();
        self.stats
            .record(phase, label, || render(backend, statement), started.elapsed());
        Ok(uris)
    }

    /// Decoded values of the named properties for the given objects.
    async fn property_values(
        &mut self,
        table: &str,
        names: &[String],
        uris: &[String],
    ) -> VitalSqlResult<Vec<(String, Value)>> {
        let started = Instant::now();
        let rows = operations::fetch_property_rows(self.conn, table, names, uris).await?;
        self.stats.record(
            Phase::Attributes,
            "ATTRIBUTES",
            || format!("SELECT * FROM {table} WHERE name IN ({})", names.join(", ")),
            started.elapsed(),
        );
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let value = match codec::decode(&row.value, row.full_text.as_deref(), OverflowMode::Inline)? {
                codec::Decoded::Ready(value) => value,
                codec::Decoded::Deferred(kind) => {
                    return Err(VitalSqlError::integrity(format!(
                        "unexpected deferred {} value on {}",
                        kind.as_str(),
                        row.uri
                    )));
                }
            };
            values.push((row.uri, value));
        }
        Ok(values)
    }

    async fn accumulate(
        &mut self,
        table: &str,
        aggregation: &Aggregation,
        uris: &[String],
        accumulator: &mut Accumulator,
    ) -> VitalSqlResult<()> {
        let Some(property) = &aggregation.property else {
            accumulator.count += uris.len();
            return Ok(());
        };
        let names = [versionless(property)];
        for (_, value) in self.property_values(table, &names, uris).await? {
            if aggregation.distinct {
                accumulator.distinct.insert(OrderedValue(value));
            } else {
                accumulator.add(&value);
            }
        }
        Ok(())
    }

    async fn rank_segment(
        &mut self,
        table: &str,
        segment_index: usize,
        sort: &[ResolvedSort],
        uris: Vec<String>,
    ) -> VitalSqlResult<Vec<Hit>> {
        let mut columns: Vec<HashMap<String, Value>> = Vec::with_capacity(sort.len());
        for resolved in sort {
            let column = match &resolved.mode {
                SortMode::Property(name) => self
                    .property_values(table, std::slice::from_ref(name), &uris)
                    .await?
                    .into_iter()
                    .collect(),
                SortMode::Timestamp => {
                    let started = Instant::now();
                    let stamped = operations::uris_by_timestamp(self.conn, table, &uris).await?;
                    self.stats.record(
                        Phase::Attributes,
                        "TIMESTAMPS",
                        || format!("SELECT DISTINCT uri, tstamp FROM {table}"),
                        started.elapsed(),
                    );
                    stamped
                        .into_iter()
                        .filter_map(|(uri, tstamp)| tstamp.map(|tstamp| (uri, Value::Long(tstamp))))
                        .collect()
                }
                SortMode::IndexOrder | SortMode::Uri => HashMap::new(),
            };
            columns.push(column);
        }

        let mut hits = Vec::with_capacity(uris.len());
        for (position, uri) in uris.into_iter().enumerate() {
            let mut keys = Vec::with_capacity(sort.len());
            for (resolved, column) in sort.iter().zip(columns.iter_mut()) {
                keys.push(match resolved.mode {
                    SortMode::IndexOrder => SortKey::Position(segment_index, position),
                    SortMode::Uri => SortKey::Text(uri.clone()),
                    SortMode::Timestamp | SortMode::Property(_) => {
                        SortKey::Value(column.remove(&uri).map(OrderedValue))
                    }
                });
            }
            hits.push(Hit {
                uri,
                segment: segment_index,
                keys,
                score: 0.0,
            });
        }
        Ok(hits)
    }

    /// Batch-fetches the objects of a result page and returns them in hit order.
    async fn load_objects(&mut self, query: &SelectQuery, page: &[Hit]) -> VitalSqlResult<Vec<ResultElement>> {
        let mut by_segment: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for hit in page {
            by_segment.entry(hit.segment).or_default().push(hit.uri.clone());
        }
        let mut options = self.settings.read;
        options.overflow = OverflowMode::Deferred;

        let mut objects: HashMap<String, GraphObject> = HashMap::new();
        for (segment_index, mut uris) in by_segment {
            let Some(segment) = query.segments.get(segment_index) else {
                continue;
            };
            uris.sort();
            let table = segments::table_name(&self.settings.tables_prefix, &segment.uri);

            let started = Instant::now();
            let rows = operations::fetch_rows(self.conn, &table, &uris, false).await?;
            self.stats.record(
                Phase::BatchGet,
                "BATCH GET",
                || format!("SELECT ... FROM {table} WHERE uri IN (...) ORDER BY uri"),
                started.elapsed(),
            );
            let decoded = rows::decode_batch(rows, self.registry, &options)?;

            let pending: Vec<String> = decoded
                .iter()
                .filter(|decoded| !decoded.deferred.is_empty())
                .map(|decoded| decoded.object.uri.clone())
                .collect();
            let mut texts = HashMap::new();
            if !pending.is_empty() {
                let started = Instant::now();
                texts = operations::fetch_full_texts(self.conn, &table, &pending).await?;
                self.stats.record(
                    Phase::Resolving,
                    "FULL TEXT",
                    || format!("SELECT uri, name, value_full_text FROM {table}"),
                    started.elapsed(),
                );
            }
            for mut decoded in decoded {
                rows::resolve_deferred(&mut decoded, &mut texts)?;
                objects.insert(decoded.object.uri.clone(), decoded.object);
            }
        }

        Ok(page
            .iter()
            .filter_map(|hit| {
                objects.remove(&hit.uri).map(|object| ResultElement {
                    object,
                    score: hit.score,
                })
            })
            .collect())
    }
}

fn is_set_negation(criterion: &Criterion) -> bool {
    matches!(criterion, Criterion::Property(property) if property.comparator.is_set_negation())
}

fn validate(query: &SelectQuery) -> VitalSqlResult<()> {
    if query.criteria.elements.is_empty() {
        return Err(VitalSqlError::query("empty query criteria container"));
    }
    if query.projection_only && query.aggregation.is_some() {
        return Err(VitalSqlError::query(
            "projection-only queries cannot carry an aggregation",
        ));
    }
    if query.aggregation.is_some() && query.distinct.is_some() {
        return Err(VitalSqlError::query(
            "aggregation and distinct cannot be combined",
        ));
    }
    if let Some(aggregation) = &query.aggregation
        && aggregation.property.is_none()
        && aggregation.kind != AggregationKind::Count
    {
        return Err(VitalSqlError::query(format!(
            "{:?} aggregation requires a property",
            aggregation.kind
        )));
    }
    if query.distinct.as_ref().is_some_and(|spec| spec.expand_property) {
        return Err(VitalSqlError::query(
            "distinct values of an expanded property are not supported",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitalsql_core::{Segment, TypeCriterion};

    fn hit(uri: &str, keys: Vec<SortKey>) -> Hit {
        Hit {
            uri: uri.to_string(),
            segment: 0,
            keys,
            score: 0.0,
        }
    }

    #[test]
    fn buffer_keeps_best_entries_in_uri_order() {
        let mut buffer = PriorityBuffer::new(3, Vec::new());
        for uri in ["urn:e", "urn:b", "urn:d", "urn:a", "urn:c"] {
            buffer.push(hit(uri, Vec::new()));
        }
        let uris: Vec<String> = buffer.into_sorted().into_iter().map(|hit| hit.uri).collect();
        assert_eq!(uris, vec!["urn:a", "urn:b", "urn:c"]);
    }

    #[test]
    fn reversed_sort_puts_missing_values_last() {
        let mut buffer = PriorityBuffer::new(10, vec![true]);
        buffer.push(hit("urn:a", vec![SortKey::Value(None)]));
        buffer.push(hit("urn:b", vec![SortKey::Value(Some(OrderedValue(Value::Integer(1))))]));
        buffer.push(hit("urn:c", vec![SortKey::Value(Some(OrderedValue(Value::Integer(5))))]));
        let uris: Vec<String> = buffer.into_sorted().into_iter().map(|hit| hit.uri).collect();
        assert_eq!(uris, vec!["urn:c", "urn:b", "urn:a"]);
    }

    #[test]
    fn higher_scores_rank_first_on_equal_keys() {
        let mut low = hit("urn:a", Vec::new());
        low.score = 0.1;
        let mut high = hit("urn:z", Vec::new());
        high.score = 0.9;
        assert_eq!(compare_hits(&high, &low, &[]), Ordering::Less);
    }

    #[test]
    fn aggregates_handle_empty_input() {
        let average = Accumulator::default().finish(&Aggregation::new(AggregationKind::Average, "urn:p"));
        assert!(average.value.is_nan());
        let mut accumulator = Accumulator::default();
        for value in [Value::Integer(2), Value::Integer(2), Value::Double(5.0)] {
            accumulator.distinct.insert(OrderedValue(value));
        }
        let count = accumulator.finish(&Aggregation::new(AggregationKind::Count, "urn:p").distinct());
        assert_eq!(count.value, 2.0);
    }

    #[test]
    fn invalid_queries_are_rejected() {
        let segments = vec![Segment::new("s", "urn:s")];
        let empty = SelectQuery::new(segments.clone(), CriteriaContainer::and(Vec::new()));
        assert!(validate(&empty).is_err());
        let criteria = CriteriaContainer::and(vec![TypeCriterion::is("urn:A").into()]);
        let projected = SelectQuery::new(segments.clone(), criteria.clone())
            .projection_only()
            .aggregate(Aggregation::count_all());
        assert!(validate(&projected).is_err());
        let sum = SelectQuery::new(segments, criteria).aggregate(Aggregation {
            kind: AggregationKind::Sum,
            property: None,
            distinct: false,
        });
        assert!(validate(&sum).is_err());
    }
}
