use std::collections::HashSet;

use async_trait::async_trait;

use crate::{ExportPage, GraphObject, ResultList, Segment, SelectQuery, VitalSqlResult};

/// Handler receiving decoded objects page by page during a segment scan.
pub type ScanHandler<'a> = dyn FnMut(Vec<GraphObject>) -> VitalSqlResult<()> + Send + 'a;

#[async_trait]
pub trait SegmentApi {
    async fn ping(&self) -> VitalSqlResult<()>;
    async fn segment_exists(&self, segment: &Segment) -> VitalSqlResult<bool>;
    async fn add_segment(&self, segment: &Segment) -> VitalSqlResult<()>;
    async fn delete_segment(&self, segment: &Segment, delete_data: bool) -> VitalSqlResult<()>;
    async fn list_segments(&self) -> VitalSqlResult<Vec<Segment>>;
    async fn segment_size(&self, segment: &Segment) -> VitalSqlResult<usize>;
}

#[async_trait]
pub trait ObjectApi {
    async fn save(
        &self,
        transaction: Option<&str>,
        target: &Segment,
        objects: Vec<GraphObject>,
        pool: &[Segment],
    ) -> VitalSqlResult<Vec<GraphObject>>;

    async fn get(&self, pool: &[Segment], uri: &str) -> VitalSqlResult<Option<GraphObject>>;

    async fn get_batch(&self, pool: &[Segment], uris: &[String])
    -> VitalSqlResult<Vec<GraphObject>>;

    async fn delete(
        &self,
        transaction: Option<&str>,
        pool: &[Segment],
        uri: &str,
    ) -> VitalSqlResult<usize>;

    async fn delete_batch(
        &self,
        transaction: Option<&str>,
        pool: &[Segment],
        uris: &[String],
    ) -> VitalSqlResult<usize>;

    async fn delete_all(&self, segment: &Segment) -> VitalSqlResult<()>;

    async fn contains_uris(
        &self,
        segment: &Segment,
        uris: &[String],
    ) -> VitalSqlResult<HashSet<String>>;

    async fn scan(
        &self,
        segment: &Segment,
        page_size: usize,
        handler: &mut ScanHandler<'_>,
    ) -> VitalSqlResult<usize>;

    async fn export(
        &self,
        segment: &Segment,
        offset: usize,
        limit: usize,
    ) -> VitalSqlResult<ExportPage>;
}

#[async_trait]
pub trait QueryApi {
    async fn select(&self, query: &SelectQuery) -> VitalSqlResult<ResultList>;
}

#[async_trait]
pub trait TransactionApi {
    async fn create_transaction(&self) -> VitalSqlResult<String>;
    async fn commit_transaction(&self, id: &str) -> VitalSqlResult<()>;
    async fn rollback_transaction(&self, id: &str) -> VitalSqlResult<()>;
    async fn active_transactions(&self) -> usize;
}
