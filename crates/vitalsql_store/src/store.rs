use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, TransactionTrait};
use sea_orm_migration::MigratorTrait;

use crate::codec::OverflowMode;
use crate::config::{DatabaseConfig, VitalSqlConfig};
use crate::dialect::{SqlDialect, dialect_for};
use crate::executor::{ExecutorSettings, QueryExecutor};
use crate::migration::Migrator;
use crate::operations;
use crate::rows::{self, ReadOptions, StreamDecoder};
use crate::segments;
use vitalsql_core::{
    ExportPage, GraphObject, ObjectApi, QueryApi, Registry, ResultList, ScanHandler, Segment,
    SegmentApi, SelectQuery, TransactionApi, VitalSqlError, VitalSqlResult,
};

#[derive(Clone)]
pub struct VitalSqlStore {
    conn: DatabaseConnection,
    dialect: Arc<dyn SqlDialect>,
    registry: Arc<Registry>,
    transactions: Arc<crate::transactions::TransactionRegistry>,
    settings: Arc<ExecutorSettings>,
}

impl VitalSqlStore {
    pub async fn connect(
        config: &VitalSqlConfig,
        base_dir: &Path,
        registry: Arc<Registry>,
    ) -> VitalSqlResult<Self> {
        config.validate()?;
        let url = build_connection_url(config, base_dir)?;
        let mut options = ConnectOptions::new(url);
        if let Some(pool) = &config.pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        options.sqlx_logging(false);
        let conn = Database::connect(options).await.map_err(VitalSqlError::from)?;
        Migrator::up(&conn, None).await.map_err(VitalSqlError::from)?;

        let query = config.query();
        let settings = ExecutorSettings {
            tables_prefix: config.tables_prefix().to_string(),
            probing: query.probing.unwrap_or(true),
            fold_types: query.fold_types.unwrap_or(true),
            mode: query.execution_mode.unwrap_or_default(),
            read: ReadOptions {
                enforcement: config.version_enforcement(),
                external_properties: config.external_properties(),
                ignore_broken_data: query.ignore_broken_data.unwrap_or(false),
                overflow: OverflowMode::Inline,
            },
        };
        log::debug!(
            "connected {} store, {} active transactions allowed",
            config.backend_name(),
            config.max_active_transactions()
        );
        Ok(Self {
            conn,
            dialect: Arc::from(dialect_for(config.backend_name())),
            registry,
            transactions: Arc::new(crate::transactions::TransactionRegistry::new(
                config.max_active_transactions(),
            )),
            settings: Arc::new(settings),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn max_active_transactions(&self) -> usize {
        self.transactions.limit()
    }

    /// Rolls back every live transaction.
    pub async fn close(&self) {
        self.transactions.close().await;
    }

    fn table(&self, segment: &Segment) -> String {
        segments::table_name(&self.settings.tables_prefix, &segment.uri)
    }

    async fn existing_tables<C: ConnectionTrait>(&self, conn: &C) -> VitalSqlResult<HashSet<String>> {
        Ok(
            segments::list_table_names(conn, self.dialect.as_ref(), &self.settings.tables_prefix)
                .await?
                .into_iter()
                .collect(),
        )
    }

    async fn require_segment<C: ConnectionTrait>(
        &self,
        conn: &C,
        segment: &Segment,
    ) -> VitalSqlResult<String> {
        let table = self.table(segment);
        if !self.existing_tables(conn).await?.contains(&table) {
            return Err(VitalSqlError::not_found(format!(
                "segment not found, uri: {} id: {}",
                segment.uri, segment.id
            )));
        }
        Ok(table)
    }

    /// Tables of the pool segments that exist, in pool order.
    async fn pool_tables<'p, C: ConnectionTrait>(
        &self,
        conn: &C,
        pool: &'p [Segment],
    ) -> VitalSqlResult<Vec<(&'p Segment, String)>> {
        let existing = self.existing_tables(conn).await?;
        Ok(pool
            .iter()
            .map(|segment| (segment, self.table(segment)))
            .filter(|(_, table)| existing.contains(table))
            .collect())
    }

    async fn save_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        target: &Segment,
        objects: &[GraphObject],
        pool: &[Segment],
    ) -> VitalSqlResult<()> {
        let table = self.require_segment(conn, target).await?;
        let uris: Vec<String> = objects.iter().map(|object| object.uri.clone()).collect();
        for (segment, other) in self.pool_tables(conn, pool).await? {
            if other == table {
                continue;
            }
            let found = operations::contains_uris(conn, &other, &uris).await?;
            if let Some(uri) = found.iter().next() {
                return Err(VitalSqlError::conflict(format!(
                    "object {uri} already stored in segment {}",
                    segment.uri
                )));
            }
        }
        let mut rows = Vec::new();
        for object in objects {
            rows.extend(rows::to_rows(object, &self.registry)?);
        }
        operations::delete_uris(conn, &table, &uris).await?;
        operations::insert_rows(conn, &table, &rows).await?;
        log::debug!("saved {} objects ({} rows) into {}", objects.len(), rows.len(), target.uri);
        Ok(())
    }

    async fn delete_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        pool: &[Segment],
        uris: &[String],
    ) -> VitalSqlResult<usize> {
        let mut deleted = 0;
        for (_, table) in self.pool_tables(conn, pool).await? {
            let found: Vec<String> = operations::contains_uris(conn, &table, uris)
                .await?
                .into_iter()
                .collect();
            if found.is_empty() {
                continue;
            }
            operations::delete_uris(conn, &table, &found).await?;
            deleted += found.len();
        }
        Ok(deleted)
    }
}

#[async_trait]
impl SegmentApi for VitalSqlStore {
    async fn ping(&self) -> VitalSqlResult<()> {
        self.existing_tables(&self.conn).await?;
        Ok(())
    }

    async fn segment_exists(&self, segment: &Segment) -> VitalSqlResult<bool> {
        segments::table_exists(
            &self.conn,
            self.dialect.as_ref(),
            &self.settings.tables_prefix,
            &self.table(segment),
        )
        .await
    }

    async fn add_segment(&self, segment: &Segment) -> VitalSqlResult<()> {
        let table = self.table(segment);
        if self.segment_exists(segment).await? {
            return Err(VitalSqlError::conflict(format!(
                "segment table with uri {} already exists, id: {}",
                segment.uri, segment.id
            )));
        }
        segments::create_table(&self.conn, self.dialect.as_ref(), &table).await?;
        if let Some(stale) = segments::catalog_find(&self.conn, &segment.uri).await? {
            log::warn!("replacing stale catalog entry for {} ({})", segment.uri, stale.table);
            segments::catalog_remove(&self.conn, &segment.uri).await?;
        }
        segments::catalog_insert(&self.conn, segment, &table).await?;
        Ok(())
    }

    async fn delete_segment(&self, segment: &Segment, delete_data: bool) -> VitalSqlResult<()> {
        let table = self.require_segment(&self.conn, segment).await?;
        if delete_data {
            segments::drop_table(&self.conn, &table).await?;
            segments::catalog_remove(&self.conn, &segment.uri).await?;
        }
        Ok(())
    }

    async fn list_segments(&self) -> VitalSqlResult<Vec<Segment>> {
        let existing = self.existing_tables(&self.conn).await?;
        Ok(segments::catalog_list(&self.conn)
            .await?
            .into_iter()
            .filter(|entry| existing.contains(&entry.table))
            .map(|entry| entry.segment)
            .collect())
    }

    async fn segment_size(&self, segment: &Segment) -> VitalSqlResult<usize> {
        let table = self.require_segment(&self.conn, segment).await?;
        operations::segment_size(&self.conn, &table).await
    }
}

#[async_trait]
impl ObjectApi for VitalSqlStore {
    async fn save(
        &self,
        transaction: Option<&str>,
        target: &Segment,
        objects: Vec<GraphObject>,
        pool: &[Segment],
    ) -> VitalSqlResult<Vec<GraphObject>> {
        if objects.is_empty() {
            return Ok(objects);
        }
        match transaction {
            Some(id) => {
                let shared = self.transactions.get(id).await?;
                self.save_on(shared.as_ref(), target, &objects, pool).await?;
            }
            None => {
                let tx = self.conn.begin().await?;
                self.save_on(&tx, target, &objects, pool).await?;
                tx.commit().await?;
            }
        }
        Ok(objects)
    }

    async fn get(&self, pool: &[Segment], uri: &str) -> VitalSqlResult<Option<GraphObject>> {
        Ok(self
            .get_batch(pool, &[uri.to_string()])
            .await?
            .into_iter()
            .next())
    }

    async fn get_batch(&self, pool: &[Segment], uris: &[String]) -> VitalSqlResult<Vec<GraphObject>> {
        let mut remaining: Vec<String> = uris.to_vec();
        let mut found = Vec::new();
        for (_, table) in self.pool_tables(&self.conn, pool).await? {
            if remaining.is_empty() {
                break;
            }
            let fetched = operations::fetch_rows(&self.conn, &table, &remaining, true).await?;
            for decoded in rows::decode_batch(fetched, &self.registry, &self.settings.read)? {
                remaining.retain(|uri| uri != &decoded.object.uri);
                found.push(decoded.object);
            }
        }
        found.sort_by_key(|object| {
            uris.iter()
                .position(|uri| uri == &object.uri)
                .unwrap_or(usize::MAX)
        });
        Ok(found)
    }

    async fn delete(
        &self,
        transaction: Option<&str>,
        pool: &[Segment],
        uri: &str,
    ) -> VitalSqlResult<usize> {
        self.delete_batch(transaction, pool, &[uri.to_string()]).await
    }

    async fn delete_batch(
        &self,
        transaction: Option<&str>,
        pool: &[Segment],
        uris: &[String],
    ) -> VitalSqlResult<usize> {
        if uris.is_empty() {
            return Ok(0);
        }
        match transaction {
            Some(id) => {
                let shared = self.transactions.get(id).await?;
                self.delete_on(shared.as_ref(), pool, uris).await
            }
            None => {
                let tx = self.conn.begin().await?;
                let deleted = self.delete_on(&tx, pool, uris).await?;
                tx.commit().await?;
                Ok(deleted)
            }
        }
    }

    async fn delete_all(&self, segment: &Segment) -> VitalSqlResult<()> {
        let table = self.require_segment(&self.conn, segment).await?;
        operations::delete_all(&self.conn, &table).await?;
        Ok(())
    }

    async fn contains_uris(&self, segment: &Segment, uris: &[String]) -> VitalSqlResult<HashSet<String>> {
        let table = self.require_segment(&self.conn, segment).await?;
        operations::contains_uris(&self.conn, &table, uris).await
    }

    async fn scan(
        &self,
        segment: &Segment,
        page_size: usize,
        handler: &mut ScanHandler<'_>,
    ) -> VitalSqlResult<usize> {
        if page_size == 0 {
            return Err(VitalSqlError::query("scan page size must be positive"));
        }
        let table = self.require_segment(&self.conn, segment).await?;
        let mut decoder = StreamDecoder::new(&self.registry, self.settings.read);
        let mut offset = 0;
        let mut delivered = 0;
        loop {
            let uris = operations::page_uris(&self.conn, &table, offset, page_size).await?;
            if uris.is_empty() {
                break;
            }
            offset += uris.len();
            let mut page = Vec::with_capacity(uris.len());
            for row in operations::fetch_rows(&self.conn, &table, &uris, true).await? {
                if let Some(decoded) = decoder.push(row)? {
                    page.push(decoded.object);
                }
            }
            if !page.is_empty() {
                delivered += page.len();
                handler(page)?;
            }
        }
        if let Some(decoded) = decoder.finish()? {
            delivered += 1;
            handler(vec![decoded.object])?;
        }
        Ok(delivered)
    }

    async fn export(&self, segment: &Segment, offset: usize, limit: usize) -> VitalSqlResult<ExportPage> {
        let table = self.require_segment(&self.conn, segment).await?;
        let total = operations::segment_size(&self.conn, &table).await?;
        let uris = operations::page_uris(&self.conn, &table, offset, limit).await?;
        let fetched = operations::fetch_rows(&self.conn, &table, &uris, true).await?;
        let objects = rows::decode_batch(fetched, &self.registry, &self.settings.read)?
            .into_iter()
            .map(|decoded| decoded.object)
            .collect();
        Ok(ExportPage {
            objects,
            total,
            offset,
            limit,
        })
    }
}

#[async_trait]
impl QueryApi for VitalSqlStore {
    async fn select(&self, query: &SelectQuery) -> VitalSqlResult<ResultList> {
        let existing = self.existing_tables(&self.conn).await?;
        for segment in &query.segments {
            if !existing.contains(&self.table(segment)) {
                return Err(VitalSqlError::not_found(format!(
                    "segment not found, uri: {} id: {}",
                    segment.uri, segment.id
                )));
            }
        }
        QueryExecutor::new(
            &self.conn,
            &self.registry,
            self.dialect.as_ref(),
            &self.settings,
        )
        .select(query)
        .await
    }
}

#[async_trait]
impl TransactionApi for VitalSqlStore {
    async fn create_transaction(&self) -> VitalSqlResult<String> {
        self.transactions.create(&self.conn).await
    }

    async fn commit_transaction(&self, id: &str) -> VitalSqlResult<()> {
        self.transactions.commit(id).await
    }

    async fn rollback_transaction(&self, id: &str) -> VitalSqlResult<()> {
        self.transactions.rollback(id).await
    }

    async fn active_transactions(&self) -> usize {
        self.transactions.len().await
    }
}

fn build_connection_url(config: &VitalSqlConfig, base_dir: &Path) -> VitalSqlResult<String> {
    match &config.database {
        DatabaseConfig::Sqlite { .. } => {
            let path = config.sqlite_path(base_dir)?;
            Ok(format!("sqlite://{}?mode=rwc", path.display()))
        }
        DatabaseConfig::Postgres { url }
        | DatabaseConfig::Mysql { url }
        | DatabaseConfig::Redshift { url } => Ok(url.clone()),
    }
}
