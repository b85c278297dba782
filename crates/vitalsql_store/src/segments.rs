use std::time::{SystemTime, UNIX_EPOCH};

use sea_orm::sea_query::{Alias, ColumnDef, Expr, ExprTrait, Index, Order, Query, Table};
use sea_orm::{ConnectionTrait, Iden, Statement};

use crate::db::{SegmentColumn, VitalsqlSegments, exec, exec_schema, query_all, query_one};
use crate::dialect::SqlDialect;
use vitalsql_core::{Segment, VitalSqlError, VitalSqlResult};

const TABLE_HASH_LEN: usize = 32;

/// Physical table for a segment: the prefix plus a hash of the segment URI.
pub fn table_name(prefix: &str, segment_uri: &str) -> String {
    let hash = blake3::hash(segment_uri.as_bytes()).to_hex();
    format!("{prefix}{}", &hash.as_str()[..TABLE_HASH_LEN])
}

fn is_segment_table(prefix: &str, name: &str) -> bool {
    name.strip_prefix(prefix).is_some_and(|rest| {
        rest.len() == TABLE_HASH_LEN && rest.chars().all(|ch| ch.is_ascii_hexdigit())
    })
}

pub async fn list_table_names<C: ConnectionTrait>(
    conn: &C,
    dialect: &dyn SqlDialect,
    prefix: &str,
) -> VitalSqlResult<Vec<String>> {
    let backend = conn.get_database_backend();
    let rows = conn
        .query_all_raw(Statement::from_string(backend, dialect.show_tables()))
        .await?;
    let mut names = Vec::new();
    for row in rows {
        let name: String = row.try_get_by_index(0)?;
        if is_segment_table(prefix, &name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

pub async fn table_exists<C: ConnectionTrait>(
    conn: &C,
    dialect: &dyn SqlDialect,
    prefix: &str,
    table: &str,
) -> VitalSqlResult<bool> {
    Ok(list_table_names(conn, dialect, prefix)
        .await?
        .iter()
        .any(|name| name == table))
}

pub async fn create_table<C: ConnectionTrait>(
    conn: &C,
    dialect: &dyn SqlDialect,
    table: &str,
) -> VitalSqlResult<()> {
    let mut create = Table::create();
    create.table(Alias::new(table));
    for column in SegmentColumn::ALL {
        let mut def = ColumnDef::new(column);
        def.custom(Alias::new(dialect.column_type(column)));
        if matches!(
            column,
            SegmentColumn::Uri | SegmentColumn::Name | SegmentColumn::Vitaltype
        ) {
            def.not_null();
        }
        create.col(def);
    }
    exec_schema(conn, &create).await?;
    for (suffix, column) in [("uri", SegmentColumn::Uri), ("name", SegmentColumn::Name)] {
        let index = Index::create()
            .name(format!("{table}_{suffix}_idx"))
            .table(Alias::new(table))
            .col(column)
            .to_owned();
        exec_schema(conn, &index).await?;
    }
    log::debug!("created segment table {table}");
    Ok(())
}

pub async fn drop_table<C: ConnectionTrait>(conn: &C, table: &str) -> VitalSqlResult<()> {
    exec_schema(conn, &Table::drop().table(Alias::new(table)).to_owned()).await?;
    log::debug!("dropped segment table {table}");
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub segment: Segment,
    pub table: String,
}

pub async fn catalog_insert<C: ConnectionTrait>(
    conn: &C,
    segment: &Segment,
    table: &str,
) -> VitalSqlResult<()> {
    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default();
    let insert = Query::insert()
        .into_table(VitalsqlSegments::Table)
        .columns([
            VitalsqlSegments::SegmentId,
            VitalsqlSegments::SegmentUri,
            VitalsqlSegments::TableName,
            VitalsqlSegments::CreatedAt,
        ])
        .values([
            segment.id.clone().into(),
            segment.uri.clone().into(),
            table.into(),
            created_at.into(),
        ])
        .map_err(|err| VitalSqlError::storage(err.to_string()))?
        .to_owned();
    exec(conn, &insert).await?;
    Ok(())
}

pub async fn catalog_remove<C: ConnectionTrait>(conn: &C, segment_uri: &str) -> VitalSqlResult<()> {
    let delete = Query::delete()
        .from_table(VitalsqlSegments::Table)
        .and_where(Expr::col(VitalsqlSegments::SegmentUri).eq(segment_uri))
        .to_owned();
    exec(conn, &delete).await?;
    Ok(())
}

pub async fn catalog_find<C: ConnectionTrait>(
    conn: &C,
    segment_uri: &str,
) -> VitalSqlResult<Option<CatalogEntry>> {
    let select = Query::select()
        .columns([
            VitalsqlSegments::SegmentId,
            VitalsqlSegments::SegmentUri,
            VitalsqlSegments::TableName,
        ])
        .from(VitalsqlSegments::Table)
        .and_where(Expr::col(VitalsqlSegments::SegmentUri).eq(segment_uri))
        .to_owned();
    query_one(conn, &select)
        .await?
        .map(|row| catalog_entry(&row))
        .transpose()
}

pub async fn catalog_list<C: ConnectionTrait>(conn: &C) -> VitalSqlResult<Vec<CatalogEntry>> {
    let select = Query::select()
        .columns([
            VitalsqlSegments::SegmentId,
            VitalsqlSegments::SegmentUri,
            VitalsqlSegments::TableName,
        ])
        .from(VitalsqlSegments::Table)
        .order_by(VitalsqlSegments::SegmentId, Order::Asc)
        .to_owned();
    query_all(conn, &select)
        .await?
        .iter()
        .map(catalog_entry)
        .collect()
}

fn catalog_entry(row: &sea_orm::QueryResult) -> VitalSqlResult<CatalogEntry> {
    Ok(CatalogEntry {
        segment: Segment::new(
            row.try_get::<String>("", &VitalsqlSegments::SegmentId.to_string())?,
            row.try_get::<String>("", &VitalsqlSegments::SegmentUri.to_string())?,
        ),
        table: row.try_get("", &VitalsqlSegments::TableName.to_string())?,
    })
}
