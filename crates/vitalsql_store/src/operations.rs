use std::collections::{HashMap, HashSet};

use sea_orm::{ConnectionTrait, Iden};
use sea_orm::sea_query::{Alias, Expr, ExprTrait, Func, Order, Query, SelectStatement};

use crate::db::{SegmentColumn, exec, query_all, query_one};
use crate::rows::EavRow;
use vitalsql_core::{VitalSqlError, VitalSqlResult};

/// Rows per multi-row insert statement.
pub const INSERT_BATCH: usize = 100;
/// URIs per `IN (...)` list when fetching rows or values.
pub const PAGE_SIZE: usize = 1000;

fn table_ref(table: &str) -> Alias {
    Alias::new(table)
}

pub async fn insert_rows<C: ConnectionTrait>(conn: &C, table: &str, rows: &[EavRow]) -> VitalSqlResult<()> {
    for chunk in rows.chunks(INSERT_BATCH) {
        let mut insert = Query::insert();
        insert.into_table(table_ref(table)).columns(SegmentColumn::ALL);
        for row in chunk {
            insert
                .values(row.insert_values().into_iter().map(Expr::from))
                .map_err(|err| VitalSqlError::storage(err.to_string()))?;
        }
        exec(conn, &insert).await?;
    }
    Ok(())
}

/// Deletes every row of the given objects; returns the number of rows removed.
pub async fn delete_uris<C: ConnectionTrait>(conn: &C, table: &str, uris: &[String]) -> VitalSqlResult<u64> {
    let mut removed = 0;
    for chunk in uris.chunks(PAGE_SIZE) {
        let delete = Query::delete()
            .from_table(table_ref(table))
            .and_where(Expr::col(SegmentColumn::Uri).is_in(chunk.iter().cloned()))
            .to_owned();
        removed += exec(conn, &delete).await?;
    }
    Ok(removed)
}

pub async fn delete_all<C: ConnectionTrait>(conn: &C, table: &str) -> VitalSqlResult<u64> {
    exec(conn, &Query::delete().from_table(table_ref(table)).to_owned()).await
}

fn rows_select(table: &str, with_full_text: bool) -> SelectStatement {
    let mut select = Query::select();
    select.from(table_ref(table));
    for column in SegmentColumn::ALL {
        if with_full_text || column != SegmentColumn::ValueFullText {
            select.column(column);
        }
    }
    select
}

/// All rows of the given objects, ordered by URI.
pub async fn fetch_rows<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    uris: &[String],
    with_full_text: bool,
) -> VitalSqlResult<Vec<EavRow>> {
    let mut rows = Vec::new();
    for chunk in uris.chunks(PAGE_SIZE) {
        let select = rows_select(table, with_full_text)
            .and_where(Expr::col(SegmentColumn::Uri).is_in(chunk.iter().cloned()))
            .order_by(SegmentColumn::Uri, Order::Asc)
            .to_owned();
        for row in query_all(conn, &select).await? {
            rows.push(EavRow::from_query_result(&row, with_full_text)?);
        }
    }
    rows.sort_by(|left, right| left.uri.cmp(&right.uri));
    Ok(rows)
}

/// Rows of the named properties for the given objects.
pub async fn fetch_property_rows<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    names: &[String],
    uris: &[String],
) -> VitalSqlResult<Vec<EavRow>> {
    let mut rows = Vec::new();
    for chunk in uris.chunks(PAGE_SIZE) {
        let select = rows_select(table, true)
            .and_where(Expr::col(SegmentColumn::Name).is_in(names.iter().cloned()))
            .and_where(Expr::col(SegmentColumn::Uri).is_in(chunk.iter().cloned()))
            .to_owned();
        for row in query_all(conn, &select).await? {
            rows.push(EavRow::from_query_result(&row, true)?);
        }
    }
    Ok(rows)
}

/// Full-text values of overflowed rows keyed by (uri, stored property name).
pub async fn fetch_full_texts<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    uris: &[String],
) -> VitalSqlResult<HashMap<(String, String), Vec<String>>> {
    let mut texts: HashMap<(String, String), Vec<String>> = HashMap::new();
    for chunk in uris.chunks(PAGE_SIZE) {
        let select = Query::select()
            .columns([
                SegmentColumn::Uri,
                SegmentColumn::Name,
                SegmentColumn::ValueFullText,
            ])
            .from(table_ref(table))
            .and_where(Expr::col(SegmentColumn::Uri).is_in(chunk.iter().cloned()))
            .and_where(Expr::col(SegmentColumn::ValueFullText).is_not_null())
            .to_owned();
        for row in query_all(conn, &select).await? {
            let uri: String = row.try_get("", &SegmentColumn::Uri.to_string())?;
            let name: String = row.try_get("", &SegmentColumn::Name.to_string())?;
            let text: String = row.try_get("", &SegmentColumn::ValueFullText.to_string())?;
            texts.entry((uri, name)).or_default().push(text);
        }
    }
    Ok(texts)
}

pub async fn contains_uris<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    uris: &[String],
) -> VitalSqlResult<HashSet<String>> {
    let mut found = HashSet::new();
    for chunk in uris.chunks(PAGE_SIZE) {
        let select = Query::select()
            .distinct()
            .column(SegmentColumn::Uri)
            .from(table_ref(table))
            .and_where(Expr::col(SegmentColumn::Uri).is_in(chunk.iter().cloned()))
            .to_owned();
        found.extend(select_uris(conn, &select).await?);
    }
    Ok(found)
}

pub async fn segment_size<C: ConnectionTrait>(conn: &C, table: &str) -> VitalSqlResult<usize> {
    let select = Query::select()
        .expr_as(
            Func::count_distinct(Expr::col(SegmentColumn::Uri)),
            Alias::new("total"),
        )
        .from(table_ref(table))
        .to_owned();
    let total = match query_one(conn, &select).await? {
        Some(row) => row.try_get::<i64>("", "total")?,
        None => 0,
    };
    Ok(usize::try_from(total).unwrap_or_default())
}

/// A page of distinct object URIs in ascending order.
pub async fn page_uris<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    offset: usize,
    limit: usize,
) -> VitalSqlResult<Vec<String>> {
    let select = Query::select()
        .distinct()
        .column(SegmentColumn::Uri)
        .from(table_ref(table))
        .order_by(SegmentColumn::Uri, Order::Asc)
        .limit(limit as u64)
        .offset(offset as u64)
        .to_owned();
    select_uris(conn, &select).await
}

/// Every distinct object URI of a segment in ascending order.
pub async fn all_uris<C: ConnectionTrait>(conn: &C, table: &str) -> VitalSqlResult<Vec<String>> {
    let select = Query::select()
        .distinct()
        .column(SegmentColumn::Uri)
        .from(table_ref(table))
        .order_by(SegmentColumn::Uri, Order::Asc)
        .to_owned();
    select_uris(conn, &select).await
}

/// Runs any statement whose first selected column is `uri`.
pub async fn select_uris<C: ConnectionTrait>(conn: &C, select: &SelectStatement) -> VitalSqlResult<Vec<String>> {
    let rows = query_all(conn, select).await?;
    let mut uris = Vec::with_capacity(rows.len());
    for row in rows {
        uris.push(row.try_get::<String>("", &SegmentColumn::Uri.to_string())?);
    }
    Ok(uris)
}

/// Object URIs with their timestamps, for timestamp-ordered results.
pub async fn uris_by_timestamp<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    uris: &[String],
) -> VitalSqlResult<Vec<(String, Option<i64>)>> {
    let mut out = Vec::new();
    for chunk in uris.chunks(PAGE_SIZE) {
        let select = Query::select()
            .distinct()
            .columns([SegmentColumn::Uri, SegmentColumn::Tstamp])
            .from(table_ref(table))
            .and_where(Expr::col(SegmentColumn::Uri).is_in(chunk.iter().cloned()))
            .to_owned();
        for row in query_all(conn, &select).await? {
            out.push((
                row.try_get::<String>("", &SegmentColumn::Uri.to_string())?,
                row.try_get::<Option<i64>>("", &SegmentColumn::Tstamp.to_string())?,
            ));
        }
    }
    Ok(out)
}
