use sea_orm::sea_query;
use sea_orm::sea_query::{
    MysqlQueryBuilder, PostgresQueryBuilder, QueryStatementWriter, SqliteQueryBuilder,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, QueryResult, Statement, StatementBuilder};
use sea_orm_migration::prelude::Iden;

use vitalsql_core::{ValueKind, VitalSqlResult};

/// Columns of a segment's EAV table. The table itself is named per segment.
#[derive(Iden, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentColumn {
    Uri,
    Name,
    Vitaltype,
    External,
    Tstamp,
    Channeluri,
    ValueBoolean,
    ValueBooleanMultivalue,
    ValueDate,
    ValueDateMultivalue,
    ValueDouble,
    ValueDoubleMultivalue,
    ValueFloat,
    ValueFloatMultivalue,
    ValueGeolocation,
    ValueGeolocationMultivalue,
    ValueInteger,
    ValueIntegerMultivalue,
    ValueLong,
    ValueLongMultivalue,
    ValueOther,
    ValueOtherMultivalue,
    ValueString,
    ValueStringMultivalue,
    ValueTruth,
    ValueTruthMultivalue,
    ValueFullText,
    ValueUri,
    ValueUriMultivalue,
}

impl SegmentColumn {
    /// Wire order of the EAV table.
    pub const ALL: [SegmentColumn; 29] = [
        SegmentColumn::Uri,
        SegmentColumn::Name,
        SegmentColumn::Vitaltype,
        SegmentColumn::External,
        SegmentColumn::Tstamp,
        SegmentColumn::Channeluri,
        SegmentColumn::ValueBoolean,
        SegmentColumn::ValueBooleanMultivalue,
        SegmentColumn::ValueDate,
        SegmentColumn::ValueDateMultivalue,
        SegmentColumn::ValueDouble,
        SegmentColumn::ValueDoubleMultivalue,
        SegmentColumn::ValueFloat,
        SegmentColumn::ValueFloatMultivalue,
        SegmentColumn::ValueGeolocation,
        SegmentColumn::ValueGeolocationMultivalue,
        SegmentColumn::ValueInteger,
        SegmentColumn::ValueIntegerMultivalue,
        SegmentColumn::ValueLong,
        SegmentColumn::ValueLongMultivalue,
        SegmentColumn::ValueOther,
        SegmentColumn::ValueOtherMultivalue,
        SegmentColumn::ValueString,
        SegmentColumn::ValueStringMultivalue,
        SegmentColumn::ValueTruth,
        SegmentColumn::ValueTruthMultivalue,
        SegmentColumn::ValueFullText,
        SegmentColumn::ValueUri,
        SegmentColumn::ValueUriMultivalue,
    ];

    pub fn value_column(kind: ValueKind, multi: bool) -> SegmentColumn {
        let (single, multivalue) = match kind {
            ValueKind::Boolean => (
                SegmentColumn::ValueBoolean,
                SegmentColumn::ValueBooleanMultivalue,
            ),
            ValueKind::Date => (SegmentColumn::ValueDate, SegmentColumn::ValueDateMultivalue),
            ValueKind::Double => (
                SegmentColumn::ValueDouble,
                SegmentColumn::ValueDoubleMultivalue,
            ),
            ValueKind::Float => (
                SegmentColumn::ValueFloat,
                SegmentColumn::ValueFloatMultivalue,
            ),
            ValueKind::GeoLocation => (
                SegmentColumn::ValueGeolocation,
                SegmentColumn::ValueGeolocationMultivalue,
            ),
            ValueKind::Integer => (
                SegmentColumn::ValueInteger,
                SegmentColumn::ValueIntegerMultivalue,
            ),
            ValueKind::Long => (SegmentColumn::ValueLong, SegmentColumn::ValueLongMultivalue),
            ValueKind::Other => (
                SegmentColumn::ValueOther,
                SegmentColumn::ValueOtherMultivalue,
            ),
            ValueKind::String => (
                SegmentColumn::ValueString,
                SegmentColumn::ValueStringMultivalue,
            ),
            ValueKind::Truth => (
                SegmentColumn::ValueTruth,
                SegmentColumn::ValueTruthMultivalue,
            ),
            ValueKind::Uri => (SegmentColumn::ValueUri, SegmentColumn::ValueUriMultivalue),
        };
        if multi { multivalue } else { single }
    }
}

#[derive(Iden, Clone, Copy)]
pub enum VitalsqlSegments {
    Table,
    SegmentId,
    SegmentUri,
    TableName,
    CreatedAt,
}

pub(crate) fn build_stmt<S: QueryStatementWriter>(
    backend: DatabaseBackend,
    stmt: &S,
) -> (String, sea_orm::sea_query::Values) {
    match backend {
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        DatabaseBackend::MySql => stmt.build(MysqlQueryBuilder),
        _ => stmt.build(SqliteQueryBuilder),
    }
}

/// Inlined SQL text of a statement, for query statistics.
pub(crate) fn render<S: QueryStatementWriter>(backend: DatabaseBackend, stmt: &S) -> String {
    match backend {
        DatabaseBackend::Postgres => stmt.to_string(PostgresQueryBuilder),
        DatabaseBackend::MySql => stmt.to_string(MysqlQueryBuilder),
        _ => stmt.to_string(SqliteQueryBuilder),
    }
}

pub(crate) async fn exec<C, S>(conn: &C, stmt: &S) -> VitalSqlResult<u64>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let result = conn
        .execute_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn exec_schema<C, S>(conn: &C, stmt: &S) -> VitalSqlResult<()>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    let backend = conn.get_database_backend();
    conn.execute_raw(backend.build(stmt)).await?;
    Ok(())
}

pub(crate) async fn query_all<C, S>(conn: &C, stmt: &S) -> VitalSqlResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let rows = conn
        .query_all_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(rows)
}

pub(crate) async fn query_one<C, S>(conn: &C, stmt: &S) -> VitalSqlResult<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let row = conn
        .query_one_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_match_wire_format() {
        assert_eq!(SegmentColumn::ValueBooleanMultivalue.to_string(), "value_boolean_multivalue");
        assert_eq!(SegmentColumn::ValueGeolocation.to_string(), "value_geolocation");
        assert_eq!(SegmentColumn::ValueFullText.to_string(), "value_full_text");
        assert_eq!(SegmentColumn::Channeluri.to_string(), "channeluri");
        assert_eq!(VitalsqlSegments::Table.to_string(), "vitalsql_segments");
    }

    #[test]
    fn every_kind_has_distinct_columns() {
        for kind in ValueKind::ALL {
            assert_ne!(
                SegmentColumn::value_column(kind, false),
                SegmentColumn::value_column(kind, true)
            );
        }
    }
}
