use sea_orm::sea_query::Expr;

use crate::db::SegmentColumn;
use vitalsql_core::{VitalSqlError, VitalSqlResult};

/// Capabilities that differ between the supported SQL engines.
pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Statement returning one table name per row in its first column.
    fn show_tables(&self) -> &'static str;

    fn column_type(&self, column: SegmentColumn) -> &'static str;

    /// Expression yielding the 1-based position of `needle` in `haystack`, 0 when absent.
    fn locate(&self, needle: Expr, haystack: Expr) -> Expr;

    fn regexp(&self, needle: Expr, haystack: Expr) -> VitalSqlResult<Expr>;
}

pub fn dialect_for(name: &str) -> Box<dyn SqlDialect> {
    match name {
        "mysql" => Box::new(MySqlDialect),
        "postgres" => Box::new(PostgresDialect),
        "redshift" => Box::new(RedshiftDialect),
        _ => Box::new(SqliteDialect),
    }
}

fn is_text(column: SegmentColumn) -> bool {
    matches!(
        column,
        SegmentColumn::ValueOther
            | SegmentColumn::ValueOtherMultivalue
            | SegmentColumn::ValueString
            | SegmentColumn::ValueStringMultivalue
    )
}

fn generic_column_type(column: SegmentColumn) -> &'static str {
    match column {
        SegmentColumn::External
        | SegmentColumn::ValueBoolean
        | SegmentColumn::ValueBooleanMultivalue => "BOOLEAN",
        SegmentColumn::Tstamp
        | SegmentColumn::ValueDate
        | SegmentColumn::ValueDateMultivalue
        | SegmentColumn::ValueLong
        | SegmentColumn::ValueLongMultivalue => "BIGINT",
        SegmentColumn::ValueInteger | SegmentColumn::ValueIntegerMultivalue => "INTEGER",
        SegmentColumn::ValueTruth | SegmentColumn::ValueTruthMultivalue => "SMALLINT",
        _ => "VARCHAR(255)",
    }
}

pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn show_tables(&self) -> &'static str {
        "show tables"
    }

    fn column_type(&self, column: SegmentColumn) -> &'static str {
        match column {
            SegmentColumn::ValueDouble | SegmentColumn::ValueDoubleMultivalue => "DOUBLE",
            SegmentColumn::ValueFloat | SegmentColumn::ValueFloatMultivalue => "FLOAT",
            SegmentColumn::ValueTruth | SegmentColumn::ValueTruthMultivalue => "TINYINT",
            SegmentColumn::ValueFullText => "LONGTEXT",
            column if is_text(column) => "TEXT",
            column => generic_column_type(column),
        }
    }

    fn locate(&self, needle: Expr, haystack: Expr) -> Expr {
        Expr::cust_with_exprs("LOCATE(?, ?)", [needle, haystack])
    }

    fn regexp(&self, needle: Expr, haystack: Expr) -> VitalSqlResult<Expr> {
        Ok(Expr::cust_with_exprs("? REGEXP ?", [haystack, needle]))
    }
}

pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn show_tables(&self) -> &'static str {
        "SELECT tablename FROM pg_catalog.pg_tables WHERE schemaname != 'pg_catalog' AND schemaname != 'information_schema'"
    }

    fn column_type(&self, column: SegmentColumn) -> &'static str {
        match column {
            SegmentColumn::ValueDouble | SegmentColumn::ValueDoubleMultivalue => {
                "DOUBLE PRECISION"
            }
            SegmentColumn::ValueFloat | SegmentColumn::ValueFloatMultivalue => "REAL",
            SegmentColumn::ValueFullText => "TEXT",
            column if is_text(column) => "TEXT",
            column => generic_column_type(column),
        }
    }

    fn locate(&self, needle: Expr, haystack: Expr) -> Expr {
        Expr::cust_with_exprs("strpos(?, ?)", [haystack, needle])
    }

    fn regexp(&self, needle: Expr, haystack: Expr) -> VitalSqlResult<Expr> {
        Ok(Expr::cust_with_exprs("? ~ ?", [haystack, needle]))
    }
}

/// Postgres wire protocol with Redshift's bounded VARCHAR storage.
pub struct RedshiftDialect;

impl SqlDialect for RedshiftDialect {
    fn name(&self) -> &'static str {
        "redshift"
    }

    fn show_tables(&self) -> &'static str {
        PostgresDialect.show_tables()
    }

    fn column_type(&self, column: SegmentColumn) -> &'static str {
        match column {
            SegmentColumn::ValueDouble | SegmentColumn::ValueDoubleMultivalue => {
                "DOUBLE PRECISION"
            }
            SegmentColumn::ValueFloat | SegmentColumn::ValueFloatMultivalue => "REAL",
            SegmentColumn::ValueFullText => "VARCHAR(65535)",
            column if is_text(column) => "VARCHAR(65535)",
            column => generic_column_type(column),
        }
    }

    fn locate(&self, needle: Expr, haystack: Expr) -> Expr {
        PostgresDialect.locate(needle, haystack)
    }

    fn regexp(&self, needle: Expr, haystack: Expr) -> VitalSqlResult<Expr> {
        PostgresDialect.regexp(needle, haystack)
    }
}

pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn show_tables(&self) -> &'static str {
        "SELECT name FROM sqlite_master WHERE type = 'table'"
    }

    fn column_type(&self, column: SegmentColumn) -> &'static str {
        match column {
            SegmentColumn::ValueDouble
            | SegmentColumn::ValueDoubleMultivalue
            | SegmentColumn::ValueFloat
            | SegmentColumn::ValueFloatMultivalue => "REAL",
            SegmentColumn::ValueFullText => "TEXT",
            column if is_text(column) => "TEXT",
            column => generic_column_type(column),
        }
    }

    fn locate(&self, needle: Expr, haystack: Expr) -> Expr {
        Expr::cust_with_exprs("instr(?, ?)", [haystack, needle])
    }

    fn regexp(&self, _needle: Expr, _haystack: Expr) -> VitalSqlResult<Expr> {
        Err(VitalSqlError::query(
            "regular expression matching is not supported by the sqlite dialect",
        ))
    }
}
