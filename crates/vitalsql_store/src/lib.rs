pub mod codec;
pub mod compile;
pub mod config;
pub mod datastore;
mod db;
pub mod dialect;
pub mod executor;
pub mod migration;
pub mod normalize;
pub mod operations;
pub mod optimize;
pub mod rows;
pub mod segments;
pub mod store;
pub mod transactions;

pub use config::{DatabaseConfig, ExecutionMode, PoolConfig, QueryConfig, VersionEnforcement, VitalSqlConfig};
pub use datastore::{default_sqlite_path, load_or_init_config, open_store};
pub use db::SegmentColumn;
pub use dialect::SqlDialect;
pub use store::VitalSqlStore;
pub use vitalsql_core::*;
