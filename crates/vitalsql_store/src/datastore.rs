use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{Registry, VitalSqlConfig, VitalSqlResult, VitalSqlStore};

const DEFAULT_DB_NAME: &str = "vitalsql.sqlite";

pub fn load_or_init_config(base: &Path) -> VitalSqlResult<VitalSqlConfig> {
    let default_sqlite = base.join(DEFAULT_DB_NAME);
    VitalSqlConfig::load_or_init(base, &default_sqlite)
}

pub async fn open_store(base: &Path, registry: Arc<Registry>) -> VitalSqlResult<VitalSqlStore> {
    let config = load_or_init_config(base)?;
    VitalSqlStore::connect(&config, base, registry).await
}

pub fn default_sqlite_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_DB_NAME)
}
