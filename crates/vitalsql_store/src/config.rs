use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use vitalsql_core::{VitalSqlError, VitalSqlResult};

const DEFAULT_CONFIG_NAME: &str = "vitalsql.json";
const DEFAULT_TABLES_PREFIX: &str = "vitalsql_";
const DEFAULT_POOL_MAX: u32 = 10;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
    Mysql { url: String },
    Redshift { url: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VersionEnforcement {
    #[default]
    Strict,
    Tolerant,
    Lenient,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One statement per leaf criterion, combined with in-memory set algebra.
    #[default]
    SetAlgebra,
    /// One composed statement per segment using nested `IN` subqueries.
    SingleStatement,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryConfig {
    pub probing: Option<bool>,
    pub fold_types: Option<bool>,
    pub execution_mode: Option<ExecutionMode>,
    pub ignore_broken_data: Option<bool>,
}

impl QueryConfig {
    pub fn with_defaults() -> Self {
        Self {
            probing: Some(true),
            fold_types: Some(true),
            execution_mode: Some(ExecutionMode::SetAlgebra),
            ignore_broken_data: Some(false),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VitalSqlConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
    pub tables_prefix: Option<String>,
    pub version_enforcement: Option<VersionEnforcement>,
    pub external_properties: Option<bool>,
    pub query: Option<QueryConfig>,
}

impl VitalSqlConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
            tables_prefix: Some(DEFAULT_TABLES_PREFIX.to_string()),
            version_enforcement: Some(VersionEnforcement::Strict),
            external_properties: Some(false),
            query: Some(QueryConfig::with_defaults()),
        }
    }

    pub fn load_or_init(base_dir: &Path, default_sqlite_path: &Path) -> VitalSqlResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| VitalSqlError::configuration(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| VitalSqlError::configuration(format!("read config: {err}")))?;
            let config: VitalSqlConfig = serde_json::from_str(&raw)
                .map_err(|err| VitalSqlError::configuration(err.to_string()))?;
            config.validate()?;
            return Ok(config);
        }
        let default = VitalSqlConfig::default_sqlite(default_sqlite_path.to_string_lossy());
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| VitalSqlError::configuration(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| VitalSqlError::configuration(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn validate(&self) -> VitalSqlResult<()> {
        let prefix = self.tables_prefix();
        if prefix.is_empty()
            || !prefix
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(VitalSqlError::configuration(format!(
                "tables prefix must be a non-empty identifier: {prefix:?}"
            )));
        }
        if let Some(pool) = &self.pool {
            if pool.max_connections == Some(0) {
                return Err(VitalSqlError::configuration(
                    "pool max_connections must be positive",
                ));
            }
            if pool.max_connections.is_some() && self.max_active_transactions() == 0 {
                return Err(VitalSqlError::configuration(format!(
                    "pool max_connections {} leaves no room for transactions, use at least 2",
                    self.pool_max_connections()
                )));
            }
            if let (Some(min), Some(max)) = (pool.min_connections, pool.max_connections)
                && min > max
            {
                return Err(VitalSqlError::configuration(format!(
                    "pool min_connections {min} exceeds max_connections {max}"
                )));
            }
        }
        match &self.database {
            DatabaseConfig::Postgres { url }
            | DatabaseConfig::Mysql { url }
            | DatabaseConfig::Redshift { url }
                if url.trim().is_empty() =>
            {
                Err(VitalSqlError::configuration("database url must not be empty"))
            }
            _ => Ok(()),
        }
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> VitalSqlResult<PathBuf> {
        match &self.database {
            DatabaseConfig::Sqlite { path } => {
                let path = path.clone().unwrap_or_else(|| "vitalsql.sqlite".to_string());
                let candidate = PathBuf::from(path);
                if candidate.is_absolute() {
                    Ok(candidate)
                } else {
                    Ok(base_dir.join(candidate))
                }
            }
            _ => Err(VitalSqlError::configuration("config is not sqlite backend")),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.database {
            DatabaseConfig::Sqlite { .. } => "sqlite",
            DatabaseConfig::Postgres { .. } => "postgres",
            DatabaseConfig::Mysql { .. } => "mysql",
            DatabaseConfig::Redshift { .. } => "redshift",
        }
    }

    pub fn connection_url(&self) -> Option<&str> {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => None,
            DatabaseConfig::Postgres { url }
            | DatabaseConfig::Mysql { url }
            | DatabaseConfig::Redshift { url } => Some(url.as_str()),
        }
    }

    pub fn tables_prefix(&self) -> &str {
        self.tables_prefix
            .as_deref()
            .unwrap_or(DEFAULT_TABLES_PREFIX)
    }

    pub fn pool_max_connections(&self) -> u32 {
        self.pool
            .as_ref()
            .and_then(|pool| pool.max_connections)
            .unwrap_or(DEFAULT_POOL_MAX)
    }

    /// Live transactions may hold at most four fifths of the pool.
    pub fn max_active_transactions(&self) -> usize {
        (self.pool_max_connections() as usize * 4) / 5
    }

    pub fn version_enforcement(&self) -> VersionEnforcement {
        self.version_enforcement.unwrap_or_default()
    }

    pub fn external_properties(&self) -> bool {
        self.external_properties.unwrap_or(false)
    }

    pub fn query(&self) -> QueryConfig {
        self.query.clone().unwrap_or_else(QueryConfig::with_defaults)
    }
}
