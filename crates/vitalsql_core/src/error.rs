use thiserror::Error;

#[derive(Debug, Error)]
pub enum VitalSqlError {
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error("query validation error: {message}")]
    QueryValidation { message: String },
    #[error("version conflict: {message}")]
    VersionConflict { message: String },
    #[error("data integrity error: {message}")]
    DataIntegrity { message: String },
    #[error("capacity exceeded: {message} (limit {limit})")]
    Capacity { message: String, limit: usize },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl VitalSqlError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryValidation {
            message: message.into(),
        }
    }

    pub fn version_conflict(message: impl Into<String>) -> Self {
        Self::VersionConflict {
            message: message.into(),
        }
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity {
            message: message.into(),
        }
    }

    pub fn capacity(message: impl Into<String>, limit: usize) -> Self {
        Self::Capacity {
            message: message.into(),
            limit,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

pub type VitalSqlResult<T> = Result<T, VitalSqlError>;

impl From<sea_orm::DbErr> for VitalSqlError {
    fn from(value: sea_orm::DbErr) -> Self {
        VitalSqlError::storage(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::VitalSqlError;

    #[test]
    fn helper_constructors_set_variants() {
        let err = VitalSqlError::configuration("pool");
        assert!(matches!(err, VitalSqlError::Configuration { .. }));
        let err = VitalSqlError::query("bad comparator");
        assert!(matches!(err, VitalSqlError::QueryValidation { .. }));
        let err = VitalSqlError::version_conflict("1.0.0 != 2.0.0");
        assert!(matches!(err, VitalSqlError::VersionConflict { .. }));
        let err = VitalSqlError::integrity("out of order");
        assert!(matches!(err, VitalSqlError::DataIntegrity { .. }));
        let err = VitalSqlError::not_found("missing");
        assert!(matches!(err, VitalSqlError::NotFound { .. }));
        let err = VitalSqlError::conflict("dup");
        assert!(matches!(err, VitalSqlError::Conflict { .. }));
        let err = VitalSqlError::storage("disk");
        assert!(matches!(err, VitalSqlError::Storage { .. }));
    }

    #[test]
    fn capacity_error_carries_limit() {
        let err = VitalSqlError::capacity("too many active transactions", 8);
        match err {
            VitalSqlError::Capacity { limit, .. } => assert_eq!(limit, 8),
            other => panic!("unexpected error: {other}"),
        }
    }
}
