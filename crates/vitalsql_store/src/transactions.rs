use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tokio::sync::Mutex;
use uuid::Uuid;

use vitalsql_core::{VitalSqlError, VitalSqlResult};

/// Live transactions keyed by opaque id, capped at a fixed ceiling.
pub struct TransactionRegistry {
    limit: usize,
    active: Mutex<HashMap<String, Arc<DatabaseTransaction>>>,
}

impl TransactionRegistry {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn len(&self) -> usize {
        self.active.lock().await.len()
    }

    pub async fn create(&self, conn: &DatabaseConnection) -> VitalSqlResult<String> {
        let mut active = self.active.lock().await;
        if active.len() >= self.limit {
            return Err(VitalSqlError::capacity(
                "the limit of active transactions has been exceeded",
                self.limit,
            ));
        }
        let transaction = conn.begin().await?;
        let mut id = Uuid::new_v4().simple().to_string();
        while active.contains_key(&id) {
            id = Uuid::new_v4().simple().to_string();
        }
        active.insert(id.clone(), Arc::new(transaction));
        log::debug!("transaction {id} started, {} active", active.len());
        Ok(id)
    }

    /// Shared handle for running statements inside a live transaction.
    pub async fn get(&self, id: &str) -> VitalSqlResult<Arc<DatabaseTransaction>> {
        self.active
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| VitalSqlError::not_found(format!("transaction {id} not found")))
    }

    async fn take(&self, id: &str) -> VitalSqlResult<DatabaseTransaction> {
        let mut active = self.active.lock().await;
        let shared = active
            .remove(id)
            .ok_or_else(|| VitalSqlError::not_found(format!("transaction {id} not found")))?;
        match Arc::try_unwrap(shared) {
            Ok(transaction) => Ok(transaction),
            Err(shared) => {
                active.insert(id.to_string(), shared);
                Err(VitalSqlError::conflict(format!(
                    "transaction {id} is still in use"
                )))
            }
        }
    }

    pub async fn commit(&self, id: &str) -> VitalSqlResult<()> {
        self.take(id).await?.commit().await?;
        log::debug!("transaction {id} committed");
        Ok(())
    }

    pub async fn rollback(&self, id: &str) -> VitalSqlResult<()> {
        self.take(id).await?.rollback().await?;
        log::debug!("transaction {id} rolled back");
        Ok(())
    }

    /// Rolls back every live transaction; individual failures are logged and skipped.
    pub async fn close(&self) {
        let drained: Vec<(String, Arc<DatabaseTransaction>)> =
            self.active.lock().await.drain().collect();
        for (id, shared) in drained {
            match Arc::try_unwrap(shared) {
                Ok(transaction) => {
                    if let Err(err) = transaction.rollback().await {
                        log::warn!("rollback of transaction {id} failed: {err}");
                    }
                }
                Err(_) => log::warn!("transaction {id} still in use at shutdown"),
            }
        }
    }
}
