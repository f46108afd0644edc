#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Point store for facility and population points.
//!
//! [`PointStore`] is the repository the ingestion pipeline writes to and the
//! risk engine reads from. Writes go through a [`StoreTransaction`] so that
//! a replace-by-type (delete, then batched inserts) is observed by readers
//! either entirely before or entirely after it happens.
//!
//! Two backends are provided: [`memory::MemoryPointStore`] (always
//! available) and `duckdb_store::DuckDbPointStore` (behind the `duckdb`
//! feature).

#[cfg(feature = "duckdb")]
pub mod duckdb_store;
pub mod memory;
pub mod paths;

use std::sync::Arc;

use async_trait::async_trait;
use risk_map_point_models::{PopulationPoint, RiskPoint, RiskType};

pub use memory::MemoryPointStore;

/// Errors that can occur during point store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `DuckDB` error.
    #[cfg(feature = "duckdb")]
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// A blocking store task panicked or was cancelled.
    #[cfg(feature = "duckdb")]
    #[error("Store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A transaction's connection was lost when a store task failed.
    #[cfg(feature = "duckdb")]
    #[error("Transaction connection lost after a failed store task")]
    TransactionLost,

    /// I/O error (creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Read access plus transactional write access to the stored points.
///
/// The non-transactional write methods each run in their own single-step
/// transaction.
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Returns every facility point.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend read fails.
    async fn find_all(&self) -> Result<Vec<RiskPoint>, StoreError>;

    /// Returns every facility point of `risk_type`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend read fails.
    async fn find_by_type(&self, risk_type: RiskType) -> Result<Vec<RiskPoint>, StoreError>;

    /// Returns every population point.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend read fails.
    async fn find_all_population(&self) -> Result<Vec<PopulationPoint>, StoreError>;

    /// Opens a write transaction. Writers are serialized: a second `begin`
    /// waits until the open transaction is committed or dropped. Readers are
    /// not blocked and see the last committed state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot start a transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    /// Deletes every facility point of `risk_type`, returning how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete fails.
    async fn delete_all_by_type(&self, risk_type: RiskType) -> Result<usize, StoreError> {
        let mut tx = self.begin().await?;
        let deleted = tx.delete_all_by_type(risk_type).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    /// Appends facility points.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    async fn save_all(&self, points: &[RiskPoint]) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        tx.save_all(points).await?;
        tx.commit().await
    }

    /// Deletes every population point, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete fails.
    async fn delete_all_population(&self) -> Result<usize, StoreError> {
        let mut tx = self.begin().await?;
        let deleted = tx.delete_all_population().await?;
        tx.commit().await?;
        Ok(deleted)
    }

    /// Appends population points.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    async fn save_all_population(&self, points: &[PopulationPoint]) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        tx.save_all_population(points).await?;
        tx.commit().await
    }
}

/// Opens the store this process should use.
///
/// With the `duckdb` feature the store is persisted at the path in
/// `RISK_MAP_DB`, or [`paths::point_store_db_path`] when unset. Without it
/// an empty in-memory store is returned.
///
/// # Errors
///
/// Returns [`StoreError`] if the `DuckDB` file cannot be opened.
pub fn open_from_env() -> Result<Arc<dyn PointStore>, StoreError> {
    #[cfg(feature = "duckdb")]
    {
        let path = std::env::var("RISK_MAP_DB")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map_or_else(paths::point_store_db_path, std::path::PathBuf::from);
        log::info!("Opening DuckDB point store at {}", path.display());
        Ok(Arc::new(duckdb_store::DuckDbPointStore::open(&path)?))
    }

    #[cfg(not(feature = "duckdb"))]
    {
        log::info!("Using in-memory point store; imported points are not persisted");
        Ok(Arc::new(MemoryPointStore::new()))
    }
}

/// A pending set of writes. Dropping it without [`commit`] discards every
/// write made through it.
///
/// [`commit`]: StoreTransaction::commit
#[async_trait]
pub trait StoreTransaction: Send {
    /// Deletes every facility point of `risk_type`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete fails.
    async fn delete_all_by_type(&mut self, risk_type: RiskType) -> Result<usize, StoreError>;

    /// Appends facility points.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    async fn save_all(&mut self, points: &[RiskPoint]) -> Result<(), StoreError>;

    /// Deletes every population point.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete fails.
    async fn delete_all_population(&mut self) -> Result<usize, StoreError>;

    /// Appends population points.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    async fn save_all_population(&mut self, points: &[PopulationPoint])
    -> Result<(), StoreError>;

    /// Makes every write visible to readers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the commit fails, in which case nothing
    /// was written.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
