//! In-memory point store.
//!
//! Both tables sit behind a single `tokio` [`RwLock`]. A transaction holds
//! the store's writer mutex for its whole lifetime and mutates a private
//! copy of the tables; commit swaps the copy in under the write lock.
//! Readers keep seeing the last committed tables while an import runs and
//! never see a half-replaced set.

use std::sync::Arc;

use async_trait::async_trait;
use risk_map_point_models::{PopulationPoint, RiskPoint, RiskType};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{PointStore, StoreError, StoreTransaction};

#[derive(Debug, Default, Clone)]
struct Tables {
    risk_points: Vec<RiskPoint>,
    population_points: Vec<PopulationPoint>,
}

/// Point store backed by process memory. Cloning shares the same tables.
#[derive(Debug, Default, Clone)]
pub struct MemoryPointStore {
    tables: Arc<RwLock<Tables>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryPointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PointStore for MemoryPointStore {
    async fn find_all(&self) -> Result<Vec<RiskPoint>, StoreError> {
        Ok(self.tables.read().await.risk_points.clone())
    }

    async fn find_by_type(&self, risk_type: RiskType) -> Result<Vec<RiskPoint>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .risk_points
            .iter()
            .filter(|p| p.risk_type == risk_type)
            .copied()
            .collect())
    }

    async fn find_all_population(&self) -> Result<Vec<PopulationPoint>, StoreError> {
        Ok(self.tables.read().await.population_points.clone())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let writer = Arc::clone(&self.writer).lock_owned().await;
        let working = self.tables.read().await.clone();
        Ok(Box::new(MemoryTransaction {
            tables: Arc::clone(&self.tables),
            _writer: writer,
            working,
        }))
    }
}

struct MemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    _writer: OwnedMutexGuard<()>,
    working: Tables,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn delete_all_by_type(&mut self, risk_type: RiskType) -> Result<usize, StoreError> {
        let before = self.working.risk_points.len();
        self.working
            .risk_points
            .retain(|p| p.risk_type != risk_type);
        Ok(before - self.working.risk_points.len())
    }

    async fn save_all(&mut self, points: &[RiskPoint]) -> Result<(), StoreError> {
        self.working.risk_points.extend_from_slice(points);
        Ok(())
    }

    async fn delete_all_population(&mut self) -> Result<usize, StoreError> {
        let deleted = self.working.population_points.len();
        self.working.population_points.clear();
        Ok(deleted)
    }

    async fn save_all_population(
        &mut self,
        points: &[PopulationPoint],
    ) -> Result<(), StoreError> {
        self.working.population_points.extend_from_slice(points);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self {
            tables,
            _writer,
            working,
        } = *self;
        *tables.write().await = working;
        Ok(())
    }
}
