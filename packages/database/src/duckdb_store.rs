//! Point store persisted in `DuckDB`.
//!
//! `duckdb::Connection` is `Send` but not `Sync`, so the reader connection
//! sits behind a `tokio` mutex. Every statement runs on the blocking pool.
//!
//! A transaction holds the store's writer mutex and its own clone of the
//! connection from `BEGIN TRANSACTION` until `COMMIT`, and issues
//! `ROLLBACK` if it is dropped first. Readers go through the shared
//! connection and see the last committed state while an import runs.

use std::path::Path;
use std::str::FromStr as _;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::Connection;
use risk_map_point_models::{PopulationPoint, RiskPoint, RiskType};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{PointStore, StoreError, StoreTransaction};

/// Point store backed by a `DuckDB` file (or an in-memory database).
pub struct DuckDbPointStore {
    conn: Arc<Mutex<Connection>>,
    writer: Arc<Mutex<()>>,
}

impl DuckDbPointStore {
    /// Opens (or creates) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the directory, connection, or schema cannot
    /// be created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a throwaway in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the connection or schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            writer: Arc::new(Mutex::new(())),
        })
    }
}

fn create_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS risk_points (
            latitude DOUBLE NOT NULL,
            longitude DOUBLE NOT NULL,
            weight DOUBLE NOT NULL,
            risk_type TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS population_points (
            district TEXT NOT NULL,
            dong TEXT NOT NULL,
            resident_count BIGINT NOT NULL,
            latitude DOUBLE NOT NULL,
            longitude DOUBLE NOT NULL
        );",
    )?;
    Ok(())
}

fn query_risk_points(
    conn: &Connection,
    risk_type: Option<RiskType>,
) -> Result<Vec<RiskPoint>, StoreError> {
    let mut stmt = if risk_type.is_some() {
        conn.prepare(
            "SELECT latitude, longitude, weight, risk_type FROM risk_points
             WHERE risk_type = ?",
        )?
    } else {
        conn.prepare("SELECT latitude, longitude, weight, risk_type FROM risk_points")?
    };
    let mut rows = match risk_type {
        Some(t) => stmt.query(duckdb::params![t.as_ref()])?,
        None => stmt.query([])?,
    };

    let mut points = Vec::new();
    while let Some(row) = rows.next()? {
        let type_name: String = row.get(3)?;
        let risk_type = RiskType::from_str(&type_name).map_err(|e| StoreError::Conversion {
            message: format!("unknown risk type '{type_name}': {e}"),
        })?;
        points.push(RiskPoint {
            latitude: row.get(0)?,
            longitude: row.get(1)?,
            weight: row.get(2)?,
            risk_type,
        });
    }

    Ok(points)
}

fn query_population(conn: &Connection) -> Result<Vec<PopulationPoint>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT district, dong, resident_count, latitude, longitude FROM population_points")?;
    let mut rows = stmt.query([])?;

    let mut points = Vec::new();
    while let Some(row) = rows.next()? {
        let count: i64 = row.get(2)?;
        points.push(PopulationPoint {
            district: row.get(0)?,
            dong: row.get(1)?,
            count: u32::try_from(count).map_err(|_| StoreError::Conversion {
                message: format!("population count out of range: {count}"),
            })?,
            latitude: row.get(3)?,
            longitude: row.get(4)?,
        });
    }

    Ok(points)
}

fn insert_risk_points(conn: &Connection, points: &[RiskPoint]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "INSERT INTO risk_points (latitude, longitude, weight, risk_type)
         VALUES (?, ?, ?, ?)",
    )?;
    for p in points {
        stmt.execute(duckdb::params![
            p.latitude,
            p.longitude,
            p.weight,
            p.risk_type.as_ref()
        ])?;
    }
    Ok(())
}

fn insert_population(conn: &Connection, points: &[PopulationPoint]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "INSERT INTO population_points (district, dong, resident_count, latitude, longitude)
         VALUES (?, ?, ?, ?, ?)",
    )?;
    for p in points {
        stmt.execute(duckdb::params![
            p.district,
            p.dong,
            i64::from(p.count),
            p.latitude,
            p.longitude
        ])?;
    }
    Ok(())
}

impl DuckDbPointStore {
    /// Runs `f` against the shared reader connection on the blocking pool.
    async fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn).lock_owned().await;
        tokio::task::spawn_blocking(move || f(&conn)).await?
    }
}

#[async_trait]
impl PointStore for DuckDbPointStore {
    async fn find_all(&self) -> Result<Vec<RiskPoint>, StoreError> {
        self.read(|conn| query_risk_points(conn, None)).await
    }

    async fn find_by_type(&self, risk_type: RiskType) -> Result<Vec<RiskPoint>, StoreError> {
        self.read(move |conn| query_risk_points(conn, Some(risk_type)))
            .await
    }

    async fn find_all_population(&self) -> Result<Vec<PopulationPoint>, StoreError> {
        self.read(query_population).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let writer = Arc::clone(&self.writer).lock_owned().await;
        let conn = self
            .read(|conn| {
                let tx_conn = conn.try_clone()?;
                tx_conn.execute_batch("BEGIN TRANSACTION")?;
                Ok(tx_conn)
            })
            .await?;

        Ok(Box::new(DuckDbTransaction {
            conn: Some(conn),
            _writer: writer,
            committed: false,
        }))
    }
}

/// Open `DuckDB` transaction. `conn` is `None` only while a statement is
/// running on the blocking pool, or after that task failed.
struct DuckDbTransaction {
    conn: Option<Connection>,
    _writer: OwnedMutexGuard<()>,
    committed: bool,
}

impl DuckDbTransaction {
    /// Moves the connection onto the blocking pool for `f` and takes it back.
    async fn run<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.take().ok_or(StoreError::TransactionLost)?;
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = f(&conn);
            (conn, result)
        })
        .await?;
        self.conn = Some(conn);
        result
    }
}

#[async_trait]
impl StoreTransaction for DuckDbTransaction {
    async fn delete_all_by_type(&mut self, risk_type: RiskType) -> Result<usize, StoreError> {
        self.run(move |conn| {
            Ok(conn.execute(
                "DELETE FROM risk_points WHERE risk_type = ?",
                duckdb::params![risk_type.as_ref()],
            )?)
        })
        .await
    }

    async fn save_all(&mut self, points: &[RiskPoint]) -> Result<(), StoreError> {
        let points = points.to_vec();
        self.run(move |conn| insert_risk_points(conn, &points)).await
    }

    async fn delete_all_population(&mut self) -> Result<usize, StoreError> {
        self.run(|conn| Ok(conn.execute("DELETE FROM population_points", [])?))
            .await
    }

    async fn save_all_population(
        &mut self,
        points: &[PopulationPoint],
    ) -> Result<(), StoreError> {
        let points = points.to_vec();
        self.run(move |conn| insert_population(conn, &points)).await
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.run(|conn| {
            conn.execute_batch("COMMIT")?;
            Ok(())
        })
        .await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for DuckDbTransaction {
    fn drop(&mut self) {
        if !self.committed
            && let Some(conn) = &self.conn
            && let Err(e) = conn.execute_batch("ROLLBACK")
        {
            log::warn!("Failed to roll back point store transaction: {e}");
        }
    }
}
