// src/store.rs

use std::time::Duration;

use sqlx::sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Sqlite, Transaction};

use crate::config::StoreConfig;
use crate::error::StorageError;

/// Bind values for runtime-assembled SQL.
#[derive(Debug, Clone)]
pub enum Arg {
    Text(String),
    Int(i64),
    Real(f64),
    Bool(bool),
    Null,
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_string())
    }
}

fn bind<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    args: &'q [Arg],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    let mut query = query;
    for arg in args {
        query = match arg {
            Arg::Text(v) => query.bind(v.as_str()),
            Arg::Int(v) => query.bind(*v),
            Arg::Real(v) => query.bind(*v),
            Arg::Bool(v) => query.bind(*v),
            Arg::Null => query.bind(Option::<i64>::None),
        };
    }
    query
}

/// The record store: a pooled SQLite handle with plain read/write calls
/// and labeled units of work.
///
/// All SQL goes through runtime binds, so the crate builds without a
/// database present; the schema is applied by `connect`.
#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    /// Open the pool and bring the schema up to date.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StorageError> {
        // A memory database lives and dies with its single connection.
        let memory = config.database_url.contains(":memory:");
        let max_connections = if memory { 1 } else { config.max_connections };

        let mut options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3));
        if memory {
            options = options.idle_timeout(None).max_lifetime(None);
        }

        let pool = options.connect(&config.database_url).await.map_err(|e| {
            tracing::error!("Failed to connect to {}: {:?}", config.database_url, e);
            StorageError::Store(e.to_string())
        })?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Failed to run migrations: {:?}", e);
            StorageError::Store(e.to_string())
        })?;

        Ok(Self { pool })
    }

    /// Run one read statement and return its rows.
    pub async fn read(&self, sql: &str, args: &[Arg]) -> Result<Vec<SqliteRow>, StorageError> {
        let rows = bind(sqlx::query(sql), args)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Read failed: {} ({:?})", sql, e);
                StorageError::Store(e.to_string())
            })?;
        Ok(rows)
    }

    /// Run one write statement and return the number of rows affected.
    pub async fn write(&self, sql: &str, args: &[Arg]) -> Result<u64, StorageError> {
        let done = bind(sqlx::query(sql), args)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Write failed: {} ({:?})", sql, e);
                StorageError::Store(e.to_string())
            })?;
        Ok(done.rows_affected())
    }

    /// Run one insert statement and return the id the store assigned.
    pub async fn insert(&self, sql: &str, args: &[Arg]) -> Result<i64, StorageError> {
        let done = bind(sqlx::query(sql), args)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Insert failed: {} ({:?})", sql, e);
                StorageError::Store(e.to_string())
            })?;
        Ok(done.last_insert_rowid())
    }

    /// Open a labeled unit of work. The label travels into logs and error
    /// values so a failed batch can be traced back to its operation.
    pub async fn begin(&self, label: &str) -> Result<UnitOfWork, StorageError> {
        let tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to open unit of work '{}': {:?}", label, e);
            StorageError::Transaction {
                label: label.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(UnitOfWork {
            tx,
            label: label.to_string(),
        })
    }
}

/// A group of statements that commit together or not at all.
/// Dropping an uncommitted unit of work rolls it back.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    label: String,
}

impl UnitOfWork {
    pub async fn read(&mut self, sql: &str, args: &[Arg]) -> Result<Vec<SqliteRow>, StorageError> {
        let rows = bind(sqlx::query(sql), args)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| {
                tracing::error!("Read failed in '{}': {} ({:?})", self.label, sql, e);
                StorageError::Transaction {
                    label: self.label.clone(),
                    message: e.to_string(),
                }
            })?;
        Ok(rows)
    }

    pub async fn write(&mut self, sql: &str, args: &[Arg]) -> Result<u64, StorageError> {
        let done = bind(sqlx::query(sql), args)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                tracing::error!("Write failed in '{}': {} ({:?})", self.label, sql, e);
                StorageError::Transaction {
                    label: self.label.clone(),
                    message: e.to_string(),
                }
            })?;
        Ok(done.rows_affected())
    }

    /// Insert and return the id the store assigned to the new row.
    pub async fn insert(&mut self, sql: &str, args: &[Arg]) -> Result<i64, StorageError> {
        let done = bind(sqlx::query(sql), args)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                tracing::error!("Insert failed in '{}': {} ({:?})", self.label, sql, e);
                StorageError::Transaction {
                    label: self.label.clone(),
                    message: e.to_string(),
                }
            })?;
        Ok(done.last_insert_rowid())
    }

    pub async fn commit(self) -> Result<(), StorageError> {
        let UnitOfWork { tx, label } = self;
        tx.commit().await.map_err(|e| {
            tracing::error!("Commit failed for '{}': {:?}", label, e);
            StorageError::Transaction {
                label,
                message: e.to_string(),
            }
        })
    }
}
