use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::error::AppResult;

pub mod migrations;

pub mod repositories;

/// Opens connections to the timeline database. The schema is brought up to
/// date once, when the pool is created.
#[derive(Clone, Debug)]
pub struct DbPool {
    path: PathBuf,
}

impl DbPool {
    pub fn new<P: Into<PathBuf>>(path: P) -> AppResult<Self> {
        let path = path.into();
        info!(target: "app::db", db_path = %path.display(), "opening timeline database");
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let pool = Self { path };
        let conn = pool.get_connection()?;
        migrations::run(&conn)?;

        Ok(pool)
    }

    pub fn get_connection(&self) -> AppResult<Connection> {
        let conn = Connection::open(&self.path)?;
        configure_connection(&conn)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, callback: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T>,
    {
        let conn = self.get_connection()?;
        callback(&conn)
    }

    /// Runs `callback` inside an immediate transaction, so the write lock is
    /// held from the first read. Commits on `Ok`, rolls back on `Err`.
    pub fn with_transaction<F, T>(&self, callback: F) -> AppResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> AppResult<T>,
    {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match callback(&tx) {
            Ok(value) => {
                tx.commit()?;
                debug!(target: "app::db", "transaction committed");
                Ok(value)
            }
            Err(err) => {
                warn!(target: "app::db", error = %err, "transaction rolled back");
                Err(err)
            }
        }
    }
}

fn configure_connection(conn: &Connection) -> AppResult<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(())
}
