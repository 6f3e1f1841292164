use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task;
use crate::error::{Result, PapergraphError};

pub mod migrate;

/// Database session: one connection opened per process, shared behind a mutex.
///
/// Every closure passed to [`Db::with_connection`] runs on the blocking pool
/// with exclusive access to the connection, which serializes writers.
#[derive(Clone)]
pub struct Db {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").field("path", &self.path).finish()
    }
}

impl Db {
    /// Open the database at `db_path`, apply pragmas and run migrations.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let mut conn = open_connection(&path)?;
        migrate::run_migrations(&mut conn)?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a closure with the session connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| PapergraphError::StoreUnavailable("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| PapergraphError::StoreUnavailable(format!("blocking task failed: {}", e)))?
    }

    /// Close the connection if this is the last handle to it.
    ///
    /// Remaining clones keep the connection alive; it is closed when the
    /// final one is dropped.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => {
                let conn = mutex
                    .into_inner()
                    .map_err(|_| PapergraphError::StoreUnavailable("connection lock poisoned".to_string()))?;
                conn.close().map_err(|(_, e)| PapergraphError::Database(e))?;
                log::debug!("Closed database {}", self.path.display());
                Ok(())
            }
            Err(_) => {
                log::debug!("Database {} still shared, deferring close", self.path.display());
                Ok(())
            }
        }
    }
}

/// Open a connection with the pragmas the store relies on
fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;

    // WAL for concurrent readers, foreign keys for edge integrity
    conn.execute_batch(
        "PRAGMA journal_mode = WAL; \
         PRAGMA synchronous = NORMAL; \
         PRAGMA foreign_keys = ON; \
         PRAGMA temp_store = MEMORY;",
    )?;

    Ok(conn)
}
