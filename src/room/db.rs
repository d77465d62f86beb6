use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Request {
    Run(Job),
    Close,
}

#[derive(Debug, Clone)]
enum DbLocation {
    File(PathBuf),
    Memory,
}

impl DbLocation {
    fn open(&self) -> Result<Connection> {
        let conn = match self {
            DbLocation::File(path) => {
                let conn = Connection::open(path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    log_error!("could not enable WAL for {}: {err}", path.display());
                }
                conn
            }
            DbLocation::Memory => {
                Connection::open_in_memory().context("failed to open in-memory database")?
            }
        };
        Ok(conn)
    }
}

/// The thread that owns the connection. Dropping the last handle closes it.
struct Worker {
    requests: mpsc::Sender<Request>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };

        // A send error means the thread is already gone; join anyway.
        let _ = self.requests.send(Request::Close);
        if handle.join().is_err() {
            log_error!("card database thread panicked");
        }
    }
}

/// SQLite connection pinned to one thread. Callers hand it closures and
/// await the result.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    location: Arc<DbLocation>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        Self::start(DbLocation::File(db_path))
    }

    /// Private database that disappears with the last handle.
    pub fn in_memory() -> Result<Self> {
        Self::start(DbLocation::Memory)
    }

    fn start(location: DbLocation) -> Result<Self> {
        let (requests, inbox) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let thread_location = location.clone();

        let thread = thread::Builder::new()
            .name("retrocam-db".into())
            .spawn(move || {
                let prepared = thread_location.open().and_then(|mut conn| {
                    run_migrations(&mut conn).context("failed to migrate card database")?;
                    Ok(conn)
                });
                match prepared {
                    Ok(conn) => {
                        if ready_tx.send(Ok(())).is_ok() {
                            serve(conn, inbox);
                        }
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                    }
                }
            })
            .context("failed to spawn database thread")?;

        ready_rx
            .recv()
            .context("database thread exited during startup")??;

        match &location {
            DbLocation::File(path) => log_info!("card database ready at {}", path.display()),
            DbLocation::Memory => log_info!("card database ready in memory"),
        }

        Ok(Self {
            worker: Arc::new(Worker {
                requests,
                thread: Mutex::new(Some(thread)),
            }),
            location: Arc::new(location),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        match self.location.as_ref() {
            DbLocation::File(path) => Some(path.as_path()),
            DbLocation::Memory => None,
        }
    }

    /// Runs `task` on the database thread.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // The caller may have stopped waiting.
            let _ = reply_tx.send(task(conn));
        });

        self.worker
            .requests
            .send(Request::Run(job))
            .map_err(|_| anyhow!("database thread is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread dropped the request"))?
    }
}

fn serve(mut conn: Connection, inbox: mpsc::Receiver<Request>) {
    for request in inbox {
        match request {
            Request::Run(job) => job(&mut conn),
            Request::Close => break,
        }
    }
    log::debug!("card database thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_runs_tasks() {
        let db = Database::in_memory().unwrap();
        assert!(db.path().is_none());
        let count: i64 = db
            .execute(|conn| {
                conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))
                    .context("count failed")
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_task_errors_reach_the_caller() {
        let db = Database::in_memory().unwrap();
        let result: Result<()> = db
            .execute(|conn| {
                conn.execute("INSERT INTO missing_table VALUES (1)", [])?;
                Ok(())
            })
            .await;
        assert!(result.is_err());

        // the thread survives a failed task
        let ok: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT 7", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(ok, 7);
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_dir() {
        let dir = std::env::temp_dir().join(format!("retrocam-db-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("rooms.sqlite3");
        let db = Database::new(path.clone()).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(path.exists());
        drop(db);
        let _ = std::fs::remove_dir_all(dir);
    }
}
