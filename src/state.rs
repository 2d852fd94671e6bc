//! Shared application state: the immutable settings record, the SQLite
//! connection, and the LLM client. Wrapped in `Arc` at startup and shared
//! by every request.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use thiserror::Error;

use crate::pipeline::llm::LlmClient;
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state lock poisoned")]
    LockPoisoned,
}

pub struct AppState {
    pub settings: Arc<Settings>,
    /// Guarded connection. Locks are held for individual statements only,
    /// never across the LLM await.
    db: Mutex<Connection>,
    pub llm: Arc<dyn LlmClient>,
}

impl AppState {
    pub fn new(settings: Settings, conn: Connection, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            settings: Arc::new(settings),
            db: Mutex::new(conn),
            llm,
        }
    }

    /// Borrow the database connection.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, StateError> {
        self.db.lock().map_err(|_| StateError::LockPoisoned)
    }
}
