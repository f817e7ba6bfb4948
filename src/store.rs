use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use ulid::Ulid;

use crate::model::Mutation;

/// Abstract persistence for ledger mutations. The engine is storage-agnostic:
/// it replays the full mutation log at startup and hands each mutation batch
/// to `commit` before applying it in memory. A commit must be atomic for one
/// resource's batch — the engine treats an error as "nothing was persisted"
/// and aborts the operation before any ledger state changes.
#[async_trait]
pub trait Store: Send + Sync {
    /// Return every persisted mutation, in commit order.
    async fn load(&self) -> io::Result<Vec<Mutation>>;

    /// Durably persist a batch of mutations for one resource.
    async fn commit(&self, resource_id: Ulid, mutations: &[Mutation]) -> io::Result<()>;

    /// Replace the persisted log with a minimal snapshot that recreates the
    /// current state (see `Engine::snapshot_mutations`).
    async fn compact(&self, snapshot: &[Mutation]) -> io::Result<()>;
}

/// Store keeping the mutation log in memory. Used by tests and by embedders
/// that persist elsewhere.
pub struct MemoryStore {
    log: Mutex<Vec<Mutation>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_log(log: Vec<Mutation>) -> Self {
        Self {
            log: Mutex::new(log),
        }
    }

    pub fn len(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self) -> io::Result<Vec<Mutation>> {
        Ok(self.log.lock().unwrap().clone())
    }

    async fn commit(&self, _resource_id: Ulid, mutations: &[Mutation]) -> io::Result<()> {
        self.log.lock().unwrap().extend_from_slice(mutations);
        Ok(())
    }

    async fn compact(&self, snapshot: &[Mutation]) -> io::Result<()> {
        *self.log.lock().unwrap() = snapshot.to_vec();
        Ok(())
    }
}
