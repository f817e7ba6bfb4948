mod availability;
mod conflict;
mod error;
mod mutations;
mod promote;
mod queries;

pub use availability::free_windows;
pub use conflict::{Decision, RejectReason, evaluate, evaluate_block};
pub use error::EngineError;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;
use crate::notify::{Notification, Notifier, NotifyKind};
use crate::observability;
use crate::store::Store;

pub type SharedLedger = Arc<RwLock<Ledger>>;

/// The booking engine: one ledger per resource, all mutating operations
/// serialized per resource behind the ledger's write lock. Conflict
/// evaluation, the ledger mutation, and any promotion cascade run inside one
/// lock scope, so a freed slot is reassigned before any concurrent request
/// can observe it.
pub struct Engine {
    ledgers: DashMap<Ulid, SharedLedger>,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    /// Reverse lookup: booking/block id → resource id
    entry_to_resource: DashMap<Ulid, Ulid>,
}

/// Apply a mutation directly to a Ledger (no locking — caller holds the lock).
fn apply_to_ledger(
    ledger: &mut Ledger,
    mutation: &Mutation,
    index: &DashMap<Ulid, Ulid>,
) -> Result<(), EngineError> {
    match mutation {
        Mutation::BookingAccepted {
            id,
            resource_id,
            owner,
            window,
            ..
        } => {
            ledger.add_booking(BookingEntry {
                id: *id,
                resource_id: *resource_id,
                owner: owner.clone(),
                window: *window,
                state: BookingState::Confirmed,
            })?;
            index.insert(*id, *resource_id);
        }
        Mutation::BookingCancelled { id, .. } => {
            // Cancelled entries stay in the ledger and stay resolvable
            ledger.cancel_booking(*id)?;
        }
        Mutation::BlockAdded {
            id,
            resource_id,
            window,
            reason,
            created_by,
        } => {
            ledger.add_block(BlockEntry {
                id: *id,
                resource_id: *resource_id,
                window: *window,
                reason: reason.clone(),
                created_by: created_by.clone(),
            })?;
            index.insert(*id, *resource_id);
        }
        Mutation::BlockRemoved { id, .. } => {
            ledger.remove_block(*id)?;
            index.remove(id);
        }
        Mutation::WaitlistJoined { entry, .. } => {
            ledger.enqueue_waitlist(entry.clone())?;
        }
        Mutation::WaitlistLeft { party, .. } => {
            ledger.remove_from_waitlist(party)?;
        }
        Mutation::WaitlistPromoted {
            booking_id,
            resource_id,
            party,
            window,
            ..
        } => {
            ledger.remove_from_waitlist(party)?;
            ledger.add_booking(BookingEntry {
                id: *booking_id,
                resource_id: *resource_id,
                owner: party.clone(),
                window: *window,
                state: BookingState::Confirmed,
            })?;
            index.insert(*booking_id, *resource_id);
        }
        // Registered/Removed are handled at the registry level, not here
        Mutation::ResourceRegistered { .. } | Mutation::ResourceRemoved { .. } => {}
    }
    Ok(())
}

impl Engine {
    /// Build an engine by replaying the store's full mutation log.
    pub async fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, EngineError> {
        let mutations = store
            .load()
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        let engine = Self {
            ledgers: DashMap::new(),
            store,
            notifier,
            entry_to_resource: DashMap::new(),
        };

        // Replay — we're the sole owner of these Arcs, so try_write always
        // succeeds instantly (no contention). Never block here: construction
        // may run inside an async context.
        for mutation in &mutations {
            match mutation {
                Mutation::ResourceRegistered {
                    id, name, policy, ..
                } => {
                    let ledger = Ledger::new(*id, name.clone(), *policy);
                    engine.ledgers.insert(*id, Arc::new(RwLock::new(ledger)));
                }
                Mutation::ResourceRemoved { id, .. } => {
                    engine.ledgers.remove(id);
                }
                other => {
                    if let Some(resource_id) = mutation_resource_id(other)
                        && let Some(entry) = engine.ledgers.get(&resource_id)
                    {
                        let ledger_arc = entry.clone();
                        let mut guard =
                            ledger_arc.try_write().expect("replay: uncontended write");
                        apply_to_ledger(&mut guard, other, &engine.entry_to_resource)?;
                    }
                }
            }
        }
        metrics::gauge!(observability::RESOURCES_ACTIVE).set(engine.ledgers.len() as f64);

        Ok(engine)
    }

    pub fn ledger(&self, id: &Ulid) -> Option<SharedLedger> {
        self.ledgers.get(id).map(|e| e.value().clone())
    }

    pub fn resource_for_entry(&self, entry_id: &Ulid) -> Option<Ulid> {
        self.entry_to_resource.get(entry_id).map(|e| *e.value())
    }

    /// Store-commit + ledger-apply in one call. The commit runs first: a
    /// store failure aborts the operation before any in-memory state changes.
    pub(super) async fn persist_and_apply(
        &self,
        ledger: &mut Ledger,
        mutation: &Mutation,
    ) -> Result<(), EngineError> {
        self.store
            .commit(ledger.resource_id, std::slice::from_ref(mutation))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        apply_to_ledger(ledger, mutation, &self.entry_to_resource)
    }

    /// Lookup entry → resource, get the ledger, acquire the write lock.
    pub(super) async fn resolve_entry_write(
        &self,
        entry_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<Ledger>), EngineError> {
        let resource_id = self
            .resource_for_entry(entry_id)
            .ok_or(EngineError::NotFound(*entry_id))?;
        let ledger = self
            .ledger(&resource_id)
            .ok_or(EngineError::NotFound(resource_id))?;
        let guard = ledger.write_owned().await;
        Ok((resource_id, guard))
    }

    /// Signal an outcome. Failure is logged and counted, never unwound —
    /// ledger state is authoritative, delivery is best-effort.
    pub(super) fn notify_outcome(
        &self,
        resource_id: Ulid,
        party: &str,
        kind: NotifyKind,
        booking_id: Option<Ulid>,
        window: Option<TimeWindow>,
    ) {
        let note = Notification {
            resource_id,
            party: party.to_string(),
            kind,
            booking_id,
            window,
        };
        if let Err(e) = self.notifier.notify(&note) {
            metrics::counter!(observability::NOTIFY_FAILURES_TOTAL).increment(1);
            tracing::warn!("notification to {party} failed: {e}");
        }
    }
}
