use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::NotifyKind;
use crate::observability;

use super::conflict::{self, now_ms, validate_window};
use super::{Decision, Engine, EngineError};

impl Engine {
    /// Register a resource with its booking policy. The policy — including
    /// the capacity ceiling — is fixed for the resource's lifetime.
    pub async fn register_resource(
        &self,
        id: Ulid,
        name: Option<String>,
        policy: BookingPolicy,
        actor: &str,
    ) -> Result<(), EngineError> {
        if self.ledgers.len() >= MAX_RESOURCES {
            return Err(EngineError::LimitExceeded("too many resources"));
        }
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("resource name too long"));
        }
        if policy.max_concurrent == 0 {
            return Err(EngineError::LimitExceeded("capacity ceiling must be at least 1"));
        }
        if self.ledgers.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let mutation = Mutation::ResourceRegistered {
            id,
            name: name.clone(),
            policy,
            actor: actor.to_string(),
        };
        self.store
            .commit(id, std::slice::from_ref(&mutation))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        let ledger = Ledger::new(id, name, policy);
        self.ledgers.insert(id, Arc::new(RwLock::new(ledger)));
        metrics::gauge!(observability::RESOURCES_ACTIVE).increment(1.0);
        info!("registered resource {id}");
        Ok(())
    }

    pub async fn remove_resource(&self, id: Ulid, actor: &str) -> Result<(), EngineError> {
        if !self.ledgers.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        let mutation = Mutation::ResourceRemoved {
            id,
            actor: actor.to_string(),
        };
        self.store
            .commit(id, std::slice::from_ref(&mutation))
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        self.ledgers.remove(&id);
        metrics::gauge!(observability::RESOURCES_ACTIVE).decrement(1.0);
        info!("removed resource {id}");
        Ok(())
    }

    /// Evaluate a booking request and, when granted, commit it.
    ///
    /// Accepted → a Confirmed booking is written and the party notified.
    /// Waitlisted → the party joins the FIFO tail (capacity-bounded resources
    /// with a waitlist only). Rejected → nothing is written.
    pub async fn request_booking(
        &self,
        id: Ulid,
        resource_id: Ulid,
        party: &Party,
        window: TimeWindow,
        actor: &str,
    ) -> Result<Decision, EngineError> {
        validate_window(&window)?;
        if party.id.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("party id too long"));
        }
        if self.entry_to_resource.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let ledger = self
            .ledger(&resource_id)
            .ok_or(EngineError::NotFound(resource_id))?;
        let mut guard = ledger.write().await;
        if guard.entry_count() >= MAX_ENTRIES_PER_RESOURCE {
            return Err(EngineError::LimitExceeded("too many entries on resource"));
        }

        let policy = guard.policy;
        let decision = conflict::evaluate(&guard, &window, &policy)?;
        metrics::counter!(
            observability::DECISIONS_TOTAL,
            "outcome" => observability::decision_label(&decision)
        )
        .increment(1);

        match decision {
            Decision::Accepted => {
                let mutation = Mutation::BookingAccepted {
                    id,
                    resource_id,
                    owner: party.id.clone(),
                    window,
                    actor: actor.to_string(),
                };
                self.persist_and_apply(&mut guard, &mutation).await?;
                self.notify_outcome(
                    resource_id,
                    &party.id,
                    NotifyKind::Accepted,
                    Some(id),
                    Some(window),
                );
            }
            Decision::Waitlisted => {
                if guard.waitlist_len() >= MAX_WAITLIST_PER_RESOURCE {
                    return Err(EngineError::LimitExceeded("waitlist full"));
                }
                // Checked before the commit so a doomed mutation is never persisted
                if guard.waitlist().any(|w| w.party == party.id) {
                    return Err(EngineError::AlreadyWaitlisted(party.id.clone()));
                }
                let entry = WaitlistEntry {
                    party: party.id.clone(),
                    name: party.name.clone(),
                    contact: party.contact.clone(),
                    joined_at: now_ms(),
                };
                let mutation = Mutation::WaitlistJoined {
                    resource_id,
                    entry,
                    actor: actor.to_string(),
                };
                self.persist_and_apply(&mut guard, &mutation).await?;
            }
            Decision::Rejected(_) => {
                // No write for rejections
                self.notify_outcome(resource_id, &party.id, NotifyKind::Rejected, None, Some(window));
            }
        }
        Ok(decision)
    }

    /// Cancel a confirmed booking. On capacity-bounded resources the freed
    /// window immediately feeds the waitlist, inside the same lock scope;
    /// returns the ids of any bookings created by promotion.
    pub async fn cancel_booking(&self, id: Ulid, actor: &str) -> Result<Vec<Ulid>, EngineError> {
        let (resource_id, mut guard) = self.resolve_entry_write(&id).await?;
        // State checks run before the commit so a doomed mutation is never
        // persisted. A second cancel is an error, not a no-op.
        let window = match guard.booking(&id) {
            None => return Err(EngineError::NotFound(id)),
            Some(b) if !b.is_confirmed() => return Err(EngineError::AlreadyCancelled(id)),
            Some(b) => b.window,
        };
        let mutation = Mutation::BookingCancelled {
            id,
            resource_id,
            actor: actor.to_string(),
        };
        self.persist_and_apply(&mut guard, &mutation).await?;
        self.promote_waitlisted(&mut guard, &window, actor).await
    }

    /// Create an administrative block. The block's window is itself
    /// conflict-checked against Confirmed bookings: a block can never
    /// retroactively invalidate a confirmed booking.
    pub async fn add_block(
        &self,
        id: Ulid,
        resource_id: Ulid,
        window: TimeWindow,
        reason: &str,
        created_by: &str,
    ) -> Result<Decision, EngineError> {
        validate_window(&window)?;
        if reason.len() > MAX_REASON_LEN {
            return Err(EngineError::LimitExceeded("block reason too long"));
        }
        if self.entry_to_resource.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let ledger = self
            .ledger(&resource_id)
            .ok_or(EngineError::NotFound(resource_id))?;
        let mut guard = ledger.write().await;
        if guard.entry_count() >= MAX_ENTRIES_PER_RESOURCE {
            return Err(EngineError::LimitExceeded("too many entries on resource"));
        }

        let decision = conflict::evaluate_block(&guard, &window)?;
        if decision.is_accepted() {
            let mutation = Mutation::BlockAdded {
                id,
                resource_id,
                window,
                reason: reason.to_string(),
                created_by: created_by.to_string(),
            };
            self.persist_and_apply(&mut guard, &mutation).await?;
        }
        Ok(decision)
    }

    /// Remove a block. A lifted block may free slots the waitlist was
    /// waiting on; returns the ids of any bookings created by promotion.
    pub async fn remove_block(&self, id: Ulid, actor: &str) -> Result<Vec<Ulid>, EngineError> {
        let (resource_id, mut guard) = self.resolve_entry_write(&id).await?;
        let window = guard.block(&id).ok_or(EngineError::NotFound(id))?.window;
        let mutation = Mutation::BlockRemoved {
            id,
            resource_id,
            actor: actor.to_string(),
        };
        self.persist_and_apply(&mut guard, &mutation).await?;
        self.promote_waitlisted(&mut guard, &window, actor).await
    }

    /// Explicit waitlist withdrawal.
    pub async fn leave_waitlist(
        &self,
        resource_id: Ulid,
        party: &str,
        actor: &str,
    ) -> Result<(), EngineError> {
        let ledger = self
            .ledger(&resource_id)
            .ok_or(EngineError::NotFound(resource_id))?;
        let mut guard = ledger.write().await;
        if !guard.waitlist().any(|w| w.party == party) {
            return Err(EngineError::UnknownParty(party.to_string()));
        }
        let mutation = Mutation::WaitlistLeft {
            resource_id,
            party: party.to_string(),
            actor: actor.to_string(),
        };
        self.persist_and_apply(&mut guard, &mutation).await
    }

    /// Emit the minimal mutation list that recreates current state, for store
    /// compaction. Cancelled bookings are emitted as accept+cancel pairs so
    /// their history survives a reload.
    pub async fn snapshot_mutations(&self) -> Vec<Mutation> {
        let mut mutations = Vec::new();
        let resource_ids: Vec<Ulid> = self.ledgers.iter().map(|e| *e.key()).collect();
        for id in resource_ids {
            let Some(ledger) = self.ledger(&id) else {
                continue;
            };
            let guard = ledger.read().await;
            mutations.push(Mutation::ResourceRegistered {
                id: guard.resource_id,
                name: guard.name.clone(),
                policy: guard.policy,
                actor: "snapshot".into(),
            });
            // Cancelled pairs first, then confirmed, then blocks: replaying
            // in this order can never trip the overlap double-checks.
            for b in guard.bookings().iter().filter(|b| !b.is_confirmed()) {
                mutations.push(Mutation::BookingAccepted {
                    id: b.id,
                    resource_id: b.resource_id,
                    owner: b.owner.clone(),
                    window: b.window,
                    actor: "snapshot".into(),
                });
                mutations.push(Mutation::BookingCancelled {
                    id: b.id,
                    resource_id: b.resource_id,
                    actor: "snapshot".into(),
                });
            }
            for b in guard.bookings().iter().filter(|b| b.is_confirmed()) {
                mutations.push(Mutation::BookingAccepted {
                    id: b.id,
                    resource_id: b.resource_id,
                    owner: b.owner.clone(),
                    window: b.window,
                    actor: "snapshot".into(),
                });
            }
            for blk in guard.blocks() {
                mutations.push(Mutation::BlockAdded {
                    id: blk.id,
                    resource_id: blk.resource_id,
                    window: blk.window,
                    reason: blk.reason.clone(),
                    created_by: blk.created_by.clone(),
                });
            }
            for w in guard.waitlist() {
                mutations.push(Mutation::WaitlistJoined {
                    resource_id: guard.resource_id,
                    entry: w.clone(),
                    actor: "snapshot".into(),
                });
            }
        }
        mutations
    }

    /// Compact the store down to the current-state snapshot.
    pub async fn compact_store(&self) -> Result<(), EngineError> {
        let snapshot = self.snapshot_mutations().await;
        self.store
            .compact(&snapshot)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))
    }
}
