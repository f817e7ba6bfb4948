use time::{Date, Duration, Time};
use ulid::Ulid;

use crate::model::*;

use super::{availability, Engine, EngineError};

impl Engine {
    /// Confirmed bookings for a resource on `date`, sorted by start time.
    /// Unknown resources read as empty.
    pub async fn confirmed_bookings_on(&self, resource_id: Ulid, date: Date) -> Vec<BookingEntry> {
        let Some(ledger) = self.ledger(&resource_id) else {
            return Vec::new();
        };
        let guard = ledger.read().await;
        guard.confirmed_on(date).cloned().collect()
    }

    /// Blocks for a resource on `date`, sorted by start time.
    pub async fn blocks_on(&self, resource_id: Ulid, date: Date) -> Vec<BlockEntry> {
        let Some(ledger) = self.ledger(&resource_id) else {
            return Vec::new();
        };
        let guard = ledger.read().await;
        guard.blocks_on(date).cloned().collect()
    }

    /// Waitlist in promotion order.
    pub async fn waitlist_of(&self, resource_id: Ulid) -> Vec<WaitlistEntry> {
        let Some(ledger) = self.ledger(&resource_id) else {
            return Vec::new();
        };
        let guard = ledger.read().await;
        guard.waitlist().cloned().collect()
    }

    /// Look up a booking (confirmed or cancelled) by id.
    pub async fn find_booking(&self, id: &Ulid) -> Option<BookingEntry> {
        let resource_id = self.resource_for_entry(id)?;
        let ledger = self.ledger(&resource_id)?;
        let guard = ledger.read().await;
        guard.booking(id).cloned()
    }

    pub async fn list_resources(&self) -> Vec<ResourceInfo> {
        let ids: Vec<Ulid> = self.ledgers.iter().map(|e| *e.key()).collect();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(ledger) = self.ledger(&id) {
                let guard = ledger.read().await;
                out.push(ResourceInfo {
                    id: guard.resource_id,
                    name: guard.name.clone(),
                    policy: guard.policy,
                });
            }
        }
        out
    }

    /// Free windows on `date` between `from` and `to`, optionally filtered to
    /// a minimum duration. Unknown resources read as empty.
    pub async fn free_windows(
        &self,
        resource_id: Ulid,
        date: Date,
        from: Time,
        to: Time,
        min_duration: Option<Duration>,
    ) -> Result<Vec<TimeWindow>, EngineError> {
        if from >= to {
            return Err(EngineError::InvalidWindow("query start must be before end"));
        }
        let Some(ledger) = self.ledger(&resource_id) else {
            return Ok(Vec::new());
        };
        let guard = ledger.read().await;
        let mut free = availability::free_windows(&guard, date, from, to);
        if let Some(min) = min_duration {
            free.retain(|w| w.duration() >= min);
        }
        Ok(free)
    }
}
