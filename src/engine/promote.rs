use tracing::info;
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyKind;
use crate::observability;

use super::{Engine, EngineError};

/// Free capacity over `window` after a release. Zero while any block still
/// overlaps the window.
pub(super) fn free_slots(ledger: &Ledger, window: &TimeWindow) -> u32 {
    if ledger.overlapping_blocks(window).next().is_some() {
        return 0;
    }
    let ceiling = if ledger.policy.capacity_bounded {
        ledger.policy.max_concurrent
    } else {
        1
    };
    ceiling.saturating_sub(ledger.confirmed_overlap_count(window))
}

impl Engine {
    /// Promote waitlisted parties into capacity freed over `window`.
    ///
    /// Runs inside the caller's write-lock scope, so a released slot is
    /// reassigned before any concurrent request can observe it as free.
    /// Each iteration commits exactly one `WaitlistPromoted` mutation — a
    /// party is either fully promoted or left untouched. Terminates when the
    /// free slots hit zero or the waitlist empties.
    pub(super) async fn promote_waitlisted(
        &self,
        ledger: &mut Ledger,
        window: &TimeWindow,
        actor: &str,
    ) -> Result<Vec<Ulid>, EngineError> {
        if !ledger.policy.capacity_bounded {
            return Ok(Vec::new());
        }

        let mut promoted = Vec::new();
        let mut slots = free_slots(ledger, window);
        while slots > 0 {
            let Some(next) = ledger.peek_waitlist() else {
                break;
            };
            let party = next.party.clone();
            let booking_id = Ulid::new();
            let mutation = Mutation::WaitlistPromoted {
                booking_id,
                resource_id: ledger.resource_id,
                party: party.clone(),
                window: *window,
                actor: actor.to_string(),
            };
            self.persist_and_apply(ledger, &mutation).await?;
            metrics::counter!(observability::PROMOTIONS_TOTAL).increment(1);
            info!("promoted {party} on resource {}", ledger.resource_id);
            self.notify_outcome(
                ledger.resource_id,
                &party,
                NotifyKind::Promoted,
                Some(booking_id),
                Some(*window),
            );
            promoted.push(booking_id);
            slots -= 1;
        }
        Ok(promoted)
    }
}
