use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    // A clock before the Unix epoch reads as 0 rather than failing the call.
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as Ms)
}

/// Why a request was turned down. Normal, expected outcomes — not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// An administrative block covers part of the window.
    Blocked,
    /// An exclusive resource already has a confirmed booking there.
    ScheduleConflict,
    /// Capacity ceiling reached and the waitlist is not available.
    Full,
}

/// Outcome of conflict evaluation. Accepted/Waitlisted instruct the caller to
/// commit the corresponding ledger write; Rejected means no write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected(RejectReason),
    Waitlisted,
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted)
    }
}

pub(crate) fn validate_window(window: &TimeWindow) -> Result<(), EngineError> {
    if !window.is_valid() {
        return Err(EngineError::InvalidWindow("start must be before end"));
    }
    Ok(())
}

/// Evaluate a candidate booking window against a resource's ledger.
///
/// Order matters: blocks veto first, then confirmed bookings are counted.
/// At the capacity boundary (`count == max_concurrent`) the request is never
/// accepted — the ceiling is hard, never exceeded even transiently.
pub fn evaluate(
    ledger: &Ledger,
    window: &TimeWindow,
    policy: &BookingPolicy,
) -> Result<Decision, EngineError> {
    validate_window(window)?;

    if ledger.overlapping_blocks(window).next().is_some() {
        return Ok(Decision::Rejected(RejectReason::Blocked));
    }

    let count = ledger.confirmed_overlap_count(window);
    if !policy.capacity_bounded {
        // Exclusive resource: any overlap is a conflict
        return Ok(if count == 0 {
            Decision::Accepted
        } else {
            Decision::Rejected(RejectReason::ScheduleConflict)
        });
    }

    if count < policy.max_concurrent {
        Ok(Decision::Accepted)
    } else if policy.allow_waitlist {
        Ok(Decision::Waitlisted)
    } else {
        Ok(Decision::Rejected(RejectReason::Full))
    }
}

/// Evaluate an administrative block's window: blocks may never be created
/// over an existing confirmed booking, regardless of the resource's policy.
/// Overlapping other blocks is allowed.
pub fn evaluate_block(ledger: &Ledger, window: &TimeWindow) -> Result<Decision, EngineError> {
    validate_window(window)?;

    if ledger.overlapping_confirmed(window).next().is_some() {
        return Ok(Decision::Rejected(RejectReason::ScheduleConflict));
    }
    Ok(Decision::Accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, time};
    use ulid::Ulid;

    fn window(start: time::Time, end: time::Time) -> TimeWindow {
        TimeWindow::new(date!(2026 - 03 - 02), start, end)
    }

    fn ledger_with(policy: BookingPolicy) -> Ledger {
        Ledger::new(Ulid::new(), None, policy)
    }

    fn confirmed(ledger: &mut Ledger, start: time::Time, end: time::Time) {
        let rid = ledger.resource_id;
        ledger
            .add_booking(BookingEntry {
                id: Ulid::new(),
                resource_id: rid,
                owner: "p".into(),
                window: window(start, end),
                state: BookingState::Confirmed,
            })
            .unwrap();
    }

    #[test]
    fn invalid_window_is_a_caller_error() {
        let ledger = ledger_with(BookingPolicy::exclusive());
        let bad = TimeWindow {
            date: date!(2026 - 03 - 02),
            start: time!(11:00),
            end: time!(10:00),
        };
        let err = evaluate(&ledger, &bad, &BookingPolicy::exclusive()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidWindow(_)));
    }

    #[test]
    fn exclusive_accepts_free_window() {
        let ledger = ledger_with(BookingPolicy::exclusive());
        let d = evaluate(
            &ledger,
            &window(time!(10:00), time!(11:00)),
            &BookingPolicy::exclusive(),
        )
        .unwrap();
        assert_eq!(d, Decision::Accepted);
    }

    #[test]
    fn exclusive_rejects_overlap() {
        let mut ledger = ledger_with(BookingPolicy::exclusive());
        confirmed(&mut ledger, time!(10:00), time!(11:00));
        let d = evaluate(
            &ledger,
            &window(time!(10:30), time!(11:30)),
            &BookingPolicy::exclusive(),
        )
        .unwrap();
        assert_eq!(d, Decision::Rejected(RejectReason::ScheduleConflict));
    }

    #[test]
    fn touching_endpoints_do_not_conflict() {
        let mut ledger = ledger_with(BookingPolicy::exclusive());
        confirmed(&mut ledger, time!(10:00), time!(11:00));
        let d = evaluate(
            &ledger,
            &window(time!(11:00), time!(12:00)),
            &BookingPolicy::exclusive(),
        )
        .unwrap();
        assert_eq!(d, Decision::Accepted);
    }

    #[test]
    fn block_vetoes_before_capacity() {
        let mut ledger = ledger_with(BookingPolicy::capacity(5, true));
        let rid = ledger.resource_id;
        ledger
            .add_block(BlockEntry {
                id: Ulid::new(),
                resource_id: rid,
                window: window(time!(09:00), time!(12:00)),
                reason: "maintenance".into(),
                created_by: "admin".into(),
            })
            .unwrap();
        let d = evaluate(
            &ledger,
            &window(time!(10:00), time!(11:00)),
            &BookingPolicy::capacity(5, true),
        )
        .unwrap();
        assert_eq!(d, Decision::Rejected(RejectReason::Blocked));
    }

    #[test]
    fn capacity_boundary_is_hard() {
        let policy = BookingPolicy::capacity(2, false);
        let mut ledger = ledger_with(policy);
        confirmed(&mut ledger, time!(10:00), time!(11:00));
        confirmed(&mut ledger, time!(10:00), time!(11:00));
        // count == max_concurrent: never accepted
        let d = evaluate(&ledger, &window(time!(10:00), time!(11:00)), &policy).unwrap();
        assert_eq!(d, Decision::Rejected(RejectReason::Full));
    }

    #[test]
    fn at_capacity_with_waitlist() {
        let policy = BookingPolicy::capacity(1, true);
        let mut ledger = ledger_with(policy);
        confirmed(&mut ledger, time!(10:00), time!(11:00));
        let d = evaluate(&ledger, &window(time!(10:00), time!(11:00)), &policy).unwrap();
        assert_eq!(d, Decision::Waitlisted);
    }

    #[test]
    fn under_capacity_accepts() {
        let policy = BookingPolicy::capacity(3, true);
        let mut ledger = ledger_with(policy);
        confirmed(&mut ledger, time!(10:00), time!(11:00));
        confirmed(&mut ledger, time!(10:00), time!(11:00));
        let d = evaluate(&ledger, &window(time!(10:00), time!(11:00)), &policy).unwrap();
        assert_eq!(d, Decision::Accepted);
    }

    #[test]
    fn block_rejected_over_confirmed_booking() {
        let mut ledger = ledger_with(BookingPolicy::exclusive());
        confirmed(&mut ledger, time!(10:00), time!(11:00));
        let d = evaluate_block(&ledger, &window(time!(10:30), time!(12:00))).unwrap();
        assert_eq!(d, Decision::Rejected(RejectReason::ScheduleConflict));
    }

    #[test]
    fn block_allowed_over_cancelled_booking() {
        let mut ledger = ledger_with(BookingPolicy::exclusive());
        let rid = ledger.resource_id;
        let id = Ulid::new();
        ledger
            .add_booking(BookingEntry {
                id,
                resource_id: rid,
                owner: "p".into(),
                window: window(time!(10:00), time!(11:00)),
                state: BookingState::Confirmed,
            })
            .unwrap();
        ledger.cancel_booking(id).unwrap();
        let d = evaluate_block(&ledger, &window(time!(10:00), time!(12:00))).unwrap();
        assert_eq!(d, Decision::Accepted);
    }

    #[test]
    fn block_allowed_over_other_block() {
        let mut ledger = ledger_with(BookingPolicy::exclusive());
        let rid = ledger.resource_id;
        ledger
            .add_block(BlockEntry {
                id: Ulid::new(),
                resource_id: rid,
                window: window(time!(09:00), time!(12:00)),
                reason: "cleaning".into(),
                created_by: "admin".into(),
            })
            .unwrap();
        let d = evaluate_block(&ledger, &window(time!(10:00), time!(11:00))).unwrap();
        assert_eq!(d, Decision::Accepted);
    }
}
