use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use time::{Date, Duration, Time};
use ulid::Ulid;

use crate::engine::EngineError;

/// Unix milliseconds — wall-clock instants (waitlist join order).
pub type Ms = i64;

/// Half-open interval `[start, end)` on a single calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub date: Date,
    pub start: Time,
    pub end: Time,
}

impl TimeWindow {
    pub fn new(date: Date, start: Time, end: Time) -> Self {
        debug_assert!(start < end, "TimeWindow start must be before end");
        Self { date, start, end }
    }

    /// Zero-length and inverted windows are invalid.
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open semantics: windows that only touch at an endpoint do NOT
    /// overlap — `[10:00,11:00)` and `[11:00,12:00)` are compatible.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.date == other.date && self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, date: Date, t: Time) -> bool {
        self.date == date && self.start <= t && t < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingState {
    Confirmed,
    Cancelled,
}

/// A granted reservation. Cancellation is a state transition, not removal —
/// cancelled entries stay in the ledger as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingEntry {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub owner: String,
    pub window: TimeWindow,
    pub state: BookingState,
}

impl BookingEntry {
    pub fn is_confirmed(&self) -> bool {
        self.state == BookingState::Confirmed
    }
}

/// An administrative exclusion. Independent of bookings; once present it is an
/// additional rejection source for new requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub window: TimeWindow,
    pub reason: String,
    pub created_by: String,
}

/// A party requesting a booking. `id` is the external party identifier; name
/// and contact travel onto the waitlist when the request cannot be granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    pub id: String,
    pub name: String,
    pub contact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub party: String,
    pub name: String,
    pub contact: String,
    pub joined_at: Ms,
}

/// Per-resource booking policy, supplied once at registration and read-only
/// afterwards. The capacity ceiling is never changed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPolicy {
    /// `false`: exclusive use (a room). `true`: up to `max_concurrent`
    /// overlapping parties (an event occurrence).
    pub capacity_bounded: bool,
    pub allow_waitlist: bool,
    pub max_concurrent: u32,
}

impl BookingPolicy {
    pub fn exclusive() -> Self {
        Self {
            capacity_bounded: false,
            allow_waitlist: false,
            max_concurrent: 1,
        }
    }

    pub fn capacity(max_concurrent: u32, allow_waitlist: bool) -> Self {
        Self {
            capacity_bounded: true,
            allow_waitlist,
            max_concurrent,
        }
    }
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self::exclusive()
    }
}

/// Authoritative per-resource state: bookings, blocks, and the FIFO waitlist.
/// All mutation goes through the methods below; the engine serializes writers
/// per resource, and the defensive checks here catch callers that bypass it.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub resource_id: Ulid,
    pub name: Option<String>,
    pub policy: BookingPolicy,
    /// Sorted by `(window.date, window.start)`.
    bookings: Vec<BookingEntry>,
    /// Sorted by `(window.date, window.start)`.
    blocks: Vec<BlockEntry>,
    /// FIFO by `joined_at`; insertion order breaks ties.
    waitlist: VecDeque<WaitlistEntry>,
}

impl Ledger {
    pub fn new(resource_id: Ulid, name: Option<String>, policy: BookingPolicy) -> Self {
        Self {
            resource_id,
            name,
            policy,
            bookings: Vec::new(),
            blocks: Vec::new(),
            waitlist: VecDeque::new(),
        }
    }

    // ── Read views ───────────────────────────────────────────

    pub fn bookings(&self) -> &[BookingEntry] {
        &self.bookings
    }

    pub fn blocks(&self) -> &[BlockEntry] {
        &self.blocks
    }

    pub fn booking(&self, id: &Ulid) -> Option<&BookingEntry> {
        self.bookings.iter().find(|b| &b.id == id)
    }

    pub fn block(&self, id: &Ulid) -> Option<&BlockEntry> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    /// Confirmed bookings on `date`, sorted by start time.
    pub fn confirmed_on(&self, date: Date) -> impl Iterator<Item = &BookingEntry> {
        self.bookings
            .iter()
            .filter(move |b| b.is_confirmed() && b.window.date == date)
    }

    /// Blocks on `date`, sorted by start time.
    pub fn blocks_on(&self, date: Date) -> impl Iterator<Item = &BlockEntry> {
        self.blocks.iter().filter(move |b| b.window.date == date)
    }

    /// Confirmed bookings whose window overlaps `window`.
    /// Everything sorted at or past `(date, window.end)` cannot overlap.
    pub fn overlapping_confirmed(&self, window: &TimeWindow) -> impl Iterator<Item = &BookingEntry> {
        let bound = self
            .bookings
            .partition_point(|b| (b.window.date, b.window.start) < (window.date, window.end));
        let query = *window;
        self.bookings[..bound]
            .iter()
            .filter(move |b| b.is_confirmed() && b.window.overlaps(&query))
    }

    pub fn overlapping_blocks(&self, window: &TimeWindow) -> impl Iterator<Item = &BlockEntry> {
        let bound = self
            .blocks
            .partition_point(|b| (b.window.date, b.window.start) < (window.date, window.end));
        let query = *window;
        self.blocks[..bound]
            .iter()
            .filter(move |b| b.window.overlaps(&query))
    }

    pub fn confirmed_overlap_count(&self, window: &TimeWindow) -> u32 {
        self.overlapping_confirmed(window).count() as u32
    }

    // ── Bookings ─────────────────────────────────────────────

    /// Insert a Confirmed booking, maintaining sort order.
    ///
    /// The caller must already have passed conflict evaluation under the
    /// per-resource write lock; the checks here only catch callers that
    /// bypassed that discipline and they fail with `InvariantViolation`.
    pub fn add_booking(&mut self, entry: BookingEntry) -> Result<(), EngineError> {
        if self.booking(&entry.id).is_some() {
            return Err(EngineError::AlreadyExists(entry.id));
        }
        if self.overlapping_blocks(&entry.window).next().is_some() {
            return Err(EngineError::InvariantViolation(
                "booking window overlaps an administrative block",
            ));
        }
        let ceiling = if self.policy.capacity_bounded {
            self.policy.max_concurrent
        } else {
            1
        };
        if self.confirmed_overlap_count(&entry.window) >= ceiling {
            return Err(EngineError::InvariantViolation(
                "booking window exceeds the capacity ceiling",
            ));
        }
        let key = (entry.window.date, entry.window.start);
        let pos = self
            .bookings
            .binary_search_by_key(&key, |b| (b.window.date, b.window.start))
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, entry);
        Ok(())
    }

    /// Confirmed → Cancelled. A second cancel is an error, not a no-op.
    /// Returns the cancelled window (the promotion cascade runs over it).
    pub fn cancel_booking(&mut self, id: Ulid) -> Result<TimeWindow, EngineError> {
        let entry = self
            .bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(EngineError::NotFound(id))?;
        if entry.state == BookingState::Cancelled {
            return Err(EngineError::AlreadyCancelled(id));
        }
        entry.state = BookingState::Cancelled;
        Ok(entry.window)
    }

    // ── Blocks ───────────────────────────────────────────────

    /// Insert a block, maintaining sort order. Block creation must pass
    /// conflict evaluation against Confirmed bookings first; the check here
    /// is the defensive double-check.
    pub fn add_block(&mut self, entry: BlockEntry) -> Result<(), EngineError> {
        if self.block(&entry.id).is_some() {
            return Err(EngineError::AlreadyExists(entry.id));
        }
        if self.overlapping_confirmed(&entry.window).next().is_some() {
            return Err(EngineError::InvariantViolation(
                "block window overlaps a confirmed booking",
            ));
        }
        let key = (entry.window.date, entry.window.start);
        let pos = self
            .blocks
            .binary_search_by_key(&key, |b| (b.window.date, b.window.start))
            .unwrap_or_else(|e| e);
        self.blocks.insert(pos, entry);
        Ok(())
    }

    pub fn remove_block(&mut self, id: Ulid) -> Result<BlockEntry, EngineError> {
        let pos = self
            .blocks
            .iter()
            .position(|b| b.id == id)
            .ok_or(EngineError::NotFound(id))?;
        Ok(self.blocks.remove(pos))
    }

    // ── Waitlist ─────────────────────────────────────────────

    /// Append to the FIFO tail. A party may appear at most once per resource.
    pub fn enqueue_waitlist(&mut self, entry: WaitlistEntry) -> Result<(), EngineError> {
        if self.waitlist.iter().any(|w| w.party == entry.party) {
            return Err(EngineError::AlreadyWaitlisted(entry.party));
        }
        self.waitlist.push_back(entry);
        Ok(())
    }

    pub fn peek_waitlist(&self) -> Option<&WaitlistEntry> {
        self.waitlist.front()
    }

    pub fn dequeue_next(&mut self) -> Option<WaitlistEntry> {
        self.waitlist.pop_front()
    }

    pub fn remove_from_waitlist(&mut self, party: &str) -> Result<WaitlistEntry, EngineError> {
        let pos = self
            .waitlist
            .iter()
            .position(|w| w.party == party)
            .ok_or_else(|| EngineError::UnknownParty(party.to_string()))?;
        Ok(self.waitlist.remove(pos).expect("index from position"))
    }

    pub fn waitlist(&self) -> impl Iterator<Item = &WaitlistEntry> {
        self.waitlist.iter()
    }

    pub fn waitlist_len(&self) -> usize {
        self.waitlist.len()
    }

    pub fn entry_count(&self) -> usize {
        self.bookings.len() + self.blocks.len()
    }
}

/// One ledger state transition — the record the `Store` persists and the
/// audit collaborator consumes. Every mutating variant carries the actor that
/// initiated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    ResourceRegistered {
        id: Ulid,
        name: Option<String>,
        policy: BookingPolicy,
        actor: String,
    },
    ResourceRemoved {
        id: Ulid,
        actor: String,
    },
    BookingAccepted {
        id: Ulid,
        resource_id: Ulid,
        owner: String,
        window: TimeWindow,
        actor: String,
    },
    BookingCancelled {
        id: Ulid,
        resource_id: Ulid,
        actor: String,
    },
    BlockAdded {
        id: Ulid,
        resource_id: Ulid,
        window: TimeWindow,
        reason: String,
        created_by: String,
    },
    BlockRemoved {
        id: Ulid,
        resource_id: Ulid,
        actor: String,
    },
    WaitlistJoined {
        resource_id: Ulid,
        entry: WaitlistEntry,
        actor: String,
    },
    WaitlistLeft {
        resource_id: Ulid,
        party: String,
        actor: String,
    },
    /// Promotion is one atomic record: the party leaves the waitlist and a
    /// Confirmed booking is created for it over `window`.
    WaitlistPromoted {
        booking_id: Ulid,
        resource_id: Ulid,
        party: String,
        window: TimeWindow,
        actor: String,
    },
}

/// Extract the resource_id from a mutation (None for registry-level ones).
pub fn mutation_resource_id(mutation: &Mutation) -> Option<Ulid> {
    match mutation {
        Mutation::BookingAccepted { resource_id, .. }
        | Mutation::BookingCancelled { resource_id, .. }
        | Mutation::BlockAdded { resource_id, .. }
        | Mutation::BlockRemoved { resource_id, .. }
        | Mutation::WaitlistJoined { resource_id, .. }
        | Mutation::WaitlistLeft { resource_id, .. }
        | Mutation::WaitlistPromoted { resource_id, .. } => Some(*resource_id),
        Mutation::ResourceRegistered { .. } | Mutation::ResourceRemoved { .. } => None,
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub id: Ulid,
    pub name: Option<String>,
    pub policy: BookingPolicy,
}
