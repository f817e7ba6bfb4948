//! hotdesk — the booking core of a coworking-space platform.
//!
//! Decides whether a proposed time window on a bounded-capacity resource may
//! be granted, tracks administrative blocks, and deterministically promotes
//! waitlisted parties when capacity frees up. Transport, auth, and delivery
//! mechanics live in the embedding service; this crate exposes the [`Engine`]
//! plus the [`Store`] and [`Notifier`] seams with reference implementations.

pub mod engine;
pub mod journal;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod store;

pub use engine::{Decision, Engine, EngineError, RejectReason};
pub use journal::JournalStore;
pub use model::{
    BlockEntry, BookingEntry, BookingPolicy, BookingState, Ledger, Ms, Mutation, Party,
    ResourceInfo, TimeWindow, WaitlistEntry,
};
pub use notify::{Notification, Notifier, NotifyError, NotifyHub, NotifyKind};
pub use store::{MemoryStore, Store};
