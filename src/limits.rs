//! Hard bounds on engine state. Exceeding any of these returns
//! `EngineError::LimitExceeded` rather than growing without bound.

/// Maximum resources registered in one engine.
pub const MAX_RESOURCES: usize = 10_000;

/// Maximum booking + block entries retained per resource ledger
/// (cancelled bookings count — they stay as history).
pub const MAX_ENTRIES_PER_RESOURCE: usize = 100_000;

/// Maximum parties waiting on one resource.
pub const MAX_WAITLIST_PER_RESOURCE: usize = 10_000;

/// Maximum length of a resource name or party identifier.
pub const MAX_NAME_LEN: usize = 256;

/// Maximum length of a block reason.
pub const MAX_REASON_LEN: usize = 1_024;
