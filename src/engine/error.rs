use ulid::Ulid;

/// Engine failures. Business-rule rejections (blocked, schedule conflict,
/// full) are `Decision` values, not errors — everything here is either a
/// caller error, a state-consistency error, or a broken internal assumption.
#[derive(Debug)]
pub enum EngineError {
    /// Malformed candidate window — caller error, never retried internally.
    InvalidWindow(&'static str),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Second cancel of the same booking. Deliberately not a silent no-op.
    AlreadyCancelled(Ulid),
    AlreadyWaitlisted(String),
    UnknownParty(String),
    /// A defensive double-check failed: the per-resource write serialization
    /// discipline was bypassed. Fatal to the operation; worth alerting on.
    InvariantViolation(&'static str),
    LimitExceeded(&'static str),
    Store(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidWindow(msg) => write!(f, "invalid window: {msg}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::AlreadyCancelled(id) => write!(f, "booking already cancelled: {id}"),
            EngineError::AlreadyWaitlisted(party) => {
                write!(f, "party already waitlisted: {party}")
            }
            EngineError::UnknownParty(party) => write!(f, "party not on waitlist: {party}"),
            EngineError::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
