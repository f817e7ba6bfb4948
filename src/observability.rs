use std::net::SocketAddr;

use crate::engine::{Decision, RejectReason};

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: conflict evaluations performed. Labels: outcome.
pub const DECISIONS_TOTAL: &str = "hotdesk_decisions_total";

/// Counter: waitlisted parties promoted to confirmed bookings.
pub const PROMOTIONS_TOTAL: &str = "hotdesk_promotions_total";

/// Counter: notifications the `Notifier` failed to deliver.
pub const NOTIFY_FAILURES_TOTAL: &str = "hotdesk_notify_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: registered resources.
pub const RESOURCES_ACTIVE: &str = "hotdesk_resources_active";

/// Histogram: journal fsync duration in seconds.
pub const JOURNAL_FSYNC_DURATION_SECONDS: &str = "hotdesk_journal_fsync_duration_seconds";

/// Histogram: mutations per journal commit.
pub const JOURNAL_COMMIT_BATCH_SIZE: &str = "hotdesk_journal_commit_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a decision to a short label for metrics.
pub fn decision_label(decision: &Decision) -> &'static str {
    match decision {
        Decision::Accepted => "accepted",
        Decision::Waitlisted => "waitlisted",
        Decision::Rejected(RejectReason::Blocked) => "rejected_blocked",
        Decision::Rejected(RejectReason::ScheduleConflict) => "rejected_conflict",
        Decision::Rejected(RejectReason::Full) => "rejected_full",
    }
}
