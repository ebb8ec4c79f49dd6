//! Migration metrics
//!
//! Recorded through the `metrics` facade; installing a recorder/exporter is
//! left to the embedding process.

use std::time::Duration;

use crate::migration::{Direction, MigrationVersion};

/// Record a migration step that committed
pub fn record_step_success(direction: Direction, duration: Duration) {
    metrics::counter!(
        "cairn_migrations_total",
        "direction" => direction.as_str(),
        "status" => "ok",
    )
    .increment(1);

    metrics::histogram!(
        "cairn_migration_step_duration_seconds",
        "direction" => direction.as_str(),
    )
    .record(duration.as_secs_f64());
}

/// Record a migration step that failed and rolled back
pub fn record_step_error(version: MigrationVersion, direction: Direction, error_type: &str) {
    metrics::counter!(
        "cairn_migrations_total",
        "direction" => direction.as_str(),
        "status" => "error",
    )
    .increment(1);

    metrics::counter!(
        "cairn_migration_errors_total",
        "direction" => direction.as_str(),
        "error_type" => error_type.to_string(),
        "version" => version.to_string(),
    )
    .increment(1);
}

/// Record an index attribute update issued to the external index
pub fn record_index_sync(backend: &str, kind: &str, ok: bool) {
    metrics::counter!(
        "cairn_index_sync_total",
        "backend" => backend.to_string(),
        "kind" => kind.to_string(),
        "status" => if ok { "ok" } else { "error" },
    )
    .increment(1);
}

/// Record how many index updates are still waiting in the outbox
pub fn record_pending_index_updates(count: usize) {
    metrics::gauge!("cairn_index_sync_pending").set(count as f64);
}
