use crate::animation::animate;
use crate::models::{Metric, StatsSnapshot};
use crate::state::Dashboard;
use chrono::Local;
use tokio::time::Instant;
use tracing::debug;

/// Applies a full snapshot to the dashboard. Safe to call repeatedly and
/// from both the push and the pull path.
pub fn apply_snapshot(dashboard: &mut Dashboard, snapshot: &StatsSnapshot, now: Instant) {
    if snapshot.currently_serving > snapshot.active_counters {
        debug!(
            serving = snapshot.currently_serving,
            active = snapshot.active_counters,
            "snapshot reports more tickets serving than active counters"
        );
    }

    for metric in Metric::ALL {
        let value = i64::try_from(snapshot.headline(metric)).unwrap_or(i64::MAX);
        animate(dashboard.board.cell_mut(metric), value, now);
    }

    dashboard.snapshot = snapshot.clone();
    dashboard.last_snapshot_at = Some(Local::now());
}
