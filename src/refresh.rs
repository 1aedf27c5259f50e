use crate::errors::AppError;
use crate::models::{Severity, StatsSnapshot, UpstreamError};
use crate::normalize;
use crate::state::AppState;
use crate::stats::apply_snapshot;
use crate::toast::ACTION_TOAST_LIFETIME;
use serde_json::Value;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error};

/// Fetches a snapshot from `GET /admin/api/stats` and applies it, unless a
/// pull issued later has already been applied.
pub async fn refresh_stats(state: &AppState) -> Result<StatsSnapshot, AppError> {
    let seq = {
        let mut dashboard = state.dashboard.lock().await;
        dashboard.pulls_issued += 1;
        dashboard.pulls_issued
    };

    let snapshot = fetch_stats(state).await?;

    let mut dashboard = state.dashboard.lock().await;
    if seq < dashboard.last_pull_applied {
        debug!(seq, applied = dashboard.last_pull_applied, "discarding stale stats response");
        return Ok(snapshot);
    }
    dashboard.last_pull_applied = seq;
    apply_snapshot(&mut dashboard, &snapshot, Instant::now());
    Ok(snapshot)
}

/// Manual refresh: like [`refresh_stats`], but failures are also shown
/// as an error toast.
pub async fn refresh_from_user(state: &AppState) -> Result<StatsSnapshot, AppError> {
    match refresh_stats(state).await {
        Ok(snapshot) => Ok(snapshot),
        Err(err) => {
            state
                .notify(
                    format!("Failed to refresh stats: {}", err.message),
                    Severity::Error,
                    ACTION_TOAST_LIFETIME,
                )
                .await;
            Err(err)
        }
    }
}

pub async fn fetch_stats(state: &AppState) -> Result<StatsSnapshot, AppError> {
    let mut request = state.http.get(state.config.stats_url());
    if let Some(token) = &state.config.auth_token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<UpstreamError>(&body)
            .map(|upstream| upstream.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
        return Err(AppError::bad_gateway(format!(
            "stats request failed with {status}: {message}"
        )));
    }

    let payload: Value = serde_json::from_slice(&body)?;
    Ok(normalize::snapshot(&payload))
}

/// Pulls once right away, then every `period`.
pub fn spawn_refresher(state: AppState, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = refresh_stats(&state).await {
                error!("failed to refresh stats: {err}");
            }
        }
    });
}
