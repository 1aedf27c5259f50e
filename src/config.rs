use crate::channel::BackoffPolicy;
use crate::errors::AppError;
use crate::models::Metric;
use std::env;
use tokio::time::Duration;

pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the queue server, without a trailing slash.
    pub server_url: String,
    pub port: u16,
    pub auth_token: Option<String>,
    pub refresh_interval: Option<Duration>,
    pub request_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub max_reconnects: u32,
    pub toast_cap: usize,
    pub metrics: Vec<Metric>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        let server_url = lookup("DASHBOARD_SERVER_URL")
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "http://127.0.0.1:8080".to_string());
        if !["http://", "https://", "ws://", "wss://"]
            .iter()
            .any(|scheme| server_url.starts_with(scheme))
        {
            return Err(AppError::config(format!(
                "DASHBOARD_SERVER_URL must start with http://, https://, ws:// or wss://, got {server_url}"
            )));
        }

        let port = lookup("PORT")
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(8090);

        let refresh_secs = number("DASHBOARD_REFRESH_SECS", 30);
        let refresh_interval = (refresh_secs > 0).then(|| Duration::from_secs(refresh_secs));

        let initial = Duration::from_millis(number("DASHBOARD_BACKOFF_INITIAL_MS", 500).max(1));
        let max = Duration::from_millis(number("DASHBOARD_BACKOFF_MAX_MS", 30_000)).max(initial);

        let metrics = match lookup("DASHBOARD_METRICS") {
            Some(list) => parse_metrics(&list)?,
            None => Metric::ALL.to_vec(),
        };

        Ok(Self {
            server_url,
            port,
            auth_token: lookup("DASHBOARD_AUTH_TOKEN").filter(|token| !token.trim().is_empty()),
            refresh_interval,
            request_timeout: Duration::from_millis(number("DASHBOARD_REQUEST_TIMEOUT_MS", 10_000).max(1)),
            backoff: BackoffPolicy { initial, max },
            max_reconnects: u32::try_from(number("DASHBOARD_MAX_RECONNECTS", 0)).unwrap_or(u32::MAX),
            toast_cap: usize::try_from(number("DASHBOARD_TOAST_CAP", 5)).unwrap_or(usize::MAX).max(1),
            metrics,
        })
    }

    pub fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.server_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.server_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.server_url.clone()
        };
        format!("{base}/ws")
    }

    pub fn stats_url(&self) -> String {
        let base = if let Some(rest) = self.server_url.strip_prefix("wss://") {
            format!("https://{rest}")
        } else if let Some(rest) = self.server_url.strip_prefix("ws://") {
            format!("http://{rest}")
        } else {
            self.server_url.clone()
        };
        format!("{base}/admin/api/stats")
    }
}

fn parse_metrics(list: &str) -> Result<Vec<Metric>, AppError> {
    let mut metrics = Vec::new();
    for key in list.split(',').map(str::trim).filter(|key| !key.is_empty()) {
        let metric = Metric::from_key(key)
            .ok_or_else(|| AppError::config(format!("unknown metric in DASHBOARD_METRICS: {key}")))?;
        if !metrics.contains(&metric) {
            metrics.push(metric);
        }
    }
    Ok(metrics)
}
