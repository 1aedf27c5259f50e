use crate::animation::Board;
use crate::config::Config;
use crate::models::{
    CellView, ChannelMessage, ConnectionState, DashboardView, Severity, StatsSnapshot,
};
use crate::stats::apply_snapshot;
use crate::toast::{CHANNEL_TOAST_LIFETIME, ToastQueue};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

/// The dashboard's view model: everything the page shows.
#[derive(Debug)]
pub struct Dashboard {
    pub board: Board,
    pub toasts: ToastQueue,
    pub connection: ConnectionState,
    pub snapshot: StatsSnapshot,
    pub last_snapshot_at: Option<DateTime<Local>>,
    pub(crate) pulls_issued: u64,
    pub(crate) last_pull_applied: u64,
}

impl Dashboard {
    pub fn new(config: &Config) -> Self {
        Self {
            board: Board::new(&config.metrics),
            toasts: ToastQueue::new(config.toast_cap),
            connection: ConnectionState::Connecting,
            snapshot: StatsSnapshot::default(),
            last_snapshot_at: None,
            pulls_issued: 0,
            last_pull_applied: 0,
        }
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            connection: self.connection,
            stale: !self.connection.is_open(),
            cells: self
                .board
                .cells()
                .map(|(metric, cell)| CellView {
                    metric,
                    label: metric.label(),
                    text: cell.text().to_string(),
                    animating: cell.is_animating(),
                })
                .collect(),
            paused_counters: self.snapshot.paused_counters,
            avg_wait_time: self.snapshot.avg_wait_time,
            avg_service_time: self.snapshot.avg_service_time,
            tickets_by_status: self.snapshot.tickets_by_status.clone(),
            queue_length_by_category: self.snapshot.queue_length_by_category.clone(),
            hourly_distribution: self.snapshot.hourly_distribution.clone(),
            toasts: self.toasts.views(),
            last_snapshot_at: self.last_snapshot_at,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dashboard: Arc<Mutex<Dashboard>>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let dashboard = Dashboard::new(&config);
        Ok(Self {
            config: Arc::new(config),
            dashboard: Arc::new(Mutex::new(dashboard)),
            http,
        })
    }

    /// Shows a toast and schedules its removal after `lifetime`.
    pub async fn notify(
        &self,
        message: impl Into<String>,
        severity: Severity,
        lifetime: Duration,
    ) -> u64 {
        let id = self.dashboard.lock().await.toasts.push(message, severity, lifetime);
        let dashboard = Arc::clone(&self.dashboard);
        tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            dashboard.lock().await.toasts.remove(id);
        });
        id
    }

    pub async fn dispatch(&self, message: ChannelMessage) {
        match message {
            ChannelMessage::StatsUpdate(snapshot) => {
                let mut dashboard = self.dashboard.lock().await;
                apply_snapshot(&mut dashboard, &snapshot, Instant::now());
            }
            ChannelMessage::TicketUpdate { ticket_number, status } => {
                self.notify(
                    format!("Ticket {ticket_number} - {status}"),
                    Severity::Info,
                    CHANNEL_TOAST_LIFETIME,
                )
                .await;
            }
            ChannelMessage::CounterUpdate { name, status } => {
                self.notify(
                    format!("Counter {name} - {status}"),
                    Severity::Info,
                    CHANNEL_TOAST_LIFETIME,
                )
                .await;
            }
            ChannelMessage::Unknown(kind) => {
                debug!(kind = %kind, "ignoring channel message");
            }
        }
    }

    /// Records a connection transition; returns the previous state.
    pub async fn set_connection(&self, next: ConnectionState) -> ConnectionState {
        let mut dashboard = self.dashboard.lock().await;
        let previous = dashboard.connection;
        if previous != next {
            info!(?previous, ?next, "channel state changed");
        }
        dashboard.connection = next;
        previous
    }

    pub async fn view(&self) -> DashboardView {
        self.dashboard.lock().await.view()
    }
}
