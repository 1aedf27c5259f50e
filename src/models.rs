use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full statistics payload pushed on `stats_update` or returned by
/// `GET /admin/api/stats`. Always a replacement, never a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_tickets_today: u64,
    pub currently_serving: u64,
    pub waiting_tickets: u64,
    pub active_counters: u64,
    pub paused_counters: u64,
    pub avg_wait_time: u64,
    pub avg_service_time: u64,
    pub tickets_by_status: BTreeMap<String, u64>,
    pub queue_length_by_category: BTreeMap<String, u64>,
    pub hourly_distribution: BTreeMap<u8, u64>,
}

impl StatsSnapshot {
    pub fn headline(&self, metric: Metric) -> u64 {
        match metric {
            Metric::TotalTickets => self.total_tickets_today,
            Metric::CurrentlyServing => self.currently_serving,
            Metric::WaitingTickets => self.waiting_tickets,
            Metric::ActiveCounters => self.active_counters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    StatsUpdate(StatsSnapshot),
    TicketUpdate { ticket_number: String, status: String },
    CounterUpdate { name: String, status: String },
    Unknown(String),
}

/// The four animated headline figures of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalTickets,
    CurrentlyServing,
    WaitingTickets,
    ActiveCounters,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::TotalTickets,
        Metric::CurrentlyServing,
        Metric::WaitingTickets,
        Metric::ActiveCounters,
    ];

    /// Key used in configuration and in the rendered page's `data-*` attributes.
    pub fn key(self) -> &'static str {
        match self {
            Metric::TotalTickets => "total-tickets",
            Metric::CurrentlyServing => "currently-serving",
            Metric::WaitingTickets => "waiting-tickets",
            Metric::ActiveCounters => "active-counters",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::TotalTickets => "Total Tickets",
            Metric::CurrentlyServing => "Currently Serving",
            Metric::WaitingTickets => "Waiting Tickets",
            Metric::ActiveCounters => "Active Counters",
        }
    }

    pub fn from_key(key: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|metric| metric.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting { attempt: u32, backoff_ms: u64 },
    Closed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToastView {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Local>,
    pub lifetime_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellView {
    pub metric: Metric,
    pub label: &'static str,
    pub text: String,
    pub animating: bool,
}

/// Serializable projection of the dashboard served by the mirror.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub connection: ConnectionState,
    pub stale: bool,
    pub cells: Vec<CellView>,
    pub paused_counters: u64,
    pub avg_wait_time: u64,
    pub avg_service_time: u64,
    pub tickets_by_status: BTreeMap<String, u64>,
    pub queue_length_by_category: BTreeMap<String, u64>,
    pub hourly_distribution: BTreeMap<u8, u64>,
    pub toasts: Vec<ToastView>,
    pub last_snapshot_at: Option<DateTime<Local>>,
}

#[derive(Debug, Deserialize)]
pub struct UpstreamError {
    pub error: String,
}
