use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct ConnectionView {
    state: String,
}

#[derive(Debug, Deserialize)]
struct CellView {
    metric: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ToastView {
    message: String,
    severity: String,
}

#[derive(Debug, Deserialize)]
struct DashboardView {
    connection: ConnectionView,
    stale: bool,
    cells: Vec<CellView>,
    toasts: Vec<ToastView>,
}

impl DashboardView {
    fn cell(&self, metric: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|cell| cell.metric == metric)
            .map(|cell| cell.text.as_str())
    }
}

#[derive(Clone, Debug)]
enum Push {
    Text(String),
    Drop,
}

#[derive(Clone)]
struct Upstream {
    pushes: broadcast::Sender<Push>,
    stats: Arc<Mutex<(StatusCode, Value)>>,
    connections: Arc<AtomicUsize>,
    stall_stats: Arc<AtomicBool>,
}

impl Upstream {
    fn push(&self, frame: impl Into<String>) {
        let _ = self.pushes.send(Push::Text(frame.into()));
    }

    fn drop_connections(&self) {
        let _ = self.pushes.send(Push::Drop);
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(upstream): State<Upstream>) -> impl IntoResponse {
    let rx = upstream.pushes.subscribe();
    upstream.connections.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| forward(socket, rx))
}

async fn forward(mut socket: WebSocket, mut rx: broadcast::Receiver<Push>) {
    while let Ok(push) = rx.recv().await {
        match push {
            Push::Text(text) => {
                if socket.send(Message::Text(text)).await.is_err() {
                    return;
                }
            }
            Push::Drop => {
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        }
    }
}

async fn stats_handler(State(upstream): State<Upstream>) -> impl IntoResponse {
    if upstream.stall_stats.load(Ordering::SeqCst) {
        sleep(Duration::from_secs(60)).await;
    }
    let (status, body) = upstream.stats.lock().await.clone();
    (status, Json(body))
}

async fn spawn_upstream() -> (Upstream, String) {
    let (pushes, _) = broadcast::channel(64);
    let upstream = Upstream {
        pushes,
        stats: Arc::new(Mutex::new((
            StatusCode::OK,
            json!({"total_tickets_today": 1, "currently_serving": 0, "waiting_tickets": 1, "active_counters": 1}),
        ))),
        connections: Arc::new(AtomicUsize::new(0)),
        stall_stats: Arc::new(AtomicBool::new(false)),
    };
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/admin/api/stats", get(stats_handler))
        .with_state(upstream.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (upstream, format!("http://{addr}"))
}

struct TestDashboard {
    base_url: String,
    child: Child,
}

impl Drop for TestDashboard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(unix)]
mod cleanup {
    use once_cell::sync::Lazy;
    use std::sync::{Mutex, Once};

    static REGISTER: Once = Once::new();
    static PIDS: Lazy<Mutex<Vec<i32>>> = Lazy::new(|| Mutex::new(Vec::new()));

    pub fn register(pid: u32) {
        if let Ok(mut pids) = PIDS.lock() {
            pids.push(pid as i32);
        }
        REGISTER.call_once(|| unsafe {
            libc::atexit(on_exit);
        });
    }

    extern "C" fn on_exit() {
        if let Ok(pids) = PIDS.lock() {
            for pid in pids.iter().filter(|pid| **pid > 0) {
                unsafe {
                    libc::kill(*pid, libc::SIGTERM);
                }
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn fetch_view(client: &Client, base_url: &str) -> Option<DashboardView> {
    let resp = client.get(format!("{base_url}/api/view")).send().await.ok()?;
    if !resp.status().is_success() {
        return None;
    }
    resp.json().await.ok()
}

async fn wait_for<F>(client: &Client, base_url: &str, what: &str, mut check: F) -> DashboardView
where
    F: FnMut(&DashboardView) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(8);
    loop {
        if let Some(view) = fetch_view(client, base_url).await {
            if check(&view) {
                return view;
            }
        }
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        sleep(Duration::from_millis(50)).await;
    }
}

async fn spawn_dashboard(upstream_url: &str) -> TestDashboard {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_queue_dashboard"))
        .env("PORT", port.to_string())
        .env("DASHBOARD_SERVER_URL", upstream_url)
        .env("DASHBOARD_REFRESH_SECS", "0")
        .env("DASHBOARD_BACKOFF_INITIAL_MS", "100")
        .env("DASHBOARD_BACKOFF_MAX_MS", "400")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn dashboard");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    let client = Client::new();
    wait_for(&client, &base_url, "channel to open", |view| {
        view.connection.state == "open"
    })
    .await;

    TestDashboard { base_url, child }
}

#[tokio::test(flavor = "multi_thread")]
async fn stats_push_animates_headlines() {
    let (upstream, upstream_url) = spawn_upstream().await;
    let dashboard = spawn_dashboard(&upstream_url).await;
    let client = Client::new();

    upstream.push(
        r#"{"type":"stats_update","payload":{"TotalTicketsToday":12,"CurrentlyServing":2,"WaitingTickets":5,"ActiveCounters":3}}"#,
    );

    let view = wait_for(&client, &dashboard.base_url, "headlines to settle", |view| {
        view.cell("total_tickets") == Some("12")
            && view.cell("currently_serving") == Some("2")
            && view.cell("waiting_tickets") == Some("5")
            && view.cell("active_counters") == Some("3")
    })
    .await;
    assert!(!view.stale);
}

#[tokio::test(flavor = "multi_thread")]
async fn ticket_update_shows_transient_toast() {
    let (upstream, upstream_url) = spawn_upstream().await;
    let dashboard = spawn_dashboard(&upstream_url).await;
    let client = Client::new();

    let pushed_at = Instant::now();
    upstream.push(r#"{"type":"ticket_update","payload":{"ticket_number":"A102","status":"serving"}}"#);

    let view = wait_for(&client, &dashboard.base_url, "ticket toast", |view| {
        view.toasts.iter().any(|toast| toast.message == "Ticket A102 - serving")
    })
    .await;
    assert_eq!(view.toasts[0].severity, "info");

    wait_for(&client, &dashboard.base_url, "ticket toast removal", |view| {
        view.toasts.is_empty()
    })
    .await;
    let elapsed = pushed_at.elapsed();
    assert!(elapsed >= Duration::from_millis(2900), "removed too early: {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(3600), "removed too late: {elapsed:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_frame_is_skipped() {
    let (upstream, upstream_url) = spawn_upstream().await;
    let dashboard = spawn_dashboard(&upstream_url).await;
    let client = Client::new();

    upstream.push("{this is not json");
    upstream.push(r#"{"type":"display_update","payload":{}}"#);
    upstream.push(r#"{"type":"counter_update","payload":{"name":"Loket 1","status":"active"}}"#);

    let view = wait_for(&client, &dashboard.base_url, "counter toast", |view| {
        !view.toasts.is_empty()
    })
    .await;
    assert_eq!(view.toasts.len(), 1);
    assert_eq!(view.toasts[0].message, "Counter Loket 1 - active");
    assert_eq!(view.connection.state, "open");
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnects_after_server_drops_channel() {
    let (upstream, upstream_url) = spawn_upstream().await;
    let dashboard = spawn_dashboard(&upstream_url).await;
    let client = Client::new();

    upstream.drop_connections();

    wait_for(&client, &dashboard.base_url, "reconnect", |_| {
        upstream.connections.load(Ordering::SeqCst) >= 2
    })
    .await;
    let view = wait_for(&client, &dashboard.base_url, "channel to reopen", |view| {
        view.connection.state == "open"
    })
    .await;
    assert!(!view.stale);
    assert!(view.toasts.iter().any(|toast| toast.severity == "warning"));

    upstream.push(r#"{"type":"ticket_update","payload":{"ticket_number":"C9","status":"called"}}"#);
    wait_for(&client, &dashboard.base_url, "toast after reconnect", |view| {
        view.toasts.iter().any(|toast| toast.message == "Ticket C9 - called")
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn manual_refresh_pulls_snapshot() {
    let (upstream, upstream_url) = spawn_upstream().await;
    let dashboard = spawn_dashboard(&upstream_url).await;
    let client = Client::new();

    *upstream.stats.lock().await = (
        StatusCode::OK,
        json!({"TotalTicketsToday": 30, "WaitingTickets": {"Int64": 8, "Valid": true}}),
    );
    let response = client
        .post(format!("{}/api/refresh", dashboard.base_url))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    wait_for(&client, &dashboard.base_url, "pulled values", |view| {
        view.cell("total_tickets") == Some("30")
            && view.cell("waiting_tickets") == Some("8")
            && view.cell("active_counters") == Some("0")
    })
    .await;

    *upstream.stats.lock().await = (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "Failed to get stats"}),
    );
    let response = client
        .post(format!("{}/api/refresh", dashboard.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    assert!(response.text().await.unwrap().contains("Failed to get stats"));
}

#[tokio::test(flavor = "multi_thread")]
async fn stalled_stats_pull_does_not_delay_channel() {
    let (upstream, upstream_url) = spawn_upstream().await;
    upstream.stall_stats.store(true, Ordering::SeqCst);

    let started = Instant::now();
    let dashboard = spawn_dashboard(&upstream_url).await;
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "channel opened only after {:?}",
        started.elapsed()
    );

    upstream.push(r#"{"type":"counter_update","payload":{"name":"Loket 3","status":"active"}}"#);
    let client = Client::new();
    wait_for(&client, &dashboard.base_url, "toast while pull is stalled", |view| {
        view.toasts.iter().any(|toast| toast.message == "Counter Loket 3 - active")
    })
    .await;
}
