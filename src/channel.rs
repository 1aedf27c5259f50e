//! Client side of the server's `/ws` push channel.

use crate::errors::AppError;
use crate::models::{ChannelMessage, ConnectionState, Severity};
use crate::normalize;
use crate::state::AppState;
use crate::toast::CHANNEL_TOAST_LIFETIME;
use futures::StreamExt;
use rand::Rng;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{self, Duration};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

static NULL_PAYLOAD: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Un-jittered delay before reconnect `attempt` (1-based).
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// Delay in `[ceiling / 2, ceiling]`.
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let ceiling = self.ceiling(attempt).as_millis() as u64;
        let floor = ceiling / 2;
        Duration::from_millis(rng.random_range(floor..=ceiling))
    }
}

/// Decodes one JSON document into a channel message.
pub fn decode_message(text: &str) -> Result<ChannelMessage, AppError> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::decode("channel message has no string `type`"))?;
    let payload = value.get("payload").unwrap_or(&NULL_PAYLOAD);

    let message = match kind {
        "stats_update" => ChannelMessage::StatsUpdate(normalize::snapshot(payload)),
        "ticket_update" => ChannelMessage::TicketUpdate {
            ticket_number: normalize::text(normalize::field(payload, "ticket_number")),
            status: normalize::text(normalize::field(payload, "status")),
        },
        "counter_update" => ChannelMessage::CounterUpdate {
            name: normalize::text(normalize::field(payload, "name")),
            status: normalize::text(normalize::field(payload, "status")),
        },
        other => ChannelMessage::Unknown(other.to_string()),
    };
    Ok(message)
}

/// Handles one text frame and returns how many messages were dispatched.
/// A frame that is not a single document is treated as a batch of
/// newline-separated documents, each decoded on its own.
pub async fn handle_frame(state: &AppState, frame: &str) -> usize {
    if let Ok(message) = decode_message(frame.trim()) {
        state.dispatch(message).await;
        return 1;
    }

    let mut dispatched = 0;
    for line in frame.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match decode_message(line) {
            Ok(message) => {
                state.dispatch(message).await;
                dispatched += 1;
            }
            Err(err) => warn!(error = %err, "dropping undecodable channel message"),
        }
    }
    dispatched
}

enum SessionEnd {
    Disconnected,
    Shutdown,
}

/// Runs the channel until shutdown or until the reconnect limit is hit.
pub async fn run_channel(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let url = state.config.ws_url();
    let policy = state.config.backoff;
    let max_reconnects = state.config.max_reconnects;
    let timeout = state.config.request_timeout;
    let mut attempt: u32 = 0;

    loop {
        if attempt == 0 {
            state.set_connection(ConnectionState::Connecting).await;
        }

        let connected = tokio::select! {
            result = time::timeout(timeout, connect_async(url.as_str())) => result,
            _ = shutdown.changed() => {
                state.set_connection(ConnectionState::Closed).await;
                return;
            }
        };

        let end = match connected {
            Ok(Ok((stream, _response))) => {
                attempt = 0;
                state.set_connection(ConnectionState::Open).await;
                info!(url = %url, "channel open");
                run_session(&state, stream, &mut shutdown).await
            }
            Ok(Err(err)) => {
                warn!(url = %url, error = %err, "channel connect failed");
                SessionEnd::Disconnected
            }
            Err(_) => {
                warn!(url = %url, ?timeout, "channel connect timed out");
                SessionEnd::Disconnected
            }
        };

        if matches!(end, SessionEnd::Shutdown) || *shutdown.borrow() {
            state.set_connection(ConnectionState::Closed).await;
            return;
        }

        attempt = attempt.saturating_add(1);
        if max_reconnects > 0 && attempt > max_reconnects {
            warn!(attempts = attempt - 1, "giving up on channel");
            state.set_connection(ConnectionState::Closed).await;
            return;
        }

        let backoff = policy.delay(attempt, &mut rand::rng());
        let previous = state
            .set_connection(ConnectionState::Reconnecting {
                attempt,
                backoff_ms: backoff.as_millis() as u64,
            })
            .await;
        if previous.is_open() {
            state
                .notify(
                    "Connection lost, reconnecting",
                    Severity::Warning,
                    CHANNEL_TOAST_LIFETIME,
                )
                .await;
        }

        tokio::select! {
            _ = time::sleep(backoff) => {}
            _ = shutdown.changed() => {
                state.set_connection(ConnectionState::Closed).await;
                return;
            }
        }
    }
}

async fn run_session<S>(
    state: &AppState,
    stream: S,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let mut stream = stream;
    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            _ = shutdown.changed() => return SessionEnd::Shutdown,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                handle_frame(state, &text).await;
            }
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => {
                    handle_frame(state, &text).await;
                }
                Err(err) => warn!(error = %err, "dropping non-UTF-8 channel frame"),
            },
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "channel closed by server");
                return SessionEnd::Disconnected;
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                warn!(error = %err, "channel read failed");
                return SessionEnd::Disconnected;
            }
            None => return SessionEnd::Disconnected,
        }
    }
}
