use crate::models::Metric;
use crate::state::AppState;
use std::collections::BTreeMap;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

pub const ANIMATION_DURATION: Duration = Duration::from_millis(1000);

/// One running interpolation from `start` to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Animation {
    pub start: i64,
    pub target: i64,
    pub started_at: Instant,
    pub duration: Duration,
}

impl Animation {
    pub fn value_at(&self, now: Instant) -> i64 {
        let elapsed = now.saturating_duration_since(self.started_at);
        if elapsed >= self.duration || self.duration.is_zero() {
            return self.target;
        }
        let progress = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let delta = (self.target - self.start) as f64;
        (self.start as f64 + delta * progress).floor() as i64
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= self.duration
    }
}

/// A headline display element: its current text plus at most one
/// animation driving it.
#[derive(Debug, Clone, Default)]
pub struct DisplayCell {
    text: String,
    animation: Option<Animation>,
}

impl DisplayCell {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            animation: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Writes the frame for `now`. Returns `true` while the cell keeps animating.
    pub fn render_frame(&mut self, now: Instant) -> bool {
        let Some(animation) = self.animation else {
            return false;
        };
        self.text = animation.value_at(now).to_string();
        if animation.is_finished(now) {
            self.animation = None;
            return false;
        }
        true
    }
}

/// Starts animating `cell` towards `new_value`. A missing cell is ignored;
/// an animation already running on the cell is superseded.
pub fn animate(cell: Option<&mut DisplayCell>, new_value: i64, now: Instant) {
    let Some(cell) = cell else {
        return;
    };
    cell.animation = Some(Animation {
        start: parse_leading_int(&cell.text),
        target: new_value,
        started_at: now,
        duration: ANIMATION_DURATION,
    });
}

/// Leading integer of `text`, `0` when there is none.
pub fn parse_leading_int(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse::<i64>() {
        Ok(value) if negative => -value,
        Ok(value) => value,
        Err(_) => 0,
    }
}

/// The set of mounted headline cells. Metrics left out of the
/// configuration simply have no cell.
#[derive(Debug, Clone, Default)]
pub struct Board {
    cells: BTreeMap<Metric, DisplayCell>,
}

impl Board {
    pub fn new(metrics: &[Metric]) -> Self {
        let cells = metrics
            .iter()
            .map(|metric| (*metric, DisplayCell::with_text("0")))
            .collect();
        Self { cells }
    }

    pub fn cell(&self, metric: Metric) -> Option<&DisplayCell> {
        self.cells.get(&metric)
    }

    pub fn cell_mut(&mut self, metric: Metric) -> Option<&mut DisplayCell> {
        self.cells.get_mut(&metric)
    }

    pub fn cells(&self) -> impl Iterator<Item = (Metric, &DisplayCell)> {
        self.cells.iter().map(|(metric, cell)| (*metric, cell))
    }

    pub fn render_frame(&mut self, now: Instant) -> bool {
        let mut active = false;
        for cell in self.cells.values_mut() {
            active |= cell.render_frame(now);
        }
        active
    }
}

/// Samples every running animation once per frame.
pub fn spawn_frame_driver(state: AppState, frame: Duration) {
    tokio::spawn(async move {
        let mut ticker = time::interval(frame);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let mut dashboard = state.dashboard.lock().await;
            dashboard.board.render_frame(Instant::now());
        }
    });
}
