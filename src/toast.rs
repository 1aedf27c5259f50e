use crate::models::{Severity, ToastView};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use tokio::time::Duration;

pub const CHANNEL_TOAST_LIFETIME: Duration = Duration::from_millis(3000);
pub const ACTION_TOAST_LIFETIME: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Local>,
    pub lifetime: Duration,
}

/// Visible notifications, oldest first. Removal is driven by the timer
/// each toast is given when it is shown; the cap only evicts.
#[derive(Debug)]
pub struct ToastQueue {
    toasts: VecDeque<Toast>,
    cap: usize,
    next_id: u64,
}

impl ToastQueue {
    pub fn new(cap: usize) -> Self {
        Self {
            toasts: VecDeque::new(),
            cap: cap.max(1),
            next_id: 1,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity, lifetime: Duration) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        while self.toasts.len() >= self.cap {
            self.toasts.pop_front();
        }
        self.toasts.push_back(Toast {
            id,
            message: message.into(),
            severity,
            created_at: Local::now(),
            lifetime,
        });
        id
    }

    pub fn remove(&mut self, id: u64) -> bool {
        match self.toasts.iter().position(|toast| toast.id == id) {
            Some(index) => self.toasts.remove(index).is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    pub fn views(&self) -> Vec<ToastView> {
        self.toasts
            .iter()
            .map(|toast| ToastView {
                id: toast.id,
                message: toast.message.clone(),
                severity: toast.severity,
                created_at: toast.created_at,
                lifetime_ms: toast.lifetime.as_millis() as u64,
            })
            .collect()
    }
}
