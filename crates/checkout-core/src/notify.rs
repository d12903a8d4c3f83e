//! Notification and Navigation Seams
//!
//! The flow reports to the user through a [`Notifier`] (toasts and alerts)
//! and moves them on through a [`Navigator`]. [`NotificationFeed`] records
//! both, for hosts that hand the feed to a client and for tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User-visible message sink
pub trait Notifier: Send + Sync {
    fn notify_success(&self, message: &str);

    fn notify_failure(&self, message: &str);

    /// Synchronous validation error, shown before anything is sent
    fn alert(&self, message: &str) {
        self.notify_failure(message);
    }
}

/// Post-success navigation trigger
pub trait Navigator: Send + Sync {
    fn go_to(&self, route: &str);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Failure,
    Alert,
}

/// A recorded message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// In-memory notifier and navigator
#[derive(Debug, Default)]
pub struct NotificationFeed {
    notifications: Mutex<Vec<Notification>>,
    routes: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.notifications).clone()
    }

    /// Messages of one level, oldest first
    pub fn messages(&self, level: NotificationLevel) -> Vec<String> {
        lock(&self.notifications)
            .iter()
            .filter(|n| n.level == level)
            .map(|n| n.message.clone())
            .collect()
    }

    /// Every route navigated to, oldest first
    pub fn routes(&self) -> Vec<String> {
        lock(&self.routes).clone()
    }

    fn record(&self, level: NotificationLevel, message: &str) {
        lock(&self.notifications).push(Notification {
            level,
            message: message.to_string(),
            at: Utc::now(),
        });
    }
}

impl Notifier for NotificationFeed {
    fn notify_success(&self, message: &str) {
        tracing::info!(%message, "Checkout notification");
        self.record(NotificationLevel::Success, message);
    }

    fn notify_failure(&self, message: &str) {
        tracing::warn!(%message, "Checkout notification");
        self.record(NotificationLevel::Failure, message);
    }

    fn alert(&self, message: &str) {
        tracing::debug!(%message, "Checkout input rejected");
        self.record(NotificationLevel::Alert, message);
    }
}

impl Navigator for NotificationFeed {
    fn go_to(&self, route: &str) {
        tracing::debug!(%route, "Navigating");
        lock(&self.routes).push(route.to_string());
    }
}
