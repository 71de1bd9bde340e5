use serde_derive::{Deserialize, Serialize};

use crate::service::ServiceError;

/// Milliseconds a toast stays on screen before dismissing itself.
pub const DEFAULT_LIFE_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warn,
    Error,
}

/// A fire-and-forget display request, shaped like the toast contract
/// `{ severity, summary, detail, life }`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub life: u64,
}

impl Notification {
    pub fn new(severity: Severity, summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: detail.into(),
            life: DEFAULT_LIFE_MS,
        }
    }

    pub fn created() -> Self {
        Self::new(Severity::Success, "Successful", "License Created")
    }

    pub fn updated() -> Self {
        Self::new(Severity::Success, "Successful", "License Updated")
    }

    pub fn failure(error: &ServiceError) -> Self {
        Self::new(Severity::Error, "Error", error.to_string())
    }

    pub fn with_life(mut self, life_ms: u64) -> Self {
        self.life = life_ms;
        self
    }
}

/// Sink for notifications. Implementations must not block.
pub trait Notifier {
    fn add(&mut self, notification: Notification);
}

impl Notifier for Vec<Notification> {
    fn add(&mut self, notification: Notification) {
        self.push(notification);
    }
}

impl<N: Notifier + ?Sized> Notifier for &mut N {
    fn add(&mut self, notification: Notification) {
        (**self).add(notification);
    }
}

/// Writes notifications to the log instead of a screen.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn add(&mut self, n: Notification) {
        match n.severity {
            Severity::Success | Severity::Info => {
                tracing::info!(summary = %n.summary, life = n.life, "{}", n.detail)
            }
            Severity::Warn => tracing::warn!(summary = %n.summary, life = n.life, "{}", n.detail),
            Severity::Error => tracing::error!(summary = %n.summary, life = n.life, "{}", n.detail),
        }
    }
}
