//! Non-blocking notifications raised by failed module loads.

use bizdash_cache::{DiagnosticSink, LoadDiagnostic};
use bizdash_core::{DashboardError, ModuleKey};
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// The server answered but refused or flagged the request.
    Warning,
    /// The request did not produce usable data.
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        write!(f, "{}", value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationAction {
    Retry(ModuleKey),
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub action: Option<NotificationAction>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            action: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn from_diagnostic(diagnostic: &LoadDiagnostic) -> Self {
        let level = match diagnostic.error {
            DashboardError::FetchLogical { .. } => NotificationLevel::Warning,
            _ => NotificationLevel::Error,
        };
        let message = format!(
            "Could not load {}: {}. Showing empty data.",
            diagnostic.key.title(),
            diagnostic.error
        );
        let mut notification =
            Self::new(level, message).with_action(NotificationAction::Retry(diagnostic.key));
        notification.created_at = diagnostic.at;
        notification
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)?;
        if let Some(NotificationAction::Retry(key)) = &self.action {
            write!(f, " (retry: view {})", key)?;
        }
        Ok(())
    }
}

/// Diagnostic sink that turns each failed load into a [`Notification`].
///
/// Sending never blocks; if the receiving side is gone the notification is
/// dropped and only the log line remains.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    sender: mpsc::UnboundedSender<Notification>,
}

impl NotificationSink {
    pub fn channel() -> (Self, NotificationInbox) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, NotificationInbox { receiver })
    }

    pub fn notify(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            tracing::debug!("Notification inbox closed, dropping notification");
        }
    }
}

impl DiagnosticSink for NotificationSink {
    fn record(&self, diagnostic: &LoadDiagnostic) {
        tracing::warn!(
            module = %diagnostic.key,
            code = diagnostic.error.code(),
            attempt = diagnostic.attempt,
            waiters = diagnostic.waiters,
            error = %diagnostic.error,
            "Module load failed, serving fallback"
        );
        self.notify(Notification::from_diagnostic(diagnostic));
    }
}

/// Receiving end of a [`NotificationSink`].
#[derive(Debug)]
pub struct NotificationInbox {
    receiver: mpsc::UnboundedReceiver<Notification>,
}

impl NotificationInbox {
    /// Take every notification raised so far without waiting.
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Ok(notification) = self.receiver.try_recv() {
            drained.push(notification);
        }
        drained
    }
}
