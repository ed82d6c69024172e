//! Outbound notification and message types
//!
//! Breakout alerts go to the notification channel with actionable choices.
//! Action results go to the message channel. Both channels are unbounded so
//! pushing never blocks the tick path.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::types::Action;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub label: String,
    pub action_id: String,
}

impl From<Action> for NotificationAction {
    fn from(action: Action) -> Self {
        Self {
            label: action.label().to_string(),
            action_id: action.id().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Info,
    Error,
}

/// How the host should present a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presentation {
    /// Host applies its usual handling for the message kind
    HostDefault,
    /// Host must not trigger its default error UI
    Suppressed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
    pub presentation: Presentation,
}

impl Message {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Info,
            text: text.into(),
            presentation: Presentation::HostDefault,
        }
    }

    /// Error message that is shown to the user without default host error handling
    pub fn quiet_error(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.into(),
            presentation: Presentation::Suppressed,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }
}

/// Push onto an outbound channel, logging instead of failing when the host has
/// stopped listening
pub(crate) fn push<T>(channel: &UnboundedSender<T>, item: T, channel_name: &'static str) {
    if channel.send(item).is_err() {
        warn!(channel = channel_name, "Outbound channel closed, dropping item");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_quiet_error_suppresses_host_handling() {
        let message = Message::quiet_error("failed");
        assert!(message.is_error());
        assert_eq!(message.presentation, Presentation::Suppressed);
        assert_eq!(Message::info("ok").presentation, Presentation::HostDefault);
    }

    #[test]
    fn test_action_button_from_action() {
        let button = NotificationAction::from(Action::Buy);
        assert_eq!(button.label, "Buy");
        assert_eq!(button.action_id, "buy");
    }

    #[test]
    fn test_push_to_closed_channel_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        drop(rx);
        push(&tx, Message::info("nobody listening"), "messages");
    }
}
