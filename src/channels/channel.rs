//! Channel trait and the message types that cross it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;

/// Stream of inbound messages produced by a started channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// What the user actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    /// A typed message, commands included.
    Text(String),
    /// A button press. `message_ref` identifies the message holding the button.
    Callback {
        data: String,
        message_ref: Option<String>,
    },
}

/// A message received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    pub channel: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub payload: InboundPayload,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, payload: InboundPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            payload,
            received_at: Utc::now(),
        }
    }

    pub fn text(channel: &str, user_id: &str, text: &str) -> Self {
        Self::new(channel, user_id, InboundPayload::Text(text.to_string()))
    }

    pub fn callback(channel: &str, user_id: &str, data: &str, message_ref: Option<&str>) -> Self {
        Self::new(
            channel,
            user_id,
            InboundPayload::Callback {
                data: data.to_string(),
                message_ref: message_ref.map(str::to_string),
            },
        )
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }
}

/// What pressing a button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Sends the identifier back as a callback.
    Callback(String),
    /// Opens a link.
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn callback(label: &str, id: &str) -> Self {
        Self {
            label: label.to_string(),
            action: ButtonAction::Callback(id.to_string()),
        }
    }

    pub fn url(label: &str, url: &str) -> Self {
        Self {
            label: label.to_string(),
            action: ButtonAction::Url(url.to_string()),
        }
    }
}

/// Rows of buttons.
pub type ButtonSet = Vec<Vec<Button>>;

/// A message to deliver to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub buttons: Option<ButtonSet>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: None,
        }
    }

    pub fn with_buttons(mut self, buttons: ButtonSet) -> Self {
        self.buttons = Some(buttons);
        self
    }
}

/// A two-way messaging channel.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Short channel name used in logs.
    fn name(&self) -> &str;

    /// Start receiving. Inbound messages arrive on the returned stream.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a new message to a user.
    async fn send(&self, user_id: &str, message: &OutgoingMessage) -> Result<(), ChannelError>;

    /// Replace the content of a previously sent message.
    async fn edit(
        &self,
        user_id: &str,
        message_ref: &str,
        message: &OutgoingMessage,
    ) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}
