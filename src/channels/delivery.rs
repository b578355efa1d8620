//! Outbound delivery with explicit edit-or-send fallback.

use crate::channels::{Channel, OutgoingMessage};

/// How a message ended up reaching (or not reaching) the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The referenced message was edited in place.
    Edited,
    /// A new message was sent.
    SentFresh,
    /// Nothing could be delivered.
    Dropped,
}

/// Send a new message. Failures are logged and reported as `Dropped`.
pub async fn send(channel: &dyn Channel, user_id: &str, message: &OutgoingMessage) -> DeliveryOutcome {
    match channel.send(user_id, message).await {
        Ok(()) => {
            tracing::debug!(user_id, channel = channel.name(), "Message sent");
            DeliveryOutcome::SentFresh
        }
        Err(e) => {
            tracing::warn!(user_id, channel = channel.name(), "Message dropped: {e}");
            DeliveryOutcome::Dropped
        }
    }
}

/// Edit the referenced message if there is one, else send fresh.
///
/// An edit failure (message gone, too old, unchanged) falls back to a fresh
/// send. A failed fresh send is logged and dropped.
pub async fn edit_or_send(
    channel: &dyn Channel,
    user_id: &str,
    message_ref: Option<&str>,
    message: &OutgoingMessage,
) -> DeliveryOutcome {
    if let Some(message_ref) = message_ref {
        match channel.edit(user_id, message_ref, message).await {
            Ok(()) => {
                tracing::debug!(user_id, message_ref, "Message edited");
                return DeliveryOutcome::Edited;
            }
            Err(e) => {
                tracing::info!(user_id, message_ref, "Edit failed, sending fresh: {e}");
            }
        }
    }
    send(channel, user_id, message).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::channels::MessageStream;
    use crate::error::ChannelError;

    #[derive(Default)]
    struct FlakyChannel {
        edit_ok: bool,
        send_ok: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl Channel for FlakyChannel {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn send(&self, _user_id: &str, _message: &OutgoingMessage) -> Result<(), ChannelError> {
            self.calls.lock().unwrap().push("send");
            if self.send_ok {
                Ok(())
            } else {
                Err(ChannelError::SendFailed {
                    name: "flaky".into(),
                    reason: "offline".into(),
                })
            }
        }

        async fn edit(
            &self,
            _user_id: &str,
            _message_ref: &str,
            _message: &OutgoingMessage,
        ) -> Result<(), ChannelError> {
            self.calls.lock().unwrap().push("edit");
            if self.edit_ok {
                Ok(())
            } else {
                Err(ChannelError::EditFailed {
                    name: "flaky".into(),
                    reason: "message not found".into(),
                })
            }
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn msg() -> OutgoingMessage {
        OutgoingMessage::text("hi")
    }

    #[tokio::test]
    async fn edits_when_possible() {
        let ch = FlakyChannel {
            edit_ok: true,
            send_ok: true,
            ..Default::default()
        };
        let outcome = edit_or_send(&ch, "1", Some("10"), &msg()).await;
        assert_eq!(outcome, DeliveryOutcome::Edited);
        assert_eq!(*ch.calls.lock().unwrap(), vec!["edit"]);
    }

    #[tokio::test]
    async fn falls_back_to_send_on_edit_failure() {
        let ch = FlakyChannel {
            edit_ok: false,
            send_ok: true,
            ..Default::default()
        };
        let outcome = edit_or_send(&ch, "1", Some("10"), &msg()).await;
        assert_eq!(outcome, DeliveryOutcome::SentFresh);
        assert_eq!(*ch.calls.lock().unwrap(), vec!["edit", "send"]);
    }

    #[tokio::test]
    async fn no_reference_sends_directly() {
        let ch = FlakyChannel {
            send_ok: true,
            ..Default::default()
        };
        let outcome = edit_or_send(&ch, "1", None, &msg()).await;
        assert_eq!(outcome, DeliveryOutcome::SentFresh);
        assert_eq!(*ch.calls.lock().unwrap(), vec!["send"]);
    }

    #[tokio::test]
    async fn both_failing_is_dropped() {
        let ch = FlakyChannel::default();
        let outcome = edit_or_send(&ch, "1", Some("10"), &msg()).await;
        assert_eq!(outcome, DeliveryOutcome::Dropped);
    }
}
