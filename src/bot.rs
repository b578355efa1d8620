//! Bot main loop — reads the channel stream and dispatches each event on its
//! own task.

use std::sync::Arc;

use futures::StreamExt;

use crate::channels::{Channel, IncomingMessage, OutgoingMessage, delivery};
use crate::error::Error;
use crate::funnel::messages::RETRY_MESSAGE;
use crate::router::Router;

/// The running bot.
pub struct Bot {
    channel: Arc<dyn Channel>,
    router: Arc<Router>,
}

impl Bot {
    pub fn new(channel: Arc<dyn Channel>, router: Arc<Router>) -> Self {
        Self { channel, router }
    }

    /// Serve until Ctrl+C or the channel stream ends.
    pub async fn run(self) -> Result<(), Error> {
        let mut message_stream = self.channel.start().await?;

        tracing::info!(channel = self.channel.name(), "Bot ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("Channel stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            let router = Arc::clone(&self.router);
            let channel = Arc::clone(&self.channel);
            tokio::spawn(async move {
                process(&router, channel.as_ref(), &message).await;
            });
        }

        self.channel.shutdown().await?;
        Ok(())
    }
}

/// Handle one message; on failure tell the user to retry.
pub async fn process(router: &Router, channel: &dyn Channel, message: &IncomingMessage) {
    if let Err(e) = router.handle(message).await {
        tracing::error!(user_id = %message.user_id, "Error handling message: {e}");
        delivery::send(channel, &message.user_id, &OutgoingMessage::text(RETRY_MESSAGE)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::channels::MessageStream;
    use crate::config::{FunnelLinks, ReminderDelays};
    use crate::error::{ChannelError, DatabaseError};
    use crate::reminders::ReminderScheduler;
    use crate::store::{Lead, LeadField, LeadStore, LeadUpdate};

    /// Store whose every call fails.
    struct DownStore;

    fn down() -> DatabaseError {
        DatabaseError::Pool("unavailable".into())
    }

    #[async_trait]
    impl LeadStore for DownStore {
        async fn init_schema(&self) -> Result<(), DatabaseError> {
            Err(down())
        }
        async fn upsert(&self, _update: &LeadUpdate) -> Result<(), DatabaseError> {
            Err(down())
        }
        async fn get(&self, _user_id: &str) -> Result<Option<Lead>, DatabaseError> {
            Err(down())
        }
        async fn count_all(&self) -> Result<u64, DatabaseError> {
            Err(down())
        }
        async fn count_by(&self, _field: LeadField) -> Result<BTreeMap<String, u64>, DatabaseError> {
            Err(down())
        }
        async fn list_started_since(&self, _cutoff: DateTime<Utc>) -> Result<Vec<Lead>, DatabaseError> {
            Err(down())
        }
        async fn insert_if_absent(&self, _lead: &Lead) -> Result<bool, DatabaseError> {
            Err(down())
        }
    }

    #[derive(Default)]
    struct RecordingChannel {
        sent: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }
        async fn start(&self) -> Result<MessageStream, ChannelError> {
            Ok(Box::pin(futures::stream::empty()))
        }
        async fn send(&self, _user_id: &str, message: &OutgoingMessage) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(message.text.clone());
            Ok(())
        }
        async fn edit(
            &self,
            user_id: &str,
            _message_ref: &str,
            message: &OutgoingMessage,
        ) -> Result<(), ChannelError> {
            self.send(user_id, message).await
        }
        async fn health_check(&self) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn shutdown(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn router(store: Arc<dyn LeadStore>, channel: Arc<RecordingChannel>) -> Router {
        let scheduler = Arc::new(ReminderScheduler::new(
            store.clone(),
            channel.clone(),
            ReminderDelays::default(),
            FunnelLinks::default(),
        ));
        Router::new(store, scheduler, channel, FunnelLinks::default(), "op")
    }

    #[tokio::test]
    async fn storage_failure_sends_retry_message() {
        let channel = Arc::new(RecordingChannel::default());
        let router = router(Arc::new(DownStore), channel.clone());

        let msg = IncomingMessage::text("recording", "42", "/start meta");
        process(&router, channel.as_ref(), &msg).await;

        assert_eq!(*channel.sent.lock().unwrap(), vec![RETRY_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn run_stops_when_stream_ends() {
        let channel = Arc::new(RecordingChannel::default());
        let router = Arc::new(router(Arc::new(DownStore), channel.clone()));
        Bot::new(channel, router).run().await.unwrap();
    }
}
