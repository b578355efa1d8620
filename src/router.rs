//! Inbound event router.
//!
//! Turns a raw channel message into one typed event, runs it through the
//! funnel state machine under a per-user lock, persists the result and
//! delivers the reply.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::channels::{Channel, InboundPayload, IncomingMessage, OutgoingMessage, delivery};
use crate::config::FunnelLinks;
use crate::error::Error;
use crate::funnel::messages::render;
use crate::funnel::{Keyword, MenuOption, Signal, Subject, decide};
use crate::reminders::ReminderScheduler;
use crate::report::report;
use crate::store::LeadStore;

/// Operator command that returns aggregate stats.
pub const REPORT_COMMAND: &str = "/stats";

/// A classified inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    StartCommand {
        token: Option<String>,
    },
    MenuSelection {
        option_id: String,
        message_ref: Option<String>,
    },
    /// Normalized (trimmed, lowercase) free text.
    FreeText {
        value: String,
    },
    ReportCommand,
}

impl InboundEvent {
    pub fn classify(message: &IncomingMessage) -> Self {
        match &message.payload {
            InboundPayload::Callback { data, message_ref } => Self::MenuSelection {
                option_id: data.clone(),
                message_ref: message_ref.clone(),
            },
            InboundPayload::Text(text) => Self::from_text(text),
        }
    }

    fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };
        // Group chats address commands as `/start@botname`.
        let command = head.split('@').next().unwrap_or(head).to_lowercase();

        match command.as_str() {
            "/start" => Self::StartCommand {
                token: (!rest.is_empty()).then(|| rest.to_string()),
            },
            "start" if rest.is_empty() => Self::StartCommand { token: None },
            REPORT_COMMAND if rest.is_empty() => Self::ReportCommand,
            _ => Self::FreeText {
                value: trimmed.to_lowercase(),
            },
        }
    }

    /// State machine input for this event. Not meaningful for `ReportCommand`.
    fn signal(&self) -> Signal {
        match self {
            Self::StartCommand { token } => Signal::Start {
                token: token.clone(),
            },
            Self::MenuSelection { option_id, .. } => match MenuOption::parse(option_id) {
                Some(option) => Signal::Menu(option),
                None => Signal::Unrecognized,
            },
            Self::FreeText { value } => match Keyword::parse(value) {
                Some(keyword) => Signal::Keyword(keyword),
                None => Signal::Unrecognized,
            },
            Self::ReportCommand => Signal::Unrecognized,
        }
    }
}

/// Dispatches inbound messages through the funnel.
pub struct Router {
    store: Arc<dyn LeadStore>,
    scheduler: Arc<ReminderScheduler>,
    channel: Arc<dyn Channel>,
    links: FunnelLinks,
    operator_id: String,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Router {
    pub fn new(
        store: Arc<dyn LeadStore>,
        scheduler: Arc<ReminderScheduler>,
        channel: Arc<dyn Channel>,
        links: FunnelLinks,
        operator_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            scheduler,
            channel,
            links,
            operator_id: operator_id.into(),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one inbound message end to end.
    ///
    /// Storage errors are returned before anything is sent; the caller
    /// answers with the retry message. Delivery failures are logged only.
    pub async fn handle(&self, message: &IncomingMessage) -> Result<(), Error> {
        let event = InboundEvent::classify(message);
        let user_id = message.user_id.as_str();
        tracing::debug!(user_id, ?event, "Inbound event");

        if event == InboundEvent::ReportCommand {
            let text = report(self.store.as_ref(), user_id, &self.operator_id).await?;
            delivery::send(self.channel.as_ref(), user_id, &OutgoingMessage::text(text)).await;
            return Ok(());
        }

        let lock = self.user_lock(user_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.dispatch(message, &event).await
        };
        drop(lock);
        self.release_lock(user_id).await;
        result
    }

    async fn dispatch(&self, message: &IncomingMessage, event: &InboundEvent) -> Result<(), Error> {
        let user_id = message.user_id.as_str();
        let lead = self.store.get(user_id).await?;

        let decision = decide(
            Subject {
                user_id,
                display_name: message.user_name.as_deref(),
                lead: lead.as_ref(),
            },
            event.signal(),
        );

        if let Some(update) = &decision.update {
            self.store.upsert(update).await?;
            if let Some(stage) = update.stage {
                tracing::info!(user_id, %stage, "Lead stage updated");
            }
        }
        if decision.rearm {
            self.scheduler.arm(user_id).await;
        }

        let outgoing = render(&decision.reply, &self.links);
        match event {
            InboundEvent::MenuSelection { message_ref, .. } => {
                delivery::edit_or_send(
                    self.channel.as_ref(),
                    user_id,
                    message_ref.as_deref(),
                    &outgoing,
                )
                .await;
            }
            _ => {
                delivery::send(self.channel.as_ref(), user_id, &outgoing).await;
            }
        }
        Ok(())
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }

    /// Drop the user's lock entry once nobody else is waiting on it.
    async fn release_lock(&self, user_id: &str) {
        let mut locks = self.user_locks.lock().await;
        if locks
            .get(user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(user_id);
        }
    }
}
