//! Telegram channel — long-polls the Bot API for updates.
//!
//! Handles text messages and inline-keyboard button presses. The chat id is
//! the user id throughout; button presses carry the id of the message that
//! held the keyboard so replies can edit it in place.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::{
    ButtonAction, ButtonSet, Channel, IncomingMessage, MessageStream, OutgoingMessage,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    async fn call(&self, method: &str, body: &Value) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
    }

    /// Send one chunk (≤4096 chars), optionally with an inline keyboard.
    async fn send_message_chunk(
        &self,
        chat_id: &str,
        text: &str,
        buttons: Option<&ButtonSet>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if let Some(buttons) = buttons {
            body["reply_markup"] = inline_keyboard(buttons);
        }

        let resp = self
            .call("sendMessage", &body)
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage returned {status}: {err}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = self.bot_token.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client
                    .post(api_url(&bot_token, "getUpdates"))
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let results = match update_batch(&data) {
                    Ok(results) => results,
                    Err(reason) => {
                        tracing::warn!("Telegram getUpdates rejected: {reason}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    // Stop the client-side spinner on every button press.
                    if let Some(callback_id) = update
                        .get("callback_query")
                        .and_then(|q| q.get("id"))
                        .and_then(Value::as_str)
                    {
                        let answer = client
                            .post(api_url(&bot_token, "answerCallbackQuery"))
                            .json(&json!({ "callback_query_id": callback_id }))
                            .send()
                            .await;
                        if let Err(e) = answer {
                            tracing::debug!("answerCallbackQuery failed: {e}");
                        }
                    }

                    let Some(incoming) = parse_update(update) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, user_id: &str, message: &OutgoingMessage) -> Result<(), ChannelError> {
        let chunks = split_message(&message.text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            // Keyboard goes on the final chunk so it sits under the whole reply.
            let buttons = if i == last { message.buttons.as_ref() } else { None };
            self.send_message_chunk(user_id, chunk, buttons).await?;
        }
        Ok(())
    }

    async fn edit(
        &self,
        user_id: &str,
        message_ref: &str,
        message: &OutgoingMessage,
    ) -> Result<(), ChannelError> {
        let message_id: i64 = message_ref.parse().map_err(|_| {
            ChannelError::InvalidMessage(format!("not a Telegram message id: {message_ref}"))
        })?;
        if message.text.chars().count() > TELEGRAM_MAX_MESSAGE_LENGTH {
            return Err(ChannelError::EditFailed {
                name: "telegram".into(),
                reason: "text exceeds a single message".into(),
            });
        }

        let mut body = json!({
            "chat_id": user_id,
            "message_id": message_id,
            "text": message.text,
            "disable_web_page_preview": true,
        });
        if let Some(buttons) = &message.buttons {
            body["reply_markup"] = inline_keyboard(buttons);
        }

        let resp = self
            .call("editMessageText", &body)
            .await
            .map_err(|e| ChannelError::EditFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            // A repeated press renders the same content; the message already shows it.
            if is_not_modified(&err) {
                tracing::debug!(user_id, message_ref, "Edit skipped, message unchanged");
                return Ok(());
            }
            return Err(ChannelError::EditFailed {
                name: "telegram".into(),
                reason: format!("editMessageText returned {status}: {err}"),
            });
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(bot_token: &SecretString, method: &str) -> String {
    format!(
        "https://api.telegram.org/bot{}/{method}",
        bot_token.expose_secret()
    )
}

/// Updates carried by a `getUpdates` response, or the API's error text.
fn update_batch(data: &Value) -> Result<&[Value], String> {
    if let Some(results) = data.get("result").and_then(Value::as_array) {
        return Ok(results);
    }
    let code = data.get("error_code").and_then(Value::as_i64).unwrap_or_default();
    let description = data
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("no result in response");
    Err(format!("{code}: {description}"))
}

/// Whether an edit error body says the new content equals the old.
fn is_not_modified(body: &str) -> bool {
    body.contains("message is not modified")
}

/// Convert one update into an inbound message. Updates that carry neither
/// text nor button data are ignored.
fn parse_update(update: &Value) -> Option<IncomingMessage> {
    if let Some(message) = update.get("message") {
        let text = message.get("text").and_then(Value::as_str)?;
        let chat_id = chat_id(message)?;
        let incoming = IncomingMessage::text("telegram", &chat_id, text);
        return Some(with_sender_name(incoming, message.get("from")));
    }

    let query = update.get("callback_query")?;
    let data = query.get("data").and_then(Value::as_str)?;
    let message = query.get("message");
    let chat_id = message
        .and_then(chat_id)
        .or_else(|| query.get("from")?.get("id")?.as_i64().map(|id| id.to_string()))?;
    let message_ref = message
        .and_then(|m| m.get("message_id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string());

    let incoming = IncomingMessage::callback("telegram", &chat_id, data, message_ref.as_deref());
    Some(with_sender_name(incoming, query.get("from")))
}

fn chat_id(message: &Value) -> Option<String> {
    message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
}

/// Display name: first name, else username.
fn with_sender_name(incoming: IncomingMessage, from: Option<&Value>) -> IncomingMessage {
    let name = from.and_then(|f| {
        f.get("first_name")
            .or_else(|| f.get("username"))
            .and_then(Value::as_str)
    });
    match name {
        Some(name) if !name.trim().is_empty() => incoming.with_user_name(name),
        _ => incoming,
    }
}

/// Render button rows as a Telegram inline keyboard.
fn inline_keyboard(buttons: &ButtonSet) -> Value {
    let rows: Vec<Vec<Value>> = buttons
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match &button.action {
                    ButtonAction::Callback(id) => json!({ "text": button.label, "callback_data": id }),
                    ButtonAction::Url(url) => json!({ "text": button.label, "url": url }),
                })
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

/// Split a message into chunks of at most `max_len` characters.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        // Byte offset of the first char past the limit.
        let Some((limit, _)) = remaining.char_indices().nth(max_len) else {
            chunks.push(remaining.to_string());
            break;
        };

        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
