//! CLI channel — stdin/stdout REPL for local testing.
//!
//! Lines starting with `:` press a button (`:st50`); everything else is sent
//! as typed text, commands included.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{ButtonAction, Channel, IncomingMessage, MessageStream, OutgoingMessage};
use crate::error::ChannelError;

/// User id for the single local user.
const LOCAL_USER: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel {
    user_id: String,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            user_id: LOCAL_USER.to_string(),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let user_id = self.user_id.clone();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            // Print prompt
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(msg) = parse_line(&user_id, &line) else {
                            eprint!("> ");
                            continue;
                        };
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, _user_id: &str, message: &OutgoingMessage) -> Result<(), ChannelError> {
        println!("\n{}\n", format_message(message));
        eprint!("> ");
        Ok(())
    }

    async fn edit(
        &self,
        user_id: &str,
        _message_ref: &str,
        message: &OutgoingMessage,
    ) -> Result<(), ChannelError> {
        // A terminal can't rewrite earlier output; print it again.
        self.send(user_id, message).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

fn parse_line(user_id: &str, line: &str) -> Option<IncomingMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.strip_prefix(':') {
        Some(option_id) if !option_id.trim().is_empty() => Some(IncomingMessage::callback(
            "cli",
            user_id,
            option_id.trim(),
            None,
        )),
        _ => Some(IncomingMessage::text("cli", user_id, line)),
    }
}

fn format_message(message: &OutgoingMessage) -> String {
    let mut out = message.text.clone();
    for row in message.buttons.iter().flatten() {
        let cells: Vec<String> = row
            .iter()
            .map(|button| match &button.action {
                ButtonAction::Callback(id) => format!("[{}] :{id}", button.label),
                ButtonAction::Url(url) => format!("[{}] {url}", button.label),
            })
            .collect();
        out.push('\n');
        out.push_str(&cells.join("   "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{Button, InboundPayload};

    #[test]
    fn colon_prefix_is_a_button_press() {
        let msg = parse_line("u", "  :st500 ").unwrap();
        assert_eq!(
            msg.payload,
            InboundPayload::Callback {
                data: "st500".into(),
                message_ref: None
            }
        );
        assert_eq!(msg.user_id, "u");
    }

    #[test]
    fn other_lines_are_text() {
        let msg = parse_line("u", "/start meta").unwrap();
        assert_eq!(msg.payload, InboundPayload::Text("/start meta".into()));
        assert_eq!(
            parse_line("u", ":").unwrap().payload,
            InboundPayload::Text(":".into())
        );
        assert!(parse_line("u", "   ").is_none());
    }

    #[test]
    fn buttons_are_listed_under_text() {
        let msg = OutgoingMessage::text("Pick one").with_buttons(vec![
            vec![Button::callback("Under $500", "st50")],
            vec![Button::url("Support", "https://t.me/support")],
        ]);
        assert_eq!(
            format_message(&msg),
            "Pick one\n[Under $500] :st50\n[Support] https://t.me/support"
        );
    }

    #[test]
    fn default_user() {
        assert_eq!(CliChannel::new().user_id, LOCAL_USER);
    }
}
