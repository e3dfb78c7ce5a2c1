use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::events::{ChatMode, MessageContent, MessageId, MessageRole};
use crate::session::{ChatSession, Dispatch, RenderSurface, SessionEvent};
use crate::transport::MessageSender;

/// A single non-interactive request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OneShot {
    Send(String),
    Clear,
    ToggleMode,
}

/// Render surface that prints finished messages instead of drawing them
#[derive(Debug, Default)]
struct PrintSurface {
    next_id: u64,
    printed: Vec<(MessageRole, String)>,
}

impl RenderSurface for PrintSurface {
    fn append_message(&mut self, role: MessageRole, content: MessageContent) -> MessageId {
        self.next_id += 1;
        match (role, &content) {
            (_, MessageContent::Pending) | (MessageRole::User, _) => {}
            (MessageRole::Error, _) => {
                let text = content.plain_text();
                eprintln!("❌ {}", text);
                self.printed.push((role, text));
            }
            _ => {
                let text = content.plain_text();
                println!("{}", text);
                self.printed.push((role, text));
            }
        }
        MessageId(self.next_id)
    }

    fn remove_message(&mut self, _id: MessageId) {}

    fn clear_all(&mut self) {}

    fn set_active_mode(&mut self, mode: ChatMode) {
        tracing::debug!(%mode, "active mode");
    }
}

/// Run one request through a session and print the outcome. Returns whether
/// the backend accepted it.
pub async fn run_once(sender: &dyn MessageSender, mode: ChatMode, request: OneShot) -> Result<bool> {
    let mut session = ChatSession::new(PrintSurface::default(), mode);
    let (event, _) = drive(&mut session, sender, request).await?;
    Ok(matches!(
        event,
        SessionEvent::ReplyReceived { .. }
            | SessionEvent::HistoryCleared
            | SessionEvent::ModeSwitched { .. }
    ))
}

async fn drive(
    session: &mut ChatSession<PrintSurface>,
    sender: &dyn MessageSender,
    request: OneShot,
) -> Result<(SessionEvent, Dispatch)> {
    let dispatch = match request {
        OneShot::Send(text) => match session.submit(&text) {
            Some(dispatch) => dispatch,
            None => bail!("Nothing to send: message is empty"),
        },
        OneShot::Clear => session.reset(),
        OneShot::ToggleMode => session.switch_mode(),
    };

    let outcome = sender.send(dispatch.request.clone()).await;
    let event = session.complete(dispatch.ticket, outcome);
    Ok((event, dispatch))
}

/// Write the effective configuration to disk
pub fn init_config(config: &Config) -> Result<()> {
    let path = config.save().context("Failed to save configuration")?;
    println!("📝 Wrote configuration to {}", path.display());
    println!("   Endpoint: {}", config.endpoint);
    println!("   Default mode: {}", config.default_mode.display_name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChatRequest, ChatResponse, TransportError};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct Fixed(Result<ChatResponse, TransportError>);

    #[async_trait]
    impl MessageSender for Fixed {
        async fn send(&self, _request: ChatRequest) -> Result<ChatResponse, TransportError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn send_prints_formatted_reply() {
        let sender = Fixed(Ok(ChatResponse::reply("Sure:\n- `a`\n- b")));
        let mut session = ChatSession::new(PrintSurface::default(), ChatMode::Native);

        let (event, dispatch) = drive(&mut session, &sender, OneShot::Send(" hi ".into()))
            .await
            .unwrap();

        assert_eq!(dispatch.request, ChatRequest::UserText("hi".into()));
        assert_eq!(event, SessionEvent::ReplyReceived { mode: None });
        assert_eq!(
            session.surface().printed,
            vec![(MessageRole::Assistant, "Sure:\n\n• a\n• b".to_string())]
        );
    }

    #[tokio::test]
    async fn blank_send_is_an_error() {
        let sender = Fixed(Ok(ChatResponse::reply("unused")));
        let err = run_once(&sender, ChatMode::Native, OneShot::Send("   ".into()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("message is empty"));
    }

    #[tokio::test]
    async fn failures_report_unsuccessful() {
        let sender = Fixed(Err(TransportError::Request("offline".into())));
        assert!(!run_once(&sender, ChatMode::Native, OneShot::ToggleMode).await.unwrap());

        let sender = Fixed(Ok(ChatResponse::rejected("nope")));
        assert!(!run_once(&sender, ChatMode::Native, OneShot::Send("hi".into())).await.unwrap());

        let sender = Fixed(Ok(ChatResponse::reply("cleared")));
        assert!(run_once(&sender, ChatMode::Native, OneShot::Clear).await.unwrap());
    }
}
