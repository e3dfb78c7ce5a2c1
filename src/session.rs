//! Conversation session: transcript ownership and the single-flight guard.
//!
//! The session never performs I/O. Every operation that needs the backend
//! returns a [`Dispatch`] describing the request; the caller sends it and
//! feeds the outcome back through [`ChatSession::complete`]. Only the submit
//! channel is guarded by [`SessionState::AwaitingReply`]. Clearing history
//! and toggling the mode are independent channels and are accepted at any
//! time, so their completions may interleave with an outstanding submit.

use crate::events::{ChatMode, Message, MessageContent, MessageId, MessageRole, SessionState};
use crate::transport::{ChatRequest, ChatResponse, Reply, TransportError};

/// Where messages become visible
pub trait RenderSurface {
    fn append_message(&mut self, role: MessageRole, content: MessageContent) -> MessageId;
    /// Removing an id that is no longer present is a no-op.
    fn remove_message(&mut self, id: MessageId);
    fn clear_all(&mut self);
    fn set_active_mode(&mut self, mode: ChatMode);
}

/// Logical request channel a ticket belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Submit,
    ClearHistory,
    ToggleMode,
}

/// Identifies one issued request until its completion is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub id: u64,
    pub channel: Channel,
}

/// A request the caller must hand to the message sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub ticket: Ticket,
    pub request: ChatRequest,
}

/// What applying a completion did to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Assistant reply appended; carries the new mode if the backend sent one
    ReplyReceived { mode: Option<ChatMode> },
    /// Backend answered with an error payload
    ReplyRejected,
    /// The round trip failed
    ReplyFailed,
    HistoryCleared,
    ClearFailed,
    ModeSwitched { mode: Option<ChatMode> },
    ModeSwitchFailed,
    /// Completion for a submit that is not the outstanding one
    Stale,
}

pub struct ChatSession<R: RenderSurface> {
    surface: R,
    transcript: Vec<Message>,
    state: SessionState,
    mode: ChatMode,
    in_flight: Option<Ticket>,
    placeholder: Option<MessageId>,
    next_ticket: u64,
}

impl<R: RenderSurface> ChatSession<R> {
    pub fn new(mut surface: R, mode: ChatMode) -> Self {
        surface.set_active_mode(mode);
        Self {
            surface,
            transcript: Vec::new(),
            state: SessionState::Idle,
            mode,
            in_flight: None,
            placeholder: None,
            next_ticket: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut R {
        &mut self.surface
    }

    /// Queue user text. Returns `None` when the text is blank or a reply is
    /// still pending; in both cases nothing changes.
    pub fn submit(&mut self, text: &str) -> Option<Dispatch> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("ignoring blank submit");
            return None;
        }
        if self.state == SessionState::AwaitingReply {
            tracing::debug!("ignoring submit while a reply is pending");
            return None;
        }

        self.push(MessageRole::User, MessageContent::Plain(text.to_string()));
        self.state = SessionState::AwaitingReply;
        self.placeholder = Some(
            self.surface
                .append_message(MessageRole::Assistant, MessageContent::Pending),
        );

        let ticket = self.issue(Channel::Submit);
        self.in_flight = Some(ticket);
        tracing::debug!(ticket = ticket.id, "submit dispatched");

        Some(Dispatch {
            ticket,
            request: ChatRequest::UserText(text.to_string()),
        })
    }

    /// Ask the backend to forget the conversation.
    pub fn reset(&mut self) -> Dispatch {
        Dispatch {
            ticket: self.issue(Channel::ClearHistory),
            request: ChatRequest::ClearHistory,
        }
    }

    /// Ask the backend to flip between native and langchain mode.
    pub fn switch_mode(&mut self) -> Dispatch {
        Dispatch {
            ticket: self.issue(Channel::ToggleMode),
            request: ChatRequest::ToggleMode,
        }
    }

    /// Append a local system note without contacting the backend.
    pub fn announce(&mut self, text: &str) {
        self.push(MessageRole::System, MessageContent::rich(text));
    }

    /// Apply the outcome of a previously dispatched request.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: Result<ChatResponse, TransportError>,
    ) -> SessionEvent {
        let event = match ticket.channel {
            Channel::Submit => self.complete_submit(ticket, outcome),
            Channel::ClearHistory => self.complete_reset(outcome),
            Channel::ToggleMode => self.complete_switch_mode(outcome),
        };
        tracing::debug!(ticket = ticket.id, ?event, state = ?self.state, "completion applied");
        event
    }

    fn complete_submit(
        &mut self,
        ticket: Ticket,
        outcome: Result<ChatResponse, TransportError>,
    ) -> SessionEvent {
        if self.in_flight != Some(ticket) {
            tracing::warn!(ticket = ticket.id, "dropping completion for unknown submit");
            return SessionEvent::Stale;
        }
        self.in_flight = None;

        if let Some(id) = self.placeholder.take() {
            self.surface.remove_message(id);
        }

        let event = match outcome {
            Ok(response) => match response.into_reply() {
                Reply::Rejected(error) => {
                    self.push(MessageRole::Error, MessageContent::rich(&error));
                    SessionEvent::ReplyRejected
                }
                Reply::Answered { text, mode } => {
                    self.push(MessageRole::Assistant, MessageContent::rich(&text));
                    if let Some(mode) = mode {
                        self.apply_mode(mode);
                    }
                    SessionEvent::ReplyReceived { mode }
                }
            },
            Err(error) => {
                tracing::warn!(%error, "chat request failed");
                self.push(
                    MessageRole::Error,
                    MessageContent::rich(&format!("An error occurred: {error}")),
                );
                SessionEvent::ReplyFailed
            }
        };

        self.state = SessionState::Idle;
        event
    }

    fn complete_reset(&mut self, outcome: Result<ChatResponse, TransportError>) -> SessionEvent {
        // The display is cleared whatever the backend said. The submit guard
        // and any pending placeholder id are left alone.
        self.transcript.clear();
        self.surface.clear_all();

        let failure = match outcome {
            Ok(response) => match response.into_reply() {
                Reply::Rejected(error) => Some(error),
                Reply::Answered { .. } => None,
            },
            Err(error) => {
                tracing::warn!(%error, "clear history request failed");
                Some(error.to_string())
            }
        };

        match failure {
            None => {
                self.push(
                    MessageRole::System,
                    MessageContent::rich("Conversation history cleared."),
                );
                SessionEvent::HistoryCleared
            }
            Some(reason) => {
                self.push(
                    MessageRole::System,
                    MessageContent::rich(&format!("Failed to clear history: {reason}")),
                );
                SessionEvent::ClearFailed
            }
        }
    }

    fn complete_switch_mode(
        &mut self,
        outcome: Result<ChatResponse, TransportError>,
    ) -> SessionEvent {
        match outcome {
            Ok(response) => match response.into_reply() {
                Reply::Rejected(error) => {
                    self.push(MessageRole::Error, MessageContent::rich(&error));
                    SessionEvent::ModeSwitchFailed
                }
                Reply::Answered { text, mode } => {
                    if let Some(mode) = mode {
                        self.apply_mode(mode);
                    }
                    let description = if text.is_empty() {
                        format!("Switched to {} mode.", self.mode.display_name())
                    } else {
                        text
                    };
                    self.push(MessageRole::System, MessageContent::rich(&description));
                    SessionEvent::ModeSwitched { mode }
                }
            },
            Err(error) => {
                tracing::warn!(%error, "mode switch request failed");
                self.push(
                    MessageRole::Error,
                    MessageContent::rich(&format!("Failed to switch mode: {error}")),
                );
                SessionEvent::ModeSwitchFailed
            }
        }
    }

    fn apply_mode(&mut self, mode: ChatMode) {
        if mode != self.mode {
            tracing::info!(from = %self.mode, to = %mode, "chat mode changed");
        }
        self.mode = mode;
        self.surface.set_active_mode(mode);
    }

    fn push(&mut self, role: MessageRole, content: MessageContent) {
        self.surface.append_message(role, content.clone());
        self.transcript.push(Message::new(role, content));
    }

    fn issue(&mut self, channel: Channel) -> Ticket {
        self.next_ticket += 1;
        Ticket {
            id: self.next_ticket,
            channel,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Render surface that records what is visible
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSurface {
        pub entries: Vec<(MessageId, MessageRole, MessageContent)>,
        pub active_mode: Option<ChatMode>,
        pub clears: usize,
        pub ops: Vec<&'static str>,
        next_id: u64,
    }

    impl RecordingSurface {
        pub fn pending_count(&self) -> usize {
            self.entries
                .iter()
                .filter(|(_, _, content)| *content == MessageContent::Pending)
                .count()
        }

        pub fn roles(&self) -> Vec<MessageRole> {
            self.entries.iter().map(|(_, role, _)| *role).collect()
        }
    }

    impl RenderSurface for RecordingSurface {
        fn append_message(&mut self, role: MessageRole, content: MessageContent) -> MessageId {
            self.next_id += 1;
            let id = MessageId(self.next_id);
            self.ops.push("append");
            self.entries.push((id, role, content));
            id
        }

        fn remove_message(&mut self, id: MessageId) {
            self.ops.push("remove");
            self.entries.retain(|(entry_id, _, _)| *entry_id != id);
        }

        fn clear_all(&mut self) {
            self.entries.clear();
            self.clears += 1;
        }

        fn set_active_mode(&mut self, mode: ChatMode) {
            self.active_mode = Some(mode);
        }
    }

    fn session() -> ChatSession<RecordingSurface> {
        ChatSession::new(RecordingSurface::default(), ChatMode::Langchain)
    }

    fn last_text(session: &ChatSession<RecordingSurface>) -> String {
        session
            .transcript()
            .last()
            .map(|m| m.content.plain_text())
            .unwrap_or_default()
    }

    #[test]
    fn submit_appends_user_message_and_placeholder() {
        let mut session = session();
        let dispatch = session.submit("  hi  ").expect("dispatch");

        assert_eq!(dispatch.request, ChatRequest::UserText("hi".into()));
        assert_eq!(dispatch.ticket.channel, Channel::Submit);
        assert_eq!(session.state(), SessionState::AwaitingReply);
        assert_eq!(
            session.transcript(),
            &[Message::new(MessageRole::User, MessageContent::Plain("hi".into()))]
        );
        assert_eq!(session.surface().pending_count(), 1);
    }

    #[test]
    fn second_submit_is_ignored_while_awaiting_reply() {
        let mut session = session();
        assert!(session.submit("hi").is_some());
        assert!(session.submit("hi").is_none());

        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.surface().pending_count(), 1);
    }

    #[test]
    fn blank_submit_changes_nothing() {
        let mut session = session();
        assert!(session.submit("   ").is_none());
        assert!(session.submit("").is_none());
        assert!(session.transcript().is_empty());
        assert!(session.surface().entries.is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn reply_replaces_placeholder_with_formatted_assistant_message() {
        let mut session = session();
        let dispatch = session.submit("hi").unwrap();

        let event = session.complete(dispatch.ticket, Ok(ChatResponse::reply("use `x`\n- a")));

        assert_eq!(event, SessionEvent::ReplyReceived { mode: None });
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.surface().pending_count(), 0);
        assert_eq!(
            session.surface().roles(),
            vec![MessageRole::User, MessageRole::Assistant]
        );
        assert_eq!(
            session.transcript()[1].content,
            MessageContent::rich("use `x`\n- a")
        );
    }

    #[test]
    fn reply_without_mode_leaves_mode_unchanged() {
        let mut session = session();
        let dispatch = session.submit("hi").unwrap();
        session.complete(dispatch.ticket, Ok(ChatResponse::reply("ok")));
        assert_eq!(session.mode(), ChatMode::Langchain);
    }

    #[test]
    fn reply_with_mode_updates_mode_and_surface() {
        let mut session = session();
        let dispatch = session.submit("hi").unwrap();
        let event = session.complete(
            dispatch.ticket,
            Ok(ChatResponse::reply("ok").with_mode(ChatMode::Native)),
        );

        assert_eq!(event, SessionEvent::ReplyReceived { mode: Some(ChatMode::Native) });
        assert_eq!(session.mode(), ChatMode::Native);
        assert_eq!(session.surface().active_mode, Some(ChatMode::Native));
    }

    #[test]
    fn error_payload_becomes_error_message_without_mode_update() {
        let mut session = session();
        let dispatch = session.submit("hi").unwrap();
        let event = session.complete(
            dispatch.ticket,
            Ok(ChatResponse::rejected("model unavailable").with_mode(ChatMode::Native)),
        );

        assert_eq!(event, SessionEvent::ReplyRejected);
        assert_eq!(session.mode(), ChatMode::Langchain);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.surface().pending_count(), 0);
        assert_eq!(session.transcript()[1].role, MessageRole::Error);
        assert_eq!(last_text(&session), "model unavailable");
    }

    #[test]
    fn transport_failure_becomes_error_message_and_returns_to_idle() {
        let mut session = session();
        let dispatch = session.submit("hi").unwrap();
        let event = session.complete(
            dispatch.ticket,
            Err(TransportError::Request("connection refused".into())),
        );

        assert_eq!(event, SessionEvent::ReplyFailed);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.surface().pending_count(), 0);
        assert_eq!(session.transcript()[1].role, MessageRole::Error);
        assert_eq!(
            last_text(&session),
            "An error occurred: request failed: connection refused"
        );

        assert!(session.submit("again").is_some());
    }

    #[test]
    fn placeholder_is_removed_before_the_reply_is_appended() {
        let mut session = session();
        let dispatch = session.submit("hi").unwrap();
        let placeholder = session.surface().entries[1].0;

        session.complete(dispatch.ticket, Ok(ChatResponse::reply("ok")));

        let ids: Vec<_> = session.surface().entries.iter().map(|(id, _, _)| *id).collect();
        assert!(!ids.contains(&placeholder));
        assert_eq!(session.surface().ops, vec!["append", "append", "remove", "append"]);
    }

    #[test]
    fn stale_submit_completion_is_ignored() {
        let mut session = session();
        let dispatch = session.submit("hi").unwrap();
        session.complete(dispatch.ticket, Ok(ChatResponse::reply("ok")));

        let event = session.complete(dispatch.ticket, Ok(ChatResponse::reply("again")));
        assert_eq!(event, SessionEvent::Stale);
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn reset_clears_display_and_confirms() {
        let mut session = session();
        let dispatch = session.submit("hi").unwrap();
        session.complete(dispatch.ticket, Ok(ChatResponse::reply("ok")));

        let reset = session.reset();
        assert_eq!(reset.request, ChatRequest::ClearHistory);
        let event = session.complete(reset.ticket, Ok(ChatResponse::reply("cleared")));

        assert_eq!(event, SessionEvent::HistoryCleared);
        assert_eq!(session.surface().clears, 1);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].role, MessageRole::System);
        assert_eq!(last_text(&session), "Conversation history cleared.");
    }

    #[test]
    fn reset_failure_still_clears_and_reports() {
        let mut session = session();
        session.announce("note");

        let reset = session.reset();
        let event = session.complete(reset.ticket, Err(TransportError::Request("offline".into())));

        assert_eq!(event, SessionEvent::ClearFailed);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].role, MessageRole::System);
        assert_eq!(
            last_text(&session),
            "Failed to clear history: request failed: offline"
        );
    }

    #[test]
    fn reset_is_accepted_while_a_submit_is_in_flight() {
        let mut session = session();
        let submit = session.submit("hi").unwrap();

        let reset = session.reset();
        session.complete(reset.ticket, Ok(ChatResponse::reply("cleared")));

        // The submit guard survives the reset; the placeholder is gone with
        // the cleared display.
        assert_eq!(session.state(), SessionState::AwaitingReply);
        assert_eq!(session.surface().pending_count(), 0);
        assert!(session.submit("blocked").is_none());

        // The late reply lands after the confirmation.
        session.complete(submit.ticket, Ok(ChatResponse::reply("late")));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(
            session.surface().roles(),
            vec![MessageRole::System, MessageRole::Assistant]
        );
    }

    #[test]
    fn switch_mode_is_accepted_while_a_submit_is_in_flight() {
        let mut session = session();
        let submit = session.submit("hi").unwrap();

        let toggle = session.switch_mode();
        assert_eq!(toggle.request, ChatRequest::ToggleMode);
        let event = session.complete(
            toggle.ticket,
            Ok(ChatResponse::reply("Switched to native mode").with_mode(ChatMode::Native)),
        );

        assert_eq!(event, SessionEvent::ModeSwitched { mode: Some(ChatMode::Native) });
        assert_eq!(session.mode(), ChatMode::Native);
        assert_eq!(session.state(), SessionState::AwaitingReply);
        assert_eq!(session.surface().pending_count(), 1);

        session.complete(submit.ticket, Ok(ChatResponse::reply("done")));
        assert_eq!(session.surface().pending_count(), 0);
    }

    #[test]
    fn switch_mode_appends_backend_description() {
        let mut session = session();
        let toggle = session.switch_mode();
        session.complete(
            toggle.ticket,
            Ok(ChatResponse::reply("Now using native chat").with_mode(ChatMode::Native)),
        );

        assert_eq!(session.transcript()[0].role, MessageRole::System);
        assert_eq!(last_text(&session), "Now using native chat");
        assert_eq!(session.surface().active_mode, Some(ChatMode::Native));
    }

    #[test]
    fn switch_mode_without_description_uses_mode_name() {
        let mut session = session();
        let toggle = session.switch_mode();
        session.complete(toggle.ticket, Ok(ChatResponse::default().with_mode(ChatMode::Native)));
        assert_eq!(last_text(&session), "Switched to Native mode.");
    }

    #[test]
    fn switch_mode_failures_are_error_messages() {
        let mut session = session();
        let toggle = session.switch_mode();
        let event = session.complete(toggle.ticket, Ok(ChatResponse::rejected("not allowed")));
        assert_eq!(event, SessionEvent::ModeSwitchFailed);
        assert_eq!(session.transcript()[0].role, MessageRole::Error);

        let toggle = session.switch_mode();
        session.complete(toggle.ticket, Err(TransportError::Timeout(std::time::Duration::from_secs(3))));
        assert_eq!(session.transcript()[1].role, MessageRole::Error);
        assert_eq!(
            last_text(&session),
            "Failed to switch mode: request timed out after 3s"
        );
        assert_eq!(session.mode(), ChatMode::Langchain);
    }

    #[test]
    fn tickets_are_unique_across_channels() {
        let mut session = session();
        let a = session.submit("hi").unwrap().ticket;
        let b = session.reset().ticket;
        let c = session.switch_mode().ticket;
        assert!(a.id < b.id && b.id < c.id);
    }
}
