use std::sync::Arc;

use crate::events::ChatMode;
use crate::session::{ChatSession, Dispatch, SessionEvent, Ticket};
use crate::transport::{ChatResponse, MessageSender, TransportError};
use crate::ui::conversation::{
    get_help_text, ConversationComposer, ConversationResult, ParsedCommand, SlashCommand,
    TranscriptView,
};
use crossterm::event::KeyEvent;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::Widget,
};
use tokio::sync::mpsc;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Outcome of a dispatched request, delivered back to the UI task
#[derive(Debug)]
pub struct Completion {
    pub ticket: Ticket,
    pub outcome: Result<ChatResponse, TransportError>,
}

pub type CompletionReceiver = mpsc::UnboundedReceiver<Completion>;

/// Manages the conversation flow and UI components
pub struct ConversationManager {
    session: ChatSession<TranscriptView>,
    composer: ConversationComposer,
    sender: Arc<dyn MessageSender>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl ConversationManager {
    /// Build a manager and the receiving end of its completion channel. The
    /// caller polls the receiver on the same task that owns the manager.
    pub fn new(
        sender: Arc<dyn MessageSender>,
        mode: ChatMode,
        show_timestamps: bool,
    ) -> (Self, CompletionReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Self {
            session: ChatSession::new(TranscriptView::new(show_timestamps), mode),
            composer: ConversationComposer::new("Type a message...", mode),
            sender,
            completions: tx,
        };
        (manager, rx)
    }

    pub fn session(&self) -> &ChatSession<TranscriptView> {
        &self.session
    }

    /// Handle user input from the composer
    pub fn handle_input(&mut self, input: &str) {
        if let Some(dispatch) = self.session.submit(input) {
            self.dispatch(dispatch);
        }
        self.sync_composer();
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        match self.composer.handle_key(key) {
            ConversationResult::Submitted(input) => {
                self.handle_input(&input);
                ConversationAction::None
            }
            ConversationResult::Command(command) => self.handle_slash_command(command),
            ConversationResult::None => ConversationAction::None,
        }
    }

    /// Apply a finished request to the session
    pub fn apply(&mut self, completion: Completion) -> SessionEvent {
        let event = self.session.complete(completion.ticket, completion.outcome);
        self.sync_composer();
        event
    }

    /// Advance animations
    pub fn tick(&mut self) {
        self.session.surface_mut().tick();
    }

    /// Send a request on a background task; the result comes back through
    /// the completion channel.
    fn dispatch(&self, dispatch: Dispatch) {
        let Dispatch { ticket, request } = dispatch;
        let sender = Arc::clone(&self.sender);
        let completions = self.completions.clone();

        tracing::debug!(ticket = ticket.id, channel = ?ticket.channel, "dispatching request");
        tokio::spawn(async move {
            let outcome = sender.send(request).await;
            if completions.send(Completion { ticket, outcome }).is_err() {
                tracing::debug!(ticket = ticket.id, "conversation closed before completion");
            }
        });
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        match command.command {
            SlashCommand::Clear => {
                let dispatch = self.session.reset();
                self.dispatch(dispatch);
                ConversationAction::None
            }
            SlashCommand::Mode => {
                let dispatch = self.session.switch_mode();
                self.dispatch(dispatch);
                ConversationAction::None
            }
            SlashCommand::Help => {
                self.session.announce(&get_help_text());
                ConversationAction::None
            }
            SlashCommand::Quit => ConversationAction::Exit,
        }
    }

    fn sync_composer(&mut self) {
        self.composer.update_session_state(self.session.state());
        self.composer.update_mode(self.session.mode());
    }
}

impl Widget for &ConversationManager {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),                                // History
                Constraint::Length(self.composer.desired_height()), // Composer
            ])
            .split(area);

        self.session.surface().render(chunks[0], buf);
        (&self.composer).render(chunks[1], buf);
    }
}
