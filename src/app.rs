//! Interactive terminal loop.
//!
//! Everything runs on one task: terminal events, request completions and the
//! animation tick are multiplexed with `tokio::select!`, so the session is
//! only ever touched from here.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::config::Config;
use crate::transport::MessageSender;
use crate::ui::conversation::{CompletionReceiver, ConversationAction, ConversationManager};

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Run the chat UI until the user quits.
pub async fn run_chat(config: &Config, sender: Arc<dyn MessageSender>) -> Result<()> {
    let (mut manager, mut completions) =
        ConversationManager::new(sender, config.default_mode, config.ui.show_timestamps);

    let mut terminal = setup_terminal()?;
    tracing::info!(endpoint = %config.endpoint, mode = %config.default_mode, "chat started");

    let tick = Duration::from_millis(config.ui.tick_millis.max(50));
    let result = event_loop(&mut terminal, &mut manager, &mut completions, tick).await;

    restore_terminal(&mut terminal)?;
    tracing::info!("chat finished");
    result
}

async fn event_loop(
    terminal: &mut Tui,
    manager: &mut ConversationManager,
    completions: &mut CompletionReceiver,
    tick: Duration,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(tick);

    loop {
        terminal
            .draw(|frame| frame.render_widget(&*manager, frame.size()))
            .context("Failed to draw terminal")?;

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    if is_interrupt(&key) || manager.handle_key(key) == ConversationAction::Exit {
                        return Ok(());
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Failed to read terminal event"),
                None => return Ok(()),
            },
            Some(completion) = completions.recv() => {
                let event = manager.apply(completion);
                tracing::debug!(?event, "request completed");
            }
            _ = ticker.tick() => manager.tick(),
        }
    }
}

/// Raw mode swallows SIGINT, so Ctrl+C arrives as a key.
fn is_interrupt(key: &KeyEvent) -> bool {
    key.kind == KeyEventKind::Press
        && key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d'))
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    unwind_on_err(execute!(stdout, EnterAlternateScreen), || {
        let _ = disable_raw_mode();
    })
    .context("Failed to enter alternate screen")?;

    unwind_on_err(Terminal::new(CrosstermBackend::new(stdout)), || {
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = disable_raw_mode();
    })
    .context("Failed to create terminal")
}

/// Run `undo` if a setup step failed, leaving the terminal as it was.
fn unwind_on_err<T>(result: io::Result<T>, undo: impl FnOnce()) -> io::Result<T> {
    if result.is_err() {
        undo();
    }
    result
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}
