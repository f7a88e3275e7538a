//! Terminal host: raw mode, alternate screen, and the single event loop.

use std::io::{self, Write};

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{cursor, execute, queue, terminal};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::layout::Layout;
use crate::onboarding::{Command, Key, Msg, Onboarding, Outcome};

/// Restores the terminal when dropped, including on early return.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Map a terminal key event onto the wizard's key set.
pub fn map_key(event: KeyEvent) -> Option<Key> {
    if event.kind == KeyEventKind::Release {
        return None;
    }
    let key = match event.code {
        KeyCode::Char(c) if event.modifiers.contains(KeyModifiers::CONTROL) => Key::Ctrl(c),
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Backspace => Key::Backspace,
        _ => return None,
    };
    Some(key)
}

/// Run every task of `cmd` in the background, sending results to `tx`.
fn spawn(cmd: Command, tx: &mpsc::UnboundedSender<Msg>) {
    for task in cmd.into_tasks() {
        let tx = tx.clone();
        tokio::spawn(async move {
            // The receiver is gone once the loop exits; late results are dropped.
            let _ = tx.send(task.await);
        });
    }
}

fn draw(app: &Onboarding, layout: &dyn Layout, size: (u16, u16)) -> io::Result<()> {
    let mut out = io::stdout();
    queue!(
        out,
        cursor::MoveTo(0, 0),
        terminal::Clear(terminal::ClearType::All)
    )?;
    let lines = layout.render(&app.screen(), size.0, size.1);
    out.write_all(lines.join("\r\n").as_bytes())?;
    out.flush()
}

/// Drive `app` until it finishes or the user quits.
pub async fn run(mut app: Onboarding, layout: &dyn Layout) -> io::Result<Outcome> {
    let _guard = TerminalGuard::enter()?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut events = EventStream::new();

    let mut size = terminal::size()?;
    let _ = app.update(Msg::Resize {
        width: size.0,
        height: size.1,
    });
    spawn(app.init(), &tx);

    while !app.is_done() {
        draw(&app, layout, size)?;

        let msg = tokio::select! {
            Some(msg) = rx.recv() => msg,
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => match map_key(key) {
                    Some(key) => Msg::Key(key),
                    None => continue,
                },
                Some(Ok(Event::Resize(width, height))) => {
                    size = (width, height);
                    Msg::Resize { width, height }
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    error!(error = %e, "Terminal event stream failed");
                    return Err(e);
                }
                None => break,
            },
        };
        spawn(app.update(msg), &tx);
    }

    debug!("Event loop finished");
    Ok(app.outcome().unwrap_or(Outcome::Quit))
}
