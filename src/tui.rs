use std::io::{self, Stderr};
use std::thread::{self, ThreadId};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::StreamExt;
use tokio::sync::mpsc;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize,
    Tick,
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    _tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _tx = tx.clone();

        // Spawn event reader task
        let tx_events = tx.clone();
        tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            while let Some(evt) = reader.next().await {
                let Ok(evt) = evt else { continue };
                let app_event = match evt {
                    // Only handle key press events, not release
                    Event::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
                    Event::Mouse(mouse) => Some(AppEvent::Mouse(mouse)),
                    Event::Resize(_, _) => Some(AppEvent::Resize),
                    _ => None,
                };

                if let Some(event) = app_event {
                    if tx_events.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        // Tick drives the "Generating..." animation and polls the running task
        let tx_tick = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(300));
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, _tx }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen)?;

    // Mouse capture lets the buttons be clicked
    execute!(io::stderr(), crossterm::event::EnableMouseCapture)?;

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;

    Ok(terminal)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), crossterm::event::DisableMouseCapture)?;
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic.
///
/// Only a panic on the calling (UI) thread tears the terminal down. A panic
/// inside a generation task is reported by the app as a failed generation
/// while the UI keeps running.
pub fn install_panic_hook() {
    let ui_thread = thread::current().id();
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        if on_thread(ui_thread) {
            let _ = restore();
        }
        original_hook(panic_info);
    }));
}

fn on_thread(id: ThreadId) -> bool {
    thread::current().id() == id
}
