use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use pixelprompt_core::{ComputeDevice, Config, StableDiffusion};

mod app;
mod handler;
mod logging;
#[cfg(test)]
mod testing;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

fn main() -> Result<()> {
    block_on_detached(start())?
}

/// Run `future` on a fresh runtime, then shut the runtime down without
/// waiting for blocking tasks. A generation still sampling when the user
/// quits is abandoned instead of holding the process open.
fn block_on_detached<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

async fn start() -> Result<()> {
    let log_path = logging::init()?;

    let config_path = Config::path().ok();
    let config = match &config_path {
        Some(path) => Config::load_from(path).unwrap_or_else(|e| {
            warn!("Ignoring unreadable config {}: {}", path.display(), e);
            Config::new()
        }),
        None => Config::new(),
    };

    // Device and model are chosen once and reused for every generation
    let device = ComputeDevice::select(config.force_cpu);
    println!("Using device: {}", device);
    println!("Loading {} (the first run downloads the weights)...", config.model_repo());
    info!("Using device {}, logging to {}", device, log_path.display());

    let backend = StableDiffusion::load(&config, device)?;
    println!("✓ Model ready");

    let mut app = App::new(Arc::new(backend), config, config_path);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
        app.poll_generation().await;
    }

    Ok(())
}
