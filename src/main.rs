//! NATS Panel - Actor-based terminal client for a NATS broker over WebSocket
//!
//! Architecture:
//! - UI Layer (Ratatui) - synchronous terminal rendering
//! - App Layer - session state machine processing events
//! - Network Layer (Tokio) - NATS connection and receive loop

mod app;
mod config;
mod constants;
mod messages;
mod models;
mod network;
mod ui;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tokio::sync::mpsc;

use app::{AppActor, AppState};
use config::Config;
use constants::LOG_FILE_NAME;
use messages::ui_events::key_to_ui_event;
use messages::{BrokerCommand, BrokerEvent, RenderState, UiEvent};
use network::NetworkActor;

/// Terminal cleanup guard
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging to file
    let file_appender = tracing_appender::rolling::never(".", LOG_FILE_NAME);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    let config = Config::load()?;
    tracing::info!(servers = ?config.servers, "Starting");

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let _terminal_guard = TerminalGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create channels
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (net_cmd_tx, net_cmd_rx) = mpsc::unbounded_channel::<BrokerCommand>();
    let (net_evt_tx, net_evt_rx) = mpsc::unbounded_channel::<BrokerEvent>();
    let (render_tx, mut render_rx) = mpsc::unbounded_channel::<RenderState>();

    // Spawn network actor
    let network_actor = NetworkActor::new(
        Some(config.client_name.clone()),
        config.drain_timeout(),
        net_evt_tx,
    );
    let network_handle = tokio::spawn(network_actor.run(net_cmd_rx));

    // Spawn app actor
    let app_actor = AppActor::new(AppState::new(&config), net_cmd_tx, render_tx);
    tokio::spawn(app_actor.run(ui_rx, net_evt_rx));

    // Run UI loop (synchronous with async polling)
    run_ui_loop(&mut terminal, ui_tx, &mut render_rx).await?;

    // Quit sent Shutdown; let the connection drain before the runtime goes away
    let shutdown_grace = config.drain_timeout() + Duration::from_millis(500);
    if tokio::time::timeout(shutdown_grace, network_handle).await.is_err() {
        tracing::warn!("Network actor did not stop in time");
    }
    tracing::info!("Exiting");

    Ok(())
}

/// Run the synchronous UI rendering loop
async fn run_ui_loop(
    terminal: &mut Terminal<impl Backend>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
    render_rx: &mut mpsc::UnboundedReceiver<RenderState>,
) -> anyhow::Result<()> {
    let mut current_state = RenderState::default();

    loop {
        // Draw with current state
        terminal.draw(|f| ui::draw_ui(f, &current_state))?;

        // Poll for events with timeout
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Some(event) = key_to_ui_event(
                    key,
                    current_state.focus,
                    current_state.input_mode,
                    current_state.show_help,
                ) {
                    let quit = matches!(event, UiEvent::Quit);
                    let _ = ui_tx.send(event);
                    if quit {
                        break;
                    }
                }
            }
        }

        // Check for state updates (non-blocking)
        while let Ok(state) = render_rx.try_recv() {
            current_state = state;
        }
    }

    Ok(())
}
