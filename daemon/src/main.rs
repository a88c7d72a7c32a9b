//! chatty-commander: background daemon for the voice command assistant
//!
//! Wires the state manager, command executor and input adapters together
//! and exposes them on a local control socket. Typed commands are read
//! from stdin, one per line.

use std::io::BufRead;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chatty_commander::commands::CommandExecutor;
use chatty_commander::config::Config;
use chatty_commander::events::StateEvent;
use chatty_commander::ipc::{Server, ServerContext};
use chatty_commander::lifecycle::ShutdownSignal;
use chatty_commander::orchestrator::{CommandRouter, ModeOrchestrator, TextInputAdapter};
use chatty_commander::state::StateManager;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "chatty-commander starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, default_state = %config.default_state, "configuration loaded");

    let shutdown = ShutdownSignal::new();

    // Core -> control socket subscribers
    let (event_tx, _event_rx) = broadcast::channel::<StateEvent>(64);

    let mut state = StateManager::new(&config)?;
    let events = event_tx.clone();
    state.add_state_change_callback(move |from, to| {
        let _ = events.send(StateEvent::StateChanged {
            from: from.to_string(),
            to: to.to_string(),
        });
    });
    let state = Arc::new(Mutex::new(state));

    let mut executor = CommandExecutor::new(&config);
    let events = event_tx.clone();
    executor.set_post_execute_hook(move |name, success| {
        let _ = events.send(StateEvent::CommandExecuted {
            name: name.to_string(),
            success,
        });
    });
    let executor = Arc::new(Mutex::new(executor));

    let router = Arc::new(
        CommandRouter::new(executor.clone())
            .with_state(Arc::clone(&state))
            .with_events(event_tx.clone()),
    );

    let mut orchestrator = ModeOrchestrator::new(&config, router);
    let started = orchestrator.start();
    if started.is_empty() {
        warn!("no input adapters started");
    }
    if let Some(text_input) = orchestrator.adapter::<TextInputAdapter>().cloned() {
        spawn_stdin_reader(text_input)?;
    }

    let orchestrator = Arc::new(Mutex::new(orchestrator));

    // Create control socket with event subscription; health is re-checked per status request
    let health_orchestrator = Arc::clone(&orchestrator);
    let context = ServerContext::new(Arc::clone(&executor), Arc::clone(&state))
        .with_health_source(move || {
            health_orchestrator
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .health_check()
        });
    let server = Server::with_events(&config.socket_path, context, event_tx.clone())?;

    info!("daemon initialized, entering main loop");

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "control socket error");
            }
        }

        result = shutdown.wait() => {
            match result {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(?e, "failed to install signal handlers"),
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    let report = orchestrator
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .stop();
    if !report.is_clean() {
        warn!(failed = report.failures().count(), "some adapters did not stop cleanly");
    }
    server.shutdown().await;

    info!("chatty-commander stopped");

    Ok(())
}

/// Feed stdin lines to the text adapter on a dedicated thread.
/// Blocking stdin reads would otherwise hold up runtime shutdown.
fn spawn_stdin_reader(text_input: TextInputAdapter) -> Result<()> {
    thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(?e, "failed to read stdin");
                        break;
                    }
                };

                let command = line.trim();
                if !command.is_empty() {
                    text_input.feed(command);
                }
            }
            info!("stdin closed");
        })?;
    Ok(())
}
