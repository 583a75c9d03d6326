// src/main.rs

//! # Hookwatch Main Entry Point
//!
//! Loads configuration, sets up logging, starts the file watcher, and runs
//! the collector and dispatcher until Ctrl-C or a fatal watcher error.

use anyhow::Result;
use hookwatch::buffer::EventBuffer;
use hookwatch::collector::run_collector;
use hookwatch::config::AppConfig;
use hookwatch::dispatcher::run_dispatcher;
use hookwatch::notification::Formatter;
use hookwatch::watcher::start_watcher;
use hookwatch::webhook::WebhookClient;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let app_config = match AppConfig::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing subscriber for logging with environment filter and max level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&app_config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_max_level(tracing::Level::TRACE)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!("Hookwatch starting with configuration: {:?}", app_config);

    let (_watcher_handle, watcher_rx) = match start_watcher(&app_config) {
        Ok(started) => started,
        Err(e) => {
            tracing::error!("Failed to start watcher: {}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let buffer = EventBuffer::new();

    let mut collector_task = tokio::spawn(run_collector(
        watcher_rx,
        buffer.clone(),
        shutdown_rx.clone(),
    ));

    let dispatcher_task = tokio::spawn(run_dispatcher(
        app_config.polling,
        buffer,
        Formatter::from_config(&app_config),
        WebhookClient::new(app_config.webhook.clone()),
        shutdown_rx,
    ));

    let mut collector_done = false;
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => tracing::info!("Ctrl-C received, initiating shutdown..."),
                Err(err) => tracing::error!("Failed to listen for Ctrl-C signal: {}", err),
            }
        }
        collected = &mut collector_task => {
            collector_done = true;
            match collected {
                Ok(Ok(())) => tracing::info!("Watcher stopped, initiating shutdown..."),
                Ok(Err(e)) => {
                    tracing::error!("Watcher failed: {}", e);
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!("Collector task panicked: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    if shutdown_tx.send(true).is_err() {
        tracing::error!("Failed to send shutdown signal");
    }

    if !collector_done {
        if let Ok(Err(e)) = collector_task.await {
            tracing::error!("Watcher failed during shutdown: {}", e);
        }
    }
    if let Err(e) = dispatcher_task.await {
        tracing::error!("Dispatcher task panicked: {}", e);
    }

    tracing::info!("Hookwatch shut down gracefully.");
    Ok(())
}
