use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use filewatch_panel::config::{get_config_file_path, load_config, save_config, PanelConfig};
use filewatch_panel::events::PanelEventPayload;
use filewatch_panel::gateway::{HttpGateway, InMemoryGateway, RemoteGateway};
use filewatch_panel::logging::init_logging;
use filewatch_panel::models::{Watcher, WatcherDraft, WatcherState};
use filewatch_panel::{FilewatcherPanel, PanelSettings};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

/// Filewatcher monitoring panel: polls the watcher backend and renders the panel.
#[derive(Debug, Parser)]
#[command(name = "filewatch-panel", version, about, long_about = None)]
struct Args {
    /// Backend base URL (overrides the config file).
    #[arg(long, value_name = "URL")]
    server_url: Option<String>,
    /// Bearer API key sent with every request.
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,
    /// Poll interval in seconds.
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,
    /// Write the rendered panel to this file instead of stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Load once, render, and exit.
    #[arg(long)]
    once: bool,
    /// Run against a seeded in-process backend.
    #[arg(long)]
    demo: bool,
}

impl Args {
    fn apply_to(&self, config: &mut PanelConfig) {
        if let Some(url) = &self.server_url {
            config.server_url = url.clone();
        }
        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(secs) = self.interval {
            config.poll_interval_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = get_config_file_path()?;
    let first_run = !config_path.exists();
    let mut config = load_config().context("Failed to load panel config")?;
    if first_run {
        // Persist defaults only; flags stay per-invocation
        save_config(&config).context("Failed to write default panel config")?;
    }
    args.apply_to(&mut config);
    config.validate()?;

    match init_logging(&config.log_level) {
        Ok(path) => debug!(path = %path.display(), "Logging to file"),
        Err(e) => eprintln!("Failed to initialize logging: {}", e),
    }
    if first_run {
        info!(path = %config_path.display(), "Wrote default config");
    }

    let settings = PanelSettings::from(&config);
    if args.demo {
        info!("Starting in demo mode");
        run(demo_gateway().await?, settings, &args).await
    } else {
        let gateway = HttpGateway::from_config(&config)?;
        info!(server_url = %gateway.base_url(), "Starting filewatcher panel");
        run(gateway, settings, &args).await
    }
}

async fn run<G: RemoteGateway>(gateway: G, settings: PanelSettings, args: &Args) -> Result<()> {
    let panel = FilewatcherPanel::new(gateway, settings);
    let mut events = panel.subscribe();

    panel.attach().await;
    write_output(&panel.render(), args.output.as_ref()).await?;

    if args.once {
        panel.detach();
        return Ok(());
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => match event.payload {
                    PanelEventPayload::Refreshed { .. } | PanelEventPayload::RefreshFailed { .. } => {
                        if let Err(e) = write_output(&panel.render(), args.output.as_ref()).await {
                            error!(error = %e, "Failed to write rendered panel");
                        }
                    }
                    PanelEventPayload::Notification(notification) => {
                        info!(level = ?notification.level, "{}", notification.message);
                    }
                    _ => {}
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event receiver lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    panel.detach();
    Ok(())
}

async fn write_output(html: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => tokio::fs::write(path, html)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", html);
            Ok(())
        }
    }
}

async fn demo_gateway() -> Result<InMemoryGateway> {
    let gateway = InMemoryGateway::new();

    for (name, directory, patterns) in [
        ("nginx-errors", "/var/log/nginx", vec!["500", "502", "upstream timed out"]),
        ("app-crashes", "/srv/app/logs", vec!["panicked at", "FATAL"]),
    ] {
        gateway
            .create_watcher(&WatcherDraft {
                name: name.to_string(),
                directory: directory.to_string(),
                file_pattern: "*.log".to_string(),
                error_patterns: patterns.into_iter().map(str::to_string).collect(),
                ..WatcherDraft::default()
            })
            .await?;
    }

    // A watcher the backend reports in a state this panel does not model
    gateway.seed_watcher(Watcher {
        id: "legacy-cron".to_string(),
        name: "legacy-cron".to_string(),
        directory: "/var/log/cron".to_string(),
        file_pattern: None,
        prompt: String::new(),
        error_patterns: vec!["(?i)\\bfailed\\b".to_string()],
        state: WatcherState::Other("draining".to_string()),
        is_running: false,
        investigation_count: 0,
        recent_investigations: Vec::new(),
        created_at: Some(Utc::now()),
        updated_at: None,
    });

    let now = Utc::now();
    for (index, watcher) in gateway.list_watchers().await?.iter().enumerate() {
        let pattern = watcher.error_patterns.first().cloned().unwrap_or_default();
        let file = format!("{}/error.log", watcher.directory);
        gateway.seed_investigation(
            &watcher.id,
            &pattern,
            &file,
            index as u64 + 1,
            now - ChronoDuration::minutes(index as i64 * 7),
        );
    }
    gateway.clear_calls();
    Ok(gateway)
}
