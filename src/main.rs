use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tidings::app::AppContext;
use tidings::cli::{commands, Cli, Commands, DaemonAction, NotificationAction};
use tidings::config::Config;
use tidings::daemon::{daemon_status, stop_daemon, Daemon, DaemonConfig};

fn init_tracing(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(filter)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }
    Ok(())
}

/// Re-run this binary as a detached foreground daemon.
fn spawn_detached(
    cli: &Cli,
    interval: &str,
    no_initial_update: bool,
    log: Option<&PathBuf>,
) -> anyhow::Result<u32> {
    let exe = std::env::current_exe()?;
    let mut cmd = Command::new(exe);
    if let Some(db) = &cli.db {
        cmd.arg("--db").arg(db);
    }
    if let Some(workers) = cli.workers {
        cmd.arg("--workers").arg(workers.to_string());
    }
    cmd.args(["daemon", "start", "--foreground", "--interval", interval]);
    if no_initial_update {
        cmd.arg("--no-initial-update");
    }
    if let Some(log) = log {
        cmd.arg("--log").arg(log);
    }
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(child.id())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let daemon_log = match &cli.command {
        Commands::Daemon {
            action: DaemonAction::Start { log, .. },
        } => log.clone(),
        _ => None,
    };
    init_tracing(daemon_log.as_ref())?;

    let mut config = Config::load()?;
    if let Some(workers) = cli.workers {
        config.update.workers = workers;
    }

    if let Commands::Daemon { action } = &cli.command {
        match action {
            DaemonAction::Stop => {
                stop_daemon().map_err(|e| anyhow!(e))?;
                println!("Daemon stopped");
                return Ok(());
            }
            DaemonAction::Status => {
                println!("{}", daemon_status());
                return Ok(());
            }
            DaemonAction::Start {
                interval,
                no_initial_update,
                log,
                foreground,
            } => {
                let interval = interval.clone().unwrap_or_else(|| config.update.interval.clone());
                let secs = DaemonConfig::parse_interval(&interval).map_err(|e| anyhow!(e))?;

                if !*foreground {
                    if Daemon::is_running() {
                        return Err(anyhow!("Another daemon instance is already running"));
                    }
                    let pid = spawn_detached(&cli, &interval, *no_initial_update, log.as_ref())?;
                    println!("Daemon started (PID: {})", pid);
                    return Ok(());
                }

                let ctx = Arc::new(AppContext::new(cli.db.clone(), config)?);
                let daemon = Daemon::new(
                    ctx,
                    DaemonConfig {
                        update_interval_secs: secs,
                        update_on_start: !*no_initial_update,
                        ..Default::default()
                    },
                );
                daemon.run().await?;
                return Ok(());
            }
        }
    }

    let ctx = AppContext::new(cli.db.clone(), config)?;

    match cli.command {
        Commands::Add { url, notify } => {
            commands::add_feed(&ctx, &url, notify).await?;
        }
        Commands::Remove { url } => {
            commands::remove_feed(&ctx, &url)?;
        }
        Commands::Import { path } => {
            commands::import_opml(&ctx, &path).await?;
        }
        Commands::Update { no_notify } => {
            commands::update_feeds(&ctx, !no_notify).await?;
        }
        Commands::List { items } => {
            if items {
                commands::list_items(&ctx)?;
            } else {
                commands::list_feeds(&ctx)?;
            }
        }
        Commands::NotifyFeed { url, off } => {
            commands::set_feed_notify(&ctx, &url, !off)?;
        }
        Commands::Notify => {
            commands::notify_pending(&ctx).await?;
        }
        Commands::Notifications { action } => match action {
            NotificationAction::List => commands::list_notifications(&ctx)?,
            NotificationAction::Open { id, action } => {
                commands::open_notification(&ctx, id, action)?
            }
            NotificationAction::OpenUri { uri } => commands::open_uri(&ctx, &uri)?,
            NotificationAction::Dismiss { id } => commands::dismiss_notification(&ctx, id)?,
        },
        Commands::MarkRead { id } => {
            commands::mark_read(&ctx, id)?;
        }
        Commands::Daemon { .. } => {}
    }

    Ok(())
}
