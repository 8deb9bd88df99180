//! Background daemon for automatic feed updates.
//!
//! Each cycle refreshes every feed and then hands pending items to the
//! notification dispatcher, so new items surface without running the CLI.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::app::{AppContext, Result, TidingsError};
use crate::fetcher::summarize;
use crate::notify::DispatchOutcome;
use crate::store::Store;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Update interval in seconds (default: 3600 = 1 hour)
    pub update_interval_secs: u64,
    /// Whether to run an update immediately on start
    pub update_on_start: bool,
    /// Dispatch notifications after each update
    pub notify: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 3600,
            update_on_start: true,
            notify: true,
        }
    }
}

impl DaemonConfig {
    /// Parse interval string like "1h", "30m", "6h", "1d"
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();

        let (digits, unit) = match s.char_indices().last() {
            Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], Some(c)),
            _ => (s.as_str(), None),
        };
        let multiplier = match unit {
            None | Some('s') => 1,
            Some('m') => 60,
            Some('h') => 3600,
            Some('d') => 86400,
            Some(_) => {
                return Err(format!(
                    "Invalid interval: {}. Use format like '1h', '30m', '1d'",
                    s
                ))
            }
        };

        match digits.parse::<u64>() {
            Ok(0) => Err("Interval must be greater than zero".to_string()),
            Ok(n) => n
                .checked_mul(multiplier)
                .ok_or_else(|| format!("Interval too large: {}", s)),
            Err(_) => Err(format!(
                "Invalid interval: {}. Use format like '1h', '30m', '1d'",
                s
            )),
        }
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs.is_multiple_of(86400) {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs.is_multiple_of(3600) {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs.is_multiple_of(60) {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

/// Daemon runner
pub struct Daemon {
    ctx: Arc<AppContext>,
    config: DaemonConfig,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, config: DaemonConfig) -> Self {
        Self {
            ctx,
            config,
            running: Arc::new(AtomicBool::new(true)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn pid_file_path() -> Option<PathBuf> {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .map(|d| d.join("tidings").join("daemon.pid"))
    }

    fn read_pid() -> Option<u32> {
        let pid_path = Self::pid_file_path()?;
        fs::read_to_string(pid_path).ok()?.trim().parse().ok()
    }

    /// Check if another daemon is already running
    pub fn is_running() -> bool {
        Self::read_pid().is_some_and(Self::process_exists)
    }

    #[cfg(unix)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid)])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    fn write_pid_file(&self) -> std::io::Result<()> {
        if let Some(pid_path) = Self::pid_file_path() {
            if let Some(parent) = pid_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&pid_path)?;
            writeln!(file, "{}", std::process::id())?;
        }
        Ok(())
    }

    fn remove_pid_file(&self) {
        if let Some(pid_path) = Self::pid_file_path() {
            let _ = fs::remove_file(pid_path);
        }
    }

    fn watch_signals(&self) {
        let running = self.running.clone();
        let shutdown = self.shutdown.clone();

        #[cfg(unix)]
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        error!("Failed to install signal handlers: {}", e);
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
            running.store(false, Ordering::SeqCst);
            shutdown.notify_one();
        });

        #[cfg(windows)]
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            running.store(false, Ordering::SeqCst);
            shutdown.notify_one();
        });
    }

    pub async fn run(&self) -> Result<()> {
        if Self::is_running() {
            return Err(TidingsError::Other(
                "Another daemon instance is already running".to_string(),
            ));
        }

        self.write_pid_file()
            .map_err(|e| TidingsError::Other(format!("Failed to write PID file: {}", e)))?;

        self.watch_signals();

        info!(
            "Tidings daemon started (update interval: {}, PID: {})",
            DaemonConfig::format_interval(self.config.update_interval_secs),
            std::process::id()
        );

        if self.config.update_on_start {
            info!("Running initial update...");
            self.run_cycle().await;
        }

        let mut timer = interval(Duration::from_secs(self.config.update_interval_secs));
        timer.tick().await;

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = timer.tick() => {}
                _ = self.shutdown.notified() => break,
            }

            info!("Running scheduled update...");
            self.run_cycle().await;
        }

        info!("Daemon shutting down...");
        self.remove_pid_file();

        Ok(())
    }

    /// One update followed by one dispatch.
    pub async fn run_cycle(&self) {
        self.run_update().await;

        if self.config.notify && self.ctx.config.notifications.enabled {
            match self.ctx.dispatcher.clone().notify_pending_in_background().await {
                Ok(DispatchOutcome::Nothing) => {}
                Ok(DispatchOutcome::Individual(ids)) => {
                    info!("Posted {} notifications", ids.len())
                }
                Ok(DispatchOutcome::Aggregate(ids)) => {
                    info!("Posted bundled notification for {} items", ids.len())
                }
                Err(e) => error!("Notification dispatch failed: {}", e),
            }
        }
    }

    async fn run_update(&self) {
        let start = Instant::now();

        let feeds = match self.ctx.store.get_all_feeds() {
            Ok(feeds) => feeds,
            Err(e) => {
                error!("Failed to get feeds: {}", e);
                return;
            }
        };

        if feeds.is_empty() {
            info!("No feeds to update");
            return;
        }

        let reports = self
            .ctx
            .parallel_fetcher
            .refresh_all(feeds, self.ctx.store.clone(), &self.ctx.normalizer)
            .await;

        for report in &reports {
            match &report.result {
                Ok(count) if *count > 0 => {
                    info!("  {} new items from {}", count, report.feed_title)
                }
                Ok(_) => {}
                Err(e) => warn!("  Error updating {}: {}", report.feed_title, e),
            }
        }

        let (total_new, errors) = summarize(&reports);
        info!(
            "Update complete: {} new items, {} errors ({:.1}s)",
            total_new,
            errors,
            start.elapsed().as_secs_f64()
        );
    }

    /// Stop the daemon (called externally)
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }
}

/// Stop a running daemon by reading PID file and sending signal
pub fn stop_daemon() -> std::result::Result<(), String> {
    let pid_path =
        Daemon::pid_file_path().ok_or_else(|| "Could not determine PID file path".to_string())?;

    if !pid_path.exists() {
        return Err("No daemon is running (PID file not found)".to_string());
    }

    let pid = Daemon::read_pid().ok_or_else(|| "Invalid PID in PID file".to_string())?;

    #[cfg(unix)]
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status();

    #[cfg(windows)]
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status();

    match status {
        Ok(s) if s.success() => {
            let _ = fs::remove_file(&pid_path);
            Ok(())
        }
        Ok(_) => Err(format!("Failed to stop daemon (PID {})", pid)),
        Err(e) => Err(format!("Failed to send signal: {}", e)),
    }
}

/// Check daemon status
pub fn daemon_status() -> String {
    match Daemon::read_pid() {
        Some(pid) if Daemon::process_exists(pid) => {
            format!("Daemon is running (PID: {})", pid)
        }
        Some(_) => "Daemon is not running (stale PID file)".to_string(),
        None => "Daemon is not running".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::{Feed, Item};

    #[test]
    fn test_parse_interval() {
        assert_eq!(DaemonConfig::parse_interval("1h").unwrap(), 3600);
        assert_eq!(DaemonConfig::parse_interval("30m").unwrap(), 1800);
        assert_eq!(DaemonConfig::parse_interval("1d").unwrap(), 86400);
        assert_eq!(DaemonConfig::parse_interval("60s").unwrap(), 60);
        assert_eq!(DaemonConfig::parse_interval("3600").unwrap(), 3600);
        assert_eq!(DaemonConfig::parse_interval(" 6H ").unwrap(), 21600);
        assert!(DaemonConfig::parse_interval("invalid").is_err());
        assert!(DaemonConfig::parse_interval("5w").is_err());
        assert!(DaemonConfig::parse_interval("0m").is_err());
        assert!(DaemonConfig::parse_interval("").is_err());
    }

    #[test]
    fn test_parse_interval_overflow() {
        assert!(DaemonConfig::parse_interval("300000000000000000d").is_err());
        assert_eq!(
            DaemonConfig::parse_interval("18446744073709551615").unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(DaemonConfig::format_interval(3600), "1h");
        assert_eq!(DaemonConfig::format_interval(1800), "30m");
        assert_eq!(DaemonConfig::format_interval(86400), "1d");
        assert_eq!(DaemonConfig::format_interval(90), "90s");
        assert_eq!(DaemonConfig::format_interval(7200), "2h");
    }

    #[tokio::test]
    async fn test_cycle_dispatches_after_failed_refresh() {
        // Nothing listens on the discard port, so the refresh fails fast.
        let url = "http://127.0.0.1:9/feed";
        let ctx = Arc::new(AppContext::in_memory(Config::default()).unwrap());
        let feed_id = ctx
            .store
            .add_feed(&Feed::new(url.into()).with_notify(true))
            .unwrap();
        let item_id = ctx
            .store
            .add_item(&Item::new(feed_id, url, "a"))
            .unwrap()
            .unwrap();

        let daemon = Daemon::new(ctx.clone(), DaemonConfig::default());
        daemon.run_cycle().await;

        assert!(ctx.dispatcher.notifier().get(item_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cycle_respects_notify_flag() {
        let ctx = Arc::new(AppContext::in_memory(Config::default()).unwrap());
        let daemon = Daemon::new(
            ctx.clone(),
            DaemonConfig {
                notify: false,
                ..Default::default()
            },
        );

        daemon.run_cycle().await;
        daemon.stop();

        assert!(!daemon.running.load(Ordering::SeqCst));
        assert!(ctx.dispatcher.notifier().active().unwrap().is_empty());
    }
}
