mod config;
mod logging;
mod terminal;
mod theme;
mod ui;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tchat_core::{ConsumerLoop, ConsumerReport, Pipeline, SessionLease};
use tchat_webdriver::{
    ensure_driver, establish_session, ChatroomSession, DriverProcess, WebDriverClient,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// How long the ingest task gets to finish after the UI has stopped.
const INGEST_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;
    let log_guard = logging::init_logging(&config);
    info!(
        event = "tchat_start",
        tracker = %config.tracker_url,
        webdriver = %config.webdriver_url,
        browser = %config.browser,
        headless = config.headless,
        log_file = ?log_guard.as_ref().and_then(|guard| guard.path())
    );

    let driver = start_driver(&config).await?;
    let result = run_chat(&config).await;
    if let Some(driver) = driver {
        driver.shutdown().await;
    }
    result
}

async fn start_driver(config: &config::Config) -> Result<Option<DriverProcess>> {
    if !config.webdriver_autostart {
        return Ok(None);
    }
    let driver = ensure_driver(&config.webdriver_url, &config.driver_launcher())
        .await
        .with_context(|| format!("no webdriver at {}", config.webdriver_url))?;
    if let Some(driver) = &driver {
        info!(event = "webdriver_autostarted", port = driver.port());
    }
    Ok(driver)
}

async fn run_chat(config: &config::Config) -> Result<()> {
    let client = WebDriverClient::new(&config.webdriver_url)
        .with_context(|| format!("webdriver client for {}", config.webdriver_url))?;
    let session = match establish_session(client, &config.login_config()).await {
        Ok(session) => session,
        Err(err) => {
            error!(event = "login_failed", error = %err);
            return Err(err).context("could not open the chatroom");
        }
    };
    let lease = SessionLease::new(session);

    let (ingestor, receiver) = Pipeline::new(config.pipeline_config()).split();
    let (stop_tx, stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);
    let ingest = tokio::spawn(ingestor.run(lease.clone(), stop_rx.clone()));

    let signal_tx = stop_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(event = "signal_received", signal = "SIGINT");
            let _ = signal_tx.send(true);
        }
    });

    let ui = run_ui(config, receiver, &lease, stop_rx).await;

    let _ = stop_tx.send(true);
    match tokio::time::timeout(INGEST_SHUTDOWN_GRACE, ingest).await {
        Ok(Ok(report)) => info!(
            event = "ingest_report",
            exit = ?report.exit,
            delivered = report.stats.delivered,
            duplicates = report.stats.duplicates,
            dropped = report.stats.dropped,
            released_session = report.released_session
        ),
        Ok(Err(err)) => error!(event = "ingest_join_failed", error = %err),
        Err(_) => warn!(
            event = "ingest_shutdown_timeout",
            grace_ms = INGEST_SHUTDOWN_GRACE.as_millis() as u64
        ),
    }
    lease.release("main").await;

    let report = ui?;
    info!(
        event = "tchat_stop",
        exit = ?report.exit,
        sent = report.stats.sent,
        send_failures = report.stats.send_failures
    );
    Ok(())
}

async fn run_ui(
    config: &config::Config,
    receiver: tchat_core::outbound::RecordReceiver,
    lease: &Arc<SessionLease<ChatroomSession>>,
    stop_rx: watch::Receiver<bool>,
) -> Result<ConsumerReport> {
    let mut surface =
        terminal::TerminalSurface::enter(ui::DEFAULT_SCROLLBACK).context("terminal setup")?;
    logging::set_console(false);

    let result = ConsumerLoop::new(config.consumer_config(), receiver)
        .run(&mut surface, lease.as_ref(), stop_rx)
        .await;

    let restored = surface.leave();
    logging::set_console(true);
    restored.context("terminal restore")?;
    Ok(result?)
}
