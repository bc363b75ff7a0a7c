//! Local WebDriver server autostart: when nothing listens on a local
//! endpoint, launch the browser's driver from `PATH` on that port.

use crate::capabilities::Browser;
use reqwest::Url;
use std::ffi::{OsStr, OsString};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(10);
const READY_POLL: Duration = Duration::from_millis(200);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const DRIVER_LOG_NAME: &str = "webdriver.log";

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid webdriver url {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("webdriver at {0} is unreachable and not local")]
    RemoteUnreachable(String),
    #[error("{binary} not found on PATH")]
    NotFound { binary: &'static str },
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },
    #[error("{binary} exited early with {status}")]
    ExitedEarly { binary: String, status: ExitStatus },
    #[error("{binary} not ready after {secs}s")]
    NotReady { binary: String, secs: u64 },
}

#[derive(Debug, Clone)]
pub struct DriverLauncher {
    pub browser: Browser,
    pub start_timeout: Duration,
    /// `webdriver.log` goes here; output is discarded when unset.
    pub log_dir: Option<PathBuf>,
    /// Searched instead of `PATH` when set.
    pub search_path: Option<OsString>,
}

impl DriverLauncher {
    pub fn new(browser: Browser) -> Self {
        Self {
            browser,
            start_timeout: DEFAULT_START_TIMEOUT,
            log_dir: None,
            search_path: None,
        }
    }
}

/// A driver server this process started. Killed on `shutdown` or drop.
#[derive(Debug)]
pub struct DriverProcess {
    child: Child,
    binary: String,
    port: u16,
}

impl DriverProcess {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn shutdown(mut self) {
        match self.child.kill().await {
            Ok(()) => info!(event = "webdriver_stopped", binary = %self.binary, port = self.port),
            Err(err) => warn!(event = "webdriver_stop_failed", binary = %self.binary, error = %err),
        }
    }
}

pub fn driver_binary(browser: Browser) -> &'static str {
    match browser {
        Browser::Edge => "msedgedriver",
        Browser::Chrome => "chromedriver",
        Browser::Firefox => "geckodriver",
    }
}

fn driver_args(browser: Browser, port: u16) -> Vec<String> {
    match browser {
        Browser::Firefox => vec!["--port".to_string(), port.to_string()],
        Browser::Edge | Browser::Chrome => vec![format!("--port={port}")],
    }
}

/// Returns `Ok(None)` when a server already answers at `endpoint`.
pub async fn ensure_driver(
    endpoint: &str,
    launcher: &DriverLauncher,
) -> Result<Option<DriverProcess>, DriverError> {
    let (host, port) = endpoint_addr(endpoint)?;
    if reachable(&host, port).await {
        debug!(event = "webdriver_reachable", endpoint = endpoint);
        return Ok(None);
    }
    if !is_local_host(&host) {
        return Err(DriverError::RemoteUnreachable(endpoint.to_string()));
    }

    let binary = driver_binary(launcher.browser);
    let search = launcher
        .search_path
        .clone()
        .or_else(|| std::env::var_os("PATH"))
        .unwrap_or_default();
    let path = find_on_path(binary, &search).ok_or(DriverError::NotFound { binary })?;
    let shown = path.display().to_string();

    let mut command = Command::new(&path);
    command
        .args(driver_args(launcher.browser, port))
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some((stdout, stderr)) = open_driver_log(launcher.log_dir.as_deref()) {
        command.stdout(stdout).stderr(stderr);
    } else {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let mut child = command.spawn().map_err(|source| DriverError::Spawn {
        binary: shown.clone(),
        source,
    })?;
    info!(event = "webdriver_spawned", binary = %shown, port = port, pid = ?child.id());

    let deadline = Instant::now() + launcher.start_timeout;
    loop {
        if reachable(&host, port).await {
            info!(event = "webdriver_ready", binary = %shown, port = port);
            return Ok(Some(DriverProcess {
                child,
                binary: shown,
                port,
            }));
        }
        if let Ok(Some(status)) = child.try_wait() {
            return Err(DriverError::ExitedEarly {
                binary: shown,
                status,
            });
        }
        if Instant::now() >= deadline {
            let _ = child.kill().await;
            return Err(DriverError::NotReady {
                binary: shown,
                secs: launcher.start_timeout.as_secs(),
            });
        }
        tokio::time::sleep(READY_POLL).await;
    }
}

fn endpoint_addr(endpoint: &str) -> Result<(String, u16), DriverError> {
    let invalid = |reason: &str| DriverError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(endpoint).map_err(|err| invalid(&err.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| invalid("missing host"))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| invalid("missing port"))?;
    Ok((host, port))
}

fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

async fn reachable(host: &str, port: u16) -> bool {
    matches!(
        tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

fn find_on_path(name: &str, search: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search)
        .flat_map(|dir| candidate_names(name).map(move |file| dir.join(file)))
        .find(|candidate| is_executable(candidate))
}

fn candidate_names(name: &str) -> impl Iterator<Item = String> {
    let mut names = vec![name.to_string()];
    if cfg!(windows) {
        names.push(format!("{name}.exe"));
    }
    names.into_iter()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn open_driver_log(log_dir: Option<&Path>) -> Option<(Stdio, Stdio)> {
    let dir = log_dir?;
    let opened = std::fs::create_dir_all(dir).and_then(|()| {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(DRIVER_LOG_NAME))?;
        let err_file = file.try_clone()?;
        Ok((Stdio::from(file), Stdio::from(err_file)))
    });
    match opened {
        Ok(pair) => Some(pair),
        Err(err) => {
            warn!(event = "webdriver_log_unavailable", dir = %dir.display(), error = %err);
            None
        }
    }
}
