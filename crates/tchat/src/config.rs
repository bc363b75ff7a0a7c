use anyhow::{bail, Result};
use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tchat_core::{ClearPolicy, ConsumerConfig, FingerprintMode, PipelineConfig};
use tchat_webdriver::{Browser, DriverLauncher, LoginConfig};

const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Resolved runtime settings. `Debug` redacts the password.
#[derive(Clone)]
pub struct Config {
    pub tracker_url: String,
    pub username: String,
    pub password: String,
    pub webdriver_url: String,
    pub webdriver_autostart: bool,
    pub webdriver_start_timeout: Duration,
    pub browser: Browser,
    pub headless: bool,
    pub debug: bool,
    pub poll_interval: Duration,
    pub tick_interval: Duration,
    pub channel_capacity: usize,
    pub backpressure: Duration,
    pub fingerprint: FingerprintMode,
    pub clear_policy: ClearPolicy,
    pub log_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(name = "tchat", about = "Live tracker chatbox in the terminal")]
pub struct Args {
    /// Tracker base URL (falls back to TRACKER_URL).
    #[arg(long, default_value = "")]
    tracker_url: String,
    /// Falls back to TRACKER_USERNAME.
    #[arg(long, default_value = "")]
    username: String,
    /// WebDriver endpoint (falls back to TCHAT_WEBDRIVER_URL).
    #[arg(long, default_value = "")]
    webdriver_url: String,
    /// edge, chrome or firefox (falls back to TCHAT_BROWSER).
    #[arg(long, default_value = "")]
    browser: String,
    /// Never launch a local driver (also TCHAT_NO_WEBDRIVER_AUTOSTART).
    #[arg(long, default_value_t = false)]
    no_webdriver_autostart: bool,
    #[arg(long, default_value_t = 10_000)]
    webdriver_start_ms: u64,
    /// Show the browser window.
    #[arg(long, default_value_t = false)]
    headed: bool,
    #[arg(long, default_value_t = false)]
    debug: bool,
    #[arg(long, default_value_t = 50)]
    poll_ms: u64,
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
    #[arg(long, default_value_t = 1024)]
    channel_capacity: usize,
    #[arg(long, default_value_t = 1000)]
    backpressure_ms: u64,
    /// time-author-body or time-body.
    #[arg(long, default_value = "time-author-body")]
    fingerprint: String,
    /// Keep the typed message when sending it fails.
    #[arg(long, default_value_t = false)]
    keep_failed_input: bool,
    #[arg(long, default_value = "")]
    log_dir: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("tracker_url", &self.tracker_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("webdriver_url", &self.webdriver_url)
            .field("webdriver_autostart", &self.webdriver_autostart)
            .field("browser", &self.browser)
            .field("headless", &self.headless)
            .field("debug", &self.debug)
            .field("poll_interval", &self.poll_interval)
            .field("tick_interval", &self.tick_interval)
            .field("channel_capacity", &self.channel_capacity)
            .field("fingerprint", &self.fingerprint)
            .field("clear_policy", &self.clear_policy)
            .field("log_dir", &self.log_dir)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn driver_launcher(&self) -> DriverLauncher {
        let mut launcher = DriverLauncher::new(self.browser);
        launcher.start_timeout = self.webdriver_start_timeout;
        launcher.log_dir = self.log_dir.clone();
        launcher
    }

    pub fn login_config(&self) -> LoginConfig {
        let mut login = LoginConfig::new(&self.tracker_url, &self.username, &self.password);
        login.browser = self.browser;
        login.headless = self.headless;
        login
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            poll_interval: self.poll_interval,
            channel_capacity: self.channel_capacity,
            backpressure: self.backpressure,
            fingerprint: self.fingerprint,
            ..PipelineConfig::default()
        }
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            tick_interval: self.tick_interval,
            clear_policy: self.clear_policy,
        }
    }
}

/// Reads `.env`, the command line and the environment, in that order of
/// loading; explicit flags win over variables.
pub fn load_config() -> Result<Config> {
    let _ = dotenv::dotenv();
    let args = Args::parse();
    resolve(args, |key| std::env::var(key).ok())
}

pub fn resolve(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let pick = |flag: &str, key: &str| -> Option<String> {
        if !flag.trim().is_empty() {
            return Some(flag.trim().to_string());
        }
        env(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let Some(tracker_url) = pick(&args.tracker_url, "TRACKER_URL") else {
        bail!("TRACKER_URL is not set (use --tracker-url or .env)");
    };
    if !tracker_url.starts_with("http://") && !tracker_url.starts_with("https://") {
        bail!("TRACKER_URL must be an http(s) URL: {tracker_url}");
    }
    let Some(username) = pick(&args.username, "TRACKER_USERNAME") else {
        bail!("TRACKER_USERNAME is not set");
    };
    // Never taken from argv so it stays out of the process list.
    let Some(password) = env("TRACKER_PASSWORD").filter(|value| !value.is_empty()) else {
        bail!("TRACKER_PASSWORD is not set");
    };

    let webdriver_url = pick(&args.webdriver_url, "TCHAT_WEBDRIVER_URL")
        .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string());
    let browser = match pick(&args.browser, "TCHAT_BROWSER") {
        Some(value) => value.parse::<Browser>().map_err(anyhow::Error::msg)?,
        None => Browser::default(),
    };
    let fingerprint = args
        .fingerprint
        .parse::<FingerprintMode>()
        .map_err(anyhow::Error::msg)?;

    if args.poll_ms == 0 || args.tick_ms == 0 {
        bail!("--poll-ms and --tick-ms must be > 0");
    }
    if args.webdriver_start_ms == 0 {
        bail!("--webdriver-start-ms must be > 0");
    }
    if args.channel_capacity == 0 {
        bail!("--channel-capacity must be > 0");
    }

    let webdriver_autostart = !(args.no_webdriver_autostart
        || env("TCHAT_NO_WEBDRIVER_AUTOSTART").is_some_and(|value| env_true(&value)));
    let debug = args.debug || env("TCHAT_DEBUG").is_some_and(|value| env_true(&value));
    let log_dir = pick(&args.log_dir, "TCHAT_LOG_DIR")
        .map(PathBuf::from)
        .or_else(|| default_log_dir(&env));

    Ok(Config {
        tracker_url: tracker_url.trim_end_matches('/').to_string(),
        username,
        password,
        webdriver_url,
        webdriver_autostart,
        webdriver_start_timeout: Duration::from_millis(args.webdriver_start_ms),
        browser,
        headless: !args.headed,
        debug,
        poll_interval: Duration::from_millis(args.poll_ms),
        tick_interval: Duration::from_millis(args.tick_ms),
        channel_capacity: args.channel_capacity,
        backpressure: Duration::from_millis(args.backpressure_ms),
        fingerprint,
        clear_policy: if args.keep_failed_input {
            ClearPolicy::OnSuccess
        } else {
            ClearPolicy::Always
        },
        log_dir,
    })
}

fn default_log_dir(env: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(value) = env("XDG_STATE_HOME").filter(|v| !v.trim().is_empty()) {
        return Some(PathBuf::from(value).join("tchat"));
    }
    env("HOME")
        .filter(|v| !v.trim().is_empty())
        .map(|home| PathBuf::from(home).join(".local").join("state").join("tchat"))
}

fn env_true(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
