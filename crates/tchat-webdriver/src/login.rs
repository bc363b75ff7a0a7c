//! Login handshake against the tracker's web form.

use crate::capabilities::{capabilities, Browser};
use crate::chatroom::{ChatroomSession, CHAT_CONTAINER_CSS};
use crate::wire::{ElementId, Locator, WebDriverClient, WireError};
use std::time::Duration;
use tchat_core::{AuthenticationError, SessionRelease};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const USERNAME_FIELD: Locator<'static> = Locator::Css("#username");
const PASSWORD_FIELD: Locator<'static> = Locator::Css("#password");
const LOGIN_BUTTON: Locator<'static> = Locator::XPath(r#"//button[contains(text(), "Login")]"#);

#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub tracker_url: String,
    pub username: String,
    pub password: String,
    pub browser: Browser,
    pub headless: bool,
    pub field_timeout: Duration,
    pub chat_timeout: Duration,
    pub poll_every: Duration,
}

impl LoginConfig {
    pub fn new(tracker_url: &str, username: &str, password: &str) -> Self {
        Self {
            tracker_url: tracker_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            browser: Browser::default(),
            headless: true,
            field_timeout: Duration::from_secs(20),
            chat_timeout: Duration::from_secs(60),
            poll_every: Duration::from_millis(250),
        }
    }

    pub fn login_url(&self) -> String {
        format!("{}/login", self.tracker_url)
    }
}

/// Opens a browser, signs in and waits for the chat list. The browser
/// session is deleted again when any step fails.
pub async fn establish_session(
    client: WebDriverClient,
    config: &LoginConfig,
) -> Result<ChatroomSession, AuthenticationError> {
    info!(
        event = "browser_start",
        browser = %config.browser,
        headless = config.headless,
        endpoint = client.endpoint()
    );
    let session_id = client
        .new_session(&capabilities(config.browser, config.headless))
        .await
        .map_err(driver_error)?;
    let session = ChatroomSession::new(client, session_id);

    match sign_in(&session, config).await {
        Ok(()) => Ok(session),
        Err(err) => {
            warn!(event = "login_failed", error = %err);
            if let Err(close_err) = session.close().await {
                warn!(event = "session_release_failed", origin = "login", error = %close_err);
            }
            Err(err)
        }
    }
}

async fn sign_in(
    session: &ChatroomSession,
    config: &LoginConfig,
) -> Result<(), AuthenticationError> {
    let client = session.client();
    let id = session.session_id();
    let login_url = config.login_url();

    info!(event = "login_navigate", url = %login_url);
    client.navigate(id, &login_url).await.map_err(driver_error)?;

    let username = wait_visible(
        session,
        USERNAME_FIELD,
        "username field",
        config.field_timeout,
        config.poll_every,
    )
    .await?;
    client
        .send_keys(id, &username, &config.username)
        .await
        .map_err(driver_error)?;
    debug!(event = "login_username_entered");

    let password = wait_visible(
        session,
        PASSWORD_FIELD,
        "password field",
        config.field_timeout,
        config.poll_every,
    )
    .await?;
    client
        .send_keys(id, &password, &config.password)
        .await
        .map_err(driver_error)?;
    debug!(event = "login_password_entered");

    let button = client
        .find_element(id, LOGIN_BUTTON)
        .await
        .map_err(driver_error)?
        .ok_or_else(|| AuthenticationError::Rejected("login button not found".to_string()))?;
    client.click(id, &button).await.map_err(driver_error)?;

    let landed =
        wait_url_change(session, &login_url, config.field_timeout, config.poll_every).await?;
    info!(event = "login_redirected", url = %landed);

    wait_visible(
        session,
        Locator::Css(CHAT_CONTAINER_CSS),
        "chat container",
        config.chat_timeout,
        config.poll_every,
    )
    .await?;
    info!(event = "chat_container_loaded");

    session.install_observer().await.map_err(driver_error)
}

async fn wait_visible(
    session: &ChatroomSession,
    locator: Locator<'_>,
    what: &str,
    timeout: Duration,
    poll_every: Duration,
) -> Result<ElementId, AuthenticationError> {
    let client = session.client();
    let id = session.session_id();
    let deadline = Instant::now() + timeout;
    loop {
        match find_visible(client, id, locator).await {
            Ok(Some(element)) => return Ok(element),
            Ok(None) => {}
            Err(err) if err.is_session_lost() => return Err(driver_error(err)),
            Err(err) => debug!(event = "login_wait_retry", what = what, error = %err),
        }
        if Instant::now() >= deadline {
            return Err(timeout_error(what, timeout));
        }
        tokio::time::sleep(poll_every).await;
    }
}

async fn find_visible(
    client: &WebDriverClient,
    session_id: &str,
    locator: Locator<'_>,
) -> Result<Option<ElementId>, WireError> {
    let Some(element) = client.find_element(session_id, locator).await? else {
        return Ok(None);
    };
    if client.is_displayed(session_id, &element).await? {
        Ok(Some(element))
    } else {
        Ok(None)
    }
}

async fn wait_url_change(
    session: &ChatroomSession,
    from: &str,
    timeout: Duration,
    poll_every: Duration,
) -> Result<String, AuthenticationError> {
    let client = session.client();
    let id = session.session_id();
    let deadline = Instant::now() + timeout;
    loop {
        match client.current_url(id).await {
            Ok(url) if url != from => return Ok(url),
            Ok(_) => {}
            Err(err) if err.is_session_lost() => return Err(driver_error(err)),
            Err(err) => debug!(event = "login_wait_retry", what = "redirect", error = %err),
        }
        if Instant::now() >= deadline {
            return Err(timeout_error("redirect after login", timeout));
        }
        tokio::time::sleep(poll_every).await;
    }
}

fn driver_error(err: WireError) -> AuthenticationError {
    AuthenticationError::Driver(err.to_string())
}

fn timeout_error(what: &str, timeout: Duration) -> AuthenticationError {
    AuthenticationError::Timeout {
        what: what.to_string(),
        secs: timeout.as_secs(),
    }
}
