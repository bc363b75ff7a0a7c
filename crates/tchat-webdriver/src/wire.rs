//! Minimal W3C WebDriver client: just the commands the chat tool needs.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const LOG_BODY_CHARS: usize = 240;

/// WebDriver key code for Enter.
pub const ENTER_KEY: &str = "\u{E007}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("{error}: {message}")]
    Protocol { error: String, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl WireError {
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            WireError::Protocol { error, .. }
                if error == "invalid session id" || error == "no such window"
        )
    }

    pub fn is_no_such_element(&self) -> bool {
        matches!(self, WireError::Protocol { error, .. } if error == "no such element")
    }

    pub fn is_script_error(&self) -> bool {
        matches!(
            self,
            WireError::Protocol { error, .. }
                if error == "javascript error" || error == "script timeout"
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Locator<'a> {
    Css(&'a str),
    XPath(&'a str),
}

impl Locator<'_> {
    fn to_json(self) -> Value {
        match self {
            Locator::Css(css) => json!({ "using": "css selector", "value": css }),
            Locator::XPath(xpath) => json!({ "using": "xpath", "value": xpath }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId(String);

impl ElementId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: reqwest::Client,
    endpoint: String,
}

impl WebDriverClient {
    pub fn new(endpoint: &str) -> Result<Self, WireError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| WireError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn new_session(&self, capabilities: &Value) -> Result<String, WireError> {
        let value = self
            .command(Method::POST, "/session", Some(capabilities))
            .await?;
        value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| WireError::Decode(format!("session id missing: {value}")))
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), WireError> {
        self.command(Method::DELETE, &format!("/session/{session_id}"), None)
            .await
            .map(|_| ())
    }

    pub async fn navigate(&self, session_id: &str, url: &str) -> Result<(), WireError> {
        self.command(
            Method::POST,
            &format!("/session/{session_id}/url"),
            Some(&json!({ "url": url })),
        )
        .await
        .map(|_| ())
    }

    pub async fn current_url(&self, session_id: &str) -> Result<String, WireError> {
        let value = self
            .command(Method::GET, &format!("/session/{session_id}/url"), None)
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WireError::Decode(format!("url is not a string: {value}")))
    }

    /// `Ok(None)` when nothing on the page matches.
    pub async fn find_element(
        &self,
        session_id: &str,
        locator: Locator<'_>,
    ) -> Result<Option<ElementId>, WireError> {
        let result = self
            .command(
                Method::POST,
                &format!("/session/{session_id}/element"),
                Some(&locator.to_json()),
            )
            .await;
        let value = match result {
            Ok(value) => value,
            Err(err) if err.is_no_such_element() => return Ok(None),
            Err(err) => return Err(err),
        };
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| Some(ElementId(id.to_string())))
            .ok_or_else(|| WireError::Decode(format!("element reference missing: {value}")))
    }

    pub async fn is_displayed(
        &self,
        session_id: &str,
        element: &ElementId,
    ) -> Result<bool, WireError> {
        let value = self
            .command(
                Method::GET,
                &format!("/session/{session_id}/element/{}/displayed", element.0),
                None,
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn send_keys(
        &self,
        session_id: &str,
        element: &ElementId,
        text: &str,
    ) -> Result<(), WireError> {
        self.command(
            Method::POST,
            &format!("/session/{session_id}/element/{}/value", element.0),
            Some(&json!({ "text": text })),
        )
        .await
        .map(|_| ())
    }

    pub async fn clear(&self, session_id: &str, element: &ElementId) -> Result<(), WireError> {
        self.command(
            Method::POST,
            &format!("/session/{session_id}/element/{}/clear", element.0),
            Some(&json!({})),
        )
        .await
        .map(|_| ())
    }

    pub async fn click(&self, session_id: &str, element: &ElementId) -> Result<(), WireError> {
        self.command(
            Method::POST,
            &format!("/session/{session_id}/element/{}/click", element.0),
            Some(&json!({})),
        )
        .await
        .map(|_| ())
    }

    pub async fn execute_sync(&self, session_id: &str, script: &str) -> Result<Value, WireError> {
        self.command(
            Method::POST,
            &format!("/session/{session_id}/execute/sync"),
            Some(&json!({ "script": script, "args": [] })),
        )
        .await
    }

    /// Sends one command and unwraps the `value` member of the reply.
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, WireError> {
        let url = format!("{}{}", self.endpoint, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let res = request
            .send()
            .await
            .map_err(|err| WireError::Transport(err.to_string()))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|err| WireError::Transport(err.to_string()))?;
        debug!(
            event = "webdriver_command",
            method = %method,
            path = path,
            status = status.as_u16()
        );
        parse_reply(status.as_u16(), &text)
    }
}

/// Every W3C reply is wrapped as `{"value": ...}`.
#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
struct ErrorValue {
    error: String,
    #[serde(default)]
    message: String,
}

pub(crate) fn parse_reply(status: u16, body: &str) -> Result<Value, WireError> {
    let parsed: Option<Reply> = serde_json::from_str(body).ok();
    if let Some(err) = parsed
        .as_ref()
        .and_then(|reply| ErrorValue::deserialize(&reply.value).ok())
    {
        let message = if err.message.is_empty() {
            "unknown webdriver error".to_string()
        } else {
            err.message
        };
        return Err(WireError::Protocol {
            error: err.error,
            message,
        });
    }
    if !(200..300).contains(&status) {
        return Err(WireError::Http {
            status,
            body: truncate_for_log(body, LOG_BODY_CHARS),
        });
    }
    match parsed {
        Some(reply) => Ok(reply.value),
        None => Err(WireError::Decode(truncate_for_log(body, LOG_BODY_CHARS))),
    }
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let mut out: String = input.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_value_is_unwrapped() {
        let value = parse_reply(200, r#"{"value":{"sessionId":"abc"}}"#).unwrap();
        assert_eq!(value["sessionId"], "abc");
        assert_eq!(parse_reply(200, r#"{"value":null}"#).unwrap(), Value::Null);
    }

    #[test]
    fn protocol_error_wins_over_status() {
        let err = parse_reply(
            404,
            r#"{"value":{"error":"invalid session id","message":"session deleted","stacktrace":""}}"#,
        )
        .unwrap_err();
        assert!(err.is_session_lost());
        assert_eq!(err.to_string(), "invalid session id: session deleted");
    }

    #[test]
    fn non_json_failure_keeps_status() {
        let err = parse_reply(502, "bad gateway").unwrap_err();
        assert_eq!(
            err,
            WireError::Http {
                status: 502,
                body: "bad gateway".to_string()
            }
        );
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(LOG_BODY_CHARS + 10);
        match parse_reply(200, &body).unwrap_err() {
            WireError::Decode(text) => assert_eq!(text.len(), LOG_BODY_CHARS + 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn locators_encode_strategy() {
        assert_eq!(
            Locator::Css("#username").to_json(),
            json!({ "using": "css selector", "value": "#username" })
        );
        assert_eq!(Locator::XPath("//button").to_json()["using"], "xpath");
    }
}
