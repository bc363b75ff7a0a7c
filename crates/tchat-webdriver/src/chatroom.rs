//! Browser-side half of the chat feed: the mutation observer bridge, the
//! outgoing textarea and session teardown.

use crate::wire::{Locator, WebDriverClient, WireError, ENTER_KEY};
use async_trait::async_trait;
use serde_json::Value;
use tchat_core::{
    FragmentProbe, OutgoingSender, ProbeError, RawFragment, SendError, SessionError,
    SessionRelease,
};
use tracing::{debug, info, warn};

pub const CHAT_CONTAINER_CSS: &str = "ul.chatroom__messages";
pub const CHAT_INPUT_CSS: &str = "textarea#chatbox__messages-create";

/// Collects the outer HTML of every `<li>` appended to the chat list into
/// `window.newMessages`. Installing twice is a no-op.
const OBSERVER_SCRIPT: &str = r#"
if (!window.newMessages) {
    window.newMessages = [];
    var list = document.querySelector('ul.chatroom__messages');
    if (list) {
        new MutationObserver(function (records) {
            records.forEach(function (record) {
                record.addedNodes.forEach(function (node) {
                    if (node.nodeType === Node.ELEMENT_NODE && node.matches('li')) {
                        window.newMessages.push(node.outerHTML);
                    }
                });
            });
        }).observe(list, { childList: true });
    }
}
return true;
"#;

/// Hands over and resets the collected nodes; `null` when the observer is
/// gone (page reloaded).
const DRAIN_SCRIPT: &str = r#"
if (!window.newMessages) { return null; }
var batch = window.newMessages;
window.newMessages = [];
return batch;
"#;

/// An authenticated browser session parked on the chat page.
#[derive(Debug)]
pub struct ChatroomSession {
    client: WebDriverClient,
    session_id: String,
}

impl ChatroomSession {
    pub(crate) fn new(client: WebDriverClient, session_id: String) -> Self {
        Self { client, session_id }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn client(&self) -> &WebDriverClient {
        &self.client
    }

    pub async fn install_observer(&self) -> Result<(), WireError> {
        self.client
            .execute_sync(&self.session_id, OBSERVER_SCRIPT)
            .await?;
        info!(event = "observer_installed", session_id = %self.session_id);
        Ok(())
    }
}

fn probe_error(err: WireError) -> ProbeError {
    if err.is_session_lost() {
        ProbeError::SessionLost(err.to_string())
    } else if err.is_script_error() {
        ProbeError::Script(err.to_string())
    } else {
        ProbeError::Transport(err.to_string())
    }
}

pub(crate) fn fragments_from_value(value: Value) -> Option<Vec<RawFragment>> {
    match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(html) => Some(RawFragment::from(html)),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

#[async_trait]
impl FragmentProbe for ChatroomSession {
    async fn poll_new_fragments(&self) -> Result<Vec<RawFragment>, ProbeError> {
        let value = self
            .client
            .execute_sync(&self.session_id, DRAIN_SCRIPT)
            .await
            .map_err(probe_error)?;
        match fragments_from_value(value) {
            Some(fragments) => {
                if !fragments.is_empty() {
                    debug!(event = "probe_batch", count = fragments.len());
                }
                Ok(fragments)
            }
            None => {
                warn!(event = "observer_missing", session_id = %self.session_id);
                self.install_observer().await.map_err(probe_error)?;
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl OutgoingSender for ChatroomSession {
    async fn send_outgoing(&self, text: &str) -> Result<(), SendError> {
        let transport = |err: WireError| SendError::Transport(err.to_string());
        let input = self
            .client
            .find_element(&self.session_id, Locator::Css(CHAT_INPUT_CSS))
            .await
            .map_err(transport)?
            .ok_or(SendError::InputMissing)?;
        self.client
            .clear(&self.session_id, &input)
            .await
            .map_err(transport)?;
        self.client
            .send_keys(&self.session_id, &input, text)
            .await
            .map_err(transport)?;
        self.client
            .send_keys(&self.session_id, &input, ENTER_KEY)
            .await
            .map_err(transport)?;
        Ok(())
    }
}

#[async_trait]
impl SessionRelease for ChatroomSession {
    async fn close(&self) -> Result<(), SessionError> {
        self.client
            .delete_session(&self.session_id)
            .await
            .map_err(|err| SessionError::Release(err.to_string()))
    }
}
