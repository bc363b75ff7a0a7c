use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::time::Duration;
use tchat_core::{AuthenticationError, FragmentProbe, OutgoingSender, ProbeError, SendError};
use tchat_webdriver::{establish_session, LoginConfig, WebDriverClient};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

async fn mock_json(
    server: &mut ServerGuard,
    method: &str,
    path: &str,
    body: serde_json::Value,
) -> mockito::Mock {
    server
        .mock(method, path)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

async fn mock_null(server: &mut ServerGuard, method: &str, path: &str) -> mockito::Mock {
    mock_json(server, method, path, json!({ "value": null })).await
}

async fn mock_element(server: &mut ServerGuard, selector: &str, element: &str) -> mockito::Mock {
    server
        .mock("POST", "/session/s1/element")
        .match_body(Matcher::PartialJson(json!({ "value": selector })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "value": { ELEMENT_KEY: element } }).to_string())
        .create_async()
        .await
}

fn fast_config(tracker_url: &str) -> LoginConfig {
    let mut config = LoginConfig::new(tracker_url, "alice", "hunter2");
    config.field_timeout = Duration::from_millis(200);
    config.chat_timeout = Duration::from_millis(200);
    config.poll_every = Duration::from_millis(20);
    config
}

#[tokio::test]
async fn login_walks_the_form_and_installs_observer() {
    let mut server = Server::new_async().await;
    let tracker = "https://tracker.test";

    let _create = mock_json(
        &mut server,
        "POST",
        "/session",
        json!({ "value": { "sessionId": "s1", "capabilities": {} } }),
    )
    .await;
    let navigate = server
        .mock("POST", "/session/s1/url")
        .match_body(Matcher::PartialJson(json!({ "url": "https://tracker.test/login" })))
        .with_status(200)
        .with_body(r#"{"value":null}"#)
        .expect(1)
        .create_async()
        .await;
    let _user = mock_element(&mut server, "#username", "e-user").await;
    let _pass = mock_element(&mut server, "#password", "e-pass").await;
    let _button =
        mock_element(&mut server, r#"//button[contains(text(), "Login")]"#, "e-login").await;
    let _chat = mock_element(&mut server, "ul.chatroom__messages", "e-chat").await;
    let _displayed = server
        .mock(
            "GET",
            Matcher::Regex(r"^/session/s1/element/e-[a-z]+/displayed$".to_string()),
        )
        .with_status(200)
        .with_body(r#"{"value":true}"#)
        .create_async()
        .await;
    let typed_user = server
        .mock("POST", "/session/s1/element/e-user/value")
        .match_body(Matcher::PartialJson(json!({ "text": "alice" })))
        .with_status(200)
        .with_body(r#"{"value":null}"#)
        .expect(1)
        .create_async()
        .await;
    let typed_pass = server
        .mock("POST", "/session/s1/element/e-pass/value")
        .match_body(Matcher::PartialJson(json!({ "text": "hunter2" })))
        .with_status(200)
        .with_body(r#"{"value":null}"#)
        .expect(1)
        .create_async()
        .await;
    let click = mock_null(&mut server, "POST", "/session/s1/element/e-login/click").await;
    let _url = mock_json(
        &mut server,
        "GET",
        "/session/s1/url",
        json!({ "value": "https://tracker.test/" }),
    )
    .await;
    let observer = mock_json(
        &mut server,
        "POST",
        "/session/s1/execute/sync",
        json!({ "value": true }),
    )
    .await;

    let client = WebDriverClient::new(&server.url()).unwrap();
    let session = establish_session(client, &fast_config(tracker)).await.unwrap();
    assert_eq!(session.session_id(), "s1");

    navigate.assert_async().await;
    typed_user.assert_async().await;
    typed_pass.assert_async().await;
    click.assert_async().await;
    observer.assert_async().await;
}

#[tokio::test]
async fn missing_username_field_times_out_and_deletes_session() {
    let mut server = Server::new_async().await;
    let _create = mock_json(
        &mut server,
        "POST",
        "/session",
        json!({ "value": { "sessionId": "s1" } }),
    )
    .await;
    let _navigate = mock_null(&mut server, "POST", "/session/s1/url").await;
    let _missing = server
        .mock("POST", "/session/s1/element")
        .with_status(404)
        .with_body(
            json!({
                "value": { "error": "no such element", "message": "not found", "stacktrace": "" }
            })
            .to_string(),
        )
        .create_async()
        .await;
    let delete = mock_null(&mut server, "DELETE", "/session/s1").await;

    let client = WebDriverClient::new(&server.url()).unwrap();
    let err = establish_session(client, &fast_config("https://tracker.test"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthenticationError::Timeout { ref what, .. } if what == "username field"
    ));
    delete.assert_async().await;
}

async fn logged_in(server: &mut ServerGuard) -> tchat_webdriver::ChatroomSession {
    let _create = mock_json(
        server,
        "POST",
        "/session",
        json!({ "value": { "sessionId": "s1" } }),
    )
    .await;
    let _navigate = mock_null(server, "POST", "/session/s1/url").await;
    let _user = mock_element(server, "#username", "e-user").await;
    let _pass = mock_element(server, "#password", "e-pass").await;
    let _button =
        mock_element(server, r#"//button[contains(text(), "Login")]"#, "e-login").await;
    let _chat = mock_element(server, "ul.chatroom__messages", "e-chat").await;
    let _displayed = server
        .mock("GET", Matcher::Regex(r"/displayed$".to_string()))
        .with_status(200)
        .with_body(r#"{"value":true}"#)
        .create_async()
        .await;
    let _typed = server
        .mock(
            "POST",
            Matcher::Regex(r"^/session/s1/element/e-(user|pass)/value$".to_string()),
        )
        .with_status(200)
        .with_body(r#"{"value":null}"#)
        .create_async()
        .await;
    let _click = mock_null(server, "POST", "/session/s1/element/e-login/click").await;
    let _url = mock_json(
        server,
        "GET",
        "/session/s1/url",
        json!({ "value": "https://tracker.test/" }),
    )
    .await;
    let _observer = server
        .mock("POST", "/session/s1/execute/sync")
        .match_body(Matcher::Regex("MutationObserver".to_string()))
        .with_status(200)
        .with_body(r#"{"value":true}"#)
        .create_async()
        .await;

    let client = WebDriverClient::new(&server.url()).unwrap();
    establish_session(client, &fast_config("https://tracker.test"))
        .await
        .unwrap()
}

#[tokio::test]
async fn probe_returns_collected_fragments() {
    let mut server = Server::new_async().await;
    let session = logged_in(&mut server).await;
    let _drain = server
        .mock("POST", "/session/s1/execute/sync")
        .match_body(Matcher::Regex("var batch".to_string()))
        .with_status(200)
        .with_body(json!({ "value": ["<li>one</li>", "<li>two</li>"] }).to_string())
        .create_async()
        .await;

    let fragments = session.poll_new_fragments().await.unwrap();
    let html: Vec<_> = fragments.iter().map(|f| f.as_str().to_string()).collect();
    assert_eq!(html, vec!["<li>one</li>", "<li>two</li>"]);
}

#[tokio::test]
async fn probe_reports_lost_session() {
    let mut server = Server::new_async().await;
    let session = logged_in(&mut server).await;
    let _drain = server
        .mock("POST", "/session/s1/execute/sync")
        .with_status(404)
        .with_body(
            json!({
                "value": { "error": "invalid session id", "message": "gone", "stacktrace": "" }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = session.poll_new_fragments().await.unwrap_err();
    assert!(matches!(err, ProbeError::SessionLost(_)));
}

#[tokio::test]
async fn send_types_text_then_enter() {
    let mut server = Server::new_async().await;
    let session = logged_in(&mut server).await;
    let _input = mock_element(&mut server, "textarea#chatbox__messages-create", "e-input").await;
    let clear = mock_null(&mut server, "POST", "/session/s1/element/e-input/clear").await;
    let text = server
        .mock("POST", "/session/s1/element/e-input/value")
        .match_body(Matcher::PartialJson(json!({ "text": "hello room" })))
        .with_status(200)
        .with_body(r#"{"value":null}"#)
        .expect(1)
        .create_async()
        .await;
    let enter = server
        .mock("POST", "/session/s1/element/e-input/value")
        .match_body(Matcher::PartialJson(json!({ "text": "\u{E007}" })))
        .with_status(200)
        .with_body(r#"{"value":null}"#)
        .expect(1)
        .create_async()
        .await;

    session.send_outgoing("hello room").await.unwrap();
    clear.assert_async().await;
    text.assert_async().await;
    enter.assert_async().await;
}

#[tokio::test]
async fn send_without_input_control_fails() {
    let mut server = Server::new_async().await;
    let session = logged_in(&mut server).await;
    let _missing = server
        .mock("POST", "/session/s1/element")
        .match_body(Matcher::PartialJson(
            json!({ "value": "textarea#chatbox__messages-create" }),
        ))
        .with_status(404)
        .with_body(
            json!({
                "value": { "error": "no such element", "message": "nope", "stacktrace": "" }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = session.send_outgoing("anyone?").await.unwrap_err();
    assert_eq!(err, SendError::InputMissing);
}
