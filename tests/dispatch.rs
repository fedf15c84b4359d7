//! End-to-end dispatch through the public API against mock platform servers.

use notify_hub::AppState;
use notify_hub::config::Settings;
use notify_hub::error::{AppError, ChannelError};
use serde_json::{Map, Value as JsonValue, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer, notifiers: &[&str]) -> Settings {
    serde_json::from_value(json!({
        "notifiers": {
            "ding": {
                "type": "dingTalkAppBot",
                "enabled": true,
                "config": { "access_token": "ding-token", "api_base": server.uri() }
            },
            "tg": {
                "type": "telegramAppBot",
                "enabled": true,
                "config": { "bot_token": "123:abc", "chat_id": 42, "api_base": server.uri() }
            },
            "off": {
                "type": "wechatWorkWebhookBot",
                "enabled": false,
                "config": { "key": "unused" }
            }
        },
        "templates": {
            "order_created": {
                "title": "Order {{id}}",
                "content": "Order {{id}} total {{total}}"
            }
        },
        "notification_apps": {
            "orders": {
                "enabled": true,
                "notifiers": notifiers,
                "template_id": "order_created"
            }
        }
    }))
    .expect("settings should deserialize")
}

fn payload() -> Map<String, JsonValue> {
    json!({ "id": "1001", "total": "59.90" })
        .as_object()
        .cloned()
        .unwrap_or_default()
}

async fn mount_platforms(server: &MockServer, expected_each: u64) {
    Mock::given(method("POST"))
        .and(path("/robot/send"))
        .and(query_param("access_token", "ding-token"))
        .and(body_partial_json(json!({
            "msgtype": "markdown",
            "markdown": { "title": "Order 1001" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0, "errmsg": "ok"})))
        .expect(expected_each)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": "42",
            "text": "*Order 1001*\n\nOrder 1001 total 59.90"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(expected_each)
        .mount(server)
        .await;
}

#[tokio::test]
async fn delivers_to_every_channel() {
    let server = MockServer::start().await;
    mount_platforms(&server, 1).await;

    let (state, diagnostics) = AppState::new(&settings(&server, &["ding", "tg"]));
    assert!(diagnostics.is_empty(), "{diagnostics:?}");

    state
        .notifications
        .send("orders", &payload(), &CancellationToken::new())
        .await
        .expect("both channels should deliver");
}

#[tokio::test]
async fn partial_failure_reports_every_bad_channel() {
    let server = MockServer::start().await;
    mount_platforms(&server, 1).await;

    let (state, diagnostics) = AppState::new(&settings(&server, &["ding", "off", "tg", "ghost"]));
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].field(), Some("notification_apps.orders.notifiers"));

    let err = state
        .notifications
        .send("orders", &payload(), &CancellationToken::new())
        .await
        .unwrap_err();

    let failures = err.failures().expect("aggregate error");
    assert_eq!(failures.len(), 2);
    assert!(failures.errors().iter().any(|e| matches!(
        e,
        AppError::ChannelDisabled { name } if name == "off"
    )));
    assert!(failures.errors().iter().any(|e| matches!(
        e,
        AppError::ChannelNotFound { name } if name == "ghost"
    )));

    // Header line plus one line per failing channel
    assert_eq!(err.to_string().lines().count(), 3);
}

#[tokio::test]
async fn platform_rejection_is_a_channel_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/robot/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 300001, "errmsg": "token is not exist"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (state, _) = AppState::new(&settings(&server, &["ding"]));
    let err = state
        .notifications
        .send("orders", &payload(), &CancellationToken::new())
        .await
        .unwrap_err();

    let failures = err.failures().expect("aggregate error");
    assert!(matches!(
        &failures.errors()[0],
        AppError::ChannelSend { name, source: ChannelError::Rejected { code: 300001, .. } }
            if name == "ding"
    ));
}

#[tokio::test]
async fn reload_publishes_new_routing() {
    let server = MockServer::start().await;
    mount_platforms(&server, 1).await;

    let (state, _) = AppState::new(&settings(&server, &["ghost"]));
    let err = state
        .notifications
        .send("orders", &payload(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.failures().is_some());

    let diagnostics = state.reload(&settings(&server, &["ding", "tg"]));
    assert!(diagnostics.is_empty(), "{diagnostics:?}");

    state
        .notifications
        .send("orders", &payload(), &CancellationToken::new())
        .await
        .expect("reloaded routing should deliver");
}

#[tokio::test]
async fn preview_renders_without_contacting_platforms() {
    let server = MockServer::start().await;

    let (state, _) = AppState::new(&settings(&server, &["ding", "tg"]));
    let rendered = state
        .notifications
        .preview("orders", &payload())
        .expect("preview should render");

    assert_eq!(rendered.message.title, "Order 1001");
    assert_eq!(rendered.message.content, "Order 1001 total 59.90");
    assert_eq!(rendered.notifiers, vec!["ding", "tg"]);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
