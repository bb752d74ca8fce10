use researchai_client::config::{GatewayParams, ServerParams};
use researchai_client::sync::{SendOutcome, NETWORK_ERROR_TEXT};
use researchai_client::terminal::TerminalSurface;
use researchai_client::transcript::EMPTY_STATE_TITLE;
use researchai_client::{ChatSync, ResearchClient};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn sync_for(server: &MockServer) -> ChatSync<ResearchClient, TerminalSurface<Vec<u8>>> {
    let client = ResearchClient::new(&ServerParams {
        base_url: server.uri(),
        ..ServerParams::default()
    })
    .unwrap();
    ChatSync::new(client, TerminalSurface::new(Vec::new()), GatewayParams::default())
}

fn printed(sync: &ChatSync<ResearchClient, TerminalSurface<Vec<u8>>>) -> String {
    String::from_utf8_lossy(sync.surface().get_ref()).into_owned()
}

#[tokio::test]
async fn activation_restores_session_and_lists_directory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/onload-check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "conversations": [
                {"role": "user", "content": "earlier question"},
                {"role": "assistant", "content": "earlier answer", "ipfs": "bafyold"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/load-sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessions_list": [{"_id": "s1", "title": "Transformers"}]
        })))
        .mount(&server)
        .await;

    let mut sync = sync_for(&server).await;
    sync.activate().await;

    assert_eq!(sync.transcript().entries().len(), 2);
    assert_eq!(sync.transcript().verify_handle(2), Some("bafyold"));
    assert_eq!(sync.directory().len(), 1);

    let text = printed(&sync);
    assert!(text.contains("earlier question"));
    assert!(text.contains("/verify 2"));
    assert!(text.contains("1. Transformers"));
}

#[tokio::test]
async fn failed_send_keeps_user_message_and_shows_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let mut sync = sync_for(&server).await;
    assert_eq!(sync.send("  hello  ").await, SendOutcome::Failed);

    let entries = sync.transcript().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message.content, "hello");
    assert_eq!(entries[1].message.content, NETWORK_ERROR_TEXT);
}

#[tokio::test]
async fn new_session_after_chat_moves_entry_to_front() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/onload-check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/load-sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessions_list": [{"_id": "old", "title": "Old"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "hi"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/newsession"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reply": "New session created",
            "session_id": "fresh",
            "title": "Untitled"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut sync = sync_for(&server).await;
    sync.activate().await;
    assert!(!sync.new_session().await);
    assert_eq!(
        sync.surface().status().as_deref(),
        Some("(i) You already have a new session")
    );

    assert_eq!(sync.send("hello").await, SendOutcome::Replied);
    assert!(sync.new_session().await);

    assert!(sync.transcript().is_empty());
    assert!(sync.transcript().shows_empty_state());
    assert_eq!(sync.active_session(), Some("fresh"));
    let ids: Vec<&str> = sync.directory().entries().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["fresh", "old"]);

    assert_eq!(
        sync.surface().status().as_deref(),
        Some("(ok) New session created")
    );
    let text = printed(&sync);
    let after_clear = text.rsplit("----------------------------------------").next().unwrap();
    assert!(after_clear.contains(EMPTY_STATE_TITLE));
}
