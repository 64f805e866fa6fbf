//! Integration tests for boundary command parsing and dispatch

use flowshell::error::ViewError;
use flowshell::ipc::{dispatch, CommandReply, ViewCommand};
use flowshell::relay::ShellEvent;
use flowshell::security::Resolution;
use serde_json::json;

use crate::integration::{key, Harness, DOCS_URL};

async fn send(h: &Harness, message: serde_json::Value) -> Result<CommandReply, ViewError> {
    let command = ViewCommand::from_json(&message.to_string())?;
    dispatch(&h.controller, command).await
}

#[tokio::test]
async fn test_full_session_over_json() {
    let h = Harness::new();
    let mut events = h.controller.subscribe();

    send(&h, json!({"command": "create", "flow_id": "work", "page_id": "docs", "url": DOCS_URL}))
        .await
        .unwrap();
    send(&h, json!({"command": "select", "flow_id": "work", "page_id": "docs"}))
        .await
        .unwrap();
    send(&h, json!({"command": "resize", "bounds": {"x": 0, "y": 40, "width": 1024, "height": 700}}))
        .await
        .unwrap();
    send(&h, json!({"command": "update_title", "page_id": "docs", "title": "Guide"}))
        .await
        .unwrap();
    send(
        &h,
        json!({"command": "update_navigation", "flow_id": "work", "page_id": "docs", "blob": "cafe", "history_index": 2}),
    )
    .await
    .unwrap();

    let reply = send(&h, json!({"command": "capture_state", "flow_id": "work", "page_id": "docs"}))
        .await
        .unwrap();
    let CommandReply::Captured { state } = reply else {
        panic!("expected captured state");
    };
    assert_eq!(state.navigation.blob, vec![0xca, 0xfe]);
    assert_eq!(state.navigation.history_index, 2);
    assert_eq!(state.title, "Guide");

    // The captured state travels back over the boundary unchanged.
    send(
        &h,
        json!({"command": "restore_state", "flow_id": "work", "page_id": "docs", "state": state}),
    )
    .await
    .unwrap();

    send(&h, json!({"command": "remove", "flow_id": "work", "page_id": "docs"}))
        .await
        .unwrap();
    assert!(h.controller.is_empty());

    let kinds: Vec<&'static str> = events.drain().iter().map(|e| e.event_type()).collect();
    assert_eq!(kinds, vec!["url_updated", "title_updated", "restore_result"]);
}

#[tokio::test]
async fn test_update_url_without_flow_requires_unique_page() {
    let h = Harness::new();
    h.controller.create(key("a", "shared"), DOCS_URL, None).await.unwrap();
    h.controller.create(key("b", "shared"), DOCS_URL, None).await.unwrap();

    let err = send(&h, json!({"command": "update_url", "page_id": "shared", "url": "https://x.test/"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ViewError::AmbiguousPage(_)));

    let reply = send(
        &h,
        json!({"command": "update_url", "flow_id": "b", "page_id": "shared", "url": "https://x.test/"}),
    )
    .await
    .unwrap();
    assert_eq!(
        reply,
        CommandReply::Navigation {
            committed: true,
            decision_id: None
        }
    );
    assert_eq!(h.controller.view(&key("b", "shared")).unwrap().url, "https://x.test/");
    assert_eq!(h.controller.view(&key("a", "shared")).unwrap().url, DOCS_URL);
}

#[tokio::test]
async fn test_interstitial_vocabulary_is_closed() {
    let h = Harness::new();
    h.controller.create(key("w", "p"), DOCS_URL, None).await.unwrap();

    let reply = send(
        &h,
        json!({
            "command": "https_upgrade_failed",
            "flow_id": "w",
            "page_id": "p",
            "original_url": "http://legacy.test/",
            "fallback_url": "http://legacy.test/",
            "error": "ERR_SSL_PROTOCOL_ERROR"
        }),
    )
    .await
    .unwrap();
    let CommandReply::Navigation {
        decision_id: Some(decision_id),
        ..
    } = reply
    else {
        panic!("expected a decision id");
    };

    for response in [
        json!({"action": "proceed"}),
        json!({"action": "allow_insecure"}),
        json!("go_back"),
    ] {
        let err = send(
            &h,
            json!({"command": "resolve", "flow_id": "w", "page_id": "p", "decision_id": decision_id, "response": response}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ViewError::SecurityBypassAttempt { .. }), "{:?}", err);
    }
    assert!(!h.controller.security_state(&key("w", "p")).is_idle());

    let reply = send(
        &h,
        json!({
            "command": "resolve",
            "flow_id": "w",
            "page_id": "p",
            "decision_id": decision_id,
            "response": {"action": "allow_insecure", "url": "http://legacy.test/"}
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        reply,
        CommandReply::Resolved {
            resolution: Some(Resolution::ProceedInsecure)
        }
    );
    assert_eq!(h.controller.view(&key("w", "p")).unwrap().url, "http://legacy.test/");
}

#[tokio::test]
async fn test_invalid_messages_never_reach_the_controller() {
    let h = Harness::new();
    let mut events = h.controller.subscribe();
    for message in [
        json!({"command": "create", "flow_id": "w", "page_id": " ", "url": DOCS_URL}),
        json!({"command": "create", "flow_id": "w", "page_id": "p", "url": "::nope"}),
        json!({"command": "resize", "bounds": {"x": 0, "y": 0, "width": 10}}),
        json!({"command": "explode"}),
    ] {
        assert!(matches!(send(&h, message).await, Err(ViewError::InvalidCommand(_))));
    }
    assert!(h.controller.is_empty());
    assert!(events.drain().iter().all(|e| !matches!(e, ShellEvent::UrlUpdated { .. })));
}
