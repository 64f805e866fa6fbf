//! Integration tests for state capture and the two-phase restore

use flowshell::capture::RestoreMethod;
use flowshell::content::memory::PageContent;
use flowshell::error::ViewError;
use flowshell::relay::ShellEvent;
use flowshell::types::NavigationState;
use std::sync::Arc;
use std::time::Duration;

use crate::integration::{key, next_event, Harness, DOCS_URL};

/// Expect the next event to be a restore result and return its parts.
async fn restore_outcome(
    events: &mut flowshell::relay::Subscription,
) -> (RestoreMethod, bool, Option<String>) {
    loop {
        if let ShellEvent::RestoreResult {
            method,
            success,
            message,
            ..
        } = next_event(events).await
        {
            return (method, success, message);
        }
    }
}

/// Open the docs view, scroll to "Configuration", record history index 1
/// and close it. Returns the state written by the final capture.
async fn capture_and_close(h: &Harness) -> flowshell::capture::CapturedState {
    let k = key("research", "guide");
    h.controller.create(k.clone(), DOCS_URL, None).await.unwrap();
    h.content.scroll_to(&k, 2);
    h.controller
        .update_navigation(&k, NavigationState::new(vec![0xde, 0xad], 1))
        .unwrap();
    h.controller.remove(&k).await.unwrap();
    h.controller.stored_state(&k).unwrap().unwrap()
}

#[tokio::test]
async fn test_unchanged_content_restores_by_anchor() {
    let h = Harness::new();
    let state = capture_and_close(&h).await;
    assert!(state.anchor.is_some());

    let mut events = h.controller.subscribe();
    let k = key("research", "guide");
    h.controller.reopen(k.clone()).await.unwrap();

    assert_eq!(restore_outcome(&mut events).await, (RestoreMethod::Anchor, true, None));
    assert_eq!(h.content.position(&k), Some(2));
}

#[tokio::test]
async fn test_changed_content_falls_back_to_history_index() {
    let h = Harness::new();
    let state = capture_and_close(&h).await;

    // The section the anchor pointed at is gone.
    h.content.set_page(
        DOCS_URL,
        PageContent::new(["Overview", "Getting started", "FAQ"], 3),
    );

    let mut events = h.controller.subscribe();
    let k = key("research", "guide");
    h.controller
        .create(k.clone(), DOCS_URL, Some(state))
        .await
        .unwrap();

    assert_eq!(restore_outcome(&mut events).await, (RestoreMethod::Index, true, None));
    assert_eq!(h.content.history_index(&k), Some(1));
}

#[tokio::test]
async fn test_unresolvable_anchor_and_index_report_none() {
    let h = Harness::new();
    let mut state = capture_and_close(&h).await;
    state.navigation.history_index = 9;
    h.content
        .set_page(DOCS_URL, PageContent::new(["Rewritten"], 2));

    let mut events = h.controller.subscribe();
    let k = key("research", "guide");
    let view = h
        .controller
        .create(k.clone(), DOCS_URL, Some(state))
        .await
        .unwrap();

    let (method, success, message) = restore_outcome(&mut events).await;
    assert_eq!(method, RestoreMethod::None);
    assert!(!success);
    assert!(!message.unwrap_or_default().is_empty());

    // Restore failure is not fatal: the view is live at its default position.
    assert_eq!(view.url, DOCS_URL);
    assert_eq!(h.content.position(&k), Some(0));
}

#[tokio::test]
async fn test_capture_bumps_revision_and_overwrites() {
    let h = Harness::new();
    let k = key("research", "guide");
    h.controller.create(k.clone(), DOCS_URL, None).await.unwrap();

    let first = h.controller.capture_state(&k).unwrap();
    h.content.scroll_to(&k, 3);
    let second = h.controller.capture_state(&k).unwrap();

    assert_eq!(first.revision + 1, second.revision);
    assert_ne!(first.anchor, second.anchor);
    assert_eq!(h.controller.stored_state(&k).unwrap().unwrap(), second);
    assert_eq!(h.controller.stored_states().unwrap().len(), 1);
}

#[tokio::test]
async fn test_capture_of_unknown_view_fails() {
    let h = Harness::new();
    assert!(matches!(
        h.controller.capture_state(&key("x", "y")),
        Err(ViewError::NoSuchView(_))
    ));
}

#[tokio::test]
async fn test_restore_from_store_reloads_captured_url() {
    let h = Harness::new();
    let k = key("research", "guide");
    h.controller.create(k.clone(), DOCS_URL, None).await.unwrap();
    h.content.scroll_to(&k, 1);
    h.controller.capture_state(&k).unwrap();

    h.controller
        .update_url(&k, "https://docs.test/elsewhere")
        .await
        .unwrap();
    let mut events = h.controller.subscribe();

    assert!(h.controller.restore_from_store(&k).await.unwrap());
    assert_eq!(
        next_event(&mut events).await,
        ShellEvent::UrlUpdated {
            flow_id: k.flow_id.clone(),
            page_id: k.page_id.clone(),
            url: DOCS_URL.to_string(),
        }
    );
    assert_eq!(restore_outcome(&mut events).await, (RestoreMethod::Anchor, true, None));
    assert_eq!(h.content.position(&k), Some(1));

    assert!(!h.controller.restore_from_store(&key("research", "none")).await.unwrap());
}

#[tokio::test]
async fn test_reopen_without_record_fails() {
    let h = Harness::new();
    let err = h.controller.reopen(key("research", "never")).await.unwrap_err();
    assert!(matches!(
        err,
        ViewError::Storage(flowshell::error::StorageError::StateNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restore_pending_during_remove_emits_nothing() {
    let h = Harness::new();
    let k = key("research", "guide");
    h.controller.create(k.clone(), DOCS_URL, None).await.unwrap();
    let state = h.controller.capture_state(&k).unwrap();

    let mut events = h.controller.subscribe();
    h.content.hold_restores();
    let restore = {
        let controller = Arc::clone(&h.controller);
        let k = k.clone();
        tokio::spawn(async move { controller.restore_state(&k, &state).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    h.controller.remove(&k).await.unwrap();
    h.content.release_restores();
    restore.await.unwrap().unwrap();

    let leaked = events
        .drain()
        .into_iter()
        .any(|e| matches!(e, ShellEvent::RestoreResult { .. }));
    assert!(!leaked, "late restore completion must not be reported");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_recreated_view_does_not_receive_stale_restore() {
    let h = Harness::new();
    let k = key("research", "guide");
    h.controller.create(k.clone(), DOCS_URL, None).await.unwrap();
    let state = h.controller.capture_state(&k).unwrap();

    let mut events = h.controller.subscribe();
    h.content.hold_restores();
    let restore = {
        let controller = Arc::clone(&h.controller);
        let k = k.clone();
        tokio::spawn(async move { controller.restore_state(&k, &state).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Same key, new view: the pending restore belongs to the old one.
    h.controller.remove(&k).await.unwrap();
    h.controller.create(k.clone(), DOCS_URL, None).await.unwrap();
    h.content.release_restores();
    restore.await.unwrap().unwrap();

    assert!(!events
        .drain()
        .into_iter()
        .any(|e| matches!(e, ShellEvent::RestoreResult { .. })));
}

#[tokio::test]
async fn test_select_restores_before_showing_the_view() {
    let h = Harness::new();
    let state = capture_and_close(&h).await;
    let k = key("research", "guide");
    h.controller.create(k.clone(), DOCS_URL, None).await.unwrap();

    let mut events = h.controller.subscribe();
    h.content.hold_restores();
    let select = {
        let controller = Arc::clone(&h.controller);
        let flow = k.flow_id.clone();
        let page = k.page_id.clone();
        tokio::spawn(async move { controller.select(&flow, Some(&page), None, Some(state)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Restore is parked: nothing reported and the pane is still hidden.
    assert!(events.drain().is_empty());
    assert_eq!(h.content.layout(&k).map(|(_, visible)| visible), Some(false));
    assert_eq!(h.controller.active(), None);

    h.content.release_restores();
    select.await.unwrap().unwrap();

    assert_eq!(restore_outcome(&mut events).await, (RestoreMethod::Anchor, true, None));
    assert_eq!(h.content.position(&k), Some(2));
    assert_eq!(h.content.layout(&k).map(|(_, visible)| visible), Some(true));
    assert_eq!(h.controller.active(), Some(k));
}
