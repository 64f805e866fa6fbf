//! Integration tests for the security decision state machine

use flowshell::content::memory::ContentOp;
use flowshell::error::ViewError;
use flowshell::relay::ShellEvent;
use flowshell::security::{
    Classification, DecisionOutcome, InterstitialResponse, Resolution, SecurityState,
};
use flowshell::types::ViewKey;
use flowshell::NavigationOutcome;
use std::time::Duration;

use crate::integration::{key, next_event, Harness, DOCS_URL};

const ORIGINAL: &str = "http://legacy.test/portal";
const FALLBACK: &str = "http://legacy.test/portal";

async fn open_docs(h: &Harness) -> ViewKey {
    let k = key("work", "portal");
    h.controller.create(k.clone(), DOCS_URL, None).await.unwrap();
    k
}

#[tokio::test]
async fn test_https_downgrade_proceed_commits_original_url() {
    let h = Harness::new();
    let k = open_docs(&h).await;
    let mut events = h.controller.subscribe();

    let handle = h
        .controller
        .report_https_upgrade_failure(&k, ORIGINAL, FALLBACK, "ERR_SSL_PROTOCOL_ERROR")
        .await
        .unwrap()
        .unwrap();

    match next_event(&mut events).await {
        ShellEvent::Interstitial {
            decision_id,
            kind,
            original_url,
            error,
            ..
        } => {
            assert_eq!(decision_id, handle.id());
            assert_eq!(kind, Classification::HttpsDowngrade);
            assert_eq!(original_url.as_deref(), Some(ORIGINAL));
            assert_eq!(error.as_deref(), Some("ERR_SSL_PROTOCOL_ERROR"));
        }
        other => panic!("expected interstitial, got {:?}", other),
    }
    // Held at the last committed URL while pending.
    assert_eq!(h.controller.view(&k).unwrap().url, DOCS_URL);

    let resolution = h
        .controller
        .resolve_decision(
            &k,
            handle.id(),
            &InterstitialResponse::AllowInsecure {
                url: ORIGINAL.to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(resolution, Some(Resolution::ProceedInsecure));
    assert_eq!(handle.await, DecisionOutcome::Resolved(Resolution::ProceedInsecure));

    assert_eq!(h.controller.view(&k).unwrap().url, ORIGINAL);
    assert_eq!(h.content.pane_url(&k).as_deref(), Some(ORIGINAL));
    assert!(h.controller.security_state(&k).is_idle());

    assert!(matches!(
        next_event(&mut events).await,
        ShellEvent::DecisionResolved {
            resolution: Resolution::ProceedInsecure,
            ..
        }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ShellEvent::UrlUpdated { ref url, .. } if url == ORIGINAL
    ));
}

#[tokio::test]
async fn test_https_downgrade_go_back_keeps_url() {
    let h = Harness::new();
    let k = open_docs(&h).await;
    let handle = h
        .controller
        .report_https_upgrade_failure(&k, ORIGINAL, FALLBACK, "ERR_CERT_DATE_INVALID")
        .await
        .unwrap()
        .unwrap();
    let id = handle.id();

    let resolution = h
        .controller
        .resolve_decision(&k, id, &InterstitialResponse::GoBack)
        .await
        .unwrap();
    assert_eq!(resolution, Some(Resolution::GoBack));
    assert_eq!(handle.await, DecisionOutcome::Resolved(Resolution::GoBack));
    assert_eq!(h.controller.view(&k).unwrap().url, DOCS_URL);
    assert!(!h
        .content
        .ops()
        .contains(&ContentOp::Load(k.clone(), ORIGINAL.to_string())));
}

#[tokio::test]
async fn test_second_interception_supersedes_first() {
    let h = Harness::new();
    let k = open_docs(&h).await;

    let first = h
        .controller
        .report_https_upgrade_failure(&k, ORIGINAL, FALLBACK, "ERR_SSL_PROTOCOL_ERROR")
        .await
        .unwrap()
        .unwrap();
    let first_id = first.id();
    let second = h
        .controller
        .report_https_upgrade_failure(
            &k,
            "http://other.test/",
            "http://other.test/",
            "ERR_SSL_VERSION_OR_CIPHER_MISMATCH",
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.await, DecisionOutcome::Superseded);

    // Resolving the superseded id changes nothing.
    let stale = h
        .controller
        .resolve_decision(
            &k,
            first_id,
            &InterstitialResponse::AllowInsecure {
                url: ORIGINAL.to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(stale, None);
    assert_eq!(h.controller.view(&k).unwrap().url, DOCS_URL);
    assert!(matches!(
        h.controller.security_state(&k),
        SecurityState::Intercepted(ref d) if d.id == second.id()
    ));

    let resolved = h
        .controller
        .resolve_decision(&k, second.id(), &InterstitialResponse::GoBack)
        .await
        .unwrap();
    assert_eq!(resolved, Some(Resolution::GoBack));
    assert!(h.controller.security_state(&k).is_idle());
}

#[tokio::test]
async fn test_blocked_domain_navigation_is_intercepted() {
    let h = Harness::new();
    let k = open_docs(&h).await;

    let outcome = h
        .controller
        .update_url(&k, "https://eu.accounts.google.com/signin/v2")
        .await
        .unwrap();
    let NavigationOutcome::Intercepted(handle) = outcome else {
        panic!("expected interception");
    };
    assert_eq!(h.controller.view(&k).unwrap().url, DOCS_URL);

    let resolution = h
        .controller
        .resolve_decision(
            &k,
            handle.id(),
            &InterstitialResponse::OpenExternal {
                url: "https://eu.accounts.google.com/signin/v2".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(resolution, Some(Resolution::OpenExternal));
    assert_eq!(
        h.content.opened_externally(),
        vec!["https://eu.accounts.google.com/signin/v2".to_string()]
    );
    assert_eq!(h.controller.view(&k).unwrap().url, DOCS_URL);
}

#[tokio::test]
async fn test_wrong_action_is_rejected_and_decision_stays_pending() {
    let h = Harness::new();
    let k = open_docs(&h).await;
    let NavigationOutcome::Intercepted(handle) = h
        .controller
        .update_url(&k, "https://accounts.google.com/")
        .await
        .unwrap()
    else {
        panic!("expected interception");
    };

    let err = h
        .controller
        .resolve_decision(
            &k,
            handle.id(),
            &InterstitialResponse::AllowInsecure {
                url: "https://accounts.google.com/".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ViewError::SecurityBypassAttempt { .. }));

    let err = h
        .controller
        .resolve_decision(
            &k,
            handle.id(),
            &InterstitialResponse::OpenExternal {
                url: "https://phish.test/".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ViewError::SecurityBypassAttempt { .. }));

    assert!(!h.controller.security_state(&k).is_idle());
    assert!(h.content.opened_externally().is_empty());
}

#[tokio::test]
async fn test_pending_decision_holds_navigation_without_timeout() {
    let h = Harness::new();
    let k = open_docs(&h).await;
    let _handle = h
        .controller
        .report_https_upgrade_failure(&k, ORIGINAL, FALLBACK, "ERR_SSL_PROTOCOL_ERROR")
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    for url in [FALLBACK, "https://docs.test/next"] {
        let outcome = h.controller.update_url(&k, url).await.unwrap();
        assert!(matches!(outcome, NavigationOutcome::Held { .. }));
    }
    assert_eq!(h.controller.view(&k).unwrap().url, DOCS_URL);
    assert!(!h.controller.security_state(&k).is_idle());
}

#[tokio::test]
async fn test_resolution_after_remove_is_a_no_op() {
    let h = Harness::new();
    let k = open_docs(&h).await;
    let handle = h
        .controller
        .report_https_upgrade_failure(&k, ORIGINAL, FALLBACK, "ERR_SSL_PROTOCOL_ERROR")
        .await
        .unwrap()
        .unwrap();
    let id = handle.id();

    h.controller.remove(&k).await.unwrap();
    assert_eq!(handle.await, DecisionOutcome::Cancelled);
    assert_eq!(
        h.controller
            .resolve_decision(&k, id, &InterstitialResponse::GoBack)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_failed_insecure_load_keeps_decision_pending() {
    let h = Harness::new();
    let k = open_docs(&h).await;
    h.content.fail_loads_of(ORIGINAL);

    let mut handle = h
        .controller
        .report_https_upgrade_failure(&k, ORIGINAL, FALLBACK, "ERR_SSL_PROTOCOL_ERROR")
        .await
        .unwrap()
        .unwrap();
    let mut events = h.controller.subscribe();

    let allow = InterstitialResponse::AllowInsecure {
        url: ORIGINAL.to_string(),
    };
    let err = h
        .controller
        .resolve_decision(&k, handle.id(), &allow)
        .await
        .unwrap_err();
    assert!(matches!(err, ViewError::Content(_)));

    // Nothing was announced and the user can still answer.
    assert!(events.drain().is_empty());
    assert!(handle.try_outcome().is_none());
    let SecurityState::Intercepted(pending) = h.controller.security_state(&k) else {
        panic!("decision should still be pending");
    };
    assert_eq!(pending.id, handle.id());
    assert_eq!(h.controller.view(&k).unwrap().url, DOCS_URL);

    let resolution = h
        .controller
        .resolve_decision(&k, handle.id(), &InterstitialResponse::GoBack)
        .await
        .unwrap();
    assert_eq!(resolution, Some(Resolution::GoBack));
    assert_eq!(handle.await, DecisionOutcome::Resolved(Resolution::GoBack));
    assert!(matches!(
        events.drain().as_slice(),
        [ShellEvent::DecisionResolved {
            resolution: Resolution::GoBack,
            ..
        }]
    ));
    assert_eq!(h.controller.view(&k).unwrap().url, DOCS_URL);
}
