//! End-to-end tests of the login & consent orchestration.
//!
//! Each test drives a browser-like client (cookie jar, redirect following)
//! against the strategy harness plus the scripted login/consent UIs; see
//! `common` for the moving parts.

mod common;

use serde_json::{json, Value};

use common::{ConsentBehavior, Harness, LoginBehavior};

fn session_payload() -> Value {
    json!({
        "access_token": {"foo": "bar"},
        "id_token": {"bar": "baz"},
    })
}

fn accept_login(subject: &str, remember: bool, expect_skip: Option<bool>) -> LoginBehavior {
    LoginBehavior::Accept {
        subject: subject.to_string(),
        remember,
        expect_skip,
        expect_subject: None,
    }
}

fn accept_consent(remember: bool, expect_skip: Option<bool>) -> ConsentBehavior {
    ConsentBehavior::Accept {
        grant_scope: vec!["scope-a".to_string()],
        remember,
        expect_skip,
        session: session_payload(),
    }
}

async fn get(client: &reqwest::Client, url: &str) -> (u16, Value) {
    let response = client.get(url).send().await.unwrap();
    let status = response.status().as_u16();
    let body = response.json().await.unwrap_or_else(|_| json!({}));
    (status, body)
}

#[tokio::test]
async fn unknown_login_verifier_is_access_denied() {
    let harness = Harness::spawn().await;

    let url = harness.auth_url(&[("client_id", "client-id"), ("login_verifier", "invalid")]);

    let (status, body) = get(&harness.browser(), &url).await;
    assert_eq!(status, 403);
    assert_eq!(body["error"], "access_denied");
    harness.assert_no_failures();
}

#[tokio::test]
async fn unknown_consent_verifier_is_access_denied() {
    let harness = Harness::spawn().await;

    let url = harness.auth_url(&[("client_id", "client-id"), ("consent_verifier", "invalid")]);

    let (status, body) = get(&harness.browser(), &url).await;
    assert_eq!(status, 403);
    assert_eq!(body["error"], "access_denied");
    harness.assert_no_failures();
}

#[tokio::test]
async fn idle_login_ui_sees_a_fresh_request() {
    let harness = Harness::spawn().await;
    harness.set_login(LoginBehavior::Inspect {
        expect_skip: false,
        expect_subject: Some(String::new()),
    });

    let url = harness.auth_url(&[("client_id", "client-id"), ("scope", "scope-a")]);
    let response = harness.browser().get(&url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 204);
    harness.assert_no_failures();
}

#[tokio::test]
async fn rejected_login_surfaces_the_provider_error() {
    let harness = Harness::spawn().await;
    harness.set_login(LoginBehavior::Reject);

    let url = harness.auth_url(&[("client_id", "client-id"), ("scope", "scope-a")]);
    let (status, body) = get(&harness.browser(), &url).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "interaction_required");
    harness.assert_no_failures();
}

#[tokio::test]
async fn missing_cookies_fail_the_csrf_check() {
    let harness = Harness::spawn().await;
    harness.set_login(accept_login("user", false, None));
    harness.set_consent(ConsentBehavior::Unreachable);

    let url = harness.auth_url(&[("client_id", "client-id"), ("scope", "scope-a")]);
    let (status, body) = get(&harness.cookieless(), &url).await;
    assert_eq!(status, 403);
    assert_eq!(body["error"], "request_forbidden");
    harness.assert_no_failures();
}

#[tokio::test]
async fn rejected_consent_surfaces_the_provider_error() {
    let harness = Harness::spawn().await;
    harness.set_login(accept_login("user", false, None));
    harness.set_consent(ConsentBehavior::Reject);

    let url = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
    ]);
    let (status, body) = get(&harness.browser(), &url).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "interaction_required");
    harness.assert_no_failures();
}

#[tokio::test]
async fn happy_path_remember_and_skip() {
    let harness = Harness::spawn().await;
    let browser = harness.browser();
    let url = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
    ]);

    // First round: no session, nothing remembered.
    harness.set_login(accept_login("user", false, Some(false)));
    harness.set_consent(accept_consent(false, Some(false)));

    let (status, body) = get(&browser, &url).await;
    assert_eq!(status, 200);
    assert_eq!(body["subject"], "user");
    assert_eq!(body["granted_scope"], json!(["scope-a"]));
    assert_eq!(body["remember"], json!(false));
    assert_eq!(body["session"]["access_token"]["foo"], "bar");
    assert_eq!(body["session"]["id_token"]["bar"], "baz");

    // Second round: remember both decisions.
    harness.set_login(accept_login("user", true, Some(false)));
    harness.set_consent(accept_consent(true, Some(false)));

    let (status, body) = get(&browser, &url).await;
    assert_eq!(status, 200);
    assert_eq!(body["remember"], json!(true));

    // Third round: both steps are now skippable confirmations.
    harness.set_login(accept_login("user", false, Some(true)));
    harness.set_consent(accept_consent(false, Some(true)));

    let (status, body) = get(&browser, &url).await;
    assert_eq!(status, 200);
    assert_eq!(body["subject"], "user");

    // Remembering a skipped login is rejected by the accept endpoint.
    harness.set_login(LoginBehavior::AcceptExpect400 {
        subject: "user".to_string(),
        remember: true,
    });
    let response = browser.get(&url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 204);

    // Same for a skipped consent.
    harness.set_login(accept_login("user", false, Some(true)));
    harness.set_consent(ConsentBehavior::AcceptExpect400 {
        grant_scope: vec!["scope-a".to_string()],
        remember: true,
    });
    let response = browser.get(&url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 204);

    // prompt=login forces re-authentication despite the session.
    harness.set_login(accept_login("user", false, Some(false)));
    harness.set_consent(accept_consent(false, Some(false)));
    let forced = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
        ("prompt", "login consent"),
    ]);
    let (status, _) = get(&browser, &forced).await;
    assert_eq!(status, 200);

    harness.assert_no_failures();
}

#[tokio::test]
async fn prompt_none_without_session_is_login_required() {
    let harness = Harness::spawn().await;
    harness.set_login(LoginBehavior::Unreachable);
    harness.set_consent(ConsentBehavior::Unreachable);

    let url = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
        ("prompt", "none"),
    ]);
    let (status, body) = get(&harness.browser(), &url).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "login_required");
    harness.assert_no_failures();
}

#[tokio::test]
async fn prompt_none_with_ungranted_scope_is_consent_required() {
    let harness = Harness::spawn().await;
    let browser = harness.browser();

    // Establish a remembered session and a remembered scope-a grant.
    harness.set_login(accept_login("user", true, Some(false)));
    harness.set_consent(accept_consent(true, Some(false)));
    let url = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
    ]);
    let (status, _) = get(&browser, &url).await;
    assert_eq!(status, 200);

    // prompt=none with a broader scope cannot silently pass.
    harness.set_login(accept_login("user", false, Some(true)));
    harness.set_consent(ConsentBehavior::Unreachable);
    let url = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a this-scope-has-not-been-granted-before"),
        ("response_type", "code"),
        ("prompt", "none"),
    ]);
    let (status, body) = get(&browser, &url).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "consent_required");
    harness.assert_no_failures();
}

#[tokio::test]
async fn max_age_forces_reauthentication() {
    let harness = Harness::spawn().await;
    let browser = harness.browser();
    let url = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
    ]);

    harness.set_login(accept_login("user", true, Some(false)));
    harness.set_consent(accept_consent(true, Some(false)));
    let (status, _) = get(&browser, &url).await;
    assert_eq!(status, 200);

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    // The session is older than max_age: the login UI sees skip=false while
    // the consent UI still sees the remembered grant.
    harness.set_login(accept_login("user", true, Some(false)));
    harness.set_consent(accept_consent(false, Some(true)));
    let aged = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
        ("max_age", "1"),
    ]);
    let (status, _) = get(&browser, &aged).await;
    assert_eq!(status, 200);

    // max_age together with prompt=none cannot re-authenticate silently.
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    harness.set_login(LoginBehavior::Unreachable);
    harness.set_consent(ConsentBehavior::Unreachable);
    let silent = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
        ("max_age", "1"),
        ("prompt", "none"),
    ]);
    let (status, body) = get(&browser, &silent).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "login_required");
    harness.assert_no_failures();
}

#[tokio::test]
async fn id_token_hint_binds_the_subject() {
    let harness = Harness::spawn().await;
    let browser = harness.browser();
    let hint = harness.id_token_for("foouser");

    // Establish a session for "user".
    harness.set_login(accept_login("user", true, Some(false)));
    harness.set_consent(accept_consent(false, Some(false)));
    let url = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
    ]);
    let (status, _) = get(&browser, &url).await;
    assert_eq!(status, 200);

    // The hint names another subject: silent flows fail immediately.
    harness.set_login(LoginBehavior::Unreachable);
    harness.set_consent(ConsentBehavior::Unreachable);
    let silent = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
        ("prompt", "none"),
        ("id_token_hint", &hint),
    ]);
    let (status, body) = get(&browser, &silent).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "login_required");

    // Interactive flow: the login UI accepts yet another subject, which the
    // strategy rejects on return.
    harness.set_login(accept_login("not-foouser", false, Some(false)));
    harness.set_consent(ConsentBehavior::Unreachable);
    let interactive = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
        ("id_token_hint", &hint),
    ]);
    let (status, body) = get(&browser, &interactive).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "login_required");

    // Accepting the hinted subject passes.
    harness.set_login(accept_login("foouser", false, Some(false)));
    harness.set_consent(accept_consent(false, Some(false)));
    let (status, body) = get(&browser, &interactive).await;
    assert_eq!(status, 200);
    assert_eq!(body["subject"], "foouser");
    harness.assert_no_failures();
}

#[tokio::test]
async fn changing_the_subject_revokes_the_browser_session() {
    let harness = Harness::spawn().await;
    let browser = harness.browser();
    let url = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
    ]);

    harness.set_login(accept_login("auth-user", true, Some(false)));
    harness.set_consent(accept_consent(false, Some(false)));
    let (status, _) = get(&browser, &url).await;
    assert_eq!(status, 200);

    // prompt=login, and the UI signs in somebody else without remembering.
    harness.set_login(accept_login("not-auth-user", false, None));
    harness.set_consent(accept_consent(false, Some(false)));
    let forced = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
        ("prompt", "login"),
    ]);
    let (status, _) = get(&browser, &forced).await;
    assert_eq!(status, 200);

    // The old session is gone: the next attempt starts unauthenticated.
    harness.set_login(LoginBehavior::Inspect {
        expect_skip: false,
        expect_subject: Some(String::new()),
    });
    let response = browser.get(&url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 204);
    harness.assert_no_failures();
}

#[tokio::test]
async fn management_api_revokes_sessions_and_consents() {
    let harness = Harness::spawn().await;
    let browser = harness.browser();
    let admin = reqwest::Client::new();
    let url = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
    ]);

    harness.set_login(accept_login("user", true, Some(false)));
    harness.set_consent(accept_consent(true, Some(false)));
    let (status, _) = get(&browser, &url).await;
    assert_eq!(status, 200);

    // The remembered grant is visible through the management API.
    let grants: Value = admin
        .get(format!(
            "{}/oauth2/auth/sessions/consent/user",
            harness.base_url
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(grants.as_array().map(Vec::len), Some(1));
    assert_eq!(grants[0]["granted_scope"], json!(["scope-a"]));

    // Revoke the login sessions: the next flow must re-authenticate.
    let response = admin
        .delete(format!(
            "{}/oauth2/auth/sessions/login/user",
            harness.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    harness.set_login(accept_login("user", false, Some(false)));
    harness.set_consent(accept_consent(false, Some(true)));
    let (status, _) = get(&browser, &url).await;
    assert_eq!(status, 200);

    // Revoke the consents: the consent step stops being skippable.
    let response = admin
        .delete(format!(
            "{}/oauth2/auth/sessions/consent/user",
            harness.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    harness.set_login(accept_login("user", false, Some(false)));
    harness.set_consent(accept_consent(false, Some(false)));
    let (status, _) = get(&browser, &url).await;
    assert_eq!(status, 200);
    harness.assert_no_failures();
}

#[tokio::test]
async fn prompt_none_public_client_with_insecure_redirect_fails() {
    let harness = Harness::spawn().await;
    let browser = harness.browser();

    // Establish a remembered session and grant.
    harness.set_login(accept_login("user", true, Some(false)));
    harness.set_consent(accept_consent(true, Some(false)));
    let url = harness.auth_url(&[
        ("client_id", "client-id"),
        ("scope", "scope-a"),
        ("response_type", "code"),
    ]);
    let (status, _) = get(&browser, &url).await;
    assert_eq!(status, 200);

    // A public client redirecting to a custom scheme must never pass
    // silently.
    harness.set_login(accept_login("user", false, Some(true)));
    harness.set_consent(ConsentBehavior::Unreachable);
    let silent = harness.auth_url(&[
        ("client_id", "client-id"),
        ("client_public", "true"),
        ("redirect_uri", "custom://redirection-scheme/path"),
        ("scope", "scope-a"),
        ("response_type", "code"),
        ("prompt", "none"),
    ]);
    let (status, body) = get(&browser, &silent).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "consent_required");
    harness.assert_no_failures();
}
