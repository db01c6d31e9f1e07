//! Shared test harness.
//!
//! Spawns one server containing the full Aegis router plus three test-only
//! surfaces:
//!
//! - `/test/auth` plays the role of the OAuth framework around the consent
//!   strategy: it feeds the query into the strategy and writes the outcome
//!   as JSON (or the prepared redirect), so tests can assert on exact
//!   statuses and error codes.
//! - `/mock/login` and `/mock/consent` are scriptable login/consent UIs
//!   driven by per-test behaviors; their assertions are collected and
//!   checked at the end of each test.
//! - `/callback` echoes the query parameters, acting as the OAuth client's
//!   redirect target.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use url::Url;

use aegis_consent::FlowError;
use aegis_model::Client;
use aegis_oidc::{AuthorizeQuery, AuthorizeRequest, IdTokenClaims};
use aegis_server::{Config, Context};

/// Scripted behavior of the mock login UI.
#[derive(Debug, Clone)]
pub enum LoginBehavior {
    /// The UI must not be reached; reaching it records a failure.
    Unreachable,
    /// Fetch the request, assert on it, then stop the flow with 204.
    Inspect {
        expect_skip: bool,
        expect_subject: Option<String>,
    },
    /// Accept the request and follow the returned redirect.
    Accept {
        subject: String,
        remember: bool,
        expect_skip: Option<bool>,
        expect_subject: Option<String>,
    },
    /// Accepting must fail with HTTP 400; stop the flow with 204.
    AcceptExpect400 { subject: String, remember: bool },
    /// Reject the request and follow the returned redirect.
    Reject,
}

/// Scripted behavior of the mock consent UI.
#[derive(Debug, Clone)]
pub enum ConsentBehavior {
    /// The UI must not be reached; reaching it records a failure.
    Unreachable,
    /// Accept the request and follow the returned redirect.
    Accept {
        grant_scope: Vec<String>,
        remember: bool,
        expect_skip: Option<bool>,
        session: Value,
    },
    /// Accepting must fail with HTTP 400; stop the flow with 204.
    AcceptExpect400 {
        grant_scope: Vec<String>,
        remember: bool,
    },
    /// Reject the request and follow the returned redirect.
    Reject,
}

#[derive(Clone)]
struct TestState {
    context: Context,
    base_url: String,
    login: Arc<Mutex<LoginBehavior>>,
    consent: Arc<Mutex<ConsentBehavior>>,
    failures: Arc<Mutex<Vec<String>>>,
    http: reqwest::Client,
}

impl TestState {
    fn check(&self, condition: bool, message: &str) {
        if !condition {
            self.failures.lock().unwrap().push(message.to_string());
        }
    }
}

/// The running test server.
pub struct Harness {
    /// Base URL of the spawned server.
    pub base_url: String,
    /// The server context, for direct store access and token signing.
    pub context: Context,
    login: Arc<Mutex<LoginBehavior>>,
    consent: Arc<Mutex<ConsentBehavior>>,
    failures: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    /// Spawns a fresh server on an ephemeral port.
    pub async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{port}");

        let config = Config::for_testing(
            Url::parse(&format!("{base_url}/")).unwrap(),
            Url::parse(&format!("{base_url}/mock/login")).unwrap(),
            Url::parse(&format!("{base_url}/mock/consent")).unwrap(),
        );
        let context = Context::new(config).await.unwrap();

        let login = Arc::new(Mutex::new(LoginBehavior::Unreachable));
        let consent = Arc::new(Mutex::new(ConsentBehavior::Unreachable));
        let failures = Arc::new(Mutex::new(Vec::new()));

        let state = TestState {
            context: context.clone(),
            base_url: base_url.clone(),
            login: login.clone(),
            consent: consent.clone(),
            failures: failures.clone(),
            http: reqwest::Client::new(),
        };

        let app = aegis_server::router::create_router(&context).merge(test_router(state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            context,
            login,
            consent,
            failures,
        }
    }

    /// Sets the login UI behavior for the next flow.
    pub fn set_login(&self, behavior: LoginBehavior) {
        *self.login.lock().unwrap() = behavior;
    }

    /// Sets the consent UI behavior for the next flow.
    pub fn set_consent(&self, behavior: ConsentBehavior) {
        *self.consent.lock().unwrap() = behavior;
    }

    /// Panics if any mock UI assertion failed.
    pub fn assert_no_failures(&self) {
        let failures = self.failures.lock().unwrap();
        assert!(failures.is_empty(), "mock UI assertions failed: {failures:#?}");
    }

    /// A browser-like HTTP client with its own cookie jar.
    pub fn browser(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .unwrap()
    }

    /// An HTTP client without cookie support.
    pub fn cookieless(&self) -> reqwest::Client {
        reqwest::Client::new()
    }

    /// Builds the harness authorization URL the way a relying party would.
    pub fn auth_url(&self, params: &[(&str, &str)]) -> String {
        let mut url = Url::parse(&format!("{}/test/auth", self.base_url)).unwrap();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        url.into()
    }

    /// Signs an ID token usable as `id_token_hint`.
    pub fn id_token_for(&self, subject: &str) -> String {
        let now = Utc::now().timestamp();
        self.context
            .signer
            .sign(&IdTokenClaims {
                iss: format!("{}/", self.base_url),
                sub: subject.to_string(),
                aud: vec!["client-id".to_string()],
                exp: now + 3600,
                iat: now,
                auth_time: None,
                nonce: None,
                acr: None,
                extra: serde_json::Map::new(),
            })
            .unwrap()
    }
}

fn test_router(state: TestState) -> Router {
    Router::new()
        .route("/test/auth", get(test_auth))
        .route("/mock/login", get(mock_login))
        .route("/mock/consent", get(mock_consent))
        .route("/callback", get(callback))
        .with_state(state)
}

/// The strategy harness endpoint.
async fn test_auth(
    State(state): State<TestState>,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<AuthorizeQuery>,
    Query(extra): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let public = extra.get("client_public").map(String::as_str) == Some("true");
    let client_id = if query.client_id.is_empty() {
        "client-id".to_string()
    } else {
        query.client_id.clone()
    };

    let redirect_uri =
        (!query.redirect_uri.is_empty()).then(|| Url::parse(&query.redirect_uri).unwrap());

    let mut request_url = Url::parse(&format!("{}/test/auth", state.base_url)).unwrap();
    request_url.set_query(raw_query.as_deref());

    let request = AuthorizeRequest {
        client: Client {
            id: client_id,
            secret: Some("$argon2id$should-not-be-exposed".to_string()),
            public,
            ..Client::default()
        },
        redirect_uri,
        response_types: query.response_types(),
        requested_scope: query.scopes(),
        state: None,
        nonce: None,
        request_url,
    };

    match state
        .context
        .strategy
        .handle_authorization_request(&request, &query, &headers)
        .await
    {
        Ok(accepted) => Json(json!({
            "subject": accepted.request.subject,
            "granted_scope": accepted.granted_scope,
            "remember": accepted.remember,
            "remember_for": accepted.remember_for,
            "session": {
                "access_token": accepted.session.access_token,
                "id_token": accepted.session.id_token,
            },
        }))
        .into_response(),
        Err(FlowError::Abort(abort)) => abort.into_response(),
        Err(FlowError::OAuth(err)) => {
            let body = err.to_body(true);
            let status = StatusCode::from_u16(body.status_code).unwrap();
            (status, Json(body)).into_response()
        }
    }
}

async fn mock_login(
    State(state): State<TestState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let challenge = params.get("login_challenge").cloned().unwrap_or_default();
    let behavior = state.login.lock().unwrap().clone();

    match behavior {
        LoginBehavior::Unreachable => {
            state.check(false, "login UI was called but must not be");
            StatusCode::NOT_IMPLEMENTED.into_response()
        }

        LoginBehavior::Inspect {
            expect_skip,
            expect_subject,
        } => {
            let request = fetch_request(&state, "login", &challenge).await;
            assert_login_request(&state, &request, Some(expect_skip), expect_subject.as_deref());
            StatusCode::NO_CONTENT.into_response()
        }

        LoginBehavior::Accept {
            subject,
            remember,
            expect_skip,
            expect_subject,
        } => {
            let request = fetch_request(&state, "login", &challenge).await;
            assert_login_request(&state, &request, expect_skip, expect_subject.as_deref());

            let body = json!({
                "subject": subject,
                "remember": remember,
                "remember_for": 0,
                "acr": "1",
            });
            match put_decision(&state, "login", &challenge, "accept", &body).await {
                Ok(redirect_to) => Redirect::to(&redirect_to).into_response(),
                Err(status) => {
                    state.check(false, &format!("login accept failed with {status}"));
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }

        LoginBehavior::AcceptExpect400 { subject, remember } => {
            let body = json!({
                "subject": subject,
                "remember": remember,
                "remember_for": 0,
                "acr": "1",
            });
            match put_decision(&state, "login", &challenge, "accept", &body).await {
                Ok(_) => {
                    state.check(false, "login accept unexpectedly succeeded");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
                Err(status) => {
                    state.check(status == 400, "login accept did not fail with 400");
                    StatusCode::NO_CONTENT.into_response()
                }
            }
        }

        LoginBehavior::Reject => {
            let body = json!({
                "error": "interaction_required",
                "error_description": "the user must interact",
                "error_hint": "",
                "error_debug": "",
                "status_code": 400,
            });
            match put_decision(&state, "login", &challenge, "reject", &body).await {
                Ok(redirect_to) => Redirect::to(&redirect_to).into_response(),
                Err(status) => {
                    state.check(false, &format!("login reject failed with {status}"));
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
    }
}

async fn mock_consent(
    State(state): State<TestState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let challenge = params.get("consent_challenge").cloned().unwrap_or_default();
    let behavior = state.consent.lock().unwrap().clone();

    match behavior {
        ConsentBehavior::Unreachable => {
            state.check(false, "consent UI was called but must not be");
            StatusCode::NOT_IMPLEMENTED.into_response()
        }

        ConsentBehavior::Accept {
            grant_scope,
            remember,
            expect_skip,
            session,
        } => {
            let request = fetch_request(&state, "consent", &challenge).await;
            if let Some(expected) = expect_skip {
                state.check(
                    request["skip"] == json!(expected),
                    &format!("consent skip: expected {expected}, got {}", request["skip"]),
                );
            }
            state.check(
                request["client"].get("secret").is_none()
                    && request["client"].get("client_secret").is_none(),
                "consent request leaks the client secret",
            );

            let body = json!({
                "grant_scope": grant_scope,
                "remember": remember,
                "remember_for": 0,
                "session": session,
            });
            match put_decision(&state, "consent", &challenge, "accept", &body).await {
                Ok(redirect_to) => Redirect::to(&redirect_to).into_response(),
                Err(status) => {
                    state.check(false, &format!("consent accept failed with {status}"));
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }

        ConsentBehavior::AcceptExpect400 {
            grant_scope,
            remember,
        } => {
            let body = json!({
                "grant_scope": grant_scope,
                "remember": remember,
                "remember_for": 0,
                "session": {},
            });
            match put_decision(&state, "consent", &challenge, "accept", &body).await {
                Ok(_) => {
                    state.check(false, "consent accept unexpectedly succeeded");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
                Err(status) => {
                    state.check(status == 400, "consent accept did not fail with 400");
                    StatusCode::NO_CONTENT.into_response()
                }
            }
        }

        ConsentBehavior::Reject => {
            let body = json!({
                "error": "interaction_required",
                "error_description": "the user must interact",
                "error_hint": "",
                "error_debug": "",
                "status_code": 400,
            });
            match put_decision(&state, "consent", &challenge, "reject", &body).await {
                Ok(redirect_to) => Redirect::to(&redirect_to).into_response(),
                Err(status) => {
                    state.check(false, &format!("consent reject failed with {status}"));
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
    }
}

async fn callback(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!(params))
}

async fn fetch_request(state: &TestState, flow: &str, challenge: &str) -> Value {
    let url = format!(
        "{}/oauth2/auth/requests/{flow}/{challenge}",
        state.base_url
    );
    let response = state.http.get(&url).send().await.unwrap();
    state.check(
        response.status().is_success(),
        &format!("fetching the {flow} request failed with {}", response.status()),
    );
    response.json().await.unwrap_or_else(|_| json!({}))
}

fn assert_login_request(
    state: &TestState,
    request: &Value,
    expect_skip: Option<bool>,
    expect_subject: Option<&str>,
) {
    if let Some(expected) = expect_skip {
        state.check(
            request["skip"] == json!(expected),
            &format!("login skip: expected {expected}, got {}", request["skip"]),
        );
    }
    if let Some(expected) = expect_subject {
        state.check(
            request["subject"] == json!(expected),
            &format!(
                "login subject: expected '{expected}', got {}",
                request["subject"]
            ),
        );
    }
    state.check(
        request["client"].get("secret").is_none()
            && request["client"].get("client_secret").is_none(),
        "login request leaks the client secret",
    );
}

async fn put_decision(
    state: &TestState,
    flow: &str,
    challenge: &str,
    decision: &str,
    body: &Value,
) -> Result<String, u16> {
    let url = format!(
        "{}/oauth2/auth/requests/{flow}/{challenge}/{decision}",
        state.base_url
    );
    let response = state.http.put(&url).json(body).send().await.unwrap();

    if !response.status().is_success() {
        return Err(response.status().as_u16());
    }

    let completed: Value = response.json().await.unwrap();
    Ok(completed["redirect_to"].as_str().unwrap_or_default().to_string())
}
