//! The authorization flow state machine.
//!
//! Entry point is [`ConsentStrategy::handle_authorization_request`], invoked
//! by the `/oauth2/auth` handler. Based on the presence of the flow
//! verifiers in the query it either starts a login round trip, validates a
//! return from the login UI, starts a consent round trip, or validates a
//! return from the consent UI and hands the granted consent back to the
//! caller.
//!
//! Every identity-relevant claim made by a UI is re-checked here after the
//! redirect returns; the UIs can only move the flow forward, never bypass
//! it.

use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;
use url::Url;

use aegis_crypto::opaque_id;
use aegis_model::{
    AuthenticationSession, ConsentRequest, ConsentSessionData, HandledLoginRequest, LoginRequest,
    OpenIdConnectContext, scope,
};
use aegis_oidc::{AuthorizeQuery, AuthorizeRequest, IdTokenSigner, OAuthError};
use aegis_storage::ConsentStore;

use crate::cookies::{CookieJars, SessionCookie, CONSENT_CSRF_COOKIE, LOGIN_CSRF_COOKIE};
use crate::error::{AbortRedirect, FlowError};

/// The verified outcome of a completed login & consent flow.
///
/// This is what the OAuth framework consumes to issue tokens: the granted
/// scopes bound the token, and the session payloads seed the access- and
/// ID-token claims.
#[derive(Debug, Clone)]
pub struct AcceptedConsent {
    /// The consent request the grant belongs to.
    pub request: ConsentRequest,

    /// Scopes the subject granted.
    pub granted_scope: Vec<String>,

    /// Whether the grant is remembered for future skip decisions.
    pub remember: bool,

    /// Grant lifetime in seconds; 0 means until revoked.
    pub remember_for: i64,

    /// Token payloads chosen by the consent UI.
    pub session: ConsentSessionData,

    /// When the subject authenticated.
    pub authenticated_at: DateTime<Utc>,
}

/// The login & consent orchestration strategy.
pub struct ConsentStrategy {
    store: Arc<dyn ConsentStore>,
    login_url: Url,
    consent_url: Url,
    csrf_key: [u8; 64],
    session_key: [u8; 64],
    signer: Arc<IdTokenSigner>,
}

impl ConsentStrategy {
    /// Creates a new strategy.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConsentStore>,
        login_url: Url,
        consent_url: Url,
        csrf_key: [u8; 64],
        session_key: [u8; 64],
        signer: Arc<IdTokenSigner>,
    ) -> Self {
        Self {
            store,
            login_url,
            consent_url,
            csrf_key,
            session_key,
            signer,
        }
    }

    /// Routes an authorization request through the state machine.
    ///
    /// # Errors
    ///
    /// - [`FlowError::Abort`] when the browser has been redirected to a UI;
    ///   the caller must emit the prepared redirect and nothing else.
    /// - [`FlowError::OAuth`] when the flow terminates with a protocol
    ///   error (including provider rejections).
    pub async fn handle_authorization_request(
        &self,
        request: &AuthorizeRequest,
        query: &AuthorizeQuery,
        headers: &HeaderMap,
    ) -> Result<AcceptedConsent, FlowError> {
        let mut jars = CookieJars::from_headers(headers, &self.csrf_key, &self.session_key);

        if !query.consent_verifier.is_empty() {
            self.verify_consent(query, &jars).await
        } else if !query.login_verifier.is_empty() {
            self.verify_login(request, query, &mut jars).await
        } else {
            self.require_login(request, query, &mut jars).await
        }
    }

    /// Resolves the authentication session: decrypt the cookie, then load
    /// the authoritative store row. A revoked row means no session.
    async fn authenticated_session(&self, jars: &CookieJars) -> Option<AuthenticationSession> {
        let cookie = jars.session()?;
        match self.store.get_authentication_session(&cookie.id).await {
            Ok(session) => Some(session),
            Err(err) => {
                debug!(error = %err, "session cookie points at a missing session row");
                None
            }
        }
    }

    fn decode_hint(&self, hint: &str) -> Result<serde_json::Map<String, Value>, OAuthError> {
        self.signer.decode_hint(hint).map_err(|e| {
            OAuthError::InvalidRequest(format!("could not decode id_token_hint: {e}"))
        })
    }

    async fn require_login(
        &self,
        request: &AuthorizeRequest,
        query: &AuthorizeQuery,
        jars: &mut CookieJars,
    ) -> Result<AcceptedConsent, FlowError> {
        let max_age = query.max_age()?;
        let prompt_none = query.has_prompt("none");

        let session = self.authenticated_session(jars).await;
        let subject = session.as_ref().map(|s| s.subject.clone()).unwrap_or_default();
        let mut skip = session.is_some();

        if let (Some(max_age), Some(session)) = (max_age, session.as_ref()) {
            if session.is_older_than(max_age, Utc::now()) {
                if prompt_none {
                    return Err(OAuthError::LoginRequired(
                        "prompt is set to 'none' but the authentication is older than max_age"
                            .to_string(),
                    )
                    .into());
                }
                skip = false;
            }
        }

        let mut hint_claims = serde_json::Map::new();
        if !query.id_token_hint.is_empty() {
            hint_claims = self.decode_hint(&query.id_token_hint)?;
            let hint_subject = hint_claims
                .get("sub")
                .and_then(Value::as_str)
                .unwrap_or_default();

            if let Some(session) = session.as_ref() {
                if !hint_subject.is_empty() && hint_subject != session.subject {
                    if prompt_none {
                        return Err(OAuthError::LoginRequired(
                            "prompt is set to 'none' but id_token_hint names another subject"
                                .to_string(),
                        )
                        .into());
                    }
                    skip = false;
                }
            }
        }

        if query.has_prompt("login") {
            skip = false;
        }

        if prompt_none && session.is_none() {
            return Err(OAuthError::LoginRequired(
                "prompt is set to 'none' but no authentication session exists".to_string(),
            )
            .into());
        }

        let challenge = opaque_id();
        let verifier = opaque_id();
        let csrf = opaque_id();

        let login_request = LoginRequest {
            challenge: challenge.clone(),
            verifier,
            csrf: csrf.clone(),
            client: request.client.clone(),
            request_url: request.request_url.to_string(),
            requested_scope: request.requested_scope.clone(),
            subject,
            skip,
            oidc_context: OpenIdConnectContext {
                acr_values: query.acr_values_list(),
                display: query.display.clone(),
                ui_locales: query.ui_locales_list(),
                id_token_hint_claims: hint_claims,
            },
            requested_at: Utc::now(),
        };

        self.store
            .create_login_request(&login_request)
            .await
            .map_err(|e| FlowError::from_storage(e, "could not persist the login request"))?;

        jars.set_csrf(LOGIN_CSRF_COOKIE, &csrf);

        let mut location = self.login_url.clone();
        location
            .query_pairs_mut()
            .append_pair("login_challenge", &challenge);

        debug!(challenge = %challenge, skip, "redirecting to login provider");
        Err(FlowError::Abort(AbortRedirect {
            location,
            set_cookies: jars.set_cookie_headers(),
        }))
    }

    async fn verify_login(
        &self,
        request: &AuthorizeRequest,
        query: &AuthorizeQuery,
        jars: &mut CookieJars,
    ) -> Result<AcceptedConsent, FlowError> {
        let (login_request, mut handled) = self
            .store
            .verify_and_invalidate_login_request(&query.login_verifier)
            .await
            .map_err(|e| FlowError::from_storage(e, "the login verifier is invalid"))?;

        let cookie_csrf = jars.csrf_value(LOGIN_CSRF_COOKIE).unwrap_or_default();
        if cookie_csrf.is_empty() || cookie_csrf != login_request.csrf {
            return Err(OAuthError::RequestForbidden(
                "the login CSRF value does not match the browser session".to_string(),
            )
            .into());
        }

        if let Some(denied) = handled.error.take() {
            return Err(OAuthError::Denied(denied).into());
        }

        if handled.subject.is_empty() {
            return Err(OAuthError::ServerError(
                "the login provider accepted the request without a subject".to_string(),
            )
            .into());
        }

        // Re-check the invariants the accept endpoint already enforced; the
        // handled record could have been written through another path.
        if login_request.skip && handled.subject != login_request.subject {
            return Err(OAuthError::InvalidRequest(
                "the subject of a skipped authentication request cannot be changed".to_string(),
            )
            .into());
        }
        if login_request.skip && handled.remember {
            return Err(OAuthError::InvalidRequest(
                "cannot remember an authentication that is already remembered".to_string(),
            )
            .into());
        }

        let hint_subject = login_request
            .oidc_context
            .id_token_hint_claims
            .get("sub")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !hint_subject.is_empty() && hint_subject != handled.subject {
            return Err(OAuthError::LoginRequired(
                "the subject from id_token_hint does not match the authenticated subject"
                    .to_string(),
            )
            .into());
        }

        self.establish_session(jars, &handled).await?;

        self.require_consent(request, query, jars, &login_request, &handled)
            .await
    }

    /// Reconciles the browser session with the fresh authentication: a
    /// subject change revokes the old session, `remember = true` writes a
    /// new one.
    async fn establish_session(
        &self,
        jars: &mut CookieJars,
        handled: &HandledLoginRequest,
    ) -> Result<(), FlowError> {
        if let Some(existing) = jars.session() {
            if existing.subject != handled.subject {
                if let Err(err) = self.store.delete_authentication_session(&existing.id).await {
                    if !err.is_not_found() {
                        return Err(FlowError::from_storage(err, "unused"));
                    }
                }
                jars.clear_session();
            }
        }

        if handled.remember {
            let session = AuthenticationSession {
                id: opaque_id(),
                subject: handled.subject.clone(),
                authenticated_at: Utc::now(),
            };
            self.store
                .create_authentication_session(&session)
                .await
                .map_err(|e| {
                    FlowError::from_storage(e, "could not persist the authentication session")
                })?;

            let max_age = (handled.remember_for > 0).then_some(handled.remember_for);
            jars.set_session(
                &SessionCookie {
                    id: session.id,
                    subject: session.subject,
                    authenticated_at: session.authenticated_at,
                },
                max_age,
            );
        }

        Ok(())
    }

    async fn require_consent(
        &self,
        request: &AuthorizeRequest,
        query: &AuthorizeQuery,
        jars: &mut CookieJars,
        login_request: &LoginRequest,
        handled_login: &HandledLoginRequest,
    ) -> Result<AcceptedConsent, FlowError> {
        let prompt_none = query.has_prompt("none");
        let subject = &handled_login.subject;

        // A public client redirecting to a non-HTTPS URI must never pass
        // silently, previously granted consent or not.
        if prompt_none && request.client.public {
            if let Some(uri) = &request.redirect_uri {
                if uri.scheme() != "https" {
                    return Err(OAuthError::ConsentRequired(
                        "prompt is set to 'none' but the client is public and redirects to an \
                         insecure URI"
                            .to_string(),
                    )
                    .into());
                }
            }
        }

        let mut skip = false;
        if request.is_code_flow_only() && !query.has_prompt("consent") {
            let granted = self
                .store
                .find_previously_granted_consents(&request.client.id, subject)
                .await
                .map_err(|e| {
                    FlowError::from_storage(e, "could not look up previously granted consents")
                })?;

            if !granted.is_empty() {
                let granted_scopes: Vec<&[String]> = granted
                    .iter()
                    .map(|g| g.granted_scope.as_slice())
                    .collect();
                let union = scope::union(granted_scopes);
                skip = scope::is_subset(&request.requested_scope, &union);
            }
        }

        if prompt_none && !skip {
            return Err(OAuthError::ConsentRequired(
                "prompt is set to 'none' but consent has not been granted for the requested \
                 scopes"
                    .to_string(),
            )
            .into());
        }

        let challenge = opaque_id();
        let verifier = opaque_id();
        let csrf = opaque_id();

        let consent_request = ConsentRequest {
            challenge: challenge.clone(),
            verifier,
            csrf: csrf.clone(),
            client: request.client.clone(),
            request_url: login_request.request_url.clone(),
            requested_scope: request.requested_scope.clone(),
            subject: subject.clone(),
            skip,
            login_challenge: login_request.challenge.clone(),
            oidc_context: login_request.oidc_context.clone(),
            requested_at: Utc::now(),
        };

        self.store
            .create_consent_request(&consent_request)
            .await
            .map_err(|e| FlowError::from_storage(e, "could not persist the consent request"))?;

        jars.set_csrf(CONSENT_CSRF_COOKIE, &csrf);

        let mut location = self.consent_url.clone();
        location
            .query_pairs_mut()
            .append_pair("consent_challenge", &challenge);

        debug!(challenge = %challenge, skip, "redirecting to consent provider");
        Err(FlowError::Abort(AbortRedirect {
            location,
            set_cookies: jars.set_cookie_headers(),
        }))
    }

    async fn verify_consent(
        &self,
        query: &AuthorizeQuery,
        jars: &CookieJars,
    ) -> Result<AcceptedConsent, FlowError> {
        let (consent_request, handled) = self
            .store
            .verify_and_invalidate_consent_request(&query.consent_verifier)
            .await
            .map_err(|e| FlowError::from_storage(e, "the consent verifier is invalid"))?;

        let cookie_csrf = jars.csrf_value(CONSENT_CSRF_COOKIE).unwrap_or_default();
        if cookie_csrf.is_empty() || cookie_csrf != consent_request.csrf {
            return Err(OAuthError::RequestForbidden(
                "the consent CSRF value does not match the browser session".to_string(),
            )
            .into());
        }

        if let Some(denied) = handled.error {
            return Err(OAuthError::Denied(denied).into());
        }

        if consent_request.skip && handled.remember {
            return Err(OAuthError::InvalidRequest(
                "cannot remember a consent that is already remembered".to_string(),
            )
            .into());
        }

        if !scope::is_subset(&handled.granted_scope, &consent_request.requested_scope) {
            return Err(OAuthError::InvalidScope(
                "the granted scope exceeds the requested scope".to_string(),
            )
            .into());
        }

        Ok(AcceptedConsent {
            granted_scope: handled.granted_scope,
            remember: handled.remember,
            remember_for: handled.remember_for,
            session: handled.session,
            authenticated_at: handled.authenticated_at,
            request: consent_request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_jwk::generate_key_set;
    use aegis_model::{Client, HandledConsentRequest};
    use aegis_storage::MemoryConsentStore;
    use axum::http::{header, HeaderValue};

    const CSRF_KEY: [u8; 64] = [3u8; 64];
    const SESSION_KEY: [u8; 64] = [4u8; 64];

    fn strategy() -> (ConsentStrategy, Arc<MemoryConsentStore>, Arc<IdTokenSigner>) {
        let store = Arc::new(MemoryConsentStore::new());
        let set = generate_key_set("RS256", "strategy-test").unwrap();
        let signer =
            Arc::new(IdTokenSigner::from_jwk(set.find("private:strategy-test").unwrap()).unwrap());

        let strategy = ConsentStrategy::new(
            store.clone(),
            Url::parse("https://login.example.org/").unwrap(),
            Url::parse("https://consent.example.org/").unwrap(),
            CSRF_KEY,
            SESSION_KEY,
            signer.clone(),
        );
        (strategy, store, signer)
    }

    fn authorize_request() -> AuthorizeRequest {
        AuthorizeRequest {
            client: Client {
                id: "client-id".to_string(),
                ..Client::default()
            },
            redirect_uri: None,
            response_types: vec!["code".to_string()],
            requested_scope: vec!["scope-a".to_string()],
            state: None,
            nonce: None,
            request_url: Url::parse(
                "https://auth.example.org/oauth2/auth?client_id=client-id&scope=scope-a",
            )
            .unwrap(),
        }
    }

    fn headers_from_set_cookies(set_cookies: &[String]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if set_cookies.is_empty() {
            return headers;
        }
        let pairs: Vec<String> = set_cookies
            .iter()
            .map(|c| c.split(';').next().unwrap().to_string())
            .collect();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&pairs.join("; ")).unwrap(),
        );
        headers
    }

    fn challenge_param(location: &Url, name: &str) -> String {
        location
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_login_verifier_is_access_denied() {
        let (strategy, _, _) = strategy();

        let query = AuthorizeQuery {
            login_verifier: "invalid".to_string(),
            ..AuthorizeQuery::default()
        };
        let err = strategy
            .handle_authorization_request(&authorize_request(), &query, &HeaderMap::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FlowError::OAuth(OAuthError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn unknown_consent_verifier_is_access_denied() {
        let (strategy, _, _) = strategy();

        let query = AuthorizeQuery {
            consent_verifier: "invalid".to_string(),
            ..AuthorizeQuery::default()
        };
        let err = strategy
            .handle_authorization_request(&authorize_request(), &query, &HeaderMap::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FlowError::OAuth(OAuthError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn fresh_request_redirects_to_login_provider() {
        let (strategy, store, _) = strategy();

        let err = strategy
            .handle_authorization_request(
                &authorize_request(),
                &AuthorizeQuery::default(),
                &HeaderMap::new(),
            )
            .await
            .unwrap_err();

        let FlowError::Abort(abort) = err else {
            panic!("expected an abort redirect");
        };
        assert!(abort.location.as_str().starts_with("https://login.example.org/"));
        assert!(!abort.set_cookies.is_empty());

        let challenge = challenge_param(&abort.location, "login_challenge");
        let request = store.get_login_request(&challenge).await.unwrap();
        assert!(!request.skip);
        assert!(request.subject.is_empty());
        assert_eq!(request.requested_scope, vec!["scope-a".to_string()]);
    }

    #[tokio::test]
    async fn prompt_none_without_session_fails_without_redirect() {
        let (strategy, _, _) = strategy();

        let query = AuthorizeQuery {
            prompt: "none".to_string(),
            ..AuthorizeQuery::default()
        };
        let err = strategy
            .handle_authorization_request(&authorize_request(), &query, &HeaderMap::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FlowError::OAuth(OAuthError::LoginRequired(_))
        ));
    }

    #[tokio::test]
    async fn login_return_without_csrf_cookie_is_forbidden() {
        let (strategy, store, _) = strategy();

        // Walk to the login redirect to mint a request.
        let err = strategy
            .handle_authorization_request(
                &authorize_request(),
                &AuthorizeQuery::default(),
                &HeaderMap::new(),
            )
            .await
            .unwrap_err();
        let FlowError::Abort(abort) = err else {
            panic!("expected an abort redirect");
        };

        let challenge = challenge_param(&abort.location, "login_challenge");
        let request = store.get_login_request(&challenge).await.unwrap();
        store
            .handle_login_request(
                &challenge,
                &HandledLoginRequest {
                    challenge: challenge.clone(),
                    subject: "user".to_string(),
                    acr: String::new(),
                    remember: false,
                    remember_for: 0,
                    authenticated_at: Utc::now(),
                    error: None,
                    was_used: false,
                    requested_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        // Return with the verifier but an empty cookie jar.
        let query = AuthorizeQuery {
            login_verifier: request.verifier,
            ..AuthorizeQuery::default()
        };
        let err = strategy
            .handle_authorization_request(&authorize_request(), &query, &HeaderMap::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FlowError::OAuth(OAuthError::RequestForbidden(_))
        ));
    }

    async fn accept_login(
        store: &MemoryConsentStore,
        challenge: &str,
        subject: &str,
        remember: bool,
    ) -> String {
        let request = store.get_login_request(challenge).await.unwrap();
        store
            .handle_login_request(
                challenge,
                &HandledLoginRequest {
                    challenge: challenge.to_string(),
                    subject: subject.to_string(),
                    acr: "1".to_string(),
                    remember,
                    remember_for: 0,
                    authenticated_at: Utc::now(),
                    error: None,
                    was_used: false,
                    requested_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        request.verifier
    }

    async fn accept_consent(
        store: &MemoryConsentStore,
        challenge: &str,
        granted: &[&str],
        remember: bool,
    ) -> String {
        let request = store.get_consent_request(challenge).await.unwrap();
        store
            .handle_consent_request(
                challenge,
                &HandledConsentRequest {
                    challenge: challenge.to_string(),
                    granted_scope: granted.iter().map(ToString::to_string).collect(),
                    remember,
                    remember_for: 0,
                    session: ConsentSessionData::default(),
                    error: None,
                    authenticated_at: Utc::now(),
                    was_used: false,
                    requested_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        request.verifier
    }

    #[tokio::test]
    async fn full_flow_grants_consent() {
        let (strategy, store, _) = strategy();
        let request = authorize_request();

        // Step 1: redirect to login.
        let FlowError::Abort(login_abort) = strategy
            .handle_authorization_request(&request, &AuthorizeQuery::default(), &HeaderMap::new())
            .await
            .unwrap_err()
        else {
            panic!("expected login redirect");
        };
        let login_challenge = challenge_param(&login_abort.location, "login_challenge");
        let login_verifier = accept_login(&store, &login_challenge, "user", false).await;

        // Step 2: return from login, redirect to consent.
        let query = AuthorizeQuery {
            login_verifier,
            ..AuthorizeQuery::default()
        };
        let FlowError::Abort(consent_abort) = strategy
            .handle_authorization_request(
                &request,
                &query,
                &headers_from_set_cookies(&login_abort.set_cookies),
            )
            .await
            .unwrap_err()
        else {
            panic!("expected consent redirect");
        };
        let consent_challenge = challenge_param(&consent_abort.location, "consent_challenge");

        let consent_request = store.get_consent_request(&consent_challenge).await.unwrap();
        assert_eq!(consent_request.subject, "user");
        assert_eq!(consent_request.login_challenge, login_challenge);
        assert!(!consent_request.skip);

        let consent_verifier = accept_consent(&store, &consent_challenge, &["scope-a"], false).await;

        // Step 3: return from consent with both cookies present.
        let mut cookies = login_abort.set_cookies.clone();
        cookies.extend(consent_abort.set_cookies.clone());
        let query = AuthorizeQuery {
            consent_verifier,
            ..AuthorizeQuery::default()
        };
        let accepted = strategy
            .handle_authorization_request(&request, &query, &headers_from_set_cookies(&cookies))
            .await
            .unwrap();

        assert_eq!(accepted.request.subject, "user");
        assert_eq!(accepted.granted_scope, vec!["scope-a".to_string()]);
        assert!(!accepted.remember);

        // The consent verifier is single-shot.
        let query = AuthorizeQuery {
            consent_verifier: store
                .get_consent_request(&consent_challenge)
                .await
                .unwrap()
                .verifier,
            ..AuthorizeQuery::default()
        };
        let err = strategy
            .handle_authorization_request(&request, &query, &headers_from_set_cookies(&cookies))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::OAuth(OAuthError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn remembered_login_skips_next_authentication() {
        let (strategy, store, _) = strategy();
        let request = authorize_request();

        // First round: remember the login.
        let FlowError::Abort(login_abort) = strategy
            .handle_authorization_request(&request, &AuthorizeQuery::default(), &HeaderMap::new())
            .await
            .unwrap_err()
        else {
            panic!("expected login redirect");
        };
        let login_challenge = challenge_param(&login_abort.location, "login_challenge");
        let login_verifier = accept_login(&store, &login_challenge, "user", true).await;

        let query = AuthorizeQuery {
            login_verifier,
            ..AuthorizeQuery::default()
        };
        let FlowError::Abort(consent_abort) = strategy
            .handle_authorization_request(
                &request,
                &query,
                &headers_from_set_cookies(&login_abort.set_cookies),
            )
            .await
            .unwrap_err()
        else {
            panic!("expected consent redirect");
        };

        // The session cookie from the consent redirect marks the browser.
        let mut cookies = login_abort.set_cookies.clone();
        cookies.extend(consent_abort.set_cookies.clone());

        // Second authorization attempt: login must be skipped.
        let FlowError::Abort(second_login) = strategy
            .handle_authorization_request(
                &request,
                &AuthorizeQuery::default(),
                &headers_from_set_cookies(&cookies),
            )
            .await
            .unwrap_err()
        else {
            panic!("expected login redirect");
        };
        let second_challenge = challenge_param(&second_login.location, "login_challenge");
        let second_request = store.get_login_request(&second_challenge).await.unwrap();
        assert!(second_request.skip);
        assert_eq!(second_request.subject, "user");

        // With prompt=login the session is ignored.
        let query = AuthorizeQuery {
            prompt: "login".to_string(),
            ..AuthorizeQuery::default()
        };
        let FlowError::Abort(forced) = strategy
            .handle_authorization_request(&request, &query, &headers_from_set_cookies(&cookies))
            .await
            .unwrap_err()
        else {
            panic!("expected login redirect");
        };
        let forced_challenge = challenge_param(&forced.location, "login_challenge");
        assert!(!store.get_login_request(&forced_challenge).await.unwrap().skip);
    }

    #[tokio::test]
    async fn id_token_hint_mismatch_after_login_fails() {
        let (strategy, store, signer) = strategy();
        let request = authorize_request();

        let now = Utc::now().timestamp();
        let hint = signer
            .sign(&aegis_oidc::IdTokenClaims {
                iss: "https://auth.example.org/".to_string(),
                sub: "foouser".to_string(),
                aud: vec!["client-id".to_string()],
                exp: now + 3600,
                iat: now,
                auth_time: None,
                nonce: None,
                acr: None,
                extra: serde_json::Map::new(),
            })
            .unwrap();

        let query = AuthorizeQuery {
            id_token_hint: hint.clone(),
            ..AuthorizeQuery::default()
        };
        let FlowError::Abort(login_abort) = strategy
            .handle_authorization_request(&request, &query, &HeaderMap::new())
            .await
            .unwrap_err()
        else {
            panic!("expected login redirect");
        };
        let challenge = challenge_param(&login_abort.location, "login_challenge");

        // The hint claims are exposed to the login UI.
        let stored = store.get_login_request(&challenge).await.unwrap();
        assert_eq!(
            stored
                .oidc_context
                .id_token_hint_claims
                .get("sub")
                .and_then(Value::as_str),
            Some("foouser")
        );

        // The UI accepts a different subject.
        let verifier = accept_login(&store, &challenge, "not-foouser", false).await;
        let query = AuthorizeQuery {
            login_verifier: verifier,
            id_token_hint: hint,
            ..AuthorizeQuery::default()
        };
        let err = strategy
            .handle_authorization_request(
                &request,
                &query,
                &headers_from_set_cookies(&login_abort.set_cookies),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FlowError::OAuth(OAuthError::LoginRequired(_))
        ));
    }

    #[tokio::test]
    async fn rejected_login_propagates_provider_error() {
        let (strategy, store, _) = strategy();
        let request = authorize_request();

        let FlowError::Abort(login_abort) = strategy
            .handle_authorization_request(&request, &AuthorizeQuery::default(), &HeaderMap::new())
            .await
            .unwrap_err()
        else {
            panic!("expected login redirect");
        };
        let challenge = challenge_param(&login_abort.location, "login_challenge");

        let stored = store.get_login_request(&challenge).await.unwrap();
        store
            .handle_login_request(
                &challenge,
                &HandledLoginRequest {
                    challenge: challenge.clone(),
                    subject: String::new(),
                    acr: String::new(),
                    remember: false,
                    remember_for: 0,
                    authenticated_at: Utc::now(),
                    error: Some(aegis_model::RequestDeniedError {
                        name: "interaction_required".to_string(),
                        description: "the user must interact".to_string(),
                        hint: String::new(),
                        debug: String::new(),
                        code: 400,
                    }),
                    was_used: false,
                    requested_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let query = AuthorizeQuery {
            login_verifier: stored.verifier,
            ..AuthorizeQuery::default()
        };
        let err = strategy
            .handle_authorization_request(
                &request,
                &query,
                &headers_from_set_cookies(&login_abort.set_cookies),
            )
            .await
            .unwrap_err();

        match err {
            FlowError::OAuth(OAuthError::Denied(denied)) => {
                assert_eq!(denied.name, "interaction_required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
