//! In-memory consent store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;

use aegis_model::{
    AuthenticationSession, ConsentRequest, HandledConsentRequest, HandledLoginRequest,
    LoginRequest, PreviouslyGrantedConsent,
};

use crate::consent::ConsentStore;
use crate::error::{StorageError, StorageResult};

/// Default lifetime of a login/consent request.
pub const DEFAULT_REQUEST_TTL_SECS: i64 = 3600;

#[derive(Default)]
struct Inner {
    login_requests: HashMap<String, LoginRequest>,
    handled_login: HashMap<String, HandledLoginRequest>,
    consent_requests: HashMap<String, ConsentRequest>,
    handled_consent: HashMap<String, HandledConsentRequest>,
    sessions: HashMap<String, AuthenticationSession>,
}

/// In-memory [`ConsentStore`].
pub struct MemoryConsentStore {
    ttl: Duration,
    inner: RwLock<Inner>,
}

impl Default for MemoryConsentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConsentStore {
    /// Creates a store with the default request TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_REQUEST_TTL_SECS))
    }

    /// Creates a store with a custom request TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(Inner::default()),
        }
    }
}

fn check_handled_login(
    request: &LoginRequest,
    handled: &HandledLoginRequest,
) -> StorageResult<()> {
    if request.skip && handled.remember {
        return Err(StorageError::InvalidData(
            "cannot remember an authentication that is already remembered".to_string(),
        ));
    }
    if request.skip && handled.error.is_none() && handled.subject != request.subject {
        return Err(StorageError::InvalidData(
            "subject of a skipped login request cannot be changed".to_string(),
        ));
    }
    Ok(())
}

fn check_handled_consent(
    request: &ConsentRequest,
    handled: &HandledConsentRequest,
) -> StorageResult<()> {
    if request.skip && handled.remember {
        return Err(StorageError::InvalidData(
            "cannot remember a consent that is already remembered".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl ConsentStore for MemoryConsentStore {
    async fn create_login_request(&self, request: &LoginRequest) -> StorageResult<()> {
        let mut inner = self.inner.write();
        if inner.login_requests.contains_key(&request.challenge) {
            return Err(StorageError::duplicate("login request", &request.challenge));
        }
        inner
            .login_requests
            .insert(request.challenge.clone(), request.clone());
        Ok(())
    }

    async fn get_login_request(&self, challenge: &str) -> StorageResult<LoginRequest> {
        self.inner
            .read()
            .login_requests
            .get(challenge)
            .cloned()
            .ok_or_else(|| StorageError::not_found("login request", challenge))
    }

    async fn handle_login_request(
        &self,
        challenge: &str,
        handled: &HandledLoginRequest,
    ) -> StorageResult<LoginRequest> {
        let mut inner = self.inner.write();
        let request = inner
            .login_requests
            .get(challenge)
            .cloned()
            .ok_or_else(|| StorageError::not_found("login request", challenge))?;

        check_handled_login(&request, handled)?;

        inner
            .handled_login
            .insert(challenge.to_string(), handled.clone());
        Ok(request)
    }

    async fn verify_and_invalidate_login_request(
        &self,
        verifier: &str,
    ) -> StorageResult<(LoginRequest, HandledLoginRequest)> {
        let not_found = || StorageError::not_found("login verifier", verifier);
        let mut inner = self.inner.write();

        let challenge = inner
            .login_requests
            .values()
            .find(|r| r.verifier == verifier)
            .map(|r| r.challenge.clone())
            .ok_or_else(not_found)?;

        let handled = inner.handled_login.get_mut(&challenge).ok_or_else(not_found)?;
        if handled.was_used || handled.requested_at + self.ttl < Utc::now() {
            return Err(not_found());
        }
        handled.was_used = true;

        let handled = handled.clone();
        let request = inner.login_requests[&challenge].clone();
        Ok((request, handled))
    }

    async fn create_consent_request(&self, request: &ConsentRequest) -> StorageResult<()> {
        let mut inner = self.inner.write();
        if inner.consent_requests.contains_key(&request.challenge) {
            return Err(StorageError::duplicate(
                "consent request",
                &request.challenge,
            ));
        }
        inner
            .consent_requests
            .insert(request.challenge.clone(), request.clone());
        Ok(())
    }

    async fn get_consent_request(&self, challenge: &str) -> StorageResult<ConsentRequest> {
        self.inner
            .read()
            .consent_requests
            .get(challenge)
            .cloned()
            .ok_or_else(|| StorageError::not_found("consent request", challenge))
    }

    async fn handle_consent_request(
        &self,
        challenge: &str,
        handled: &HandledConsentRequest,
    ) -> StorageResult<ConsentRequest> {
        let mut inner = self.inner.write();
        let request = inner
            .consent_requests
            .get(challenge)
            .cloned()
            .ok_or_else(|| StorageError::not_found("consent request", challenge))?;

        check_handled_consent(&request, handled)?;

        inner
            .handled_consent
            .insert(challenge.to_string(), handled.clone());
        Ok(request)
    }

    async fn verify_and_invalidate_consent_request(
        &self,
        verifier: &str,
    ) -> StorageResult<(ConsentRequest, HandledConsentRequest)> {
        let not_found = || StorageError::not_found("consent verifier", verifier);
        let mut inner = self.inner.write();

        let challenge = inner
            .consent_requests
            .values()
            .find(|r| r.verifier == verifier)
            .map(|r| r.challenge.clone())
            .ok_or_else(not_found)?;

        let handled = inner
            .handled_consent
            .get_mut(&challenge)
            .ok_or_else(not_found)?;
        if handled.was_used || handled.requested_at + self.ttl < Utc::now() {
            return Err(not_found());
        }
        handled.was_used = true;

        let handled = handled.clone();
        let request = inner.consent_requests[&challenge].clone();
        Ok((request, handled))
    }

    async fn create_authentication_session(
        &self,
        session: &AuthenticationSession,
    ) -> StorageResult<()> {
        self.inner
            .write()
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_authentication_session(
        &self,
        id: &str,
    ) -> StorageResult<AuthenticationSession> {
        self.inner
            .read()
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("authentication session", id))
    }

    async fn delete_authentication_session(&self, id: &str) -> StorageResult<()> {
        self.inner
            .write()
            .sessions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("authentication session", id))
    }

    async fn revoke_subject_authentication_sessions(&self, subject: &str) -> StorageResult<()> {
        self.inner
            .write()
            .sessions
            .retain(|_, s| s.subject != subject);
        Ok(())
    }

    async fn find_previously_granted_consents(
        &self,
        client_id: &str,
        subject: &str,
    ) -> StorageResult<Vec<PreviouslyGrantedConsent>> {
        Ok(self.collect_grants(|request| {
            request.subject == subject && request.client.id == client_id
        }))
    }

    async fn list_subject_granted_consents(
        &self,
        subject: &str,
    ) -> StorageResult<Vec<PreviouslyGrantedConsent>> {
        Ok(self.collect_grants(|request| request.subject == subject))
    }

    async fn revoke_subject_consents(&self, subject: &str) -> StorageResult<()> {
        self.revoke_consents_where(|request| request.subject == subject);
        Ok(())
    }

    async fn revoke_subject_client_consents(
        &self,
        subject: &str,
        client_id: &str,
    ) -> StorageResult<()> {
        self.revoke_consents_where(|request| {
            request.subject == subject && request.client.id == client_id
        });
        Ok(())
    }
}

impl MemoryConsentStore {
    fn collect_grants(
        &self,
        matches: impl Fn(&ConsentRequest) -> bool,
    ) -> Vec<PreviouslyGrantedConsent> {
        let now = Utc::now();
        let inner = self.inner.read();

        inner
            .handled_consent
            .iter()
            .filter_map(|(challenge, handled)| {
                let request = inner.consent_requests.get(challenge)?;
                if handled.error.is_some() || !handled.remember || !matches(request) {
                    return None;
                }
                let grant = PreviouslyGrantedConsent {
                    client_id: request.client.id.clone(),
                    subject: request.subject.clone(),
                    granted_scope: handled.granted_scope.clone(),
                    remember_for: handled.remember_for,
                    granted_at: handled.requested_at,
                };
                grant.is_valid_at(now).then_some(grant)
            })
            .collect()
    }

    fn revoke_consents_where(&self, matches: impl Fn(&ConsentRequest) -> bool) {
        let mut inner = self.inner.write();
        let challenges: Vec<String> = inner
            .consent_requests
            .values()
            .filter(|r| matches(r))
            .map(|r| r.challenge.clone())
            .collect();

        for challenge in challenges {
            inner.handled_consent.remove(&challenge);
            inner.consent_requests.remove(&challenge);
        }
    }
}
