//! Consent store provider trait.

use async_trait::async_trait;

use aegis_model::{
    AuthenticationSession, ConsentRequest, HandledConsentRequest, HandledLoginRequest,
    LoginRequest, PreviouslyGrantedConsent,
};

use crate::error::StorageResult;

/// Durable store for login/consent requests, their handled outcomes,
/// authentication sessions and previously granted consents.
///
/// Implementations must be thread-safe. The `verify_and_invalidate_*`
/// operations are the only way the strategy learns that a provider has made
/// a decision, and they must be atomic compare-and-set: exactly one caller
/// per verifier ever succeeds, all others observe `NotFound`. A handled
/// record older than the store's configured request TTL also fails with
/// `NotFound`.
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Persists a new login request.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::Duplicate` if the challenge already exists.
    async fn create_login_request(&self, request: &LoginRequest) -> StorageResult<()>;

    /// Loads a login request by challenge.
    async fn get_login_request(&self, challenge: &str) -> StorageResult<LoginRequest>;

    /// Records the login UI's decision, replacing any previous outcome for
    /// this challenge, and returns the associated request.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::InvalidData` if the request has `skip = true`
    /// and the outcome sets `remember = true`, or if the outcome changes the
    /// subject of a skipped request.
    async fn handle_login_request(
        &self,
        challenge: &str,
        handled: &HandledLoginRequest,
    ) -> StorageResult<LoginRequest>;

    /// Atomically exchanges a login verifier for its request and outcome,
    /// marking the outcome as used.
    async fn verify_and_invalidate_login_request(
        &self,
        verifier: &str,
    ) -> StorageResult<(LoginRequest, HandledLoginRequest)>;

    /// Persists a new consent request.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::Duplicate` if the challenge already exists.
    async fn create_consent_request(&self, request: &ConsentRequest) -> StorageResult<()>;

    /// Loads a consent request by challenge.
    async fn get_consent_request(&self, challenge: &str) -> StorageResult<ConsentRequest>;

    /// Records the consent UI's decision, replacing any previous outcome for
    /// this challenge, and returns the associated request.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::InvalidData` if the request has `skip = true`
    /// and the outcome sets `remember = true`.
    async fn handle_consent_request(
        &self,
        challenge: &str,
        handled: &HandledConsentRequest,
    ) -> StorageResult<ConsentRequest>;

    /// Atomically exchanges a consent verifier for its request and outcome,
    /// marking the outcome as used.
    async fn verify_and_invalidate_consent_request(
        &self,
        verifier: &str,
    ) -> StorageResult<(ConsentRequest, HandledConsentRequest)>;

    /// Creates (or replaces) an authentication session.
    async fn create_authentication_session(
        &self,
        session: &AuthenticationSession,
    ) -> StorageResult<()>;

    /// Loads an authentication session by id.
    async fn get_authentication_session(&self, id: &str)
        -> StorageResult<AuthenticationSession>;

    /// Deletes an authentication session by id.
    async fn delete_authentication_session(&self, id: &str) -> StorageResult<()>;

    /// Deletes every authentication session belonging to `subject`.
    async fn revoke_subject_authentication_sessions(&self, subject: &str) -> StorageResult<()>;

    /// Returns the still-valid remembered consents for `(client, subject)`,
    /// discarding entries whose `remember_for` has elapsed.
    async fn find_previously_granted_consents(
        &self,
        client_id: &str,
        subject: &str,
    ) -> StorageResult<Vec<PreviouslyGrantedConsent>>;

    /// Returns the still-valid remembered consents of `subject` across all
    /// clients.
    async fn list_subject_granted_consents(
        &self,
        subject: &str,
    ) -> StorageResult<Vec<PreviouslyGrantedConsent>>;

    /// Invalidates every remembered consent of `subject`.
    async fn revoke_subject_consents(&self, subject: &str) -> StorageResult<()>;

    /// Invalidates the remembered consents of `subject` for one client.
    async fn revoke_subject_client_consents(
        &self,
        subject: &str,
        client_id: &str,
    ) -> StorageResult<()>;
}
