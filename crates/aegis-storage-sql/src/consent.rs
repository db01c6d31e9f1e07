//! PostgreSQL consent store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use aegis_model::{
    AuthenticationSession, ConsentRequest, ConsentSessionData, HandledConsentRequest,
    HandledLoginRequest, LoginRequest, OpenIdConnectContext, PreviouslyGrantedConsent,
    RequestDeniedError,
};
use aegis_storage::{ClientStore, ConsentStore, StorageError, StorageResult};

use crate::error::from_sqlx_error;

/// PostgreSQL [`ConsentStore`].
///
/// Requests reference clients by id; the configured client store hydrates
/// them on read.
pub struct SqlConsentStore {
    pool: PgPool,
    clients: Arc<dyn ClientStore>,
    ttl: Duration,
}

impl SqlConsentStore {
    /// Creates a store with the given request TTL.
    #[must_use]
    pub fn new(pool: PgPool, clients: Arc<dyn ClientStore>, ttl: Duration) -> Self {
        Self { pool, clients, ttl }
    }

    fn verify_cutoff(&self) -> DateTime<Utc> {
        Utc::now() - self.ttl
    }
}

#[derive(sqlx::FromRow)]
struct LoginRequestRow {
    challenge: String,
    verifier: String,
    csrf: String,
    client_id: String,
    request_url: String,
    requested_scope: Json<Vec<String>>,
    subject: String,
    skip: bool,
    oidc_context: Json<OpenIdConnectContext>,
    requested_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct HandledLoginRow {
    challenge: String,
    subject: String,
    acr: String,
    remember: bool,
    remember_for: i64,
    authenticated_at: DateTime<Utc>,
    error: Option<Json<RequestDeniedError>>,
    was_used: bool,
    requested_at: DateTime<Utc>,
}

impl From<HandledLoginRow> for HandledLoginRequest {
    fn from(row: HandledLoginRow) -> Self {
        Self {
            challenge: row.challenge,
            subject: row.subject,
            acr: row.acr,
            remember: row.remember,
            remember_for: row.remember_for,
            authenticated_at: row.authenticated_at,
            error: row.error.map(|e| e.0),
            was_used: row.was_used,
            requested_at: row.requested_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConsentRequestRow {
    challenge: String,
    verifier: String,
    csrf: String,
    client_id: String,
    request_url: String,
    requested_scope: Json<Vec<String>>,
    subject: String,
    skip: bool,
    login_challenge: String,
    oidc_context: Json<OpenIdConnectContext>,
    requested_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct HandledConsentRow {
    challenge: String,
    granted_scope: Json<Vec<String>>,
    remember: bool,
    remember_for: i64,
    session_access_token: Json<serde_json::Map<String, serde_json::Value>>,
    session_id_token: Json<serde_json::Map<String, serde_json::Value>>,
    error: Option<Json<RequestDeniedError>>,
    authenticated_at: DateTime<Utc>,
    was_used: bool,
    requested_at: DateTime<Utc>,
}

impl From<HandledConsentRow> for HandledConsentRequest {
    fn from(row: HandledConsentRow) -> Self {
        Self {
            challenge: row.challenge,
            granted_scope: row.granted_scope.0,
            remember: row.remember,
            remember_for: row.remember_for,
            session: ConsentSessionData {
                access_token: row.session_access_token.0,
                id_token: row.session_id_token.0,
            },
            error: row.error.map(|e| e.0),
            authenticated_at: row.authenticated_at,
            was_used: row.was_used,
            requested_at: row.requested_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GrantRow {
    client_id: String,
    subject: String,
    granted_scope: Json<Vec<String>>,
    remember_for: i64,
    requested_at: DateTime<Utc>,
}

impl SqlConsentStore {
    async fn hydrate_login_request(&self, row: LoginRequestRow) -> StorageResult<LoginRequest> {
        let client = self.clients.get_client(&row.client_id).await?;
        Ok(LoginRequest {
            challenge: row.challenge,
            verifier: row.verifier,
            csrf: row.csrf,
            client,
            request_url: row.request_url,
            requested_scope: row.requested_scope.0,
            subject: row.subject,
            skip: row.skip,
            oidc_context: row.oidc_context.0,
            requested_at: row.requested_at,
        })
    }

    async fn hydrate_consent_request(
        &self,
        row: ConsentRequestRow,
    ) -> StorageResult<ConsentRequest> {
        let client = self.clients.get_client(&row.client_id).await?;
        Ok(ConsentRequest {
            challenge: row.challenge,
            verifier: row.verifier,
            csrf: row.csrf,
            client,
            request_url: row.request_url,
            requested_scope: row.requested_scope.0,
            subject: row.subject,
            skip: row.skip,
            login_challenge: row.login_challenge,
            oidc_context: row.oidc_context.0,
            requested_at: row.requested_at,
        })
    }

    async fn fetch_login_request(&self, challenge: &str) -> StorageResult<LoginRequest> {
        let row = sqlx::query_as::<_, LoginRequestRow>(
            r"SELECT challenge, verifier, csrf, client_id, request_url, requested_scope,
                     subject, skip, oidc_context, requested_at
              FROM login_requests WHERE challenge = $1",
        )
        .bind(challenge)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("login request", challenge, e))?
        .ok_or_else(|| StorageError::not_found("login request", challenge))?;

        self.hydrate_login_request(row).await
    }

    async fn fetch_consent_request(&self, challenge: &str) -> StorageResult<ConsentRequest> {
        let row = sqlx::query_as::<_, ConsentRequestRow>(
            r"SELECT challenge, verifier, csrf, client_id, request_url, requested_scope,
                     subject, skip, login_challenge, oidc_context, requested_at
              FROM consent_requests WHERE challenge = $1",
        )
        .bind(challenge)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("consent request", challenge, e))?
        .ok_or_else(|| StorageError::not_found("consent request", challenge))?;

        self.hydrate_consent_request(row).await
    }

    fn collect_grants(rows: Vec<GrantRow>) -> Vec<PreviouslyGrantedConsent> {
        let now = Utc::now();
        rows.into_iter()
            .filter_map(|row| {
                let grant = PreviouslyGrantedConsent {
                    client_id: row.client_id,
                    subject: row.subject,
                    granted_scope: row.granted_scope.0,
                    remember_for: row.remember_for,
                    granted_at: row.requested_at,
                };
                grant.is_valid_at(now).then_some(grant)
            })
            .collect()
    }
}

#[async_trait]
impl ConsentStore for SqlConsentStore {
    async fn create_login_request(&self, request: &LoginRequest) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO login_requests (
                challenge, verifier, csrf, client_id, request_url, requested_scope,
                subject, skip, oidc_context, requested_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&request.challenge)
        .bind(&request.verifier)
        .bind(&request.csrf)
        .bind(&request.client.id)
        .bind(&request.request_url)
        .bind(Json(&request.requested_scope))
        .bind(&request.subject)
        .bind(request.skip)
        .bind(Json(&request.oidc_context))
        .bind(request.requested_at)
        .execute(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("login request", &request.challenge, e))?;

        Ok(())
    }

    async fn get_login_request(&self, challenge: &str) -> StorageResult<LoginRequest> {
        self.fetch_login_request(challenge).await
    }

    async fn handle_login_request(
        &self,
        challenge: &str,
        handled: &HandledLoginRequest,
    ) -> StorageResult<LoginRequest> {
        let request = self.fetch_login_request(challenge).await?;

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

        sqlx::query(
            r"INSERT INTO handled_login_requests (
                challenge, subject, acr, remember, remember_for, authenticated_at,
                error, was_used, requested_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (challenge) DO UPDATE SET
                subject = EXCLUDED.subject, acr = EXCLUDED.acr,
                remember = EXCLUDED.remember, remember_for = EXCLUDED.remember_for,
                authenticated_at = EXCLUDED.authenticated_at, error = EXCLUDED.error,
                was_used = EXCLUDED.was_used, requested_at = EXCLUDED.requested_at",
        )
        .bind(challenge)
        .bind(&handled.subject)
        .bind(&handled.acr)
        .bind(handled.remember)
        .bind(handled.remember_for)
        .bind(handled.authenticated_at)
        .bind(handled.error.as_ref().map(Json))
        .bind(handled.was_used)
        .bind(handled.requested_at)
        .execute(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("handled login request", challenge, e))?;

        Ok(request)
    }

    async fn verify_and_invalidate_login_request(
        &self,
        verifier: &str,
    ) -> StorageResult<(LoginRequest, HandledLoginRequest)> {
        // Conditional update: exactly one concurrent caller wins.
        let challenge: Option<(String,)> = sqlx::query_as(
            r"UPDATE handled_login_requests h SET was_used = TRUE
              FROM login_requests r
              WHERE r.challenge = h.challenge
                AND r.verifier = $1
                AND h.was_used = FALSE
                AND h.requested_at > $2
              RETURNING h.challenge",
        )
        .bind(verifier)
        .bind(self.verify_cutoff())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("login verifier", verifier, e))?;

        let (challenge,) =
            challenge.ok_or_else(|| StorageError::not_found("login verifier", verifier))?;

        let request = self.fetch_login_request(&challenge).await?;
        let handled = sqlx::query_as::<_, HandledLoginRow>(
            r"SELECT challenge, subject, acr, remember, remember_for, authenticated_at,
                     error, was_used, requested_at
              FROM handled_login_requests WHERE challenge = $1",
        )
        .bind(&challenge)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("handled login request", &challenge, e))?;

        Ok((request, handled.into()))
    }

    async fn create_consent_request(&self, request: &ConsentRequest) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO consent_requests (
                challenge, verifier, csrf, client_id, request_url, requested_scope,
                subject, skip, login_challenge, oidc_context, requested_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&request.challenge)
        .bind(&request.verifier)
        .bind(&request.csrf)
        .bind(&request.client.id)
        .bind(&request.request_url)
        .bind(Json(&request.requested_scope))
        .bind(&request.subject)
        .bind(request.skip)
        .bind(&request.login_challenge)
        .bind(Json(&request.oidc_context))
        .bind(request.requested_at)
        .execute(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("consent request", &request.challenge, e))?;

        Ok(())
    }

    async fn get_consent_request(&self, challenge: &str) -> StorageResult<ConsentRequest> {
        self.fetch_consent_request(challenge).await
    }

    async fn handle_consent_request(
        &self,
        challenge: &str,
        handled: &HandledConsentRequest,
    ) -> StorageResult<ConsentRequest> {
        let request = self.fetch_consent_request(challenge).await?;

        if request.skip && handled.remember {
            return Err(StorageError::InvalidData(
                "cannot remember a consent that is already remembered".to_string(),
            ));
        }

        sqlx::query(
            r"INSERT INTO handled_consent_requests (
                challenge, granted_scope, remember, remember_for, session_access_token,
                session_id_token, error, authenticated_at, was_used, requested_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (challenge) DO UPDATE SET
                granted_scope = EXCLUDED.granted_scope, remember = EXCLUDED.remember,
                remember_for = EXCLUDED.remember_for,
                session_access_token = EXCLUDED.session_access_token,
                session_id_token = EXCLUDED.session_id_token, error = EXCLUDED.error,
                authenticated_at = EXCLUDED.authenticated_at,
                was_used = EXCLUDED.was_used, requested_at = EXCLUDED.requested_at",
        )
        .bind(challenge)
        .bind(Json(&handled.granted_scope))
        .bind(handled.remember)
        .bind(handled.remember_for)
        .bind(Json(&handled.session.access_token))
        .bind(Json(&handled.session.id_token))
        .bind(handled.error.as_ref().map(Json))
        .bind(handled.authenticated_at)
        .bind(handled.was_used)
        .bind(handled.requested_at)
        .execute(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("handled consent request", challenge, e))?;

        Ok(request)
    }

    async fn verify_and_invalidate_consent_request(
        &self,
        verifier: &str,
    ) -> StorageResult<(ConsentRequest, HandledConsentRequest)> {
        let challenge: Option<(String,)> = sqlx::query_as(
            r"UPDATE handled_consent_requests h SET was_used = TRUE
              FROM consent_requests r
              WHERE r.challenge = h.challenge
                AND r.verifier = $1
                AND h.was_used = FALSE
                AND h.requested_at > $2
              RETURNING h.challenge",
        )
        .bind(verifier)
        .bind(self.verify_cutoff())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("consent verifier", verifier, e))?;

        let (challenge,) =
            challenge.ok_or_else(|| StorageError::not_found("consent verifier", verifier))?;

        let request = self.fetch_consent_request(&challenge).await?;
        let handled = sqlx::query_as::<_, HandledConsentRow>(
            r"SELECT challenge, granted_scope, remember, remember_for, session_access_token,
                     session_id_token, error, authenticated_at, was_used, requested_at
              FROM handled_consent_requests WHERE challenge = $1",
        )
        .bind(&challenge)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("handled consent request", &challenge, e))?;

        Ok((request, handled.into()))
    }

    async fn create_authentication_session(
        &self,
        session: &AuthenticationSession,
    ) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO authentication_sessions (id, subject, authenticated_at)
              VALUES ($1, $2, $3)
              ON CONFLICT (id) DO UPDATE SET
                subject = EXCLUDED.subject, authenticated_at = EXCLUDED.authenticated_at",
        )
        .bind(&session.id)
        .bind(&session.subject)
        .bind(session.authenticated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("authentication session", &session.id, e))?;

        Ok(())
    }

    async fn get_authentication_session(
        &self,
        id: &str,
    ) -> StorageResult<AuthenticationSession> {
        let row: Option<(String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, subject, authenticated_at FROM authentication_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("authentication session", id, e))?;

        row.map(|(id, subject, authenticated_at)| AuthenticationSession {
            id,
            subject,
            authenticated_at,
        })
        .ok_or_else(|| StorageError::not_found("authentication session", id))
    }

    async fn delete_authentication_session(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM authentication_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| from_sqlx_error("authentication session", id, e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("authentication session", id));
        }
        Ok(())
    }

    async fn revoke_subject_authentication_sessions(&self, subject: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM authentication_sessions WHERE subject = $1")
            .bind(subject)
            .execute(&self.pool)
            .await
            .map_err(|e| from_sqlx_error("authentication session", subject, e))?;
        Ok(())
    }

    async fn find_previously_granted_consents(
        &self,
        client_id: &str,
        subject: &str,
    ) -> StorageResult<Vec<PreviouslyGrantedConsent>> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r"SELECT r.client_id, r.subject, h.granted_scope, h.remember_for, h.requested_at
              FROM handled_consent_requests h
              JOIN consent_requests r ON r.challenge = h.challenge
              WHERE r.client_id = $1 AND r.subject = $2
                AND h.remember = TRUE AND h.error IS NULL",
        )
        .bind(client_id)
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("granted consent", subject, e))?;

        Ok(Self::collect_grants(rows))
    }

    async fn list_subject_granted_consents(
        &self,
        subject: &str,
    ) -> StorageResult<Vec<PreviouslyGrantedConsent>> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r"SELECT r.client_id, r.subject, h.granted_scope, h.remember_for, h.requested_at
              FROM handled_consent_requests h
              JOIN consent_requests r ON r.challenge = h.challenge
              WHERE r.subject = $1 AND h.remember = TRUE AND h.error IS NULL",
        )
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("granted consent", subject, e))?;

        Ok(Self::collect_grants(rows))
    }

    async fn revoke_subject_consents(&self, subject: &str) -> StorageResult<()> {
        sqlx::query(
            r"DELETE FROM consent_requests r
              USING handled_consent_requests h
              WHERE h.challenge = r.challenge AND r.subject = $1",
        )
        .bind(subject)
        .execute(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("granted consent", subject, e))?;
        Ok(())
    }

    async fn revoke_subject_client_consents(
        &self,
        subject: &str,
        client_id: &str,
    ) -> StorageResult<()> {
        sqlx::query(
            r"DELETE FROM consent_requests r
              USING handled_consent_requests h
              WHERE h.challenge = r.challenge AND r.subject = $1 AND r.client_id = $2",
        )
        .bind(subject)
        .bind(client_id)
        .execute(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("granted consent", subject, e))?;
        Ok(())
    }
}
