//! Fallback pages for unconfigured deployments.
//!
//! When no login/consent or error UI is configured, the flow lands on these
//! routes, which explain the missing configuration instead of failing
//! silently.

use axum::response::Html;
use tracing::warn;

/// GET `/oauth2/fallbacks/consent`
pub async fn fallback_consent() -> Html<&'static str> {
    warn!("no login/consent URL is configured, OAuth 2.0 flows requiring user interaction will fail");

    Html(
        r#"<!DOCTYPE html>
<html>
<head><title>Misconfigured login/consent URL</title></head>
<body>
<p>
    The login and consent provider URLs are not configured. Set the
    <code>LOGIN_URL</code> and <code>CONSENT_URL</code> environment
    variables to the login and consent apps of your deployment.
</p>
<p>
    If you are a user and see this page, contact the administrator.
</p>
</body>
</html>"#,
    )
}

/// GET `/oauth2/fallbacks/error`
pub async fn fallback_error() -> Html<&'static str> {
    warn!("no error URL is configured");

    Html(
        r#"<!DOCTYPE html>
<html>
<head><title>An OAuth 2.0 error occurred</title></head>
<body>
<p>
    The authorization request failed and no error UI is configured. Set the
    <code>ERROR_URL</code> environment variable to present errors to end
    users properly.
</p>
</body>
</html>"#,
    )
}
