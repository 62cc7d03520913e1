//! Login gate.
//!
//! Space-Track authenticates with a form POST to `ajaxauth/login`; the
//! session cookie it sets is kept by the HTTP client's cookie store. A bad
//! credential pair still answers 200, with `{"Login": "Failed"}` as the body.

use crate::error::{ClientError, Result};
use crate::response::check_status;
use reqwest_middleware::ClientWithMiddleware;
use tokio::sync::OnceCell;
use url::Url;

/// Ensures exactly one successful login per session.
///
/// Concurrent callers share the in-flight attempt. A failed attempt leaves the
/// gate closed, so the next call logs in again.
#[derive(Debug, Default)]
pub struct AuthGate {
    authenticated: OnceCell<()>,
}

impl AuthGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.initialized()
    }

    /// Log in unless already authenticated.
    pub async fn ensure_authenticated(
        &self,
        http: &ClientWithMiddleware,
        base_url: &Url,
        identity: &str,
        password: &str,
    ) -> Result<()> {
        self.authenticated
            .get_or_try_init(|| login(http, base_url, identity, password))
            .await?;
        Ok(())
    }
}

async fn login(
    http: &ClientWithMiddleware,
    base_url: &Url,
    identity: &str,
    password: &str,
) -> Result<()> {
    let url = base_url
        .join("ajaxauth/login")
        .map_err(|e| ClientError::Config(format!("Invalid login URL: {}", e)))?;

    tracing::debug!(url = %url, identity = %identity, "Logging in");

    let response = http
        .post(url)
        .form(&[("identity", identity), ("password", password)])
        .send()
        .await?;
    let response = check_status(response).await?;

    let body = response.bytes().await?;
    if login_failed(&body) {
        tracing::warn!(identity = %identity, "Login rejected");
        return Err(ClientError::Authentication);
    }

    tracing::info!(identity = %identity, "Authenticated with Space-Track");
    Ok(())
}

/// Whether a login response body carries the failure marker.
fn login_failed(body: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("Login")
                .and_then(|v| v.as_str())
                .map(|s| s == "Failed")
        })
        .unwrap_or(false)
}
