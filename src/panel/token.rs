//! OAuth2 client-credentials tokens for the panel.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::instrument;

use super::ServerConfig;
use crate::error::PanelError;

/// A token granted by `/oauth2/token`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl AccessToken {
    /// Value of the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// The cached token of a single server.
///
/// There is no expiry check, a token is only replaced after the panel rejects it.
#[derive(Debug, Default)]
pub struct TokenCache {
    #[allow(clippy::missing_docs_in_private_items)]
    inner: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    /// Return the cached token, acquiring one first if there is none.
    pub async fn get_or_acquire(
        &self,
        http: &reqwest::Client,
        config: &ServerConfig,
        timeout: std::time::Duration,
    ) -> Result<AccessToken, PanelError> {
        let mut slot = self.inner.lock().await;
        match slot.as_ref() {
            Some(token) => Ok(token.clone()),
            None => {
                let token = acquire(http, config, timeout).await?;
                *slot = Some(token.clone());
                Ok(token)
            }
        }
    }

    /// Forget the cached token so the next call acquires a new one.
    pub async fn invalidate(&self) {
        self.inner.lock().await.take();
    }

    /// The currently cached token, if any.
    #[cfg(test)]
    pub async fn current(&self) -> Option<AccessToken> {
        self.inner.lock().await.clone()
    }
}

/// Post a client-credentials grant to the panel.
#[instrument(skip_all, fields(server = %config.id))]
async fn acquire(
    http: &reqwest::Client,
    config: &ServerConfig,
    timeout: std::time::Duration,
) -> Result<AccessToken, PanelError> {
    tracing::debug!("Requesting a new access token.");

    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
    ];
    let response = http
        .post(config.endpoint("/oauth2/token"))
        .timeout(timeout)
        .form(&form)
        .send()
        .await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(PanelError::Auth {
            reason: format!("token endpoint answered {status}: {}", text.trim()),
        });
    }

    let body: Value = serde_json::from_str(&text).map_err(|e| PanelError::Auth {
        reason: format!("unexpected token response: {e}"),
    })?;

    if let Some(error) = body.get("error") {
        let reason = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(PanelError::Auth { reason });
    }

    serde_json::from_value(body).map_err(|e| PanelError::Auth {
        reason: format!("unexpected token response: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_header() {
        let token: AccessToken = serde_json::from_str(
            r#"{"access_token":"abc","token_type":"Bearer","expires_in":3600,"scope":"servers.view"}"#,
        )
        .unwrap();
        assert_eq!(token.authorization(), "Bearer abc");
        assert_eq!(token.expires_in, Some(3600));
    }

    #[test]
    fn optional_fields() {
        let token: AccessToken =
            serde_json::from_str(r#"{"access_token":"abc","token_type":"Bearer"}"#).unwrap();
        assert_eq!(token.scope, None);
    }
}
