//! Registrations HTTP client.

use crate::error::RegistrationsError;
use crate::types::*;
use credential_store::{CredentialStore, Slot};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Client for the registrations service.
///
/// Exchanges the stored API key for a bearer token on demand and keeps
/// the token cached in the credential store until the server rejects it.
#[derive(Clone)]
pub struct RegistrationsClient {
    client: Client,
    base_url: String,
    store: CredentialStore,
}

impl RegistrationsClient {
    /// Create a new client.
    pub fn new(
        base_url: impl Into<String>,
        store: CredentialStore,
        timeout: Duration,
    ) -> Result<Self, RegistrationsError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            store,
        })
    }

    /// The credential store backing this client.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Exchange the API key for a bearer token.
    ///
    /// Single request, no retry; retry policy belongs to the caller.
    #[instrument(skip(self, api_key))]
    pub async fn exchange_token(
        &self,
        api_key: &SecretString,
    ) -> Result<SecretString, RegistrationsError> {
        let request = TokenRequest {
            api_key: api_key.expose_secret().clone(),
        };

        let response = self
            .client
            .post(format!("{}/auth/token", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Token exchange failed: {}", status);
            return Err(RegistrationsError::Auth {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = parse_json(response).await?;
        debug!("Token exchange succeeded");
        Ok(SecretString::new(body.token))
    }

    /// Fetch the current registration list.
    ///
    /// Acquires a token first when none is cached. A 401 evicts the
    /// cached token and the fetch is retried once with a fresh one; a
    /// second consecutive 401 is surfaced as an authentication failure.
    #[instrument(skip(self))]
    pub async fn fetch_registrations(&self) -> Result<Vec<Registration>, RegistrationsError> {
        let mut refreshed = false;

        loop {
            let token = self.ensure_token().await?;

            let response = self
                .client
                .get(format!("{}/api/registrations", self.base_url))
                .bearer_auth(token.expose_secret())
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                self.store.delete(Slot::AccessToken).await?;
                if refreshed {
                    let message = response.text().await.unwrap_or_default();
                    warn!("Refreshed token rejected");
                    return Err(RegistrationsError::Auth {
                        status: status.as_u16(),
                        message,
                    });
                }
                debug!("Cached token rejected, retrying with a fresh one");
                refreshed = true;
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(RegistrationsError::Server {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: RegistrationsResponse = parse_json(response).await?;
            debug!("Fetched {} registrations", body.registrations.len());
            return Ok(body.registrations);
        }
    }

    /// Return the cached access token, exchanging the API key when absent.
    async fn ensure_token(&self) -> Result<SecretString, RegistrationsError> {
        if let Some(token) = self.store.get(Slot::AccessToken).await? {
            return Ok(token);
        }

        let api_key = self
            .store
            .get(Slot::ApiKey)
            .await?
            .ok_or(RegistrationsError::MissingApiKey)?;

        let token = self.exchange_token(&api_key).await?;
        self.store.set(Slot::AccessToken, token.clone()).await?;
        Ok(token)
    }
}

/// Parse a successful response body.
async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RegistrationsError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(RegistrationsError::from)
}
