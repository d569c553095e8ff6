// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The Registration Client: Dynamic Client Registration and the
//! `client_credentials` token exchange, both over mutual TLS.

use bherror::traits::{ErrorContext as _, ForeignError as _};
use reqwest::{
    blocking::{Client, Response},
    header::{ACCEPT, CONTENT_TYPE},
    StatusCode,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    artifacts::{Artifact, ArtifactStore},
    provisioner::API_KEY_HEADER,
    transport::{self, TransportIdentity},
    Endpoint, Error, OnboardingConfig, Result, Secret,
};

/// Scope requested in the token exchange.
pub const TOKEN_SCOPE: &str = "accounts";

/// Media type of the registration request body.
pub const JWT_CONTENT_TYPE: &str = "application/jwt";

/// Client credentials issued by the registration endpoint.
#[derive(Clone)]
pub struct TppRegistrationResult {
    /// The OAuth client identifier.
    pub client_id: String,
    /// The OAuth client secret.
    pub client_secret: Secret,
    /// The complete registration response.
    pub raw: Value,
}

// `raw` repeats the client secret.
impl std::fmt::Debug for TppRegistrationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TppRegistrationResult")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret)
            .finish_non_exhaustive()
    }
}

/// An OAuth2 access token obtained with the `client_credentials` grant.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    /// The bearer token.
    pub access_token: Secret,
    /// Usually `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Granted scope.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Client for the registration and token endpoints, authenticated with the
/// transport identity.
pub struct RegistrationClient<'a> {
    config: &'a OnboardingConfig,
    client: Client,
}

impl<'a> RegistrationClient<'a> {
    /// Create the client. Fails if the identity cannot be used for TLS.
    pub fn new(config: &'a OnboardingConfig, identity: &TransportIdentity) -> Result<Self, Error> {
        Ok(Self {
            config,
            client: transport::mtls_client(config, identity)?,
        })
    }

    /// Submit the registration JWT and persist the response.
    ///
    /// The endpoint must answer `201 Created`. The request is sent exactly
    /// once, since resubmission may register the TPP twice.
    pub fn register(
        &self,
        registration_jwt: &str,
        store: &ArtifactStore,
    ) -> Result<TppRegistrationResult, Error> {
        let endpoint = Endpoint::Registration;
        tracing::debug!(url = %self.config.registration_url, "submitting registration");

        let response = self
            .client
            .post(self.config.registration_url.clone())
            .header(CONTENT_TYPE, JWT_CONTENT_TYPE)
            .header(ACCEPT, "application/json")
            .header(API_KEY_HEADER, self.config.api_key.expose())
            .body(registration_jwt.to_owned())
            .send()
            .foreign_err(|| Error::Transport(endpoint))?;

        let body = expect_status(response, endpoint, |status| status == StatusCode::CREATED)?;
        let raw: Value = serde_json::from_str(&body)
            .match_foreign_err(|error| Error::InvalidResponse(endpoint, error.to_string()))?;

        let pretty = serde_json::to_vec_pretty(&raw)
            .foreign_err(|| Error::Storage(Artifact::RegistrationResult))?;
        store.write(Artifact::RegistrationResult, &pretty)?;

        let client_id = string_member(&raw, "client_id")?;
        let client_secret = string_member(&raw, "client_secret")?;
        tracing::info!(client_id, "TPP registered");

        Ok(TppRegistrationResult {
            client_id: client_id.to_owned(),
            client_secret: Secret::new(client_secret),
            raw,
        })
    }

    /// Exchange the client credentials for an access token with scope
    /// [`TOKEN_SCOPE`]. Any `2xx` status is accepted.
    pub fn exchange_token(&self, registration: &TppRegistrationResult) -> Result<AccessToken, Error> {
        let endpoint = Endpoint::Token;
        tracing::debug!(url = %self.config.token_url, "requesting access token");

        let response = self
            .client
            .post(self.config.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", TOKEN_SCOPE),
                ("client_id", registration.client_id.as_str()),
                ("client_secret", registration.client_secret.expose()),
            ])
            .send()
            .foreign_err(|| Error::Transport(endpoint))?;

        let body = expect_status(response, endpoint, |status| status.is_success())?;
        let token: AccessToken = serde_json::from_str(&body)
            .match_foreign_err(|error| Error::InvalidResponse(endpoint, error.to_string()))?;

        if token.access_token.expose().is_empty() {
            return Err(bherror::Error::root(Error::InvalidResponse(
                endpoint,
                "empty `access_token`".to_owned(),
            )));
        }

        tracing::info!(
            token_type = token.token_type.as_deref(),
            expires_in = token.expires_in,
            "access token obtained"
        );
        Ok(token)
    }
}

/// Read the body, failing with [`Error::UpstreamRejection`] unless `accept`
/// holds for the status.
fn expect_status(
    response: Response,
    endpoint: Endpoint,
    accept: impl FnOnce(StatusCode) -> bool,
) -> Result<String, Error> {
    let status = response.status();
    let body = response
        .text()
        .foreign_err(|| Error::Transport(endpoint))
        .ctx(|| "reading response body")?;

    if !accept(status) {
        return Err(bherror::Error::root(Error::UpstreamRejection(
            endpoint,
            status.as_u16(),
            body,
        )));
    }

    Ok(body)
}

fn string_member<'a>(raw: &'a Value, member: &str) -> Result<&'a str, Error> {
    raw.get(member)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            bherror::Error::root(Error::InvalidResponse(
                Endpoint::Registration,
                format!("missing `{member}`"),
            ))
        })
}
