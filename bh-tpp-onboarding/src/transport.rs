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

//! HTTP clients used to talk to the sandbox.

use std::time::Duration;

use bherror::traits::{ErrorContext as _, ForeignError as _};
use reqwest::blocking::Client;

use crate::{provisioner::Credentials, Error, OnboardingConfig, Result};

/// The client identity presented during the mutual TLS handshake: the
/// transport (QWAC) certificate and its private key.
///
/// The signing (QSEAL) pair is never used as a TLS identity.
#[derive(Clone)]
pub struct TransportIdentity {
    certificate_pem: String,
    private_key_pem: Vec<u8>,
}

impl TransportIdentity {
    /// Take the transport certificate and key from provisioned credentials.
    ///
    /// Both halves are required.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, Error> {
        let transport = credentials.transport().ok_or_else(|| {
            bherror::Error::root(Error::Precondition(
                "transport key was not provisioned".to_owned(),
            ))
        })?;
        let certificate_pem = transport.certificate_pem().ok_or_else(|| {
            bherror::Error::root(Error::Precondition(
                "transport certificate was not provisioned".to_owned(),
            ))
        })?;

        Ok(Self {
            certificate_pem: certificate_pem.to_owned(),
            private_key_pem: transport.private_key_pem().to_vec(),
        })
    }

    /// Build the identity from PEM encoded parts. The key must be PKCS#8.
    pub fn from_pem(certificate_pem: impl Into<String>, private_key_pem: impl Into<Vec<u8>>) -> Self {
        Self {
            certificate_pem: certificate_pem.into(),
            private_key_pem: private_key_pem.into(),
        }
    }

    fn to_reqwest_identity(&self) -> Result<reqwest::Identity, Error> {
        reqwest::Identity::from_pkcs8_pem(self.certificate_pem.as_bytes(), &self.private_key_pem)
            .foreign_err(|| Error::Precondition("transport identity is unusable".to_owned()))
    }
}

impl std::fmt::Debug for TransportIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportIdentity")
            .field("certificate_pem", &self.certificate_pem)
            .finish_non_exhaustive()
    }
}

/// Client authenticating with `identity`, used for the registration and
/// token calls.
///
/// Server certificates are verified unless the configuration disables it.
pub fn mtls_client(config: &OnboardingConfig, identity: &TransportIdentity) -> Result<Client, Error> {
    if !config.verify_server_certificate {
        tracing::warn!("server certificate verification is disabled for mutual TLS calls");
    }

    Client::builder()
        .identity(identity.to_reqwest_identity()?)
        .danger_accept_invalid_certs(!config.verify_server_certificate)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .foreign_err(|| Error::HttpClient)
        .ctx(|| "mutual TLS client")
}

/// Client without a client identity, used for certificate issuance. It always
/// verifies the server certificate.
pub fn plain_client(config: &OnboardingConfig) -> Result<Client, Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .foreign_err(|| Error::HttpClient)
}
