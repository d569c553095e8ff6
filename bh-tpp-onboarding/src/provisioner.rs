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

//! The Credential Provisioner: obtains key material from the sandbox and
//! turns it into certificate and key artifacts.

use std::collections::HashMap;

use bh_jws_rsa::{private_key_from_jwk, JwkSet, SigningAlgorithm};
use bherror::traits::{ErrorContext as _, ForeignError as _, PropagateError as _};
use openssl::pkey::{PKey, Private};
use reqwest::{
    blocking::Client,
    header::{ACCEPT, CONTENT_LENGTH},
    StatusCode,
};
use url::Url;

use crate::{
    artifacts::{Artifact, ArtifactStore},
    key_bundle::{CertificateResponse, KeyBundleEntry, KeyClass, KeyPurpose},
    pem, transport, Endpoint, Error, OnboardingConfig, Result,
};

/// Algorithm of the assertions signed with the provisioned QSEAL key.
pub const SIGNING_ALGORITHM: SigningAlgorithm = SigningAlgorithm::Rs256;

/// Header carrying the sandbox API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// What the Assertion Builder needs to know about the provisioned TPP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareStatementInfo {
    /// TPP identifier assigned by the sandbox, the issuer of the SSA.
    pub tpp_id: String,
    /// Where the sandbox publishes the public JWKS of the TPP.
    pub public_jwks_url: String,
    /// Identifier of the QSEAL key, if one was provisioned.
    pub qseal_kid: Option<String>,
    /// Signature algorithm of the assertions.
    pub alg: SigningAlgorithm,
}

impl SoftwareStatementInfo {
    /// The QSEAL key identifier, which must be known before signing.
    pub fn signing_kid(&self) -> Result<&str, Error> {
        self.qseal_kid.as_deref().ok_or_else(|| {
            bherror::Error::root(Error::Precondition(
                "no QSEAL signing key was provisioned".to_owned(),
            ))
        })
    }
}

/// A converted private key together with its certificate, if the bundle
/// entry had one.
pub struct KeyMaterial {
    kid: String,
    class: KeyClass,
    private_key: PKey<Private>,
    private_key_pem: Vec<u8>,
    certificate_pem: Option<String>,
}

impl KeyMaterial {
    /// Identifier of the key.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Class of the bundle entry the key came from.
    pub fn class(&self) -> KeyClass {
        self.class
    }

    /// The private key.
    pub fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    /// The private key as PKCS#8 PEM.
    pub fn private_key_pem(&self) -> &[u8] {
        &self.private_key_pem
    }

    /// The leaf certificate as PEM.
    pub fn certificate_pem(&self) -> Option<&str> {
        self.certificate_pem.as_deref()
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("kid", &self.kid)
            .field("class", &self.class)
            .field("certificate_pem", &self.certificate_pem)
            .finish_non_exhaustive()
    }
}

/// Provisioned key material, by purpose.
#[derive(Debug, Default)]
pub struct Credentials {
    transport: Option<KeyMaterial>,
    signing: Option<KeyMaterial>,
}

impl Credentials {
    /// The QWAC key material, used as the mutual TLS identity.
    pub fn transport(&self) -> Option<&KeyMaterial> {
        self.transport.as_ref()
    }

    /// The QSEAL key material, used to sign assertions.
    pub fn signing(&self) -> Option<&KeyMaterial> {
        self.signing.as_ref()
    }

    pub(crate) fn insert(&mut self, purpose: KeyPurpose, material: KeyMaterial) {
        let slot = match purpose {
            KeyPurpose::Transport => &mut self.transport,
            KeyPurpose::Signing => &mut self.signing,
        };
        *slot = Some(material);
    }
}

/// Output of the Credential Provisioner.
#[derive(Debug)]
pub struct Provisioned {
    /// Input of the Assertion Builder.
    pub ssi: SoftwareStatementInfo,
    /// In-memory copies of the written keys and certificates.
    pub credentials: Credentials,
    /// Public counterparts of every successfully converted key.
    pub public_jwks: JwkSet,
}

/// Request key material from the sandbox and materialize it into `store`.
///
/// A rejected request fails immediately, before anything is written.
pub fn provision(config: &OnboardingConfig, store: &ArtifactStore) -> Result<Provisioned, Error> {
    let client = transport::plain_client(config)?;
    let response = request_certificates(&client, config)?;

    materialize(&response, store)
}

/// The certificate issuance URL with the TPP attributes as query parameters.
pub fn certificate_request_url(config: &OnboardingConfig) -> Url {
    let mut url = config.sandbox_url.clone();
    url.query_pairs_mut()
        .append_pair("c", &config.country)
        .append_pair("cn", &config.tpp_name)
        .append_pair("roles", &config.roles.joined());
    url
}

/// Issue the certificate request. The sandbox must answer `201 Created`.
pub fn request_certificates(
    client: &Client,
    config: &OnboardingConfig,
) -> Result<CertificateResponse, Error> {
    let endpoint = Endpoint::CertificateIssuance;
    let url = certificate_request_url(config);
    tracing::debug!(%url, "requesting certificates");

    let response = client
        .post(url)
        .header(API_KEY_HEADER, config.api_key.expose())
        .header(ACCEPT, "application/json")
        .header(CONTENT_LENGTH, "0")
        .send()
        .foreign_err(|| Error::Transport(endpoint))?;

    let status = response.status();
    let body = response
        .text()
        .foreign_err(|| Error::Transport(endpoint))
        .ctx(|| "reading response body")?;

    if status != StatusCode::CREATED {
        return Err(bherror::Error::root(Error::UpstreamRejection(
            endpoint,
            status.as_u16(),
            body,
        )));
    }

    serde_json::from_str(&body)
        .match_foreign_err(|error| Error::InvalidResponse(endpoint, error.to_string()))
}

/// Write the artifacts of every bundle entry and derive the
/// [`SoftwareStatementInfo`].
///
/// An entry whose private key cannot be converted is skipped with a warning;
/// its certificate, if any, is still written. The public JWKS document is
/// written last and lists exactly the converted keys.
pub fn materialize(
    response: &CertificateResponse,
    store: &ArtifactStore,
) -> Result<Provisioned, Error> {
    let tpp_id = required_member(response.tpp_id.as_deref(), "tppId")?;
    let public_jwks_url = required_member(response.public_jwks_url.as_deref(), "publicJwksUrl")?;

    let entries = response.entries();
    let owners = slot_owners(entries);

    let mut credentials = Credentials::default();
    let mut public_jwks = JwkSet::empty();
    let mut qseal_kid = None;

    for (index, entry) in entries.iter().enumerate() {
        let kid = entry.kid();
        let class = entry.class();
        let purpose = class.purpose();

        let converted = match convert_private_key(entry) {
            Ok(converted) => {
                public_jwks.push(entry.jwk());
                Some(converted)
            }
            Err(error) => {
                tracing::warn!(kid, ?error, "skipping key that could not be converted");
                None
            }
        };

        if owners.get(&purpose) != Some(&index) {
            tracing::warn!(
                kid,
                %purpose,
                "skipping entry, another key provides this purpose"
            );
            continue;
        }

        let certificate_pem = match entry.leaf_certificate() {
            Some(x5c) => {
                let pem = pem::certificate_pem_from_x5c(x5c)
                    .ctx(|| format!("certificate of `{kid}`"))?;
                store.write(purpose.certificate_artifact(), pem.as_bytes())?;
                Some(pem)
            }
            None => None,
        };

        let Some((private_key, private_key_pem)) = converted else {
            continue;
        };
        store.write(purpose.key_artifact(), &private_key_pem)?;

        if class == KeyClass::Qseal {
            qseal_kid = Some(kid.to_owned());
        }

        credentials.insert(
            purpose,
            KeyMaterial {
                kid: kid.to_owned(),
                class,
                private_key,
                private_key_pem,
                certificate_pem,
            },
        );
    }

    let public_jwks_json =
        serde_json::to_vec_pretty(&public_jwks).foreign_err(|| Error::Storage(Artifact::PublicJwks))?;
    store.write(Artifact::PublicJwks, &public_jwks_json)?;

    tracing::info!(
        tpp_id,
        keys = public_jwks.len(),
        qseal_kid = qseal_kid.as_deref(),
        "provisioning complete"
    );

    Ok(Provisioned {
        ssi: SoftwareStatementInfo {
            tpp_id: tpp_id.to_owned(),
            public_jwks_url: public_jwks_url.to_owned(),
            qseal_kid,
            alg: SIGNING_ALGORITHM,
        },
        credentials,
        public_jwks,
    })
}

fn required_member<'a>(value: Option<&'a str>, member: &str) -> Result<&'a str, Error> {
    value.filter(|value| !value.is_empty()).ok_or_else(|| {
        bherror::Error::root(Error::InvalidResponse(
            Endpoint::CertificateIssuance,
            format!("missing `{member}`"),
        ))
    })
}

/// Index of the entry whose artifacts fill each purpose: the first QWAC entry
/// for transport; the first QSEAL entry for signing, or the first unlabelled
/// entry if there is none.
fn slot_owners(entries: &[KeyBundleEntry]) -> HashMap<KeyPurpose, usize> {
    let mut owners: HashMap<KeyPurpose, usize> = HashMap::new();

    for (index, entry) in entries.iter().enumerate() {
        let class = entry.class();
        let takes_slot = match owners.get(&class.purpose()) {
            None => true,
            Some(&owner) => {
                class == KeyClass::Qseal && entries[owner].class() == KeyClass::Unlabelled
            }
        };
        if takes_slot {
            owners.insert(class.purpose(), index);
        }
    }

    owners
}

fn convert_private_key(entry: &KeyBundleEntry) -> Result<(PKey<Private>, Vec<u8>), Error> {
    let kid = entry.kid();

    let private_key =
        private_key_from_jwk(entry.jwk()).with_err(|| Error::KeyConversion(kid.to_owned()))?;
    let private_key_pem = private_key
        .private_key_to_pem_pkcs8()
        .foreign_err(|| Error::KeyConversion(kid.to_owned()))?;

    Ok((private_key, private_key_pem))
}
