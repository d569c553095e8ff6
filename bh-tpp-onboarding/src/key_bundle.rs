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

//! The key bundle returned by the certificate issuance endpoint.

use bh_jws_rsa::JwkPrivate;
use serde::Deserialize;
use serde_json::Value;

use crate::artifacts::Artifact;

/// Key identifier used for bundle entries without a `kid`.
pub const NO_KID: &str = "no-kid";

/// Class of a key bundle entry, determined once from its key identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyClass {
    /// The identifier contains `qwac`.
    Qwac,
    /// The identifier contains `qseal`, but not `qwac`.
    Qseal,
    /// The identifier contains neither.
    Unlabelled,
}

impl KeyClass {
    /// Classify a key identifier, ignoring case. `qwac` takes precedence
    /// over `qseal`.
    pub fn classify(kid: &str) -> Self {
        let kid = kid.to_lowercase();
        if kid.contains("qwac") {
            Self::Qwac
        } else if kid.contains("qseal") {
            Self::Qseal
        } else {
            Self::Unlabelled
        }
    }

    /// What keys of this class are used for. Unlabelled keys are treated as
    /// signing keys.
    pub fn purpose(self) -> KeyPurpose {
        match self {
            Self::Qwac => KeyPurpose::Transport,
            Self::Qseal | Self::Unlabelled => KeyPurpose::Signing,
        }
    }
}

/// Role of a certificate and key pair in the onboarding.
#[derive(strum_macros::Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    /// Mutual TLS client identity (QWAC).
    #[strum(to_string = "transport")]
    Transport,
    /// Assertion signing (QSEAL).
    #[strum(to_string = "signing")]
    Signing,
}

impl KeyPurpose {
    /// The artifact holding the certificate of this purpose.
    pub fn certificate_artifact(self) -> Artifact {
        match self {
            Self::Transport => Artifact::TransportCertificate,
            Self::Signing => Artifact::SigningCertificate,
        }
    }

    /// The artifact holding the private key of this purpose.
    pub fn key_artifact(self) -> Artifact {
        match self {
            Self::Transport => Artifact::TransportKey,
            Self::Signing => Artifact::SigningKey,
        }
    }
}

/// One element of the private JWKS returned by the sandbox: a private JWK,
/// optionally carrying its certificate chain in `x5c`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "JwkPrivate")]
pub struct KeyBundleEntry {
    kid: Option<String>,
    x5c: Vec<String>,
    jwk: JwkPrivate,
}

impl KeyBundleEntry {
    /// The key identifier, or [`NO_KID`] if the entry has none.
    pub fn kid(&self) -> &str {
        self.kid.as_deref().unwrap_or(NO_KID)
    }

    /// The class of the entry.
    pub fn class(&self) -> KeyClass {
        KeyClass::classify(self.kid())
    }

    /// First (leaf) element of the certificate chain, standard base64 DER.
    pub fn leaf_certificate(&self) -> Option<&str> {
        self.x5c.first().map(String::as_str)
    }

    /// The complete JWK, private members included.
    pub fn jwk(&self) -> &JwkPrivate {
        &self.jwk
    }
}

impl TryFrom<JwkPrivate> for KeyBundleEntry {
    type Error = &'static str;

    fn try_from(jwk: JwkPrivate) -> Result<Self, Self::Error> {
        let kid = match jwk.get("kid") {
            None | Some(Value::Null) => None,
            Some(Value::String(kid)) => Some(kid.clone()),
            Some(_) => return Err("JWK contains a `kid` parameter that is not a string"),
        };

        let x5c = match jwk.get("x5c") {
            None | Some(Value::Null) => vec![],
            Some(Value::Array(chain)) => chain
                .iter()
                .map(|cert| {
                    cert.as_str()
                        .map(str::to_owned)
                        .ok_or("JWK `x5c` parameter contains a non-string element")
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err("JWK `x5c` parameter is not an array"),
        };

        Ok(Self { kid, x5c, jwk })
    }
}

/// Body of a successful certificate issuance response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateResponse {
    /// Identifier assigned to the TPP.
    pub tpp_id: Option<String>,
    /// Where the sandbox publishes the public JWKS of the TPP.
    pub public_jwks_url: Option<String>,
    /// The issued keys.
    pub private_jwks: Option<PrivateJwks>,
}

impl CertificateResponse {
    /// The bundle entries; an absent `privateJwks` is an empty bundle.
    pub fn entries(&self) -> &[KeyBundleEntry] {
        self.private_jwks
            .as_ref()
            .map(|jwks| jwks.keys.as_slice())
            .unwrap_or_default()
    }
}

/// The `privateJwks` member of [`CertificateResponse`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrivateJwks {
    /// Bundle entries, in response order.
    #[serde(default)]
    pub keys: Vec<KeyBundleEntry>,
}
