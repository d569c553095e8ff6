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

//! The Assertion Builder: the Software Statement Assertion (SSA) and the
//! Dynamic Client Registration JWT embedding it.

use bh_jws_rsa::{
    jwt::{self, AlgorithmType, JoseHeader, Token},
    JwtSigner as _, RsaSigner, Signer, SigningAlgorithm,
};
use bherror::traits::{ForeignBoxed as _, PropagateError as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    artifacts::{Artifact, ArtifactStore},
    provisioner::{Credentials, SoftwareStatementInfo},
    Error, OnboardingConfig, Result,
};

/// Validity of the SSA: five 365-day years.
pub const SSA_VALIDITY_SECS: i64 = 157_680_000;

/// Validity of the registration JWT: one hour.
pub const REGISTRATION_JWT_VALIDITY_SECS: i64 = 3_600;

/// Grant types requested at registration.
pub const GRANT_TYPES: [&str; 3] = ["client_credentials", "authorization_code", "refresh_token"];

/// Value of the `typ` header parameter.
pub const JWT_TYPE: &str = "JWT";

/// JOSE header shared by the SSA and the registration JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionHeader {
    /// Signature algorithm.
    pub alg: SigningAlgorithm,
    /// Identifier of the QSEAL key.
    pub kid: String,
    /// Always [`JWT_TYPE`]. Sent as the registered `typ` parameter; the
    /// non-standard `type` some sandbox clients add is not emitted.
    pub typ: String,
}

impl AssertionHeader {
    fn new(alg: SigningAlgorithm, kid: &str) -> Self {
        Self {
            alg,
            kid: kid.to_owned(),
            typ: JWT_TYPE.to_owned(),
        }
    }
}

impl JoseHeader for AssertionHeader {
    fn algorithm_type(&self) -> AlgorithmType {
        self.alg.into()
    }

    fn key_id(&self) -> Option<&str> {
        Some(&self.kid)
    }
}

/// Claims of the Software Statement Assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftwareStatementClaims {
    /// The TPP identifier.
    pub iss: String,
    /// Issued at, seconds since the epoch.
    pub iat: i64,
    /// `iat` + [`SSA_VALIDITY_SECS`].
    pub exp: i64,
    /// Random UUID v4.
    pub jti: String,
    /// Random UUID v4.
    pub software_client_id: String,
    /// Requested roles.
    pub software_roles: Vec<String>,
    /// Public JWKS URL of the TPP.
    pub software_jwks_endpoint: String,
    /// Redirect URIs of the software.
    pub software_redirect_uris: Vec<String>,
    /// The TPP name.
    pub software_client_name: String,
    /// Client URI of the software.
    pub software_client_uri: String,
    /// The TPP name.
    pub org_name: String,
    /// The TPP identifier.
    pub org_id: String,
    /// Organization contacts, passed through from the configuration.
    pub org_contacts: Vec<Value>,
}

/// Claims of the registration JWT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationClaims {
    /// Issued at, same as the embedded SSA.
    pub iat: i64,
    /// `iat` + [`REGISTRATION_JWT_VALIDITY_SECS`].
    pub exp: i64,
    /// The registration endpoint.
    pub aud: String,
    /// Random UUID v4.
    pub jti: String,
    /// Requested redirect URIs.
    pub redirect_uris: Vec<String>,
    /// Always [`GRANT_TYPES`].
    pub grant_types: Vec<String>,
    /// The compact serialized SSA.
    pub software_statement: String,
}

/// Both signed assertions, compact serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertions {
    /// The SSA.
    pub software_statement: String,
    /// The registration JWT, embedding [`Assertions::software_statement`].
    pub registration_jwt: String,
}

/// Sign both assertions with a single `issued_at` timestamp.
///
/// Performs no I/O; every call draws fresh random identifiers.
pub fn sign_assertions(
    config: &OnboardingConfig,
    ssi: &SoftwareStatementInfo,
    signer: &impl Signer,
    issued_at: i64,
) -> Result<Assertions, Error> {
    let header = AssertionHeader::new(ssi.alg, ssi.signing_kid()?);

    let ssa_claims = SoftwareStatementClaims {
        iss: ssi.tpp_id.clone(),
        iat: issued_at,
        exp: issued_at + SSA_VALIDITY_SECS,
        jti: Uuid::new_v4().to_string(),
        software_client_id: Uuid::new_v4().to_string(),
        software_roles: config.roles.as_slice().to_vec(),
        software_jwks_endpoint: ssi.public_jwks_url.clone(),
        software_redirect_uris: config.software_redirect_uris.clone(),
        software_client_name: config.tpp_name.clone(),
        software_client_uri: config.software_client_uri.clone(),
        org_name: config.tpp_name.clone(),
        org_id: ssi.tpp_id.clone(),
        org_contacts: config.org_contacts.clone(),
    };
    let software_statement = sign(signer, header.clone(), ssa_claims, "software statement")?;

    let registration_claims = RegistrationClaims {
        iat: issued_at,
        exp: issued_at + REGISTRATION_JWT_VALIDITY_SECS,
        aud: config.registration_url.to_string(),
        jti: Uuid::new_v4().to_string(),
        redirect_uris: config.redirect_uris.clone(),
        grant_types: GRANT_TYPES.iter().map(|grant| grant.to_string()).collect(),
        software_statement: software_statement.clone(),
    };
    let registration_jwt = sign(signer, header, registration_claims, "registration JWT")?;

    Ok(Assertions {
        software_statement,
        registration_jwt,
    })
}

fn sign<C: Serialize>(
    signer: &impl Signer,
    header: AssertionHeader,
    claims: C,
    what: &str,
) -> Result<String, Error> {
    let token: Token<AssertionHeader, C, jwt::token::Signed> = signer
        .sign_jwt(Token::new(header, claims))
        .foreign_boxed_err(|| Error::Signing(what.to_owned()))?;

    Ok(token.into())
}

/// Sign the assertions with the provisioned QSEAL key and persist both.
///
/// Returns the registration JWT.
pub fn build_assertions(
    config: &OnboardingConfig,
    ssi: &SoftwareStatementInfo,
    credentials: &Credentials,
    store: &ArtifactStore,
) -> Result<String, Error> {
    let kid = ssi.signing_kid()?;
    let signing_key = credentials.signing().ok_or_else(|| {
        bherror::Error::root(Error::Precondition(
            "signing key was not provisioned".to_owned(),
        ))
    })?;

    let signer = RsaSigner::from_pkey(
        kid.to_owned(),
        ssi.alg,
        signing_key.private_key().clone(),
    )
    .with_err(|| Error::Signing("assertions".to_owned()))?;

    let issued_at = chrono::Utc::now().timestamp();
    let assertions = sign_assertions(config, ssi, &signer, issued_at)?;

    store.write(
        Artifact::SoftwareStatement,
        assertions.software_statement.as_bytes(),
    )?;
    store.write(
        Artifact::RegistrationJwt,
        assertions.registration_jwt.as_bytes(),
    )?;

    Ok(assertions.registration_jwt)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use assert_matches::assert_matches;
    use bh_jws_rsa::{jwt::token::Verified, JwtVerifier as _, RsaVerifier};
    use serde_json::json;

    use super::*;
    use crate::provisioner::{
        materialize,
        tests::{bundle_entry, response},
    };

    const ISSUED_AT: i64 = 1_700_000_000;

    fn config() -> OnboardingConfig {
        OnboardingConfig::from_value(json!({
            "sandbox_url": "https://sandbox.example.com/tpp-certs",
            "country": "FI",
            "tpp_name": "Acme TPP",
            "roles": "AIS,PIS",
            "api_key": "api-key-123",
            "registration_url": "https://mtls.example.com/tpp-registration/register",
            "software_redirect_uris": ["https://acme.example.com/callback"],
            "redirect_uris": ["https://acme.example.com/oauth"],
            "software_client_uri": "https://acme.example.com",
            "org_contacts": [{ "email": "ops@acme.example.com", "type": "technical" }],
        }))
        .unwrap()
    }

    fn ssi() -> SoftwareStatementInfo {
        SoftwareStatementInfo {
            tpp_id: "tpp-123".to_owned(),
            public_jwks_url: "https://keystore.example.com/tpp-123/jwks.json".to_owned(),
            qseal_kid: Some("qseal-1".to_owned()),
            alg: SigningAlgorithm::Rs256,
        }
    }

    fn signer() -> RsaSigner {
        RsaSigner::generate("qseal-1".to_owned(), SigningAlgorithm::Rs256).unwrap()
    }

    fn verify<C: serde::de::DeserializeOwned>(
        compact: &str,
        signer: &RsaSigner,
    ) -> (AssertionHeader, C) {
        let token: Token<AssertionHeader, C, Verified> = RsaVerifier::new(SigningAlgorithm::Rs256)
            .verify_jwt_signature(compact, &signer.public_jwk().unwrap())
            .unwrap();
        token.into()
    }

    #[test]
    fn validity_windows_are_exact() {
        let signer = signer();

        let assertions = sign_assertions(&config(), &ssi(), &signer, ISSUED_AT).unwrap();

        let (_, ssa): (_, SoftwareStatementClaims) =
            verify(&assertions.software_statement, &signer);
        let (_, registration): (_, RegistrationClaims) =
            verify(&assertions.registration_jwt, &signer);
        assert_eq!(ssa.iat, ISSUED_AT);
        assert_eq!(ssa.exp - ssa.iat, 157_680_000);
        assert_eq!(registration.iat, ISSUED_AT);
        assert_eq!(registration.exp - registration.iat, 3_600);
    }

    #[test]
    fn both_tokens_share_the_header() {
        let signer = signer();

        let assertions = sign_assertions(&config(), &ssi(), &signer, ISSUED_AT).unwrap();

        let expected = AssertionHeader {
            alg: SigningAlgorithm::Rs256,
            kid: "qseal-1".to_owned(),
            typ: "JWT".to_owned(),
        };
        let (ssa_header, _): (_, SoftwareStatementClaims) =
            verify(&assertions.software_statement, &signer);
        let (registration_header, _): (_, RegistrationClaims) =
            verify(&assertions.registration_jwt, &signer);
        assert_eq!(ssa_header, expected);
        assert_eq!(registration_header, expected);
    }

    #[test]
    fn header_carries_exactly_alg_kid_and_typ() {
        let assertions = sign_assertions(&config(), &ssi(), &signer(), ISSUED_AT).unwrap();

        let encoded = assertions.registration_jwt.split('.').next().unwrap();
        let header: Value =
            serde_json::from_slice(&bh_jws_rsa::base64_url_decode(encoded).unwrap()).unwrap();

        assert_eq!(
            header,
            json!({ "alg": "RS256", "kid": "qseal-1", "typ": "JWT" })
        );
    }

    #[test]
    fn claims_come_from_config_and_ssi() {
        let signer = signer();

        let assertions = sign_assertions(&config(), &ssi(), &signer, ISSUED_AT).unwrap();

        let (_, ssa): (_, SoftwareStatementClaims) =
            verify(&assertions.software_statement, &signer);
        assert_eq!(ssa.iss, "tpp-123");
        assert_eq!(ssa.org_id, "tpp-123");
        assert_eq!(ssa.org_name, "Acme TPP");
        assert_eq!(ssa.software_client_name, "Acme TPP");
        assert_eq!(ssa.software_roles, ["AIS", "PIS"]);
        assert_eq!(
            ssa.software_jwks_endpoint,
            "https://keystore.example.com/tpp-123/jwks.json"
        );
        assert_eq!(
            ssa.software_redirect_uris,
            ["https://acme.example.com/callback"]
        );
        assert_eq!(ssa.software_client_uri, "https://acme.example.com");
        assert_eq!(ssa.org_contacts[0]["type"], "technical");

        let (_, registration): (_, RegistrationClaims) =
            verify(&assertions.registration_jwt, &signer);
        assert_eq!(
            registration.aud,
            "https://mtls.example.com/tpp-registration/register"
        );
        assert_eq!(registration.redirect_uris, ["https://acme.example.com/oauth"]);
        assert_eq!(registration.grant_types, GRANT_TYPES);
        assert_eq!(registration.software_statement, assertions.software_statement);
    }

    #[test]
    fn identifiers_never_repeat() {
        let signer = signer();
        let config = config();
        let ssi = ssi();
        let mut seen = HashSet::new();

        for _ in 0..1000 {
            let assertions = sign_assertions(&config, &ssi, &signer, ISSUED_AT).unwrap();
            let (_, ssa): (_, SoftwareStatementClaims) =
                verify(&assertions.software_statement, &signer);
            let (_, registration): (_, RegistrationClaims) =
                verify(&assertions.registration_jwt, &signer);

            assert!(seen.insert(ssa.jti));
            assert!(seen.insert(ssa.software_client_id));
            assert!(seen.insert(registration.jti));
        }

        assert_eq!(seen.len(), 3000);
    }

    #[test]
    fn only_identifiers_differ_between_runs() {
        let signer = signer();

        let first = sign_assertions(&config(), &ssi(), &signer, ISSUED_AT).unwrap();
        let second = sign_assertions(&config(), &ssi(), &signer, ISSUED_AT).unwrap();

        let (_, mut first_ssa): (_, SoftwareStatementClaims) =
            verify(&first.software_statement, &signer);
        let (_, second_ssa): (_, SoftwareStatementClaims) =
            verify(&second.software_statement, &signer);
        assert_ne!(first_ssa.jti, second_ssa.jti);
        assert_ne!(first_ssa.software_client_id, second_ssa.software_client_id);
        first_ssa.jti = second_ssa.jti.clone();
        first_ssa.software_client_id = second_ssa.software_client_id.clone();
        assert_eq!(first_ssa, second_ssa);
    }

    #[test]
    fn missing_qseal_kid_is_a_precondition_error() {
        let ssi = SoftwareStatementInfo {
            qseal_kid: None,
            ..ssi()
        };

        let error = sign_assertions(&config(), &ssi, &signer(), ISSUED_AT).unwrap_err();

        assert_matches!(error.error, Error::Precondition(_));
    }

    #[test]
    fn algorithm_mismatch_fails_signing() {
        let ssi = SoftwareStatementInfo {
            alg: SigningAlgorithm::Rs384,
            ..ssi()
        };

        let error = sign_assertions(&config(), &ssi, &signer(), ISSUED_AT).unwrap_err();

        assert_eq!(error.error, Error::Signing("software statement".to_owned()));
    }

    #[test]
    fn build_assertions_persists_both_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let provisioned = materialize(
            &response(vec![bundle_entry("qwac-1", true), bundle_entry("qseal-1", true)]),
            &store,
        )
        .unwrap();

        let registration_jwt =
            build_assertions(&config(), &provisioned.ssi, &provisioned.credentials, &store)
                .unwrap();

        assert_eq!(
            store.read(Artifact::RegistrationJwt).unwrap(),
            registration_jwt.as_bytes()
        );
        let ssa = String::from_utf8(store.read(Artifact::SoftwareStatement).unwrap()).unwrap();
        let token: Token<AssertionHeader, RegistrationClaims, _> =
            Token::parse_unverified(&registration_jwt).unwrap();
        assert_eq!(token.claims().software_statement, ssa);
    }

    #[test]
    fn build_assertions_requires_signing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let error =
            build_assertions(&config(), &ssi(), &Credentials::default(), &store).unwrap_err();

        assert_eq!(
            error.error,
            Error::Precondition("signing key was not provisioned".to_owned())
        );
        assert!(!store.exists(Artifact::SoftwareStatement));
    }
}
