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

use std::result::Result as StdResult;

use bherror::{
    traits::{ErrorContext, ForeignError},
    Error, Result,
};
use openssl::{
    bn::{BigNum, BigNumRef},
    ec::{EcGroup, EcKey},
    nid::Nid,
    pkey::{Id, PKey, Private, Public},
    rsa::{Rsa, RsaPrivateKeyBuilder},
    sign::{Signer as OpensslSigner, Verifier as OpensslVerifier},
};
use serde_json::Value;

use super::{utils, SignatureVerifier, Signer, SigningAlgorithm};
use crate::{
    error::{CryptoError, FormatError},
    json_object, BoxError, JwkPrivate, JwkPublic,
};

const KTY_RSA: &str = "RSA";
const KTY_EC: &str = "EC";

/// Modulus size of freshly generated keys.
const RSA_KEY_BITS: u32 = 2048;

/// [`Signer`] implementation of the RSASSA-PKCS1-v1_5 family (`RS256`, `RS384`
/// and `RS512`) backed by an OpenSSL RSA private key.
pub struct RsaSigner {
    private_key: PKey<Private>,
    kid: String,
    alg: SigningAlgorithm,
}

impl RsaSigner {
    /// Generate a fresh 2048-bit RSA key with the given `kid` field when
    /// presented as a JWK.
    pub fn generate(kid: String, alg: SigningAlgorithm) -> Result<Self, CryptoError> {
        let rsa = Rsa::generate(RSA_KEY_BITS).foreign_err(|| CryptoError::KeyGenerationFailed)?;
        let private_key = PKey::from_rsa(rsa).foreign_err(|| CryptoError::CryptoBackend)?;

        Ok(Self {
            private_key,
            kid,
            alg,
        })
    }

    /// Create a signer from an already loaded private key.
    ///
    /// Fails with [`CryptoError::Unsupported`] if the key is not an RSA key.
    pub fn from_pkey(
        kid: String,
        alg: SigningAlgorithm,
        private_key: PKey<Private>,
    ) -> Result<Self, CryptoError> {
        if private_key.id() != Id::RSA {
            return Err(Error::root(CryptoError::Unsupported(format!(
                "{alg} requires an RSA key"
            ))))
            .ctx(|| format!("key `{kid}` has type {:?}", private_key.id()));
        }

        Ok(Self {
            private_key,
            kid,
            alg,
        })
    }

    /// Create a signer from a private key in the PEM format (PKCS#1 or PKCS#8).
    pub fn from_private_key_pem(
        kid: String,
        alg: SigningAlgorithm,
        private_key_pem: &[u8],
    ) -> Result<Self, CryptoError> {
        let private_key = PKey::private_key_from_pem(private_key_pem)
            .foreign_err(|| CryptoError::InvalidPrivateKey)?;

        Self::from_pkey(kid, alg, private_key)
    }

    /// The private key used for signing.
    pub fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    /// Construct a JWK JSON object for the public counterpart of this key. It
    /// will use the `kid` field set at construction.
    pub fn public_jwk(&self) -> Result<JwkPublic, CryptoError> {
        let rsa = self
            .private_key
            .rsa()
            .foreign_err(|| CryptoError::CryptoBackend)?;

        Ok(json_object!({
            "kty": KTY_RSA,
            "alg": self.alg.to_string(),
            "use": "sig",
            "kid": self.kid,
            "n": utils::base64_url_encode(rsa.n().to_vec()),
            "e": utils::base64_url_encode(rsa.e().to_vec()),
        }))
    }

    /// Export the key as a private JWK, including the CRT parameters when the
    /// key has them.
    pub fn private_jwk(&self) -> Result<JwkPrivate, CryptoError> {
        let rsa = self
            .private_key
            .rsa()
            .foreign_err(|| CryptoError::CryptoBackend)?;

        let mut jwk = self.public_jwk()?;
        jwk.insert("d".to_owned(), bignum_member(rsa.d()));

        let crt_members = [
            ("p", rsa.p()),
            ("q", rsa.q()),
            ("dp", rsa.dmp1()),
            ("dq", rsa.dmq1()),
            ("qi", rsa.iqmp()),
        ];
        for (member, value) in crt_members {
            if let Some(value) = value {
                jwk.insert(member.to_owned(), bignum_member(value));
            }
        }

        Ok(jwk)
    }
}

#[cfg(any(feature = "test-utils", test))]
impl RsaSigner {
    /// Self-signed X.509 certificate of this key, DER encoded, with the `kid`
    /// as the subject common name.
    ///
    /// Do NOT use this method for production code, but only tests.
    pub fn dummy_certificate_der(&self) -> Vec<u8> {
        use openssl::{
            asn1::Asn1Time,
            hash::MessageDigest,
            x509::{X509Builder, X509NameBuilder},
        };

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", &self.kid).unwrap();
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&self.private_key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(365).unwrap())
            .unwrap();
        builder
            .sign(&self.private_key, MessageDigest::sha256())
            .unwrap();

        builder.build().to_der().unwrap()
    }

    /// [`RsaSigner::private_jwk`] with a one-element `x5c` holding
    /// [`RsaSigner::dummy_certificate_der`].
    ///
    /// Do NOT use this method for production code, but only tests.
    pub fn dummy_private_jwk_with_x5c(&self) -> JwkPrivate {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        let mut jwk = self.private_jwk().unwrap();
        jwk.insert(
            "x5c".to_owned(),
            Value::Array(vec![Value::String(
                STANDARD.encode(self.dummy_certificate_der()),
            )]),
        );
        jwk
    }
}

fn bignum_member(value: &BigNumRef) -> Value {
    Value::String(utils::base64_url_encode(value.to_vec()))
}

impl Signer for RsaSigner {
    fn algorithm(&self) -> SigningAlgorithm {
        self.alg
    }

    fn sign(&self, message: &[u8]) -> StdResult<Vec<u8>, BoxError> {
        let mut signer = OpensslSigner::new(self.alg.message_digest(), &self.private_key)?;
        signer.update(message)?;
        Ok(signer.sign_to_vec()?)
    }
}

/// [`SignatureVerifier`] implementation of the RSASSA-PKCS1-v1_5 family,
/// verifying against an RSA public JWK.
pub struct RsaVerifier {
    alg: SigningAlgorithm,
}

impl RsaVerifier {
    /// Create a verifier for the given algorithm.
    pub fn new(alg: SigningAlgorithm) -> Self {
        Self { alg }
    }
}

impl Default for RsaVerifier {
    fn default() -> Self {
        Self::new(SigningAlgorithm::Rs256)
    }
}

impl SignatureVerifier for RsaVerifier {
    fn algorithm(&self) -> SigningAlgorithm {
        self.alg
    }

    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &JwkPublic,
    ) -> StdResult<bool, BoxError> {
        let public_key = public_key_from_jwk_rsa(public_key)?;

        let mut verifier = OpensslVerifier::new(self.alg.message_digest(), &public_key)?;
        verifier.update(message)?;
        Ok(verifier.verify(signature)?)
    }
}

pub(crate) fn public_key_from_jwk_rsa(public_key: &JwkPublic) -> Result<PKey<Public>, FormatError> {
    check_kty(public_key, KTY_RSA)?;

    let n = jwk_bignum(public_key, "n")?;
    let e = jwk_bignum(public_key, "e")?;

    let rsa = Rsa::from_public_components(n, e).foreign_err(|| {
        FormatError::JwkParsingFailed("invalid RSA public components".to_string())
    })?;
    PKey::from_rsa(rsa)
        .foreign_err(|| FormatError::JwkParsingFailed("RSA key construction failed".to_string()))
}

/// Convert a private JWK into an OpenSSL private key.
///
/// Supported are `RSA` keys (with or without the CRT parameters) and `EC` keys
/// on the `P-256`, `P-384` and `P-521` curves. The resulting key passes the
/// OpenSSL consistency check.
///
/// A JWK carrying only public members fails with
/// [`FormatError::MissingPrivateKey`].
pub fn private_key_from_jwk(jwk: &JwkPrivate) -> Result<PKey<Private>, FormatError> {
    let kty = jwk
        .get("kty")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::root(FormatError::JwkParsingFailed("missing \"kty\"".to_string())))?;

    if !jwk.contains_key("d") {
        return Err(Error::root(FormatError::MissingPrivateKey))
            .ctx(|| format!("{kty} JWK has no \"d\" member"));
    }

    match kty {
        KTY_RSA => rsa_private_key_from_jwk(jwk),
        KTY_EC => ec_private_key_from_jwk(jwk),
        other => Err(Error::root(FormatError::UnsupportedKeyType(other.to_owned()))),
    }
}

fn rsa_private_key_from_jwk(jwk: &JwkPrivate) -> Result<PKey<Private>, FormatError> {
    let invalid = || FormatError::JwkParsingFailed("invalid RSA private components".to_string());

    let n = jwk_bignum(jwk, "n")?;
    let e = jwk_bignum(jwk, "e")?;
    let d = jwk_bignum(jwk, "d")?;

    let rsa = if ["p", "q", "dp", "dq", "qi"]
        .iter()
        .all(|member| jwk.contains_key(*member))
    {
        Rsa::from_private_components(
            n,
            e,
            d,
            jwk_bignum(jwk, "p")?,
            jwk_bignum(jwk, "q")?,
            jwk_bignum(jwk, "dp")?,
            jwk_bignum(jwk, "dq")?,
            jwk_bignum(jwk, "qi")?,
        )
        .foreign_err(invalid)?
    } else {
        RsaPrivateKeyBuilder::new(n, e, d)
            .foreign_err(invalid)?
            .build()
    };

    // Keys without CRT parameters cannot be checked by OpenSSL.
    if rsa.p().is_some() && !rsa.check_key().foreign_err(invalid)? {
        return Err(Error::root(invalid())).ctx(|| "RSA key consistency check failed");
    }

    PKey::from_rsa(rsa)
        .foreign_err(|| FormatError::JwkParsingFailed("RSA key construction failed".to_string()))
}

fn ec_private_key_from_jwk(jwk: &JwkPrivate) -> Result<PKey<Private>, FormatError> {
    let invalid = || FormatError::JwkParsingFailed("invalid EC private components".to_string());

    let crv = jwk
        .get("crv")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::root(FormatError::JwkParsingFailed("missing \"crv\"".to_string())))?;
    let nid = match crv {
        "P-256" => Nid::X9_62_PRIME256V1,
        "P-384" => Nid::SECP384R1,
        "P-521" => Nid::SECP521R1,
        other => {
            return Err(Error::root(FormatError::UnsupportedKeyType(format!(
                "EC curve {other}"
            ))))
        }
    };
    let group = EcGroup::from_curve_name(nid).foreign_err(invalid)?;

    let x = jwk_bignum(jwk, "x")?;
    let y = jwk_bignum(jwk, "y")?;
    let d = jwk_bignum(jwk, "d")?;

    let public = EcKey::from_public_key_affine_coordinates(&group, &x, &y)
        .foreign_err(invalid)
        .ctx(|| format!("point is not on curve {crv}"))?;
    let ec = EcKey::from_private_components(&group, &d, public.public_key()).foreign_err(invalid)?;
    ec.check_key().foreign_err(invalid)?;

    PKey::from_ec_key(ec)
        .foreign_err(|| FormatError::JwkParsingFailed("EC key construction failed".to_string()))
}

fn check_kty(jwk: &JwkPublic, expected: &str) -> Result<(), FormatError> {
    match jwk.get("kty").and_then(Value::as_str) {
        Some(kty) if kty == expected => Ok(()),
        Some(kty) => Err(Error::root(FormatError::UnsupportedKeyType(kty.to_owned())))
            .ctx(|| format!("expected {expected}")),
        None => Err(Error::root(FormatError::JwkParsingFailed(
            "missing \"kty\"".to_string(),
        ))),
    }
}

fn jwk_bignum(jwk: &JwkPrivate, member: &str) -> Result<BigNum, FormatError> {
    let error = |message| Error::root(FormatError::JwkParsingFailed(message));

    let encoded = jwk
        .get(member)
        .ok_or_else(|| error(format!("missing \"{member}\" member")))?
        .as_str()
        .ok_or_else(|| error(format!("\"{member}\" member is not a string")))?;
    let bytes = utils::base64_url_decode(encoded)
        .foreign_err(|| FormatError::JwkParsingFailed(format!("decoding \"{member}\" failed")))?;

    BigNum::from_slice(&bytes)
        .foreign_err(|| FormatError::JwkParsingFailed("Failed to construct BigNum".to_string()))
}
