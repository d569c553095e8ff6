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

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! This crate provides functions and types for working with [JSON Web
//! Signatures (JWS)][1] produced by RSA keys, and with the [JSON Web Keys
//! (JWK)][2] those keys are distributed as.
//!
//! [1]: https://datatracker.ietf.org/doc/html/rfc7515
//! [2]: https://datatracker.ietf.org/doc/html/rfc7517
//!
//! # Details
//!
//! Signing and verification go through the [`JwtSigner`] and [`JwtVerifier`]
//! traits, which are implemented automatically for every [`Signer`] and
//! [`SignatureVerifier`]. The [`openssl`] backed [`RsaSigner`] and
//! [`RsaVerifier`] implement the `RS256`, `RS384` and `RS512` algorithms
//! (RSASSA-PKCS1-v1_5).
//!
//! Key material usually arrives as a private JWK. Use
//! [`private_key_from_jwk`] to turn it into an OpenSSL private key (RSA or EC)
//! and [`public_jwk_from_private`] to obtain the shareable public JWK with all
//! private members removed.
//!
//! # Examples
//!
//! ## Sign and verify a JWT
//!
//! ```
//! use bh_jws_rsa::{json_object, JwtSigner, JwtVerifier, RsaSigner, RsaVerifier, SigningAlgorithm};
//!
//! let signer = RsaSigner::generate("dummy-kid".to_string(), SigningAlgorithm::Rs256).unwrap();
//!
//! let dummy_jwt = json_object!({
//!    "sub": "1234567890",
//!    "name": "John Doe",
//!    "iat": 1516239022
//! });
//!
//! let signed_jwt: String = signer.sign_jwt(dummy_jwt).unwrap();
//!
//! let public_jwk = signer.public_jwk().unwrap();
//!
//! let claims: serde_json::Value = RsaVerifier::new(SigningAlgorithm::Rs256)
//!     .verify_jwt_signature(signed_jwt.as_str(), &public_jwk)
//!     .unwrap();
//! assert_eq!(claims["name"], "John Doe");
//! ```

mod error;
mod jwk;
mod openssl_impl;
mod traits;
mod utils;

pub use error::*;
pub use jwk::*;
// Re-export the `jwt` crate
pub use jwt;
pub use openssl_impl::*;
pub use traits::*;
pub use utils::*;

/// Helper macro with the same syntax as [`serde_json::json`] specialized for
/// constructing JSON objects.
///
/// It will construct a more specific type ([`serde_json::Map<String,Value>`])
/// than just [`serde_json::Value`] when constructing an object, and panic if
/// the syntax is valid JSON but not an object.
#[macro_export]
macro_rules! json_object {
    ($stuff:tt) => {
        match ::serde_json::json!($stuff) {
            ::serde_json::Value::Object(o) => o,
            _ => unreachable!("JSON literal wasn't an object"),
        }
    };
}
