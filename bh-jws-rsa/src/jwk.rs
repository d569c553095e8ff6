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

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JWK containing only public key parameters.
pub type JwkPublic = Map<String, Value>;

/// JWK which may contain private key parameters as well.
pub type JwkPrivate = Map<String, Value>;

/// JWK members carrying private key material, across the RSA (`d`, `p`, `q`,
/// `dp`, `dq`, `qi`, `oth`), EC (`d`) and symmetric (`k`) key types.
///
/// See [section 6 of RFC7518](https://datatracker.ietf.org/doc/html/rfc7518#section-6).
pub const PRIVATE_JWK_MEMBERS: [&str; 8] = ["d", "p", "q", "dp", "dq", "qi", "oth", "k"];

/// Derive the public JWK by removing every private member.
///
/// All other members, including `kid`, `alg`, `use` and `x5c`, are kept as they
/// are.
pub fn public_jwk_from_private(jwk: &JwkPrivate) -> JwkPublic {
    let mut public = jwk.clone();
    for member in PRIVATE_JWK_MEMBERS {
        public.remove(member);
    }
    public
}

/// Returns whether the JWK carries any private key material.
pub fn has_private_members(jwk: &JwkPrivate) -> bool {
    PRIVATE_JWK_MEMBERS
        .iter()
        .any(|member| jwk.contains_key(*member))
}

/// JWK Set as specified in [RFC7517 section 5][1].
///
/// Keys may omit `kid`, but the `kid` values present must be unique.
///
/// [1]: https://datatracker.ietf.org/doc/html/rfc7517#section-5
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "JwkSetUnverified")]
pub struct JwkSet {
    keys: Vec<JwkPublic>,
}

impl JwkSet {
    /// Create empty `JwkSet`.
    pub fn empty() -> Self {
        JwkSet { keys: vec![] }
    }

    /// Append a public key to the set.
    ///
    /// Private members are stripped from the key before it is added, so the set
    /// never exposes private key material.
    pub fn push(&mut self, jwk: &JwkPrivate) {
        self.keys.push(public_jwk_from_private(jwk));
    }

    /// The keys of the set, in insertion order.
    pub fn keys(&self) -> &[JwkPublic] {
        &self.keys
    }

    /// Find the key with the given `kid`.
    pub fn find(&self, kid: &str) -> Option<&JwkPublic> {
        self.keys
            .iter()
            .find(|jwk| jwk.get("kid").and_then(Value::as_str) == Some(kid))
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the set has no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for JwkSet {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Deserialize, Debug)]
struct JwkSetUnverified {
    keys: Vec<JwkPublic>,
}

impl TryFrom<JwkSetUnverified> for JwkSet {
    type Error = &'static str;

    fn try_from(value: JwkSetUnverified) -> std::result::Result<Self, Self::Error> {
        let keys = value.keys;

        if keys.iter().any(has_private_members) {
            return Err("Provided JWKs contain private key members");
        }

        let kids = keys
            .iter()
            .filter_map(|jwk| jwk.get("kid"))
            .map(|kid| {
                kid.as_str()
                    .ok_or("JWK contains a `kid` parameter that is not a string")
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut uniq = HashSet::new();
        if !kids.into_iter().all(|kid| uniq.insert(kid)) {
            return Err("Provided JWKs contain duplicate kid parameter values");
        }

        Ok(JwkSet { keys })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;
    use crate::json_object;

    #[test]
    fn private_members_are_stripped() {
        let private = json_object!({
            "kty": "RSA",
            "kid": "qseal-1",
            "alg": "RS256",
            "n": "sXch",
            "e": "AQAB",
            "d": "secret",
            "p": "secret",
            "q": "secret",
            "dp": "secret",
            "dq": "secret",
            "qi": "secret",
            "x5c": ["MIIB"]
        });

        let public = public_jwk_from_private(&private);

        assert!(!has_private_members(&public));
        assert_eq!(
            Value::Object(public),
            json!({
                "kty": "RSA",
                "kid": "qseal-1",
                "alg": "RS256",
                "n": "sXch",
                "e": "AQAB",
                "x5c": ["MIIB"]
            })
        );
    }

    #[test]
    fn pushed_keys_are_public_and_serialize_as_jwks() {
        let mut jwk_set = JwkSet::empty();
        jwk_set.push(&json_object!({ "kty": "EC", "kid": "qwac-1", "x": "x", "y": "y", "d": "d" }));
        jwk_set.push(&json_object!({ "kty": "RSA", "kid": "qseal-1", "n": "n", "e": "AQAB" }));

        assert_eq!(jwk_set.len(), 2);
        assert!(jwk_set.find("qwac-1").unwrap().get("d").is_none());

        let serialized = serde_json::to_string(&jwk_set).unwrap();
        let deserialized: JwkSet = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, jwk_set);
    }

    #[test]
    fn invalid_jwk_set_duplicate_kid() {
        let jwk_set = json!({"keys": [{ "kid": "1" }, { "kid": "1" }]});

        let error = serde_json::from_value::<JwkSet>(jwk_set);

        assert_eq!(
            error.unwrap_err().to_string(),
            "Provided JWKs contain duplicate kid parameter values"
        );
    }

    #[test]
    fn jwk_set_may_mix_keys_with_and_without_kid() {
        let jwk_set = json!({"keys": [{ "kid": "1" }, { "kty": "RSA" }, { "kty": "EC" }]});

        let jwk_set = serde_json::from_value::<JwkSet>(jwk_set).unwrap();

        assert_eq!(jwk_set.len(), 3);
        assert!(jwk_set.find("1").is_some());
    }

    #[test]
    fn invalid_jwk_set_with_private_members() {
        let jwk_set = json!({"keys": [{ "kid": "1", "kty": "EC", "d": "secret" }]});

        let error = serde_json::from_value::<JwkSet>(jwk_set);

        assert_eq!(
            error.unwrap_err().to_string(),
            "Provided JWKs contain private key members"
        );
    }
}
