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

#![allow(dead_code)]

use bh_jws_rsa::{RsaSigner, SigningAlgorithm};
use bh_tpp_onboarding::OnboardingConfig;
use mockito::{Matcher, Mock, Server};
use serde_json::{json, Value};

pub const TPP_ID: &str = "tpp-123";
pub const PUBLIC_JWKS_URL: &str = "https://keystore.example.com/tpp-123/jwks.json";
pub const API_KEY: &str = "api-key-123";

/// A sandbox key bundle entry: private RSA JWK with the given `kid`, plus a
/// one-element `x5c` unless `with_certificate` is false.
pub fn bundle_entry(kid: &str, with_certificate: bool) -> Value {
    let signer = RsaSigner::generate(kid.to_owned(), SigningAlgorithm::Rs256).unwrap();
    Value::Object(if with_certificate {
        signer.dummy_private_jwk_with_x5c()
    } else {
        signer.private_jwk().unwrap()
    })
}

pub fn certificate_response(entries: Vec<Value>) -> String {
    json!({
        "tppId": TPP_ID,
        "publicJwksUrl": PUBLIC_JWKS_URL,
        "privateJwks": { "keys": entries },
    })
    .to_string()
}

pub fn config(server: &Server) -> OnboardingConfig {
    OnboardingConfig::from_value(json!({
        "sandbox_url": format!("{}/tpp-certs", server.url()),
        "country": "FI",
        "tpp_name": "Acme TPP",
        "roles": "AIS,PIS",
        "api_key": API_KEY,
        "registration_url": format!("{}/tpp-registration/register", server.url()),
        "token_url": format!("{}/oauth/token", server.url()),
        "redirect_uris": ["https://acme.example.com/oauth"],
        "software_redirect_uris": ["https://acme.example.com/callback"],
        "software_client_uri": "https://acme.example.com",
        "org_contacts": [{ "email": "ops@acme.example.com" }],
    }))
    .unwrap()
}

pub fn mock_certificates(server: &mut Server, status: usize, body: String) -> Mock {
    server
        .mock("POST", "/tpp-certs")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("c".into(), "FI".into()),
            Matcher::UrlEncoded("cn".into(), "Acme TPP".into()),
            Matcher::UrlEncoded("roles".into(), "AIS,PIS".into()),
        ]))
        .match_header("x-api-key", API_KEY)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create()
}

pub fn mock_registration(server: &mut Server, status: usize) -> Mock {
    server
        .mock("POST", "/tpp-registration/register")
        .match_header("content-type", "application/jwt")
        .match_header("x-api-key", API_KEY)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(json!({ "client_id": "client-1", "client_secret": "s3cret" }).to_string())
        .create()
}

pub fn mock_token(server: &mut Server, status: usize) -> Mock {
    server
        .mock("POST", "/oauth/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
            Matcher::UrlEncoded("scope".into(), "accounts".into()),
            Matcher::UrlEncoded("client_id".into(), "client-1".into()),
            Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
        ]))
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(json!({ "access_token": "token-1", "token_type": "Bearer" }).to_string())
        .create()
}
