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

//! The configuration record of an onboarding run.

use std::{fs, path::Path};

use bherror::traits::{ErrorContext as _, ForeignError as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use url::Url;

use crate::{ConfigError, Result};

/// Token endpoint of the OP Open Banking sandbox.
pub const DEFAULT_TOKEN_URL: &str = "https://psd2.mtls.sandbox.apis.op.fi/oauth/token";

/// Request timeout applied to every call, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Keys which must be present (and not `null`) in the configuration.
pub const REQUIRED_KEYS: [&str; 6] = [
    "sandbox_url",
    "country",
    "tpp_name",
    "roles",
    "api_key",
    "registration_url",
];

/// A secret string value. Its `Debug` and `Display` forms are redacted.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// The requested TPP roles, e.g. `AIS` and `PIS`.
///
/// Deserializes either from a comma-separated string or from an array of
/// strings. Role names are trimmed; empty names and repetitions are dropped
/// while keeping the first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Roles(Vec<String>);

impl Roles {
    /// The normalized role names.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// The role names joined with commas, as sent to the certificate
    /// issuance endpoint.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }

    /// Returns `true` if no role was requested.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Roles {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut roles: Vec<String> = Vec::new();
        for role in iter {
            let role = role.as_ref().trim();
            if !role.is_empty() && !roles.iter().any(|seen| seen == role) {
                roles.push(role.to_owned());
            }
        }
        Self(roles)
    }
}

impl<'de> Deserialize<'de> for Roles {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RolesRepr {
            Joined(String),
            List(Vec<String>),
        }

        Ok(match RolesRepr::deserialize(deserializer)? {
            RolesRepr::Joined(joined) => joined.split(',').collect(),
            RolesRepr::List(list) => list.into_iter().collect(),
        })
    }
}

/// The configuration record. Loaded once and read-only afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingConfig {
    /// Certificate issuance endpoint of the sandbox.
    pub sandbox_url: Url,
    /// Country code put into the issued certificates.
    pub country: String,
    /// TPP display name, also used as the organization name.
    pub tpp_name: String,
    /// Requested roles.
    pub roles: Roles,
    /// Sandbox API key, sent as `x-api-key`.
    pub api_key: Secret,
    /// Dynamic Client Registration endpoint, also the `aud` of the
    /// registration JWT.
    pub registration_url: Url,
    /// Redirect URIs advertised in the SSA.
    #[serde(default)]
    pub software_redirect_uris: Vec<String>,
    /// Redirect URIs requested in the registration JWT.
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Client URI advertised in the SSA.
    #[serde(default)]
    pub software_client_uri: String,
    /// Organization contacts advertised in the SSA, passed through as is.
    #[serde(default)]
    pub org_contacts: Vec<Value>,
    /// OAuth2 token endpoint, [`DEFAULT_TOKEN_URL`] unless configured.
    pub token_url: Url,
    /// Whether the registration and token endpoints must present a trusted
    /// server certificate.
    #[serde(default = "default_verify_server_certificate")]
    pub verify_server_certificate: bool,
    /// Timeout of every HTTP request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_verify_server_certificate() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl OnboardingConfig {
    /// Load the configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .foreign_err(|| ConfigError::Read(path.display().to_string()))?;

        Self::from_json(&contents).ctx(|| format!("loading {}", path.display()))
    }

    /// Parse the configuration from a JSON document.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(contents).foreign_err(|| ConfigError::Malformed)?;
        Self::from_value(value)
    }

    /// Build the configuration from an already parsed JSON value.
    ///
    /// Required keys are checked first, so that a missing key is reported by
    /// name rather than as a deserialization failure.
    pub fn from_value(mut value: Value) -> Result<Self, ConfigError> {
        let map = value
            .as_object_mut()
            .ok_or_else(|| bherror::Error::root(ConfigError::NotAnObject))?;

        if let Some(missing) = REQUIRED_KEYS
            .iter()
            .find(|key| map.get(**key).map_or(true, Value::is_null))
        {
            return Err(bherror::Error::root(ConfigError::MissingKey(
                missing.to_string(),
            )));
        }
        map.entry("token_url")
            .or_insert_with(|| Value::from(DEFAULT_TOKEN_URL));

        let config: Self = serde_json::from_value(value)
            .match_foreign_err(|error| ConfigError::InvalidValue(error.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(bherror::Error::root(ConfigError::InvalidValue(
                message.to_owned(),
            )))
        };

        if self.country.trim().is_empty() {
            return invalid("`country` must not be empty");
        }
        if self.tpp_name.trim().is_empty() {
            return invalid("`tpp_name` must not be empty");
        }
        if self.roles.is_empty() {
            return invalid("`roles` must name at least one role");
        }
        if self.api_key.expose().is_empty() {
            return invalid("`api_key` must not be empty");
        }
        if self.request_timeout_secs == 0 {
            return invalid("`request_timeout_secs` must be positive");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn minimal() -> Value {
        json!({
            "sandbox_url": "https://sandbox.example.com/tpp-certs",
            "country": "FI",
            "tpp_name": "Acme TPP",
            "roles": "AIS, PIS,AIS",
            "api_key": "api-key-123",
            "registration_url": "https://mtls.example.com/tpp-registration/register",
        })
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = OnboardingConfig::from_value(minimal()).unwrap();

        assert_eq!(config.roles.as_slice(), ["AIS", "PIS"]);
        assert_eq!(config.roles.joined(), "AIS,PIS");
        assert_eq!(config.token_url.as_str(), DEFAULT_TOKEN_URL);
        assert!(config.verify_server_certificate);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(config.redirect_uris.is_empty());
        assert!(config.software_redirect_uris.is_empty());
        assert!(config.org_contacts.is_empty());
        assert_eq!(config.software_client_uri, "");
    }

    #[test]
    fn roles_accept_arrays() {
        let mut value = minimal();
        value["roles"] = json!(["PIS", " AIS ", "", "PIS"]);

        let config = OnboardingConfig::from_value(value).unwrap();

        assert_eq!(config.roles.as_slice(), ["PIS", "AIS"]);
    }

    #[test]
    fn each_required_key_is_reported_by_name() {
        for key in REQUIRED_KEYS {
            let mut value = minimal();
            value.as_object_mut().unwrap().remove(key);

            let error = OnboardingConfig::from_value(value).unwrap_err();

            assert_eq!(error.error, ConfigError::MissingKey(key.to_owned()));
        }
    }

    #[test]
    fn null_required_key_counts_as_missing() {
        let mut value = minimal();
        value["api_key"] = Value::Null;

        let error = OnboardingConfig::from_value(value).unwrap_err();

        assert_eq!(error.error, ConfigError::MissingKey("api_key".to_owned()));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let mut bad_url = minimal();
        bad_url["registration_url"] = json!("not a url");
        let mut no_roles = minimal();
        no_roles["roles"] = json!(" , ");

        for value in [bad_url, no_roles, json!(["not", "an", "object"])] {
            let error = OnboardingConfig::from_value(value).unwrap_err();

            assert_matches!(
                error.error,
                ConfigError::InvalidValue(_) | ConfigError::NotAnObject
            );
        }
    }

    #[test]
    fn secrets_are_redacted() {
        let config = OnboardingConfig::from_value(minimal()).unwrap();

        assert_eq!(config.api_key.expose(), "api-key-123");
        assert!(!format!("{config:?}").contains("api-key-123"));
        assert_eq!(config.api_key.to_string(), "[REDACTED]");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.json");
        fs::write(&path, minimal().to_string()).unwrap();

        let config = OnboardingConfig::load(&path).unwrap();
        assert_eq!(config.tpp_name, "Acme TPP");

        let error = OnboardingConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert_matches!(error.error, ConfigError::Read(_));
    }
}
