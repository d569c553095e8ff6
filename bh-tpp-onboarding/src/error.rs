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

use crate::artifacts::Artifact;

/// Remote endpoint taking part in the onboarding.
#[derive(strum_macros::Display, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Endpoint {
    /// Sandbox endpoint issuing the QWAC and QSEAL key material.
    #[strum(to_string = "certificate issuance")]
    CertificateIssuance,
    /// Dynamic Client Registration endpoint.
    #[strum(to_string = "registration")]
    Registration,
    /// OAuth2 token endpoint.
    #[strum(to_string = "token")]
    Token,
}

/// Error in the configuration record. Always raised before any network call.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[strum(to_string = "Failed to read configuration file {0}")]
    Read(String),
    /// The configuration is not valid JSON.
    #[strum(to_string = "Configuration is not valid JSON")]
    Malformed,
    /// The configuration is valid JSON, but not an object.
    #[strum(to_string = "Configuration must be a JSON object")]
    NotAnObject,
    /// A required key is absent or `null`.
    #[strum(to_string = "Missing required configuration key `{0}`")]
    MissingKey(String),
    /// A key is present with a value of the wrong shape.
    #[strum(to_string = "Invalid configuration: {0}")]
    InvalidValue(String),
}

impl bherror::BhError for ConfigError {}

/// Top-level error type for the onboarding crate.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum Error {
    /// Configuration error, see [`ConfigError`].
    #[strum(to_string = "Configuration error: {0}")]
    Config(ConfigError),

    /// The endpoint answered with an unexpected status code. Carries the
    /// status and the response body for diagnosis.
    #[strum(to_string = "The {0} endpoint rejected the request with status {1}: {2}")]
    UpstreamRejection(Endpoint, u16, String),

    /// The request never got a complete response.
    #[strum(to_string = "Request to the {0} endpoint failed")]
    Transport(Endpoint),

    /// The endpoint answered with the expected status, but the body is unusable.
    #[strum(to_string = "Invalid response from the {0} endpoint: {1}")]
    InvalidResponse(Endpoint, String),

    /// The HTTP client could not be constructed.
    #[strum(to_string = "Failed to build the HTTP client")]
    HttpClient,

    /// A key bundle entry could not be turned into a usable private key.
    #[strum(to_string = "Failed to convert the private key of `{0}`")]
    KeyConversion(String),

    /// A step found the output of an earlier step incomplete.
    #[strum(to_string = "Precondition failed: {0}")]
    Precondition(String),

    /// An artifact could not be persisted or read back.
    #[strum(to_string = "Failed to access the {0} artifact")]
    Storage(Artifact),

    /// Signing of an assertion failed.
    #[strum(to_string = "Failed to sign the {0}")]
    Signing(String),
}

impl bherror::BhError for Error {}

/// Result type used across the crate.
pub type Result<T, E> = bherror::Result<T, E>;
