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

//! Onboarding of a Third-Party Provider (TPP) to an Open Banking sandbox.
//!
//! A single onboarding run goes through four steps, each consuming the output
//! of the previous one:
//!
//! 1. [`provisioner::provision`] requests QWAC and QSEAL key material from the
//!    sandbox, converts the returned private JWKS into PEM artifacts and
//!    produces the [`SoftwareStatementInfo`].
//! 2. [`assertion::build_assertions`] signs the Software Statement Assertion
//!    (SSA) and the Dynamic Client Registration JWT embedding it, using the
//!    QSEAL key.
//! 3. [`RegistrationClient::register`] submits the registration JWT over
//!    mutual TLS, authenticated with the QWAC pair.
//! 4. [`RegistrationClient::exchange_token`] trades the issued client
//!    credentials for an access token.
//!
//! The [`flow`] module ties the steps into a type-state machine and is what
//! the `tpp-onboard` binary runs.

pub mod artifacts;
pub mod assertion;
pub mod config;
mod error;
pub mod flow;
pub mod key_bundle;
pub mod pem;
pub mod provisioner;
pub mod registration;
pub mod transport;

pub use artifacts::{Artifact, ArtifactStore};
pub use config::{OnboardingConfig, Roles, Secret};
pub use error::*;
pub use flow::{run, FlowError, Onboarding, OnboardingState, RunOptions, Step};
pub use provisioner::{Credentials, KeyMaterial, Provisioned, SoftwareStatementInfo};
pub use registration::{AccessToken, RegistrationClient, TppRegistrationResult};
