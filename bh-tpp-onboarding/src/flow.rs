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

//! The onboarding state machine.
//!
//! ```text
//! Unprovisioned -> Provisioned -> AssertionsBuilt -> Registered -> TokenObtained
//! ```
//!
//! Every transition consumes the previous [`Onboarding`] value, so a run can
//! only move forward. A failed transition ends the run in the state it
//! started from; already written artifacts are left in place.

use std::path::Path;

use bherror::traits::PropagateError as _;

use crate::{
    artifacts::ArtifactStore,
    assertion, provisioner,
    registration::{AccessToken, RegistrationClient, TppRegistrationResult},
    transport::TransportIdentity,
    Error, OnboardingConfig, Result,
};

/// States of an onboarding run.
#[derive(strum_macros::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingState {
    /// Nothing done yet.
    #[strum(to_string = "unprovisioned")]
    Unprovisioned,
    /// Key material is provisioned.
    #[strum(to_string = "provisioned")]
    Provisioned,
    /// The SSA and the registration JWT are signed.
    #[strum(to_string = "assertions built")]
    AssertionsBuilt,
    /// The TPP is registered and holds client credentials.
    #[strum(to_string = "registered")]
    Registered,
    /// An access token was obtained.
    #[strum(to_string = "token obtained")]
    TokenObtained,
}

/// Steps of an onboarding run, each moving it to the next state.
#[derive(strum_macros::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// [`configure`]
    #[strum(to_string = "load configuration")]
    LoadConfiguration,
    /// [`Onboarding::provision`]
    #[strum(to_string = "provision")]
    Provision,
    /// [`Onboarding::build_assertions`]
    #[strum(to_string = "build assertions")]
    BuildAssertions,
    /// [`Onboarding::register`]
    #[strum(to_string = "register")]
    Register,
    /// [`Onboarding::exchange_token`]
    #[strum(to_string = "exchange token")]
    ExchangeToken,
}

/// Failure of a [`run`].
#[derive(strum_macros::Display, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The step failed; the run ended in the given state.
    #[strum(to_string = "Onboarding failed at step `{1}` in state `{0}`")]
    StageFailed(OnboardingState, Step),
}

impl bherror::BhError for FlowError {}

mod private {
    pub trait Sealed {}
}

/// Marker trait of the type-state parameter of [`Onboarding`].
pub trait FlowState: private::Sealed {
    /// The state this type represents.
    const STATE: OnboardingState;
}

/// Initial state.
#[derive(Debug)]
pub struct Unprovisioned;

/// State after [`Step::Provision`].
#[derive(Debug)]
pub struct Provisioned {
    provisioned: provisioner::Provisioned,
}

/// State after [`Step::BuildAssertions`].
#[derive(Debug)]
pub struct AssertionsBuilt {
    provisioned: provisioner::Provisioned,
    registration_jwt: String,
}

/// State after [`Step::Register`].
#[derive(Debug)]
pub struct Registered {
    provisioned: provisioner::Provisioned,
    registration: TppRegistrationResult,
}

/// Final state.
#[derive(Debug)]
pub struct TokenObtained {
    registration: TppRegistrationResult,
    access_token: AccessToken,
}

macro_rules! flow_state {
    ($($state:ident),*) => {
        $(
            impl private::Sealed for $state {}

            impl FlowState for $state {
                const STATE: OnboardingState = OnboardingState::$state;
            }
        )*
    };
}

flow_state!(
    Unprovisioned,
    Provisioned,
    AssertionsBuilt,
    Registered,
    TokenObtained
);

/// An onboarding run in state `S`.
#[derive(Debug)]
pub struct Onboarding<S> {
    config: OnboardingConfig,
    store: ArtifactStore,
    state: S,
}

impl<S: FlowState> Onboarding<S> {
    /// The current state.
    pub fn state(&self) -> OnboardingState {
        S::STATE
    }

    /// The configuration of the run.
    pub fn config(&self) -> &OnboardingConfig {
        &self.config
    }

    /// Where the artifacts of the run are written.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn enter(config: OnboardingConfig, store: ArtifactStore, state: S) -> Self {
        tracing::info!(state = %S::STATE, "onboarding state reached");
        Self {
            config,
            store,
            state,
        }
    }
}

impl Onboarding<Unprovisioned> {
    /// Start a run.
    pub fn new(config: OnboardingConfig, store: ArtifactStore) -> Self {
        Self {
            config,
            store,
            state: Unprovisioned,
        }
    }

    /// Provision key material, see [`provisioner::provision`].
    pub fn provision(self) -> Result<Onboarding<Provisioned>, Error> {
        let provisioned = provisioner::provision(&self.config, &self.store)?;
        if provisioned.ssi.qseal_kid.is_none() {
            tracing::warn!("no QSEAL key was provisioned, assertions cannot be signed");
        }

        Ok(Onboarding::enter(
            self.config,
            self.store,
            Provisioned { provisioned },
        ))
    }
}

impl Onboarding<Provisioned> {
    /// Output of the provisioning step.
    pub fn provisioned(&self) -> &provisioner::Provisioned {
        &self.state.provisioned
    }

    /// Sign the assertions, see [`assertion::build_assertions`].
    pub fn build_assertions(self) -> Result<Onboarding<AssertionsBuilt>, Error> {
        let registration_jwt = assertion::build_assertions(
            &self.config,
            &self.state.provisioned.ssi,
            &self.state.provisioned.credentials,
            &self.store,
        )?;

        let Self {
            config,
            store,
            state: Provisioned { provisioned },
        } = self;
        Ok(Onboarding::enter(
            config,
            store,
            AssertionsBuilt {
                provisioned,
                registration_jwt,
            },
        ))
    }
}

impl Onboarding<AssertionsBuilt> {
    /// The signed registration JWT.
    pub fn registration_jwt(&self) -> &str {
        &self.state.registration_jwt
    }

    /// Register the TPP, see [`RegistrationClient::register`].
    pub fn register(self) -> Result<Onboarding<Registered>, Error> {
        let identity = TransportIdentity::from_credentials(&self.state.provisioned.credentials)?;
        let registration = RegistrationClient::new(&self.config, &identity)?
            .register(&self.state.registration_jwt, &self.store)?;

        let Self {
            config,
            store,
            state: AssertionsBuilt { provisioned, .. },
        } = self;
        Ok(Onboarding::enter(
            config,
            store,
            Registered {
                provisioned,
                registration,
            },
        ))
    }
}

impl Onboarding<Registered> {
    /// The issued client credentials.
    pub fn registration(&self) -> &TppRegistrationResult {
        &self.state.registration
    }

    /// Obtain an access token, see [`RegistrationClient::exchange_token`].
    pub fn exchange_token(self) -> Result<Onboarding<TokenObtained>, Error> {
        let identity = TransportIdentity::from_credentials(&self.state.provisioned.credentials)?;
        let access_token = RegistrationClient::new(&self.config, &identity)?
            .exchange_token(&self.state.registration)?;

        let Self {
            config,
            store,
            state: Registered { registration, .. },
        } = self;
        Ok(Onboarding::enter(
            config,
            store,
            TokenObtained {
                registration,
                access_token,
            },
        ))
    }
}

impl Onboarding<TokenObtained> {
    /// The issued client credentials.
    pub fn registration(&self) -> &TppRegistrationResult {
        &self.state.registration
    }

    /// The obtained access token.
    pub fn access_token(&self) -> &AccessToken {
        &self.state.access_token
    }
}

/// Load the configuration of a run, see [`OnboardingConfig::load`].
///
/// Nothing has been provisioned when this fails.
pub fn configure(path: &Path) -> Result<OnboardingConfig, FlowError> {
    OnboardingConfig::load(path)
        .match_err(|error| Error::Config(error.clone()))
        .with_err(failed_from::<Unprovisioned>(Step::LoadConfiguration))
}

/// Options of a [`run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Log the client secret and the access token in clear.
    pub reveal_secrets: bool,
}

/// Run all four steps.
pub fn run(
    config: OnboardingConfig,
    store: ArtifactStore,
    options: RunOptions,
) -> Result<Onboarding<TokenObtained>, FlowError> {
    let onboarding = Onboarding::new(config, store);

    let onboarding = onboarding
        .provision()
        .with_err(failed_from::<Unprovisioned>(Step::Provision))?;
    let onboarding = onboarding
        .build_assertions()
        .with_err(failed_from::<Provisioned>(Step::BuildAssertions))?;
    let onboarding = onboarding
        .register()
        .with_err(failed_from::<AssertionsBuilt>(Step::Register))?;
    report_registration(onboarding.registration(), options);

    let onboarding = onboarding
        .exchange_token()
        .with_err(failed_from::<Registered>(Step::ExchangeToken))?;
    if options.reveal_secrets {
        tracing::info!(
            access_token = onboarding.access_token().access_token.expose(),
            "access token"
        );
    }

    Ok(onboarding)
}

fn failed_from<S: FlowState>(step: Step) -> impl FnOnce() -> FlowError {
    move || FlowError::StageFailed(S::STATE, step)
}

fn report_registration(registration: &TppRegistrationResult, options: RunOptions) {
    if options.reveal_secrets {
        tracing::info!(
            client_id = registration.client_id.as_str(),
            client_secret = registration.client_secret.expose(),
            "client credentials"
        );
    } else {
        tracing::info!(
            client_id = registration.client_id.as_str(),
            client_secret = %registration.client_secret,
            "client credentials"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_ordered_by_their_steps() {
        assert_eq!(Unprovisioned::STATE, OnboardingState::Unprovisioned);
        assert_eq!(Provisioned::STATE, OnboardingState::Provisioned);
        assert_eq!(AssertionsBuilt::STATE, OnboardingState::AssertionsBuilt);
        assert_eq!(Registered::STATE, OnboardingState::Registered);
        assert_eq!(TokenObtained::STATE, OnboardingState::TokenObtained);
    }

    #[test]
    fn stage_failure_names_step_and_state() {
        let error = failed_from::<AssertionsBuilt>(Step::Register)();

        assert_eq!(
            error,
            FlowError::StageFailed(OnboardingState::AssertionsBuilt, Step::Register)
        );
        assert_eq!(
            error.to_string(),
            "Onboarding failed at step `register` in state `assertions built`"
        );
    }

    #[test]
    fn configuration_failure_is_reported_as_its_own_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.json");
        std::fs::write(&path, r#"{ "country": "FI" }"#).unwrap();

        let error = configure(&path).unwrap_err();

        assert_eq!(
            error.error,
            FlowError::StageFailed(OnboardingState::Unprovisioned, Step::LoadConfiguration)
        );
        assert_eq!(
            error.to_string(),
            "Onboarding failed at step `load configuration` in state `unprovisioned`"
        );
        let source = std::error::Error::source(&error).unwrap().to_string();
        assert!(source.contains("Configuration error"), "{source}");
    }

    #[test]
    fn configuration_is_loaded_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "sandbox_url": "https://sandbox.example.com/tpp-certs",
                "country": "FI",
                "tpp_name": "Acme TPP",
                "roles": "AIS",
                "api_key": "key",
                "registration_url": "https://mtls.example.com/register",
            })
            .to_string(),
        )
        .unwrap();

        let config = configure(&path).unwrap();

        assert_eq!(config.tpp_name, "Acme TPP");
    }
}
