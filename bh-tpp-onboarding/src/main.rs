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

//! `tpp-onboard`: onboard a Third-Party Provider to an Open Banking sandbox.

use std::{path::PathBuf, process::ExitCode};

use bh_tpp_onboarding::{flow, ArtifactStore, RunOptions, Secret};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Provision QWAC/QSEAL certificates, sign the registration request, register
/// over mutual TLS and obtain an access token.
#[derive(Parser)]
#[command(name = "tpp-onboard")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration
    #[arg(
        short,
        long,
        env = "TPP_ONBOARD_CONFIG",
        value_name = "FILE",
        default_value = "conf/env.json"
    )]
    config: PathBuf,

    /// Directory the `certs/` and `conf/` artifacts are written under
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error), unless RUST_LOG is set
    #[arg(long, env = "TPP_ONBOARD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Accept any server certificate on the registration and token calls
    #[arg(long)]
    insecure_skip_tls_verify: bool,

    /// Log the client secret and the access token in clear
    #[arg(long)]
    reveal_secrets: bool,

    /// Sandbox API key, overrides `api_key` of the configuration
    #[arg(long, env = "TPP_ONBOARD_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = init_logging(&cli.log_level) {
        eprintln!("fatal: invalid log filter: {error}");
        return ExitCode::FAILURE;
    }

    let mut config = match flow::configure(&cli.config) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(?error, "fatal: {error}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(api_key) = cli.api_key {
        config.api_key = Secret::new(api_key);
    }
    if cli.insecure_skip_tls_verify {
        config.verify_server_certificate = false;
    }

    tracing::info!(
        tpp_name = config.tpp_name.as_str(),
        output_dir = %cli.output_dir.display(),
        "starting TPP onboarding"
    );

    let options = RunOptions {
        reveal_secrets: cli.reveal_secrets,
    };
    match flow::run(config, ArtifactStore::new(cli.output_dir), options) {
        Ok(onboarding) => {
            println!(
                "TPP onboarding complete, client_id {}",
                onboarding.registration().client_id
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(?error, "fatal: {error}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing subscriber for logging. `RUST_LOG` takes precedence
/// over `level`.
fn init_logging(level: &str) -> Result<(), tracing_subscriber::filter::ParseError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
