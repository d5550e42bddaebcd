//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, such as starting the API
//! server with its OTP policy and collaborators.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_DSN, ARG_PORT, identity, otp};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|dsn| !dsn.trim().is_empty());

    let identity_opts = identity::Options::parse(matches)?;
    let otp_opts = otp::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        identity_url: identity_opts.identity_url,
        frontend_base_url: identity_opts.frontend_base_url,
        otp: otp_opts.config(),
    }))
}
