//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, with its full
//! configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_PORT, auth, geo, risk};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let auth_opts = auth::Options::parse(matches)?;
    let risk_opts = risk::Options::parse(matches)?;
    let geo_opts = geo::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        frontend_base_url: auth_opts.frontend_base_url,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        otp_ttl_seconds: auth_opts.otp_ttl_seconds,
        utc_offset: risk_opts.offset,
        jitter_seed: risk_opts.jitter_seed,
        geo_resolver: geo_opts.resolver,
        geo_endpoint: geo_opts.endpoint,
    }))
}
