use crate::cli::{actions::Action, commands, dispatch, telemetry::Telemetry};
use anyhow::Result;

/// Parse arguments, install telemetry and resolve the action to run.
///
/// # Errors
///
/// Returns an error if telemetry cannot be installed or the arguments do not
/// describe a runnable action.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity = matches
        .get_one::<u8>(commands::logging::ARG_VERBOSITY)
        .copied()
        .unwrap_or(0);
    Telemetry::from_env(verbosity).install()?;

    dispatch::handler(&matches)
}
