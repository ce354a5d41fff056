use clap::{Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accept `RISKGATE_LOG_LEVEL` as a name (`info`) or as a `-v` count (`2`).
fn parse_level(value: &str) -> Result<u8, String> {
    let value = value.trim().to_ascii_lowercase();
    if let Some(index) = LEVEL_NAMES.iter().position(|name| *name == value) {
        return u8::try_from(index).map_err(|e| e.to_string());
    }
    match value.parse::<u8>() {
        Ok(count) if count <= 5 => Ok(count),
        _ => Err(format!(
            "expected one of {} or a count up to 5",
            LEVEL_NAMES.join(", ")
        )),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Repeat to log more: -v warn, -vv info, -vvv debug, -vvvv trace")
            .env("RISKGATE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(parse_level),
    )
}
