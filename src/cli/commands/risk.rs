use anyhow::{Context, Result, anyhow};
use chrono::FixedOffset;
use clap::{Arg, ArgMatches, Command};

pub const ARG_UTC_OFFSET_SECONDS: &str = "utc-offset-seconds";
pub const ARG_JITTER_SEED: &str = "jitter-seed";

#[derive(Debug, Clone)]
pub struct Options {
    pub offset: FixedOffset,
    pub jitter_seed: Option<u64>,
}

impl Options {
    /// # Errors
    /// Returns an error if the offset is outside +/- 24h.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let seconds = matches
            .get_one::<i32>(ARG_UTC_OFFSET_SECONDS)
            .copied()
            .context("missing required argument: --utc-offset-seconds")?;
        let offset = FixedOffset::east_opt(seconds)
            .ok_or_else(|| anyhow!("invalid --utc-offset-seconds: {seconds}"))?;

        Ok(Self {
            offset,
            jitter_seed: matches.get_one::<u64>(ARG_JITTER_SEED).copied(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_UTC_OFFSET_SECONDS)
                .long(ARG_UTC_OFFSET_SECONDS)
                .help("UTC offset, in seconds, used to read the local hour of an attempt")
                .env("RISKGATE_UTC_OFFSET_SECONDS")
                .default_value("0")
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(i32).range(-86_399..=86_399)),
        )
        .arg(
            Arg::new(ARG_JITTER_SEED)
                .long(ARG_JITTER_SEED)
                .help("Seed the score jitter for reproducible scores (testing only)")
                .env("RISKGATE_JITTER_SEED")
                .value_parser(clap::value_parser!(u64)),
        )
}
