use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command, builder::PossibleValuesParser};

pub const ARG_GEO_RESOLVER: &str = "geo-resolver";
pub const ARG_GEO_ENDPOINT: &str = "geo-endpoint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolver {
    Headers,
    IpApi,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub resolver: Resolver,
    pub endpoint: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let resolver = match matches
            .get_one::<String>(ARG_GEO_RESOLVER)
            .map(String::as_str)
        {
            Some("ipapi") => Resolver::IpApi,
            _ => Resolver::Headers,
        };
        let endpoint = matches
            .get_one::<String>(ARG_GEO_ENDPOINT)
            .cloned()
            .context("missing required argument: --geo-endpoint")?;
        Ok(Self { resolver, endpoint })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_GEO_RESOLVER)
                .long(ARG_GEO_RESOLVER)
                .help("How to resolve the network address and location of a request")
                .env("RISKGATE_GEO_RESOLVER")
                .default_value("headers")
                .value_parser(PossibleValuesParser::new(["headers", "ipapi"])),
        )
        .arg(
            Arg::new(ARG_GEO_ENDPOINT)
                .long(ARG_GEO_ENDPOINT)
                .help("Base URL of the ipapi-style lookup service")
                .env("RISKGATE_GEO_ENDPOINT")
                .default_value("https://ipapi.co"),
        )
}
