use crate::{
    api::{
        self, ApiConfig, AppState,
        geo::{GeoResolver, HeaderGeoResolver, IpApiResolver},
    },
    cli::commands::geo::Resolver,
    risk::{
        Authenticator, InMemoryDirectory, InMemoryLedger, JitterSource, RiskEngine, SeededJitter,
        ThreadRngJitter,
    },
};
use anyhow::{Context, Result};
use chrono::FixedOffset;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub otp_ttl_seconds: i64,
    pub utc_offset: FixedOffset,
    pub jitter_seed: Option<u64>,
    pub geo_resolver: Resolver,
    pub geo_endpoint: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the geolocation client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let jitter: Arc<dyn JitterSource> = match args.jitter_seed {
        Some(seed) => {
            warn!("score jitter is seeded; scores are reproducible");
            Arc::new(SeededJitter::new(seed))
        }
        None => Arc::new(ThreadRngJitter),
    };
    let engine = RiskEngine::new(jitter).with_offset(args.utc_offset);

    let authenticator = Authenticator::new(
        Arc::new(InMemoryDirectory::new()),
        Arc::new(InMemoryLedger::new()),
        engine,
    );

    let geo: Arc<dyn GeoResolver> = match args.geo_resolver {
        Resolver::Headers => Arc::new(HeaderGeoResolver),
        Resolver::IpApi => Arc::new(
            IpApiResolver::new(args.geo_endpoint.clone())
                .context("Failed to build geolocation client")?,
        ),
    };

    let config = ApiConfig::new(args.frontend_base_url)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_otp_ttl_seconds(args.otp_ttl_seconds);

    let state = Arc::new(AppState::new(authenticator, config).with_geo_resolver(geo));

    info!(
        offset = %args.utc_offset,
        geo_resolver = ?args.geo_resolver,
        "starting riskgate"
    );

    api::new(args.port, state).await
}
