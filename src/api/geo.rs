//! Request origin resolution: network address and coarse location.
//!
//! The risk core never performs lookups itself; handlers resolve the origin
//! here and pass the resulting strings in.

use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{Instrument, debug, info_span, warn};

use crate::APP_USER_AGENT;

pub const FALLBACK_ADDRESS: &str = "127.0.0.1";
pub const UNKNOWN_LOCATION: &str = "Unknown Location";
const LOCATION_HEADER: &str = "x-geo-location";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub network_address: String,
    pub location: String,
}

#[async_trait]
pub trait GeoResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Origin;
}

/// Trusts proxy headers: `X-Forwarded-For`, `X-Real-IP` and `X-Geo-Location`.
#[derive(Clone, Debug, Default)]
pub struct HeaderGeoResolver;

#[async_trait]
impl GeoResolver for HeaderGeoResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Origin {
        let location = header_str(headers, LOCATION_HEADER)
            .unwrap_or(UNKNOWN_LOCATION)
            .to_string();
        Origin {
            network_address: extract_client_ip(headers)
                .unwrap_or_else(|| FALLBACK_ADDRESS.to_string()),
            location,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    ip: Option<String>,
    city: Option<String>,
    country_name: Option<String>,
}

/// Looks the client address up against an ipapi-style JSON endpoint.
///
/// The address from proxy headers is appended to the endpoint path; any
/// failure falls back to the header address and an unknown location.
#[derive(Debug, Clone)]
pub struct IpApiResolver {
    endpoint: String,
    client: Client,
}

impl IpApiResolver {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(LOOKUP_TIMEOUT)
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn lookup_url(&self, address: Option<&str>) -> String {
        match address {
            Some(address) => format!("{}/{address}/json/", self.endpoint),
            None => format!("{}/json/", self.endpoint),
        }
    }

    async fn lookup(&self, address: Option<&str>) -> anyhow::Result<IpApiResponse> {
        let span = info_span!("geo.lookup", http.url = %self.lookup_url(address));
        let response = self
            .client
            .get(self.lookup_url(address))
            .send()
            .instrument(span)
            .await?
            .error_for_status()?;
        Ok(response.json::<IpApiResponse>().await?)
    }
}

#[async_trait]
impl GeoResolver for IpApiResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Origin {
        let forwarded = extract_client_ip(headers);
        match self.lookup(forwarded.as_deref()).await {
            Ok(body) => {
                debug!(?body, "geo lookup");
                Origin {
                    network_address: body
                        .ip
                        .or(forwarded)
                        .unwrap_or_else(|| FALLBACK_ADDRESS.to_string()),
                    location: format_location(body.city.as_deref(), body.country_name.as_deref()),
                }
            }
            Err(err) => {
                warn!("geo lookup failed: {err}");
                Origin {
                    network_address: forwarded.unwrap_or_else(|| FALLBACK_ADDRESS.to_string()),
                    location: UNKNOWN_LOCATION.to_string(),
                }
            }
        }
    }
}

fn format_location(city: Option<&str>, country: Option<&str>) -> String {
    let city = city.map(str::trim).filter(|value| !value.is_empty());
    let country = country.map(str::trim).filter(|value| !value.is_empty());
    match (city, country) {
        (Some(city), Some(country)) => format!("{city}, {country}"),
        (Some(only), None) | (None, Some(only)) => only.to_string(),
        (None, None) => UNKNOWN_LOCATION.to_string(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Extract a client IP from common proxy headers.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(forwarded) = forwarded {
        return Some(forwarded.to_string());
    }
    header_str(headers, "x-real-ip").map(str::to_string)
}
