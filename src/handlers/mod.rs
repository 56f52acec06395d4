//! Request handlers, one per routing provider.
//!
//! Every handler turns an (origin, destination, departure time, mode) query
//! into one HTTP call and maps the answer onto a [`RequestResult`]. Handlers
//! are picked from the closed [`Provider`] set by
//! [`initialize_request_handlers`]; each comes wrapped with the token bucket
//! sized from its config.

mod google;
mod here;
mod mapbox;
mod openroutes;
mod osrm;
mod tomtom;
mod traveltime;
mod valhalla;

pub use google::GoogleRequestHandler;
pub use here::HereRequestHandler;
pub use mapbox::MapboxRequestHandler;
pub use openroutes::OpenRoutesRequestHandler;
pub use osrm::OsrmRequestHandler;
pub use tomtom::TomTomRequestHandler;
pub use traveltime::TravelTimeRequestHandler;
pub use valhalla::ValhallaRequestHandler;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use clap::ValueEnum;
use serde_json::Value;

use crate::config::{ProviderConfig, Providers};
use crate::error::{ComparisonError, Result};
use crate::parser::Coordinates;
use crate::providers::Provider;
use crate::rate_limit::TokenBucket;
use crate::table::ProviderResult;

/// Travel mode requested from every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Mode {
    Driving,
    PublicTransport,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Driving => f.write_str("driving"),
            Mode::PublicTransport => f.write_str("public_transport"),
        }
    }
}

/// Where the provider placed the route's end points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnappedCoordinates {
    pub origin: Coordinates,
    pub destination: Coordinates,
}

/// What a provider answered for one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestResult {
    pub travel_time: Option<u64>,
    pub distance: Option<u64>,
    pub snapped_coords: Option<SnappedCoordinates>,
    pub warnings: Vec<String>,
}

impl RequestResult {
    pub fn travel_time(seconds: u64) -> Self {
        Self {
            travel_time: Some(seconds),
            ..Default::default()
        }
    }

    pub fn with_distance(mut self, meters: Option<u64>) -> Self {
        self.distance = meters;
        self
    }

    /// Flattens into the string-encoded fields stored in the table.
    pub fn into_provider_result(self) -> ProviderResult {
        ProviderResult {
            travel_time: self.travel_time,
            distance: self.distance,
            snapped_origin: self.snapped_coords.map(|s| s.origin.to_string()),
            snapped_destination: self.snapped_coords.map(|s| s.destination.to_string()),
            warnings: (!self.warnings.is_empty()).then(|| self.warnings.join("; ")),
        }
    }
}

#[async_trait]
pub trait RequestHandler: Send + Sync {
    fn provider(&self) -> Provider;

    /// Whether the provider can route `mode` at all.
    fn supports(&self, mode: Mode) -> bool {
        mode == Mode::Driving
    }

    async fn send_request(
        &self,
        origin: Coordinates,
        destination: Coordinates,
        departure_time: DateTime<FixedOffset>,
        mode: Mode,
    ) -> Result<RequestResult>;
}

/// A handler together with the token bucket every one of its requests must pass.
pub struct RateLimitedHandler {
    pub handler: Box<dyn RequestHandler>,
    pub limiter: TokenBucket,
}

impl RateLimitedHandler {
    pub fn new(handler: Box<dyn RequestHandler>, max_rpm: u32) -> Self {
        Self {
            handler,
            limiter: TokenBucket::per_minute(max_rpm),
        }
    }

    pub async fn send_request(
        &self,
        origin: Coordinates,
        destination: Coordinates,
        departure_time: DateTime<FixedOffset>,
        mode: Mode,
    ) -> Result<RequestResult> {
        self.limiter.acquire().await;
        self.handler
            .send_request(origin, destination, departure_time, mode)
            .await
    }
}

/// Builds the handler registered for `config.provider`.
pub fn create_handler(config: &ProviderConfig) -> Result<Box<dyn RequestHandler>> {
    let handler: Box<dyn RequestHandler> = match config.provider {
        Provider::TravelTime => Box::new(TravelTimeRequestHandler::new(config)?),
        Provider::Google => Box::new(GoogleRequestHandler::new(config)?),
        Provider::TomTom => Box::new(TomTomRequestHandler::new(config)?),
        Provider::Here => Box::new(HereRequestHandler::new(config)?),
        Provider::Osrm => Box::new(OsrmRequestHandler::new(config)?),
        Provider::Mapbox => Box::new(MapboxRequestHandler::new(config)?),
        Provider::OpenRoutes => Box::new(OpenRoutesRequestHandler::new(config)?),
        Provider::Valhalla => Box::new(ValhallaRequestHandler::new(config)?),
    };
    Ok(handler)
}

/// One rate-limited handler per configured provider.
pub fn initialize_request_handlers(
    providers: &Providers,
) -> Result<BTreeMap<Provider, RateLimitedHandler>> {
    providers
        .all_providers()
        .map(|config| {
            let handler = create_handler(config)?;
            Ok((config.provider, RateLimitedHandler::new(handler, config.max_rpm)))
        })
        .collect()
}

/// Fails with [`ComparisonError::UnsupportedMode`] for the first handler
/// that cannot route `mode`.
pub fn ensure_mode_supported<'a>(
    handlers: impl IntoIterator<Item = &'a RateLimitedHandler>,
    mode: Mode,
) -> Result<()> {
    match handlers.into_iter().find(|h| !h.handler.supports(mode)) {
        Some(h) => Err(ComparisonError::UnsupportedMode {
            provider: h.handler.provider(),
            mode,
        }),
        None => Ok(()),
    }
}

/// Reads a duration or distance that providers send as either integer or float.
/// Fractions are truncated.
pub(crate) fn as_whole(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
}

pub(crate) fn malformed(what: &str) -> ComparisonError {
    ComparisonError::MalformedResponse(what.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_provider_result_encodes_snapped_coordinates() {
        let result = RequestResult {
            travel_time: Some(600),
            distance: Some(4200),
            snapped_coords: Some(SnappedCoordinates {
                origin: Coordinates::new(51.5, -0.12),
                destination: Coordinates::new(51.6, -0.1),
            }),
            warnings: vec!["Toll road".to_string(), "Private road".to_string()],
        };

        let flat = result.into_provider_result();
        assert_eq!(flat.travel_time, Some(600));
        assert_eq!(flat.snapped_origin.as_deref(), Some("51.5,-0.12"));
        assert_eq!(flat.snapped_destination.as_deref(), Some("51.6,-0.1"));
        assert_eq!(flat.warnings.as_deref(), Some("Toll road; Private road"));
    }

    #[test]
    fn test_into_provider_result_without_warnings() {
        let flat = RequestResult::travel_time(10).into_provider_result();
        assert_eq!(flat.warnings, None);
        assert_eq!(flat.snapped_origin, None);
    }

    #[test]
    fn test_as_whole_truncates_floats() {
        assert_eq!(as_whole(&serde_json::json!(12.9)), Some(12));
        assert_eq!(as_whole(&serde_json::json!(7)), Some(7));
        assert_eq!(as_whole(&serde_json::json!(-1.0)), None);
        assert_eq!(as_whole(&serde_json::json!("7")), None);
    }

    #[test]
    fn test_public_transport_is_rejected_for_osrm() {
        let providers = Providers {
            base: ProviderConfig::new(Provider::TravelTime),
            competitors: vec![ProviderConfig::new(Provider::Osrm)],
        };
        let handlers = initialize_request_handlers(&providers).unwrap();

        assert!(ensure_mode_supported(handlers.values(), Mode::Driving).is_ok());
        let err = ensure_mode_supported(handlers.values(), Mode::PublicTransport).unwrap_err();
        assert!(matches!(
            err,
            ComparisonError::UnsupportedMode { provider: Provider::Osrm, .. }
        ));
    }
}
