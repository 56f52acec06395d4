use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Method;
use serde_json::Value;

use super::{Mode, RequestHandler, RequestResult, as_whole, malformed};
use crate::config::ProviderConfig;
use crate::error::{ComparisonError, Result};
use crate::fetch::{BasicClient, HttpClient, endpoint_url, fetch_json};
use crate::parser::Coordinates;
use crate::providers::Provider;

const ROUTING_PATH: &str = "/route/v1/driving";

/// OSRM `route` service. Keyless; driving only.
pub struct OsrmRequestHandler {
    client: Box<dyn HttpClient>,
    endpoint: String,
}

impl OsrmRequestHandler {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: Box::new(BasicClient::new()?),
            endpoint: config.endpoint().to_string(),
        })
    }
}

fn parse_route(data: &Value) -> Result<RequestResult> {
    let route = &data["routes"][0];
    let Some(legs) = route["legs"].as_array().filter(|l| !l.is_empty()) else {
        return Err(ComparisonError::RouteNotFound);
    };

    // Sum in floating point first so per-leg fractions are not lost.
    let total: Option<f64> = legs.iter().map(|leg| leg["duration"].as_f64()).sum();
    let travel_time = total
        .filter(|t| *t >= 0.0)
        .map(|t| t as u64)
        .ok_or_else(|| malformed("osrm leg without duration"))?;

    Ok(RequestResult::travel_time(travel_time).with_distance(as_whole(&route["distance"])))
}

#[async_trait]
impl RequestHandler for OsrmRequestHandler {
    fn provider(&self) -> Provider {
        Provider::Osrm
    }

    async fn send_request(
        &self,
        origin: Coordinates,
        destination: Coordinates,
        _departure_time: DateTime<FixedOffset>,
        mode: Mode,
    ) -> Result<RequestResult> {
        if !self.supports(mode) {
            return Err(ComparisonError::UnsupportedMode {
                provider: Provider::Osrm,
                mode,
            });
        }

        // OSRM takes lng,lat.
        let route = format!(
            "{},{};{},{}",
            origin.lng, origin.lat, destination.lng, destination.lat
        );
        let mut url = endpoint_url(&self.endpoint, &format!("{ROUTING_PATH}/{route}"))?;
        url.query_pairs_mut().append_pair("overview", "false");

        let data = fetch_json(&self.client, Provider::Osrm, Method::GET, url, None).await?;
        parse_route(&data)
    }
}
