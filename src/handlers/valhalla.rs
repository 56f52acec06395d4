use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Method;
use serde_json::{Value, json};

use super::{Mode, RequestHandler, RequestResult, as_whole, malformed};
use crate::config::ProviderConfig;
use crate::error::{ComparisonError, Result};
use crate::fetch::{BasicClient, HttpClient, endpoint_url, fetch_json};
use crate::parser::Coordinates;
use crate::providers::Provider;

const ROUTING_PATH: &str = "/route";
/// `date_time.type` value meaning "depart at".
const DEPART_AT: u8 = 1;

/// Valhalla `route` action. Keyless; driving only.
pub struct ValhallaRequestHandler {
    client: Box<dyn HttpClient>,
    endpoint: String,
}

impl ValhallaRequestHandler {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: Box::new(BasicClient::new()?),
            endpoint: config.endpoint().to_string(),
        })
    }
}

fn request_body(
    origin: Coordinates,
    destination: Coordinates,
    departure_time: DateTime<FixedOffset>,
) -> Value {
    json!({
        "locations": [
            { "lat": origin.lat, "lon": origin.lng, "type": "break" },
            { "lat": destination.lat, "lon": destination.lng, "type": "break" },
        ],
        "costing": "auto",
        "date_time": {
            "type": DEPART_AT,
            "value": departure_time.format("%Y-%m-%dT%H:%M").to_string(),
        },
    })
}

fn parse_trip(data: &Value) -> Result<RequestResult> {
    let trip = &data["trip"];
    if trip.is_null() || trip["status"].as_i64() != Some(0) {
        return Err(ComparisonError::RouteNotFound);
    }

    let summary = &trip["summary"];
    let travel_time = as_whole(&summary["time"])
        .ok_or_else(|| malformed("valhalla trip without summary time"))?;
    // Lengths are in kilometres.
    let distance = summary["length"].as_f64().map(|km| (km * 1000.0) as u64);

    Ok(RequestResult::travel_time(travel_time).with_distance(distance))
}

#[async_trait]
impl RequestHandler for ValhallaRequestHandler {
    fn provider(&self) -> Provider {
        Provider::Valhalla
    }

    async fn send_request(
        &self,
        origin: Coordinates,
        destination: Coordinates,
        departure_time: DateTime<FixedOffset>,
        mode: Mode,
    ) -> Result<RequestResult> {
        if !self.supports(mode) {
            return Err(ComparisonError::UnsupportedMode {
                provider: Provider::Valhalla,
                mode,
            });
        }

        let body = request_body(origin, destination, departure_time);
        let url = endpoint_url(&self.endpoint, ROUTING_PATH)?;
        let data =
            fetch_json(&self.client, Provider::Valhalla, Method::POST, url, Some(&body)).await?;
        parse_trip(&data)
    }
}
