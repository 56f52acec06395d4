use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{Value, json};

use super::{Mode, RequestHandler, RequestResult, SnappedCoordinates, as_whole, malformed};
use crate::config::ProviderConfig;
use crate::error::{ComparisonError, Result};
use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, HttpClient, endpoint_url, fetch_json};
use crate::parser::Coordinates;
use crate::providers::Provider;

const ROUTING_PATH: &str = "/directions/v2:computeRoutes";
const FIELD_MASK: &str = concat!(
    "routes.duration,routes.distanceMeters,routes.warnings,",
    "routes.legs.startLocation,routes.legs.endLocation"
);

/// Google Routes API (`computeRoutes`).
pub struct GoogleRequestHandler {
    client: Box<dyn HttpClient>,
    endpoint: String,
}

impl GoogleRequestHandler {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let keyed = ApiKey::new(
            BasicClient::new()?,
            "X-Goog-Api-Key",
            &config.credentials.api_key,
        )?;
        let client = ApiKey::new(keyed, "X-Goog-FieldMask", FIELD_MASK)?;
        Ok(Self {
            client: Box::new(client),
            endpoint: config.endpoint().to_string(),
        })
    }
}

fn travel_mode(mode: Mode) -> &'static str {
    match mode {
        Mode::Driving => "DRIVE",
        Mode::PublicTransport => "TRANSIT",
    }
}

fn waypoint(point: Coordinates) -> Value {
    json!({ "location": { "latLng": { "latitude": point.lat, "longitude": point.lng } } })
}

fn lat_lng(location: &Value) -> Option<Coordinates> {
    let lat_lng = &location["latLng"];
    Some(Coordinates::new(lat_lng["latitude"].as_f64()?, lat_lng["longitude"].as_f64()?))
}

/// `"123s"` to seconds.
fn parse_duration(value: &str) -> Option<u64> {
    value.strip_suffix('s')?.parse::<f64>().ok().map(|s| s as u64)
}

fn parse_route(data: &Value) -> Result<RequestResult> {
    let Some(route) = data["routes"].as_array().and_then(|r| r.first()) else {
        return Err(ComparisonError::RouteNotFound);
    };

    let travel_time = route["duration"]
        .as_str()
        .and_then(parse_duration)
        .ok_or_else(|| malformed("google route without duration"))?;

    let warnings = route["warnings"]
        .as_array()
        .map(|w| w.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    let leg = &route["legs"][0];
    let snapped_coords = match (lat_lng(&leg["startLocation"]), lat_lng(&leg["endLocation"])) {
        (Some(origin), Some(destination)) => Some(SnappedCoordinates { origin, destination }),
        _ => None,
    };

    Ok(RequestResult {
        travel_time: Some(travel_time),
        distance: as_whole(&route["distanceMeters"]),
        snapped_coords,
        warnings,
    })
}

/// RFC 3339 in UTC with a `Z` suffix.
fn departure_timestamp(departure_time: &DateTime<FixedOffset>) -> String {
    departure_time
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl RequestHandler for GoogleRequestHandler {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn supports(&self, _mode: Mode) -> bool {
        true
    }

    async fn send_request(
        &self,
        origin: Coordinates,
        destination: Coordinates,
        departure_time: DateTime<FixedOffset>,
        mode: Mode,
    ) -> Result<RequestResult> {
        let mut body = json!({
            "origin": waypoint(origin),
            "destination": waypoint(destination),
            "travelMode": travel_mode(mode),
            "departureTime": departure_timestamp(&departure_time),
        });
        if mode == Mode::Driving {
            body["routingPreference"] = json!("TRAFFIC_AWARE_OPTIMAL");
            body["trafficModel"] = json!("BEST_GUESS");
        }

        let url = endpoint_url(&self.endpoint, ROUTING_PATH)?;
        let data =
            fetch_json(&self.client, Provider::Google, Method::POST, url, Some(&body)).await?;
        parse_route(&data)
    }
}
