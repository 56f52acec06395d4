use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use reqwest::Method;
use serde_json::{Value, json};

use super::{Mode, RequestHandler, RequestResult, SnappedCoordinates, as_whole, malformed};
use crate::config::ProviderConfig;
use crate::error::{ComparisonError, Result};
use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, HttpClient, endpoint_url, fetch_json};
use crate::parser::Coordinates;
use crate::providers::Provider;

const ROUTES_PATH: &str = "/v4/routes";
const ORIGIN_ID: &str = "o";
const DESTINATION_ID: &str = "d";

/// TravelTime Routes API, the provider under evaluation.
pub struct TravelTimeRequestHandler {
    client: Box<dyn HttpClient>,
    endpoint: String,
}

impl TravelTimeRequestHandler {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let app_id = config.credentials.app_id.as_deref().unwrap_or_default();
        let with_app = ApiKey::new(BasicClient::new()?, "X-Application-Id", app_id)?;
        let client = ApiKey::new(with_app, "X-Api-Key", &config.credentials.api_key)?;
        Ok(Self {
            client: Box::new(client),
            endpoint: config.endpoint().to_string(),
        })
    }
}

fn transportation(mode: Mode) -> Value {
    match mode {
        Mode::Driving => json!({ "type": "driving" }),
        Mode::PublicTransport => json!({ "type": "public_transport" }),
    }
}

fn request_body(
    origin: Coordinates,
    destination: Coordinates,
    departure_time: DateTime<FixedOffset>,
    mode: Mode,
) -> Value {
    json!({
        "locations": [
            { "id": ORIGIN_ID, "coords": { "lat": origin.lat, "lng": origin.lng } },
            { "id": DESTINATION_ID, "coords": { "lat": destination.lat, "lng": destination.lng } },
        ],
        "departure_searches": [{
            "id": format!("{origin} to {destination} at {departure_time} with {mode}"),
            "departure_location_id": ORIGIN_ID,
            "arrival_location_ids": [DESTINATION_ID],
            "transportation": transportation(mode),
            "departure_time": departure_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            "properties": ["travel_time", "route"],
            "snapping": { "penalty": "disabled", "accept_roads": "both_drivable_and_walkable" },
        }],
        "arrival_searches": [],
    })
}

fn coords(value: &Value) -> Option<Coordinates> {
    Some(Coordinates::new(value["lat"].as_f64()?, value["lng"].as_f64()?))
}

/// Reads travel time plus, from the route parts, total distance and the
/// first and last route points as snapped end points.
fn parse_routes(data: &Value) -> Result<RequestResult> {
    let properties = &data["results"][0]["locations"][0]["properties"][0];
    if properties.is_null() {
        return Err(ComparisonError::RouteNotFound);
    }

    let travel_time = as_whole(&properties["travel_time"])
        .ok_or_else(|| malformed("traveltime result without travel_time"))?;

    let parts = properties["route"]["parts"].as_array().map(Vec::as_slice).unwrap_or_default();
    let points: Vec<Coordinates> = parts
        .iter()
        .filter_map(|part| part["coords"].as_array())
        .flatten()
        .filter_map(coords)
        .collect();

    let snapped_coords = match points.as_slice() {
        [first, .., last] => Some(SnappedCoordinates {
            origin: *first,
            destination: *last,
        }),
        _ => None,
    };
    let distance = (!parts.is_empty())
        .then(|| parts.iter().filter_map(|p| as_whole(&p["distance"])).sum());

    Ok(RequestResult {
        travel_time: Some(travel_time),
        distance,
        snapped_coords,
        warnings: Vec::new(),
    })
}

#[async_trait]
impl RequestHandler for TravelTimeRequestHandler {
    fn provider(&self) -> Provider {
        Provider::TravelTime
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
        let body = request_body(origin, destination, departure_time, mode);
        let url = endpoint_url(&self.endpoint, ROUTES_PATH)?;
        let data =
            fetch_json(&self.client, Provider::TravelTime, Method::POST, url, Some(&body)).await?;
        parse_routes(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::parser::parse_departure_time;

    fn handler(endpoint: &str) -> TravelTimeRequestHandler {
        let mut config = ProviderConfig::new(Provider::TravelTime).with_endpoint(endpoint);
        config.credentials = Credentials {
            app_id: Some("app".to_string()),
            api_key: "secret".to_string(),
        };
        TravelTimeRequestHandler::new(&config).unwrap()
    }

    fn routes_response() -> Value {
        json!({
            "results": [{
                "search_id": "s",
                "locations": [{
                    "id": "d",
                    "properties": [{
                        "travel_time": 1800,
                        "route": {
                            "parts": [
                                {"id": 0, "distance": 100, "coords": [
                                    {"lat": 51.5074, "lng": -0.1278},
                                    {"lat": 51.51, "lng": -0.13}
                                ]},
                                {"id": 1, "distance": 2400, "coords": [
                                    {"lat": 51.52, "lng": -0.14}
                                ]}
                            ]
                        }
                    }]
                }],
                "unreachable": []
            }]
        })
    }

    #[test]
    fn test_parse_routes_collects_distance_and_snapping() {
        let result = parse_routes(&routes_response()).unwrap();
        assert_eq!(result.travel_time, Some(1800));
        assert_eq!(result.distance, Some(2500));
        let snapped = result.snapped_coords.unwrap();
        assert_eq!(snapped.origin, Coordinates::new(51.5074, -0.1278));
        assert_eq!(snapped.destination, Coordinates::new(51.52, -0.14));
    }

    #[test]
    fn test_parse_routes_unreachable() {
        let data = json!({"results": [{"search_id": "s", "locations": [], "unreachable": ["d"]}]});
        assert!(matches!(parse_routes(&data), Err(ComparisonError::RouteNotFound)));
    }

    #[test]
    fn test_request_body_public_transport() {
        let body = request_body(
            Coordinates::new(1.0, 2.0),
            Coordinates::new(3.0, 4.0),
            parse_departure_time("2024-01-01 09:00:00+0100").unwrap(),
            Mode::PublicTransport,
        );
        let search = &body["departure_searches"][0];
        assert_eq!(search["transportation"]["type"], "public_transport");
        assert_eq!(search["departure_time"], "2024-01-01T09:00:00+01:00");
        assert_eq!(body["locations"][1]["coords"]["lng"], 4.0);
    }

    #[tokio::test]
    async fn test_send_request_sends_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", ROUTES_PATH)
            .match_header("X-Application-Id", "app")
            .match_header("X-Api-Key", "secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(routes_response().to_string())
            .create_async()
            .await;

        let result = handler(&server.url())
            .send_request(
                Coordinates::new(51.5074, -0.1278),
                Coordinates::new(51.52, -0.14),
                parse_departure_time("2024-01-01 09:00:00+0000").unwrap(),
                Mode::Driving,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.travel_time, Some(1800));
    }
}
