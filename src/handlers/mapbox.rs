use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::Method;
use serde_json::Value;

use super::{Mode, RequestHandler, RequestResult, SnappedCoordinates, as_whole};
use crate::config::ProviderConfig;
use crate::error::{ComparisonError, Result};
use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, endpoint_url, fetch_json};
use crate::parser::Coordinates;
use crate::providers::Provider;

const ROUTING_PATH: &str = "/directions/v5/mapbox/driving-traffic";

/// Mapbox Directions API with the traffic-aware driving profile.
pub struct MapboxRequestHandler {
    client: Box<dyn HttpClient>,
    endpoint: String,
}

impl MapboxRequestHandler {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = UrlParam::new(
            BasicClient::new()?,
            "access_token",
            &config.credentials.api_key,
        );
        Ok(Self {
            client: Box::new(client),
            endpoint: config.endpoint().to_string(),
        })
    }
}

/// Waypoint locations come back as `[lng, lat]`.
fn waypoint_location(waypoint: &Value) -> Option<Coordinates> {
    let location = waypoint["location"].as_array()?;
    match location.as_slice() {
        [lng, lat, ..] => Some(Coordinates::new(lat.as_f64()?, lng.as_f64()?)),
        _ => None,
    }
}

fn parse_directions(data: &Value) -> Result<RequestResult> {
    let route = &data["routes"][0];
    let travel_time = match as_whole(&route["duration"]) {
        Some(seconds) if seconds > 0 => seconds,
        _ => return Err(ComparisonError::RouteNotFound),
    };

    let waypoints = data["waypoints"].as_array().map(Vec::as_slice).unwrap_or_default();
    let snapped_coords = match waypoints {
        [first, .., last] => waypoint_location(first)
            .zip(waypoint_location(last))
            .map(|(origin, destination)| SnappedCoordinates { origin, destination }),
        _ => None,
    };

    Ok(RequestResult {
        travel_time: Some(travel_time),
        distance: as_whole(&route["distance"]).filter(|d| *d > 0),
        snapped_coords,
        warnings: Vec::new(),
    })
}

#[async_trait]
impl RequestHandler for MapboxRequestHandler {
    fn provider(&self) -> Provider {
        Provider::Mapbox
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
                provider: Provider::Mapbox,
                mode,
            });
        }

        let route = format!(
            "{},{};{},{}",
            origin.lng, origin.lat, destination.lng, destination.lat
        );
        let mut url = endpoint_url(&self.endpoint, &format!("{ROUTING_PATH}/{route}"))?;
        let depart_at = departure_time.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%SZ").to_string();
        url.query_pairs_mut()
            .append_pair("depart_at", &depart_at)
            // Ferries are excluded to match driving-only routing elsewhere.
            .append_pair("exclude", "ferry");

        let data = fetch_json(&self.client, Provider::Mapbox, Method::GET, url, None).await?;
        parse_directions(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_departure_time;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_parse_directions_reads_waypoints_as_lng_lat() {
        let data = json!({
            "routes": [{"duration": 812.4, "distance": 6001.2}],
            "waypoints": [
                {"name": "A", "location": [-0.1279, 51.5075]},
                {"name": "B", "location": [-0.2, 51.6]}
            ]
        });

        let result = parse_directions(&data).unwrap();
        assert_eq!(result.travel_time, Some(812));
        assert_eq!(result.distance, Some(6001));
        let snapped = result.snapped_coords.unwrap();
        assert_eq!(snapped.origin, Coordinates::new(51.5075, -0.1279));
        assert_eq!(snapped.destination, Coordinates::new(51.6, -0.2));
    }

    #[tokio::test]
    async fn test_send_request_converts_departure_to_utc() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/directions/v5/mapbox/driving-traffic/-0.1,51.5;-0.2,51.6")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("depart_at".into(), "2024-06-01T08:00:00Z".into()),
                Matcher::UrlEncoded("exclude".into(), "ferry".into()),
                Matcher::UrlEncoded("access_token".into(), "mb".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"routes": [{"duration": 300.0}], "waypoints": []}).to_string())
            .create_async()
            .await;

        let config = ProviderConfig::new(Provider::Mapbox)
            .with_api_key("mb")
            .with_endpoint(server.url());
        let result = MapboxRequestHandler::new(&config)
            .unwrap()
            .send_request(
                Coordinates::new(51.5, -0.1),
                Coordinates::new(51.6, -0.2),
                parse_departure_time("2024-06-01 09:00:00+0100").unwrap(),
                Mode::Driving,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.travel_time, Some(300));
        assert!(result.snapped_coords.is_none());
    }
}
