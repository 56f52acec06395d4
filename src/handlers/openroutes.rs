use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Method;
use serde_json::Value;

use super::{Mode, RequestHandler, RequestResult, as_whole};
use crate::config::ProviderConfig;
use crate::error::{ComparisonError, Result};
use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, endpoint_url, fetch_json};
use crate::parser::Coordinates;
use crate::providers::Provider;

const ROUTING_PATH: &str = "/v2/directions/driving-car";

/// openrouteservice directions. Has no departure-time support, so its
/// results are the same for every departure time of a pair.
pub struct OpenRoutesRequestHandler {
    client: Box<dyn HttpClient>,
    endpoint: String,
}

impl OpenRoutesRequestHandler {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = UrlParam::new(BasicClient::new()?, "api_key", &config.credentials.api_key);
        Ok(Self {
            client: Box::new(client),
            endpoint: config.endpoint().to_string(),
        })
    }
}

fn parse_directions(data: &Value) -> Result<RequestResult> {
    let segment = &data["features"][0]["properties"]["segments"][0];
    match as_whole(&segment["duration"]) {
        Some(seconds) if seconds > 0 => {
            Ok(RequestResult::travel_time(seconds).with_distance(as_whole(&segment["distance"])))
        }
        _ => Err(ComparisonError::RouteNotFound),
    }
}

#[async_trait]
impl RequestHandler for OpenRoutesRequestHandler {
    fn provider(&self) -> Provider {
        Provider::OpenRoutes
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
                provider: Provider::OpenRoutes,
                mode,
            });
        }

        let mut url = endpoint_url(&self.endpoint, ROUTING_PATH)?;
        url.query_pairs_mut()
            .append_pair("start", &format!("{},{}", origin.lng, origin.lat))
            .append_pair("end", &format!("{},{}", destination.lng, destination.lat));

        let data = fetch_json(&self.client, Provider::OpenRoutes, Method::GET, url, None).await?;
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
    fn test_parse_directions_without_features() {
        assert!(matches!(
            parse_directions(&json!({"features": []})),
            Err(ComparisonError::RouteNotFound)
        ));
    }

    #[tokio::test]
    async fn test_send_request_reads_first_segment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", ROUTING_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start".into(), "8.681495,49.41461".into()),
                Matcher::UrlEncoded("end".into(), "8.687872,49.420318".into()),
                Matcher::UrlEncoded("api_key".into(), "ors".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"features": [{"properties": {"segments": [
                    {"distance": 1408.8, "duration": 281.9}
                ]}}]})
                .to_string(),
            )
            .create_async()
            .await;

        let config = ProviderConfig::new(Provider::OpenRoutes)
            .with_api_key("ors")
            .with_endpoint(server.url());
        let result = OpenRoutesRequestHandler::new(&config)
            .unwrap()
            .send_request(
                Coordinates::new(49.41461, 8.681495),
                Coordinates::new(49.420318, 8.687872),
                parse_departure_time("2024-01-01 09:00:00+0000").unwrap(),
                Mode::Driving,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.travel_time, Some(281));
        assert_eq!(result.distance, Some(1408));
    }
}
