use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use reqwest::Method;
use serde_json::Value;

use super::{Mode, RequestHandler, RequestResult, as_whole};
use crate::config::ProviderConfig;
use crate::error::{ComparisonError, Result};
use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, endpoint_url, fetch_json};
use crate::parser::Coordinates;
use crate::providers::Provider;

const ROUTING_PATH: &str = "/routing/1/calculateRoute";

/// TomTom Routing API.
pub struct TomTomRequestHandler {
    client: Box<dyn HttpClient>,
    endpoint: String,
}

impl TomTomRequestHandler {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = UrlParam::new(BasicClient::new()?, "key", &config.credentials.api_key);
        Ok(Self {
            client: Box::new(client),
            endpoint: config.endpoint().to_string(),
        })
    }
}

/// TomTom has no general transit mode; buses are the closest match.
fn travel_mode(mode: Mode) -> &'static str {
    match mode {
        Mode::Driving => "car",
        Mode::PublicTransport => "bus",
    }
}

fn parse_route(data: &Value) -> Result<RequestResult> {
    let summary = &data["routes"][0]["summary"];
    match as_whole(&summary["travelTimeInSeconds"]) {
        Some(seconds) if seconds > 0 => {
            let distance = as_whole(&summary["lengthInMeters"]);
            Ok(RequestResult::travel_time(seconds).with_distance(distance))
        }
        _ => Err(ComparisonError::RouteNotFound),
    }
}

#[async_trait]
impl RequestHandler for TomTomRequestHandler {
    fn provider(&self) -> Provider {
        Provider::TomTom
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
        let route = format!("{}:{}", origin, destination);
        let mut url = endpoint_url(&self.endpoint, &format!("{ROUTING_PATH}/{route}/json"))?;
        url.query_pairs_mut()
            .append_pair("departAt", &departure_time.to_rfc3339_opts(SecondsFormat::Secs, false))
            .append_pair("travelMode", travel_mode(mode));

        let data = fetch_json(&self.client, Provider::TomTom, Method::GET, url, None).await?;
        parse_route(&data)
    }
}
