use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use reqwest::Method;
use serde_json::Value;

use super::{Mode, RequestHandler, RequestResult, as_whole, malformed};
use crate::config::ProviderConfig;
use crate::error::{ComparisonError, Result};
use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, endpoint_url, fetch_json};
use crate::parser::Coordinates;
use crate::providers::Provider;

const ROUTES_PATH: &str = "/v8/routes";

/// HERE Routing API v8.
pub struct HereRequestHandler {
    client: Box<dyn HttpClient>,
    endpoint: String,
}

impl HereRequestHandler {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = UrlParam::new(BasicClient::new()?, "apikey", &config.credentials.api_key);
        Ok(Self {
            client: Box::new(client),
            endpoint: config.endpoint().to_string(),
        })
    }
}

fn transport_mode(mode: Mode) -> &'static str {
    match mode {
        Mode::Driving => "car",
        Mode::PublicTransport => "bus",
    }
}

/// Durations and lengths summed over every section of the first route.
fn parse_routes(data: &Value) -> Result<RequestResult> {
    let Some(sections) = data["routes"][0]["sections"].as_array().filter(|s| !s.is_empty()) else {
        return Err(ComparisonError::RouteNotFound);
    };

    let travel_time = sections
        .iter()
        .map(|s| as_whole(&s["summary"]["duration"]))
        .sum::<Option<u64>>()
        .ok_or_else(|| malformed("here section without summary duration"))?;
    let distance = sections.iter().map(|s| as_whole(&s["summary"]["length"])).sum();

    Ok(RequestResult::travel_time(travel_time).with_distance(distance))
}

#[async_trait]
impl RequestHandler for HereRequestHandler {
    fn provider(&self) -> Provider {
        Provider::Here
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
        let mut url = endpoint_url(&self.endpoint, ROUTES_PATH)?;
        url.query_pairs_mut()
            .append_pair("transportMode", transport_mode(mode))
            .append_pair("origin", &origin.to_string())
            .append_pair("destination", &destination.to_string())
            .append_pair("return", "summary")
            .append_pair(
                "departureTime",
                &departure_time.to_rfc3339_opts(SecondsFormat::Secs, false),
            );

        let data = fetch_json(&self.client, Provider::Here, Method::GET, url, None).await?;
        parse_routes(&data)
    }
}
