//! Registry of the routing providers the tool knows how to query.
//!
//! The set is closed: every provider has a stable identifier used in config
//! files and column names, a display name used in logs and charts, and the
//! defaults its request handler falls back to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ComparisonError;

/// A routing API whose travel times can be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    TravelTime,
    Google,
    TomTom,
    Here,
    Osrm,
    Mapbox,
    OpenRoutes,
    Valhalla,
}

impl Provider {
    /// Every provider, in registry order. Outlier detection and column
    /// export iterate in this order.
    pub const ALL: [Provider; 8] = [
        Provider::Google,
        Provider::TomTom,
        Provider::Here,
        Provider::Osrm,
        Provider::Mapbox,
        Provider::OpenRoutes,
        Provider::Valhalla,
        Provider::TravelTime,
    ];

    /// Identifier used in config files and column names.
    pub fn id(&self) -> &'static str {
        match self {
            Provider::TravelTime => "traveltime",
            Provider::Google => "google",
            Provider::TomTom => "tomtom",
            Provider::Here => "here",
            Provider::Osrm => "osrm",
            Provider::Mapbox => "mapbox",
            Provider::OpenRoutes => "openroutes",
            Provider::Valhalla => "valhalla",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::TravelTime => "TravelTime",
            Provider::Google => "Google",
            Provider::TomTom => "TomTom",
            Provider::Here => "HERE",
            Provider::Osrm => "OSRM",
            Provider::Mapbox => "Mapbox",
            Provider::OpenRoutes => "OpenRoutes",
            Provider::Valhalla => "Valhalla",
        }
    }

    /// Requests-per-minute used when the config does not say otherwise.
    pub fn default_rpm(&self) -> u32 {
        match self {
            Provider::OpenRoutes => 20,
            _ => 60,
        }
    }

    /// Base URL of the public API, overridable per provider in the config.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::TravelTime => "https://api.traveltimeapp.com",
            Provider::Google => "https://routes.googleapis.com",
            Provider::TomTom => "https://api.tomtom.com",
            Provider::Here => "https://router.hereapi.com",
            Provider::Osrm => "http://router.project-osrm.org",
            Provider::Mapbox => "https://api.mapbox.com",
            Provider::OpenRoutes => "https://api.openrouteservice.org",
            Provider::Valhalla => "https://valhalla1.openstreetmap.de",
        }
    }

    /// Environment variable consulted when the config leaves the API key empty.
    /// Keyless services (OSRM, Valhalla) have none.
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            Provider::TravelTime => Some("TRAVELTIME_API_KEY"),
            Provider::Google => Some("GOOGLE_API_KEY"),
            Provider::TomTom => Some("TOMTOM_API_KEY"),
            Provider::Here => Some("HERE_API_KEY"),
            Provider::Mapbox => Some("MAPBOX_API_KEY"),
            Provider::OpenRoutes => Some("OPENROUTES_API_KEY"),
            Provider::Osrm | Provider::Valhalla => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = ComparisonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.id() == needle)
            .ok_or_else(|| ComparisonError::UnknownProvider(s.to_string()))
    }
}
