//! Parsers for the string-encoded values found in input tables and on the
//! command line.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::error::{ComparisonError, Result};

/// Format used for `departure_time` cells, e.g. `2023-09-05 12:00:00+0100`.
pub const DEPARTURE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

impl FromStr for Coordinates {
    type Err = ComparisonError;

    /// Parses `"lat,lng"`, tolerating whitespace around either number.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ComparisonError::InvalidCoordinates(s.to_string());

        let mut parts = s.split(',').map(str::trim);
        let (Some(lat), Some(lng), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };

        let lat = lat.parse::<f64>().map_err(|_| invalid())?;
        let lng = lng.parse::<f64>().map_err(|_| invalid())?;
        Ok(Self { lat, lng })
    }
}

/// Parses an IANA time-zone identifier such as `Europe/London`.
pub fn parse_time_zone(id: &str) -> Result<Tz> {
    id.trim()
        .parse::<Tz>()
        .map_err(|_| ComparisonError::InvalidTimeZone(id.to_string()))
}

/// Combines a `YYYY-MM-DD` date and an `HH:MM` time in `tz`.
///
/// Local times skipped or repeated by a DST transition are rejected rather
/// than silently shifted.
pub fn localize_datetime(date: &str, time: &str, tz: &Tz) -> Result<DateTime<FixedOffset>> {
    let invalid = || ComparisonError::InvalidTime(format!("{date} {time}"));

    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
    let clock = NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|_| invalid())?;

    tz.from_local_datetime(&NaiveDateTime::new(day, clock))
        .single()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(invalid)
}

/// Expands a comma-separated list of `HH:MM` times on `date` into instants.
pub fn generate_time_instants(
    departure_times: &str,
    date: &str,
    tz: &Tz,
) -> Result<Vec<DateTime<FixedOffset>>> {
    if departure_times.trim().is_empty() {
        return Err(ComparisonError::NoDepartureTimes);
    }

    departure_times
        .split(',')
        .map(|time| localize_datetime(date, time, tz))
        .collect()
}

pub fn format_departure_time(instant: &DateTime<FixedOffset>) -> String {
    instant.format(DEPARTURE_TIME_FORMAT).to_string()
}

pub fn parse_departure_time(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value.trim(), DEPARTURE_TIME_FORMAT)
        .map_err(|_| ComparisonError::InvalidTime(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinates_simple_case() {
        let coords: Coordinates = "51.4614,-0.1120".parse().unwrap();
        assert_eq!(coords, Coordinates::new(51.4614, -0.1120));
    }

    #[test]
    fn test_parse_coordinates_with_spaces() {
        for input in ["51.4614, -0.1120", "51.4614 , -0.1120", " 51.4614 , -0.1120 "] {
            let coords: Coordinates = input.parse().unwrap();
            assert_eq!(coords, Coordinates::new(51.4614, -0.1120));
        }
    }

    #[test]
    fn test_parse_coordinates_missing_comma() {
        assert!("51.4614 -0.1120".parse::<Coordinates>().is_err());
    }

    #[test]
    fn test_parse_coordinates_too_many_parts() {
        assert!("51.4614,-0.1120,-122.4194".parse::<Coordinates>().is_err());
    }

    #[test]
    fn test_parse_coordinates_non_numeric() {
        assert!("abc, def".parse::<Coordinates>().is_err());
    }

    #[test]
    fn test_localize_datetime_utc() {
        let tz = parse_time_zone("UTC").unwrap();
        let result = localize_datetime("2023-09-13", "15:00", &tz).unwrap();
        assert_eq!(format_departure_time(&result), "2023-09-13 15:00:00+0000");
    }

    #[test]
    fn test_localize_datetime_with_dst_offset() {
        let tz = parse_time_zone("US/Pacific").unwrap();
        let result = localize_datetime("2023-09-13", "15:00", &tz).unwrap();
        assert_eq!(result.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn test_localize_datetime_incorrect_format() {
        let tz = parse_time_zone("US/Pacific").unwrap();
        assert!(localize_datetime("13-09-2023", "3:00", &tz).is_err());
        assert!(localize_datetime("2023-09-13", "3:00 PM", &tz).is_err());
    }

    #[test]
    fn test_localize_datetime_rejects_skipped_local_time() {
        let tz = parse_time_zone("Europe/London").unwrap();
        assert!(localize_datetime("2024-03-31", "01:30", &tz).is_err());
    }

    #[test]
    fn test_generate_time_instants_with_valid_times() {
        let tz = parse_time_zone("UTC").unwrap();
        let result = generate_time_instants("12:00, 13:00", "2023-09-05", &tz).unwrap();
        let formatted: Vec<_> = result.iter().map(format_departure_time).collect();
        assert_eq!(
            formatted,
            vec!["2023-09-05 12:00:00+0000", "2023-09-05 13:00:00+0000"]
        );
    }

    #[test]
    fn test_generate_time_instants_when_no_times_are_provided() {
        let tz = parse_time_zone("UTC").unwrap();
        let err = generate_time_instants("  ", "2023-09-05", &tz).unwrap_err();
        assert!(matches!(err, ComparisonError::NoDepartureTimes));
    }

    #[test]
    fn test_parse_time_zone_rejects_abbreviation_garbage() {
        assert!(parse_time_zone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_departure_time_round_trip() {
        let parsed = parse_departure_time("2023-09-05 12:00:00+0100").unwrap();
        assert_eq!(format_departure_time(&parsed), "2023-09-05 12:00:00+0100");
    }
}
