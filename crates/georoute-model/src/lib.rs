//! Shared data structures for georoute.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address reported by the hop source when no responder answered a probe.
pub const TIMEOUT_PLACEHOLDER: &str = "*";

/// One hop discovery as emitted by a hop source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HopEvent {
    pub ttl: u32,
    pub address: String,
    pub rtt_ms: Vec<Option<f64>>,
}

impl HopEvent {
    pub fn new(ttl: u32, address: impl Into<String>, rtt_ms: Vec<Option<f64>>) -> Self {
        Self {
            ttl,
            address: address.into(),
            rtt_ms,
        }
    }
}

/// Representative round-trip time of a hop.
///
/// `Unavailable` is kept apart from any numeric value: on the wire it is the
/// string `"N/A"`, never `0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "LatencyRepr", try_from = "LatencyRepr")]
pub enum Latency {
    Millis(f64),
    Unavailable,
}

impl Latency {
    pub const UNAVAILABLE_LABEL: &'static str = "N/A";

    /// Number of RTT slots consulted, in priority order.
    pub const SAMPLE_SLOTS: usize = 3;

    /// First present sample among the leading RTT slots.
    pub fn from_samples(samples: &[Option<f64>]) -> Self {
        samples
            .iter()
            .take(Self::SAMPLE_SLOTS)
            .copied()
            .flatten()
            .next()
            .map_or(Latency::Unavailable, Latency::Millis)
    }

    pub fn as_millis(&self) -> Option<f64> {
        match self {
            Latency::Millis(value) => Some(*value),
            Latency::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Latency::Millis(_))
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Latency::Millis(value) => write!(f, "{value}ms"),
            Latency::Unavailable => f.write_str(Self::UNAVAILABLE_LABEL),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LatencyRepr {
    Millis(f64),
    Label(String),
}

impl From<Latency> for LatencyRepr {
    fn from(latency: Latency) -> Self {
        match latency {
            Latency::Millis(value) => LatencyRepr::Millis(value),
            Latency::Unavailable => LatencyRepr::Label(Latency::UNAVAILABLE_LABEL.to_string()),
        }
    }
}

impl TryFrom<LatencyRepr> for Latency {
    type Error = String;

    fn try_from(repr: LatencyRepr) -> Result<Self, Self::Error> {
        match repr {
            LatencyRepr::Millis(value) => Ok(Latency::Millis(value)),
            LatencyRepr::Label(label) if label == Latency::UNAVAILABLE_LABEL => {
                Ok(Latency::Unavailable)
            }
            LatencyRepr::Label(label) => Err(format!("invalid latency label: {label}")),
        }
    }
}

/// Latitude/longitude pair, serialized as `[lat, lon]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Canonical `"lat,lon"` form used to compare consecutive hops.
    pub fn key(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }

    /// A latitude of exactly zero is the provider's marker for an unknown
    /// location; non-finite values are unusable as well.
    pub fn is_degenerate(&self) -> bool {
        self.latitude == 0.0 || !self.latitude.is_finite() || !self.longitude.is_finite()
    }
}

impl From<[f64; 2]> for Coordinates {
    fn from([latitude, longitude]: [f64; 2]) -> Self {
        Self::new(latitude, longitude)
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(coords: Coordinates) -> Self {
        [coords.latitude, coords.longitude]
    }
}

/// A hop accepted by the collector: unique address, one latency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectedHop {
    pub address: String,
    pub latency: Latency,
}

/// A collected hop with the provider's answer folded in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedHop {
    pub address: String,
    pub latency: Latency,
    pub name: String,
    pub coords: Option<Coordinates>,
    pub isp: String,
    pub org: String,
    pub as_number: String,
}

/// One entry of the final route, in the shape the map front end reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteEntry {
    #[serde(rename = "ip")]
    pub address: String,
    pub name: String,
    pub coords: Coordinates,
    pub isp: String,
    pub org: String,
    #[serde(rename = "as")]
    pub as_number: String,
    pub latency: Latency,
}

/// Route document written by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteFile {
    pub version: u32,
    pub target: String,
    pub timestamp_utc: String,
    pub route: Vec<RouteEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(address: &str, coords: [f64; 2], latency: Latency) -> RouteEntry {
        RouteEntry {
            address: address.to_string(),
            name: "Frankfurt am Main, Germany".to_string(),
            coords: coords.into(),
            isp: "Example Transit".to_string(),
            org: "Unknown Org".to_string(),
            as_number: "AS64500 Example".to_string(),
            latency,
        }
    }

    #[test]
    fn latency_takes_first_present_sample() {
        assert_eq!(
            Latency::from_samples(&[None, Some(45.0), Some(1.0)]),
            Latency::Millis(45.0)
        );
        assert_eq!(
            Latency::from_samples(&[None, None, Some(8.0)]),
            Latency::Millis(8.0)
        );
        assert_eq!(Latency::from_samples(&[]), Latency::Unavailable);
    }

    #[test]
    fn latency_ignores_samples_past_third_slot() {
        let samples = [None, None, None, Some(3.0)];
        assert_eq!(Latency::from_samples(&samples), Latency::Unavailable);
    }

    #[test]
    fn unavailable_latency_is_not_zero_on_the_wire() {
        assert_eq!(serde_json::to_value(Latency::Unavailable).unwrap(), json!("N/A"));
        assert_eq!(serde_json::to_value(Latency::Millis(0.0)).unwrap(), json!(0.0));

        let decoded: Latency = serde_json::from_value(json!("N/A")).unwrap();
        assert_eq!(decoded, Latency::Unavailable);
        assert!(serde_json::from_value::<Latency>(json!("soon")).is_err());
    }

    #[test]
    fn coordinates_key_and_degenerate_checks() {
        let coords = Coordinates::new(50.1109, 8.6821);
        assert_eq!(coords.key(), "50.1109,8.6821");
        assert!(!coords.is_degenerate());

        assert!(Coordinates::new(0.0, 8.6821).is_degenerate());
        assert!(Coordinates::new(f64::NAN, 1.0).is_degenerate());
        assert!(!Coordinates::new(12.5, 0.0).is_degenerate());
    }

    #[test]
    fn route_entry_uses_front_end_field_names() {
        let value = serde_json::to_value(entry(
            "203.0.113.9",
            [50.1109, 8.6821],
            Latency::Millis(12.5),
        ))
        .unwrap();

        assert_eq!(
            value,
            json!({
                "ip": "203.0.113.9",
                "name": "Frankfurt am Main, Germany",
                "coords": [50.1109, 8.6821],
                "isp": "Example Transit",
                "org": "Unknown Org",
                "as": "AS64500 Example",
                "latency": 12.5
            })
        );
    }

    #[test]
    fn route_file_round_trip_is_stable() {
        let file = RouteFile {
            version: 1,
            target: "example.org".to_string(),
            timestamp_utc: "2026-02-01T12:34:56Z".to_string(),
            route: vec![
                entry("198.51.100.1", [52.52, 13.405], Latency::Millis(3.2)),
                entry("203.0.113.9", [50.1109, 8.6821], Latency::Unavailable),
            ],
        };

        let json = serde_json::to_string_pretty(&file).unwrap();
        let decoded: RouteFile = serde_json::from_str(&json).unwrap();

        assert_eq!(file, decoded);
        assert_eq!(json, serde_json::to_string_pretty(&decoded).unwrap());
    }
}
