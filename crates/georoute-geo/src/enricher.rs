use crate::ip_api::DEFAULT_BASE_URL;
use crate::lookup::{GeoLookup, GeoRecord, LookupError};
use georoute_model::{CollectedHop, Coordinates, EnrichedHop};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const UNKNOWN_ISP: &str = "Unknown ISP";
pub const UNKNOWN_ORG: &str = "Unknown Org";
pub const UNKNOWN_AS: &str = "Unknown AS";
pub const UNKNOWN_COUNTRY: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct GeoSettings {
    pub base_url: String,
    /// Upper bound for one lookup; expiry drops the hop.
    pub timeout: Duration,
    /// Minimum spacing between the starts of consecutive lookups.
    pub min_interval: Option<Duration>,
}

impl Default for GeoSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(5),
            min_interval: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("enrichment cancelled")]
pub struct Cancelled;

/// Resolves collected hops one at a time, in order.
#[derive(Clone)]
pub struct GeoEnricher {
    lookup: Arc<dyn GeoLookup>,
    timeout: Duration,
    min_interval: Option<Duration>,
}

impl GeoEnricher {
    pub fn new(lookup: Arc<dyn GeoLookup>, settings: &GeoSettings) -> Self {
        Self {
            lookup,
            timeout: settings.timeout,
            min_interval: settings.min_interval.filter(|interval| !interval.is_zero()),
        }
    }

    /// Looks up one hop. Any lookup failure yields `Ok(None)`; only
    /// cancellation is reported as an error.
    pub async fn enrich(
        &self,
        hop: &CollectedHop,
        cancel: &CancellationToken,
    ) -> Result<Option<EnrichedHop>, Cancelled> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled),
            outcome = tokio::time::timeout(self.timeout, self.lookup.lookup(&hop.address)) => outcome,
        };

        let result = match outcome {
            Ok(lookup) => lookup.and_then(|record| enrich_record(hop, record)),
            Err(_) => Err(LookupError::Timeout(self.timeout)),
        };

        match result {
            Ok(enriched) => Ok(Some(enriched)),
            Err(err) => {
                tracing::debug!(address = %hop.address, error = %err, "geolocation lookup failed");
                Ok(None)
            }
        }
    }

    /// Enriches every hop sequentially, keeping positions aligned with `hops`.
    pub async fn enrich_all(
        &self,
        hops: &[CollectedHop],
        cancel: &CancellationToken,
    ) -> Result<Vec<Option<EnrichedHop>>, Cancelled> {
        let mut enriched = Vec::with_capacity(hops.len());
        let mut last_start: Option<Instant> = None;

        for hop in hops {
            if let (Some(interval), Some(last)) = (self.min_interval, last_start) {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Cancelled),
                    _ = tokio::time::sleep_until(last + interval) => {}
                }
            }
            last_start = Some(Instant::now());
            enriched.push(self.enrich(hop, cancel).await?);
        }

        Ok(enriched)
    }
}

/// Folds a provider record into the hop, or explains why it can't be used.
pub fn enrich_record(hop: &CollectedHop, record: GeoRecord) -> Result<EnrichedHop, LookupError> {
    if !record.is_success() {
        return Err(LookupError::Rejected {
            message: record.message.unwrap_or_else(|| "no message".to_string()),
            status: record.status,
        });
    }

    let country = present(record.country).unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());
    let name = match present(record.city) {
        Some(city) => format!("{city}, {country}"),
        None => country,
    };

    let coords = match (record.lat, record.lon) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
        _ => None,
    };

    Ok(EnrichedHop {
        address: hop.address.clone(),
        latency: hop.latency,
        name,
        coords,
        isp: present(record.isp).unwrap_or_else(|| UNKNOWN_ISP.to_string()),
        org: present(record.org).unwrap_or_else(|| UNKNOWN_ORG.to_string()),
        as_number: present(record.as_name).unwrap_or_else(|| UNKNOWN_AS.to_string()),
    })
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
