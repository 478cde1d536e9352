use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Provider answer for one address, as ip-api.com shapes it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeoRecord {
    #[serde(default)]
    pub status: String,
    pub message: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub isp: Option<String>,
    pub org: Option<String>,
    #[serde(rename = "as")]
    pub as_name: Option<String>,
}

impl GeoRecord {
    pub const SUCCESS: &'static str = "success";

    pub fn is_success(&self) -> bool {
        self.status == Self::SUCCESS
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("geolocation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("geolocation provider answered HTTP {0}")]
    Status(u16),

    #[error("undecodable geolocation response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("geolocation lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("geolocation provider rejected the lookup ({status}): {message}")]
    Rejected { status: String, message: String },
}

/// Address to location resolution. Implementations are shared by every
/// trace of the process and called one lookup at a time per trace.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, address: &str) -> Result<GeoRecord, LookupError>;
}
