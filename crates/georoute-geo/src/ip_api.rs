use crate::lookup::{GeoLookup, GeoRecord, LookupError};
use async_trait::async_trait;

pub const DEFAULT_BASE_URL: &str = "http://ip-api.com";

const USER_AGENT: &str = concat!("georoute/", env!("CARGO_PKG_VERSION"));

/// ip-api.com JSON client (`GET {base}/json/{address}`).
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct IpApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl IpApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, address: &str) -> String {
        format!("{}/json/{}", self.base_url, address)
    }
}

#[async_trait]
impl GeoLookup for IpApiClient {
    async fn lookup(&self, address: &str) -> Result<GeoRecord, LookupError> {
        let resp = self.client.get(self.url(address)).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
