//! Geolocation enrichment of collected hops.

pub mod enricher;
pub mod ip_api;
pub mod lookup;

pub use enricher::{
    enrich_record, Cancelled, GeoEnricher, GeoSettings, UNKNOWN_AS, UNKNOWN_COUNTRY, UNKNOWN_ISP,
    UNKNOWN_ORG,
};
pub use ip_api::{IpApiClient, DEFAULT_BASE_URL};
pub use lookup::{GeoLookup, GeoRecord, LookupError};
