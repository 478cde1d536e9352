use anyhow::{Context, Result};
use clap::Args;
use georoute_geo::{GeoEnricher, GeoSettings, IpApiClient, DEFAULT_BASE_URL};
use georoute_pipeline::{Pipeline, PipelineSettings, DEFAULT_TARGET};
use georoute_trace::{HopSource, TraceSettings};
use std::sync::Arc;
use std::time::Duration;

/// Options shared by every subcommand that runs traces.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// traceroute executable to run
    #[arg(long, env = "GEOROUTE_TRACEROUTE", default_value = "traceroute")]
    pub traceroute: String,

    #[arg(long, env = "GEOROUTE_MAX_HOPS", default_value_t = 30)]
    pub max_hops: u32,

    #[arg(long, env = "GEOROUTE_PROBES", default_value_t = 3)]
    pub probes: u32,

    /// Per-probe wait, rounded up to whole seconds
    #[arg(long, env = "GEOROUTE_PROBE_TIMEOUT_MS", default_value_t = 2000)]
    pub probe_timeout_ms: u64,

    /// Base URL of the ip-api compatible geolocation service
    #[arg(long, env = "GEOROUTE_GEO_URL", default_value = DEFAULT_BASE_URL)]
    pub geo_url: String,

    #[arg(long, env = "GEOROUTE_LOOKUP_TIMEOUT_MS", default_value_t = 5000)]
    pub lookup_timeout_ms: u64,

    /// Minimum spacing between geolocation lookups (0 disables)
    #[arg(long, env = "GEOROUTE_LOOKUP_INTERVAL_MS", default_value_t = 0)]
    pub lookup_interval_ms: u64,

    /// Target used when a request names none
    #[arg(long, env = "GEOROUTE_DEFAULT_TARGET", default_value = DEFAULT_TARGET)]
    pub default_target: String,

    /// Fail traces whose traceroute exits with a non-zero status
    #[arg(long, env = "GEOROUTE_STRICT_EXIT")]
    pub strict_exit: bool,
}

/// Settings for every pipeline component, derived from the CLI.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub trace: TraceSettings,
    pub geo: GeoSettings,
    pub pipeline: PipelineSettings,
}

impl From<&PipelineArgs> for AppConfig {
    fn from(args: &PipelineArgs) -> Self {
        let min_interval = (args.lookup_interval_ms > 0)
            .then(|| Duration::from_millis(args.lookup_interval_ms));

        Self {
            trace: TraceSettings {
                program: args.traceroute.clone(),
                max_hops: args.max_hops,
                probes: args.probes,
                timeout_ms: args.probe_timeout_ms,
            },
            geo: GeoSettings {
                base_url: args.geo_url.clone(),
                timeout: Duration::from_millis(args.lookup_timeout_ms),
                min_interval,
            },
            pipeline: PipelineSettings {
                default_target: args.default_target.clone(),
                strict_exit: args.strict_exit,
            },
        }
    }
}

impl AppConfig {
    /// Wires `source` to the shared geolocation client.
    pub fn build_pipeline(&self, source: Arc<dyn HopSource>) -> Result<Pipeline> {
        let client = IpApiClient::new(&self.geo.base_url)
            .context("failed to build geolocation client")?;
        let enricher = GeoEnricher::new(Arc::new(client), &self.geo);
        Ok(Pipeline::new(source, enricher, self.pipeline.clone()))
    }
}
