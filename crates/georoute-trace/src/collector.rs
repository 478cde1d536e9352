use georoute_model::{CollectedHop, HopEvent, Latency, TIMEOUT_PLACEHOLDER};
use std::collections::HashSet;

const TIMED_OUT_MARKER: &str = "Request timed out";

/// Accumulates the hops of one trace in first-seen order, one per address.
#[derive(Debug, Default)]
pub struct HopCollector {
    seen: HashSet<String>,
    hops: Vec<CollectedHop>,
}

impl HopCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `event` unless its address is a placeholder or already seen.
    pub fn push(&mut self, event: &HopEvent) -> Option<&CollectedHop> {
        let address = event.address.trim();
        if is_placeholder(address) || !self.seen.insert(address.to_string()) {
            return None;
        }

        self.hops.push(CollectedHop {
            address: address.to_string(),
            latency: Latency::from_samples(&event.rtt_ms),
        });
        self.hops.last()
    }

    pub fn hops(&self) -> &[CollectedHop] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn finish(self) -> Vec<CollectedHop> {
        self.hops
    }
}

pub fn collect<I>(events: I) -> Vec<CollectedHop>
where
    I: IntoIterator<Item = HopEvent>,
{
    let mut collector = HopCollector::new();
    for event in events {
        collector.push(&event);
    }
    collector.finish()
}

pub fn is_placeholder(address: &str) -> bool {
    address.is_empty() || address == TIMEOUT_PLACEHOLDER || address.contains(TIMED_OUT_MARKER)
}
