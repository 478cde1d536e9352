use async_trait::async_trait;
use georoute_geo::{Cancelled, GeoEnricher, GeoLookup, GeoRecord, GeoSettings, LookupError};
use georoute_model::{CollectedHop, Latency};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
enum Answer {
    Found(f64, f64),
    Failed,
    Hang,
}

#[derive(Default)]
struct FakeLookup {
    answers: HashMap<String, Answer>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeLookup {
    fn new(answers: &[(&str, Answer)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(address, answer)| (address.to_string(), answer.clone()))
                .collect(),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GeoLookup for FakeLookup {
    async fn lookup(&self, address: &str) -> Result<GeoRecord, LookupError> {
        self.calls.lock().unwrap().push(address.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let answer = self.answers.get(address).cloned().unwrap_or(Answer::Failed);
        let result = match answer {
            Answer::Found(lat, lon) => Ok(GeoRecord {
                status: "success".to_string(),
                country: Some("Netherlands".to_string()),
                city: Some("Amsterdam".to_string()),
                lat: Some(lat),
                lon: Some(lon),
                ..GeoRecord::default()
            }),
            Answer::Failed => Err(LookupError::Status(503)),
            Answer::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(LookupError::Status(504))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn hop(address: &str, latency: f64) -> CollectedHop {
    CollectedHop {
        address: address.to_string(),
        latency: Latency::Millis(latency),
    }
}

fn enricher(lookup: Arc<FakeLookup>, settings: GeoSettings) -> GeoEnricher {
    GeoEnricher::new(lookup, &settings)
}

#[tokio::test(start_paused = true)]
async fn lookups_run_one_at_a_time_in_order() {
    let lookup = Arc::new(FakeLookup::new(&[
        ("192.0.2.1", Answer::Found(52.37, 4.89)),
        ("192.0.2.2", Answer::Failed),
        ("192.0.2.3", Answer::Found(52.37, 4.90)),
    ]));
    let hops = vec![hop("192.0.2.1", 1.0), hop("192.0.2.2", 2.0), hop("192.0.2.3", 3.0)];

    let enriched = enricher(lookup.clone(), GeoSettings::default())
        .enrich_all(&hops, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(lookup.calls(), vec!["192.0.2.1", "192.0.2.2", "192.0.2.3"]);
    assert_eq!(lookup.max_in_flight.load(Ordering::SeqCst), 1);

    assert_eq!(enriched.len(), 3);
    assert_eq!(enriched[0].as_ref().unwrap().name, "Amsterdam, Netherlands");
    assert!(enriched[1].is_none());
    assert_eq!(enriched[2].as_ref().unwrap().latency, Latency::Millis(3.0));
}

#[tokio::test(start_paused = true)]
async fn timed_out_lookup_drops_only_that_hop() {
    let lookup = Arc::new(FakeLookup::new(&[
        ("192.0.2.1", Answer::Hang),
        ("192.0.2.2", Answer::Found(48.85, 2.35)),
    ]));
    let settings = GeoSettings {
        timeout: Duration::from_secs(5),
        ..GeoSettings::default()
    };

    let started = Instant::now();
    let enriched = enricher(lookup, settings)
        .enrich_all(
            &[hop("192.0.2.1", 1.0), hop("192.0.2.2", 2.0)],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(enriched[0].is_none());
    assert!(enriched[1].is_some());
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn min_interval_spaces_lookups() {
    let lookup = Arc::new(FakeLookup::new(&[]));
    let settings = GeoSettings {
        min_interval: Some(Duration::from_secs(1)),
        ..GeoSettings::default()
    };
    let hops = vec![hop("192.0.2.1", 1.0), hop("192.0.2.2", 1.0), hop("192.0.2.3", 1.0)];

    let started = Instant::now();
    enricher(lookup.clone(), settings)
        .enrich_all(&hops, &CancellationToken::new())
        .await
        .unwrap();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
    assert_eq!(lookup.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_pending_lookup() {
    let lookup = Arc::new(FakeLookup::new(&[("192.0.2.1", Answer::Hang)]));
    let settings = GeoSettings {
        timeout: Duration::from_secs(30),
        ..GeoSettings::default()
    };
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let result = enricher(lookup.clone(), settings)
        .enrich_all(&[hop("192.0.2.1", 1.0), hop("192.0.2.2", 1.0)], &cancel)
        .await;

    assert_eq!(result, Err(Cancelled));
    assert_eq!(lookup.calls(), vec!["192.0.2.1"]);
}

#[tokio::test]
async fn cancelled_token_skips_the_lookup() {
    let lookup = Arc::new(FakeLookup::new(&[("192.0.2.1", Answer::Found(1.0, 1.0))]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = enricher(lookup.clone(), GeoSettings::default())
        .enrich(&hop("192.0.2.1", 1.0), &cancel)
        .await;

    assert_eq!(result, Err(Cancelled));
    assert!(lookup.calls().is_empty());
}
