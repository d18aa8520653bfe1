use metronome::test::FailingConnector;
use metronome::{ErrorKind, MetricError, Options, Registry, SpyConnector, StatsdClient, TagFormat, Tags};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

mod utils;
use utils::{run_shared_threaded_test, NUM_ITERATIONS, NUM_THREADS};

fn tags(pairs: &[(&str, Option<&str>)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.map(str::to_owned)))
        .collect()
}

#[test]
fn test_statsd_client_spy_default_tags_and_call_tags() {
    let (rx, connector) = SpyConnector::new();
    let mut client = StatsdClient::with_connector(connector);
    client
        .configure(
            Options::new()
                .namespace("shop")
                .tags(tags(&[("env", Some("staging")), ("dc", Some("ams1"))])),
        )
        .unwrap();

    client
        .increment_with_tags("orders")
        .with_tags(tags(&[("env", Some("prod")), ("beta", None)]))
        .send()
        .unwrap();

    assert_eq!("shop.orders:1|c|#env:prod,dc:ams1,beta", rx.recv().unwrap());
}

#[test]
fn test_statsd_client_spy_last_message_tracks_datagram() {
    let (rx, connector) = SpyConnector::new();
    let mut client = StatsdClient::with_connector(connector);
    client.configure(Options::new().tag_format(TagFormat::Telegraf)).unwrap();

    client
        .count_with_tags(vec!["a", "b"], 7)
        .with_tag("host", "web01")
        .send()
        .unwrap();

    let datagram = rx.recv().unwrap();
    assert_eq!("a,host=web01:7|c\nb,host=web01:7|c", datagram);
    assert_eq!(datagram, client.last_message());
}

#[test]
fn test_statsd_client_spy_seeded_sampling_is_reproducible() {
    fn sample_run(seed: u64) -> Vec<String> {
        let (rx, connector) = SpyConnector::new();
        let mut client = StatsdClient::with_connector(connector).with_sampler(ChaCha8Rng::seed_from_u64(seed));
        for _ in 0..200 {
            client
                .increment_with_tags("sampled")
                .with_sample_rate(0.25)
                .send()
                .unwrap();
        }
        rx.try_iter().collect()
    }

    let first = sample_run(42);
    let second = sample_run(42);

    assert_eq!(first, second);
    assert!(!first.is_empty());
    assert!(first.len() < 200);
    assert!(first.iter().all(|d| d == "sampled:1|c|@0.25"));
}

#[test]
fn test_statsd_client_spy_timing_lifecycle() {
    let (rx, connector) = SpyConnector::new();
    let mut client = StatsdClient::with_connector(connector);

    let err = client.end_timing("import").unwrap_err();
    assert!(matches!(err, MetricError::TimingNotStarted { ref key } if key == "import"));

    client.start_timing("import").end_timing("import").unwrap();
    assert!(rx.recv().unwrap().starts_with("import:"));
}

#[test]
fn test_statsd_client_connection_error_policy() {
    let mut throwing = StatsdClient::with_connector(FailingConnector);
    let err = throwing.gauge("g", 1).unwrap_err();
    assert_eq!(ErrorKind::Connection, err.kind());
    assert!(matches!(err, MetricError::Connection { port: 8125, .. }));

    let mut quiet = StatsdClient::with_connector(FailingConnector);
    quiet.configure(Options::new().throw_connection_errors(false)).unwrap();
    assert!(quiet.gauge("g", 1).is_ok());
    assert!(!quiet.is_connected());
}

#[test]
fn test_registry_hands_out_shared_clients() {
    let registry = Registry::new();
    let (rx, connector) = SpyConnector::new();

    let client = registry.instance_with("orders", || StatsdClient::with_connector(connector));
    client
        .lock()
        .unwrap()
        .configure(Options::new().namespace("orders"))
        .unwrap();

    let same = registry.instance("orders");
    assert!(Arc::ptr_eq(&client, &same));
    same.lock().unwrap().increment("created").unwrap();

    assert_eq!("orders.created:1|c", rx.recv().unwrap());
    assert_eq!(vec!["orders".to_owned()], registry.names());
}

#[test]
fn test_statsd_client_spy_single_threaded() {
    let registry = Registry::new();
    let (rx, connector) = SpyConnector::new();
    let client = registry.instance_with("spy", || StatsdClient::with_connector(connector));

    run_shared_threaded_test(client, 1, 1);
    assert_eq!(5, rx.try_iter().count());
}

#[ignore]
#[test]
fn test_statsd_client_spy_many_threaded() {
    let registry = Registry::new();
    let (rx, connector) = SpyConnector::new();
    let client = registry.instance_with("spy", || StatsdClient::with_connector(connector));

    run_shared_threaded_test(client, NUM_THREADS, NUM_ITERATIONS);
    assert_eq!((NUM_THREADS * NUM_ITERATIONS * 5) as usize, rx.try_iter().count());
}
