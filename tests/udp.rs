use metronome::test::UdpServerHarness;
use metronome::{Options, StatsdClient, TagFormat};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod utils;
use utils::{run_shared_threaded_test, NUM_ITERATIONS, NUM_THREADS};

fn new_udp_client(addr: SocketAddr, options: Options) -> StatsdClient {
    let options = options.host(addr.ip().to_string()).port(addr.port());
    StatsdClient::from_options(options).unwrap()
}

#[test]
fn test_statsd_client_udp_single_datagram_per_call() {
    let received = UdpServerHarness::new().collect(|addr| {
        let mut client = new_udp_client(addr, Options::new().namespace("app"));
        client.increment(["a", "b"]).unwrap();
        client.gauge("c", 3).unwrap();
    });

    assert_eq!(vec!["app.a:1|c\napp.b:1|c", "app.c:3|g"], received);
}

#[test]
fn test_statsd_client_udp_dialects() {
    let received = UdpServerHarness::new().collect(|addr| {
        for format in [TagFormat::Graphite, TagFormat::InfluxDb, TagFormat::DataDog, TagFormat::SignalFx] {
            let mut client = new_udp_client(addr, Options::new().tag("env", "prod").tag_format(format));
            client
                .timing_with_tags("api.latency", 12.5)
                .with_bare_tag("canary")
                .send()
                .unwrap();
        }
    });

    assert_eq!(
        vec![
            "api.latency:12.5|ms;env=prod;canary",
            "api.latency,env=prod,canary:12.5|ms",
            "api.latency:12.5|ms|#env=prod,canary",
            "api.[env=prod,canary].latency:12.5|ms",
        ],
        received
    );
}

#[test]
fn test_statsd_client_udp_socket_reused() {
    let received = UdpServerHarness::new().collect(|addr| {
        let mut client = new_udp_client(addr, Options::new());
        for _ in 0..5 {
            client.increment("hits").unwrap();
        }

        assert!(client.is_connected());
        assert_eq!(5, client.stats().packets_sent);
    });

    assert_eq!(5, received.len());
}

#[test]
fn test_statsd_client_udp_reconfigure_moves_to_new_server() {
    let mut second = Vec::new();

    let first = UdpServerHarness::new().collect(|first_addr| {
        let mut client = new_udp_client(first_addr, Options::new());
        client.increment("before").unwrap();

        second = UdpServerHarness::new().collect(|second_addr| {
            client.configure(Options::new().port(second_addr.port())).unwrap();
            assert!(!client.is_connected());
            client.increment("after").unwrap();
        });
    });

    assert_eq!(vec!["before:1|c"], first);
    assert_eq!(vec!["after:1|c"], second);
}

#[test]
fn test_statsd_client_udp_with_timeout() {
    let received = UdpServerHarness::new().collect(|addr| {
        let mut client = new_udp_client(addr, Options::new().timeout(Duration::from_secs(5)));
        client.decrement("jobs").unwrap();
    });

    assert_eq!(vec!["jobs:-1|c"], received);
}

#[test]
fn test_statsd_client_udp_single_threaded() {
    UdpServerHarness::new().run_quiet(|addr| {
        let client = Arc::new(Mutex::new(new_udp_client(addr, Options::new().namespace("metronome"))));
        run_shared_threaded_test(client, 1, 1);
    });
}

#[ignore]
#[test]
fn test_statsd_client_udp_many_threaded() {
    UdpServerHarness::new().run_quiet(|addr| {
        let client = Arc::new(Mutex::new(new_udp_client(addr, Options::new().namespace("metronome"))));
        run_shared_threaded_test(client, NUM_THREADS, NUM_ITERATIONS);
    });
}
