// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A Statsd client for Rust that speaks several tag dialects!
//!
//! Statsd has no native support for tags, so the collectors that added them
//! each picked their own syntax. Metronome emits counters, gauges, sets, and
//! timers over UDP, with tags written in whichever syntax your collector
//! understands.
//!
//! ## Features
//!
//! * Counters, gauges, sets, and timers sent over UDP, one datagram per call.
//! * Tags in the Graphite, Telegraf/InfluxDB, Datadog, and SignalFx dialects.
//! * Default tags on the client, merged with tags given for each metric.
//! * Client-side sampling of counters.
//! * A socket opened lazily on the first metric sent and reused afterwards.
//!
//! ## Install
//!
//! To make use of `metronome` in your project, add it as a dependency in your
//! `Cargo.toml` file.
//!
//! ```toml
//! [dependencies]
//! metronome = "x.y.z"
//! ```
//!
//! Enable the `serde` feature to deserialize `Options` from configuration
//! files.
//!
//! ## Usage
//!
//! ### Simple Use
//!
//! Create a client, point it at your Statsd server, and send a few metrics.
//! No socket is opened until the first metric is sent.
//!
//! ```rust,no_run
//! use metronome::{Options, StatsdClient};
//!
//! let mut client = StatsdClient::from_options(
//!     Options::new().host("metrics.example.com").namespace("my.metrics"),
//! )
//! .unwrap();
//!
//! client.increment("some.counter").unwrap();
//! client.timing("some.methodCall", 42).unwrap();
//! client.gauge("some.thing", 7).unwrap();
//! client.set("some.users", "bob").unwrap();
//! ```
//!
//! ### Tags
//!
//! Choose a dialect with `TagFormat` and add tags to any metric with the
//! `*_with_tags` methods. Tags configured on the client are sent with every
//! metric; a tag given for one metric replaces a default tag with the same
//! key.
//!
//! ```rust,no_run
//! use metronome::{Options, StatsdClient, TagFormat};
//!
//! let mut client = StatsdClient::from_options(
//!     Options::new()
//!         .namespace("checkout")
//!         .tag("env", "prod")
//!         .tag_format(TagFormat::DataDog),
//! )
//! .unwrap();
//!
//! // checkout.orders:1|c|#env=prod,payment=card
//! client
//!     .increment_with_tags("orders")
//!     .with_tag("payment", "card")
//!     .send()
//!     .unwrap();
//! ```
//!
//! ### Sampling
//!
//! Busy counters can be sampled on the client. Each line is kept with the
//! given probability and tells the server the rate so it can scale counts
//! back up. Only counters are sampled.
//!
//! ```rust,no_run
//! use metronome::StatsdClient;
//!
//! let mut client = StatsdClient::new();
//! client
//!     .increment_with_tags("cache.lookups")
//!     .with_sample_rate(0.1)
//!     .send()
//!     .unwrap();
//! ```
//!
//! ### Timing
//!
//! ```rust,no_run
//! use metronome::StatsdClient;
//! use std::time::Duration;
//!
//! let mut client = StatsdClient::new();
//!
//! client.timing("db.query", Duration::from_micros(2500)).unwrap();
//!
//! client.start_timing("import");
//! // ... do the import ...
//! client.end_timing("import").unwrap();
//!
//! let rows = client.time("parse", || vec![1, 2, 3]).unwrap();
//! ```
//!
//! ### Connection Errors
//!
//! By default, failing to open the socket is returned as an error from the
//! call that tried to send. Clients that should never fail because of metrics
//! can log and drop them instead. Once the socket is open, write errors are
//! never returned: they are logged at debug level and counted in `stats()`.
//!
//! ```rust,no_run
//! use metronome::{Options, StatsdClient};
//!
//! let mut client = StatsdClient::from_options(
//!     Options::new()
//!         .host("host.invalid")
//!         .throw_connection_errors(false),
//! )
//! .unwrap();
//!
//! assert!(client.increment("some.counter").is_ok());
//! ```
//!
//! ### Testing
//!
//! `SpyConnector` captures every datagram a client sends so tests can assert
//! on them.
//!
//! ```rust
//! use metronome::{SpyConnector, StatsdClient};
//!
//! let (rx, connector) = SpyConnector::new();
//! let mut client = StatsdClient::with_connector(connector);
//!
//! client.count("items", 3).unwrap();
//! assert_eq!("items:3|c", rx.recv().unwrap());
//! ```
//!
//! ### Many Clients
//!
//! Applications that need several differently configured clients can keep
//! them in a `Registry`, which hands out the same shared client for a name.
//!
//! ```rust
//! use metronome::Registry;
//! use std::sync::Arc;
//!
//! let registry = Registry::new();
//! let a = registry.instance("payments");
//! let b = registry.instance("payments");
//! assert!(Arc::ptr_eq(&a, &b));
//! ```

#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

/// Port used by clients that were never configured with one.
pub const DEFAULT_PORT: u16 = 8125;

pub use self::builder::MetricBuilder;

pub use self::client::StatsdClient;

pub use self::config::{Options, PortValue, DEFAULT_HOST};

pub use self::registry::{ClientHandle, Registry};

pub use self::sinks::{
    ConnectCount, MetricSink, NopMetricSink, SinkStats, SpyConnector, SpyMetricSink, UdpConnector, UdpMetricSink,
};

pub use self::tags::{TagFormat, Tags};

pub use self::types::{ErrorKind, MetricError, MetricResult};

mod builder;
mod client;
mod config;
pub mod ext;
mod registry;
mod sinks;
mod tags;
mod types;

// Utilities for running integration tests with a local server
#[doc(hidden)]
pub mod test;
