// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::builder::sampler::{default_sampler, keep, Sampler};
use crate::builder::{round_millis, MetricBuilder, MetricKeys, MetricType, MetricValue, PendingMetric};
use crate::config::{Options, DEFAULT_HOST};
use crate::sinks::{Connection, Connector, Endpoint, SinkStats, UdpConnector};
use crate::tags::{format_line, merge_tags, serialize_tags, TagFormat, Tags};
use crate::types::{MetricError, MetricResult};
use crate::DEFAULT_PORT;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};

/// Milliseconds between two instants, rounded to four decimal places.
pub(crate) fn elapsed_millis(start: Instant, end: Instant) -> f64 {
    round_millis(end.saturating_duration_since(start).as_secs_f64() * 1000.0)
}

/// Client for Statsd that formats metrics in one of several tag dialects and
/// sends them over UDP.
///
/// # Sending
///
/// Every method that emits metrics sends exactly one datagram, right away, in
/// the thread of the caller. Methods that accept several names put one line
/// per name in that datagram. Nothing is ever buffered across calls.
///
/// The socket is opened the first time a metric is actually sent, not when
/// the client is created or configured, and then reused for the life of the
/// client or until `close()` is called.
///
/// # Errors
///
/// If the socket can't be opened the send fails with `MetricError::Connection`,
/// unless the client was configured not to throw connection errors, in which
/// case a warning is logged and the metric is dropped. Once the socket is
/// open, writes are fire-and-forget: a failed write is logged at debug level,
/// counted in `stats()`, and otherwise ignored.
///
/// # Threading
///
/// Methods take `&mut self`. To share a client between threads, wrap it in a
/// `Mutex`, or use a `Registry` which hands out `Arc<Mutex<StatsdClient>>`.
///
/// # Example
///
/// ```
/// use metronome::{Options, SpyConnector, StatsdClient, TagFormat};
///
/// let (rx, connector) = SpyConnector::new();
/// let mut client = StatsdClient::with_connector(connector);
/// client
///     .configure(
///         Options::new()
///             .namespace("app")
///             .tag("env", "prod")
///             .tag_format(TagFormat::InfluxDb),
///     )
///     .unwrap();
///
/// client.increment("requests").unwrap().gauge("memory", 512).unwrap();
///
/// assert_eq!("app.requests,env=prod:1|c", rx.recv().unwrap());
/// assert_eq!("app.memory,env=prod:512|g", rx.recv().unwrap());
/// ```
pub struct StatsdClient {
    endpoint: Endpoint,
    namespace: String,
    tag_format: Option<TagFormat>,
    tags: Tags,
    throw_connection_errors: bool,
    last_message: String,
    connection: Connection,
    sampler: Box<dyn Sampler + Send>,
    timings: HashMap<String, Instant>,
}

impl StatsdClient {
    /// Create a client with default options that sends to `127.0.0.1:8125`
    /// over UDP.
    pub fn new() -> Self {
        Self::with_connector(UdpConnector)
    }

    /// Create a client with default options that opens its sink with the
    /// given connector instead of a UDP socket.
    pub fn with_connector<C>(connector: C) -> Self
    where
        C: Connector + Send + 'static,
    {
        StatsdClient {
            endpoint: Endpoint {
                host: DEFAULT_HOST.to_owned(),
                port: DEFAULT_PORT,
                timeout: None,
            },
            namespace: String::new(),
            tag_format: None,
            tags: Tags::new(),
            throw_connection_errors: true,
            last_message: String::new(),
            connection: Connection::new(connector),
            sampler: Box::new(default_sampler()),
            timings: HashMap::new(),
        }
    }

    /// Create a UDP client and apply the given options to it.
    pub fn from_options(options: Options) -> MetricResult<Self> {
        let mut client = Self::new();
        client.configure(options)?;
        Ok(client)
    }

    /// Replace the source of randomness used to sample counters.
    ///
    /// # Example
    ///
    /// ```
    /// use metronome::{SpyConnector, StatsdClient};
    /// use rand::rngs::StdRng;
    /// use rand::SeedableRng;
    ///
    /// let (_rx, connector) = SpyConnector::new();
    /// let client = StatsdClient::with_connector(connector).with_sampler(StdRng::seed_from_u64(7));
    /// ```
    #[must_use]
    pub fn with_sampler<S>(mut self, sampler: S) -> Self
    where
        S: Sampler + Send + 'static,
    {
        self.sampler = Box::new(sampler);
        self
    }

    /// Apply every option present in `options`, leaving the others untouched.
    ///
    /// All options are validated before any of them is applied, so on error
    /// the client is unchanged. Changing the host, port, or timeout of a client
    /// with an open socket closes it; the next send opens a new one.
    ///
    /// # Failures
    ///
    /// Fails with `MetricError::Configuration` if:
    ///
    /// * The port is not an integer between 0 and 65535.
    /// * The tag format is not one of the recognized dialects.
    pub fn configure(&mut self, options: Options) -> MetricResult<&mut Self> {
        let (port, tag_format) = options.validate()?;
        let previous = self.endpoint.clone();

        if let Some(host) = options.host {
            self.endpoint.host = host;
        }
        if let Some(port) = port {
            self.endpoint.port = port;
        }
        if let Some(timeout) = options.timeout {
            self.endpoint.timeout = Some(timeout);
        }
        if let Some(namespace) = options.namespace {
            self.namespace = namespace;
        }
        if let Some(throw) = options.throw_connection_errors {
            self.throw_connection_errors = throw;
        }
        if let Some(tags) = options.tags {
            self.tags = tags;
        }
        if tag_format.is_some() {
            self.tag_format = tag_format;
        }

        if self.endpoint != previous && self.connection.close() {
            debug!(
                "closed metrics socket to {}:{} after reconfiguration",
                previous.host, previous.port
            );
        }

        Ok(self)
    }

    pub fn host(&self) -> &str {
        &self.endpoint.host
    }

    pub fn port(&self) -> u16 {
        self.endpoint.port
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.endpoint.timeout
    }

    /// The configured dialect, `None` for the default one.
    pub fn tag_format(&self) -> Option<TagFormat> {
        self.tag_format
    }

    /// Tags sent with every metric.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn throws_connection_errors(&self) -> bool {
        self.throw_connection_errors
    }

    /// The most recent datagram this client tried to send, even if sending
    /// it failed. Empty until something is sent.
    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    /// Whether the socket has been opened (and not closed since).
    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    /// I/O counters of the open socket, zeros if there isn't one.
    pub fn stats(&self) -> SinkStats {
        self.connection.stats()
    }

    /// Flush the open socket, if any.
    pub fn flush(&self) -> io::Result<()> {
        self.connection.flush()
    }

    /// Release the socket, returning `true` if one was open.
    ///
    /// The client stays usable: the next send opens a new socket.
    pub fn close(&mut self) -> bool {
        self.connection.close()
    }

    /// Increment each of the given counters by one.
    pub fn increment<K: MetricKeys>(&mut self, keys: K) -> MetricResult<&mut Self> {
        self.count_with_tags(keys, 1).send()
    }

    /// Increment counters by one, with tags or a sample rate.
    pub fn increment_with_tags<K: MetricKeys>(&mut self, keys: K) -> MetricBuilder<'_> {
        self.count_with_tags(keys, 1)
    }

    /// Decrement each of the given counters by one.
    pub fn decrement<K: MetricKeys>(&mut self, keys: K) -> MetricResult<&mut Self> {
        self.count_with_tags(keys, -1).send()
    }

    /// Decrement counters by one, with tags or a sample rate.
    pub fn decrement_with_tags<K: MetricKeys>(&mut self, keys: K) -> MetricBuilder<'_> {
        self.count_with_tags(keys, -1)
    }

    /// Add `delta` (which may be negative) to each of the given counters.
    pub fn count<K: MetricKeys>(&mut self, keys: K, delta: i64) -> MetricResult<&mut Self> {
        self.count_with_tags(keys, delta).send()
    }

    /// Add `delta` to counters, with tags or a sample rate.
    ///
    /// # Example
    ///
    /// ```
    /// use metronome::{SpyConnector, StatsdClient};
    ///
    /// let (rx, connector) = SpyConnector::new();
    /// let mut client = StatsdClient::with_connector(connector);
    ///
    /// client.count_with_tags(["cache.hits", "cache.lookups"], 2).with_tag("tier", "l1").send().unwrap();
    /// assert_eq!("cache.hits:2|c|#tier:l1\ncache.lookups:2|c|#tier:l1", rx.recv().unwrap());
    /// ```
    pub fn count_with_tags<K: MetricKeys>(&mut self, keys: K, delta: i64) -> MetricBuilder<'_> {
        let metric = PendingMetric::new(MetricType::Counter, keys.into_keys(), MetricValue::Signed(delta));
        MetricBuilder::from_metric(metric, self)
    }

    /// Decrement counters by `delta`, with tags or a sample rate.
    ///
    /// `i64::MIN` has no positive counterpart and is `InvalidInput`.
    pub fn decrement_by_with_tags<K: MetricKeys>(&mut self, keys: K, delta: i64) -> MetricBuilder<'_> {
        match delta.checked_neg() {
            Some(negated) => self.count_with_tags(keys, negated),
            None => MetricBuilder::from_error(MetricError::invalid_input("decrement is too large to negate"), self),
        }
    }

    pub fn gauge<V: Into<MetricValue>>(&mut self, key: &str, value: V) -> MetricResult<&mut Self> {
        self.gauge_with_tags(key, value).send()
    }

    pub fn gauge_with_tags<V: Into<MetricValue>>(&mut self, key: &str, value: V) -> MetricBuilder<'_> {
        let metric = PendingMetric::new(MetricType::Gauge, key.into_keys(), value.into());
        MetricBuilder::from_metric(metric, self)
    }

    /// Record an occurrence of `value` in a set. Counting unique values is
    /// left to the server.
    pub fn set<V: Into<MetricValue>>(&mut self, key: &str, value: V) -> MetricResult<&mut Self> {
        self.set_with_tags(key, value).send()
    }

    pub fn set_with_tags<V: Into<MetricValue>>(&mut self, key: &str, value: V) -> MetricBuilder<'_> {
        let metric = PendingMetric::new(MetricType::Set, key.into_keys(), value.into());
        MetricBuilder::from_metric(metric, self)
    }

    /// Record a timing in milliseconds. A `Duration` is converted to
    /// milliseconds rounded to four decimal places.
    pub fn timing<V: Into<MetricValue>>(&mut self, key: &str, ms: V) -> MetricResult<&mut Self> {
        self.timing_with_tags(key, ms).send()
    }

    pub fn timing_with_tags<V: Into<MetricValue>>(&mut self, key: &str, ms: V) -> MetricBuilder<'_> {
        let metric = PendingMetric::new(MetricType::Timer, key.into_keys(), ms.into());
        MetricBuilder::from_metric(metric, self)
    }

    /// Send several timings, already in milliseconds, in one datagram. Only
    /// the default tags of the client are attached.
    ///
    /// # Example
    ///
    /// ```
    /// use metronome::{SpyConnector, StatsdClient};
    ///
    /// let (rx, connector) = SpyConnector::new();
    /// let mut client = StatsdClient::with_connector(connector);
    ///
    /// client.timings([("db.query", 12.5), ("db.connect", 3.0)]).unwrap();
    /// assert_eq!("db.query:12.5|ms\ndb.connect:3|ms", rx.recv().unwrap());
    /// ```
    pub fn timings<I, K, V>(&mut self, timings: I) -> MetricResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MetricValue>,
    {
        let data: Vec<(String, String)> = timings
            .into_iter()
            .map(|(k, v)| {
                let value: MetricValue = v.into();
                (k.into(), format!("{}|{}", value, MetricType::Timer))
            })
            .collect();

        self.send(data, &Tags::new())
    }

    /// Remember the current instant as the start of the timing `key`.
    ///
    /// Starting a key that is already started restarts it.
    pub fn start_timing(&mut self, key: &str) -> &mut Self {
        self.timings.insert(key.to_owned(), Instant::now());
        self
    }

    /// Send the milliseconds elapsed since `start_timing(key)`.
    ///
    /// The start is kept, so calling this again measures from the same start
    /// and `start_timing` may be called again to reuse the key.
    ///
    /// # Failures
    ///
    /// Fails with `MetricError::TimingNotStarted` if `key` was never started.
    pub fn end_timing(&mut self, key: &str) -> MetricResult<&mut Self> {
        self.end_timing_with_tags(key).send()
    }

    pub fn end_timing_with_tags(&mut self, key: &str) -> MetricBuilder<'_> {
        match self.timings.get(key) {
            Some(&start) => {
                let elapsed = elapsed_millis(start, Instant::now());
                self.timing_with_tags(key, elapsed)
            }
            None => {
                let err = MetricError::TimingNotStarted { key: key.to_owned() };
                MetricBuilder::from_error(err, self)
            }
        }
    }

    /// Run `f`, send how long it took, and return what it returned.
    ///
    /// If `f` panics the panic propagates and nothing is sent. If sending the
    /// timing fails, the error is returned and the value `f` returned is
    /// dropped. Callers that need the value regardless should time `f`
    /// themselves and send it with `timing`.
    ///
    /// # Example
    ///
    /// ```
    /// use metronome::{SpyConnector, StatsdClient};
    ///
    /// let (rx, connector) = SpyConnector::new();
    /// let mut client = StatsdClient::with_connector(connector);
    ///
    /// let sum = client.time("sum.time", || (1..=10).sum::<u32>()).unwrap();
    /// assert_eq!(55, sum);
    /// assert!(rx.recv().unwrap().starts_with("sum.time:"));
    /// ```
    pub fn time<F, T>(&mut self, key: &str, f: F) -> MetricResult<T>
    where
        F: FnOnce() -> T,
    {
        self.time_with_tags(key, &Tags::new(), f)
    }

    /// Like `time`, with tags for the timing.
    pub fn time_with_tags<F, T>(&mut self, key: &str, tags: &Tags, f: F) -> MetricResult<T>
    where
        F: FnOnce() -> T,
    {
        let start = Instant::now();
        let out = f();
        let elapsed = elapsed_millis(start, Instant::now());

        self.timing_with_tags(key, elapsed).with_tags(tags.clone()).send()?;
        Ok(out)
    }

    /// Run a fallible `f`, sending how long it took only if it succeeded.
    ///
    /// Errors from `f` are returned as-is and nothing is sent.
    pub fn try_time<F, T, E>(&mut self, key: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<MetricError>,
    {
        let start = Instant::now();
        let out = f()?;
        let elapsed = elapsed_millis(start, Instant::now());

        self.timing(key, elapsed)?;
        Ok(out)
    }

    /// Send pre-formatted `(name, "value|type")` pairs as one datagram.
    ///
    /// The default tags are merged with `tags`, the namespace is prepended to
    /// each name, and the tags are placed according to the configured dialect.
    /// Sending no pairs does nothing.
    ///
    /// This is the building block of every other method that sends metrics
    /// and is only needed to send something those methods can't express.
    ///
    /// # Example
    ///
    /// ```
    /// use metronome::{Options, SpyConnector, StatsdClient, TagFormat, Tags};
    ///
    /// let (rx, connector) = SpyConnector::new();
    /// let mut client = StatsdClient::with_connector(connector);
    /// client.configure(Options::new().tag_format(TagFormat::Graphite)).unwrap();
    ///
    /// let mut tags = Tags::new();
    /// tags.insert("shard".to_owned(), Some("3".to_owned()));
    ///
    /// client.send(vec![("queue.depth".to_owned(), "17|h".to_owned())], &tags).unwrap();
    /// assert_eq!("queue.depth:17|h;shard=3", rx.recv().unwrap());
    /// ```
    pub fn send(&mut self, data: Vec<(String, String)>, tags: &Tags) -> MetricResult<&mut Self> {
        if data.is_empty() {
            return Ok(self);
        }

        let merged = merge_tags(&self.tags, tags);
        let fragment = serialize_tags(self.tag_format, &merged);
        let prefix = self.prefix();

        let lines: Vec<String> = data
            .iter()
            .map(|(key, value)| format_line(self.tag_format, &prefix, key, &fragment, value))
            .collect();
        self.last_message = lines.join("\n");

        let sink = match self.connection.open(&self.endpoint) {
            Ok(sink) => sink,
            Err(source) if self.throw_connection_errors => {
                return Err(MetricError::Connection {
                    host: self.endpoint.host.clone(),
                    port: self.endpoint.port,
                    source,
                });
            }
            Err(e) => {
                warn!(
                    "unable to open metrics socket to {}:{}, dropping metrics: {}",
                    self.endpoint.host, self.endpoint.port, e
                );
                return Ok(self);
            }
        };

        if let Err(e) = sink.emit(&self.last_message).and_then(|_| sink.flush()) {
            debug!(
                "failed to write metrics to {}:{}: {}",
                self.endpoint.host, self.endpoint.port, e
            );
        }

        Ok(self)
    }

    pub(crate) fn send_metric(&mut self, metric: PendingMetric) -> MetricResult<()> {
        let value = metric.value_string();
        let data: Vec<(String, String)> = if metric.is_sampled() {
            let rate = metric.sample_rate.unwrap_or(1.0);
            let sampler = &mut self.sampler;
            metric
                .keys
                .into_iter()
                .filter(|_| keep(rate, sampler.draw()))
                .map(|key| (key, value.clone()))
                .collect()
        } else {
            metric.keys.into_iter().map(|key| (key, value.clone())).collect()
        };

        self.send(data, &metric.tags)?;
        Ok(())
    }

    fn prefix(&self) -> String {
        if self.namespace.is_empty() {
            String::new()
        } else {
            format!("{}.", self.namespace)
        }
    }
}

impl Default for StatsdClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatsdClient {{ endpoint: {:?}, namespace: {:?}, tag_format: {:?}, tags: {:?}, connection: {:?}, sampler: ... }}",
            self.endpoint, self.namespace, self.tag_format, self.tags, self.connection,
        )
    }
}
