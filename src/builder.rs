// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::client::StatsdClient;
use crate::tags::Tags;
use crate::types::{MetricError, MetricResult};
use std::fmt;
use std::time::Duration;

pub(crate) mod sampler;

/// Type of metric that knows how to display itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Timer,
    Gauge,
    Set,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricType::Counter => "c".fmt(f),
            MetricType::Timer => "ms".fmt(f),
            MetricType::Gauge => "g".fmt(f),
            MetricType::Set => "s".fmt(f),
        }
    }
}

/// Holder for metric values that knows how to display itself
///
/// Floats are written in their shortest form that round-trips, so `10.0`
/// goes out as `10` and `0.25` as `0.25`. Text values are written verbatim,
/// which is mostly useful for sets of identifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricValue::Signed(v) => v.fmt(f),
            MetricValue::Unsigned(v) => v.fmt(f),
            MetricValue::Float(v) => v.fmt(f),
            MetricValue::Text(ref v) => v.fmt(f),
        }
    }
}

macro_rules! metric_value_from {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for MetricValue {
                fn from(v: $source) -> Self {
                    MetricValue::$variant(<$target>::from(v))
                }
            }
        )+
    };
}

metric_value_from!(Signed, i64, i8, i16, i32, i64);
metric_value_from!(Unsigned, u64, u8, u16, u32, u64);
metric_value_from!(Float, f64, f32, f64);

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_owned())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

/// Durations become milliseconds, rounded to four decimal places.
impl From<Duration> for MetricValue {
    fn from(v: Duration) -> Self {
        MetricValue::Float(round_millis(v.as_secs_f64() * 1000.0))
    }
}

/// Round a number of milliseconds to four decimal places.
pub(crate) fn round_millis(ms: f64) -> f64 {
    (ms * 10_000.0).round() / 10_000.0
}

/// Conversion trait for one or more metric names.
///
/// Counters may be sent to several names in one call, each name producing
/// its own line in the same datagram. This trait lets those methods accept
/// either a single name or a collection of them.
///
/// Typical use of Metronome shouldn't require interacting with this trait.
pub trait MetricKeys {
    fn into_keys(self) -> Vec<String>;
}

impl MetricKeys for &str {
    fn into_keys(self) -> Vec<String> {
        vec![self.to_owned()]
    }
}

impl MetricKeys for String {
    fn into_keys(self) -> Vec<String> {
        vec![self]
    }
}

impl MetricKeys for &String {
    fn into_keys(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl<T> MetricKeys for Vec<T>
where
    T: Into<String>,
{
    fn into_keys(self) -> Vec<String> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T, const N: usize> MetricKeys for [T; N]
where
    T: Into<String>,
{
    fn into_keys(self) -> Vec<String> {
        self.into_iter().map(Into::into).collect()
    }
}

impl MetricKeys for &[&str] {
    fn into_keys(self) -> Vec<String> {
        self.iter().map(|k| (*k).to_owned()).collect()
    }
}

/// A metric that has been described but not yet sent.
#[derive(Debug)]
pub(crate) struct PendingMetric {
    pub(crate) type_: MetricType,
    pub(crate) keys: Vec<String>,
    pub(crate) value: MetricValue,
    pub(crate) sample_rate: Option<f64>,
    pub(crate) tags: Tags,
}

impl PendingMetric {
    pub(crate) fn new(type_: MetricType, keys: Vec<String>, value: MetricValue) -> Self {
        PendingMetric {
            type_,
            keys,
            value,
            sample_rate: None,
            tags: Tags::new(),
        }
    }

    /// The `value|type[|@rate]` portion of each line for this metric.
    pub(crate) fn value_string(&self) -> String {
        match self.sample_rate {
            Some(rate) if self.is_sampled() => format!("{}|{}|@{}", self.value, self.type_, rate),
            _ => format!("{}|{}", self.value, self.type_),
        }
    }

    /// Only counters are sampled and only at rates below one.
    pub(crate) fn is_sampled(&self) -> bool {
        self.type_ == MetricType::Counter && self.sample_rate.map_or(false, |rate| rate < 1.0)
    }
}

/// Internal state of a `MetricBuilder`
///
/// The builder can either be in the process of assembling a metric to send
/// via a client or it can be simply holding on to an error that it will
/// return when `.send()` is finally invoked.
#[derive(Debug)]
enum BuilderRepr<'c> {
    Success(PendingMetric, &'c mut StatsdClient),
    Error(MetricError, &'c mut StatsdClient),
}

/// Builder for adding tags and a sample rate to in-progress metrics.
///
/// Tags given here are merged over the default tags configured on the client:
/// a key present in both takes the value given here. They are written in the
/// dialect configured on the client.
///
/// NOTE: The only way to instantiate an instance of this builder is via the
/// `*_with_tags` methods of `StatsdClient`.
///
/// # Example
///
/// ```
/// use metronome::{Options, SpyConnector, StatsdClient, TagFormat};
///
/// let (rx, connector) = SpyConnector::new();
/// let mut client = StatsdClient::with_connector(connector);
/// client
///     .configure(Options::new().namespace("app").tag_format(TagFormat::DataDog))
///     .unwrap();
///
/// client
///     .count_with_tags("requests", 3)
///     .with_tag("route", "/login")
///     .with_bare_tag("canary")
///     .send()
///     .unwrap();
///
/// assert_eq!("app.requests:3|c|#route=/login,canary", rx.recv().unwrap());
/// ```
#[must_use = "Did you forget to call .send() after adding tags?"]
#[derive(Debug)]
pub struct MetricBuilder<'c> {
    repr: BuilderRepr<'c>,
}

impl<'c> MetricBuilder<'c> {
    pub(crate) fn from_metric(metric: PendingMetric, client: &'c mut StatsdClient) -> Self {
        MetricBuilder {
            repr: BuilderRepr::Success(metric, client),
        }
    }

    pub(crate) fn from_error(err: MetricError, client: &'c mut StatsdClient) -> Self {
        MetricBuilder {
            repr: BuilderRepr::Error(err, client),
        }
    }

    /// Add a key-value tag to this metric.
    pub fn with_tag<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        if let BuilderRepr::Success(ref mut metric, _) = self.repr {
            metric.tags.insert(key.into(), Some(value.into()));
        }
        self
    }

    /// Add a tag that consists only of a key.
    pub fn with_bare_tag<K>(mut self, key: K) -> Self
    where
        K: Into<String>,
    {
        if let BuilderRepr::Success(ref mut metric, _) = self.repr {
            metric.tags.insert(key.into(), None);
        }
        self
    }

    /// Add every tag from the given collection, in order.
    pub fn with_tags<I, K>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        if let BuilderRepr::Success(ref mut metric, _) = self.repr {
            metric.tags.extend(tags.into_iter().map(|(k, v)| (k.into(), v)));
        }
        self
    }

    /// Only send this metric with the given probability.
    ///
    /// Each name of the metric is kept or dropped independently. Kept lines
    /// carry the rate (`|@0.1`) so the server can scale the count back up.
    /// Rates of one or more send every line without the suffix. Only counters
    /// are sampled; the rate is ignored for other types of metrics.
    ///
    /// # Example
    ///
    /// ```
    /// use metronome::{SpyConnector, StatsdClient};
    ///
    /// let (rx, connector) = SpyConnector::new();
    /// let mut client = StatsdClient::with_connector(connector);
    ///
    /// client.increment_with_tags("always").with_sample_rate(1.0).send().unwrap();
    /// client.increment_with_tags("never").with_sample_rate(0.0).send().unwrap();
    ///
    /// assert_eq!(vec!["always:1|c".to_owned()], rx.try_iter().collect::<Vec<_>>());
    /// ```
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        if rate.is_nan() {
            return self.into_error(MetricError::invalid_input("sample rate must be a number"));
        }

        if let BuilderRepr::Success(ref mut metric, _) = self.repr {
            metric.sample_rate = Some(rate);
        }
        self
    }

    /// Send the metric using the client that created this builder, returning
    /// the client for chaining.
    ///
    /// Errors encountered while building the metric are returned here. Errors
    /// opening the socket are returned only if the client is configured to
    /// throw connection errors.
    pub fn send(self) -> MetricResult<&'c mut StatsdClient> {
        match self.repr {
            BuilderRepr::Error(err, client) => {
                debug!("not sending metric to {}:{}: {}", client.host(), client.port(), err);
                Err(err)
            }
            BuilderRepr::Success(metric, client) => {
                client.send_metric(metric)?;
                Ok(client)
            }
        }
    }

    // keeps the first error if there already is one
    fn into_error(self, err: MetricError) -> Self {
        match self.repr {
            BuilderRepr::Success(_, client) => MetricBuilder::from_error(err, client),
            BuilderRepr::Error(_, _) => self,
        }
    }
}
