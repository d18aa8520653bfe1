// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Options for configuring a `StatsdClient`.
//!
//! Every option is optional: `StatsdClient::configure` only changes what is
//! present and leaves everything else as it was. With the `serde` feature
//! enabled, `Options` can be read from any serde format, using either
//! `snake_case` names or the camelCase names `throwConnectionExceptions` and
//! `tagFormat`. The timeout is given in (possibly fractional) seconds.
//!
//! ```
//! use metronome::{Options, StatsdClient, TagFormat};
//!
//! let mut client = StatsdClient::new();
//! client
//!     .configure(
//!         Options::new()
//!             .host("metrics.example.com")
//!             .port(9125)
//!             .namespace("billing")
//!             .tag("env", "prod")
//!             .tag_format(TagFormat::InfluxDb),
//!     )
//!     .unwrap();
//!
//! assert_eq!("metrics.example.com", client.host());
//! assert_eq!(9125, client.port());
//! ```

use crate::tags::{TagFormat, Tags};
use crate::types::{MetricError, MetricResult};
use std::time::Duration;

/// Host used by clients that were never configured with one.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// A port as given in configuration, before validation.
///
/// Ports arrive from configuration files as arbitrary numbers or strings, so
/// they are only checked to be an integer in `0..=65535` when applied.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum PortValue {
    Number(f64),
    Text(String),
}

macro_rules! port_value_from {
    ($($source:ty),+) => {
        $(
            impl From<$source> for PortValue {
                fn from(v: $source) -> Self {
                    PortValue::Number(f64::from(v))
                }
            }
        )+
    };
}

port_value_from!(u8, u16, u32, i8, i16, i32, f32, f64);

impl From<i64> for PortValue {
    fn from(v: i64) -> Self {
        // any value this large is rejected anyway
        PortValue::Number(v as f64)
    }
}

impl From<u64> for PortValue {
    fn from(v: u64) -> Self {
        PortValue::Number(v as f64)
    }
}

impl From<&str> for PortValue {
    fn from(v: &str) -> Self {
        PortValue::Text(v.to_owned())
    }
}

impl From<String> for PortValue {
    fn from(v: String) -> Self {
        PortValue::Text(v)
    }
}

impl PortValue {
    pub(crate) fn validate(&self) -> MetricResult<u16> {
        match *self {
            PortValue::Number(n) if n.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&n) => Ok(n as u16),
            PortValue::Number(n) => Err(MetricError::configuration(format!(
                "port must be an integer between 0 and 65535, got {}",
                n
            ))),
            PortValue::Text(ref s) => Err(MetricError::configuration(format!(
                "port must be an integer between 0 and 65535, got '{}'",
                s
            ))),
        }
    }
}

/// A partial set of client options. See the module documentation.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Options {
    pub host: Option<String>,
    pub port: Option<PortValue>,
    pub namespace: Option<String>,
    #[cfg_attr(feature = "serde", serde(deserialize_with = "de::timeout_secs"))]
    pub timeout: Option<Duration>,
    #[cfg_attr(feature = "serde", serde(alias = "throwConnectionExceptions"))]
    pub throw_connection_errors: Option<bool>,
    pub tags: Option<Tags>,
    #[cfg_attr(feature = "serde", serde(alias = "tagFormat"))]
    pub tag_format: Option<String>,
}

impl Options {
    pub fn new() -> Self {
        Options::default()
    }

    #[must_use]
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port<P: Into<PortValue>>(mut self, port: P) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Prefix for every metric name. An empty namespace adds no prefix.
    #[must_use]
    pub fn namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Upper bound on connection setup (resolving the host).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether failing to open the socket is returned as an error (the
    /// default) or logged and ignored.
    #[must_use]
    pub fn throw_connection_errors(mut self, throw: bool) -> Self {
        self.throw_connection_errors = Some(throw);
        self
    }

    /// Replace the default tags sent with every metric.
    #[must_use]
    pub fn tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Add a key-value default tag, keeping any tags already set here.
    #[must_use]
    pub fn tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tags.get_or_insert_with(Tags::new).insert(key.into(), Some(value.into()));
        self
    }

    /// Add a default tag with only a key, keeping any tags already set here.
    #[must_use]
    pub fn bare_tag<K: Into<String>>(mut self, key: K) -> Self {
        self.tags.get_or_insert_with(Tags::new).insert(key.into(), None);
        self
    }

    #[must_use]
    pub fn tag_format(mut self, format: TagFormat) -> Self {
        self.tag_format = Some(format.as_str().to_owned());
        self
    }

    /// Set the tag format by name, deferring validation to `configure`.
    #[must_use]
    pub fn tag_format_name<S: Into<String>>(mut self, name: S) -> Self {
        self.tag_format = Some(name.into());
        self
    }

    /// Check every option that can be invalid, returning the parsed port
    /// and tag format.
    pub(crate) fn validate(&self) -> MetricResult<(Option<u16>, Option<TagFormat>)> {
        let port = self.port.as_ref().map(PortValue::validate).transpose()?;
        let format = self.tag_format.as_deref().map(str::parse::<TagFormat>).transpose()?;
        Ok((port, format))
    }
}

#[cfg(feature = "serde")]
mod de {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub(super) fn timeout_secs<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::{Options, PortValue};
    use crate::tags::TagFormat;
    use crate::types::ErrorKind;
    use std::time::Duration;

    #[test]
    fn test_port_value_valid() {
        assert_eq!(0, PortValue::from(0).validate().unwrap());
        assert_eq!(8125, PortValue::from(8125).validate().unwrap());
        assert_eq!(65535, PortValue::from(65535).validate().unwrap());
        assert_eq!(9000, PortValue::from(9000.0).validate().unwrap());
    }

    #[test]
    fn test_port_value_out_of_range() {
        for port in [-1i64, 65536, 100_000, i64::MIN] {
            let err = PortValue::from(port).validate().unwrap_err();
            assert_eq!(ErrorKind::Configuration, err.kind(), "port {}", port);
        }
    }

    #[test]
    fn test_port_value_not_an_integer() {
        for port in [8125.5, f64::NAN, f64::INFINITY] {
            assert!(PortValue::from(port).validate().is_err(), "port {}", port);
        }
        assert!(PortValue::from("8125").validate().is_err());
        assert!(PortValue::from("not a port").validate().is_err());
    }

    #[test]
    fn test_options_setters() {
        let opts = Options::new()
            .host("localhost")
            .port(9125)
            .namespace("app")
            .timeout(Duration::from_millis(250))
            .throw_connection_errors(false)
            .tag("env", "prod")
            .bare_tag("canary")
            .tag_format(TagFormat::Graphite);

        assert_eq!(Some("localhost"), opts.host.as_deref());
        assert_eq!(Some(PortValue::Number(9125.0)), opts.port);
        assert_eq!(Some("app"), opts.namespace.as_deref());
        assert_eq!(Some(Duration::from_millis(250)), opts.timeout);
        assert_eq!(Some(false), opts.throw_connection_errors);
        assert_eq!(Some("graphite"), opts.tag_format.as_deref());

        let tags = opts.tags.unwrap();
        assert_eq!(Some(&Some("prod".to_owned())), tags.get("env"));
        assert_eq!(Some(&None), tags.get("canary"));
    }

    #[test]
    fn test_options_validate_empty() {
        assert_eq!((None, None), Options::new().validate().unwrap());
    }

    #[test]
    fn test_options_validate_tag_format() {
        let (_, format) = Options::new().tag_format_name("signalfx").validate().unwrap();
        assert_eq!(Some(TagFormat::SignalFx), format);

        let err = Options::new().tag_format_name("statsite").validate().unwrap_err();
        assert_eq!(ErrorKind::Configuration, err.kind());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_options_deserialize_camel_case() {
        let opts: Options = serde_json::from_str(
            r#"{
                "host": "10.0.0.5",
                "port": 8126,
                "timeout": 0.5,
                "throwConnectionExceptions": false,
                "tags": {"env": "prod", "canary": null},
                "tagFormat": "datadog"
            }"#,
        )
        .unwrap();

        assert_eq!(Some("10.0.0.5"), opts.host.as_deref());
        assert_eq!(Some(PortValue::Number(8126.0)), opts.port);
        assert_eq!(None, opts.namespace);
        assert_eq!(Some(Duration::from_millis(500)), opts.timeout);
        assert_eq!(Some(false), opts.throw_connection_errors);
        assert_eq!(Some("datadog"), opts.tag_format.as_deref());

        let tags = opts.tags.unwrap();
        let keys: Vec<_> = tags.keys().map(String::as_str).collect();
        assert_eq!(vec!["env", "canary"], keys);
        assert_eq!(Some(&None), tags.get("canary"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_options_deserialize_string_port_rejected_on_validate() {
        let opts: Options = serde_json::from_str(r#"{"port": "eighty"}"#).unwrap();
        assert_eq!(Some(PortValue::Text("eighty".to_owned())), opts.port);
        assert_eq!(ErrorKind::Configuration, opts.validate().unwrap_err().kind());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_options_deserialize_fractional_port_rejected_on_validate() {
        let opts: Options = serde_json::from_str(r#"{"port": 8125.5}"#).unwrap();
        assert!(opts.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_options_deserialize_negative_timeout() {
        let res: Result<Options, _> = serde_json::from_str(r#"{"timeout": -1.0}"#);
        assert!(res.is_err());
    }
}
