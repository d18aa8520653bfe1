// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tag dialects and the placement of tags within a metric line.
//!
//! Statsd itself has no notion of tags, so each collector that supports them
//! invented its own way of embedding them in a line. Metronome supports the
//! conventions below, where `env=prod` and a bare `canary` tag are attached
//! to `app.requests:1|c`:
//!
//! ``` text
//! graphite      app.requests:1|c;env=prod;canary
//! telegraf      app.requests,env=prod,canary:1|c
//! influxdb      app.requests,env=prod,canary:1|c
//! signalfx      app.[env=prod,canary].requests:1|c
//! datadog       app.requests:1|c|#env=prod,canary
//! (unset)       app.requests:1|c|#env:prod,canary
//! ```

use crate::types::MetricError;
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

/// Tags attached to a metric, in insertion order.
///
/// A `None` value produces a bare tag consisting of only the key.
pub type Tags = IndexMap<String, Option<String>>;

/// Tag dialect understood by a particular Statsd collector.
///
/// When no format is configured on a client, a default dialect is used that
/// resembles Datadog tags but separates keys and values with `:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TagFormat {
    Graphite,
    Telegraf,
    InfluxDb,
    DataDog,
    SignalFx,
}

impl TagFormat {
    /// All recognized formats, in no particular order.
    pub const ALL: [TagFormat; 5] = [
        TagFormat::Graphite,
        TagFormat::Telegraf,
        TagFormat::InfluxDb,
        TagFormat::DataDog,
        TagFormat::SignalFx,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagFormat::Graphite => "graphite",
            TagFormat::Telegraf => "telegraf",
            TagFormat::InfluxDb => "influxdb",
            TagFormat::DataDog => "datadog",
            TagFormat::SignalFx => "signalfx",
        }
    }
}

impl fmt::Display for TagFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl FromStr for TagFormat {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagFormat::ALL
            .iter()
            .find(|format| format.as_str() == s)
            .copied()
            .ok_or_else(|| MetricError::configuration(format!("unrecognized tag format '{}'", s)))
    }
}

/// Where the serialized tags go relative to the rest of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// After the value and type: `name:value|type<tags>`
    Suffix,
    /// Between the name and value: `name<tags>:value|type`
    Infix,
    /// After the first segment of the name: `first<tags>.rest:value|type`
    Segment,
}

#[derive(Debug, Clone, Copy)]
struct Dialect {
    join: char,
    separator: char,
    open: &'static str,
    close: &'static str,
    placement: Placement,
}

const GRAPHITE: Dialect = Dialect {
    join: ';',
    separator: '=',
    open: ";",
    close: "",
    placement: Placement::Suffix,
};

const INFLUX: Dialect = Dialect {
    join: ',',
    separator: '=',
    open: ",",
    close: "",
    placement: Placement::Infix,
};

const SIGNALFX: Dialect = Dialect {
    join: ',',
    separator: '=',
    open: ".[",
    close: "]",
    placement: Placement::Segment,
};

const DATADOG: Dialect = Dialect {
    join: ',',
    separator: '=',
    open: "|#",
    close: "",
    placement: Placement::Suffix,
};

const DEFAULT: Dialect = Dialect {
    join: ',',
    separator: ':',
    open: "|#",
    close: "",
    placement: Placement::Suffix,
};

fn dialect(format: Option<TagFormat>) -> &'static Dialect {
    match format {
        None => &DEFAULT,
        Some(TagFormat::Graphite) => &GRAPHITE,
        Some(TagFormat::Telegraf) | Some(TagFormat::InfluxDb) => &INFLUX,
        Some(TagFormat::DataDog) => &DATADOG,
        Some(TagFormat::SignalFx) => &SIGNALFX,
    }
}

/// Merge call-site tags over instance tags.
///
/// Keys present in both keep the position they had in `base` and take the
/// value from `overrides`. Keys only in `overrides` are appended in order.
pub fn merge_tags(base: &Tags, overrides: &Tags) -> Tags {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Serialize tags into the fragment used by the given dialect.
///
/// Returns an empty string when there are no tags.
pub fn serialize_tags(format: Option<TagFormat>, tags: &Tags) -> String {
    if tags.is_empty() {
        return String::new();
    }

    let dialect = dialect(format);
    // prefix + suffix + keys + values + separators + joins
    let size_hint = dialect.open.len()
        + dialect.close.len()
        + tags
            .iter()
            .map(|(k, v)| k.len() + v.as_ref().map_or(0, |v| v.len() + 1) + 1)
            .sum::<usize>();

    let mut out = String::with_capacity(size_hint);
    out.push_str(dialect.open);
    for (i, (key, value)) in tags.iter().enumerate() {
        if i > 0 {
            out.push(dialect.join);
        }
        out.push_str(key);
        if let Some(value) = value {
            out.push(dialect.separator);
            out.push_str(value);
        }
    }
    out.push_str(dialect.close);
    out
}

/// Assemble a single metric line, placing the tag fragment where the dialect
/// expects it. `value` is the value and type portion (`"1|c"`, `"10|g"`).
pub fn format_line(format: Option<TagFormat>, prefix: &str, key: &str, fragment: &str, value: &str) -> String {
    match dialect(format).placement {
        Placement::Suffix => format!("{}{}:{}{}", prefix, key, value, fragment),
        Placement::Infix => format!("{}{}{}:{}", prefix, key, fragment, value),
        Placement::Segment => match key.split_once('.') {
            Some((first, rest)) => format!("{}{}{}.{}:{}", prefix, first, fragment, rest, value),
            None => format!("{}{}{}:{}", prefix, key, fragment, value),
        },
    }
}
