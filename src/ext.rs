// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Advanced extension points for the Metronome library
//!
//! Most users of Metronome shouldn't need to make use of this module or
//! the included traits and types. However, users that need to extend the
//! library in unforeseen ways may find them useful.
//!
//! The `Connector` trait, for example, can be used to send metrics somewhere
//! other than a UDP socket while keeping the lazy connection behavior of the
//! client. `Sampler` controls the random draws used to sample counters, and
//! the tag functions expose the formatting the client does for each line.

pub use crate::builder::sampler::Sampler;
pub use crate::builder::{MetricKeys, MetricType, MetricValue};
pub use crate::sinks::{Connection, Connector, Endpoint, SocketStats};
pub use crate::tags::{format_line, merge_tags, serialize_tags};
