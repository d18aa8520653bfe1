// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod connector;
mod core;
mod spy;
mod udp;

pub use crate::sinks::connector::{Connection, Connector, Endpoint};
pub use crate::sinks::core::{MetricSink, NopMetricSink, SinkStats, SocketStats};
pub use crate::sinks::spy::{ConnectCount, SpyConnector, SpyMetricSink};
pub use crate::sinks::udp::{UdpConnector, UdpMetricSink};
