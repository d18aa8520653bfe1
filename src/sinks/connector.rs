// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;
use std::io;
use std::time::Duration;

use crate::sinks::core::{MetricSink, SinkStats};

/// Where a client sends its metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Upper bound on connection setup. `None` uses the platform default.
    pub timeout: Option<Duration>,
}

/// Opens a `MetricSink` for an `Endpoint`.
///
/// The client calls this at most once per open connection, the first time a
/// metric is actually sent. Implementations other than the default
/// `UdpConnector` are mostly useful for tests.
pub trait Connector {
    fn connect(&self, endpoint: &Endpoint) -> io::Result<Box<dyn MetricSink + Send>>;
}

/// Lazily opened sink, reused until explicitly closed.
///
/// A failed write never closes or resets the sink: UDP writes are
/// fire-and-forget and the next write simply tries again on the same socket.
pub struct Connection {
    connector: Box<dyn Connector + Send>,
    sink: Option<Box<dyn MetricSink + Send>>,
}

impl Connection {
    pub fn new<C>(connector: C) -> Self
    where
        C: Connector + Send + 'static,
    {
        Connection {
            connector: Box::new(connector),
            sink: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// Return the open sink, connecting to `endpoint` first if needed.
    pub fn open(&mut self, endpoint: &Endpoint) -> io::Result<&(dyn MetricSink + Send)> {
        let sink = match self.sink.take() {
            Some(sink) => sink,
            None => {
                let sink = self.connector.connect(endpoint)?;
                debug!("opened metrics socket to {}:{}", endpoint.host, endpoint.port);
                sink
            }
        };

        Ok(&**self.sink.insert(sink))
    }

    /// Release the sink, returning `true` if one was open. The next call to
    /// `open` connects again.
    pub fn close(&mut self) -> bool {
        self.sink.take().is_some()
    }

    pub fn flush(&self) -> io::Result<()> {
        match self.sink {
            Some(ref sink) => sink.flush(),
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> SinkStats {
        self.sink.as_ref().map(|s| s.stats()).unwrap_or_default()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection {{ connector: ..., open: {} }}", self.is_open())
    }
}
