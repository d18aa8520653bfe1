// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::sinks::connector::{Connector, Endpoint};
use crate::sinks::core::{MetricSink, SinkStats, SocketStats};

/// `MetricSink` implementation that writes every datagram to the `Sender`
/// half of a channel while callers are given ownership of the `Receiver` half.
///
/// This is not a general purpose sink, rather it's a sink meant for verifying
/// metrics written during the course of tests. By default, the channel used is
/// unbounded. The channel size can be limited using the `with_capacity` method,
/// in which case datagrams sent to a full channel fail with `WouldBlock`.
#[derive(Debug, Clone)]
pub struct SpyMetricSink {
    sender: Sender<String>,
    stats: SocketStats,
}

impl SpyMetricSink {
    pub fn new() -> (Receiver<String>, Self) {
        Self::with_queue_capacity(None)
    }

    pub fn with_capacity(queue: usize) -> (Receiver<String>, Self) {
        Self::with_queue_capacity(Some(queue))
    }

    fn with_queue_capacity(queue: Option<usize>) -> (Receiver<String>, Self) {
        let (tx, rx) = match queue {
            Some(cap) => bounded(cap),
            None => unbounded(),
        };

        let sink = SpyMetricSink {
            sender: tx,
            stats: SocketStats::default(),
        };
        (rx, sink)
    }
}

impl MetricSink for SpyMetricSink {
    fn emit(&self, datagram: &str) -> io::Result<usize> {
        let res = match self.sender.try_send(datagram.to_owned()) {
            Ok(_) => Ok(datagram.len()),
            Err(TrySendError::Full(_)) => Err(io::Error::new(ErrorKind::WouldBlock, "spy channel full")),
            Err(TrySendError::Disconnected(_)) => Err(io::Error::new(ErrorKind::BrokenPipe, "spy channel closed")),
        };

        self.stats.update(res, datagram.len())
    }

    fn stats(&self) -> SinkStats {
        (&self.stats).into()
    }
}

/// Number of times a `SpyConnector` has opened a sink.
#[derive(Debug, Clone, Default)]
pub struct ConnectCount(Arc<AtomicUsize>);

impl ConnectCount {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// `Connector` that hands out `SpyMetricSink`s all feeding the same channel.
///
/// Use it with `StatsdClient::with_connector` to assert on the exact
/// datagrams a client sends, and on how many times it connected.
///
/// # Example
///
/// ```
/// use metronome::{SpyConnector, StatsdClient};
///
/// let (rx, connector) = SpyConnector::new();
/// let mut client = StatsdClient::with_connector(connector);
///
/// client.increment("some.counter").unwrap();
/// assert_eq!("some.counter:1|c", rx.recv().unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct SpyConnector {
    sink: SpyMetricSink,
    connects: ConnectCount,
}

impl SpyConnector {
    pub fn new() -> (Receiver<String>, Self) {
        let (rx, sink) = SpyMetricSink::new();
        let connector = SpyConnector {
            sink,
            connects: ConnectCount::default(),
        };
        (rx, connector)
    }

    /// Handle to the number of sinks opened so far.
    pub fn connects(&self) -> ConnectCount {
        self.connects.clone()
    }
}

impl Connector for SpyConnector {
    fn connect(&self, _endpoint: &Endpoint) -> io::Result<Box<dyn MetricSink + Send>> {
        self.connects.0.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(self.sink.clone()))
    }
}
