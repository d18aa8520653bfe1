// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of the I/O counters of a sink.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub bytes_dropped: u64,
    pub packets_dropped: u64,
}

/// Shared, lock-free counters backing `SinkStats`.
#[derive(Debug, Clone, Default)]
pub struct SocketStats {
    bytes_sent: Arc<AtomicU64>,
    packets_sent: Arc<AtomicU64>,
    bytes_dropped: Arc<AtomicU64>,
    packets_dropped: Arc<AtomicU64>,
}

impl SocketStats {
    /// Record the outcome of writing a datagram of `len` bytes, passing the
    /// result through unchanged.
    pub fn update(&self, res: io::Result<usize>, len: usize) -> io::Result<usize> {
        match res {
            Ok(written) => {
                self.bytes_sent.fetch_add(written as u64, Ordering::Relaxed);
                self.packets_sent.fetch_add(1, Ordering::Relaxed);
                Ok(written)
            }
            Err(e) => {
                self.bytes_dropped.fetch_add(len as u64, Ordering::Relaxed);
                self.packets_dropped.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

impl From<&SocketStats> for SinkStats {
    fn from(stats: &SocketStats) -> Self {
        SinkStats {
            bytes_sent: stats.bytes_sent.load(Ordering::Relaxed),
            packets_sent: stats.packets_sent.load(Ordering::Relaxed),
            bytes_dropped: stats.bytes_dropped.load(Ordering::Relaxed),
            packets_dropped: stats.packets_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Trait for backends that deliver Statsd datagrams somewhere.
///
/// Each call to `emit` receives one complete datagram: one or more metric
/// lines joined by `\n`, without a trailing newline. For example, a counter
/// and a timer sent together by a single call look like this:
///
/// ``` text
/// app.requests:1|c|#env:prod
/// app.latency:12.5|ms|#env:prod
/// ```
///
/// Datagrams must be delivered as-is. Sinks are not expected to batch
/// datagrams from separate calls together.
pub trait MetricSink {
    /// Write the datagram and return the number of bytes written.
    fn emit(&self, datagram: &str) -> io::Result<usize>;

    /// Flush anything the sink may be holding on to. Most sinks write
    /// immediately so the default does nothing.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Bytes and packets sent or dropped so far. Sinks that don't keep
    /// track return zeros.
    fn stats(&self) -> SinkStats {
        SinkStats::default()
    }
}

/// Implementation of a `MetricSink` that discards all metrics.
#[derive(Debug, Clone)]
pub struct NopMetricSink;

impl MetricSink for NopMetricSink {
    fn emit(&self, _datagram: &str) -> io::Result<usize> {
        Ok(0)
    }
}
