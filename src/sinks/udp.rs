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
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Instant;

use crate::sinks::connector::{Connector, Endpoint};
use crate::sinks::core::{MetricSink, SinkStats, SocketStats};

/// Resolve anything implementing `ToSocketAddrs` to its first address.
#[allow(clippy::needless_pass_by_value)]
fn first_addr<A: ToSocketAddrs>(addr: A) -> io::Result<SocketAddr> {
    match addr.to_socket_addrs()?.next() {
        Some(addr) => Ok(addr),
        None => Err(io::Error::new(io::ErrorKind::InvalidInput, "no socket addresses yielded")),
    }
}

/// Resolve the endpoint with the system resolver. See `resolve_with`.
pub(crate) fn resolve(endpoint: &Endpoint) -> io::Result<SocketAddr> {
    resolve_with(endpoint, |host, port| first_addr((host, port)))
}

/// Resolve the endpoint in the calling thread using `lookup`.
///
/// IP literals are parsed directly and never fail on the timeout. Hostname
/// lookups can't be interrupted, so the endpoint timeout is checked once the
/// lookup returns: an address that took longer than the timeout to resolve is
/// rejected with `TimedOut`. An unset or zero timeout accepts any lookup.
pub(crate) fn resolve_with<F>(endpoint: &Endpoint, lookup: F) -> io::Result<SocketAddr>
where
    F: FnOnce(&str, u16) -> io::Result<SocketAddr>,
{
    if let Ok(ip) = endpoint.host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, endpoint.port));
    }

    let start = Instant::now();
    let addr = lookup(&endpoint.host, endpoint.port)?;

    match endpoint.timeout {
        Some(timeout) if !timeout.is_zero() && start.elapsed() > timeout => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("resolving {} took longer than {:?}", endpoint.host, timeout),
        )),
        _ => Ok(addr),
    }
}

/// Implementation of a `MetricSink` that emits metrics over UDP.
///
/// The socket is bound to an ephemeral local port and connected to the
/// address of the Statsd server, so each datagram is a single `send` call.
/// Writes happen in the thread of the caller.
#[derive(Debug)]
pub struct UdpMetricSink {
    addr: SocketAddr,
    socket: UdpSocket,
    stats: SocketStats,
}

impl UdpMetricSink {
    /// Bind a new socket and connect it to the given Statsd server address.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use metronome::{UdpMetricSink, DEFAULT_PORT};
    ///
    /// let sink = UdpMetricSink::connect(("127.0.0.1", DEFAULT_PORT)).unwrap();
    /// ```
    ///
    /// # Failures
    ///
    /// This method may fail if:
    ///
    /// * It is unable to resolve the hostname of the metric server.
    /// * A local socket cannot be bound.
    pub fn connect<A>(to_addr: A) -> io::Result<UdpMetricSink>
    where
        A: ToSocketAddrs,
    {
        let addr = first_addr(to_addr)?;
        Self::from_addr(addr)
    }

    fn from_addr(addr: SocketAddr) -> io::Result<UdpMetricSink> {
        let local: IpAddr = match addr {
            SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
            SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
        };

        let socket = UdpSocket::bind((local, 0))?;
        socket.connect(addr)?;

        Ok(UdpMetricSink {
            addr,
            socket,
            stats: SocketStats::default(),
        })
    }

    /// Address of the Statsd server this sink writes to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl MetricSink for UdpMetricSink {
    fn emit(&self, datagram: &str) -> io::Result<usize> {
        self.stats.update(self.socket.send(datagram.as_bytes()), datagram.len())
    }

    fn stats(&self) -> SinkStats {
        (&self.stats).into()
    }
}

/// The default `Connector`: opens a `UdpMetricSink` to the endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpConnector;

impl Connector for UdpConnector {
    fn connect(&self, endpoint: &Endpoint) -> io::Result<Box<dyn MetricSink + Send>> {
        let addr = resolve(endpoint)?;
        Ok(Box::new(UdpMetricSink::from_addr(addr)?))
    }
}
