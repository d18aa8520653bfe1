// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Utilities for testing Metronome itself.
//!
//! Functionality exported to be used by integration tests. This module
//! is NOT part of the Metronome API and is subject to change at any time.

use crate::sinks::{Connector, Endpoint, MetricSink};
use crossbeam_channel::unbounded;
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// `Connector` that always fails, like a host that can't be resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingConnector;

impl Connector for FailingConnector {
    fn connect(&self, endpoint: &Endpoint) -> io::Result<Box<dyn MetricSink + Send>> {
        Err(io::Error::new(
            ErrorKind::ConnectionRefused,
            format!("refusing to connect to {}:{}", endpoint.host, endpoint.port),
        ))
    }
}

pub trait DatagramConsumer {
    fn accept(&self, datagram: String);
}

impl<F> DatagramConsumer for F
where
    F: Fn(String),
{
    fn accept(&self, datagram: String) {
        (self)(datagram);
    }
}

/// Basic server listening on an ephemeral UDP port of the loopback interface.
///
/// This server reads datagrams in a loop, ensures they are valid UTF-8, and
/// hands them to a consumer. Any errors are printed to `stderr`.
pub struct UdpSocketServer {
    shutdown: AtomicBool,
    socket: UdpSocket,
    consumer: Arc<dyn DatagramConsumer + Send + Sync + 'static>,
}

impl UdpSocketServer {
    /// Bind the socket right away so the address is known before the server
    /// starts running. `interval` is the read timeout of the main loop.
    pub fn bind<C>(interval: Duration, consumer: C) -> io::Result<Self>
    where
        C: DatagramConsumer + Send + Sync + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0")?;
        socket.set_read_timeout(Some(interval))?;

        Ok(UdpSocketServer {
            shutdown: AtomicBool::new(false),
            socket,
            consumer: Arc::new(consumer),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Run until the `.shutdown()` method is called and no datagrams are left
    /// to read.
    pub fn run(&self) -> io::Result<()> {
        let mut buf = [0u8; 65536];

        loop {
            match self.socket.recv(&mut buf) {
                Ok(v) => match std::str::from_utf8(&buf[0..v]) {
                    Ok(s) => self.consumer.accept(s.to_owned()),
                    Err(e) => eprintln!("Error: Couldn't decode string to utf-8 {}", e),
                },
                // Read timeouts surface as either kind depending on the platform
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    if self.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                }
                Err(e) => eprintln!("Error: {} - {:?}", e, e.kind()),
            }
        }

        Ok(())
    }

    /// Indicate that the server should stop its main run loop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

/// Wrapper around a `UdpSocketServer` to start and stop it in the course
/// of running a single test.
///
/// The server is stopped and the thread it was running in is joined from
/// the destructor of this struct.
#[derive(Default)]
pub struct UdpServerHarness {
    server: Option<Arc<UdpSocketServer>>,
    thread: Option<JoinHandle<()>>,
}

impl UdpServerHarness {
    pub fn new() -> Self {
        UdpServerHarness::default()
    }

    /// Start a server feeding `consumer` and run `body` with its address.
    pub fn run<C, F>(mut self, consumer: C, body: F)
    where
        C: DatagramConsumer + Send + Sync + 'static,
        F: FnOnce(SocketAddr),
    {
        let server = Arc::new(UdpSocketServer::bind(Duration::from_millis(100), consumer).unwrap());
        let addr = server.local_addr().unwrap();
        let server_local = Arc::clone(&server);

        let t = thread::spawn(move || {
            server_local.run().unwrap();
        });

        self.server = Some(server);
        self.thread = Some(t);

        body(addr);
    }

    /// Start a server that discards everything and run `body` with its address.
    pub fn run_quiet<F>(self, body: F)
    where
        F: FnOnce(SocketAddr),
    {
        self.run(|_: String| (), body)
    }

    /// Run `body` against a server and return every datagram it received,
    /// in the order received.
    pub fn collect<F>(self, body: F) -> Vec<String>
    where
        F: FnOnce(SocketAddr),
    {
        let (tx, rx) = unbounded();
        self.run(
            move |datagram: String| {
                let _ = tx.send(datagram);
            },
            body,
        );

        // the harness was dropped at the end of run(), so the server has
        // drained its socket and exited
        rx.try_iter().collect()
    }
}

impl Drop for UdpServerHarness {
    fn drop(&mut self) {
        if let Some(s) = self.server.take() {
            s.shutdown();
        }

        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}
