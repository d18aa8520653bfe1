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
use thiserror::Error;

/// Broad category of a `MetricError`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// Options passed to `StatsdClient::configure` were rejected.
    Configuration,
    /// The socket to the Statsd server could not be opened.
    Connection,
    /// A metric could not be built from the arguments given.
    InvalidInput,
}

/// Error type for all fallible operations of the client.
#[derive(Debug, Error)]
pub enum MetricError {
    /// An option was rejected by `StatsdClient::configure`. Nothing was applied.
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    /// The UDP socket to `host:port` could not be opened.
    #[error("unable to open socket to {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// `end_timing` was called for a key that was never started.
    #[error("no timing was started for key '{key}'")]
    TimingNotStarted { key: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
}

impl MetricError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetricError::Configuration { .. } => ErrorKind::Configuration,
            MetricError::Connection { .. } => ErrorKind::Connection,
            MetricError::TimingNotStarted { .. } | MetricError::InvalidInput { .. } => ErrorKind::InvalidInput,
        }
    }

    pub(crate) fn configuration<S: Into<String>>(reason: S) -> MetricError {
        MetricError::Configuration { reason: reason.into() }
    }

    pub(crate) fn invalid_input<S: Into<String>>(reason: S) -> MetricError {
        MetricError::InvalidInput { reason: reason.into() }
    }
}

pub type MetricResult<T> = Result<T, MetricError>;
