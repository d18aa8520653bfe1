// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::client::StatsdClient;
use indexmap::IndexMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared handle to a client held by a `Registry`.
pub type ClientHandle = Arc<Mutex<StatsdClient>>;

/// Named clients, created on first use.
///
/// A registry is meant to be built once when the application starts and
/// passed to whatever needs to emit metrics. The first call to `instance` for
/// a name creates a client with default options; every later call for that
/// name returns the same client until it is removed.
///
/// # Example
///
/// ```
/// use metronome::{Options, Registry};
/// use std::sync::Arc;
///
/// let registry = Registry::new();
///
/// let api = registry.instance("api");
/// api.lock().unwrap().configure(Options::new().namespace("api")).unwrap();
///
/// let again = registry.instance("api");
/// assert!(Arc::ptr_eq(&api, &again));
/// assert_eq!("api", again.lock().unwrap().namespace());
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    clients: Mutex<IndexMap<String, ClientHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Return the client registered under `name`, creating an unconfigured
    /// UDP client first if there is none.
    pub fn instance(&self, name: &str) -> ClientHandle {
        self.instance_with(name, StatsdClient::new)
    }

    /// Return the client registered under `name`, creating it with `init`
    /// first if there is none. `init` is not called otherwise.
    ///
    /// `init` runs without the registry locked, so it may use the registry
    /// itself. If another thread registers `name` while `init` runs, that
    /// client wins and the one built by `init` is dropped.
    pub fn instance_with<F>(&self, name: &str, init: F) -> ClientHandle
    where
        F: FnOnce() -> StatsdClient,
    {
        if let Some(client) = self.get(name) {
            return client;
        }

        let client = init();
        let mut clients = self.lock();
        let handle = clients.entry(name.to_owned()).or_insert_with(|| {
            debug!("creating metrics client '{}'", name);
            Arc::new(Mutex::new(client))
        });
        Arc::clone(handle)
    }

    /// Return the client registered under `name` without creating one.
    pub fn get(&self, name: &str) -> Option<ClientHandle> {
        self.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Forget the client registered under `name`, returning it.
    ///
    /// Handles already given out keep working. The next call to `instance`
    /// for the name creates a new client.
    pub fn remove(&self, name: &str) -> Option<ClientHandle> {
        self.lock().shift_remove(name)
    }

    /// Names of every registered client, in the order they were created.
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The map is never left half-updated, so a panic elsewhere while holding
    // the lock doesn't invalidate it.
    fn lock(&self) -> MutexGuard<'_, IndexMap<String, ClientHandle>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
