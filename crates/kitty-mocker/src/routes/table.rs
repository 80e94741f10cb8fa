//! Process-wide routing table, keyed by mocker port.
//!
//! Every mocker (and the root dispatcher) owns one namespace in the table.
//! Routes keep their registration order and carry their own request ledger,
//! so a route and its history are inserted and removed together.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::ledger::{RequestLedger, RequestRecord};
use super::types::{HttpMethod, Route, RouteError, RouteKey};

struct RouteEntry {
    route: Arc<Route>,
    ledger: RequestLedger,
}

#[derive(Default)]
struct Namespace {
    /// Registration order
    entries: Vec<RouteEntry>,
}

impl Namespace {
    fn position(&self, path: &str, method: HttpMethod) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.route.key.method == method && e.route.key.path == path)
    }

    fn entry_mut(&mut self, path: &str, method: HttpMethod) -> Option<&mut RouteEntry> {
        self.position(path, method).map(|i| &mut self.entries[i])
    }

    fn has_path(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.route.key.path == path)
    }
}

/// Shared routing table for all mockers in the process.
#[derive(Default)]
pub struct RouteTable {
    namespaces: RwLock<HashMap<u16, Namespace>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route on `port`.
    pub fn set(&self, port: u16, route: Route) -> Result<(), RouteError> {
        let mut namespaces = self.namespaces.write();
        let namespace = namespaces.entry(port).or_default();
        if namespace.position(route.path(), route.method()).is_some() {
            return Err(RouteError::Duplicate(route.key));
        }
        namespace.entries.push(RouteEntry {
            route: Arc::new(route),
            ledger: RequestLedger::new(),
        });
        Ok(())
    }

    /// Look up the route matching `(path, method)` on `port`.
    ///
    /// Fails with [`RouteError::MethodNotAllowed`] when the path is
    /// registered under other methods only.
    pub fn get(&self, port: u16, path: &str, method: HttpMethod) -> Result<Arc<Route>, RouteError> {
        let namespaces = self.namespaces.read();
        let namespace = namespaces.get(&port).ok_or(RouteError::NotFound)?;
        match namespace.position(path, method) {
            Some(i) => Ok(Arc::clone(&namespace.entries[i].route)),
            None if namespace.has_path(path) => Err(RouteError::MethodNotAllowed),
            None => Err(RouteError::NotFound),
        }
    }

    /// Whether any route on `port` is registered for `path`.
    pub fn has_path(&self, port: u16, path: &str) -> bool {
        self.namespaces
            .read()
            .get(&port)
            .is_some_and(|ns| ns.has_path(path))
    }

    /// Remove a route together with its history.
    pub fn delete(&self, port: u16, path: &str, method: HttpMethod) -> Result<Route, RouteError> {
        let mut namespaces = self.namespaces.write();
        let namespace = namespaces.get_mut(&port).ok_or(RouteError::NotFound)?;
        let index = namespace
            .position(path, method)
            .ok_or(RouteError::NotFound)?;
        let entry = namespace.entries.remove(index);
        Ok(Arc::unwrap_or_clone(entry.route))
    }

    /// Route keys on `port` in registration order.
    pub fn list(&self, port: u16) -> Vec<RouteKey> {
        self.namespaces
            .read()
            .get(&port)
            .map(|ns| ns.entries.iter().map(|e| e.route.key.clone()).collect())
            .unwrap_or_default()
    }

    /// Append a record to the ledger of a registered route.
    pub fn append_request(
        &self,
        port: u16,
        path: &str,
        method: HttpMethod,
        record: RequestRecord,
    ) -> Result<(), RouteError> {
        let mut namespaces = self.namespaces.write();
        let entry = namespaces
            .get_mut(&port)
            .and_then(|ns| ns.entry_mut(path, method))
            .ok_or(RouteError::NotFound)?;
        entry.ledger.append(record);
        Ok(())
    }

    /// Recorded requests for a route, oldest first.
    ///
    /// Unknown routes have an empty history.
    pub fn requests(&self, port: u16, path: &str, method: HttpMethod) -> Vec<RequestRecord> {
        let namespaces = self.namespaces.read();
        namespaces
            .get(&port)
            .and_then(|ns| ns.position(path, method).map(|i| ns.entries[i].ledger.list()))
            .unwrap_or_default()
    }

    /// Drop the history of a route. Clearing an empty or unknown ledger is a no-op.
    pub fn clear_requests(&self, port: u16, path: &str, method: HttpMethod) {
        let mut namespaces = self.namespaces.write();
        if let Some(entry) = namespaces
            .get_mut(&port)
            .and_then(|ns| ns.entry_mut(path, method))
        {
            entry.ledger.clear();
        }
    }

    /// Discard every route and ledger of `port`.
    pub fn remove_namespace(&self, port: u16) -> usize {
        self.namespaces
            .write()
            .remove(&port)
            .map(|ns| ns.entries.len())
            .unwrap_or(0)
    }

    pub fn contains_port(&self, port: u16) -> bool {
        self.namespaces.read().contains_key(&port)
    }
}
