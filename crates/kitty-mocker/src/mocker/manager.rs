//! MockerManager - lifecycle management for every live mocker.
//!
//! The manager allocates ports, starts mockers with their built-in routes,
//! and tears them down again. Mockers are keyed by port; a port stays
//! registered until its mocker has fully drained.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use super::core::Mocker;
use super::handler::MockerContext;
use super::management::builtin_routes;
use super::types::MockerError;
use crate::allocator::PortAllocator;
use crate::metrics;
use crate::routes::{HttpMethod, Route, RouteTable};

/// Owns the live mockers and the shared route table.
pub struct MockerManager {
    host: String,
    allocator: PortAllocator,
    routes: Arc<RouteTable>,
    /// Live mockers by port
    mockers: RwLock<HashMap<u16, Arc<Mocker>>>,
}

impl MockerManager {
    pub fn new(host: impl Into<String>, allocator: PortAllocator, routes: Arc<RouteTable>) -> Self {
        Self {
            host: host.into(),
            allocator,
            routes,
            mockers: RwLock::new(HashMap::new()),
        }
    }

    /// The route table shared by all mockers of this manager.
    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Allocate a port, start a mocker on it and register its built-in routes.
    ///
    /// Returns the assigned port.
    pub async fn create(self: &Arc<Self>) -> Result<u16, MockerError> {
        let taken: HashSet<u16> = self.mockers.read().keys().copied().collect();
        let (port, listener) = self.allocator.allocate(&self.host, &taken).await?;

        let mocker = Arc::new(Mocker::new(&self.host, port, Arc::clone(&self.routes)));
        self.mockers.write().insert(port, Arc::clone(&mocker));

        let started = builtin_routes()
            .into_iter()
            .try_for_each(|route| mocker.add_route(route))
            .map_err(MockerError::from)
            .and_then(|()| {
                let context = Arc::new(MockerContext::new(port, Arc::clone(self)));
                mocker.listen(listener, context)
            });

        match started {
            Ok(message) => {
                metrics::mocker_started();
                info!("{}", message);
                Ok(port)
            }
            Err(e) => {
                self.routes.remove_namespace(port);
                self.mockers.write().remove(&port);
                Err(e)
            }
        }
    }

    /// Stop the mocker on `port` and release its port, routes and history.
    ///
    /// A failed close still releases everything: the listener is owned by
    /// the accept loop and is gone once that task has ended.
    pub async fn stop(&self, port: u16) -> Result<(), MockerError> {
        let mocker = self.get(port)?;
        match mocker.stop().await {
            // Another caller is stopping it and will release the port
            Err(e @ MockerError::AlreadyStopped(_)) => Err(e),
            result => {
                self.release(port);
                result
            }
        }
    }

    fn release(&self, port: u16) {
        let routes = self.routes.remove_namespace(port);
        self.mockers.write().remove(&port);
        metrics::mocker_stopped();
        info!("Mocker on port {} stopped, {} routes released", port, routes);
    }

    /// Get a mocker by port
    pub fn get(&self, port: u16) -> Result<Arc<Mocker>, MockerError> {
        self.mockers
            .read()
            .get(&port)
            .cloned()
            .ok_or(MockerError::NotFound(port))
    }

    /// Ports of all live mockers, ascending.
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.mockers.read().keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    pub fn count(&self) -> usize {
        self.mockers.read().len()
    }

    /// Stop every live mocker. Returns the ports that were stopped.
    pub async fn stop_all(&self) -> Vec<u16> {
        let mut stopped = Vec::new();
        for port in self.ports() {
            match self.stop(port).await {
                Ok(()) => stopped.push(port),
                // Lost a race with a concurrent DELETE /
                Err(e) => warn!("Could not stop mocker on port {}: {}", port, e),
            }
        }
        stopped
    }

    /// Add a route to the mocker on `port`.
    pub fn add_route(&self, port: u16, route: Route) -> Result<(), MockerError> {
        self.get(port)?.add_route(route)?;
        Ok(())
    }

    /// Delete a route (and its history) from the mocker on `port`.
    pub fn delete_route(
        &self,
        port: u16,
        path: &str,
        method: HttpMethod,
    ) -> Result<Route, MockerError> {
        Ok(self.get(port)?.delete_route(path, method)?)
    }
}
