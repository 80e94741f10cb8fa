//! Core Mocker struct: one HTTP listener with its own route namespace.

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::handler::{handle_mocker_request, MockerContext};
use super::types::{MockerError, MockerState};
use crate::allocator::bind_port;
use crate::routes::{HttpMethod, Route, RouteError, RouteTable};

/// Running accept loop of a listening mocker.
struct Lifecycle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// An addressable HTTP listener simulating one fake backend.
pub struct Mocker {
    port: u16,
    hostname: String,
    routes: Arc<RouteTable>,
    state: Mutex<MockerState>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl Mocker {
    pub fn new(hostname: &str, port: u16, routes: Arc<RouteTable>) -> Self {
        Self {
            port,
            hostname: hostname.to_string(),
            routes,
            state: Mutex::new(MockerState::Created),
            lifecycle: Mutex::new(None),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> MockerState {
        *self.state.lock()
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/", self.hostname, self.port)
    }

    /// Bind the mocker's port and start serving.
    ///
    /// `EADDRINUSE` surfaces as [`MockerError::AddressInUse`]; no retry happens here.
    pub async fn start(&self, context: Arc<MockerContext>) -> Result<String, MockerError> {
        let listener = bind_port(&self.hostname, self.port)
            .await
            .map_err(|e| MockerError::from_bind(self.port, e))?;
        self.listen(listener, context)
    }

    /// Start serving on a listener that is already bound to the mocker's port.
    pub fn listen(
        &self,
        listener: TcpListener,
        context: Arc<MockerContext>,
    ) -> Result<String, MockerError> {
        let mut state = self.state.lock();
        match *state {
            MockerState::Created => {}
            MockerState::Listening => return Err(MockerError::AlreadyListening(self.port)),
            MockerState::Stopping | MockerState::Stopped => {
                return Err(MockerError::AlreadyStopped(self.port))
            }
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(listener, context, shutdown_rx));
        *self.lifecycle.lock() = Some(Lifecycle { shutdown_tx, task });
        *state = MockerState::Listening;

        Ok(format!("New mocker running at {}", self.endpoint()))
    }

    /// Register a route in this mocker's namespace.
    pub fn add_route(&self, route: Route) -> Result<(), RouteError> {
        route.validate()?;
        let key = route.key.clone();
        self.routes.set(self.port, route)?;
        info!(
            port = self.port,
            "New route added to mocker on port {} | {:>7} {}",
            self.port,
            key.method,
            key.path
        );
        Ok(())
    }

    /// Remove a route and its history from this mocker's namespace.
    pub fn delete_route(&self, path: &str, method: HttpMethod) -> Result<Route, RouteError> {
        let route = self.routes.delete(self.port, path, method)?;
        info!(
            port = self.port,
            "Route removed from mocker on port {} | {:>7} {}",
            self.port,
            method,
            path
        );
        Ok(route)
    }

    /// Close the listener and wait for in-flight connections to drain.
    pub async fn stop(&self) -> Result<(), MockerError> {
        let lifecycle = {
            let mut state = self.state.lock();
            match *state {
                MockerState::Created => {
                    *state = MockerState::Stopped;
                    return Ok(());
                }
                MockerState::Stopping | MockerState::Stopped => {
                    return Err(MockerError::AlreadyStopped(self.port));
                }
                MockerState::Listening => {
                    *state = MockerState::Stopping;
                    self.lifecycle.lock().take()
                }
            }
        };

        info!("Closing mocker on port {}", self.port);
        let Some(lifecycle) = lifecycle else {
            *self.state.lock() = MockerState::Stopped;
            return Ok(());
        };

        // The accept loop also exits if the receiver sees the sender dropped
        let _ = lifecycle.shutdown_tx.send(());
        let result = lifecycle.task.await;
        *self.state.lock() = MockerState::Stopped;

        result.map_err(|e| MockerError::Close {
            port: self.port,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
impl Mocker {
    /// Kill the accept loop so the next `stop` sees a failed close.
    pub(super) fn abort_accept_loop(&self) {
        if let Some(lifecycle) = self.lifecycle.lock().as_ref() {
            lifecycle.task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    context: Arc<MockerContext>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let port = context.port;
    let graceful = GracefulShutdown::new();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let context = Arc::clone(&context);
                        let service = service_fn(move |req| {
                            let context = Arc::clone(&context);
                            async move { handle_mocker_request(req, context, addr).await }
                        });
                        let conn = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service);
                        let conn = graceful.watch(conn);
                        tokio::spawn(async move {
                            if let Err(e) = conn.await {
                                debug!("Connection error on port {}: {}", port, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error on port {}: {}", port, e);
                    }
                }
            }
            _ = &mut shutdown_rx => {
                break;
            }
        }
    }

    // Stop accepting; connections already accepted finish below
    drop(listener);
    graceful.shutdown().await;
    debug!("Mocker on port {} drained", port);
}
