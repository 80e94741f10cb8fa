//! Port allocation for new mockers.
//!
//! Allocation and binding are the same step: a port is only handed out
//! together with the live listener bound to it, so two callers can never
//! walk away with the same port. The OS bind is the only arbiter.

use std::collections::HashSet;
use std::io;
use tokio::net::TcpListener;
use tracing::debug;

use crate::config::PortRange;
use crate::metrics;

#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    #[error("no free port available in range {0}")]
    Exhausted(PortRange),
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
}

/// Bind a listener on `host:port`.
pub async fn bind_port(host: &str, port: u16) -> io::Result<TcpListener> {
    TcpListener::bind((host, port)).await
}

/// Whether a bind failure only means "try another port".
fn is_retryable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied
    )
}

/// Hands out bound listeners from a fixed port range.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    range: PortRange,
    /// Never handed out, e.g. the root dispatcher's port
    excluded: Option<u16>,
}

impl PortAllocator {
    pub fn new(range: PortRange) -> Self {
        Self {
            range,
            excluded: None,
        }
    }

    pub fn excluding(mut self, port: u16) -> Self {
        self.excluded = Some(port);
        self
    }

    /// Bind the first free port of the range, in ascending order.
    ///
    /// Ports in `taken` belong to mockers that are still registered (for
    /// instance draining after a stop) and are skipped without a bind.
    pub async fn allocate(
        &self,
        host: &str,
        taken: &HashSet<u16>,
    ) -> Result<(u16, TcpListener), AllocError> {
        for port in self.range.ports() {
            if Some(port) == self.excluded || taken.contains(&port) {
                continue;
            }
            match bind_port(host, port).await {
                Ok(listener) => {
                    metrics::record_bind_attempt("bound");
                    return Ok((port, listener));
                }
                Err(e) if is_retryable(&e) => {
                    metrics::record_bind_attempt("in_use");
                    debug!("Port {} unavailable ({}), retrying with next port", port, e);
                }
                Err(e) => {
                    metrics::record_bind_attempt("error");
                    return Err(AllocError::Bind { port, source: e });
                }
            }
        }

        Err(AllocError::Exhausted(self.range))
    }
}
