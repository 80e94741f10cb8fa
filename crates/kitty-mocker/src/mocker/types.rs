//! Mocker lifecycle types and errors.

use std::io;

use crate::allocator::AllocError;
use crate::routes::RouteError;

/// Lifecycle of a mocker.
///
/// `Created` only lasts until the listener is handed over; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockerState {
    Created,
    Listening,
    /// Listener closed, in-flight connections draining
    Stopping,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum MockerError {
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// Transient: the caller may retry on another port
    #[error("address in use on port {0}, retrying...")]
    AddressInUse(u16),
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("failed to close mocker on port {port}: {reason}")]
    Close { port: u16, reason: String },
    #[error("mocker not found on port {0}")]
    NotFound(u16),
    #[error("mocker on port {0} is already listening")]
    AlreadyListening(u16),
    #[error("mocker on port {0} is already stopped")]
    AlreadyStopped(u16),
    #[error(transparent)]
    Route(#[from] RouteError),
}

impl MockerError {
    pub(crate) fn from_bind(port: u16, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::AddrInUse {
            Self::AddressInUse(port)
        } else {
            Self::Bind { port, source: err }
        }
    }
}
