//! kitty-mocker: on-demand HTTP mock servers.
//!
//! A root dispatcher on a fixed port creates mockers, each an HTTP listener
//! on its own port from a configured range. Clients register canned routes
//! on a mocker, point the code under test at it, and read back the history
//! of matched requests.

pub mod access_log;
pub mod allocator;
pub mod config;
pub mod dispatcher;
pub mod metrics;
pub mod mocker;
pub mod response;
pub mod routes;

pub use config::{PortRange, ServerConfig};
pub use dispatcher::RootDispatcher;
pub use mocker::{Mocker, MockerError, MockerManager};
