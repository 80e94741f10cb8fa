//! Root dispatcher: the fixed-port service clients create mockers through.
//!
//! The dispatcher is itself a mocker whose namespace holds a single route,
//! `POST /create`. Everything else on its port answers `404` or `405`.

mod server;

pub use server::RootDispatcher;
