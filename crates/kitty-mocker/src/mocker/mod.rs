//! Mocker lifecycle and request handling.
//!
//! This module provides:
//! - `MockerManager`: creates, tracks and stops mockers
//! - `Mocker`: one listener with its own route namespace
//! - `MockerError`: lifecycle failures
//!
//! ## Module Structure
//!
//! - `types`: lifecycle state and errors
//! - `core`: the `Mocker` listener and its accept loop
//! - `handler`: per-request pipeline (lookup, respond, record)
//! - `management`: built-in routes and their responders
//! - `manager`: `MockerManager`

mod core;
mod handler;
mod management;
mod manager;
mod types;


pub use core::Mocker;
pub use handler::{handle_mocker_request, parse_query_string, MockerContext};
pub use management::{builtin_routes, create_route};
pub use manager::MockerManager;
pub use types::{MockerError, MockerState};
