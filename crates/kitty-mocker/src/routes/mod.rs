//! Routing table and request history shared by every mocker.
//!
//! - `types`: routes, responders, route keys and routing errors
//! - `table`: the port-keyed [`RouteTable`]
//! - `ledger`: per-route request history

mod ledger;
mod table;
mod types;

pub use ledger::{RecordedHeaders, RequestLedger, RequestRecord};
pub use table::RouteTable;
pub use types::{
    is_reserved_path, HttpMethod, ResponseDefinition, Responder, Route, RouteDefinition,
    RouteError, RouteFilters, RouteKey, StaticResponse, HISTORY_ENDPOINT, RESERVED_PREFIX,
    RESPONSE_CODES, ROUTE_ENDPOINT,
};
