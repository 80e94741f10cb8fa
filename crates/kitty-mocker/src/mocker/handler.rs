//! Request handling for mockers.
//!
//! Each request runs through a short pipeline: resolve the route for
//! `(path, method)`, read the body, run the route's responder, append to
//! the route's history, reply. Lookup failures short-circuit to `404`/`405`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{HeaderMap, Request, Response, StatusCode, Uri};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::management::respond;
use super::manager::MockerManager;
use crate::access_log::{LoggedBody, PendingAccessLog};
use crate::response::{envelope_response, method_not_allowed, not_found, Envelope};
use crate::routes::{HttpMethod, RecordedHeaders, RequestRecord, Route, RouteError};

/// Per-listener state handed to every request.
pub struct MockerContext {
    /// Port of the listener, also its route namespace
    pub port: u16,
    pub manager: Arc<MockerManager>,
}

impl MockerContext {
    pub fn new(port: u16, manager: Arc<MockerManager>) -> Self {
        Self { port, manager }
    }
}

/// A request that matched a route, with its body fully read.
pub(super) struct MatchedRequest {
    pub method: HttpMethod,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_addr: SocketAddr,
}

impl MatchedRequest {
    /// Decoded query string parameters.
    pub fn query(&self) -> HashMap<String, String> {
        parse_query_string(self.uri.query().unwrap_or(""))
    }

    pub fn to_record(&self) -> RequestRecord {
        let url = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| self.uri.path().to_string());
        RequestRecord {
            ip: self.client_addr.ip().to_canonical().to_string(),
            method: self.method,
            url,
            header: RecordedHeaders::from_header_map(&self.headers),
            body: String::from_utf8_lossy(&self.body).into_owned(),
            date: chrono::Utc::now(),
        }
    }
}

/// Parse a query string into decoded key/value pairs.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(key).ok()?.into_owned();
            let value = urlencoding::decode(value).ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

/// Handle a request to a mocker (or to the root dispatcher)
pub async fn handle_mocker_request(
    req: Request<Incoming>,
    context: Arc<MockerContext>,
    client_addr: SocketAddr,
) -> Result<Response<LoggedBody>, Infallible> {
    let received_at = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = dispatch(req, &context, client_addr).await;

    let pending =
        PendingAccessLog::new(context.port, response.status(), method, path, received_at);
    Ok(response.map(|body| LoggedBody::new(body, pending)))
}

async fn dispatch(
    req: Request<Incoming>,
    context: &Arc<MockerContext>,
    client_addr: SocketAddr,
) -> Response<Full<Bytes>> {
    let route = match resolve_route(&req, context) {
        Ok(route) => route,
        Err(RouteError::MethodNotAllowed) => return method_not_allowed(),
        Err(_) => return not_found(),
    };

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Failed to read request body on port {}: {}", context.port, e);
            return envelope_response(
                StatusCode::BAD_REQUEST,
                &Envelope::error(format!("failed to read request body: {e}")),
            );
        }
    };
    let request = MatchedRequest {
        method: route.method(),
        uri: parts.uri,
        headers: parts.headers,
        body,
        client_addr,
    };

    let response = respond(&route, &request, context).await;

    if route.history {
        let routes = context.manager.routes();
        if let Err(e) =
            routes.append_request(context.port, route.path(), route.method(), request.to_record())
        {
            // Route deleted (or mocker stopped) while the request was in flight
            debug!(
                "History not recorded for {} on port {}: {}",
                route.key, context.port, e
            );
        }
    }

    response
}

fn resolve_route(req: &Request<Incoming>, context: &MockerContext) -> Result<Arc<Route>, RouteError> {
    let routes = context.manager.routes();
    let path = req.uri().path();
    match HttpMethod::try_from(req.method()) {
        Ok(method) => routes.get(context.port, path, method),
        // Verbs no route can be registered for
        Err(_) if routes.has_path(context.port, path) => Err(RouteError::MethodNotAllowed),
        Err(e) => Err(e),
    }
}
