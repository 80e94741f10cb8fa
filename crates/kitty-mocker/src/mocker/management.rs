//! Responders behind every route.
//!
//! User routes answer with their canned response; the built-in routes
//! registered on each mocker implement status, teardown, route CRUD and
//! history CRUD.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use super::handler::{MatchedRequest, MockerContext};
use super::types::MockerError;
use crate::response::{empty_response, envelope_response, json_response, not_found, Envelope};
use crate::routes::{
    HttpMethod, Responder, Route, RouteDefinition, RouteError, StaticResponse, HISTORY_ENDPOINT,
    ROUTE_ENDPOINT,
};

/// Routes every created mocker starts with, in registration order.
pub fn builtin_routes() -> Vec<Route> {
    vec![
        Route::new("/", HttpMethod::Get, Responder::Status),
        Route::new("/", HttpMethod::Delete, Responder::Stop),
        Route::new(ROUTE_ENDPOINT, HttpMethod::Get, Responder::RouteCrud),
        Route::new(ROUTE_ENDPOINT, HttpMethod::Post, Responder::RouteCrud),
        Route::new(ROUTE_ENDPOINT, HttpMethod::Delete, Responder::RouteCrud),
        Route::new(HISTORY_ENDPOINT, HttpMethod::Get, Responder::HistoryCrud),
        Route::new(HISTORY_ENDPOINT, HttpMethod::Delete, Responder::HistoryCrud),
    ]
}

/// The single route of the root dispatcher.
///
/// The root has no history endpoint to read from, so nothing is recorded.
pub fn create_route() -> Route {
    Route::new("/create", HttpMethod::Post, Responder::CreateMocker).without_history()
}

/// Run the responder of a matched route.
pub(super) async fn respond(
    route: &Route,
    request: &MatchedRequest,
    context: &Arc<MockerContext>,
) -> Response<Full<Bytes>> {
    match &route.responder {
        Responder::Static(response) => static_response(response),
        Responder::Status => empty_response(StatusCode::NO_CONTENT),
        Responder::Stop => stop_mocker(context),
        Responder::RouteCrud => match request.method {
            HttpMethod::Get => list_routes(context),
            HttpMethod::Post => create_route_from_body(request, context),
            _ => delete_route(request, context),
        },
        Responder::HistoryCrud => match request.method {
            HttpMethod::Get => list_history(request, context),
            _ => clear_history(request, context),
        },
        Responder::CreateMocker => create_mocker(context).await,
    }
}

fn static_response(response: &StaticResponse) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(response.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return empty_response(status);
    }
    json_response(status, &response.body)
}

/// Reply first, tear down in the background.
fn stop_mocker(context: &Arc<MockerContext>) -> Response<Full<Bytes>> {
    let manager = Arc::clone(&context.manager);
    let port = context.port;
    tokio::spawn(async move {
        if let Err(e) = manager.stop(port).await {
            error!("Failed to stop mocker on port {}: {}", port, e);
        }
    });
    empty_response(StatusCode::NO_CONTENT)
}

fn list_routes(context: &MockerContext) -> Response<Full<Bytes>> {
    let keys: Vec<_> = context
        .manager
        .routes()
        .list(context.port)
        .into_iter()
        .filter(|key| !key.is_reserved())
        .collect();

    // Listing is delivered as a JSON document inside a string
    match serde_json::to_string(&keys) {
        Ok(listing) => envelope_response(
            StatusCode::OK,
            &Envelope::success().with_data(json!(listing)),
        ),
        Err(e) => envelope_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &Envelope::error(e.to_string()),
        ),
    }
}

fn create_route_from_body(
    request: &MatchedRequest,
    context: &MockerContext,
) -> Response<Full<Bytes>> {
    let definition: RouteDefinition = match serde_json::from_slice(&request.body) {
        Ok(definition) => definition,
        Err(e) => {
            let detail = if e.classify() == serde_json::error::Category::Eof {
                "Unexpected end of JSON input".to_string()
            } else {
                e.to_string()
            };
            return envelope_response(
                StatusCode::BAD_REQUEST,
                &Envelope::error(format!("request missing body. {detail}")),
            );
        }
    };

    let route = match definition.into_route() {
        Ok(route) => route,
        Err(e) => return route_error_response(&e),
    };
    match context.manager.add_route(context.port, route) {
        Ok(()) => envelope_response(
            StatusCode::OK,
            &Envelope::success().with_message("route successfully created"),
        ),
        Err(MockerError::Route(e)) => route_error_response(&e),
        Err(e) => envelope_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &Envelope::error(e.to_string()),
        ),
    }
}

fn delete_route(request: &MatchedRequest, context: &MockerContext) -> Response<Full<Bytes>> {
    let Some((path, method)) = route_query(request) else {
        return not_found();
    };
    // Built-in routes are not exposed for deletion
    if crate::routes::is_reserved_path(&path) {
        return not_found();
    }
    match context.manager.delete_route(context.port, &path, method) {
        Ok(_) => empty_response(StatusCode::NO_CONTENT),
        Err(_) => not_found(),
    }
}

fn list_history(request: &MatchedRequest, context: &MockerContext) -> Response<Full<Bytes>> {
    let records = route_query(request)
        .map(|(path, method)| context.manager.routes().requests(context.port, &path, method))
        .unwrap_or_default();

    match serde_json::to_value(&records) {
        Ok(data) => envelope_response(StatusCode::OK, &Envelope::success().with_data(data)),
        Err(e) => envelope_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &Envelope::error(e.to_string()),
        ),
    }
}

fn clear_history(request: &MatchedRequest, context: &MockerContext) -> Response<Full<Bytes>> {
    if let Some((path, method)) = route_query(request) {
        context
            .manager
            .routes()
            .clear_requests(context.port, &path, method);
    }
    empty_response(StatusCode::NO_CONTENT)
}

async fn create_mocker(context: &Arc<MockerContext>) -> Response<Full<Bytes>> {
    match context.manager.create().await {
        Ok(port) => {
            info!("Mocker created on port {} via port {}", port, context.port);
            envelope_response(
                StatusCode::OK,
                &Envelope::success()
                    .with_data(json!({ "port": port.to_string() }))
                    .with_message("mocker successfully created"),
            )
        }
        Err(e) => {
            error!("Failed to create mocker: {}", e);
            envelope_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &Envelope::error(e.to_string()),
            )
        }
    }
}

/// `path` and `method` query parameters identifying a route.
fn route_query(request: &MatchedRequest) -> Option<(String, HttpMethod)> {
    let mut query = request.query();
    let method = HttpMethod::parse(query.get("method")?)?;
    let path = query.remove("path")?;
    Some((path, method))
}

fn route_error_response(err: &RouteError) -> Response<Full<Bytes>> {
    envelope_response(err.status_code(), &Envelope::fail(err.envelope_message()))
}
