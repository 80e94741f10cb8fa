//! Route definitions and routing errors.

use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status codes a canned response may use.
///
/// Informational codes are excluded: hyper replaces a non-101 1xx final
/// status with `500`, and `101` would switch protocols.
pub const RESPONSE_CODES: std::ops::RangeInclusive<u16> = 200..=599;

/// Prefix reserved for the per-mocker management endpoints.
pub const RESERVED_PREFIX: &str = "/=^.^=";

/// Route CRUD endpoint of every mocker.
pub const ROUTE_ENDPOINT: &str = "/=^.^=/route";

/// History CRUD endpoint of every mocker.
pub const HISTORY_ENDPOINT: &str = "/=^.^=/history";

/// HTTP verbs a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Parse a method name, ignoring ASCII case.
    pub fn parse(method: &str) -> Option<Self> {
        let method = match method.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&hyper::Method> for HttpMethod {
    type Error = RouteError;

    fn try_from(method: &hyper::Method) -> Result<Self, Self::Error> {
        Self::parse(method.as_str()).ok_or_else(|| RouteError::InvalidMethod(method.to_string()))
    }
}

/// Identity of a route within one mocker: the `(path, method)` pair.
///
/// Also the wire shape used when listing routes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub path: String,
    pub method: HttpMethod,
}

impl RouteKey {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }

    /// Whether this key lives under the management prefix.
    pub fn is_reserved(&self) -> bool {
        is_reserved_path(&self.path)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

pub fn is_reserved_path(path: &str) -> bool {
    path == RESERVED_PREFIX || path.starts_with("/=^.^=/")
}

/// Canned response served by a user-defined route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticResponse {
    pub code: u16,
    pub body: serde_json::Value,
}

/// What a matched route does.
///
/// Built-in management endpoints and user-defined routes share the route
/// table and are invoked the same way; only the responder differs.
#[derive(Debug, Clone, PartialEq)]
pub enum Responder {
    /// User-defined canned response
    Static(StaticResponse),
    /// `GET /` liveness probe
    Status,
    /// `DELETE /` teardown
    Stop,
    /// Route CRUD under the reserved prefix
    RouteCrud,
    /// History CRUD under the reserved prefix
    HistoryCrud,
    /// `POST /create` on the root dispatcher
    CreateMocker,
}

/// A registered route.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub key: RouteKey,
    pub responder: Responder,
    /// Whether matched requests are appended to the route's ledger
    pub history: bool,
}

impl Route {
    pub fn new(path: impl Into<String>, method: HttpMethod, responder: Responder) -> Self {
        Self {
            key: RouteKey::new(path, method),
            responder,
            history: true,
        }
    }

    pub fn without_history(mut self) -> Self {
        self.history = false;
        self
    }

    pub fn path(&self) -> &str {
        &self.key.path
    }

    pub fn method(&self) -> HttpMethod {
        self.key.method
    }

    /// Check the invariants every registered route must hold.
    pub fn validate(&self) -> Result<(), RouteError> {
        if !self.key.path.starts_with('/') {
            return Err(RouteError::InvalidPath(self.key.path.clone()));
        }
        if let Responder::Static(response) = &self.responder {
            if !RESPONSE_CODES.contains(&response.code) {
                return Err(RouteError::InvalidResponseCode(i64::from(response.code)));
            }
        }
        Ok(())
    }
}

/// Route registration payload as sent by clients.
///
/// Every field defaults so that missing pieces surface as validation
/// failures rather than parse errors.
///
/// ```json
/// {"filters": {"path": "/users", "method": "GET"}, "response": {"code": 200, "body": []}}
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteDefinition {
    #[serde(default)]
    pub filters: RouteFilters,
    #[serde(default)]
    pub response: ResponseDefinition,
    #[serde(default)]
    pub history: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteFilters {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub method: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseDefinition {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl RouteDefinition {
    /// Validate the definition into a static route.
    pub fn into_route(self) -> Result<Route, RouteError> {
        let path = self.filters.path;
        if !path.starts_with('/') || is_reserved_path(&path) {
            return Err(RouteError::InvalidPath(path));
        }

        let method = HttpMethod::parse(&self.filters.method)
            .ok_or(RouteError::InvalidMethod(self.filters.method))?;

        let raw_code = self.response.code;
        let code = u16::try_from(raw_code)
            .ok()
            .filter(|code| RESPONSE_CODES.contains(code))
            .ok_or(RouteError::InvalidResponseCode(raw_code))?;

        let responder = Responder::Static(StaticResponse {
            code,
            body: self.response.body,
        });
        let route = Route::new(path, method, responder);
        Ok(match self.history {
            Some(false) => route.without_history(),
            _ => route,
        })
    }
}

/// Routing failures.
///
/// Display strings are the client-visible envelope messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("route already created in this mocker")]
    Duplicate(RouteKey),
    #[error("request with invalid route path")]
    InvalidPath(String),
    #[error("request with invalid route method")]
    InvalidMethod(String),
    #[error("request with invalid route response code")]
    InvalidResponseCode(i64),
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl RouteError {
    /// HTTP status a management endpoint replies with for this error.
    ///
    /// Validation and conflict failures are reported in a `200` fail envelope.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::OK,
        }
    }

    pub fn envelope_message(&self) -> String {
        self.to_string()
    }
}
