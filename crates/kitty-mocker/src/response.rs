//! Response envelope and HTTP response helpers.
//!
//! Every JSON response uses the same `{status, data, message}` envelope;
//! `data` and `message` are omitted when unset.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Envelope `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Fail,
    Error,
}

/// Uniform JSON wrapper used on every response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub status: EnvelopeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn new(status: EnvelopeStatus) -> Self {
        Self {
            status,
            data: None,
            message: None,
        }
    }

    pub fn success() -> Self {
        Self::new(EnvelopeStatus::Success)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(EnvelopeStatus::Fail).with_message(message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EnvelopeStatus::Error).with_message(message)
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

const JSON_CONTENT_TYPE: (&str, &str) = ("Content-Type", "application/json");

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(json) => build_response_with_headers(status, [JSON_CONTENT_TYPE], json),
        Err(_) => build_response(StatusCode::INTERNAL_SERVER_ERROR, Bytes::new()),
    }
}

/// Respond with an envelope
pub fn envelope_response(status: StatusCode, envelope: &Envelope) -> Response<Full<Bytes>> {
    json_response(status, envelope)
}

/// Respond with a bodiless JSON response, e.g. `204`
pub fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    build_response_with_headers(status, [JSON_CONTENT_TYPE], Bytes::new())
}

/// `404 {status: "fail", message: "Not found"}`
pub fn not_found() -> Response<Full<Bytes>> {
    envelope_response(StatusCode::NOT_FOUND, &Envelope::fail("Not found"))
}

/// `405 {status: "fail", message: "Method not allowed"}`
pub fn method_not_allowed() -> Response<Full<Bytes>> {
    envelope_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &Envelope::fail("Method not allowed"),
    )
}

/// Build an HTTP response with the given status and body.
///
/// Falls back to a bare response if the builder rejects its input.
pub fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

/// Build an HTTP response with headers.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}
