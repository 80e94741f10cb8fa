//! One log line per answered request.
//!
//! The line is written once the response body has been fully handed to
//! the connection, so `elapsed_ms` covers the whole exchange.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::{Body, Frame, SizeHint};
use hyper::StatusCode;
use serde::Serialize;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::metrics;

/// Access log entry for a single response.
#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    /// `%Y-%m-%d %H:%M:%S`, UTC
    pub date: String,
    /// Port of the listener that answered
    pub port: u16,
    pub status: u16,
    pub method: String,
    pub path: String,
    pub elapsed_ms: f64,
}

impl AccessLogEntry {
    pub fn new(
        port: u16,
        status: StatusCode,
        method: &str,
        path: &str,
        elapsed: Duration,
    ) -> Self {
        Self {
            date: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            port,
            status: status.as_u16(),
            method: method.to_string(),
            path: path.to_string(),
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }

    /// Emit the entry on the `kitty_mocker::access` target and update metrics.
    pub fn emit(&self) {
        metrics::record_request(&self.method, self.status, self.elapsed_ms);

        macro_rules! log_at {
            ($level:ident) => {
                $level!(
                    target: "kitty_mocker::access",
                    date = %self.date,
                    port = self.port,
                    status = self.status,
                    method = %self.method,
                    path = %self.path,
                    elapsed_ms = self.elapsed_ms,
                    "{} {:>7} {}",
                    self.status,
                    self.method,
                    self.path
                )
            };
        }

        match self.status {
            500.. => log_at!(error),
            400..=499 => log_at!(warn),
            _ => log_at!(info),
        }
    }
}

/// Request data kept until the response is written.
#[derive(Debug)]
pub struct PendingAccessLog {
    port: u16,
    status: StatusCode,
    method: String,
    path: String,
    received_at: Instant,
}

impl PendingAccessLog {
    pub fn new(
        port: u16,
        status: StatusCode,
        method: String,
        path: String,
        received_at: Instant,
    ) -> Self {
        Self {
            port,
            status,
            method,
            path,
            received_at,
        }
    }

    fn emit(self) {
        AccessLogEntry::new(
            self.port,
            self.status,
            &self.method,
            &self.path,
            self.received_at.elapsed(),
        )
        .emit();
    }
}

/// Response body that writes the access log when it completes.
///
/// Completion is the last frame being polled, or the body being dropped
/// by the connection (bodies known to be empty are never polled).
#[derive(Debug)]
pub struct LoggedBody {
    inner: Full<Bytes>,
    pending: Option<PendingAccessLog>,
}

impl LoggedBody {
    pub fn new(inner: Full<Bytes>, pending: PendingAccessLog) -> Self {
        Self {
            inner,
            pending: Some(pending),
        }
    }

    fn finish(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.emit();
        }
    }
}

impl Body for LoggedBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        let this = self.get_mut();
        let frame = Pin::new(&mut this.inner).poll_frame(cx);
        if let Poll::Ready(None) = frame {
            this.finish();
        }
        frame
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for LoggedBody {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn pending() -> PendingAccessLog {
        PendingAccessLog::new(
            5000,
            StatusCode::OK,
            "GET".to_string(),
            "/oi".to_string(),
            Instant::now(),
        )
    }

    #[tokio::test]
    async fn test_logged_body_emits_after_last_frame() {
        let mut body = LoggedBody::new(Full::new(Bytes::from_static(b"sddfsdf")), pending());

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"sddfsdf"));
        // Data handed over, stream not finished yet
        assert!(body.pending.is_some());

        assert!(body.frame().await.is_none());
        assert!(body.pending.is_none());
    }

    #[test]
    fn test_logged_body_emits_on_drop() {
        let body = LoggedBody::new(Full::new(Bytes::new()), pending());
        assert!(body.is_end_stream());
        assert!(body.pending.is_some());
        drop(body);
    }

    #[test]
    fn test_entry_fields() {
        let entry = AccessLogEntry::new(
            5000,
            StatusCode::NOT_FOUND,
            "POST",
            "/oi",
            Duration::from_micros(1500),
        );
        assert_eq!(entry.port, 5000);
        assert_eq!(entry.status, 404);
        assert_eq!(entry.method, "POST");
        assert_eq!(entry.path, "/oi");
        assert!((entry.elapsed_ms - 1.5).abs() < 1e-9);
        // 2024-01-01 00:00:00
        assert_eq!(entry.date.len(), 19);
        entry.emit();
    }
}
