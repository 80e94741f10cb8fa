//! Per-route request history.
//!
//! A ledger is owned by its route entry inside the [`RouteTable`](super::RouteTable),
//! so removing a route drops its history under the same lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::HttpMethod;

/// Subset of request headers kept in history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedHeaders {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl RecordedHeaders {
    pub fn from_header_map(headers: &hyper::HeaderMap) -> Self {
        let value = |name: hyper::header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            connection: value(hyper::header::CONNECTION),
            content_type: value(hyper::header::CONTENT_TYPE),
        }
    }
}

/// A request that matched a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Peer IP, without the port
    pub ip: String,
    pub method: HttpMethod,
    /// Request target as received (path and query)
    pub url: String,
    pub header: RecordedHeaders,
    pub body: String,
    pub date: DateTime<Utc>,
}

/// Append-only log of the requests that matched one route.
#[derive(Debug, Clone, Default)]
pub struct RequestLedger {
    records: Vec<RequestRecord>,
}

impl RequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: RequestRecord) {
        self.records.push(record);
    }

    /// Records in insertion order.
    pub fn list(&self) -> Vec<RequestRecord> {
        self.records.clone()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> RequestRecord {
        RequestRecord {
            ip: "127.0.0.1".to_string(),
            method: HttpMethod::Post,
            url: url.to_string(),
            header: RecordedHeaders::default(),
            body: String::new(),
            date: Utc::now(),
        }
    }

    #[test]
    fn test_append_keeps_order() {
        let mut ledger = RequestLedger::new();
        ledger.append(record("/oi?n=1"));
        ledger.append(record("/oi?n=2"));
        ledger.append(record("/oi?n=1"));

        let urls: Vec<_> = ledger.list().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["/oi?n=1", "/oi?n=2", "/oi?n=1"]);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut ledger = RequestLedger::new();
        ledger.clear();
        assert!(ledger.is_empty());

        ledger.append(record("/oi"));
        assert_eq!(ledger.len(), 1);
        ledger.clear();
        ledger.clear();
        assert!(ledger.list().is_empty());
    }

    #[test]
    fn test_recorded_headers_subset() {
        let mut headers = hyper::HeaderMap::new();
        headers.insert(hyper::header::CONNECTION, "close".parse().unwrap());
        headers.insert(
            hyper::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded".parse().unwrap(),
        );
        headers.insert(hyper::header::USER_AGENT, "curl/8".parse().unwrap());

        let recorded = RecordedHeaders::from_header_map(&headers);
        assert_eq!(
            serde_json::to_string(&recorded).unwrap(),
            r#"{"connection":"close","contentType":"application/x-www-form-urlencoded"}"#
        );

        let empty = RecordedHeaders::from_header_map(&hyper::HeaderMap::new());
        assert_eq!(serde_json::to_string(&empty).unwrap(), "{}");
    }

    #[test]
    fn test_record_wire_shape() {
        let value = serde_json::to_value(record("/oi")).unwrap();
        assert_eq!(value["ip"], "127.0.0.1");
        assert_eq!(value["method"], "POST");
        assert_eq!(value["url"], "/oi");
        assert_eq!(value["body"], "");
        assert!(value["date"].is_string());
    }
}
