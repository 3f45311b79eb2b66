//! Rolling record of every wire call, for human inspection.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of calls retained; the oldest are evicted first.
pub const API_LOG_CAPACITY: usize = 100;

/// One request/response pair as seen by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCall {
    pub timestamp: String,
    /// Identity key the call was made for (`admin` for allocation calls).
    pub identity: String,
    pub method: String,
    pub endpoint: String,
    pub request_body: Option<Value>,
    pub response_body: Value,
    pub response_count: usize,
    pub description: String,
}

impl ApiCall {
    pub fn is_error(&self) -> bool {
        self.response_body.get("error").is_some()
    }
}

/// Capped, most-recent-first call log.
///
/// Appends go through a mutex so concurrent callers never lose entries.
#[derive(Debug)]
pub struct ApiCallLog {
    capacity: usize,
    entries: Mutex<VecDeque<ApiCall>>,
}

impl ApiCallLog {
    pub fn new() -> Self {
        Self::with_capacity(API_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn record(&self, call: ApiCall) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_front(call);
        entries.truncate(self.capacity);
    }

    /// Copy of the log, newest first.
    pub fn entries(&self) -> Vec<ApiCall> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<ApiCall> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.front().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ApiCallLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn call(n: usize) -> ApiCall {
        ApiCall {
            timestamp: format!("t{n}"),
            identity: "client".into(),
            method: "POST".into(),
            endpoint: "/v2/commands/submit-and-wait".into(),
            request_body: None,
            response_body: json!({}),
            response_count: n,
            description: format!("call {n}"),
        }
    }

    #[test]
    fn newest_first() {
        let log = ApiCallLog::new();
        log.record(call(1));
        log.record(call(2));
        let entries = log.entries();
        assert_eq!(entries[0].description, "call 2");
        assert_eq!(entries[1].description, "call 1");
        assert_eq!(log.latest().unwrap().response_count, 2);
    }

    #[test]
    fn error_detection() {
        let mut c = call(1);
        assert!(!c.is_error());
        c.response_body = json!({"error": "boom"});
        assert!(c.is_error());
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let log = Arc::new(ApiCallLog::with_capacity(1000));
        let mut handles = Vec::new();
        for task in 0..8 {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    log.record(call(task * 100 + i));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(log.len(), 400);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity_and_keeps_order(n in 0usize..350) {
            let log = ApiCallLog::new();
            for i in 0..n {
                log.record(call(i));
            }
            let entries = log.entries();
            prop_assert_eq!(entries.len(), n.min(API_LOG_CAPACITY));
            for pair in entries.windows(2) {
                prop_assert!(pair[0].response_count > pair[1].response_count);
            }
            if n > 0 {
                prop_assert_eq!(entries[0].response_count, n - 1);
            }
        }
    }
}
