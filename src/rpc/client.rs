//! Request-ID bookkeeping for JSON-RPC clients.
//!
//! The transport is left to the caller; see `crate::client` for the reqwest
//! implementation.
//!
//! ```
//! use loophub::rpc::RpcClient;
//! use serde_json::json;
//!
//! let client = RpcClient::new("http://localhost:3030/rpc");
//! let first = client.build_request("thread.list", json!({"community": "rust"}));
//! let second = client.build_request("thread.get", json!({}));
//! assert_eq!(first.id, 1);
//! assert_eq!(second.id, 2);
//! ```

use super::types::RpcRequest;
use std::sync::atomic::{AtomicU64, Ordering};

/// Holds the endpoint and hands out increasing request IDs.
#[derive(Debug)]
pub struct RpcClient {
    /// RPC endpoint URL.
    pub endpoint: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the next request ID and advances the counter.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Builds a request with the next ID.
    pub fn build_request(&self, method: &'static str, params: impl serde::Serialize) -> RpcRequest {
        RpcRequest::with_id(method, params, self.next_id())
    }
}

impl Clone for RpcClient {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_increment() {
        let client = RpcClient::new("http://localhost/rpc");
        assert_eq!(client.next_id(), 1);
        assert_eq!(client.next_id(), 2);
        let req = client.build_request("vote.cast", json!({}));
        assert_eq!(req.id, 3);
        assert_eq!(req.method, "vote.cast");
    }

    #[test]
    fn test_clone_restarts_ids() {
        let client = RpcClient::new("http://localhost/rpc");
        client.next_id();
        let cloned = client.clone();
        assert_eq!(cloned.endpoint, client.endpoint);
        assert_eq!(cloned.next_id(), 1);
    }
}
