//! JSON-RPC 2.0 wire objects.
//!
//! The client sends [`RpcRequest`] and reads [`RpcResponse`]; the server reads
//! [`RpcServerRequest`] and answers with [`RpcServerResponse`]. Failures on
//! either side travel as [`RpcError`], whose application codes mirror the
//! kinds of [`LoopHubError`].

use crate::error::LoopHubError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSON_RPC_VERSION: &str = "2.0";

/// Outgoing call from the client.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
    pub id: u64,
}

impl RpcRequest {
    pub fn with_id(method: &'static str, params: impl Serialize, id: u64) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION,
            method,
            params: serde_json::to_value(params).unwrap_or(Value::Null),
            id,
        }
    }
}

/// Server answer as the client parses it. Exactly one of `result` and
/// `error` is set by a conforming server.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<Value>,
    pub error: Option<RpcError>,
    pub id: Option<Value>,
}

/// Call as the server receives it. `params` may be omitted; handlers treat a
/// missing object as empty.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcServerRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Option<Value>,
}

impl RpcServerRequest {
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.jsonrpc != JSON_RPC_VERSION {
            return Err("Invalid JSON-RPC version");
        }
        if self.method.is_empty() {
            return Err("Method name required");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcServerResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<Value>,
}

impl RpcServerResponse {
    pub fn success(id: Option<Value>, result: impl Serialize) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION,
            result: Some(serde_json::to_value(result).unwrap_or(Value::Null)),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION,
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// JSON-RPC error object.
///
/// | code   | meaning                         | library error      |
/// |--------|---------------------------------|--------------------|
/// | -32600 | malformed request               |                    |
/// | -32601 | unknown method                  |                    |
/// | -32602 | params do not deserialize       | `Validation`       |
/// | -32603 | server fault                    | everything else    |
/// | -32001 | entity missing or hidden        | `NotFound`         |
/// | -32002 | input rejected                  | `Validation`       |
/// | -32003 | too many requests               | `RateLimited`      |
/// | -32004 | a bounded resource is full      | `QueueFull`        |
/// | -32005 | no valid session                | `Unauthorized`     |
/// | -32006 | role, level or ban forbids this | `PermissionDenied` |
/// | -32007 | clashes with existing state     | `Conflict`         |
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const NOT_FOUND: i32 = -32001;
    pub const VALIDATION_FAILED: i32 = -32002;
    pub const RATE_LIMITED: i32 = -32003;
    pub const RESOURCE_EXHAUSTED: i32 = -32004;
    pub const UNAUTHORIZED: i32 = -32005;
    pub const FORBIDDEN: i32 = -32006;
    pub const CONFLICT: i32 = -32007;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, msg)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method '{}' not found", method))
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, msg)
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(Self::NOT_FOUND, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(Self::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(Self::FORBIDDEN, msg)
    }

    /// Whether resending the same call can never succeed. Server faults,
    /// throttling and full resources may clear up.
    pub fn is_permanent(&self) -> bool {
        !matches!(
            self.code,
            Self::INTERNAL_ERROR | Self::RATE_LIMITED | Self::RESOURCE_EXHAUSTED
        )
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<LoopHubError> for RpcError {
    fn from(err: LoopHubError) -> Self {
        let (code, message) = match err {
            LoopHubError::Validation(msg) => (Self::VALIDATION_FAILED, msg),
            LoopHubError::NotFound(msg) => (Self::NOT_FOUND, msg),
            LoopHubError::PermissionDenied(msg) => (Self::FORBIDDEN, msg),
            LoopHubError::Unauthorized(msg) => (Self::UNAUTHORIZED, msg),
            LoopHubError::Conflict(msg) => (Self::CONFLICT, msg),
            LoopHubError::RateLimited(msg) => (Self::RATE_LIMITED, msg),
            LoopHubError::QueueFull(msg) => (Self::RESOURCE_EXHAUSTED, msg),
            other => (Self::INTERNAL_ERROR, other.to_string()),
        };
        Self::new(code, message)
    }
}

/// Lets client code surface server errors with the same kinds the service
/// raised them with.
impl From<RpcError> for LoopHubError {
    fn from(err: RpcError) -> Self {
        let RpcError { code, message, .. } = err;
        match code {
            RpcError::VALIDATION_FAILED | RpcError::INVALID_PARAMS => LoopHubError::Validation(message),
            RpcError::NOT_FOUND => LoopHubError::NotFound(message),
            RpcError::FORBIDDEN => LoopHubError::PermissionDenied(message),
            RpcError::UNAUTHORIZED => LoopHubError::Unauthorized(message),
            RpcError::CONFLICT => LoopHubError::Conflict(message),
            RpcError::RATE_LIMITED => LoopHubError::RateLimited(message),
            RpcError::RESOURCE_EXHAUSTED => LoopHubError::QueueFull(message),
            _ => LoopHubError::Network(format!("server error {}: {}", code, message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_kinds_survive_the_wire() {
        let cases = [
            LoopHubError::validation("Thread title cannot be empty"),
            LoopHubError::not_found("Thread 1234 not found"),
            LoopHubError::permission_denied("Reach level 2 to downvote"),
            LoopHubError::unauthorized("Session expired"),
            LoopHubError::conflict("Username 'alice' is already taken"),
        ];
        for err in cases {
            let expected = err.to_string();
            let wire = serde_json::to_value(RpcError::from(err)).unwrap();
            let parsed: RpcError = serde_json::from_value(wire).unwrap();
            assert_eq!(LoopHubError::from(parsed).to_string(), expected);
        }
    }

    #[test]
    fn test_storage_faults_are_internal() {
        let rpc = RpcError::from(LoopHubError::storage("disk full"));
        assert_eq!(rpc.code, RpcError::INTERNAL_ERROR);
        assert!(!rpc.is_permanent());
        assert!(matches!(LoopHubError::from(rpc), LoopHubError::Network(_)));
    }

    #[test]
    fn test_request_shape() {
        let request = RpcRequest::with_id("vote.cast", json!({"direction": "up"}), 9);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"jsonrpc": "2.0", "method": "vote.cast", "params": {"direction": "up"}, "id": 9})
        );
    }

    #[test]
    fn test_server_request_defaults_and_validation() {
        let request: RpcServerRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "community.list", "id": 3}))
                .unwrap();
        assert_eq!(request.params, Value::Null);
        assert!(request.validate().is_ok());

        let old: RpcServerRequest =
            serde_json::from_value(json!({"jsonrpc": "1.0", "method": "community.list"})).unwrap();
        assert!(old.validate().is_err());
        assert!(old.id.is_none());
    }

    #[test]
    fn test_server_response_sets_one_side() {
        let ok = serde_json::to_value(RpcServerResponse::success(Some(json!(1)), "ok")).unwrap();
        assert_eq!(ok["result"], "ok");
        assert!(ok.get("error").is_none());

        let err = serde_json::to_value(RpcServerResponse::error(
            None,
            RpcError::method_not_found("thread.archive"),
        ))
        .unwrap();
        assert_eq!(err["error"]["code"], -32601);
        assert!(err.get("result").is_none());
        assert_eq!(err["id"], Value::Null);
    }

    #[test]
    fn test_throttling_is_retryable() {
        assert!(RpcError::forbidden("Thread is locked").is_permanent());
        assert!(!RpcError::new(RpcError::RATE_LIMITED, "slow down").is_permanent());
    }
}
