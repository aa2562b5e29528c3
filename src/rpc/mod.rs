//! JSON-RPC 2.0 plumbing shared by the server and the client.
//!
//! - `types`: request/response/error objects
//! - `client`: request-ID helper

pub mod client;
pub mod types;

pub use client::RpcClient;
pub use types::{
    RpcError, RpcRequest, RpcResponse, RpcServerRequest, RpcServerResponse, JSON_RPC_VERSION,
};
