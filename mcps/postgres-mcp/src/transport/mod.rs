//! Transports serving the MCP server core
//!
//! stdio carries a single ordered session. The optional HTTP transport
//! accepts requests from any number of clients and pushes every response to
//! all SSE subscribers.

pub mod http;
pub mod jsonrpc;
pub mod stdio;
pub mod subscribers;

pub use http::{router, HttpState, HttpTransport};
pub use jsonrpc::{JsonRpcRequest, JsonRpcResponse, ProtocolError};
pub use stdio::serve_stdio;
pub use subscribers::{SubscriberHub, Subscription};
