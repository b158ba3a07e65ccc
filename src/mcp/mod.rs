//! MCP (Model Context Protocol) server side.
//!
//! **Server** (`McpServer`): transport-independent JSON-RPC 2.0 dispatcher
//! wrapping one adapter.
//!
//! **Transports**: `stdio` (line-delimited JSON, what desktop hosts spawn)
//! and `http` (`POST /mcp` on axum).
//!
//! Spec: <https://spec.modelcontextprotocol.io/2024-11-05/>

pub mod http;
pub mod server;
pub mod stdio;

pub use server::McpServer;
