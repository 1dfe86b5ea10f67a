//! An asynchronous HTTP/1.x server core with streaming multipart uploads,
//! chunked responses, a simplified regex router, a Hixie-76 WebSocket
//! upgrade path, and an outbound HTTP client.
//!
//! The parsing and dispatch logic in [`http::connection::Connection`] never
//! touches a socket; [`server::Server`] is a thin mio-based runtime that
//! feeds it bytes and drains its output. This split is what makes the core
//! testable against plain `Vec<u8>` buffers.

pub mod action;
pub mod client_request;
pub mod config;
pub mod error;
pub mod headers;
pub mod http;
pub mod router;
pub mod server;
pub mod websocket;

pub use action::{DefaultAction, ErrorActionRegistry, HttpAction, Method};
pub use config::Settings;
pub use error::{RequestError, ServerError};
pub use http::connection::Connection;
pub use router::{Dispatcher, Router, RouterBuilder};
pub use server::Server;
