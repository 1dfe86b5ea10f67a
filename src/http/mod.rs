//! The HTTP/1.x connection core: read buffer, request/response state
//! machine, multipart engine, response composition, and static file serving.

pub mod buffer;
pub mod connection;
pub mod multipart;
pub mod response;
pub mod static_file;

pub use connection::Connection;
