//! Server-wide settings.
//!
//! These are treated as supplied constants (see spec §6, "Settings"):
//! loading them from a file or environment is a concern of the embedding
//! application, not of this crate.

/// Constants shared by every connection handled by a server.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Maximum number of bytes allowed while scanning for the request line.
    pub http_max_request_length: usize,

    /// Maximum number of bytes allowed while scanning for the end of headers.
    pub http_max_headers_length: usize,

    /// Per-file-part byte ceiling for multipart uploads. `None` means unlimited.
    pub http_max_upload_size: Option<u64>,

    /// Threshold at which the multipart reader flushes buffered bytes to disk.
    pub http_upload_buffer_size: usize,

    /// Directory in which multipart file uploads are spooled.
    pub http_upload_dir: String,

    /// GMT offset string appended to cookie expiry timestamps, e.g. `"-0500"`.
    pub http_gmt_offset: String,

    /// Value written in the `Server:` response header.
    pub server_name: String,

    /// Address the reference runtime listens on.
    pub bind_addr: String,

    /// Maximum persistent requests to serve on one connection before forcing
    /// `Connection: close`. `None` means unbounded.
    pub max_persistent_requests: Option<u32>,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            http_max_request_length: 8 * 1024,
            http_max_headers_length: 16 * 1024,
            http_max_upload_size: None,
            http_upload_buffer_size: 64 * 1024,
            http_upload_dir: "/tmp".to_owned(),
            http_gmt_offset: "+0000".to_owned(),
            server_name: "relay-http".to_owned(),
            bind_addr: "127.0.0.1:8080".to_owned(),
            max_persistent_requests: None,
        }
    }
}
