//! Response composition: status line, headers, cookies, and the chunked
//! writer with its deliberately non-standard terminator (spec §4.4, §9).
//!
//! Grounded on `compose_headers`/`write`/`flush`/`set_cookie` in the
//! original `http.py`. `compose_headers` runs at most once per request
//! (guarded by `headers_written`, matching the original's own guard) and
//! picks a write mode from whatever the handler has already told it:
//! content-length framing if the handler set `Content-Length` itself (as
//! `serve_static_file` does, since it knows the size upfront), otherwise
//! chunked as long as the protocol supports it (HTTP/1.1+), otherwise
//! close-delimited. This is independent of whether the connection will
//! persist afterward — that only decides the `Connection:` header.

use chrono::{Duration, Utc};

use crate::http::connection::{Connection, WriteMode};

impl Connection {
    /// Returns whether persistence will actually be offered for this
    /// response, accounting for `max_persistent_requests`.
    fn will_persist(&self) -> bool {
        self.is_allowing_persistence
            && self.persistence_type.is_some()
            && self.max_persistent_requests.map_or(true, |max| self.request_count < max)
    }

    /// Writes the status line and headers into the pending write buffer.
    /// Calling this more than once per request is a no-op, matching the
    /// original's `headers_written` guard.
    pub fn compose_headers(&mut self) {
        if self.headers_written {
            return;
        }
        self.headers_written = true;

        let will_persist = self.will_persist();
        let protocol = self
            .in_headers
            .get("SERVER_PROTOCOL")
            .cloned()
            .unwrap_or_else(|| "HTTP/1.1".to_owned());

        // Chunked framing is a property of the protocol and the response
        // (not a static file, which already knows its own length), entirely
        // independent of whether this connection will persist afterward.
        self.write_mode = if self.out_headers.contains_key("Content-Length") {
            WriteMode::ContentLength
        } else if protocol != "HTTP/1.0" {
            WriteMode::Chunked
        } else {
            WriteMode::UntilClose
        };

        let mut head = format!("{} {}\r\n", protocol, self.response_code);
        head.push_str(&format!("Server: {}\r\n", self.settings.server_name));
        head.push_str(&format!(
            "Connection: {}\r\n",
            if will_persist { "keep-alive" } else { "close" }
        ));
        if matches!(self.write_mode, WriteMode::Chunked) {
            head.push_str("Transfer-Encoding: chunked\r\n");
        }
        for (name, value) in &self.out_headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        for cookie in &self.out_cookies {
            head.push_str(&format!("Set-Cookie: {}\r\n", cookie));
        }
        head.push_str("\r\n");

        self.write_buffer.extend_from_slice(head.as_bytes());
    }

    /// Writes body bytes, composing headers first if they haven't been sent
    /// yet. Under chunked framing each call becomes its own chunk.
    pub fn write(&mut self, bytes: &[u8]) {
        if !self.headers_written {
            self.compose_headers();
        }
        match self.write_mode {
            WriteMode::Chunked => {
                self.write_buffer.extend_from_slice(format!("{:x}\r\n", bytes.len()).as_bytes());
                self.write_buffer.extend_from_slice(bytes);
                self.write_buffer.extend_from_slice(b"\r\n");
            }
            _ => self.write_buffer.extend_from_slice(bytes),
        }
    }

    /// No-op kept so call sites read the same way the original's explicit
    /// `flush()` after a response does; output already lives in the pending
    /// write buffer as soon as `write` is called.
    pub fn flush(&mut self) {}

    /// Queues a `Set-Cookie` header. `expires_days` of `None` means a
    /// session cookie.
    pub fn set_cookie(&mut self, name: &str, value: &str, path: Option<&str>, expires_days: Option<i64>) {
        let mut cookie = format!("{}={}", name, value);
        if let Some(p) = path {
            cookie.push_str(&format!("; Path={}", p));
        }
        if let Some(days) = expires_days {
            let expiry = Utc::now() + Duration::days(days);
            cookie.push_str(&format!(
                "; Expires={} {}",
                expiry.format("%a, %d-%b-%Y %H:%M:%S"),
                self.settings.http_gmt_offset
            ));
        }
        self.out_cookies.push(cookie);
    }

    /// Finalizes the response once the dispatched handler has returned:
    /// appends the chunked terminator if chunked framing was used. The
    /// terminator is intentionally `"0\r\n\r\n\r\n"`, not the RFC 7230
    /// `"0\r\n\r\n"` — the original writes the extra trailing `\r\n` and this
    /// crate keeps that behavior rather than silently correcting it.
    pub(crate) fn finish_response(&mut self) {
        if !self.headers_written {
            self.compose_headers();
        }
        if matches!(self.write_mode, WriteMode::Chunked) {
            self.write_buffer.extend_from_slice(b"0\r\n\r\n\r\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use crate::action::{DefaultAction, HttpAction, Method};
    use crate::config::Settings;
    use crate::http::connection::Connection;
    use crate::router::Dispatcher;

    struct NullDispatcher;
    impl Dispatcher for NullDispatcher {
        fn dispatch(&self, _conn: &mut Connection) {}
        fn error(&self, _code: u16, _conn: &mut Connection) {}
    }

    fn new_connection() -> Connection {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        Connection::new(addr, addr, Arc::new(Settings::default()), Arc::new(NullDispatcher))
    }

    #[test]
    fn chunked_write_uses_triple_crlf_terminator() {
        let mut conn = new_connection();
        conn.persistence_type = Some(crate::http::connection::PersistenceType::Protocol);
        conn.in_headers.insert("SERVER_PROTOCOL".to_owned(), "HTTP/1.1".to_owned());
        conn.write(b"hello");
        conn.finish_response();
        let out = String::from_utf8_lossy(&conn.write_buffer).into_owned();
        assert!(out.contains("Transfer-Encoding: chunked"));
        assert!(out.contains("5\r\nhello\r\n"));
        assert!(out.ends_with("0\r\n\r\n\r\n"));
    }

    #[test]
    fn content_length_response_is_not_chunked() {
        let mut conn = new_connection();
        conn.out_headers.insert("Content-Length".to_owned(), "5".to_owned());
        conn.write(b"hello");
        let out = String::from_utf8_lossy(&conn.write_buffer).into_owned();
        assert!(!out.contains("Transfer-Encoding"));
        assert!(out.ends_with("hello"));
    }

    #[test]
    fn max_persistent_requests_forces_close() {
        let mut conn = new_connection();
        conn.persistence_type = Some(crate::http::connection::PersistenceType::Protocol);
        conn.max_persistent_requests = Some(1);
        conn.request_count = 1;
        conn.compose_headers();
        let out = String::from_utf8_lossy(&conn.write_buffer).into_owned();
        assert!(out.contains("Connection: close"));
        // Closing the connection doesn't make this a static file response;
        // chunked framing is still owed since the protocol supports it.
        assert!(out.contains("Transfer-Encoding: chunked"));
    }

    #[test]
    fn default_action_renders_title_under_its_code() {
        let mut conn = new_connection();
        let action = DefaultAction::new("Not Found", "404");
        action.handle(Method::Get, &mut conn);
        let out = String::from_utf8_lossy(&conn.write_buffer).into_owned();
        assert!(out.starts_with("HTTP/1.1 404"));
        assert!(out.contains("<h1>Not Found</h1>"));
    }
}
