//! Outbound HTTP client: request building and response parsing (spec §4.9).
//!
//! Grounded on `HttpRequest` in the original `http.py`, reusing this crate's
//! own `ReadBuffer` delimiter/length primitives and header-canonicalization
//! helpers rather than re-deriving them. The original's cookie-flag parsing
//! bug is preserved deliberately: `HttpOnly`/`secure` attributes are compared
//! against the untrimmed piece of a `Set-Cookie` header, so the leading
//! space left by `split(';')` means neither flag is ever actually set from
//! the wire. That is not fixed here — see DESIGN.md.

use crate::error::RequestError;
use crate::headers::{canonical_header_key, HeaderMap};
use crate::http::buffer::{DelimiterOutcome, ReadBuffer};
use crate::http::multipart::split_header_lines;

const ALLOWED_METHODS: &[&str] =
    &["CONNECT", "DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT", "TRACE"];

/// Builds the bytes of an outbound HTTP/1.1 request.
pub struct RequestBuilder {
    method: String,
    path: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl RequestBuilder {
    pub fn new(method: &str, path: &str) -> Result<RequestBuilder, RequestError> {
        let upper = method.to_uppercase();
        if !ALLOWED_METHODS.contains(&upper.as_str()) {
            return Err(RequestError::UnsupportedMethod(method.to_owned()));
        }
        Ok(RequestBuilder {
            method: upper,
            path: path.to_owned(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        })
    }

    pub fn header(mut self, name: &str, value: &str) -> RequestBuilder {
        self.headers.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> RequestBuilder {
        self.body = body;
        self
    }

    /// Assembles the request line, headers (auto-filling `Host` and
    /// `Content-Length` when needed), and body into the bytes to send.
    pub fn build(self, host: &str) -> Vec<u8> {
        let mut out = format!("{} {} HTTP/1.1\r\n", self.method, self.path).into_bytes();
        let mut wrote_host = false;
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("host") {
                wrote_host = true;
            }
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        if !wrote_host {
            out.extend_from_slice(format!("Host: {}\r\n", host).as_bytes());
        }
        if !self.body.is_empty() && !self.headers.contains_key("Content-Length") {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseCookie {
    pub name: String,
    pub value: String,
    pub http_only: bool,
    pub secure: bool,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HeaderMap,
    pub cookies: Vec<ResponseCookie>,
    pub body: Vec<u8>,
}

/// Parses a complete, already-received response buffer. Requires the whole
/// response (status line, headers, and body) to be present; this crate's
/// outbound client is not itself incremental the way the server side is,
/// matching spec §4.9's narrower scope for the client.
pub fn parse_response(raw: &[u8]) -> Result<HttpResponse, RequestError> {
    let mut buf = ReadBuffer::new();
    buf.extend(raw);

    let status_line = match buf.try_take_delimiter(b"\r\n", 0) {
        DelimiterOutcome::Found(line) => line,
        _ => return Err(RequestError::MalformedResponseLine(String::new())),
    };
    let text = String::from_utf8_lossy(&status_line).into_owned();
    let trimmed = text.trim_end_matches(['\r', '\n']).to_owned();
    let mut parts = trimmed.splitn(3, ' ');
    let protocol = parts.next().ok_or_else(|| RequestError::MalformedResponseLine(trimmed.clone()))?;
    let code_str = parts.next().ok_or_else(|| RequestError::MalformedResponseLine(trimmed.clone()))?;
    if protocol != "HTTP/1.0" && protocol != "HTTP/1.1" {
        return Err(RequestError::UnsupportedProtocol(protocol.to_owned()));
    }
    let status_code: u16 = code_str
        .parse()
        .map_err(|_| RequestError::MalformedResponseLine(trimmed.clone()))?;

    buf.reset_scan();
    let header_block = match buf.try_take_delimiter(b"\r\n\r\n", 0) {
        DelimiterOutcome::Found(data) => data,
        _ => return Err(RequestError::InvalidHeaders("missing header terminator".to_owned())),
    };

    let mut headers = HeaderMap::new();
    let mut cookies = Vec::new();
    for (name, value) in split_header_lines(&header_block) {
        if name.eq_ignore_ascii_case("Set-Cookie") {
            cookies.push(parse_response_cookie(&value));
        }
        headers.insert(canonical_header_key(&name), value);
    }

    let body = if headers
        .get("HTTP_TRANSFER_ENCODING")
        .map(|v| v.eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
    {
        read_chunked_body(&mut buf)?
    } else if let Some(len) = headers.get("HTTP_CONTENT_LENGTH").and_then(|v| v.parse::<usize>().ok()) {
        buf.try_take_length(len).unwrap_or_else(|| buf.as_slice().to_vec())
    } else {
        return Err(RequestError::MissingContentLength);
    };

    Ok(HttpResponse { status_code, headers, cookies, body })
}

fn read_chunked_body(buf: &mut ReadBuffer) -> Result<Vec<u8>, RequestError> {
    let mut body = Vec::new();
    loop {
        buf.reset_scan();
        let size_line = match buf.try_take_delimiter(b"\r\n", 0) {
            DelimiterOutcome::Found(line) => line,
            _ => return Err(RequestError::InvalidHeaders("truncated chunk size".to_owned())),
        };
        let text = String::from_utf8_lossy(&size_line).into_owned();
        let trimmed = text.trim_end_matches(['\r', '\n']);
        let size = usize::from_str_radix(trimmed, 16)
            .map_err(|_| RequestError::InvalidHeaders(format!("bad chunk size '{}'", trimmed)))?;
        if size == 0 {
            break;
        }
        let chunk = buf
            .try_take_length(size)
            .ok_or_else(|| RequestError::InvalidHeaders("truncated chunk body".to_owned()))?;
        body.extend_from_slice(&chunk);
        buf.reset_scan();
        let _ = buf.try_take_length(2);
    }
    Ok(body)
}

fn parse_response_cookie(value: &str) -> ResponseCookie {
    let mut cookie = ResponseCookie::default();
    for (i, part) in value.split(';').enumerate() {
        if i == 0 {
            if let Some((name, val)) = part.split_once('=') {
                cookie.name = name.trim().to_owned();
                cookie.value = val.to_owned();
            }
            continue;
        }
        // Preserved defect: `part` still carries the leading space left by
        // `split(';')`, so it never equals the bare attribute name and these
        // flags never actually get set from a real `Set-Cookie` header.
        if part == "HttpOnly" {
            cookie.http_only = true;
        }
        if part == "secure" {
            cookie.secure = true;
        }
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_request_with_auto_host_and_content_length() {
        let bytes = RequestBuilder::new("post", "/submit")
            .unwrap()
            .body(b"a=1".to_vec())
            .build("example.invalid");
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("POST /submit HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.invalid\r\n"));
        assert!(text.contains("Content-Length: 3\r\n"));
        assert!(text.ends_with("a=1"));
    }

    #[test]
    fn rejects_unsupported_method() {
        assert!(RequestBuilder::new("PATCH", "/").is_err());
    }

    #[test]
    fn parses_content_length_response() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.body, b"hello");
    }

    #[test]
    fn parses_chunked_response_tolerating_either_terminator() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n\r\n";
        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.body, b"hello");
    }

    #[test]
    fn set_cookie_flags_are_never_actually_set() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nSet-Cookie: a=b; HttpOnly; secure\r\n\r\n";
        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.cookies.len(), 1);
        assert!(!resp.cookies[0].http_only);
        assert!(!resp.cookies[0].secure);
    }
}
