//! The per-connection HTTP/1.x state machine (spec §4.2).
//!
//! `Connection` never touches a socket. It is fed bytes through [`feed`], asks
//! to have buffered output written through [`pending_write`], and is told that
//! output has drained through [`on_write_finished`] — the same split the
//! teacher's `SocketHandler`/`Update` bridge makes in
//! `socket_handler/mod.rs`, which is what lets this whole parser be driven
//! from plain `Vec<u8>` buffers in tests instead of real sockets. The state
//! transitions themselves (request line → headers → content negotiation →
//! body → dispatch → reset) are grounded line-for-line on `HttpClient` in the
//! original `http.py`; the explicit-enum-plus-dispatch-loop shape of the
//! machinery is grounded on `Http1HandlerState` in
//! `socket_handler/http1.rs`.

use std::collections::HashMap;
use std::fs::File;
use std::net::SocketAddr;
use std::sync::Arc;

use url::form_urlencoded;

use crate::action::Method;
use crate::config::Settings;
use crate::headers::{canonical_header_key, insert_param, parse_cookie_header, HeaderMap, ParamMap};
use crate::http::buffer::{DelimiterOutcome, ReadBuffer};
use crate::http::multipart::{
    parse_content_disposition, random_temp_path, split_header_lines, OpenUpload, UploadRecord,
    UploadSlot, MAX_FIELD_BYTES,
};
use crate::http::static_file::StaticFile;
use crate::router::Dispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    RequestLine,
    Headers,
    UrlencodedBody(usize),
    MultipartBoundaryInit,
    PostBoundary,
    PartHeaders,
    FieldBody,
    FileBody,
    WebSocketThirdKey,
    WebSocketMessage,
    /// No reader armed; waiting for [`Connection::on_write_finished`].
    AwaitingWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PersistenceType {
    /// HTTP/1.1 requests are persistent unless told otherwise.
    Protocol,
    /// HTTP/1.0 request that asked for `Connection: keep-alive`.
    KeepAlive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    Unset,
    ContentLength,
    Chunked,
    UntilClose,
}

/// A single HTTP connection's parsing and dispatch state.
///
/// Every field an application touches from inside an [`crate::action::HttpAction`]
/// method lives here: the parsed request (`in_headers`, `in_cookies`,
/// `params`, `files`) and the response being built (`out_headers`,
/// `response_code`).
pub struct Connection {
    pub(crate) client_addr: SocketAddr,
    pub(crate) server_addr: SocketAddr,

    pub(crate) settings: Arc<Settings>,
    pub(crate) dispatcher: Arc<dyn Dispatcher>,

    pub(crate) read_buffer: ReadBuffer,
    pub(crate) write_buffer: Vec<u8>,

    pub(crate) phase: Phase,
    pub(crate) method: Option<Method>,

    pub in_headers: HeaderMap,
    pub in_cookies: HashMap<String, String>,
    pub params: ParamMap,
    pub files: HashMap<String, UploadSlot>,

    pub out_headers: HeaderMap,
    pub out_cookies: Vec<String>,
    pub response_code: String,

    pub(crate) is_allowing_persistence: bool,
    pub(crate) max_persistent_requests: Option<u32>,
    pub(crate) persistence_type: Option<PersistenceType>,
    pub(crate) request_count: u32,

    pub(crate) headers_written: bool,
    pub(crate) write_mode: WriteMode,

    pub(crate) multipart_boundary: Vec<u8>,
    pub(crate) part_delimiter: Vec<u8>,
    pub(crate) field_name: Option<String>,
    pub(crate) open_upload: Option<OpenUpload>,

    pub(crate) static_file: Option<StaticFile>,

    pub(crate) is_web_socket: bool,
    pub(crate) ws_protocol: Option<String>,

    pub(crate) temp_files: Vec<String>,
    pub(crate) closed: bool,
}

impl Connection {
    pub fn new(
        client_addr: SocketAddr,
        server_addr: SocketAddr,
        settings: Arc<Settings>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Connection {
        let max_persistent_requests = settings.max_persistent_requests;
        Connection {
            client_addr,
            server_addr,
            settings,
            dispatcher,
            read_buffer: ReadBuffer::new(),
            write_buffer: Vec::new(),
            phase: Phase::RequestLine,
            method: None,
            in_headers: HeaderMap::new(),
            in_cookies: HashMap::new(),
            params: ParamMap::new(),
            files: HashMap::new(),
            out_headers: HeaderMap::new(),
            out_cookies: Vec::new(),
            response_code: "200".to_owned(),
            is_allowing_persistence: true,
            max_persistent_requests,
            persistence_type: None,
            request_count: 0,
            headers_written: false,
            write_mode: WriteMode::Unset,
            multipart_boundary: Vec::new(),
            part_delimiter: Vec::new(),
            field_name: None,
            open_upload: None,
            static_file: None,
            is_web_socket: false,
            ws_protocol: None,
            temp_files: Vec::new(),
            closed: false,
        }
    }

    pub fn method(&self) -> Option<Method> {
        self.method
    }

    pub fn is_web_socket(&self) -> bool {
        self.is_web_socket
    }

    pub fn should_close(&self) -> bool {
        self.closed
    }

    /// Controls whether this connection may be kept alive for another
    /// request once the current one's response has drained, and how many
    /// persistent requests it may serve in total.
    pub fn allow_persistence(&mut self, allow: bool, max_requests: Option<u32>) {
        self.is_allowing_persistence = allow;
        self.max_persistent_requests = max_requests;
    }

    /// Dispatches to the registered action for `code`, the way protocol-level
    /// parse failures do in the original regardless of the request's method.
    pub fn raise_error(&mut self, code: u16) {
        let dispatcher = self.dispatcher.clone();
        dispatcher.error(code, self);
    }

    /// Feeds newly-received bytes into the parser and drives the state
    /// machine as far forward as the buffered data allows.
    pub fn feed(&mut self, data: &[u8]) {
        self.read_buffer.extend(data);
        self.drive();
    }

    /// Bytes the runtime should write to the socket. The caller is
    /// responsible for draining this and calling [`on_write_finished`] once
    /// it has done so.
    pub fn pending_write(&mut self) -> &mut Vec<u8> {
        &mut self.write_buffer
    }

    /// Called once the runtime has written every byte previously returned
    /// from `pending_write` to the socket.
    pub fn on_write_finished(&mut self) {
        if let Some(mut sf) = self.static_file.take() {
            match sf.pump(&mut self.write_buffer) {
                Ok(true) => {
                    self.static_file = Some(sf);
                    return;
                }
                Ok(false) => {}
                Err(_) => {
                    self.closed = true;
                    return;
                }
            }
        }

        if self.is_web_socket {
            return;
        }

        let should_persist = self.is_allowing_persistence
            && self.persistence_type.is_some()
            && self
                .max_persistent_requests
                .map_or(true, |max| self.request_count < max);

        if should_persist {
            self.phase = Phase::RequestLine;
            self.read_buffer.reset_scan();
            self.drive();
        } else {
            self.closed = true;
        }
    }

    /// Releases temp files spooled for this connection's uploads. Called by
    /// the runtime when the connection is torn down.
    pub fn shutdown(&mut self) {
        for path in self.temp_files.drain(..) {
            let _ = std::fs::remove_file(path);
        }
    }

    fn drive(&mut self) {
        while self.step() {}
    }

    fn step(&mut self) -> bool {
        match self.phase {
            Phase::RequestLine => self.step_request_line(),
            Phase::Headers => self.step_headers(),
            Phase::UrlencodedBody(len) => self.step_urlencoded_body(len),
            Phase::MultipartBoundaryInit => self.step_multipart_boundary_init(),
            Phase::PostBoundary => self.step_post_boundary(),
            Phase::PartHeaders => self.step_part_headers(),
            Phase::FieldBody => self.step_field_body(),
            Phase::FileBody => self.step_file_body(),
            Phase::WebSocketThirdKey => self.step_websocket_third_key(),
            Phase::WebSocketMessage => self.step_websocket_message(),
            Phase::AwaitingWrite => false,
        }
    }

    fn reset_for_request(&mut self) {
        self.in_headers.clear();
        self.in_cookies.clear();
        self.params.clear();
        self.files.clear();
        self.out_headers.clear();
        self.out_headers.insert("Content-Type".to_owned(), "text/plain".to_owned());
        self.out_cookies.clear();
        self.response_code = "200".to_owned();
        self.headers_written = false;
        self.write_mode = WriteMode::Unset;
        self.method = None;
        self.field_name = None;
        self.open_upload = None;
        self.static_file = None;
        self.multipart_boundary.clear();
        self.part_delimiter.clear();
    }

    fn run_dispatch(&mut self) {
        let dispatcher = self.dispatcher.clone();
        dispatcher.dispatch(self);
        self.finish_response();
        self.phase = Phase::AwaitingWrite;
    }

    fn fail(&mut self, code: u16) {
        self.raise_error(code);
        self.finish_response();
        self.phase = Phase::AwaitingWrite;
    }

    fn step_request_line(&mut self) -> bool {
        match self
            .read_buffer
            .try_take_delimiter(b"\r\n", self.settings.http_max_request_length)
        {
            DelimiterOutcome::NotYet => false,
            DelimiterOutcome::MaxBytesExceeded => {
                self.reset_for_request();
                self.fail(400);
                true
            }
            DelimiterOutcome::Found(line) => {
                self.reset_for_request();
                self.request_count += 1;

                let text = String::from_utf8_lossy(&line).into_owned();
                let text = text.trim_end_matches(['\r', '\n']);
                let parts: Vec<&str> = text.split(' ').collect();
                let (method_str, uri, protocol) = match parts.as_slice() {
                    [m, u, p] => (*m, *u, (*p).to_owned()),
                    [m, u] => (*m, *u, "HTTP/1.0".to_owned()),
                    _ => {
                        self.fail(400);
                        return true;
                    }
                };

                let method = match Method::parse(&method_str.to_uppercase()) {
                    Some(m) => m,
                    None => {
                        self.fail(405);
                        return true;
                    }
                };

                let protocol = protocol.to_uppercase();
                if protocol != "HTTP/1.0" && protocol != "HTTP/1.1" {
                    self.fail(505);
                    return true;
                }

                self.method = Some(method);
                if protocol == "HTTP/1.1" {
                    self.persistence_type = Some(PersistenceType::Protocol);
                }

                let (script_name, query_string) = match uri.split_once('?') {
                    Some((p, q)) => (p.to_owned(), Some(q.to_owned())),
                    None => (uri.to_owned(), None),
                };

                self.in_headers.insert("REQUEST_METHOD".to_owned(), method.as_str().to_owned());
                self.in_headers.insert("REQUEST_URI".to_owned(), uri.to_owned());
                self.in_headers.insert("SCRIPT_NAME".to_owned(), script_name);
                self.in_headers.insert("SERVER_PROTOCOL".to_owned(), protocol);
                self.in_headers
                    .insert("REMOTE_ADDR".to_owned(), self.client_addr.ip().to_string());
                self.in_headers
                    .insert("REMOTE_PORT".to_owned(), self.client_addr.port().to_string());
                self.in_headers
                    .insert("SERVER_ADDR".to_owned(), self.server_addr.ip().to_string());
                self.in_headers
                    .insert("SERVER_PORT".to_owned(), self.server_addr.port().to_string());

                if let Some(qs) = query_string {
                    self.in_headers.insert("QUERY_STRING".to_owned(), qs.clone());
                    for (k, v) in form_urlencoded::parse(qs.as_bytes()) {
                        insert_param(&mut self.params, k.into_owned(), v.into_owned());
                    }
                }

                self.read_buffer.reset_scan();
                self.phase = Phase::Headers;
                true
            }
        }
    }

    fn step_headers(&mut self) -> bool {
        match self
            .read_buffer
            .try_take_delimiter(b"\r\n\r\n", self.settings.http_max_headers_length)
        {
            DelimiterOutcome::NotYet => false,
            DelimiterOutcome::MaxBytesExceeded => {
                self.fail(400);
                true
            }
            DelimiterOutcome::Found(data) => {
                for (name, value) in split_header_lines(&data) {
                    let key = canonical_header_key(&name);
                    if key == "HTTP_COOKIE" {
                        for (n, v) in parse_cookie_header(&value) {
                            self.in_cookies.insert(n, v);
                        }
                    }
                    if key == "HTTP_CONNECTION" && value.eq_ignore_ascii_case("keep-alive") {
                        self.persistence_type = Some(PersistenceType::KeepAlive);
                    }
                    self.in_headers.insert(key, value);
                }
                if !self.in_headers.contains_key("HTTP_CONTENT_TYPE") {
                    self.in_headers
                        .insert("HTTP_CONTENT_TYPE".to_owned(), "text/plain".to_owned());
                }
                self.read_buffer.reset_scan();
                self.after_headers()
            }
        }
    }

    fn after_headers(&mut self) -> bool {
        let protocol = self.in_headers.get("SERVER_PROTOCOL").cloned().unwrap_or_default();
        let upgrade = self
            .in_headers
            .get("HTTP_UPGRADE")
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false);
        let connection_upgrade = self
            .in_headers
            .get("HTTP_CONNECTION")
            .map(|v| v.eq_ignore_ascii_case("upgrade"))
            .unwrap_or(false);

        if protocol == "HTTP/1.1" && upgrade && connection_upgrade {
            self.is_web_socket = true;
            self.ws_protocol = self.in_headers.get("HTTP_SEC_WEBSOCKET_PROTOCOL").cloned();
            self.read_buffer.reset_scan();
            self.phase = Phase::WebSocketThirdKey;
            return true;
        }

        let content_type = self.in_headers.get("HTTP_CONTENT_TYPE").cloned().unwrap_or_default();

        if content_type.starts_with("multipart/form-data") {
            let boundary = content_type
                .split("boundary=")
                .nth(1)
                .map(|s| s.trim().to_owned());
            match boundary {
                Some(b) => {
                    self.multipart_boundary = format!("--{}", b).into_bytes();
                    self.part_delimiter = {
                        let mut d = b"\r\n".to_vec();
                        d.extend_from_slice(&self.multipart_boundary);
                        d
                    };
                    self.read_buffer.reset_scan();
                    self.phase = Phase::MultipartBoundaryInit;
                    true
                }
                None => {
                    self.fail(400);
                    true
                }
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            match self
                .in_headers
                .get("HTTP_CONTENT_LENGTH")
                .and_then(|v| v.parse::<usize>().ok())
            {
                Some(len) => {
                    self.read_buffer.reset_scan();
                    self.phase = Phase::UrlencodedBody(len);
                    true
                }
                None => {
                    self.fail(411);
                    true
                }
            }
        } else {
            self.run_dispatch();
            true
        }
    }

    fn step_urlencoded_body(&mut self, len: usize) -> bool {
        match self.read_buffer.try_take_length(len) {
            None => false,
            Some(body) => {
                for (k, v) in form_urlencoded::parse(&body) {
                    insert_param(&mut self.params, k.into_owned(), v.into_owned());
                }
                self.run_dispatch();
                true
            }
        }
    }

    fn step_multipart_boundary_init(&mut self) -> bool {
        let want = self.multipart_boundary.len();
        match self.read_buffer.try_take_length(want) {
            None => false,
            Some(data) => {
                if data != self.multipart_boundary {
                    self.fail(400);
                    return true;
                }
                self.read_buffer.reset_scan();
                self.phase = Phase::PostBoundary;
                true
            }
        }
    }

    fn step_post_boundary(&mut self) -> bool {
        match self.read_buffer.try_take_length(2) {
            None => false,
            Some(data) => {
                if data == b"\r\n" {
                    self.read_buffer.reset_scan();
                    self.phase = Phase::PartHeaders;
                    true
                } else if data == b"--" {
                    self.run_dispatch();
                    true
                } else {
                    self.fail(400);
                    true
                }
            }
        }
    }

    fn step_part_headers(&mut self) -> bool {
        match self
            .read_buffer
            .try_take_delimiter(b"\r\n\r\n", self.settings.http_max_headers_length)
        {
            DelimiterOutcome::NotYet => false,
            DelimiterOutcome::MaxBytesExceeded => {
                self.fail(400);
                true
            }
            DelimiterOutcome::Found(data) => {
                let headers = split_header_lines(&data);
                let disposition = headers
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case("Content-Disposition"))
                    .map(|(_, value)| value.clone());

                match disposition.as_deref().and_then(parse_content_disposition) {
                    None => {
                        self.fail(400);
                    }
                    Some((name, Some(filename))) => {
                        let temp_path = random_temp_path(&self.settings.http_upload_dir);
                        match File::create(&temp_path) {
                            Ok(file) => {
                                self.temp_files.push(temp_path.clone());
                                self.open_upload = Some(OpenUpload {
                                    field_name: name,
                                    filename,
                                    temp_path,
                                    file,
                                    written: 0,
                                    error: None,
                                });
                                self.read_buffer.reset_scan();
                                self.phase = Phase::FileBody;
                            }
                            Err(_) => self.fail(500),
                        }
                    }
                    Some((name, None)) => {
                        self.field_name = Some(name);
                        self.read_buffer.reset_scan();
                        self.phase = Phase::FieldBody;
                    }
                }
                true
            }
        }
    }

    fn step_field_body(&mut self) -> bool {
        let part_delimiter = self.part_delimiter.clone();
        match self
            .read_buffer
            .try_take_delimiter(&part_delimiter, MAX_FIELD_BYTES + part_delimiter.len())
        {
            DelimiterOutcome::Found(mut data) => {
                data.truncate(data.len() - part_delimiter.len());
                let value = String::from_utf8_lossy(&data).into_owned();
                if let Some(name) = self.field_name.take() {
                    insert_param(&mut self.params, name, value);
                }
                self.read_buffer.reset_scan();
                self.phase = Phase::PostBoundary;
                true
            }
            DelimiterOutcome::MaxBytesExceeded => {
                self.fail(400);
                true
            }
            DelimiterOutcome::NotYet => false,
        }
    }

    fn step_file_body(&mut self) -> bool {
        let part_delimiter = self.part_delimiter.clone();
        match self.read_buffer.try_take_delimiter(&part_delimiter, 0) {
            DelimiterOutcome::Found(mut data) => {
                data.truncate(data.len() - part_delimiter.len());
                if let Some(mut upload) = self.open_upload.take() {
                    let max = self.settings.http_max_upload_size;
                    let _ = upload.write_chunk(&data, max);
                    let field_name = upload.field_name.clone();
                    let record = upload.finish();
                    self.push_upload(field_name, record);
                }
                self.read_buffer.reset_scan();
                self.phase = Phase::PostBoundary;
                true
            }
            DelimiterOutcome::MaxBytesExceeded => unreachable!("file body delimiter has no byte cap"),
            DelimiterOutcome::NotYet => {
                let keep_tail = part_delimiter.len().saturating_sub(1);
                let threshold = self.settings.http_upload_buffer_size;
                let total = self.read_buffer.len();
                if total > threshold + keep_tail {
                    let flush_len = total - keep_tail;
                    if let Some(chunk) = self.read_buffer.try_take_length(flush_len) {
                        if let Some(upload) = self.open_upload.as_mut() {
                            let max = self.settings.http_max_upload_size;
                            let _ = upload.write_chunk(&chunk, max);
                        }
                        self.read_buffer.reset_scan();
                    }
                    true
                } else {
                    false
                }
            }
        }
    }

    fn push_upload(&mut self, field_name: String, record: UploadRecord) {
        match self.files.remove(&field_name) {
            Some(existing) => {
                self.files.insert(field_name, existing.push(record));
            }
            None => {
                self.files.insert(field_name, UploadSlot::One(record));
            }
        }
    }

    fn step_websocket_third_key(&mut self) -> bool {
        match self.read_buffer.try_take_length(8) {
            None => false,
            Some(key3) => {
                let key1 = self.in_headers.get("HTTP_SEC_WEBSOCKET_KEY1").cloned().unwrap_or_default();
                let key2 = self.in_headers.get("HTTP_SEC_WEBSOCKET_KEY2").cloned().unwrap_or_default();
                let token = crate::websocket::handshake_response_token(&key1, &key2, &key3);
                self.write_websocket_handshake(&token);
                let dispatcher = self.dispatcher.clone();
                dispatcher.web_socket_connect(self);
                self.read_buffer.reset_scan();
                self.phase = Phase::WebSocketMessage;
                true
            }
        }
    }

    fn step_websocket_message(&mut self) -> bool {
        match self.read_buffer.try_take_delimiter(&[0xFFu8], 0) {
            DelimiterOutcome::Found(mut data) => {
                data.pop();
                if data.first() == Some(&0x00) {
                    data.remove(0);
                }
                let dispatcher = self.dispatcher.clone();
                dispatcher.web_socket_message(self, &data);
                self.read_buffer.reset_scan();
                true
            }
            DelimiterOutcome::MaxBytesExceeded => unreachable!("websocket frame delimiter has no byte cap"),
            DelimiterOutcome::NotYet => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use std::sync::Arc;

    use super::*;
    use crate::config::Settings;
    use crate::http::multipart::UploadSlot;
    use crate::router::Dispatcher;

    struct NullDispatcher;
    impl Dispatcher for NullDispatcher {
        fn dispatch(&self, _conn: &mut Connection) {}
        fn error(&self, _code: u16, _conn: &mut Connection) {}
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        connected: Mutex<bool>,
        messages: Mutex<Vec<Vec<u8>>>,
    }
    impl Dispatcher for RecordingDispatcher {
        fn dispatch(&self, _conn: &mut Connection) {}
        fn error(&self, _code: u16, _conn: &mut Connection) {}
        fn web_socket_connect(&self, _conn: &mut Connection) {
            *self.connected.lock().unwrap() = true;
        }
        fn web_socket_message(&self, _conn: &mut Connection, message: &[u8]) {
            self.messages.lock().unwrap().push(message.to_vec());
        }
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn multipart_request(body_len: usize) -> (Vec<u8>, Vec<u8>) {
        let head =
            b"POST /upload HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=XYZ\r\n\r\n".to_vec();
        let mut body = Vec::new();
        body.extend_from_slice(b"--XYZ\r\n");
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"avatar\"; filename=\"big.bin\"\r\n\r\n");
        body.extend(std::iter::repeat(b'a').take(body_len));
        body.extend_from_slice(b"\r\n--XYZ--\r\n");
        (head, body)
    }

    #[test]
    fn large_file_part_streams_to_disk_before_boundary_arrives() {
        let settings = Settings { http_upload_buffer_size: 4, ..Settings::default() };
        let mut conn = Connection::new(addr(), addr(), Arc::new(settings), Arc::new(NullDispatcher));

        let (head, body) = multipart_request(40);
        conn.feed(&head);
        conn.feed(&body[..body.len() - 9]);

        let written_before_boundary = conn.open_upload.as_ref().unwrap().written;
        assert!(written_before_boundary > 0, "bytes should have been flushed to disk already");

        conn.feed(&body[body.len() - 9..]);

        let record = match conn.files.get("avatar").unwrap() {
            UploadSlot::One(r) => r.clone(),
            UploadSlot::Many(_) => panic!("expected a single upload"),
        };
        assert_eq!(record.size, 40);
        let on_disk = std::fs::read(&record.temp_path).unwrap();
        assert_eq!(on_disk, vec![b'a'; 40]);
        std::fs::remove_file(&record.temp_path).ok();
    }

    #[test]
    fn shutdown_removes_spooled_temp_files() {
        let mut conn = Connection::new(
            addr(),
            addr(),
            Arc::new(Settings::default()),
            Arc::new(NullDispatcher),
        );

        let (head, body) = multipart_request(10);
        conn.feed(&head);
        conn.feed(&body);

        let temp_path = match conn.files.get("avatar").unwrap() {
            UploadSlot::One(r) => r.temp_path.clone(),
            UploadSlot::Many(_) => panic!("expected a single upload"),
        };
        assert!(std::fs::metadata(&temp_path).is_ok());

        conn.shutdown();
        assert!(std::fs::metadata(&temp_path).is_err());
    }

    #[test]
    fn websocket_handshake_and_message_round_trip() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let mut conn =
            Connection::new(addr(), addr(), Arc::new(Settings::default()), dispatcher.clone());

        let request = b"GET /chat HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
Sec-WebSocket-Key1: 4 @1  46546xW%0l 1 5\r\nSec-WebSocket-Key2: 12998 5 Y3 1  .P00\r\n\r\n";
        conn.feed(request);
        conn.feed(b"^n:ds[4U");

        assert!(conn.is_web_socket());
        let out = String::from_utf8_lossy(conn.pending_write()).into_owned();
        assert!(out.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(*dispatcher.connected.lock().unwrap());

        conn.pending_write().clear();
        conn.feed(&[0x00, b'h', b'i', 0xFF]);
        assert_eq!(dispatcher.messages.lock().unwrap().as_slice(), &[b"hi".to_vec()]);
    }

    #[test]
    fn websocket_handshake_location_keeps_query_string() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let mut conn =
            Connection::new(addr(), addr(), Arc::new(Settings::default()), dispatcher);

        let request = b"GET /chat?room=5 HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
Sec-WebSocket-Key1: 4 @1  46546xW%0l 1 5\r\nSec-WebSocket-Key2: 12998 5 Y3 1  .P00\r\n\r\n";
        conn.feed(request);
        conn.feed(b"^n:ds[4U");

        let out = String::from_utf8_lossy(conn.pending_write()).into_owned();
        assert!(out.contains("Sec-WebSocket-Location: ws://x/chat?room=5\r\n"));
    }
}
