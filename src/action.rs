//! HTTP methods and the `HttpAction`/error-action registry (spec §4.7).
//!
//! Grounded on `HttpAction` and `HttpServer.__init__`'s `register_error_action`
//! calls in `http.py`: every verb method of the base action writes the same
//! `<h1>{title}</h1>` body under the action's configured `response_code`, and a
//! concrete action only needs to override the verbs it actually supports —
//! everything else falls through to that base behavior, which is exactly how
//! an action registered as a route ends up serving "405 Method Not Supported"
//! for verbs it wasn't built to handle.

use std::collections::HashMap;

use crate::http::connection::Connection;

/// One of the methods this framework recognizes (spec §4.2 "validate method").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Post,
    Put,
    Trace,
}

impl Method {
    pub fn parse(raw: &str) -> Option<Method> {
        match raw {
            "CONNECT" => Some(Method::Connect),
            "DELETE" => Some(Method::Delete),
            "GET" => Some(Method::Get),
            "HEAD" => Some(Method::Head),
            "OPTIONS" => Some(Method::Options),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "TRACE" => Some(Method::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Connect => "CONNECT",
            Method::Delete => "DELETE",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Trace => "TRACE",
        }
    }
}

/// An action object: the unit of route/error dispatch. Every method has a
/// default implementation that renders `{title}` as an `<h1>` under
/// `response_code`; concrete actions override only the verbs they support.
pub trait HttpAction: Send + Sync {
    /// Title shown by the base (un-overridden) implementation of any verb.
    fn title(&self) -> &str {
        "Method Not Supported"
    }

    /// Response code used by the base implementation of any verb.
    fn response_code(&self) -> &str {
        "405"
    }

    fn connect(&self, conn: &mut Connection) {
        self.base_response(conn);
    }
    fn delete(&self, conn: &mut Connection) {
        self.base_response(conn);
    }
    fn get(&self, conn: &mut Connection) {
        self.base_response(conn);
    }
    fn head(&self, conn: &mut Connection) {
        self.base_response(conn);
    }
    fn options(&self, conn: &mut Connection) {
        self.base_response(conn);
    }
    fn post(&self, conn: &mut Connection) {
        self.base_response(conn);
    }
    fn put(&self, conn: &mut Connection) {
        self.base_response(conn);
    }
    fn trace(&self, conn: &mut Connection) {
        self.base_response(conn);
    }

    /// The shared body used by every un-overridden verb method.
    fn base_response(&self, conn: &mut Connection) {
        conn.response_code = self.response_code().to_owned();
        conn.compose_headers();
        conn.write(format!("<h1>{}</h1>", self.title()).as_bytes());
        conn.flush();
    }

    /// Invokes the handler matching `method`.
    fn handle(&self, method: Method, conn: &mut Connection) {
        match method {
            Method::Connect => self.connect(conn),
            Method::Delete => self.delete(conn),
            Method::Get => self.get(conn),
            Method::Head => self.head(conn),
            Method::Options => self.options(conn),
            Method::Post => self.post(conn),
            Method::Put => self.put(conn),
            Method::Trace => self.trace(conn),
        }
    }
}

/// The default action registered for every pre-declared error status: it
/// simply renders `<h1>{title}</h1>` under `{code}` for every verb, matching
/// `HttpAction`'s behavior in the original with no method overridden.
pub struct DefaultAction {
    title: String,
    code: String,
}

impl DefaultAction {
    pub fn new(title: impl Into<String>, code: impl Into<String>) -> DefaultAction {
        DefaultAction { title: title.into(), code: code.into() }
    }
}

impl HttpAction for DefaultAction {
    fn title(&self) -> &str {
        &self.title
    }

    fn response_code(&self) -> &str {
        &self.code
    }
}

/// The set of statuses spec §4.7 requires pre-registered with a default
/// action at server init.
pub const DEFAULT_ERROR_STATUSES: &[(u16, &str)] = &[
    (400, "Bad Request"),
    (402, "Payment Required"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (406, "Not Acceptable"),
    (407, "Proxy Authentication Required"),
    (408, "Request Timeout"),
    (409, "Conflict"),
    (410, "Gone"),
    (411, "Length Required"),
    (412, "Precondition Failed"),
    (413, "Request Entity Too Large"),
    (414, "Request-URI Too Long"),
    (415, "Unsupported Media Type"),
    (416, "Requested Range Not Satisfiable"),
    (417, "Expectation Failed"),
    (422, "Unprocessable Entity"),
    (423, "Locked"),
    (424, "Failed Dependency"),
    (426, "Upgrade Required"),
    (500, "Internal Server Error"),
    (501, "Not Implemented"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Timeout"),
    (505, "HTTP Version Not Supported"),
    (506, "Variant Also Negotiates"),
    (507, "Insufficient Storage"),
    (510, "Not Extended"),
];

/// Maps status codes to the action that should handle them.
pub struct ErrorActionRegistry {
    actions: HashMap<u16, Box<dyn HttpAction>>,
}

impl ErrorActionRegistry {
    /// Builds a registry pre-populated with `DefaultAction`s for every status
    /// named in spec §4.7.
    pub fn with_defaults() -> ErrorActionRegistry {
        let mut actions: HashMap<u16, Box<dyn HttpAction>> = HashMap::new();
        for &(code, title) in DEFAULT_ERROR_STATUSES {
            actions.insert(code, Box::new(DefaultAction::new(title, code.to_string())));
        }
        ErrorActionRegistry { actions }
    }

    /// Replaces the action registered for `code`. Applications use this to
    /// customize error pages.
    pub fn register(&mut self, code: u16, action: Box<dyn HttpAction>) {
        self.actions.insert(code, action);
    }

    pub fn get(&self, code: u16) -> &dyn HttpAction {
        self.actions
            .get(&code)
            .map(|a| a.as_ref())
            .unwrap_or_else(|| panic!("no error action registered for status {}", code))
    }

    /// Invokes the registered action's `get()` handler for `code`, the way
    /// `self._server._error_actions[CODE][1].get(self)` does in the original
    /// for every protocol-level parse error, regardless of the request's own
    /// method.
    pub fn dispatch_get(&self, code: u16, conn: &mut Connection) {
        self.get(code).get(conn);
    }
}
