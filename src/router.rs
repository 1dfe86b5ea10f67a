//! Path routing: the simplified `(name:regex)` pattern syntax and the
//! `Dispatcher` that ties a route table and an error-action registry
//! together into something a `Connection` can call into (spec §4.6).
//!
//! Grounded on `RoutingHttpServer.__init__` (routes are keyed by the literal
//! text before a request's first `:`, each with an optional tail pattern)
//! and `RoutingHttpClient.handle_dispatch` (the split-at-first-`:` lookup,
//! tail-only pattern match, and the `SCRIPT_NAME`/`SCRIPT_ARGS` rewrite) in
//! the original `http.py`. The teacher's own `src/router.rs` is a
//! compile-time, fixed-path-segment macro router with different semantics
//! and isn't reused here; this module reaches for the `regex` crate instead,
//! the idiomatic equivalent of the original's use of `re`.

use std::collections::HashMap;

use regex::Regex;

use crate::action::{HttpAction, Method};
use crate::error::ServerError;
use crate::http::connection::Connection;

/// Bridges a `Connection` to application routing and error handling. A
/// `Connection` holds one of these behind an `Arc` and calls into it at
/// DISPATCH and on every protocol-level error.
pub trait Dispatcher: Send + Sync {
    /// Routes the current request to whatever action matches, or to the 404
    /// action if nothing does.
    fn dispatch(&self, conn: &mut Connection);

    /// Invokes the registered error action's `get()` handler for `code`.
    fn error(&self, code: u16, conn: &mut Connection);

    /// Called once the Hixie-76 handshake completes, before the first
    /// message phase begins. Default no-op: most routes don't speak
    /// WebSocket.
    fn web_socket_connect(&self, _conn: &mut Connection) {}

    /// Called with one fully-unframed message payload at a time.
    fn web_socket_message(&self, _conn: &mut Connection, _message: &[u8]) {}
}

struct Route {
    /// Compiled from the tail pattern passed to `route_with_pattern`, if any.
    /// `None` means the action is dispatched unconditionally, ignoring
    /// whatever tail (if any) followed the base in `SCRIPT_NAME`.
    pattern: Option<Regex>,
    action: Box<dyn HttpAction>,
}

/// Rewrites the simplified `(name:regex)` syntax into a named-capture regex
/// group `(?P<name>regex)`. An escaped `\(` is left alone so a literal
/// parenthesis in a sub-pattern doesn't get mistaken for the start of a
/// named group.
///
/// The `regex` crate has no lookbehind assertion to express "a `(` not
/// preceded by `\`" declaratively (unlike the original's `re.findall`), so
/// this walks the pattern by hand instead of building one final regex to do
/// the rewrite.
fn rewrite_pattern(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '(' && (i == 0 || chars[i - 1] != '\\') {
            let mut j = i + 1;
            let mut name = String::new();
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                name.push(chars[j]);
                j += 1;
            }
            if !name.is_empty() && j < chars.len() && chars[j] == ':' {
                out.push_str("(?P<");
                out.push_str(&name);
                out.push('>');
                i = j + 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// A compiled set of routes plus the pre-populated error-action registry.
pub struct Router {
    routes: HashMap<String, Route>,
    errors: crate::action::ErrorActionRegistry,
}

pub struct RouterBuilder {
    routes: HashMap<String, Route>,
    errors: crate::action::ErrorActionRegistry,
}

impl RouterBuilder {
    pub fn new() -> RouterBuilder {
        RouterBuilder {
            routes: HashMap::new(),
            errors: crate::action::ErrorActionRegistry::with_defaults(),
        }
    }

    /// Registers `action` under the literal `base`, with no tail pattern:
    /// the route matches regardless of whatever (if any) follows `base`
    /// after a `:` in an incoming `SCRIPT_NAME`, and any such tail is
    /// ignored.
    pub fn route(self, base: &str, action: Box<dyn HttpAction>) -> Result<RouterBuilder, ServerError> {
        self.route_with_pattern(base, None, action)
    }

    /// Registers `action` under the literal `base`, requiring a tail pattern
    /// match. `base` is looked up exactly against the text before the first
    /// `:` in an incoming `SCRIPT_NAME`; `tail_pattern`, possibly containing
    /// `(name:regex)` segments, is matched (start-anchored, not
    /// full-string-anchored, mirroring Python's `re.match`) only against
    /// whatever follows that `:`.
    pub fn route_with_pattern(
        mut self,
        base: &str,
        tail_pattern: Option<&str>,
        action: Box<dyn HttpAction>,
    ) -> Result<RouterBuilder, ServerError> {
        let pattern = match tail_pattern {
            Some(raw) => {
                let rewritten = rewrite_pattern(raw);
                let regex = Regex::new(&format!("^(?:{})", rewritten))
                    .map_err(|e| ServerError::BadRoutePattern(raw.to_owned(), e.to_string()))?;
                Some(regex)
            }
            None => None,
        };
        self.routes.insert(base.to_owned(), Route { pattern, action });
        Ok(self)
    }

    /// Overrides the default action registered for an error status.
    pub fn error_action(mut self, code: u16, action: Box<dyn HttpAction>) -> RouterBuilder {
        self.errors.register(code, action);
        self
    }

    pub fn build(self) -> Router {
        Router { routes: self.routes, errors: self.errors }
    }
}

impl Default for RouterBuilder {
    fn default() -> RouterBuilder {
        RouterBuilder::new()
    }
}

impl Dispatcher for Router {
    fn dispatch(&self, conn: &mut Connection) {
        let script_name = conn.in_headers.get("SCRIPT_NAME").cloned().unwrap_or_default();
        let method = match conn.method() {
            Some(method) => method,
            None => {
                self.errors.dispatch_get(400, conn);
                return;
            }
        };

        let (base, tail) = match script_name.split_once(':') {
            Some((base, tail)) => (base.to_owned(), Some(tail.to_owned())),
            None => (script_name, None),
        };

        let route = match self.routes.get(&base) {
            Some(route) => route,
            None => {
                self.errors.get(404).handle(method, conn);
                return;
            }
        };

        let pattern = match &route.pattern {
            None => {
                // No pattern required: dispatch unconditionally, ignoring any tail.
                route.action.handle(method, conn);
                return;
            }
            Some(pattern) => pattern,
        };

        let tail = match tail {
            Some(tail) => tail,
            None => {
                self.errors.get(404).handle(method, conn);
                return;
            }
        };

        let captures = match pattern.captures(&tail) {
            Some(captures) => captures,
            None => {
                self.errors.get(404).handle(method, conn);
                return;
            }
        };

        for name in pattern.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                crate::headers::insert_param(&mut conn.params, name.to_owned(), m.as_str().to_owned());
            }
        }

        conn.in_headers.insert("SCRIPT_NAME".to_owned(), base);
        conn.in_headers.insert("SCRIPT_ARGS".to_owned(), tail);

        route.action.handle(method, conn);
    }

    fn error(&self, code: u16, conn: &mut Connection) {
        self.errors.dispatch_get(code, conn);
    }
}
