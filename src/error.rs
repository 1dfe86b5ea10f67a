//! Error types.
//!
//! Recoverable wire errors (malformed request line, bad multipart framing,
//! missing content-length, ...) are not represented here: per spec §7 they
//! become local calls into the error-action registry instead of propagating.
//! The errors below are for programmer/configuration mistakes, which spec §7
//! says must be fatal at server startup.

use quick_error::quick_error;

quick_error! {
    /// Fatal errors raised while building a server (route table compilation,
    /// error-action registration, ...).
    #[derive(Debug)]
    pub enum ServerError {
        /// A route's simplified `(name:regex)` pattern failed to compile.
        BadRoutePattern(script_name: String, reason: String) {
            display("regex pattern error for route '{}': {}", script_name, reason)
        }
        /// An action failed to instantiate for a route.
        ActionInstantiation(script_name: String, reason: String) {
            display("action for route '{}' failed to instantiate: {}", script_name, reason)
        }
        /// A response code passed to `register_error_action` was malformed.
        InvalidResponseCode(code: String) {
            display("invalid error action response code: {}", code)
        }
    }
}

quick_error! {
    /// Errors from the outbound HTTP client.
    #[derive(Debug)]
    pub enum RequestError {
        Io(err: std::io::Error) {
            from()
            display("I/O error: {}", err)
        }
        MalformedResponseLine(line: String) {
            display("malformed response line: {}", line)
        }
        UnsupportedProtocol(protocol: String) {
            display("unsupported response protocol: {}", protocol)
        }
        InvalidHeaders(reason: String) {
            display("invalid response headers: {}", reason)
        }
        MissingContentLength {
            display("response contains no content length")
        }
        UnsupportedMethod(method: String) {
            display("unsupported request method: {}", method)
        }
        UnsupportedRequestProtocol(version: String) {
            display("HTTP protocol must be 1.0 or newer, got {}", version)
        }
    }
}
