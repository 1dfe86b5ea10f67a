//! Header canonicalization, the single-vs-sequence `params` map, and cookie
//! parsing.
//!
//! Grounded on `handle_headers`/`handle_request`/`handle_urlencoded_content`/
//! `multipart_read_delimiter` in the original `http.py`: header names become
//! `HTTP_<UPPER_SNAKE>` keys, and a parameter that is seen only once stays a
//! single string while one seen more than once becomes an ordered sequence.

use std::collections::HashMap;

use url::form_urlencoded;

/// A request/response header map, keyed by canonical name.
pub type HeaderMap = HashMap<String, String>;

/// A value accumulated into `params`: either the single occurrence, or an
/// ordered sequence once a second occurrence of the same key arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

impl ParamValue {
    /// Returns the value as a single string if there is exactly one, by
    /// joining is never performed — callers that need "first value" use this.
    pub fn first(&self) -> &str {
        match self {
            ParamValue::Single(s) => s,
            ParamValue::Multi(v) => v.first().map(|s| s.as_str()).unwrap_or(""),
        }
    }

    pub fn as_multi(&self) -> Vec<&str> {
        match self {
            ParamValue::Single(s) => vec![s.as_str()],
            ParamValue::Multi(v) => v.iter().map(|s| s.as_str()).collect(),
        }
    }

    fn push(self, value: String) -> ParamValue {
        match self {
            ParamValue::Single(existing) => ParamValue::Multi(vec![existing, value]),
            ParamValue::Multi(mut values) => {
                values.push(value);
                ParamValue::Multi(values)
            }
        }
    }
}

/// Ordered accumulation of request parameters (query string, urlencoded body,
/// and multipart fields, merged in that arrival order).
pub type ParamMap = HashMap<String, ParamValue>;

/// Inserts `value` under `key`, switching to `ParamValue::Multi` the moment a
/// second value for the same key arrives, preserving arrival order.
pub fn insert_param(params: &mut ParamMap, key: String, value: String) {
    match params.remove(&key) {
        Some(existing) => {
            params.insert(key, existing.push(value));
        }
        None => {
            params.insert(key, ParamValue::Single(value));
        }
    }
}

/// Parses a raw query string (the part after `?`) into a `ParamMap`.
pub fn parse_query_string(query_string: &str) -> ParamMap {
    let mut params = ParamMap::new();
    for (key, value) in form_urlencoded::parse(query_string.as_bytes()) {
        insert_param(&mut params, key.into_owned(), value.into_owned());
    }
    params
}

/// Parses an `application/x-www-form-urlencoded` body into a `ParamMap`.
pub fn parse_urlencoded_body(body: &[u8]) -> ParamMap {
    let mut params = ParamMap::new();
    for (key, value) in form_urlencoded::parse(body) {
        insert_param(&mut params, key.into_owned(), value.into_owned());
    }
    params
}

/// Canonicalizes a raw header name into the `HTTP_<UPPER_SNAKE>` form used as
/// an `in_headers` key (spec §3/§4.2).
pub fn canonical_header_key(raw_name: &str) -> String {
    let mut key = String::with_capacity(raw_name.len() + 5);
    key.push_str("HTTP_");
    for ch in raw_name.chars() {
        if ch == '-' {
            key.push('_');
        } else {
            key.extend(ch.to_uppercase());
        }
    }
    key
}

/// Parses a `Cookie:` header value into `(name, value)` pairs, following the
/// classic "split on `;`, then split each piece on the first `=`" scheme from
/// `handle_headers` in the original.
pub fn parse_cookie_header(value: &str) -> Vec<(String, String)> {
    let mut cookies = Vec::new();
    for part in value.split(';') {
        let part = part.trim_end();
        if let Some(eq) = part.find('=') {
            let name = part[..eq].to_owned();
            let value = part[eq + 1..].to_owned();
            cookies.push((name, value));
        }
    }
    cookies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_stays_single() {
        let mut params = ParamMap::new();
        insert_param(&mut params, "b".to_owned(), "hello".to_owned());
        assert_eq!(params.get("b"), Some(&ParamValue::Single("hello".to_owned())));
    }

    #[test]
    fn repeated_value_becomes_multi_in_arrival_order() {
        let mut params = ParamMap::new();
        insert_param(&mut params, "a".to_owned(), "1".to_owned());
        insert_param(&mut params, "a".to_owned(), "2".to_owned());
        assert_eq!(
            params.get("a"),
            Some(&ParamValue::Multi(vec!["1".to_owned(), "2".to_owned()]))
        );
    }

    #[test]
    fn query_string_round_trip() {
        let params = parse_query_string("a=1&a=2&b=hello");
        assert_eq!(
            params.get("a"),
            Some(&ParamValue::Multi(vec!["1".to_owned(), "2".to_owned()]))
        );
        assert_eq!(params.get("b"), Some(&ParamValue::Single("hello".to_owned())));
    }

    #[test]
    fn header_key_canonicalization() {
        assert_eq!(canonical_header_key("Content-Type"), "HTTP_CONTENT_TYPE");
        assert_eq!(canonical_header_key("X-Custom-Header"), "HTTP_X_CUSTOM_HEADER");
    }

    #[test]
    fn cookie_header_parsing() {
        let cookies = parse_cookie_header("a=b; hello=world");
        assert_eq!(
            cookies,
            vec![("a".to_owned(), "b".to_owned()), ("hello".to_owned(), "world".to_owned())]
        );
    }
}
