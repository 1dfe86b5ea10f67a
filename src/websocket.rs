//! Hixie-76 WebSocket handshake math and message framing (spec §4.8).
//!
//! Grounded on `extract_key_number` and `handle_response_token` in
//! `web_socket.py`: only the handshake arithmetic is ported, since that
//! file's own `Client`/`Server` classes implement the draft as a
//! standalone protocol rather than cohabiting an HTTP/1.x connection the
//! way this crate's `Connection` does.

use md5::{Digest, Md5};

/// Extracts the numeric key from a Sec-WebSocket-Key{1,2} header value: every
/// digit character is concatenated (ignoring everything else) and the result
/// divided by the number of space characters in the value.
fn extract_key_number(key: &str) -> u32 {
    let digits: String = key.chars().filter(|c| c.is_ascii_digit()).collect();
    let spaces = key.chars().filter(|c| *c == ' ').count().max(1) as u64;
    let number: u64 = digits.parse().unwrap_or(0);
    (number / spaces) as u32
}

/// Derives the 16-byte response token a Hixie-76 handshake must send back to
/// the client, from `Sec-WebSocket-Key1`, `Sec-WebSocket-Key2`, and the
/// 8-byte body that follows the request headers (the "third key").
pub fn handshake_response_token(key1: &str, key2: &str, key3: &[u8]) -> [u8; 16] {
    let n1 = extract_key_number(key1);
    let n2 = extract_key_number(key2);

    let mut input = Vec::with_capacity(16);
    input.extend_from_slice(&n1.to_be_bytes());
    input.extend_from_slice(&n2.to_be_bytes());
    input.extend_from_slice(key3);

    let digest = Md5::digest(&input);
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest);
    out
}

/// Wraps `payload` in the Hixie-76 `0x00 ... 0xFF` message frame.
pub fn frame_message(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 2);
    framed.push(0x00);
    framed.extend_from_slice(payload);
    framed.push(0xFF);
    framed
}

impl crate::http::connection::Connection {
    /// Writes the 101 handshake response directly into the pending write
    /// buffer, bypassing `compose_headers` entirely: the handshake has its
    /// own fixed header set and a raw 16-byte token body, not a framed HTTP
    /// response.
    pub(crate) fn write_websocket_handshake(&mut self, token: &[u8; 16]) {
        let protocol = self
            .in_headers
            .get("SERVER_PROTOCOL")
            .cloned()
            .unwrap_or_else(|| "HTTP/1.1".to_owned());
        let origin = self.in_headers.get("HTTP_ORIGIN").cloned().unwrap_or_default();
        let host = self.in_headers.get("HTTP_HOST").cloned().unwrap_or_default();
        let request_uri = self.in_headers.get("REQUEST_URI").cloned().unwrap_or_default();

        let mut head = String::new();
        head.push_str(&format!("{} 101 Switching Protocols\r\n", protocol));
        head.push_str("Upgrade: WebSocket\r\n");
        head.push_str("Connection: Upgrade\r\n");
        head.push_str(&format!("Sec-WebSocket-Origin: {}\r\n", origin));
        head.push_str(&format!("Sec-WebSocket-Location: ws://{}{}\r\n", host, request_uri));
        if let Some(protocol) = &self.ws_protocol {
            head.push_str(&format!("Sec-WebSocket-Protocol: {}\r\n", protocol));
        }
        head.push_str("\r\n");

        self.write_buffer.extend_from_slice(head.as_bytes());
        self.write_buffer.extend_from_slice(token);
    }

    /// Sends one message over an upgraded WebSocket connection.
    pub fn send_web_socket_message(&mut self, payload: &[u8]) {
        let framed = frame_message(payload);
        self.write_buffer.extend_from_slice(&framed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_digits_and_divides_by_space_count() {
        assert_eq!(extract_key_number("1 2 3"), 61);
        assert_eq!(extract_key_number("4@a 2b 1"), 210);
    }

    #[test]
    fn handshake_token_is_16_bytes() {
        let token = handshake_response_token("1   38 21 100", "7   3 1  2   2", b"WjN}|u\x000\x00");
        assert_eq!(token.len(), 16);
    }

    #[test]
    fn message_framing_wraps_in_0x00_0xff() {
        let framed = frame_message(b"hi");
        assert_eq!(framed, vec![0x00, b'h', b'i', 0xFF]);
    }
}
