//! The growable read buffer and its two read primitives: read-until-delimiter
//! (bounded) and read-exactly-N-bytes (spec §4.1).
//!
//! Grounded on the incremental, no-rescan-the-whole-buffer scanning in
//! `socket_handler/http1.rs`'s `WaitingForRqLine`/`WaitingForHeaders` states,
//! which track a `new_data_start` offset so each `update()` call only rescans
//! the tail that could not have matched before. `scanned` here plays the same
//! role.

use std::mem;

/// Outcome of attempting to take bytes up to and including a delimiter.
#[derive(Debug, PartialEq, Eq)]
pub enum DelimiterOutcome {
    /// The delimiter has not appeared yet; keep buffering.
    NotYet,
    /// The delimiter was found. The returned bytes include the delimiter's
    /// own bytes, per spec §4.1's framing convention.
    Found(Vec<u8>),
    /// `max_bytes` was exceeded without finding the delimiter.
    MaxBytesExceeded,
}

/// An in-memory growable byte buffer with delimiter/length read primitives.
#[derive(Debug, Default)]
pub struct ReadBuffer {
    data: Vec<u8>,
    // Bytes at the head of `data`, starting at index 0, already confirmed to
    // contain no occurrence of the currently armed delimiter. Reset to 0
    // whenever the buffer is drained or a new delimiter is armed.
    scanned: usize,
}

impl ReadBuffer {
    pub fn new() -> ReadBuffer {
        ReadBuffer { data: Vec::new(), scanned: 0 }
    }

    /// Appends newly-received bytes to the buffer.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Must be called whenever a different delimiter is armed, so the next
    /// scan doesn't skip bytes that were only confirmed clean against the
    /// previous delimiter.
    pub fn reset_scan(&mut self) {
        self.scanned = 0;
    }

    /// Attempts to take all bytes up to and including `delim`. On success the
    /// consumed bytes (including `delim`) are removed from the buffer and
    /// `scanned` resets. On failure, `scanned` advances so later calls with
    /// the same delimiter don't rescan the confirmed-clean prefix.
    pub fn try_take_delimiter(&mut self, delim: &[u8], max_bytes: usize) -> DelimiterOutcome {
        debug_assert!(!delim.is_empty());

        let search_from = self.scanned.saturating_sub(delim.len().saturating_sub(1));
        let found = twoway::find_bytes(&self.data[search_from..], delim)
            .map(|pos| search_from + pos);

        match found {
            Some(pos) => {
                let take_len = pos + delim.len();
                let rest = self.data.split_off(take_len);
                let taken = mem::replace(&mut self.data, rest);
                self.scanned = 0;
                DelimiterOutcome::Found(taken)
            }
            None => {
                self.scanned = self.data.len();
                if max_bytes > 0 && self.data.len() > max_bytes {
                    DelimiterOutcome::MaxBytesExceeded
                } else {
                    DelimiterOutcome::NotYet
                }
            }
        }
    }

    /// Attempts to take exactly `n` bytes. Returns `None` if fewer than `n`
    /// bytes are currently buffered.
    pub fn try_take_length(&mut self, n: usize) -> Option<Vec<u8>> {
        if self.data.len() < n {
            return None;
        }
        let rest = self.data.split_off(n);
        let taken = mem::replace(&mut self.data, rest);
        self.scanned = 0;
        Some(taken)
    }

    /// Drops every buffered byte without looking at it (used when a part is
    /// marked maxed and the remainder of the upload must be drained).
    pub fn clear(&mut self) {
        self.data.clear();
        self.scanned = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_found_across_multiple_feeds() {
        let mut buf = ReadBuffer::new();
        buf.extend(b"GET / HTT");
        assert_eq!(buf.try_take_delimiter(b"\r\n", 0), DelimiterOutcome::NotYet);
        buf.extend(b"P/1.1\r\n");
        match buf.try_take_delimiter(b"\r\n", 0) {
            DelimiterOutcome::Found(data) => assert_eq!(data, b"GET / HTTP/1.1\r\n"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn delimiter_straddling_the_feed_boundary_is_not_missed() {
        let mut buf = ReadBuffer::new();
        buf.extend(b"hello\r");
        assert_eq!(buf.try_take_delimiter(b"\r\n", 0), DelimiterOutcome::NotYet);
        buf.extend(b"\nworld");
        match buf.try_take_delimiter(b"\r\n", 0) {
            DelimiterOutcome::Found(data) => assert_eq!(data, b"hello\r\n"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(buf.as_slice(), b"world");
    }

    #[test]
    fn max_bytes_exceeded() {
        let mut buf = ReadBuffer::new();
        buf.extend(&[b'a'; 20]);
        assert_eq!(buf.try_take_delimiter(b"\r\n", 10), DelimiterOutcome::MaxBytesExceeded);
    }

    #[test]
    fn length_read_waits_for_enough_bytes() {
        let mut buf = ReadBuffer::new();
        buf.extend(b"ab");
        assert_eq!(buf.try_take_length(4), None);
        buf.extend(b"cdef");
        assert_eq!(buf.try_take_length(4), Some(b"abcd".to_vec()));
        assert_eq!(buf.as_slice(), b"ef");
    }
}
