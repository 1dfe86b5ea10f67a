//! Serving a file straight off disk in bounded-size chunks (spec §4.5).
//!
//! Grounded on `serve_static_file`/`handle_write_finished`'s file-pumping
//! branch in the original `http.py`: the file's size is known upfront, so
//! the response uses `Content-Length` framing (no chunked encoding needed),
//! and the body is pumped a fixed-size read at a time from
//! `on_write_finished` rather than read into memory all at once.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::http::connection::Connection;
use crate::http::multipart::guess_content_type;

/// Bytes read from the file per `on_write_finished` pump, matching the
/// original's `FILE_READ_SIZE`.
const FILE_READ_SIZE: usize = 131_070;

pub struct StaticFile {
    file: File,
    remaining: u64,
}

impl StaticFile {
    /// Reads up to `FILE_READ_SIZE` bytes into `out`. Returns `Ok(true)` if
    /// more remains to be pumped on a later call, `Ok(false)` once the file
    /// is exhausted.
    pub(crate) fn pump(&mut self, out: &mut Vec<u8>) -> io::Result<bool> {
        let want = FILE_READ_SIZE.min(self.remaining as usize);
        if want == 0 {
            return Ok(false);
        }
        let start = out.len();
        out.resize(start + want, 0);
        self.file.read_exact(&mut out[start..])?;
        self.remaining -= want as u64;
        Ok(self.remaining > 0)
    }
}

impl Connection {
    /// Begins serving `path` as the response body: composes headers with a
    /// known `Content-Length` and an `attachment` disposition, then writes
    /// the first chunk immediately so the handler doesn't need to call
    /// `write` itself.
    pub fn serve_static_file(&mut self, path: &Path) -> io::Result<()> {
        let metadata = std::fs::metadata(path)?;
        let size = metadata.len();
        let file = File::open(path)?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.out_headers.insert("Content-Length".to_owned(), size.to_string());
        self.out_headers
            .insert("Content-Type".to_owned(), guess_content_type(&filename));
        self.out_headers.insert(
            "Content-Disposition".to_owned(),
            format!("attachment; filename=\"{}\"", filename),
        );

        self.compose_headers();

        let mut pump = StaticFile { file, remaining: size };
        pump.pump(&mut self.write_buffer)?;
        self.static_file = Some(pump);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use tempfile::NamedTempFile;

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
    fn serves_whole_small_file_in_one_pump() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();

        let mut conn = new_connection();
        conn.serve_static_file(tmp.path()).unwrap();

        assert!(conn.static_file.is_none());
        let out = String::from_utf8_lossy(&conn.write_buffer).into_owned();
        assert!(out.contains("Content-Length: 11"));
        assert!(out.contains("Content-Disposition: attachment"));
        assert!(out.ends_with("hello world"));
    }

    #[test]
    fn large_file_is_pumped_across_multiple_write_finished_calls() {
        let mut tmp = NamedTempFile::new().unwrap();
        let chunk = vec![b'x'; 131_070];
        tmp.write_all(&chunk).unwrap();
        tmp.write_all(b"tail").unwrap();

        let mut conn = new_connection();
        conn.serve_static_file(tmp.path()).unwrap();
        assert!(conn.static_file.is_some());

        conn.write_buffer.clear();
        conn.on_write_finished();
        assert!(conn.static_file.is_none());
        assert_eq!(conn.write_buffer, b"tail");
    }
}
