//! Streaming multipart/form-data support (spec §4.3/§4.3.1).
//!
//! Grounded on `handle_multipart_boundary`, `handle_multipart_post_boundary`,
//! `handle_multipart_headers` and `multipart_read_delimiter` in the original
//! `http.py`. File parts are spooled straight to disk under a random name as
//! their bytes arrive rather than buffered in memory; field parts stay in
//! memory with a small byte ceiling. Content-type inference and the
//! boundary/delimiter search itself reuse the teacher multipart crate's own
//! dependencies (`mime_guess`, `twoway`) rather than reimplementing either.

use std::fs::File;
use std::io::Write;

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Maximum size, in bytes, of a non-file field value (spec §4.3.1).
pub const MAX_FIELD_BYTES: usize = 1000;

/// Why an upload ended up truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    /// `http_max_upload_size` was reached; the remainder of the part's bytes
    /// were discarded rather than written.
    MaxSizeExceeded,
}

/// One uploaded file, recorded once its part has been fully read.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub filename: String,
    pub content_type: String,
    pub temp_path: String,
    pub size: u64,
    pub error: Option<UploadError>,
}

/// The value stored in `Connection::files` under a field name: either the one
/// upload seen for that name, or, once a second upload under the same name
/// arrives, an ordered sequence of them (mirrors `ParamValue`).
#[derive(Debug, Clone)]
pub enum UploadSlot {
    One(UploadRecord),
    Many(Vec<UploadRecord>),
}

impl UploadSlot {
    pub fn push(self, record: UploadRecord) -> UploadSlot {
        match self {
            UploadSlot::One(existing) => UploadSlot::Many(vec![existing, record]),
            UploadSlot::Many(mut records) => {
                records.push(record);
                UploadSlot::Many(records)
            }
        }
    }
}

/// State held for the file part currently being streamed to disk.
pub struct OpenUpload {
    pub field_name: String,
    pub filename: String,
    pub temp_path: String,
    pub file: File,
    pub written: u64,
    pub error: Option<UploadError>,
}

impl OpenUpload {
    /// Appends `bytes` to the spooled file, honoring `max_size` by truncating
    /// writes (and flagging `MaxSizeExceeded`) rather than aborting the parse
    /// — a maxed-out part is still a part, per spec §4.3.1.
    pub fn write_chunk(&mut self, bytes: &[u8], max_size: Option<u64>) -> std::io::Result<()> {
        if self.error.is_some() {
            return Ok(());
        }
        let allowed = match max_size {
            Some(max) if self.written.saturating_add(bytes.len() as u64) > max => {
                self.error = Some(UploadError::MaxSizeExceeded);
                (max - self.written) as usize
            }
            _ => bytes.len(),
        };
        if allowed > 0 {
            self.file.write_all(&bytes[..allowed])?;
            self.written += allowed as u64;
        }
        Ok(())
    }

    pub fn finish(self) -> UploadRecord {
        UploadRecord {
            content_type: guess_content_type(&self.filename),
            filename: self.filename,
            temp_path: self.temp_path,
            size: self.written,
            error: self.error,
        }
    }
}

/// Infers a content type from a filename, falling back to `text/plain` the
/// way `mimetypes.guess_type` does in the original when it has no match.
pub fn guess_content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first()
        .map(|m| m.essence_str().to_owned())
        .unwrap_or_else(|| "text/plain".to_owned())
}

/// Generates a 25-character random alphanumeric temp file name under
/// `upload_dir`, matching the random naming scheme in `handle_multipart_headers`.
pub fn random_temp_path(upload_dir: &str) -> String {
    let name: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(25)
        .map(char::from)
        .collect();
    format!("{}/{}", upload_dir.trim_end_matches('/'), name)
}

/// Parses a `Content-Disposition: form-data; name="..."[; filename="..."]`
/// value into `(name, filename)`. Uses substring search rather than the fixed
/// character offsets the original relies on, since Rust has no guarantee the
/// header was built with that exact prefix.
pub fn parse_content_disposition(value: &str) -> Option<(String, Option<String>)> {
    let name = extract_quoted(value, "name=\"")?;
    let filename = extract_quoted(value, "filename=\"");
    Some((name, filename))
}

fn extract_quoted(haystack: &str, marker: &str) -> Option<String> {
    let start = haystack.find(marker)? + marker.len();
    let rest = &haystack[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_owned())
}

/// Splits a `\r\n`-joined block of `Name: value` header lines (as returned by
/// a delimiter read, delimiter bytes included) into `(name, value)` pairs.
pub fn split_header_lines(data: &[u8]) -> Vec<(String, String)> {
    let text = String::from_utf8_lossy(data);
    let trimmed = text.trim_end_matches(|c: char| c == '\r' || c == '\n');
    trimmed
        .split("\r\n")
        .filter_map(|line| {
            let mut parts = line.splitn(2, ": ");
            let name = parts.next()?;
            let value = parts.next()?;
            if name.is_empty() {
                None
            } else {
                Some((name.to_owned(), value.to_owned()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_with_filename() {
        let (name, filename) =
            parse_content_disposition(r#"form-data; name="avatar"; filename="pic.png""#).unwrap();
        assert_eq!(name, "avatar");
        assert_eq!(filename.as_deref(), Some("pic.png"));
    }

    #[test]
    fn content_disposition_field_only() {
        let (name, filename) = parse_content_disposition(r#"form-data; name="title""#).unwrap();
        assert_eq!(name, "title");
        assert_eq!(filename, None);
    }

    #[test]
    fn header_line_splitting() {
        let lines = split_header_lines(b"Content-Disposition: form-data; name=\"a\"\r\n\r\n");
        assert_eq!(lines, vec![(
            "Content-Disposition".to_owned(),
            "form-data; name=\"a\"".to_owned()
        )]);
    }

    #[test]
    fn content_type_guessed_from_extension() {
        assert_eq!(guess_content_type("photo.png"), "image/png");
        assert_eq!(guess_content_type("noext"), "text/plain");
    }

    #[test]
    fn random_temp_path_is_25_chars_under_dir() {
        let path = random_temp_path("/tmp/uploads/");
        let name = path.rsplit('/').next().unwrap();
        assert_eq!(name.len(), 25);
        assert!(path.starts_with("/tmp/uploads/"));
    }
}
