//! Canned HTTP response
//!
//! Every serviced connection receives the same HTTP/1.0 reply. Nothing the
//! client sends influences it.

use std::io::{self, Write};
use std::sync::OnceLock;

pub const BODY: &str = "Hello world!";

static RESPONSE: OnceLock<Vec<u8>> = OnceLock::new();

/// The full response bytes, with `Content-Length` taken from [`BODY`]
pub fn canned_response() -> &'static [u8] {
    RESPONSE.get_or_init(|| {
        format!(
            "HTTP/1.0 200 OK\r\nContent-Length: {}\r\n\r\n{BODY}",
            BODY.len()
        )
        .into_bytes()
    })
}

/// Send the response with a single write, returning how many bytes went out.
///
/// A short count is possible on a non-blocking socket; callers treat it like
/// any other send failure.
pub fn respond<W: Write>(writer: &mut W) -> io::Result<usize> {
    writer.write(canned_response())
}
