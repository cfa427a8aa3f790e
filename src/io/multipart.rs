//! Parser for `multipart/byteranges` HTTP response bodies.
//!
//! A multi-range request is answered with a body of the form
//!
//! ```text
//! --BOUNDARY\r\n
//! Content-Type: ...\r\n
//! Content-Range: bytes 0-9/100\r\n
//! \r\n
//! <ten raw bytes>\r\n
//! --BOUNDARY\r\n
//! ...
//! --BOUNDARY--
//! ```
//!
//! Parts are returned in the order the server emitted them; per-part headers
//! are discarded. Malformed input (missing boundary, truncated part,
//! unterminated final boundary) fails with an I/O error.

use std::io;

use memchr::memmem;

/// Extract the `boundary` parameter from a `Content-Type` header value.
///
/// Returns `None` unless the media type is `multipart/byteranges` with a
/// non-empty boundary. Quoted boundary values are unquoted.
pub(crate) fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let (media_type, params) = content_type.split_once(';')?;
    if !media_type.trim().eq_ignore_ascii_case("multipart/byteranges") {
        return None;
    }
    for param in params.split(';') {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("boundary") {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Split a `multipart/byteranges` body into its raw parts, in server order.
pub(crate) fn split_parts(body: &[u8], boundary: &str) -> io::Result<Vec<Vec<u8>>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let crlf_delimiter = [b"\r\n", delimiter].concat();

    // The first delimiter may be preceded by a preamble the server is free
    // to emit; everything before it is skipped.
    let mut pos = memmem::find(body, delimiter)
        .ok_or_else(|| malformed("multipart boundary not found in response body"))?;

    let mut parts = Vec::new();
    loop {
        pos += delimiter.len();
        let rest = &body[pos..];

        // "--" after the delimiter closes the multipart stream.
        if rest.starts_with(b"--") {
            return Ok(parts);
        }
        let rest = rest
            .strip_prefix(b"\r\n")
            .ok_or_else(|| malformed("multipart boundary not followed by CRLF"))?;
        pos = body.len() - rest.len();

        // Part headers run until a blank line; their contents are discarded.
        let headers_end = memmem::find(rest, b"\r\n\r\n")
            .ok_or_else(|| malformed("multipart part headers not terminated"))?;
        let payload_start = pos + headers_end + 4;

        // The payload runs until the CRLF that precedes the next delimiter.
        let payload = &body[payload_start..];
        let next = memmem::find(payload, &crlf_delimiter)
            .ok_or_else(|| malformed("multipart part truncated before closing boundary"))?;
        parts.push(payload[..next].to_vec());
        pos = payload_start + next + 2;
    }
}

fn malformed(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}
