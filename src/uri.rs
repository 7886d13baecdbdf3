//! Helpers for the two URI shapes the display layer understands:
//! `file://` URIs for direct loading and `data:` URIs for base64 payloads.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Bytes kept as-is when percent-encoding a path
fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'/' | b':')
}

/// Build a `file://` URI for an absolute path.
/// Returns None for relative or non UTF-8 paths.
pub fn file_uri_from_path(path: &Path) -> Option<String> {
    if !path.is_absolute() {
        return None;
    }
    let raw = path.to_str()?;
    #[cfg(windows)]
    let raw = format!("/{}", raw.replace('\\', "/"));

    let mut uri = String::with_capacity(FILE_SCHEME.len() + raw.len());
    uri.push_str(FILE_SCHEME);
    for &byte in raw.as_bytes() {
        if is_unreserved(byte) {
            uri.push(byte as char);
        } else {
            uri.push_str(&format!("%{:02X}", byte));
        }
    }
    Some(uri)
}

/// Inverse of [`file_uri_from_path`]
pub fn path_from_file_uri(uri: &str) -> Option<PathBuf> {
    let rest = uri.strip_prefix(FILE_SCHEME)?;
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    if !rest.starts_with('/') {
        return None;
    }

    let bytes = rest.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = rest.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    let decoded = String::from_utf8(decoded).ok()?;

    #[cfg(windows)]
    let decoded = decoded.trim_start_matches('/').replace('/', "\\");

    Some(PathBuf::from(decoded))
}

/// `data:<mime>;base64,<payload>`
pub fn data_uri(mime: &str, base64_payload: &str) -> String {
    format!("data:{};base64,{}", mime, base64_payload)
}

/// Split a base64 data URI into its MIME type and decoded bytes
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = BASE64.decode(payload).ok()?;
    Some((mime.to_string(), bytes))
}
