use anyhow::Result;
use bytes::Bytes;

/// Decode a UTF-8 payload into an owned string.
pub fn string_from_bytes(bytes: Bytes) -> Result<String> {
    Ok(String::from_utf8(bytes.to_vec())?)
}
