//! Gmail transport encoding: URL-safe base64 with optional padding.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid base64url data: {0}")]
pub struct DecodeError(#[from] base64::DecodeError);

/// Decode a base64url body part into text.
///
/// Padding is added when missing. Standard-alphabet characters are accepted
/// too. Bytes that are not valid UTF-8 are read as Latin-1.
pub fn decode_transport_text(data: &str) -> Result<String, DecodeError> {
    let mut normalized: String = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();

    let remainder = normalized.len() % 4;
    if remainder != 0 {
        normalized.extend(std::iter::repeat('=').take(4 - remainder));
    }

    let bytes = URL_SAFE.decode(normalized.as_bytes())?;

    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    })
}
