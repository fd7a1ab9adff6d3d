//! Wire codec for token messages.
//!
//! Wire format:
//! ```text
//! [token id as UTF-8 text]
//! ```
//! That is the whole message — no length prefix, no delimiter, no checksum.
//! The transport contract guarantees that one write on one side surfaces as
//! one read on the other, so message boundaries come from the transport,
//! not from the payload.  The codec's job is to reject everything that
//! cannot be a token id (empty, oversized, or non-UTF-8 payloads) with a
//! typed error instead of letting it corrupt game state.

use std::str::Utf8Error;

use thiserror::Error;

use crate::domain::token::TokenId;
use crate::protocol::service::MAX_MESSAGE_LEN;

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The message carries no bytes at all.
    #[error("empty message")]
    Empty,

    /// The message exceeds the unfragmented-read bound.
    #[error("message too long: {len} bytes, maximum is {max}")]
    TooLong { len: usize, max: usize },

    /// The payload is not valid UTF-8.
    #[error("message is not valid UTF-8: {0}")]
    InvalidUtf8(#[source] Utf8Error),
}

/// Encodes one token id into its wire representation.
///
/// # Errors
///
/// Returns [`ProtocolError::Empty`] for an empty id and
/// [`ProtocolError::TooLong`] for an id that would not fit one
/// unfragmented read.
///
/// # Examples
///
/// ```rust
/// use cubelink_core::{decode_token, encode_token, TokenId};
///
/// let id = TokenId::from("cube_1");
/// let bytes = encode_token(&id).unwrap();
/// assert_eq!(decode_token(&bytes).unwrap(), id);
/// ```
pub fn encode_token(id: &TokenId) -> Result<Vec<u8>, ProtocolError> {
    let bytes = id.as_str().as_bytes();
    if bytes.is_empty() {
        return Err(ProtocolError::Empty);
    }
    if bytes.len() > MAX_MESSAGE_LEN {
        return Err(ProtocolError::TooLong {
            len: bytes.len(),
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(bytes.to_vec())
}

/// Decodes the bytes of one transport read into a token id.
///
/// The bytes are taken verbatim; no trimming or normalisation is applied.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the payload is empty, oversized, or not
/// valid UTF-8.
pub fn decode_token(bytes: &[u8]) -> Result<TokenId, ProtocolError> {
    if bytes.is_empty() {
        return Err(ProtocolError::Empty);
    }
    if bytes.len() > MAX_MESSAGE_LEN {
        return Err(ProtocolError::TooLong {
            len: bytes.len(),
            max: MAX_MESSAGE_LEN,
        });
    }
    let text = std::str::from_utf8(bytes).map_err(ProtocolError::InvalidUtf8)?;
    Ok(TokenId::new(text))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_then_decode_round_trips() {
        // Arrange
        let id = TokenId::from("cube_3");

        // Act
        let bytes = encode_token(&id).expect("encode");
        let decoded = decode_token(&bytes).expect("decode");

        // Assert
        assert_eq!(decoded, id);
        assert_eq!(bytes, b"cube_3");
    }

    #[test]
    fn test_decode_accepts_multibyte_utf8() {
        let bytes = "würfel_1".as_bytes();
        let decoded = decode_token(bytes).expect("decode");
        assert_eq!(decoded.as_str(), "würfel_1");
    }

    #[test]
    fn test_encode_rejects_empty_token() {
        let result = encode_token(&TokenId::from(""));
        assert_eq!(result, Err(ProtocolError::Empty));
    }

    #[test]
    fn test_decode_rejects_empty_payload() {
        assert_eq!(decode_token(&[]), Err(ProtocolError::Empty));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        // 0xFF is never valid in UTF-8
        let result = decode_token(&[0x63, 0x75, 0xFF]);
        assert!(matches!(result, Err(ProtocolError::InvalidUtf8(_))));
    }

    #[test]
    fn test_encode_rejects_oversized_token() {
        let id = TokenId::new("x".repeat(MAX_MESSAGE_LEN + 1));
        let result = encode_token(&id);
        assert!(matches!(result, Err(ProtocolError::TooLong { .. })));
    }

    #[test]
    fn test_decode_rejects_oversized_payload() {
        let payload = vec![b'a'; MAX_MESSAGE_LEN + 1];
        let result = decode_token(&payload);
        assert!(matches!(result, Err(ProtocolError::TooLong { .. })));
    }

    #[test]
    fn test_token_at_exact_size_limit_is_accepted() {
        let id = TokenId::new("x".repeat(MAX_MESSAGE_LEN));
        let bytes = encode_token(&id).expect("encode at limit");
        assert_eq!(decode_token(&bytes).expect("decode at limit"), id);
    }
}
