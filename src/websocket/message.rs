//! Chat Message Payloads
//!
//! Payloads are opaque bytes. The only normalization applied before fan-out
//! folds line breaks into spaces so a client cannot smuggle extra lines into
//! the newline-delimited outbound batches.

use bytes::Bytes;

/// Replace every line break (`\r\n`, `\n` or `\r`) with a single space and
/// trim surrounding whitespace.
///
/// Valid UTF-8 is trimmed of Unicode whitespace (`U+00A0`, `U+0085`, ...);
/// anything else only of ASCII whitespace.
pub fn normalize(payload: &[u8]) -> Bytes {
    let mut folded = Vec::with_capacity(payload.len());
    let mut bytes = payload.iter().copied().peekable();

    while let Some(byte) = bytes.next() {
        match byte {
            b'\r' => {
                bytes.next_if_eq(&b'\n');
                folded.push(b' ');
            }
            b'\n' => folded.push(b' '),
            other => folded.push(other),
        }
    }

    let trimmed = match std::str::from_utf8(&folded) {
        Ok(text) => text.trim().as_bytes(),
        Err(_) => folded.trim_ascii(),
    };
    Bytes::copy_from_slice(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newline_becomes_space() {
        assert_eq!(normalize(b"hello\nworld"), Bytes::from_static(b"hello world"));
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        assert_eq!(normalize(b"  hi  "), Bytes::from_static(b"hi"));
        assert_eq!(normalize(b"\thi\n"), Bytes::from_static(b"hi"));
    }

    #[test]
    fn test_crlf_is_one_space() {
        assert_eq!(normalize(b"one\r\ntwo\rthree"), Bytes::from_static(b"one two three"));
    }

    #[test]
    fn test_blank_input() {
        assert!(normalize(b"").is_empty());
        assert!(normalize(b" \n \r\n ").is_empty());
    }

    #[test]
    fn test_unicode_whitespace_trimmed() {
        assert_eq!(
            normalize("\u{a0}caf\u{e9}\u{85}\u{2003}".as_bytes()),
            Bytes::from("caf\u{e9}".as_bytes().to_vec())
        );
        // Inner non-breaking spaces are content
        assert_eq!(
            normalize("a\u{a0}b".as_bytes()),
            Bytes::from("a\u{a0}b".as_bytes().to_vec())
        );
    }

    #[test]
    fn test_invalid_utf8_trims_ascii_only() {
        assert_eq!(normalize(b" \xff\xfe\n"), Bytes::from_static(b"\xff\xfe"));
    }

    #[test]
    fn test_inner_spacing_preserved() {
        assert_eq!(normalize(b"a  b\n\nc"), Bytes::from_static(b"a  b  c"));
    }
}
