//! Text normalization and response decoding helpers.

use std::borrow::Cow;

use mime::Mime;
use unicode_normalization::{IsNormalized, UnicodeNormalization, is_nfkd_quick};

/// NFKD-normalize and trim a user supplied value.
pub fn normalize(text: &str) -> String {
    text.trim().nfkd().collect()
}

/// NFKD-normalize decoded page text in place, so it compares equal to
/// normalized examples. Already-normalized strings are left alone.
pub fn normalize_in_place(text: &mut String) {
    if is_nfkd_quick(text.chars()) != IsNormalized::Yes {
        *text = text.nfkd().collect();
    }
}

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. Uses the declared charset when one is given and known to encoding_rs
/// 2. Otherwise tries UTF-8 (handles BOM automatically)
/// 3. Falls back to Windows-1252 (superset of ISO-8859-1, common on old sites)
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], declared_charset: Option<&str>) -> Cow<'a, str> {
    if let Some(name) = declared_charset
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed {
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract the `charset` parameter from a `Content-Type` header value,
/// lowercased.
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    let parsed: Mime = content_type.to_ascii_lowercase().parse().ok()?;
    let charset = parsed.get_param(mime::CHARSET)?;
    let charset = charset.as_str().trim_matches('"');
    (!charset.is_empty()).then(|| charset.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_decomposes() {
        assert_eq!(normalize("  caf\u{e9} "), "cafe\u{301}");
        assert_eq!(normalize("\u{fb01}x"), "fix");
    }

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_text("h\u{e9}llo".as_bytes(), None), "h\u{e9}llo");
    }

    #[test]
    fn test_decode_declared_charset() {
        // "привет" in windows-1251
        let bytes = [0xEF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2];
        assert_eq!(decode_text(&bytes, Some("windows-1251")), "привет");
    }

    #[test]
    fn test_decode_falls_back_to_cp1252() {
        let bytes = [b'c', b'a', b'f', 0xE9];
        assert_eq!(decode_text(&bytes, None), "caf\u{e9}");
    }

    #[test]
    fn test_unknown_charset_ignored() {
        assert_eq!(decode_text(b"plain", Some("x-made-up")), "plain");
    }

    #[test]
    fn test_normalize_in_place() {
        let mut text = "Caf\u{e9}\u{a0}news\u{2026}".to_string();
        normalize_in_place(&mut text);
        assert_eq!(text, "Cafe\u{301} news...");

        let mut plain = "already plain".to_string();
        normalize_in_place(&mut plain);
        assert_eq!(plain, "already plain");
    }

    #[test]
    fn test_charset_from_content_type() {
        assert_eq!(
            charset_from_content_type("text/html; charset=UTF-8").as_deref(),
            Some("utf-8")
        );
        assert_eq!(
            charset_from_content_type("text/html;Charset=koi8-r").as_deref(),
            Some("koi8-r")
        );
        assert_eq!(charset_from_content_type("text/html"), None);
        assert_eq!(charset_from_content_type("not a content type"), None);
    }
}
