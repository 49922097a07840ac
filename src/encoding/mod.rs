//! Encoding detection and transcoding.
//!
//! Implements BOM sniffing per XML 1.0 Appendix F and bridges to
//! `encoding_rs` for character encoding conversion. The caller may override
//! detection with an explicitly named encoding (the `encoding` parameter of
//! the document constructors).

use std::fmt;

/// An error that occurs during encoding detection or transcoding.
#[derive(Debug, Clone)]
pub struct EncodingError {
    /// A human-readable description of the encoding error.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error: {}", self.message)
    }
}

impl std::error::Error for EncodingError {}

/// Detects the encoding of an XML byte stream by inspecting the Byte Order
/// Mark.
///
/// Returns a tuple of (encoding name, number of BOM bytes to skip). Per XML
/// 1.0 Appendix F, the detection order is:
/// - `EF BB BF` -> UTF-8
/// - `FE FF`    -> UTF-16 BE
/// - `FF FE`    -> UTF-16 LE
/// - No BOM     -> UTF-8 (default per the XML specification)
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (&'static str, usize) {
    if bytes.len() >= 3 && bytes[0] == 0xEF && bytes[1] == 0xBB && bytes[2] == 0xBF {
        ("UTF-8", 3)
    } else if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        ("UTF-16BE", 2)
    } else if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
        ("UTF-16LE", 2)
    } else {
        ("UTF-8", 0)
    }
}

/// Transcodes a byte slice from the named encoding into a UTF-8 `String`.
///
/// Uses `encoding_rs::Encoding::for_label` to look up the encoding by its
/// IANA name (case-insensitive).
///
/// # Errors
///
/// Returns `EncodingError` if the encoding name is not recognized or the
/// input contains malformed byte sequences.
pub fn transcode(bytes: &[u8], encoding_name: &str) -> Result<String, EncodingError> {
    let encoding = encoding_rs::Encoding::for_label(encoding_name.as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding: {encoding_name}")))?;

    let (result, _used_encoding, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {encoding_name}"
        )));
    }
    Ok(result.into_owned())
}

/// Decodes raw XML bytes to UTF-8.
///
/// When `declared` names an encoding, it wins over BOM sniffing (the caller
/// knows best — this mirrors passing an explicit encoding to the underlying
/// reader). Otherwise the BOM decides, defaulting to UTF-8. A leading BOM is
/// stripped in either case.
///
/// # Errors
///
/// Returns `EncodingError` if the bytes cannot be transcoded.
pub fn decode_to_utf8(bytes: &[u8], declared: Option<&str>) -> Result<String, EncodingError> {
    let (sniffed, skip) = detect_encoding(bytes);
    let name = declared.unwrap_or(sniffed);
    // encoding_rs strips the BOM itself for UTF-16 variants; for UTF-8 we
    // drop the sniffed BOM bytes before decoding.
    let payload = if name.eq_ignore_ascii_case("utf-8") {
        &bytes[skip..]
    } else {
        bytes
    };
    let text = transcode(payload, name)?;
    Ok(text.strip_prefix('\u{FEFF}').unwrap_or(&text).to_string())
}
