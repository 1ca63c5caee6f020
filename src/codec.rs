//! Binary payload codec: base64 transport encoding, content hashing and
//! magic-byte file type detection for result artifacts.

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// Strip a CDATA wrapper, a leading byte-order mark and all whitespace.
pub fn normalize_base64(input: &str) -> String {
    let mut s = input.trim().trim_start_matches('\u{feff}').trim();
    if let Some(inner) = s
        .strip_prefix(CDATA_OPEN)
        .and_then(|rest| rest.strip_suffix(CDATA_CLOSE))
    {
        s = inner;
    }
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{feff}')
        .collect()
}

/// Decode a base64 field as the provider sends it.
/// Blank input yields an empty vector, not an error.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, DecodeError> {
    let cleaned = normalize_base64(input);
    if cleaned.is_empty() {
        return Ok(Vec::new());
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(cleaned.as_bytes())?)
}

pub fn encode_base64(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn is_valid_base64(input: &str) -> bool {
    let cleaned = normalize_base64(input);
    !cleaned.is_empty()
        && base64::engine::general_purpose::STANDARD
            .decode(cleaned.as_bytes())
            .is_ok()
}

/// Lowercase hex SHA-256 of the content. `None` for empty input.
pub fn sha256_hex(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let digest = Sha256::digest(bytes);
    Some(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Artifact types we recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Pdf,
    Png,
    Jpg,
    Bin,
}

impl FileType {
    /// Upper-case extension as stored with attached documents.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Png => "PNG",
            Self::Jpg => "JPG",
            Self::Bin => "BIN",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpg => "image/jpeg",
            Self::Bin => "application/octet-stream",
        }
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Detect file type from magic bytes (NOT from the field it arrived in).
pub fn classify(bytes: &[u8]) -> FileType {
    match bytes {
        // PDF: starts with %PDF-
        [0x25, 0x50, 0x44, 0x46, 0x2D, ..] => FileType::Pdf,
        _ if bytes.starts_with(&PNG_SIGNATURE) => FileType::Png,
        // JPEG: SOI marker FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => FileType::Jpg,
        _ => FileType::Bin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_prefix_decodes_and_classifies() {
        let bytes = decode_base64("JVBERi0x").unwrap();
        assert!(bytes.starts_with(b"%PDF-1"));
        assert_eq!(classify(&bytes), FileType::Pdf);
    }

    #[test]
    fn whitespace_and_bom_are_ignored() {
        let bytes = decode_base64("\u{feff}JVBE\r\n  Ri0x\t").unwrap();
        assert_eq!(bytes, b"%PDF-1");
    }

    #[test]
    fn cdata_wrapper_is_removed() {
        assert_eq!(normalize_base64("<![CDATA[ JVBE Ri0x ]]>"), "JVBERi0x");
    }

    #[test]
    fn blank_input_is_empty_not_error() {
        assert!(decode_base64("").unwrap().is_empty());
        assert!(decode_base64("  \n ").unwrap().is_empty());
    }

    #[test]
    fn malformed_input_is_error() {
        assert!(decode_base64("not*base64!").is_err());
        assert!(!is_valid_base64("not*base64!"));
        assert!(!is_valid_base64(""));
        assert!(is_valid_base64("JVBERi0x"));
    }

    #[test]
    fn encode_matches_decode() {
        assert_eq!(encode_base64(b"%PDF-1"), "JVBERi0x");
        assert_eq!(encode_base64(b""), "");
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc").as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(sha256_hex(b""), None);
    }

    #[test]
    fn classify_images() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
        assert_eq!(classify(&png), FileType::Png);
        assert_eq!(classify(&[0xFF, 0xD8, 0xFF, 0xE0]), FileType::Jpg);
        // Truncated PNG signature is not enough
        assert_eq!(classify(&png[..4]), FileType::Bin);
    }

    #[test]
    fn classify_defaults_to_bin() {
        assert_eq!(classify(b""), FileType::Bin);
        assert_eq!(classify(b"%PDF"), FileType::Bin);
        assert_eq!(classify(b"GIF89a"), FileType::Bin);
    }

    #[test]
    fn extensions_and_mime_types() {
        assert_eq!(FileType::Pdf.extension(), "PDF");
        assert_eq!(FileType::Jpg.mime_type(), "image/jpeg");
        assert_eq!(FileType::Bin.extension(), "BIN");
    }
}
