//! UTF-16LE/UTF-8/codepage decode helpers and hex/base64 convenience
//! wrappers, shared by the EDB entity assembler and the PST writer's
//! property encoding.

use codepage_strings::Coding;

/// Decodes a little-endian UTF-16 byte sequence, substituting U+FFFD for
/// unpaired surrogates rather than failing.
pub fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Encodes a string as UTF-16LE with no byte-order mark.
pub fn encode_utf16le(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() * 2);
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Decoding result for a legacy code-page body, carrying whether a
/// replacement character was substituted (feeds the per-record diagnostic
/// count).
pub struct DecodedText {
    pub text: String,
    pub lossy: bool,
}

/// Encoding-detection heuristic: try UTF-8 strict; on failure, probe for
/// Cyrillic signatures by the frequency of high bytes (0xC0..=0xFF) and
/// pick Windows-1251 or KOI8-R by whichever decode yields the higher ratio
/// of printable/common Cyrillic letters; otherwise fall back to
/// Windows-1252.
pub fn decode_legacy_body(bytes: &[u8]) -> DecodedText {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedText {
            text: text.to_string(),
            lossy: false,
        };
    }

    let high_byte_count = bytes.iter().filter(|&&b| (0xC0..=0xFF).contains(&b)).count();
    let looks_cyrillic = bytes.is_empty() || (high_byte_count * 100 / bytes.len().max(1)) > 20;

    if looks_cyrillic {
        let win1251 = decode_codepage(bytes, "windows-1251");
        let koi8r = decode_codepage(bytes, "koi8-r");
        if let (Some(a), Some(b)) = (&win1251, &koi8r) {
            return if cyrillic_letter_ratio(a) >= cyrillic_letter_ratio(b) {
                DecodedText {
                    text: a.clone(),
                    lossy: false,
                }
            } else {
                DecodedText {
                    text: b.clone(),
                    lossy: false,
                }
            };
        }
        if let Some(a) = win1251 {
            return DecodedText {
                text: a,
                lossy: false,
            };
        }
    }

    match decode_codepage(bytes, "windows-1252") {
        Some(text) => DecodedText { text, lossy: false },
        None => DecodedText {
            text: String::from_utf8_lossy(bytes).into_owned(),
            lossy: true,
        },
    }
}

fn decode_codepage(bytes: &[u8], name: &str) -> Option<String> {
    let coding = Coding::new(name).ok()?;
    coding.decode(bytes).ok().map(|cow| cow.into_owned())
}

fn cyrillic_letter_ratio(text: &str) -> f64 {
    let total = text.chars().count().max(1);
    let cyrillic = text
        .chars()
        .filter(|c| ('\u{0400}'..='\u{04FF}').contains(c))
        .count();
    cyrillic as f64 / total as f64
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_round_trip() {
        let s = "Hello, \u{43f}\u{440}\u{438}\u{432}\u{435}\u{442}";
        let encoded = encode_utf16le(s);
        assert_eq!(decode_utf16le(&encoded), s);
    }

    #[test]
    fn test_utf16_unpaired_surrogate_becomes_replacement() {
        let bytes = 0xD800u16.to_le_bytes();
        let decoded = decode_utf16le(&bytes);
        assert_eq!(decoded, "\u{FFFD}");
    }

    #[test]
    fn test_legacy_body_prefers_utf8() {
        let decoded = decode_legacy_body("plain ascii".as_bytes());
        assert_eq!(decoded.text, "plain ascii");
        assert!(!decoded.lossy);
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0xDE, 0xAD, 0xBE, 0xEF]), "deadbeef");
    }
}
