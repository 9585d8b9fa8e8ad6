//! PropertyBlob / RecipientList parser.
//!
//! The PropertyBlob layout is not publicly documented; this module locates
//! its fields by marker/sentinel scanning rather than a fixed schema. Every
//! extraction here is best-effort: a missing sentinel yields an empty field
//! rather than an error.

use crate::util::codec::decode_utf16le;

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PropertyBlobFields {
    pub sender_name: String,
    pub subject: String,
    pub sender_email: String,
    pub message_id: String,
}

/// Parses a decompressed message-row PropertyBlob into its known fields.
pub fn parse_property_blob(blob: &[u8]) -> PropertyBlobFields {
    let sender_name_upper = extract_sender_name_upper(blob).unwrap_or_default();
    let sender_name = recover_casing(&sender_name_upper);
    let subject = if sender_name_upper.is_empty() {
        String::new()
    } else {
        locate_subject(blob, &sender_name_upper)
    };

    let sentinel_pos = find_subslice(blob, sender_name_upper.as_bytes()).unwrap_or(0);
    let entries_after = scan_m_entries(&blob[sentinel_pos..]);
    let sender_email = entries_after
        .iter()
        .find(|s| looks_like_email(s))
        .cloned()
        .unwrap_or_default();
    let message_id = entries_after
        .iter()
        .find(|s| s.starts_with('<') && s.ends_with('>') && s.contains('@'))
        .cloned()
        .unwrap_or_default();

    PropertyBlobFields {
        sender_name,
        subject,
        sender_email,
        message_id,
    }
}

/// Per-recipient sub-blocks of a decompressed RecipientList blob, each
/// identified by a leading `ProP` fourcc. Returns an ordered
/// display-name -> email map; unmatched names keep `email = ""`.
pub fn parse_recipient_list(blob: &[u8]) -> Vec<(String, String)> {
    let marker = b"ProP";
    let starts = find_all_subslice(blob, marker);
    let mut out = Vec::new();

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(blob.len());
        let sub_block = &blob[start..end];
        let entries = scan_m_entries(sub_block);
        let Some(name) = entries.first().cloned() else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let email = entries
            .iter()
            .find(|s| looks_like_email(s))
            .cloned()
            .unwrap_or_default();
        out.push((name, email));
    }

    out
}

fn looks_like_email(candidate: &str) -> bool {
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && domain.contains('.')
}

/// Finds the CN legacy-DN segment (`cn=<GUID>-<SENDER_NAME>`) and returns
/// the uppercase name after the last `-` up to the next non-name
/// terminator.
fn extract_sender_name_upper(blob: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(blob);
    for (idx, _) in text.match_indices("cn=") {
        let rest = &text[idx + 3..];
        let end = rest
            .find(|c: char| c == '/' || c.is_control())
            .unwrap_or(rest.len());
        let segment = &rest[..end];
        let Some(dash) = segment.rfind('-') else {
            continue;
        };
        let name = segment[dash + 1..].trim();
        if !name.is_empty() && name.chars().any(|c| c.is_alphabetic()) {
            return Some(name.to_string());
        }
    }
    None
}

/// Recovers display casing from an all-uppercase name: first letter of
/// each whitespace-separated token uppercase, the rest lowercase.
fn recover_casing(upper: &str) -> String {
    upper
        .split_whitespace()
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Locates the `<SENDER_NAME_UPPERCASE>M`/`I` sentinel, trying
/// progressively shorter uppercase prefixes (preferring the longest match)
/// to tolerate Exchange's name truncation.
fn locate_subject(blob: &[u8], sender_name_upper: &str) -> String {
    let tokens: Vec<&str> = sender_name_upper.split_whitespace().collect();
    for len in (1..=tokens.len()).rev() {
        let candidate = tokens[..len].join(" ");
        if let Some(subject) = try_sentinel_payload(blob, &candidate) {
            return subject;
        }
    }
    String::new()
}

/// Finds `name + 'M'`/`name + 'I'` in `blob`, reads the following VLQ
/// length and payload, and returns the decoded string. Prefers the first
/// occurrence with a non-empty payload.
fn try_sentinel_payload(blob: &[u8], name: &str) -> Option<String> {
    let name_bytes = name.as_bytes();
    let mut fallback: Option<String> = None;

    for &kind in &[b'M', b'I'] {
        let mut search_from = 0;
        while let Some(rel) = find_subslice(&blob[search_from..], name_bytes) {
            let start = search_from + rel;
            let sentinel_pos = start + name_bytes.len();
            search_from = start + 1;

            if blob.get(sentinel_pos) != Some(&kind) {
                continue;
            }
            let Some((length, payload_start)) = read_vlq_length(blob, sentinel_pos + 1) else {
                continue;
            };
            let byte_len = if kind == b'M' {
                length as usize
            } else {
                (length as usize) * 2
            };
            let Some(payload_end) = payload_start.checked_add(byte_len) else {
                continue;
            };
            if payload_end > blob.len() {
                continue;
            }
            let payload = &blob[payload_start..payload_end];
            let value = if kind == b'M' {
                String::from_utf8_lossy(payload).into_owned()
            } else {
                decode_utf16le(payload)
            };
            if !value.is_empty() {
                return Some(value);
            }
            fallback.get_or_insert(value);
        }
    }

    fallback
}

/// Scans `blob` for every `'M'`-tagged entry (a byte `'M'` followed by a
/// VLQ length and that many UTF-8 bytes) and returns the decoded strings in
/// the order found.
fn scan_m_entries(blob: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < blob.len() {
        if blob[pos] == b'M' {
            if let Some((length, payload_start)) = read_vlq_length(blob, pos + 1) {
                let payload_end = payload_start.saturating_add(length as usize);
                if payload_end <= blob.len() {
                    if let Ok(s) = std::str::from_utf8(&blob[payload_start..payload_end]) {
                        if !s.is_empty() {
                            out.push(s.to_string());
                        }
                    }
                }
            }
        }
        pos += 1;
    }
    out
}

/// Reads an Exchange VLQ length at `pos`: a little-endian base-128
/// accumulator, each byte's high bit signaling "more bytes follow". Caps
/// the shift at 32 bits so a corrupt stream can't spin forever.
fn read_vlq_length(blob: &[u8], mut pos: usize) -> Option<(u32, usize)> {
    let mut result: u32 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *blob.get(pos)?;
        pos += 1;
        result |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 32 {
            return None;
        }
    }
    Some((result, pos))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn find_all_subslice(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut out = Vec::new();
    let mut start = 0;
    while let Some(rel) = find_subslice(&haystack[start..], needle) {
        out.push(start + rel);
        start += rel + 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(len: u32) -> Vec<u8> {
        let mut out = Vec::new();
        let mut value = len;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if value == 0 {
                break;
            }
        }
        out
    }

    #[test]
    fn test_ascii_sender_and_subject() {
        let mut blob = Vec::new();
        blob.extend_from_slice(b"/o=ORG/ou=X/cn=Recipients/cn=8f3e-JOHN DOE");
        blob.extend_from_slice(b"JOHN DOE");
        blob.push(b'M');
        let subject = b"Hi all";
        blob.extend(vlq(subject.len() as u32));
        blob.extend_from_slice(subject);

        let fields = parse_property_blob(&blob);
        assert_eq!(fields.sender_name, "John Doe");
        assert_eq!(fields.subject, "Hi all");
    }

    #[test]
    fn test_utf16_subject() {
        let mut blob = Vec::new();
        blob.extend_from_slice("/o=ORG/cn=Recipients/cn=1-МАША ИВАНОВА".as_bytes());
        blob.extend_from_slice("МАША ИВАНОВА".as_bytes());
        blob.push(b'I');
        blob.extend(vlq(4));
        blob.extend_from_slice(&crate::util::codec::encode_utf16le("\u{041f}\u{0440}\u{0438}\u{0432}"));

        let fields = parse_property_blob(&blob);
        assert_eq!(fields.subject, "\u{041f}\u{0440}\u{0438}\u{0432}");
    }

    #[test]
    fn test_no_sentinel_yields_empty_strings() {
        let fields = parse_property_blob(b"random noise with no markers");
        assert_eq!(fields, PropertyBlobFields::default());
    }

    #[test]
    fn test_recipient_list_basic() {
        let mut blob = Vec::new();
        blob.extend_from_slice(b"ProP");
        blob.extend_from_slice(b"JANE SMITH");
        blob.push(b'M');
        blob.extend(vlq(10));
        blob.extend_from_slice(b"JANE SMITH");
        blob.extend_from_slice(b"EXM");
        blob.push(b'M');
        let email = b"jane@example.test";
        blob.extend(vlq(email.len() as u32));
        blob.extend_from_slice(email);

        let recipients = parse_recipient_list(&blob);
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].0, "JANE SMITH");
        assert_eq!(recipients[0].1, "jane@example.test");
    }

    #[test]
    fn test_message_id_extraction() {
        let mut blob = Vec::new();
        blob.extend_from_slice(b"cn=1-ALICE");
        blob.extend_from_slice(b"ALICE");
        blob.push(b'M');
        let msg_id = b"<abc123@mail.example.test>";
        blob.extend(vlq(msg_id.len() as u32));
        blob.extend_from_slice(msg_id);

        let fields = parse_property_blob(&blob);
        assert_eq!(fields.message_id, "<abc123@mail.example.test>");
    }
}
