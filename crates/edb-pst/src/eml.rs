//! EML -> MAPI translator: RFC 5322 header and MIME body-part parse,
//! emitting a map keyed by MAPI property tag.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mailparse::{parse_mail, MailHeaderMap, ParsedMail};
use thiserror::Error;

use crate::util::filetime::to_filetime;

pub mod tags {
    pub const PR_SUBJECT_W: u32 = 0x0037_001F;
    pub const PR_BODY_W: u32 = 0x1000_001F;
    pub const PR_HTML: u32 = 0x1013_0102;
    pub const PR_SENDER_NAME_W: u32 = 0x0C1A_001F;
    pub const PR_SENDER_EMAIL_ADDRESS_W: u32 = 0x0C1F_001F;
    pub const PR_SENDER_ADDRTYPE_W: u32 = 0x0C1E_001F;
    pub const PR_CLIENT_SUBMIT_TIME: u32 = 0x0039_0040;
    pub const PR_MESSAGE_DELIVERY_TIME: u32 = 0x0E06_0040;
    pub const PR_IMPORTANCE: u32 = 0x0017_0003;
    pub const PR_MESSAGE_CLASS_W: u32 = 0x001A_001F;
    pub const PR_RECIPIENT_TYPE: u32 = 0x0C15_0003;
    pub const PR_DISPLAY_NAME_W: u32 = 0x3001_001F;
    pub const PR_SMTP_ADDRESS_W: u32 = 0x39FE_001F;
    pub const PR_ATTACH_FILENAME_W: u32 = 0x3704_001F;
    pub const PR_ATTACH_LONG_FILENAME_W: u32 = 0x3707_001F;
    pub const PR_ATTACH_DATA_BIN: u32 = 0x3701_0102;
    pub const PR_ATTACH_MIME_TAG_W: u32 = 0x370E_001F;
    pub const PR_ATTACH_METHOD: u32 = 0x3705_0003;
    pub const PR_RECORD_KEY: u32 = 0x0FF9_0102;
}

/// Recipient types, [MS-OXCMAIL]-style: To/Cc/Bcc.
pub const RECIPIENT_TYPE_TO: i32 = 1;
pub const RECIPIENT_TYPE_CC: i32 = 2;
pub const RECIPIENT_TYPE_BCC: i32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum MapiValue {
    Unicode(String),
    Binary(Vec<u8>),
    Int32(i32),
    Time(u64),
}

pub type MapiPropertySet = BTreeMap<u32, MapiValue>;

#[derive(Debug, Clone, Default)]
pub struct MapiRecipient {
    pub properties: MapiPropertySet,
}

#[derive(Debug, Clone, Default)]
pub struct MapiAttachment {
    pub properties: MapiPropertySet,
}

#[derive(Debug, Clone, Default)]
pub struct MapiMessage {
    pub properties: MapiPropertySet,
    pub recipients: Vec<MapiRecipient>,
    pub attachments: Vec<MapiAttachment>,
}

#[derive(Debug, Error)]
pub enum EmlError {
    #[error("failed to parse RFC 5322 message: {0}")]
    Parse(#[from] mailparse::MailParseError),
}

/// Translates a raw EML byte stream into a [`MapiMessage`].
pub fn parse_eml(raw: &[u8]) -> Result<MapiMessage, EmlError> {
    let mail = parse_mail(raw)?;
    let mut message = MapiMessage::default();

    if let Some(subject) = mail.headers.get_first_value("Subject") {
        message
            .properties
            .insert(tags::PR_SUBJECT_W, MapiValue::Unicode(subject));
    }

    if let Some(from) = mail.headers.get_first_value("From") {
        let (name, email) = split_display_address(&from);
        message
            .properties
            .insert(tags::PR_SENDER_NAME_W, MapiValue::Unicode(name));
        message.properties.insert(
            tags::PR_SENDER_EMAIL_ADDRESS_W,
            MapiValue::Unicode(email),
        );
        message.properties.insert(
            tags::PR_SENDER_ADDRTYPE_W,
            MapiValue::Unicode("SMTP".to_string()),
        );
    }

    for (header, recipient_type) in [
        ("To", RECIPIENT_TYPE_TO),
        ("Cc", RECIPIENT_TYPE_CC),
        ("Bcc", RECIPIENT_TYPE_BCC),
    ] {
        if let Some(value) = mail.headers.get_first_value(header) {
            for address in split_address_list(&value) {
                let (name, email) = split_display_address(&address);
                let mut props = MapiPropertySet::new();
                props.insert(tags::PR_DISPLAY_NAME_W, MapiValue::Unicode(name));
                props.insert(tags::PR_SMTP_ADDRESS_W, MapiValue::Unicode(email));
                props.insert(
                    tags::PR_RECIPIENT_TYPE,
                    MapiValue::Int32(recipient_type),
                );
                message.recipients.push(MapiRecipient { properties: props });
            }
        }
    }

    if let Some(date) = mail.headers.get_first_value("Date") {
        if let Ok(parsed) = DateTime::parse_from_rfc2822(&date) {
            let ticks = to_filetime(parsed.with_timezone(&Utc));
            message
                .properties
                .insert(tags::PR_CLIENT_SUBMIT_TIME, MapiValue::Time(ticks));
            message
                .properties
                .insert(tags::PR_MESSAGE_DELIVERY_TIME, MapiValue::Time(ticks));
        }
    }

    if let Some(importance) = mail.headers.get_first_value("Importance") {
        let value = match importance.to_ascii_lowercase().as_str() {
            "low" => 0,
            "high" => 2,
            _ => 1,
        };
        message
            .properties
            .insert(tags::PR_IMPORTANCE, MapiValue::Int32(value));
    }

    let (plain, html, attachments) = collect_body_parts(&mail);
    if let Some(plain) = plain {
        message
            .properties
            .insert(tags::PR_BODY_W, MapiValue::Unicode(plain));
    }
    if let Some(html) = html {
        message
            .properties
            .insert(tags::PR_HTML, MapiValue::Binary(html.into_bytes()));
    }

    for attachment in attachments {
        let mut props = MapiPropertySet::new();
        props.insert(
            tags::PR_ATTACH_FILENAME_W,
            MapiValue::Unicode(attachment.filename.clone()),
        );
        props.insert(
            tags::PR_ATTACH_LONG_FILENAME_W,
            MapiValue::Unicode(attachment.filename),
        );
        props.insert(tags::PR_ATTACH_DATA_BIN, MapiValue::Binary(attachment.data));
        props.insert(
            tags::PR_ATTACH_MIME_TAG_W,
            MapiValue::Unicode(attachment.content_type),
        );
        props.insert(tags::PR_ATTACH_METHOD, MapiValue::Int32(1));
        message.attachments.push(MapiAttachment { properties: props });
    }

    Ok(message)
}

struct RawAttachment {
    filename: String,
    content_type: String,
    data: Vec<u8>,
}

fn collect_body_parts(mail: &ParsedMail) -> (Option<String>, Option<String>, Vec<RawAttachment>) {
    let mut plain = None;
    let mut html = None;
    let mut attachments = Vec::new();
    collect_body_parts_rec(mail, &mut plain, &mut html, &mut attachments);
    (plain, html, attachments)
}

fn collect_body_parts_rec(
    part: &ParsedMail,
    plain: &mut Option<String>,
    html: &mut Option<String>,
    attachments: &mut Vec<RawAttachment>,
) {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_body_parts_rec(sub, plain, html, attachments);
        }
        return;
    }

    let content_type = part.ctype.mimetype.to_ascii_lowercase();
    let disposition = part
        .headers
        .get_first_value("Content-Disposition")
        .unwrap_or_default();
    let is_attachment = disposition.to_ascii_lowercase().starts_with("attachment")
        || part.ctype.params.get("name").is_some();

    if is_attachment {
        let filename = part
            .ctype
            .params
            .get("name")
            .cloned()
            .or_else(|| part.get_content_disposition().params.get("filename").cloned())
            .unwrap_or_else(|| "attachment.bin".to_string());
        let data = part.get_body_raw().unwrap_or_default();
        attachments.push(RawAttachment {
            filename,
            content_type,
            data,
        });
        return;
    }

    match content_type.as_str() {
        "text/plain" if plain.is_none() => {
            *plain = part.get_body().ok();
        }
        "text/html" if html.is_none() => {
            *html = part.get_body().ok();
        }
        _ => {}
    }
}

fn split_address_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Splits `"Display Name" <addr@example.test>` into `(name, addr)`,
/// tolerating a bare address with no display name.
fn split_display_address(value: &str) -> (String, String) {
    if let (Some(start), Some(end)) = (value.find('<'), value.find('>')) {
        if end > start {
            let name = value[..start].trim().trim_matches('"').to_string();
            let email = value[start + 1..end].trim().to_string();
            return (if name.is_empty() { email.clone() } else { name }, email);
        }
    }
    let email = value.trim().to_string();
    (email.clone(), email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_eml_parse() {
        let raw = b"Subject: Hello\r\nFrom: \"A\" <a@x.test>\r\nTo: b@y.test\r\nDate: Mon, 1 Jan 2024 10:00:00 +0000\r\nContent-Type: text/plain\r\n\r\nworld";
        let message = parse_eml(raw).unwrap();

        assert_eq!(
            message.properties.get(&tags::PR_SUBJECT_W),
            Some(&MapiValue::Unicode("Hello".to_string()))
        );
        assert_eq!(
            message.properties.get(&tags::PR_SENDER_NAME_W),
            Some(&MapiValue::Unicode("A".to_string()))
        );
        assert_eq!(
            message.properties.get(&tags::PR_BODY_W),
            Some(&MapiValue::Unicode("world".to_string()))
        );
        assert_eq!(message.recipients.len(), 1);
        assert_eq!(
            message.recipients[0].properties.get(&tags::PR_SMTP_ADDRESS_W),
            Some(&MapiValue::Unicode("b@y.test".to_string()))
        );
    }

    #[test]
    fn test_split_display_address_bare() {
        assert_eq!(
            split_display_address("plain@x.test"),
            ("plain@x.test".to_string(), "plain@x.test".to_string())
        );
    }

    #[test]
    fn test_importance_header() {
        let raw = b"Subject: S\r\nFrom: a@x.test\r\nTo: b@y.test\r\nImportance: high\r\n\r\nbody";
        let message = parse_eml(raw).unwrap();
        assert_eq!(
            message.properties.get(&tags::PR_IMPORTANCE),
            Some(&MapiValue::Int32(2))
        );
    }
}
