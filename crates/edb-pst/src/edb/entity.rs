//! EDB entity assembler: turns `Message_XXX`/`Folder_XXX`/`Attachment_XXX`/
//! `Mailbox` rows into typed aggregates (`EmailMessage`, `CalendarEvent`,
//! `Contact`) the rest of the crate works with.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::edb::propblob::{parse_property_blob, parse_recipient_list};
use crate::edb::source::{EseSource, EseSourceError};
use crate::lzxpress::{decompress, LzxpressError};
use crate::util::codec::decode_legacy_body;
use crate::util::filetime::from_filetime;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error(transparent)]
    Source(#[from] EseSourceError),
    #[error("column {0} decompression failed: {1}")]
    Decompression(String, LzxpressError),
    #[error("attachment data is a long-value indirection but no ESE source was supplied")]
    NoSourceForLazyAttachment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Importance {
    Low,
    #[default]
    Normal,
    High,
}

impl Importance {
    pub fn from_mapi(value: u32) -> Self {
        match value {
            0 => Importance::Low,
            2 => Importance::High,
            _ => Importance::Normal,
        }
    }

    pub fn to_mapi(self) -> u32 {
        match self {
            Importance::Low => 0,
            Importance::Normal => 1,
            Importance::High => 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientRef {
    pub name: String,
    pub email: String,
}

/// Attachment payload. Large attachment bodies live in the ESE long-value
/// store rather than inline in the row, so `data` may need a fetch callback
/// to resolve it on demand.
#[derive(Debug, Clone)]
pub enum AttachmentData {
    Inline(Vec<u8>),
    Lazy { lv_id: u32 },
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub data: AttachmentData,
}

impl Attachment {
    /// Materializes `data`, resolving a long-value indirection through
    /// `source` on first access. Idempotent: repeated calls re-fetch but do
    /// not mutate `self`, so retrying a cancelled fetch is always safe.
    pub fn fetch_data(&self, source: &dyn EseSource) -> Result<Vec<u8>, EntityError> {
        match &self.data {
            AttachmentData::Inline(bytes) => Ok(bytes.clone()),
            AttachmentData::Lazy { lv_id } => {
                Ok(source.resolve_long_value(*lv_id)?)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmailMessage {
    pub record_index: u64,
    pub folder_id: [u8; 26],
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
    pub recipients_to: Vec<RecipientRef>,
    pub recipients_cc: Vec<RecipientRef>,
    pub recipients_bcc: Vec<RecipientRef>,
    pub date_sent: Option<DateTime<Utc>>,
    pub date_received: Option<DateTime<Utc>>,
    pub message_id: String,
    pub importance: Importance,
    pub is_read: bool,
    pub is_hidden: bool,
    pub body_html: String,
    pub body_text: String,
    pub attachments: Vec<Attachment>,
    pub message_class: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attendee {
    pub name: String,
    pub email: String,
    pub status: String,
}

#[derive(Debug, Clone, Default)]
pub struct CalendarEvent {
    pub subject: String,
    pub organizer_name: String,
    pub organizer_email: String,
    pub attendees: Vec<Attendee>,
    pub location: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub body: String,
    pub uid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Phone {
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct Contact {
    pub display_name: String,
    pub emails: Vec<String>,
    pub phones: Vec<Phone>,
    pub company: String,
    pub title: String,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Entity {
    Email(EmailMessage),
    Calendar(CalendarEvent),
    Contact(Contact),
}

/// Dispatch table from MessageClass prefix to entity kind.
pub fn classify_message_class(message_class: &str) -> EntityKind {
    if message_class.starts_with("IPM.Note") {
        EntityKind::Email
    } else if message_class.starts_with("IPM.Appointment")
        || message_class.starts_with("IPM.Schedule.Meeting")
    {
        EntityKind::Calendar
    } else if message_class.starts_with("IPM.Contact") {
        EntityKind::Contact
    } else {
        // IPM.Task, IPM.Activity, and anything else: Email with the class
        // preserved.
        EntityKind::Email
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Email,
    Calendar,
    Contact,
}

#[derive(Debug, Clone, Default)]
pub struct Folder {
    pub folder_id: [u8; 26],
    pub parent_id: [u8; 26],
    pub display_name: String,
    pub special_number: Option<u32>,
    pub message_count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    pub mailbox_number: i64,
    pub guid: [u8; 16],
    pub owner_display_name: String,
    pub message_count: u64,
    pub last_logon: Option<DateTime<Utc>>,
}

/// Reads a column, transparently resolving a long-value indirection.
fn read_column(
    source: &dyn EseSource,
    table: &str,
    row: usize,
    column: &str,
) -> Result<Vec<u8>, EntityError> {
    let value = source.get_bytes(table, row, column)?;
    if value.is_long_value {
        let lv_id = u32::from_le_bytes(
            value.bytes[..4.min(value.bytes.len())]
                .try_into()
                .unwrap_or([0; 4]),
        );
        Ok(source.resolve_long_value(lv_id)?)
    } else {
        Ok(value.bytes)
    }
}

fn read_column_opt(
    source: &dyn EseSource,
    table: &str,
    row: usize,
    column: &str,
) -> Option<Vec<u8>> {
    read_column(source, table, row, column).ok()
}

fn decompress_column(name: &str, bytes: &[u8]) -> Result<Vec<u8>, EntityError> {
    decompress(bytes).map_err(|e| EntityError::Decompression(name.to_string(), e))
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    let n = bytes.len().min(4);
    buf[..n].copy_from_slice(&bytes[..n]);
    u32::from_le_bytes(buf)
}

fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(buf)
}

/// Splits a comma/semicolon-tokenized DisplayTo/Cc/Bcc column into names,
/// and joins each against the RecipientList name->email map. Unmatched
/// names keep `email = ""`.
fn join_display_names(display: &str, resolved: &[(String, String)]) -> Vec<RecipientRef> {
    display
        .split([',', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|name| {
            let email = resolved
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, e)| e.clone())
                .unwrap_or_default();
            RecipientRef {
                name: name.to_string(),
                email,
            }
        })
        .collect()
}

/// Assembles the `Entity` for a `Message_XXX` row in its fixed column
/// order.
pub fn assemble_message(
    source: &dyn EseSource,
    table: &str,
    row: usize,
    folder_id: [u8; 26],
) -> Result<Entity, EntityError> {
    let message_class_raw = read_column(source, table, row, "MessageClass")?;
    let message_class = String::from_utf8_lossy(&message_class_raw).into_owned();

    let property_blob_raw = read_column_opt(source, table, row, "PropertyBlob").unwrap_or_default();
    let property_blob = if property_blob_raw.is_empty() {
        Vec::new()
    } else {
        decompress_column("PropertyBlob", &property_blob_raw).unwrap_or_default()
    };
    let fields = parse_property_blob(&property_blob);

    let recipient_list_raw =
        read_column_opt(source, table, row, "RecipientList").unwrap_or_default();
    let recipient_list = if recipient_list_raw.is_empty() {
        Vec::new()
    } else {
        decompress_column("RecipientList", &recipient_list_raw)
            .map(|b| parse_recipient_list(&b))
            .unwrap_or_default()
    };

    let display_to =
        String::from_utf8_lossy(&read_column_opt(source, table, row, "DisplayTo").unwrap_or_default())
            .into_owned();
    let display_cc =
        String::from_utf8_lossy(&read_column_opt(source, table, row, "DisplayCc").unwrap_or_default())
            .into_owned();
    let display_bcc =
        String::from_utf8_lossy(&read_column_opt(source, table, row, "DisplayBcc").unwrap_or_default())
            .into_owned();

    let date_sent = read_column_opt(source, table, row, "ClientSubmitTime")
        .map(|b| from_filetime(read_u64_le(&b)));
    let date_received = read_column_opt(source, table, row, "MessageDeliveryTime")
        .map(|b| from_filetime(read_u64_le(&b)));

    let flags = read_column_opt(source, table, row, "MessageFlags")
        .map(|b| read_u32_le(&b))
        .unwrap_or(0);
    let is_read = flags & 0x01 != 0;
    let is_hidden = flags & 0x02 != 0;
    let importance = Importance::from_mapi(
        read_column_opt(source, table, row, "Importance")
            .map(|b| read_u32_le(&b))
            .unwrap_or(1),
    );

    let (body_text, body_html) = read_body(source, table, row);

    let attachments = read_attachments(source, table, row);

    let record_index = read_column_opt(source, table, row, "MessageDocumentId")
        .map(|b| u64::from(read_u32_le(&b)))
        .unwrap_or(row as u64);

    match classify_message_class(&message_class) {
        EntityKind::Calendar => Ok(Entity::Calendar(CalendarEvent {
            subject: fields.subject,
            organizer_name: fields.sender_name,
            organizer_email: fields.sender_email,
            attendees: recipient_list
                .into_iter()
                .map(|(name, email)| Attendee {
                    name,
                    email,
                    status: String::new(),
                })
                .collect(),
            location: String::new(),
            start: date_sent,
            end: date_received,
            all_day: false,
            body: body_text,
            uid: fields.message_id,
        })),
        EntityKind::Contact => Ok(Entity::Contact(Contact {
            display_name: fields.sender_name,
            emails: if fields.sender_email.is_empty() {
                Vec::new()
            } else {
                vec![fields.sender_email]
            },
            phones: Vec::new(),
            company: String::new(),
            title: String::new(),
            addresses: Vec::new(),
        })),
        EntityKind::Email => Ok(Entity::Email(EmailMessage {
            record_index,
            folder_id,
            subject: fields.subject,
            sender_name: fields.sender_name,
            sender_email: fields.sender_email,
            recipients_to: join_display_names(&display_to, &recipient_list),
            recipients_cc: join_display_names(&display_cc, &recipient_list),
            recipients_bcc: join_display_names(&display_bcc, &recipient_list),
            date_sent,
            date_received,
            message_id: fields.message_id,
            importance,
            is_read,
            is_hidden,
            body_html,
            body_text,
            attachments,
            message_class,
        })),
    }
}

/// Decodes `NativeBody`, a 7-byte-headered LZXPRESS column (`0x18`, a
/// 2-byte uncompressed size, then payload).
fn read_body(source: &dyn EseSource, table: &str, row: usize) -> (String, String) {
    let Some(raw) = read_column_opt(source, table, row, "NativeBody") else {
        return (String::new(), String::new());
    };
    let decompressed = decompress(&raw).unwrap_or_default();
    let decoded = decode_legacy_body(&decompressed);
    if decoded.text.trim_start().starts_with('<') {
        (String::new(), decoded.text)
    } else {
        (decoded.text, String::new())
    }
}

/// Resolves attachments lazily via `SubobjectsBlob`'s `0x21 + Inid` markers,
/// each Inid joined against `Attachment_XXX`.
fn read_attachments(source: &dyn EseSource, table: &str, row: usize) -> Vec<Attachment> {
    let Some(blob) = read_column_opt(source, table, row, "SubobjectsBlob") else {
        return Vec::new();
    };
    let attach_table = table.replacen("Message_", "Attachment_", 1);
    let mut out = Vec::new();
    let mut pos = 0;
    while pos + 1 < blob.len() {
        if blob[pos] == 0x21 {
            let inid = u32::from_le_bytes([
                blob[pos + 1],
                *blob.get(pos + 2).unwrap_or(&0),
                *blob.get(pos + 3).unwrap_or(&0),
                *blob.get(pos + 4).unwrap_or(&0),
            ]);
            if let Ok(attachment) = assemble_attachment(source, &attach_table, inid as usize) {
                out.push(attachment);
            }
            pos += 5;
        } else {
            pos += 1;
        }
    }
    out
}

fn assemble_attachment(
    source: &dyn EseSource,
    table: &str,
    row: usize,
) -> Result<Attachment, EntityError> {
    let filename =
        String::from_utf8_lossy(&read_column_opt(source, table, row, "Filename").unwrap_or_default())
            .into_owned();
    let content_type = read_column_opt(source, table, row, "ContentType")
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .filter(|s| !s.is_empty());
    let size = read_column_opt(source, table, row, "AttachSize")
        .map(|b| u64::from(read_u32_le(&b)))
        .unwrap_or(0);

    let data_value = source.get_bytes(table, row, "AttachData")?;
    let data = if data_value.is_long_value {
        AttachmentData::Lazy {
            lv_id: read_u32_le(&data_value.bytes),
        }
    } else {
        AttachmentData::Inline(data_value.bytes)
    };

    Ok(Attachment {
        filename,
        content_type,
        size,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edb::source::MockEseSource;
    use std::collections::BTreeMap;

    #[test]
    fn test_classify_message_class() {
        assert_eq!(classify_message_class("IPM.Note"), EntityKind::Email);
        assert_eq!(
            classify_message_class("IPM.Schedule.Meeting.Request"),
            EntityKind::Calendar
        );
        assert_eq!(classify_message_class("IPM.Contact"), EntityKind::Contact);
        assert_eq!(classify_message_class("IPM.Task"), EntityKind::Email);
    }

    #[test]
    fn test_join_display_names_unmatched_keeps_empty_email() {
        let resolved = vec![("Jane Smith".to_string(), "jane@x.test".to_string())];
        let joined = join_display_names("Jane Smith; Bob Jones", &resolved);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].email, "jane@x.test");
        assert_eq!(joined[1].email, "");
    }

    #[test]
    fn test_assemble_message_basic() {
        let mut source = MockEseSource::new();
        let mut row = BTreeMap::new();
        row.insert(
            "MessageClass".to_string(),
            MockEseSource::inline(b"IPM.Note".to_vec()),
        );
        row.insert(
            "PropertyBlob".to_string(),
            MockEseSource::inline({
                let mut v = vec![0x17];
                v.extend_from_slice(b"no sentinel here");
                v
            }),
        );
        row.insert(
            "MessageFlags".to_string(),
            MockEseSource::inline(1u32.to_le_bytes().to_vec()),
        );
        source.add_row("Message_1", row);

        let entity = assemble_message(&source, "Message_1", 0, [0u8; 26]).unwrap();
        match entity {
            Entity::Email(email) => {
                assert!(email.is_read);
                assert_eq!(email.message_class, "IPM.Note");
            }
            _ => panic!("expected Email"),
        }
    }
}
