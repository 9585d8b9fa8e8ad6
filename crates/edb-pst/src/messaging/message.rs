//! [Messages](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/03a4ab09-a0d9-4524-9d33-bc1415a79fed)
//!
//! A message is a Property Context (subject, sender, body, timestamps)
//! plus Recipients and Attachments Table Contexts. Field order mirrors
//! `edb::entity::assemble_message`'s fixed ordering so an EDB round trip
//! and a PST synthesis agree on which fields are authoritative.

use crate::edb::entity::{EmailMessage, Importance, RecipientRef};
use crate::eml::tags;
use crate::ltp::prop_context::PropertyContext;
use crate::ltp::table_context::{ColumnDescriptor, TableContext};
use crate::messaging::{split_tag, MessagingResult};
use crate::util::codec::encode_utf16le;
use crate::util::filetime::to_filetime;

pub fn build_message_properties(message: &EmailMessage) -> MessagingResult<PropertyContext> {
    let mut pc = PropertyContext::new();

    let (id, ty) = split_tag(tags::PR_SUBJECT_W);
    pc.set_property(id, ty, &encode_utf16le(&message.subject))?;

    let (id, ty) = split_tag(tags::PR_SENDER_NAME_W);
    pc.set_property(id, ty, &encode_utf16le(&message.sender_name))?;

    let (id, ty) = split_tag(tags::PR_SENDER_EMAIL_ADDRESS_W);
    pc.set_property(id, ty, &encode_utf16le(&message.sender_email))?;

    let (id, ty) = split_tag(tags::PR_MESSAGE_CLASS_W);
    pc.set_property(id, ty, &encode_utf16le(&message.message_class))?;

    if let Some(sent) = message.date_sent {
        let (id, ty) = split_tag(tags::PR_CLIENT_SUBMIT_TIME);
        pc.set_property(id, ty, &to_filetime(sent).to_le_bytes())?;
    }
    if let Some(received) = message.date_received {
        let (id, ty) = split_tag(tags::PR_MESSAGE_DELIVERY_TIME);
        pc.set_property(id, ty, &to_filetime(received).to_le_bytes())?;
    }

    let (id, ty) = split_tag(tags::PR_IMPORTANCE);
    pc.set_property(id, ty, &message.importance.to_mapi().to_le_bytes())?;

    let (id, ty) = split_tag(tags::PR_BODY_W);
    pc.set_property(id, ty, &encode_utf16le(&message.body_text))?;

    if !message.body_html.is_empty() {
        let (id, ty) = split_tag(tags::PR_HTML);
        pc.set_property(id, ty, message.body_html.as_bytes())?;
    }

    Ok(pc)
}

pub fn recipients_table_columns() -> Vec<ColumnDescriptor> {
    [tags::PR_DISPLAY_NAME_W, tags::PR_SMTP_ADDRESS_W, tags::PR_RECIPIENT_TYPE]
        .into_iter()
        .map(|tag| {
            let (prop_id, prop_type) = split_tag(tag);
            ColumnDescriptor { prop_id, prop_type }
        })
        .collect()
}

pub fn attachments_table_columns() -> Vec<ColumnDescriptor> {
    [tags::PR_ATTACH_LONG_FILENAME_W, tags::PR_ATTACH_MIME_TAG_W]
        .into_iter()
        .map(|tag| {
            let (prop_id, prop_type) = split_tag(tag);
            ColumnDescriptor { prop_id, prop_type }
        })
        .collect()
}

pub fn build_recipients_table(
    recipients: &[(RecipientRef, i32)],
) -> MessagingResult<TableContext> {
    let mut tc = TableContext::new(recipients_table_columns());
    for (recipient, recipient_type) in recipients {
        let name = encode_utf16le(&recipient.name);
        let email = encode_utf16le(&recipient.email);
        tc.add_row(vec![
            Some(name.as_slice()),
            Some(email.as_slice()),
            Some(&recipient_type.to_le_bytes()),
        ])?;
    }
    Ok(tc)
}

pub fn importance_from_mapi(value: i32) -> Importance {
    Importance::from_mapi(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edb::entity::AttachmentData;

    fn sample_message() -> EmailMessage {
        EmailMessage {
            record_index: 1,
            folder_id: [0u8; 26],
            subject: "Hi".to_string(),
            sender_name: "Alice".to_string(),
            sender_email: "alice@example.com".to_string(),
            recipients_to: vec![],
            recipients_cc: vec![],
            recipients_bcc: vec![],
            date_sent: None,
            date_received: None,
            message_id: "<1@example.com>".to_string(),
            importance: Importance::Normal,
            is_read: true,
            is_hidden: false,
            body_html: String::new(),
            body_text: "Hello there".to_string(),
            attachments: vec![],
            message_class: "IPM.Note".to_string(),
        }
    }

    #[test]
    fn test_build_message_properties_round_trips_subject() {
        let message = sample_message();
        let pc = build_message_properties(&message).unwrap();
        let (id, _) = split_tag(tags::PR_SUBJECT_W);
        let (_, bytes) = pc.get_property(id).unwrap();
        assert_eq!(crate::util::codec::decode_utf16le(&bytes), "Hi");
    }

    #[test]
    fn test_build_recipients_table() {
        let recipients = vec![(
            RecipientRef {
                name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
            },
            1,
        )];
        let tc = build_recipients_table(&recipients).unwrap();
        assert_eq!(tc.row_count(), 1);
    }

    #[test]
    fn test_attachment_data_variant_used_by_callers() {
        let _ = AttachmentData::Inline(vec![1, 2, 3]);
    }
}
