//! PST assembly (C9/C-synthesis): turns the EDB entity graph (`Mailbox`,
//! `Folder`, `Entity`) into a complete Unicode PST byte stream, wiring
//! every [`crate::ltp::prop_context::PropertyContext`]/
//! [`crate::ltp::table_context::TableContext`] this module builds through
//! the `ndb` writer's node/block allocator.

use std::collections::HashMap;

use crate::edb::entity::{Entity, Folder, Mailbox};
use crate::edb::source::EseSource;
use crate::ltp::table_context::TableContext;
use crate::ltp::writer::{write_property_context, write_table_context};
use crate::ndb::node_id::{NodeId, NodeIdType, NID_MESSAGE_STORE, NID_NAME_TO_ID_MAP, NID_ROOT_FOLDER};
use crate::ndb::writer::PstWriter;

use super::attachment::build_attachment_properties;
use super::calendar::build_calendar_properties;
use super::contact::build_contact_properties;
use super::folder::{build_folder_properties, contents_table_columns, hierarchy_table_columns};
use super::message::{attachments_table_columns, build_message_properties, build_recipients_table};
use super::named_prop::{NamedPropertyMap, PR_NAME_TO_ID_MAP_BLOB};
use super::store::build_store_properties;
use super::MessagingResult;
use crate::ltp::prop_type::PropertyType;

/// One folder's message contents, keyed by the EDB-native 26-byte folder
/// id `Folder`/`EmailMessage` carries.
pub struct FolderContents<'a> {
    pub folder: &'a Folder,
    pub entities: Vec<&'a Entity>,
}

/// Assembles a complete PST for one mailbox. `folders` must include the
/// root folder (`parent_id == [0; 26]`); every other folder's `parent_id`
/// must reference another entry in `folders`. Attachments backed by a
/// long-value indirection (`AttachmentData::Lazy`) are materialized through
/// `source`; pass `None` only when every attachment is already `Inline`.
pub fn assemble_pst(
    mailbox: &Mailbox,
    folders: &[FolderContents],
    source: Option<&dyn EseSource>,
) -> MessagingResult<Vec<u8>> {
    let mut writer = PstWriter::new();
    let mut named_props = NamedPropertyMap::new();

    let store_pc = build_store_properties(mailbox)?;
    write_property_context(&mut writer, NID_MESSAGE_STORE, NID_MESSAGE_STORE, store_pc)?;

    let mut folder_nids: HashMap<[u8; 26], NodeId> = HashMap::new();
    for entry in folders {
        let nid = if entry.folder.parent_id == [0u8; 26] {
            NID_ROOT_FOLDER
        } else {
            let index = writer.allocate_shared_index();
            NodeId::new(NodeIdType::NormalFolder, index)?
        };
        folder_nids.insert(entry.folder.folder_id, nid);
    }

    for entry in folders {
        let folder_nid = folder_nids[&entry.folder.folder_id];
        let parent_nid = if entry.folder.parent_id == [0u8; 26] {
            NID_ROOT_FOLDER
        } else {
            *folder_nids
                .get(&entry.folder.parent_id)
                .ok_or_else(|| super::MessagingError::UnknownParentFolder(entry.folder.parent_id.to_vec()))?
        };

        let folder_pc = build_folder_properties(entry.folder)?;
        write_property_context(&mut writer, folder_nid, parent_nid, folder_pc)?;

        let hierarchy_nid = NodeId::new(NodeIdType::HierarchyTable, folder_nid.index())?;
        let mut hierarchy_tc = TableContext::new(hierarchy_table_columns());
        for other in folders {
            if other.folder.parent_id == entry.folder.folder_id {
                let child_name = crate::util::codec::encode_utf16le(&other.folder.display_name);
                hierarchy_tc.add_row(vec![Some(child_name.as_slice())])?;
            }
        }
        write_table_context(&mut writer, hierarchy_nid, folder_nid, hierarchy_tc)?;

        let contents_nid = NodeId::new(NodeIdType::ContentsTable, folder_nid.index())?;
        let mut contents_tc = TableContext::new(contents_table_columns());

        let assoc_nid = NodeId::new(NodeIdType::AssociatedContentsTable, folder_nid.index())?;
        let assoc_tc = TableContext::new(contents_table_columns());
        write_table_context(&mut writer, assoc_nid, folder_nid, assoc_tc)?;

        for entity in &entry.entities {
            let message_index = writer.allocate_shared_index();
            let message_nid = NodeId::new(NodeIdType::NormalMessage, message_index)?;

            // Every entity kind gets the same four Contents-Table columns
            // (subject, sender, delivery time, message class) regardless of
            // whether it's an email, a calendar event, or a contact, so a
            // folder's Contents Table renders uniformly in Outlook.
            let (subject, sender_name, delivery_time, message_class, message_pc, recipient_rows) =
                match entity {
                    Entity::Email(message) => {
                        let mut recipient_rows = Vec::new();
                        for r in &message.recipients_to {
                            recipient_rows.push((r.clone(), crate::eml::RECIPIENT_TYPE_TO));
                        }
                        for r in &message.recipients_cc {
                            recipient_rows.push((r.clone(), crate::eml::RECIPIENT_TYPE_CC));
                        }
                        for r in &message.recipients_bcc {
                            recipient_rows.push((r.clone(), crate::eml::RECIPIENT_TYPE_BCC));
                        }
                        (
                            message.subject.clone(),
                            message.sender_name.clone(),
                            message.date_received.map(crate::util::filetime::to_filetime).unwrap_or(0),
                            message.message_class.clone(),
                            build_message_properties(message)?,
                            recipient_rows,
                        )
                    }
                    Entity::Calendar(event) => {
                        let recipient_rows = event
                            .attendees
                            .iter()
                            .map(|a| {
                                (
                                    crate::edb::entity::RecipientRef {
                                        name: a.name.clone(),
                                        email: a.email.clone(),
                                    },
                                    crate::eml::RECIPIENT_TYPE_TO,
                                )
                            })
                            .collect();
                        (
                            event.subject.clone(),
                            event.organizer_name.clone(),
                            event.start.map(crate::util::filetime::to_filetime).unwrap_or(0),
                            "IPM.Appointment".to_string(),
                            build_calendar_properties(event, &mut named_props)?,
                            recipient_rows,
                        )
                    }
                    Entity::Contact(contact) => (
                        contact.display_name.clone(),
                        contact.display_name.clone(),
                        0,
                        "IPM.Contact".to_string(),
                        build_contact_properties(contact)?,
                        Vec::new(),
                    ),
                };

            let subject_bytes = crate::util::codec::encode_utf16le(&subject);
            let sender_bytes = crate::util::codec::encode_utf16le(&sender_name);
            let delivery_time_bytes = delivery_time.to_le_bytes();
            let message_class_bytes = crate::util::codec::encode_utf16le(&message_class);
            contents_tc.add_row(vec![
                Some(subject_bytes.as_slice()),
                Some(sender_bytes.as_slice()),
                Some(&delivery_time_bytes),
                Some(message_class_bytes.as_slice()),
            ])?;

            write_property_context(&mut writer, message_nid, folder_nid, message_pc)?;

            let recipients_nid = NodeId::new(NodeIdType::RecipientTable, message_index)?;
            let recipients_tc = build_recipients_table(&recipient_rows)?;
            write_table_context(&mut writer, recipients_nid, message_nid, recipients_tc)?;

            let attachments_nid = NodeId::new(NodeIdType::AttachmentTable, message_index)?;
            let mut attachments_tc = TableContext::new(attachments_table_columns());
            if let Entity::Email(message) = entity {
                for attachment in &message.attachments {
                    let filename = crate::util::codec::encode_utf16le(&attachment.filename);
                    let mime = attachment
                        .content_type
                        .as_deref()
                        .map(crate::util::codec::encode_utf16le)
                        .unwrap_or_default();
                    attachments_tc.add_row(vec![Some(filename.as_slice()), Some(mime.as_slice())])?;

                    let attachment_index = writer.allocate_shared_index();
                    let attachment_nid = NodeId::new(NodeIdType::Attachment, attachment_index)?;
                    let data = match &attachment.data {
                        crate::edb::entity::AttachmentData::Inline(bytes) => bytes.clone(),
                        crate::edb::entity::AttachmentData::Lazy { .. } => {
                            let source = source
                                .ok_or(crate::edb::entity::EntityError::NoSourceForLazyAttachment)?;
                            attachment.fetch_data(source)?
                        }
                    };
                    let attachment_pc = build_attachment_properties(attachment, &data)?;
                    write_property_context(&mut writer, attachment_nid, message_nid, attachment_pc)?;
                }
            }
            write_table_context(&mut writer, attachments_nid, message_nid, attachments_tc)?;
        }

        write_table_context(&mut writer, contents_nid, folder_nid, contents_tc)?;
    }

    let mut name_to_id_pc = crate::ltp::prop_context::PropertyContext::new();
    name_to_id_pc.set_property(PR_NAME_TO_ID_MAP_BLOB, PropertyType::Binary, &named_props.encode())?;
    write_property_context(&mut writer, NID_NAME_TO_ID_MAP, NID_NAME_TO_ID_MAP, name_to_id_pc)?;

    Ok(writer.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edb::entity::{EmailMessage, Importance};

    #[test]
    fn test_assemble_minimal_pst() {
        let mailbox = Mailbox {
            mailbox_number: 1,
            guid: [1u8; 16],
            owner_display_name: "Jane Doe".to_string(),
            message_count: 1,
            last_logon: None,
        };

        let root = Folder {
            folder_id: [1u8; 26],
            parent_id: [0u8; 26],
            display_name: "Root".to_string(),
            special_number: None,
            message_count: 1,
        };
        let inbox = Folder {
            folder_id: [2u8; 26],
            parent_id: [1u8; 26],
            display_name: "Inbox".to_string(),
            special_number: Some(1),
            message_count: 1,
        };

        let message = Entity::Email(EmailMessage {
            record_index: 1,
            folder_id: [2u8; 26],
            subject: "Hello".to_string(),
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
            body_text: "Hi there".to_string(),
            attachments: vec![],
            message_class: "IPM.Note".to_string(),
        });

        let folders = vec![
            FolderContents {
                folder: &root,
                entities: vec![],
            },
            FolderContents {
                folder: &inbox,
                entities: vec![&message],
            },
        ];

        let bytes = assemble_pst(&mailbox, &folders, None).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn test_lazy_attachment_resolves_through_source() {
        use crate::edb::entity::{Attachment, AttachmentData};
        use crate::edb::source::MockEseSource;

        let mailbox = Mailbox {
            mailbox_number: 1,
            guid: [1u8; 16],
            owner_display_name: "Jane Doe".to_string(),
            message_count: 1,
            last_logon: None,
        };
        let root = Folder {
            folder_id: [1u8; 26],
            parent_id: [0u8; 26],
            display_name: "Root".to_string(),
            special_number: Some(1),
            message_count: 1,
        };
        let message = Entity::Email(EmailMessage {
            record_index: 1,
            folder_id: [1u8; 26],
            subject: "Hello".to_string(),
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
            body_text: "Hi there".to_string(),
            attachments: vec![Attachment {
                filename: "a.txt".to_string(),
                content_type: Some("text/plain".to_string()),
                size: 3,
                data: AttachmentData::Lazy { lv_id: 9 },
            }],
            message_class: "IPM.Note".to_string(),
        });
        let folders = vec![FolderContents {
            folder: &root,
            entities: vec![&message],
        }];

        let no_source_err = assemble_pst(&mailbox, &folders, None).unwrap_err();
        assert!(matches!(
            no_source_err,
            super::MessagingError::AttachmentFetch(
                crate::edb::entity::EntityError::NoSourceForLazyAttachment
            )
        ));

        let mut source = MockEseSource::new();
        source.add_long_value(9, b"abc".to_vec());
        let bytes = assemble_pst(&mailbox, &folders, Some(&source)).unwrap();
        assert!(!bytes.is_empty());
    }
}
