//! [Folders](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/1d26ec25-5c5a-4abd-988b-3e4fd6e47f0e)
//!
//! A folder is a Property Context (display name, content counts) plus
//! three Table Contexts: Hierarchy (subfolders), Contents (messages), and
//! an always-empty Associated Contents (FAI items, not modeled here — see
//! `SPEC_FULL.md`'s Non-goals).

use crate::edb::entity::Folder;
use crate::eml::tags;
use crate::ltp::prop_context::PropertyContext;
use crate::ltp::table_context::{ColumnDescriptor, TableContext};
use crate::messaging::{split_tag, MessagingResult};
use crate::util::codec::encode_utf16le;

pub const PR_CONTENT_COUNT: u32 = 0x3602_0003;
pub const PR_SUBFOLDERS: u32 = 0x360A_000B;

pub fn build_folder_properties(folder: &Folder) -> MessagingResult<PropertyContext> {
    let mut pc = PropertyContext::new();

    let (id, ty) = split_tag(tags::PR_DISPLAY_NAME_W);
    pc.set_property(id, ty, &encode_utf16le(&folder.display_name))?;

    let (id, ty) = split_tag(PR_CONTENT_COUNT);
    pc.set_property(id, ty, &(folder.message_count as i32).to_le_bytes())?;

    Ok(pc)
}

pub fn hierarchy_table_columns() -> Vec<ColumnDescriptor> {
    let (prop_id, prop_type) = split_tag(tags::PR_DISPLAY_NAME_W);
    vec![ColumnDescriptor { prop_id, prop_type }]
}

pub fn contents_table_columns() -> Vec<ColumnDescriptor> {
    let tags_list = [
        tags::PR_SUBJECT_W,
        tags::PR_SENDER_NAME_W,
        tags::PR_MESSAGE_DELIVERY_TIME,
        tags::PR_MESSAGE_CLASS_W,
    ];
    tags_list
        .into_iter()
        .map(|tag| {
            let (prop_id, prop_type) = split_tag(tag);
            ColumnDescriptor { prop_id, prop_type }
        })
        .collect()
}
