//! [Message Store](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/36bdb573-78c8-4632-a2ba-4ebd8dbde0be)
//!
//! The store's Property Context, rooted at the well-known
//! `NID_MESSAGE_STORE` node: display name, record key, and the message
//! count rolled up from every folder synthesized into the PST.

use crate::edb::entity::Mailbox;
use crate::eml::tags;
use crate::ltp::prop_context::PropertyContext;
use crate::messaging::{split_tag, MessagingResult};
use crate::util::codec::encode_utf16le;

pub fn build_store_properties(mailbox: &Mailbox) -> MessagingResult<PropertyContext> {
    let mut pc = PropertyContext::new();

    let (id, ty) = split_tag(tags::PR_DISPLAY_NAME_W);
    pc.set_property(id, ty, &encode_utf16le(&mailbox.owner_display_name))?;

    let (id, ty) = split_tag(tags::PR_RECORD_KEY);
    pc.set_property(id, ty, &mailbox.guid)?;

    Ok(pc)
}
