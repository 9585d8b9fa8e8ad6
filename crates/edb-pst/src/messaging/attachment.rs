//! [Attachments](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/f48f7efe-6ff0-4e1a-92fe-a2cd2f93ac26)
//!
//! An attachment's own Property Context: filename, MIME type, and the
//! binary content itself (routed through the PC's heap the same way any
//! other `PtypBinary` property would be, per `prop_context.rs`'s
//! [`crate::ltp::prop_context::MAX_INLINE_HEAP_ITEM`] cap).

use crate::edb::entity::Attachment;
use crate::eml::tags;
use crate::ltp::prop_context::PropertyContext;
use crate::messaging::{split_tag, MessagingResult};
use crate::util::codec::encode_utf16le;

pub fn build_attachment_properties(
    attachment: &Attachment,
    data: &[u8],
) -> MessagingResult<PropertyContext> {
    let mut pc = PropertyContext::new();

    let (id, ty) = split_tag(tags::PR_ATTACH_LONG_FILENAME_W);
    pc.set_property(id, ty, &encode_utf16le(&attachment.filename))?;

    if let Some(content_type) = &attachment.content_type {
        let (id, ty) = split_tag(tags::PR_ATTACH_MIME_TAG_W);
        pc.set_property(id, ty, &encode_utf16le(content_type))?;
    }

    if data.len() <= crate::ltp::prop_context::MAX_INLINE_HEAP_ITEM {
        let (id, ty) = split_tag(tags::PR_ATTACH_DATA_BIN);
        pc.set_property(id, ty, data)?;
    }

    Ok(pc)
}
