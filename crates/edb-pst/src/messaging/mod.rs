//! Messaging layer (C9): the Store object, the Name-to-ID Map, Folders,
//! and Messages — the object model built on top of `ndb`/`ltp`.

pub mod attachment;
pub mod calendar;
pub mod contact;
pub mod folder;
pub mod message;
pub mod named_prop;
pub mod store;
pub mod writer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("folder {0:?} references unknown parent")]
    UnknownParentFolder(Vec<u8>),
    #[error("named property id space exhausted")]
    NamedPropertyIdSpaceExhausted,
    #[error("ndb error: {0}")]
    Ndb(#[from] crate::ndb::NdbError),
    #[error("ltp error: {0}")]
    Ltp(#[from] crate::ltp::LtpError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("attachment fetch failed: {0}")]
    AttachmentFetch(#[from] crate::edb::entity::EntityError),
}

pub type MessagingResult<T> = Result<T, MessagingError>;

/// Splits a 32-bit MAPI property tag (`propID << 16 | propType`) into its
/// id and [`crate::ltp::prop_type::PropertyType`] halves.
pub fn split_tag(tag: u32) -> (u16, crate::ltp::prop_type::PropertyType) {
    let prop_id = (tag >> 16) as u16;
    let prop_type_raw = (tag & 0xFFFF) as u16;
    let prop_type = crate::ltp::prop_type::PropertyType::try_from(prop_type_raw)
        .unwrap_or(crate::ltp::prop_type::PropertyType::Null);
    (prop_id, prop_type)
}
