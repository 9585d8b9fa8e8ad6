//! Exchange EDB extraction: the ESE source capability (C3), the
//! PropertyBlob/RecipientList parser (C4), and the typed entity assembler
//! (C5).

pub mod entity;
pub mod propblob;
pub mod source;
