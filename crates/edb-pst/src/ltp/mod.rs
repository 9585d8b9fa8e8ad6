//! Lists, Tables, and Properties (LTP) layer (C8): Heap-on-Node (HN),
//! BTree-on-Heap (BTH), Property Context (PC), and Table Context (TC).
//! Unicode PST only, concrete (non-generic) types throughout, mirroring
//! the NDB layer's scoping decision; see `DESIGN.md`.

pub mod heap;
pub mod prop_context;
pub mod prop_type;
pub mod table_context;
pub mod writer;

use thiserror::Error;

use crate::ndb::node_id::NodeIdType;

#[derive(Debug, Error)]
pub enum LtpError {
    #[error("invalid heap index {0}")]
    InvalidHeapIndex(u16),
    #[error("invalid heap node type signature 0x{0:02X}")]
    InvalidHeapNodeTypeSignature(u8),
    #[error("invalid heap fill level {0}")]
    InvalidHeapFillLevel(u8),
    #[error("invalid node type for heap operation: {0:?}")]
    InvalidNodeType(NodeIdType),
    #[error("invalid property type {0:#06X}")]
    InvalidPropertyType(u16),
    #[error("invalid BTH key size {0}")]
    InvalidBthKeySize(u8),
    #[error("invalid BTH entry size {0}")]
    InvalidBthEntrySize(u8),
    #[error("invalid BTH levels {0}")]
    InvalidBthLevels(u8),
    #[error("property not found: 0x{0:08X}")]
    PropertyNotFound(u32),
    #[error("table context row index {0} out of range")]
    RowIndexOutOfRange(u32),
    #[error("table context column not found: 0x{0:08X}")]
    ColumnNotFound(u32),
    #[error("long value (> 8 bytes) missing its heap-id indirection")]
    LongValueMissing,
    #[error("ndb error: {0}")]
    Ndb(#[from] crate::ndb::NdbError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type LtpResult<T> = Result<T, LtpError>;

impl From<LtpError> for std::io::Error {
    fn from(err: LtpError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}
