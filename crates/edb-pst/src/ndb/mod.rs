//! Node Database (NDB) layer (C7): blocks, NBT/BBT B-trees, the Allocation
//! Map, XBLOCK/XXBLOCK, SLBLOCK/SIBLOCK, and the PST header. Collapsed to
//! the Unicode PST variant only; see `DESIGN.md`'s scoping decision.

pub mod block;
pub mod block_id;
pub mod block_ref;
pub mod byte_index;
pub mod header;
pub mod node_id;
pub mod page;
pub mod root;
pub mod subnode;
pub mod verify;
pub mod writer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NdbError {
    #[error("invalid node id type 0x{0:02X}")]
    InvalidNodeIdType(u8),
    #[error("node index {0} out of range")]
    InvalidNodeIndex(u32),
    #[error("block index {0} out of range")]
    InvalidBlockIndex(u64),
    #[error("invalid AMap status byte 0x{0:02X}")]
    InvalidAmapStatus(u8),
    #[error("invalid block size {0}")]
    InvalidBlockSize(u16),
    #[error("block CRC mismatch: computed 0x{0:08X}")]
    InvalidBlockCrc(u32),
    #[error("invalid block trailer id {0}")]
    InvalidBlockTrailerId(u64),
    #[error("mismatched page type repeat byte")]
    MismatchPageTypeRepeat,
    #[error("invalid page type byte 0x{0:02X}")]
    InvalidPageType(u8),
    #[error("page CRC mismatch: computed 0x{0:08X}")]
    InvalidPageCrc(u32),
    #[error("invalid header magic value 0x{0:08X}")]
    InvalidNdbHeaderMagicValue(u32),
    #[error("invalid header client magic value 0x{0:04X}")]
    InvalidNdbHeaderMagicClientValue(u16),
    #[error("invalid header partial CRC")]
    InvalidNdbHeaderPartialCrc,
    #[error("invalid header full CRC")]
    InvalidNdbHeaderFullCrc,
    #[error("invalid header client version {0}")]
    InvalidNdbHeaderClientVersion(u16),
    #[error("invalid header platform byte 0x{0:02X}")]
    InvalidNdbHeaderPlatform(u8),
    #[error("unsupported NDB version {0}")]
    InvalidNdbVersion(u16),
    #[error("unsupported crypt method {0}")]
    InvalidNdbCryptMethod(u8),
    #[error("invalid B-tree page level {0}")]
    InvalidBTreePageLevel(u8),
    #[error("invalid B-tree entry count {0}")]
    InvalidBTreeEntryCount(u16),
    #[error("node B-tree entry references invalid node id")]
    InvalidNodeBTreeEntryNodeId,
    #[error("density list entry invalid")]
    InvalidDensityListEntry,
    #[error("subnode entry references invalid node id")]
    InvalidSubnodeEntryNodeId,
    #[error("allocation map space exhausted")]
    AllocationMapExhausted,
    #[error("pst output size {0} bytes exceeds the 50 GiB ceiling")]
    SpaceExhausted(u64),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NdbResult<T> = Result<T, NdbError>;

impl From<NdbError> for std::io::Error {
    fn from(err: NdbError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}
