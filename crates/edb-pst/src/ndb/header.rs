//! [Header (Unicode)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/c9876f5a-664b-46a3-9887-ba63f113abf5)
//!
//! Fixed 564-byte layout per [MS-PST] §2.2.2.6: `dwMagic = "!BDN"`,
//! `wVer = 23` (Unicode PST), `bCryptMethod = 0`, NBT/BBT root BIDs,
//! next-BID/next-page counters, and a trailer CRC. Reserved bytes are zero.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read, Write};

use super::block_id::BlockId;
use super::byte_index::ByteIndex;
use super::root::Root;
use super::{NdbError, NdbResult};
use crate::util::crc::compute_crc;

pub const HEADER_SIZE: usize = 564;
pub const HEADER_MAGIC: &[u8; 4] = b"!BDN";
pub const NDB_CLIENT_VERSION: u16 = 23;
pub const NDB_PLATFORM: u8 = 0x01;

const OFFSET_MAGIC: usize = 0;
const OFFSET_IMMEDIATE_FREE_XFREE: usize = 10;
const OFFSET_CLIENT_VERSION: usize = 12;
const OFFSET_PLATFORM_CREATE: usize = 14;
const OFFSET_AMAP_FREE: usize = 176;
const OFFSET_FILE_SIZE: usize = 184;
const OFFSET_NBT_ROOT_BID: usize = 224;
const OFFSET_BBT_ROOT_BID: usize = 240;
const OFFSET_NEXT_BID: usize = 352;
const OFFSET_NEXT_PAGE: usize = 368;
const OFFSET_CRYPT_METHOD: usize = 513;
const OFFSET_TRAILER_CRC: usize = 524;

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum NdbCryptMethod {
    #[default]
    None = 0x00,
}

impl TryFrom<u8> for NdbCryptMethod {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(NdbCryptMethod::None),
            other => Err(NdbError::InvalidNdbCryptMethod(other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Header {
    pub next_page: u64,
    pub next_block: BlockId,
    pub root: Root,
    pub crypt_method: NdbCryptMethod,
    /// Total free bytes tracked across all Allocation Map pages (`cbAMapFree`).
    pub amap_free_bytes: u64,
}

impl Header {
    pub fn new(next_page: u64, next_block: BlockId, root: Root) -> Self {
        Self {
            next_page,
            next_block,
            root,
            crypt_method: NdbCryptMethod::None,
            amap_free_bytes: 0,
        }
    }

    pub fn write(&self, f: &mut dyn Write) -> io::Result<()> {
        let mut buf = [0u8; HEADER_SIZE];
        buf[OFFSET_MAGIC..OFFSET_MAGIC + 4].copy_from_slice(HEADER_MAGIC);
        buf[OFFSET_IMMEDIATE_FREE_XFREE] = 0x17;
        buf[OFFSET_CLIENT_VERSION..OFFSET_CLIENT_VERSION + 2]
            .copy_from_slice(&NDB_CLIENT_VERSION.to_le_bytes());
        buf[OFFSET_PLATFORM_CREATE] = NDB_PLATFORM;
        buf[OFFSET_PLATFORM_CREATE + 1] = NDB_PLATFORM;

        buf[OFFSET_AMAP_FREE..OFFSET_AMAP_FREE + 8].copy_from_slice(&self.amap_free_bytes.to_le_bytes());

        let file_size = self.root.file_eof_index().index();
        buf[OFFSET_FILE_SIZE..OFFSET_FILE_SIZE + 8].copy_from_slice(&file_size.to_le_bytes());

        let nbt_bid: u64 = (*self.root.node_btree().block()).into();
        buf[OFFSET_NBT_ROOT_BID..OFFSET_NBT_ROOT_BID + 8].copy_from_slice(&nbt_bid.to_le_bytes());

        let bbt_bid: u64 = (*self.root.block_btree().block()).into();
        buf[OFFSET_BBT_ROOT_BID..OFFSET_BBT_ROOT_BID + 8].copy_from_slice(&bbt_bid.to_le_bytes());

        let next_bid: u64 = self.next_block.into();
        buf[OFFSET_NEXT_BID..OFFSET_NEXT_BID + 8].copy_from_slice(&next_bid.to_le_bytes());

        buf[OFFSET_NEXT_PAGE..OFFSET_NEXT_PAGE + 8].copy_from_slice(&self.next_page.to_le_bytes());

        buf[OFFSET_CRYPT_METHOD] = self.crypt_method as u8;

        let crc = compute_crc(0, &buf[0..OFFSET_TRAILER_CRC]);
        buf[OFFSET_TRAILER_CRC..OFFSET_TRAILER_CRC + 4].copy_from_slice(&crc.to_le_bytes());

        f.write_all(&buf)
    }

    pub fn read(f: &mut dyn Read) -> NdbResult<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        f.read_exact(&mut buf)?;

        if &buf[OFFSET_MAGIC..OFFSET_MAGIC + 4] != HEADER_MAGIC {
            let value = u32::from_le_bytes(buf[OFFSET_MAGIC..OFFSET_MAGIC + 4].try_into().unwrap());
            return Err(NdbError::InvalidNdbHeaderMagicValue(value));
        }

        let mut version_cursor = Cursor::new(&buf[OFFSET_CLIENT_VERSION..OFFSET_CLIENT_VERSION + 2]);
        let version = version_cursor.read_u16::<LittleEndian>()?;
        if version != NDB_CLIENT_VERSION {
            return Err(NdbError::InvalidNdbVersion(version));
        }

        let crypt_method = NdbCryptMethod::try_from(buf[OFFSET_CRYPT_METHOD])?;

        let mut amap_free_cursor = Cursor::new(&buf[OFFSET_AMAP_FREE..OFFSET_AMAP_FREE + 8]);
        let amap_free_bytes = amap_free_cursor.read_u64::<LittleEndian>()?;

        let mut trailer_crc_cursor =
            Cursor::new(&buf[OFFSET_TRAILER_CRC..OFFSET_TRAILER_CRC + 4]);
        let stored_crc = trailer_crc_cursor.read_u32::<LittleEndian>()?;
        let computed_crc = compute_crc(0, &buf[0..OFFSET_TRAILER_CRC]);
        if stored_crc != computed_crc {
            return Err(NdbError::InvalidNdbHeaderFullCrc);
        }

        let mut file_size_cursor = Cursor::new(&buf[OFFSET_FILE_SIZE..OFFSET_FILE_SIZE + 8]);
        let file_size = file_size_cursor.read_u64::<LittleEndian>()?;

        let mut nbt_cursor = Cursor::new(&buf[OFFSET_NBT_ROOT_BID..OFFSET_NBT_ROOT_BID + 8]);
        let nbt_bid = BlockId::from(nbt_cursor.read_u64::<LittleEndian>()?);

        let mut bbt_cursor = Cursor::new(&buf[OFFSET_BBT_ROOT_BID..OFFSET_BBT_ROOT_BID + 8]);
        let bbt_bid = BlockId::from(bbt_cursor.read_u64::<LittleEndian>()?);

        let mut next_bid_cursor = Cursor::new(&buf[OFFSET_NEXT_BID..OFFSET_NEXT_BID + 8]);
        let next_block = BlockId::from(next_bid_cursor.read_u64::<LittleEndian>()?);

        let mut next_page_cursor = Cursor::new(&buf[OFFSET_NEXT_PAGE..OFFSET_NEXT_PAGE + 8]);
        let next_page = next_page_cursor.read_u64::<LittleEndian>()?;

        let root = Root::new(
            ByteIndex::new(file_size),
            super::block_ref::BlockRef::new(nbt_bid, ByteIndex::new(0)),
            super::block_ref::BlockRef::new(bbt_bid, ByteIndex::new(0)),
        );

        Ok(Self {
            next_page,
            next_block,
            root,
            crypt_method,
            amap_free_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndb::block_ref::BlockRef;

    #[test]
    fn test_header_round_trip() {
        let root = Root::new(
            ByteIndex::new(8192),
            BlockRef::new(BlockId::new(true, 4).unwrap(), ByteIndex::new(0)),
            BlockRef::new(BlockId::new(true, 8).unwrap(), ByteIndex::new(0)),
        );
        let header = Header::new(16, BlockId::new(true, 100).unwrap(), root);

        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let read_back = Header::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(read_back.next_page, 16);
        assert_eq!(u64::from(read_back.next_block), u64::from(header.next_block));
        assert_eq!(read_back.root.file_eof_index().index(), 8192);
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"XXXX");
        let err = Header::read(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, NdbError::InvalidNdbHeaderMagicValue(_)));
    }

    #[test]
    fn test_header_rejects_corrupted_crc() {
        let root = Root::new(
            ByteIndex::new(0),
            BlockRef::new(BlockId::new(true, 4).unwrap(), ByteIndex::new(0)),
            BlockRef::new(BlockId::new(true, 8).unwrap(), ByteIndex::new(0)),
        );
        let header = Header::new(0, BlockId::new(true, 0).unwrap(), root);
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        buf[100] ^= 0xFF;
        let err = Header::read(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, NdbError::InvalidNdbHeaderFullCrc));
    }
}
