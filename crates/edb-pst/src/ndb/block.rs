//! [Blocks](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/4965ded0-d778-4d4d-b890-544a77f1e4f2)
//!
//! Data blocks (raw bytes, padded to an 8-byte boundary) and data trees
//! (XBLOCK/XXBLOCK) for payloads that exceed a single block's 8KB limit.
//! Every block ends in a 16-byte trailer: `cb`, `wSig`, `dwCRC`, `bid`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use super::block_id::BlockId;
use super::{NdbError, NdbResult};
use crate::block_sig::compute_sig;
use crate::util::crc::compute_crc;

pub const MAX_BLOCK_SIZE: usize = 8192;
pub const MAX_BLOCK_DATA_SIZE: usize = 8176;
const TRAILER_SIZE: usize = 16;

const BTYPE_DATA_TREE: u8 = 0x01;

fn padded_len(len: usize) -> usize {
    (len + 7) & !7
}

#[derive(Clone, Copy, Debug)]
pub struct BlockTrailer {
    pub data_size: u16,
    pub signature: u16,
    pub crc: u32,
    pub block_id: BlockId,
}

impl BlockTrailer {
    pub fn new(data_size: u16, block_id: BlockId, data: &[u8]) -> Self {
        let crc = compute_crc(0, data);
        let signature = compute_sig(data_size as u32, u64::from(block_id) as u32);
        Self {
            data_size,
            signature,
            crc,
            block_id,
        }
    }

    pub fn read(f: &mut dyn Read) -> NdbResult<Self> {
        let data_size = f.read_u16::<LittleEndian>()?;
        let signature = f.read_u16::<LittleEndian>()?;
        let crc = f.read_u32::<LittleEndian>()?;
        let block_id = BlockId::read(f)?;
        Ok(Self {
            data_size,
            signature,
            crc,
            block_id,
        })
    }

    pub fn write(&self, f: &mut dyn Write) -> io::Result<()> {
        f.write_u16::<LittleEndian>(self.data_size)?;
        f.write_u16::<LittleEndian>(self.signature)?;
        f.write_u32::<LittleEndian>(self.crc)?;
        self.block_id.write(f)
    }
}

/// A single raw data block: payload bytes plus trailer, zero-padded to an
/// 8-byte boundary before the trailer begins.
#[derive(Clone, Debug)]
pub struct DataBlock {
    pub block_id: BlockId,
    pub data: Vec<u8>,
}

impl DataBlock {
    pub fn new(block_id: BlockId, data: Vec<u8>) -> NdbResult<Self> {
        if data.len() > MAX_BLOCK_DATA_SIZE {
            return Err(NdbError::InvalidBlockSize(data.len() as u16));
        }
        Ok(Self { block_id, data })
    }

    pub fn encoded_len(&self) -> usize {
        padded_len(self.data.len()) + TRAILER_SIZE
    }

    pub fn write(&self, f: &mut dyn Write) -> io::Result<()> {
        f.write_all(&self.data)?;
        let pad = padded_len(self.data.len()) - self.data.len();
        f.write_all(&vec![0u8; pad])?;
        let trailer = BlockTrailer::new(self.data.len() as u16, self.block_id, &self.data);
        trailer.write(f)
    }

    pub fn read(f: &mut dyn Read, declared_size: usize, block_id: BlockId) -> NdbResult<Self> {
        if declared_size > MAX_BLOCK_DATA_SIZE {
            return Err(NdbError::InvalidBlockSize(declared_size as u16));
        }
        let mut data = vec![0u8; declared_size];
        f.read_exact(&mut data)?;
        let pad = padded_len(declared_size) - declared_size;
        let mut padding = vec![0u8; pad];
        f.read_exact(&mut padding)?;

        let trailer = BlockTrailer::read(f)?;
        if trailer.block_id != block_id {
            return Err(NdbError::InvalidBlockTrailerId(u64::from(trailer.block_id)));
        }
        let computed_crc = compute_crc(0, &data);
        if trailer.crc != computed_crc {
            return Err(NdbError::InvalidBlockCrc(computed_crc));
        }
        Ok(Self { block_id, data })
    }
}

/// XBLOCK/XXBLOCK data tree node: an internal block whose payload is a flat
/// list of child block IDs (leaf children are raw [`DataBlock`]s when
/// `level == 1`, grandchild XBLOCKs when `level == 2`).
#[derive(Clone, Debug)]
pub struct DataTreeBlock {
    pub block_id: BlockId,
    pub level: u8,
    pub total_data_size: u32,
    pub child_block_ids: Vec<BlockId>,
}

impl DataTreeBlock {
    pub fn new(
        block_id: BlockId,
        level: u8,
        total_data_size: u32,
        child_block_ids: Vec<BlockId>,
    ) -> Self {
        Self {
            block_id,
            level,
            total_data_size,
            child_block_ids,
        }
    }

    fn payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(8 + self.child_block_ids.len() * 8);
        payload.push(BTYPE_DATA_TREE);
        payload.push(self.level);
        payload.extend_from_slice(&(self.child_block_ids.len() as u16).to_le_bytes());
        payload.extend_from_slice(&self.total_data_size.to_le_bytes());
        for child in &self.child_block_ids {
            payload.extend_from_slice(&u64::from(*child).to_le_bytes());
        }
        payload
    }

    pub fn write(&self, f: &mut dyn Write) -> io::Result<()> {
        let payload = self.payload();
        f.write_all(&payload)?;
        let pad = padded_len(payload.len()) - payload.len();
        f.write_all(&vec![0u8; pad])?;
        let trailer = BlockTrailer::new(payload.len() as u16, self.block_id, &payload);
        trailer.write(f)
    }

    pub fn read(f: &mut dyn Read, declared_size: usize, block_id: BlockId) -> NdbResult<Self> {
        let mut data = vec![0u8; declared_size];
        f.read_exact(&mut data)?;
        let pad = padded_len(declared_size) - declared_size;
        let mut padding = vec![0u8; pad];
        f.read_exact(&mut padding)?;
        let trailer = BlockTrailer::read(f)?;
        if trailer.block_id != block_id {
            return Err(NdbError::InvalidBlockTrailerId(u64::from(trailer.block_id)));
        }

        if data.len() < 8 || data[0] != BTYPE_DATA_TREE {
            return Err(NdbError::InvalidPageType(data.first().copied().unwrap_or(0)));
        }
        let level = data[1];
        let count = u16::from_le_bytes([data[2], data[3]]) as usize;
        let total_data_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let mut child_block_ids = Vec::with_capacity(count);
        let mut cursor = 8;
        for _ in 0..count {
            let raw = u64::from_le_bytes(data[cursor..cursor + 8].try_into().unwrap());
            child_block_ids.push(BlockId::from(raw));
            cursor += 8;
        }
        Ok(Self {
            block_id,
            level,
            total_data_size,
            child_block_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_block_round_trip() {
        let block_id = BlockId::new(false, 10).unwrap();
        let block = DataBlock::new(block_id, b"hello world".to_vec()).unwrap();
        let mut buf = Vec::new();
        block.write(&mut buf).unwrap();
        assert_eq!(buf.len(), block.encoded_len());

        let data_len = block.data.len();
        let mut cursor = std::io::Cursor::new(buf);
        let read_back = DataBlock::read(&mut cursor, data_len, block_id).unwrap();
        assert_eq!(read_back.data, b"hello world");
    }

    #[test]
    fn test_data_block_rejects_oversized_payload() {
        let block_id = BlockId::new(false, 1).unwrap();
        let err = DataBlock::new(block_id, vec![0u8; MAX_BLOCK_DATA_SIZE + 1]).unwrap_err();
        assert!(matches!(err, NdbError::InvalidBlockSize(_)));
    }

    #[test]
    fn test_data_tree_block_round_trip() {
        let block_id = BlockId::new(true, 2).unwrap();
        let children = vec![
            BlockId::new(false, 10).unwrap(),
            BlockId::new(false, 11).unwrap(),
        ];
        let tree = DataTreeBlock::new(block_id, 1, 16000, children.clone());
        let mut buf = Vec::new();
        tree.write(&mut buf).unwrap();

        let payload_len = tree.payload().len();
        let mut cursor = std::io::Cursor::new(buf);
        let read_back = DataTreeBlock::read(&mut cursor, payload_len, block_id).unwrap();
        assert_eq!(read_back.level, 1);
        assert_eq!(read_back.total_data_size, 16000);
        assert_eq!(read_back.child_block_ids, children);
    }

    #[test]
    fn test_data_block_detects_crc_mismatch() {
        let block_id = BlockId::new(false, 3).unwrap();
        let block = DataBlock::new(block_id, b"payload".to_vec()).unwrap();
        let mut buf = Vec::new();
        block.write(&mut buf).unwrap();
        let corrupt_offset = 1;
        buf[corrupt_offset] ^= 0xFF;
        let mut cursor = std::io::Cursor::new(buf);
        let err = DataBlock::read(&mut cursor, 7, block_id).unwrap_err();
        assert!(matches!(err, NdbError::InvalidBlockCrc(_)));
    }
}
