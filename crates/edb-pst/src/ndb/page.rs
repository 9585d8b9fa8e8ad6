//! [Pages](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5cf6e37d-17fa-4c7d-b7a0-b2b62f2c4a2a)
//!
//! Fixed 512-byte pages: the Allocation Map, the Density List, and the two
//! top-level B-trees (NBT keyed by [`NodeId`], BBT keyed by [`BlockId`]).
//! Every page ends in a trailer mirroring [`BlockTrailer`]'s shape but with
//! a page type byte repeated for self-consistency checking.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use super::block_id::BlockId;
use super::block_ref::BlockRef;
use super::byte_index::ByteIndex;
use super::node_id::NodeId;
use super::{NdbError, NdbResult};
use crate::block_sig::compute_sig;
use crate::util::crc::compute_crc;

pub const PAGE_SIZE: usize = 512;
const PAGE_TRAILER_SIZE: usize = 16;
const PAGE_BODY_SIZE: usize = PAGE_SIZE - PAGE_TRAILER_SIZE;

/// Granularity of one Allocation Map page: 496 usable bitmap bytes, 8 slots
/// per byte, 64 bytes of file space per slot.
pub const AMAP_PAGE_GRANULARITY: u64 = 496 * 8 * 64;

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PageType {
    BlockBTree = 0x80,
    NodeBTree = 0x81,
    FreeMap = 0x82,
    AllocationPageMap = 0x83,
    DensityList = 0x84,
    AllocationMap = 0x85,
    FreePageMap = 0x86,
}

impl TryFrom<u8> for PageType {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x80 => Ok(PageType::BlockBTree),
            0x81 => Ok(PageType::NodeBTree),
            0x82 => Ok(PageType::FreeMap),
            0x83 => Ok(PageType::AllocationPageMap),
            0x84 => Ok(PageType::DensityList),
            0x85 => Ok(PageType::AllocationMap),
            0x86 => Ok(PageType::FreePageMap),
            other => Err(NdbError::InvalidPageType(other)),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PageTrailer {
    pub page_type: PageType,
    pub signature: u16,
    pub crc: u32,
    pub block_id: BlockId,
}

impl PageTrailer {
    pub fn new(page_type: PageType, block_id: BlockId, body: &[u8]) -> Self {
        let crc = compute_crc(0, body);
        let signature = compute_sig(u64::from(block_id) as u32, 0);
        Self {
            page_type,
            signature,
            crc,
            block_id,
        }
    }

    pub fn read(f: &mut dyn Read) -> NdbResult<Self> {
        let page_type = PageType::try_from(f.read_u8()?)?;
        let page_type_repeat = f.read_u8()?;
        if page_type_repeat != page_type as u8 {
            return Err(NdbError::MismatchPageTypeRepeat);
        }
        let signature = f.read_u16::<LittleEndian>()?;
        let crc = f.read_u32::<LittleEndian>()?;
        let block_id = BlockId::read(f)?;
        Ok(Self {
            page_type,
            signature,
            crc,
            block_id,
        })
    }

    pub fn write(&self, f: &mut dyn Write) -> io::Result<()> {
        f.write_u8(self.page_type as u8)?;
        f.write_u8(self.page_type as u8)?;
        f.write_u16::<LittleEndian>(self.signature)?;
        f.write_u32::<LittleEndian>(self.crc)?;
        self.block_id.write(f)
    }
}

fn read_body(f: &mut dyn Read) -> io::Result<[u8; PAGE_BODY_SIZE]> {
    let mut body = [0u8; PAGE_BODY_SIZE];
    f.read_exact(&mut body)?;
    Ok(body)
}

/// A single Allocation Map page: a bitmap of 8-page allocation units across
/// its [`AMAP_PAGE_GRANULARITY`]-byte span, 1 bit per page (1 = allocated).
#[derive(Clone, Debug)]
pub struct AllocationMapPage {
    pub block_id: BlockId,
    pub bitmap: Vec<u8>,
}

impl AllocationMapPage {
    pub fn new(block_id: BlockId, bitmap: Vec<u8>) -> NdbResult<Self> {
        if bitmap.len() > PAGE_BODY_SIZE {
            return Err(NdbError::InvalidBlockSize(bitmap.len() as u16));
        }
        Ok(Self { block_id, bitmap })
    }

    pub fn write(&self, f: &mut dyn Write) -> io::Result<()> {
        let mut body = [0u8; PAGE_BODY_SIZE];
        body[..self.bitmap.len()].copy_from_slice(&self.bitmap);
        f.write_all(&body)?;
        let trailer = PageTrailer::new(PageType::AllocationMap, self.block_id, &body);
        trailer.write(f)
    }

    pub fn read(f: &mut dyn Read, block_id: BlockId) -> NdbResult<Self> {
        let body = read_body(f)?;
        let trailer = PageTrailer::read(f)?;
        if trailer.page_type != PageType::AllocationMap {
            return Err(NdbError::InvalidPageType(trailer.page_type as u8));
        }
        let computed_crc = compute_crc(0, &body);
        if trailer.crc != computed_crc {
            return Err(NdbError::InvalidPageCrc(computed_crc));
        }
        Ok(Self {
            block_id,
            bitmap: body.to_vec(),
        })
    }
}

/// Density List page: one entry per AMap page recording its free-space
/// ranking, used to pick allocation candidates without scanning every AMap.
#[derive(Clone, Debug)]
pub struct DensityListEntry {
    pub page_number: u32,
    pub free_slots: u32,
}

#[derive(Clone, Debug)]
pub struct DensityListPage {
    pub block_id: BlockId,
    pub entries: Vec<DensityListEntry>,
}

impl DensityListPage {
    pub fn new(block_id: BlockId, entries: Vec<DensityListEntry>) -> Self {
        Self { block_id, entries }
    }

    pub fn write(&self, f: &mut dyn Write) -> io::Result<()> {
        let mut body = Vec::with_capacity(PAGE_BODY_SIZE);
        body.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for entry in &self.entries {
            body.extend_from_slice(&entry.page_number.to_le_bytes());
            body.extend_from_slice(&entry.free_slots.to_le_bytes());
        }
        body.resize(PAGE_BODY_SIZE, 0);
        f.write_all(&body)?;
        let trailer = PageTrailer::new(PageType::DensityList, self.block_id, &body);
        trailer.write(f)
    }

    pub fn read(f: &mut dyn Read, block_id: BlockId) -> NdbResult<Self> {
        let body = read_body(f)?;
        let trailer = PageTrailer::read(f)?;
        if trailer.page_type != PageType::DensityList {
            return Err(NdbError::InvalidPageType(trailer.page_type as u8));
        }
        let computed_crc = compute_crc(0, &body);
        if trailer.crc != computed_crc {
            return Err(NdbError::InvalidPageCrc(computed_crc));
        }
        let count = u32::from_le_bytes(body[0..4].try_into().unwrap()) as usize;
        let mut entries = Vec::with_capacity(count);
        let mut cursor = 4;
        for _ in 0..count {
            if cursor + 8 > body.len() {
                return Err(NdbError::InvalidDensityListEntry);
            }
            let page_number = u32::from_le_bytes(body[cursor..cursor + 4].try_into().unwrap());
            let free_slots = u32::from_le_bytes(body[cursor + 4..cursor + 8].try_into().unwrap());
            entries.push(DensityListEntry {
                page_number,
                free_slots,
            });
            cursor += 8;
        }
        Ok(Self { block_id, entries })
    }
}

/// One NBT leaf record: maps a [`NodeId`] to its data/subnode BIDs.
#[derive(Clone, Copy, Debug)]
pub struct NbtEntry {
    pub node_id: NodeId,
    pub data_bid: BlockId,
    pub sub_bid: BlockId,
    pub parent_node_id: NodeId,
}

/// One BBT leaf record: a block's id, encoded byte length, and reference
/// count (blocks are freed once `ref_count` drops to zero).
#[derive(Clone, Copy, Debug)]
pub struct BbtEntry {
    pub block_id: BlockId,
    pub byte_count: u16,
    pub ref_count: u16,
}

/// A B-tree page: `level == 0` pages hold leaf entries for the tree kind
/// they belong to, `level > 0` pages hold `(key, child BlockRef)` pairs.
#[derive(Clone, Debug)]
pub enum BTreePage<Leaf> {
    Intermediate {
        block_id: BlockId,
        level: u8,
        entries: Vec<(u64, BlockRef)>,
    },
    Leaf {
        block_id: BlockId,
        entries: Vec<Leaf>,
    },
}

pub trait BTreeLeafCodec: Sized + Clone {
    const ENTRY_SIZE: usize;
    fn key(&self) -> u64;
    fn encode(&self, buf: &mut Vec<u8>);
    fn decode(buf: &[u8]) -> NdbResult<Self>;
}

impl BTreeLeafCodec for NbtEntry {
    const ENTRY_SIZE: usize = 24;

    fn key(&self) -> u64 {
        u32::from(self.node_id) as u64
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&u32::from(self.node_id).to_le_bytes());
        buf.extend_from_slice(&u64::from(self.data_bid).to_le_bytes());
        buf.extend_from_slice(&u64::from(self.sub_bid).to_le_bytes());
        buf.extend_from_slice(&u32::from(self.parent_node_id).to_le_bytes());
    }

    fn decode(buf: &[u8]) -> NdbResult<Self> {
        if buf.len() < Self::ENTRY_SIZE {
            return Err(NdbError::InvalidNodeBTreeEntryNodeId);
        }
        let node_id = NodeId::from(u32::from_le_bytes(buf[0..4].try_into().unwrap()));
        let data_bid = BlockId::from(u64::from_le_bytes(buf[4..12].try_into().unwrap()));
        let sub_bid = BlockId::from(u64::from_le_bytes(buf[12..20].try_into().unwrap()));
        let parent_node_id = NodeId::from(u32::from_le_bytes(buf[20..24].try_into().unwrap()));
        Ok(Self {
            node_id,
            data_bid,
            sub_bid,
            parent_node_id,
        })
    }
}

impl BTreeLeafCodec for BbtEntry {
    const ENTRY_SIZE: usize = 12;

    fn key(&self) -> u64 {
        u64::from(self.block_id)
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&u64::from(self.block_id).to_le_bytes());
        buf.extend_from_slice(&self.byte_count.to_le_bytes());
        buf.extend_from_slice(&self.ref_count.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> NdbResult<Self> {
        if buf.len() < Self::ENTRY_SIZE {
            return Err(NdbError::InvalidBTreeEntryCount(0));
        }
        let block_id = BlockId::from(u64::from_le_bytes(buf[0..8].try_into().unwrap()));
        let byte_count = u16::from_le_bytes(buf[8..10].try_into().unwrap());
        let ref_count = u16::from_le_bytes(buf[10..12].try_into().unwrap());
        Ok(Self {
            block_id,
            byte_count,
            ref_count,
        })
    }
}

const INTERMEDIATE_ENTRY_SIZE: usize = 24;

impl<Leaf: BTreeLeafCodec> BTreePage<Leaf> {
    pub fn write(&self, f: &mut dyn Write, page_type: PageType) -> io::Result<()> {
        let mut body = Vec::with_capacity(PAGE_BODY_SIZE);
        let block_id = match self {
            BTreePage::Intermediate {
                block_id,
                level,
                entries,
            } => {
                body.extend_from_slice(&(entries.len() as u16).to_le_bytes());
                body.push(*level);
                for (key, child) in entries {
                    body.extend_from_slice(&key.to_le_bytes());
                    body.extend_from_slice(&u64::from(*child.block()).to_le_bytes());
                    body.extend_from_slice(&u64::from(*child.index()).to_le_bytes());
                }
                *block_id
            }
            BTreePage::Leaf { block_id, entries } => {
                body.extend_from_slice(&(entries.len() as u16).to_le_bytes());
                body.push(0);
                for entry in entries {
                    entry.encode(&mut body);
                }
                *block_id
            }
        };
        body.resize(PAGE_BODY_SIZE, 0);
        f.write_all(&body)?;
        let trailer = PageTrailer::new(page_type, block_id, &body);
        trailer.write(f)
    }

    pub fn read(f: &mut dyn Read, page_type: PageType) -> NdbResult<Self> {
        let body = read_body(f)?;
        let trailer = PageTrailer::read(f)?;
        if trailer.page_type != page_type {
            return Err(NdbError::InvalidPageType(trailer.page_type as u8));
        }
        let computed_crc = compute_crc(0, &body);
        if trailer.crc != computed_crc {
            return Err(NdbError::InvalidPageCrc(computed_crc));
        }

        let count = u16::from_le_bytes(body[0..2].try_into().unwrap()) as usize;
        let level = body[2];
        let block_id = trailer.block_id;

        if level == 0 {
            let mut entries = Vec::with_capacity(count);
            let mut cursor = 3;
            for _ in 0..count {
                let slice = &body[cursor..cursor + Leaf::ENTRY_SIZE];
                entries.push(Leaf::decode(slice)?);
                cursor += Leaf::ENTRY_SIZE;
            }
            Ok(BTreePage::Leaf { block_id, entries })
        } else {
            let mut entries = Vec::with_capacity(count);
            let mut cursor = 3;
            for _ in 0..count {
                let key = u64::from_le_bytes(body[cursor..cursor + 8].try_into().unwrap());
                let child_block = BlockId::from(u64::from_le_bytes(
                    body[cursor + 8..cursor + 16].try_into().unwrap(),
                ));
                let child_index = ByteIndex::new(u64::from_le_bytes(
                    body[cursor + 16..cursor + 24].try_into().unwrap(),
                ));
                entries.push((key, BlockRef::new(child_block, child_index)));
                cursor += INTERMEDIATE_ENTRY_SIZE;
            }
            Ok(BTreePage::Intermediate {
                block_id,
                level,
                entries,
            })
        }
    }
}
