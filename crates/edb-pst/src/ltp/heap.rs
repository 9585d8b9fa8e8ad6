//! [HN (Heap-on-Node)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/77ce49a3-3772-4d8d-bb2c-2f7520a238a6)
//!
//! A single-block heap: `HNHDR` (signature, client signature, user root
//! HID, fill levels) followed by packed heap items, followed by the
//! `HNPAGEMAP` allocation table. Only one data block per node is
//! supported — every PC/TC built by this crate fits comfortably inside
//! [`crate::ndb::block::MAX_BLOCK_DATA_SIZE`], so the multi-block HN
//! chaining the format allows is left unimplemented.

use super::{LtpError, LtpResult};
use crate::ndb::node_id::{NodeId, NodeIdType};

pub const HEAP_INDEX_MASK: u32 = 0x7FF;
const HEAP_SIGNATURE: u8 = 0xEC;
const HEADER_SIZE: usize = 10;

/// [HID](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/85b9e985-ea53-447f-b70c-eb82bfbdcbc9)
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct HeapId(NodeId);

impl HeapId {
    pub fn new(index: u16, block_index: u16) -> LtpResult<Self> {
        if index == 0 {
            return Err(LtpError::InvalidHeapIndex(index));
        }
        let node_index = ((block_index as u32) << 11) | index as u32;
        Ok(Self(NodeId::new(NodeIdType::HeapNode, node_index)?))
    }

    pub fn index(&self) -> u16 {
        (self.0.index() & HEAP_INDEX_MASK) as u16
    }

    pub fn block_index(&self) -> u16 {
        (self.0.index() >> 11) as u16
    }

    pub fn is_zero(&self) -> bool {
        u32::from(self.0) == 0
    }
}

impl From<u32> for HeapId {
    fn from(value: u32) -> Self {
        Self(NodeId::from(value))
    }
}

impl From<HeapId> for u32 {
    fn from(value: HeapId) -> Self {
        u32::from(value.0)
    }
}

/// `bClientSig`
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum HeapNodeType {
    Table = 0x7C,
    Tree = 0xB5,
    Properties = 0xBC,
}

impl TryFrom<u8> for HeapNodeType {
    type Error = LtpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x7C => Ok(Self::Table),
            0xB5 => Ok(Self::Tree),
            0xBC => Ok(Self::Properties),
            other => Err(LtpError::InvalidHeapNodeTypeSignature(other)),
        }
    }
}

/// A single-block Heap-on-Node under construction: items are appended in
/// allocation order and addressed by the [`HeapId`] returned from
/// [`Self::allocate`].
#[derive(Clone, Debug)]
pub struct HeapOnNode {
    client_sig: HeapNodeType,
    user_root: HeapId,
    items: Vec<Vec<u8>>,
}

impl HeapOnNode {
    pub fn new(client_sig: HeapNodeType) -> Self {
        Self {
            client_sig,
            user_root: HeapId::from(0),
            items: vec![Vec::new()],
        }
    }

    /// Appends a heap item and returns the [`HeapId`] addressing it.
    /// Index 0 is reserved (denotes "no value"); real items start at 1.
    pub fn allocate(&mut self, data: Vec<u8>) -> LtpResult<HeapId> {
        let index = self.items.len() as u16;
        self.items.push(data);
        HeapId::new(index, 0)
    }

    pub fn set_user_root(&mut self, id: HeapId) {
        self.user_root = id;
    }

    pub fn user_root(&self) -> HeapId {
        self.user_root
    }

    pub fn get(&self, id: HeapId) -> LtpResult<&[u8]> {
        if id.block_index() != 0 {
            return Err(LtpError::InvalidHeapIndex(id.index()));
        }
        self.items
            .get(id.index() as usize)
            .map(|v| v.as_slice())
            .ok_or(LtpError::InvalidHeapIndex(id.index()))
    }

    fn fill_level_byte(&self) -> u8 {
        let used: usize = self.items.iter().map(|i| i.len()).sum::<usize>() + HEADER_SIZE;
        let free = crate::ndb::block::MAX_BLOCK_DATA_SIZE.saturating_sub(used);
        let level: u8 = match free {
            f if f >= 3584 => 0x00,
            f if f >= 2560 => 0x01,
            f if f >= 2048 => 0x02,
            f if f >= 1792 => 0x03,
            f if f >= 1536 => 0x04,
            f if f >= 1280 => 0x05,
            f if f >= 1024 => 0x06,
            f if f >= 768 => 0x07,
            f if f >= 512 => 0x08,
            f if f >= 256 => 0x09,
            f if f >= 128 => 0x0A,
            f if f >= 64 => 0x0B,
            f if f >= 32 => 0x0C,
            f if f >= 16 => 0x0D,
            f if f >= 8 => 0x0E,
            _ => 0x0F,
        };
        level
    }

    /// Encodes the heap as one block payload: `HNHDR`, packed items, then
    /// `HNPAGEMAP` with `cAlloc + 1` cumulative offsets.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let mut alloc_offsets = Vec::with_capacity(self.items.len());

        let mut cursor = HEADER_SIZE as u16;
        for item in &self.items {
            alloc_offsets.push(cursor);
            body.extend_from_slice(item);
            cursor += item.len() as u16;
        }
        alloc_offsets.push(cursor);

        let page_map_offset = cursor;

        let mut out = Vec::with_capacity(HEADER_SIZE + body.len() + 4 + alloc_offsets.len() * 2);
        out.push(HEAP_SIGNATURE);
        out.push(self.client_sig as u8);
        out.extend_from_slice(&u32::from(self.user_root).to_le_bytes());
        out.push(self.fill_level_byte());
        out.extend_from_slice(&[0u8; 3]);
        out.extend_from_slice(&body);

        out.extend_from_slice(&((alloc_offsets.len() - 1) as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        for offset in &alloc_offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }

        let _ = page_map_offset;
        out
    }

    pub fn decode(data: &[u8]) -> LtpResult<Self> {
        if data.len() < HEADER_SIZE || data[0] != HEAP_SIGNATURE {
            return Err(LtpError::InvalidHeapNodeTypeSignature(
                data.first().copied().unwrap_or(0),
            ));
        }
        let client_sig = HeapNodeType::try_from(data[1])?;
        let user_root = HeapId::from(u32::from_le_bytes(data[2..6].try_into().unwrap()));

        let c_alloc = u16::from_le_bytes(
            data[data.len() - 4..data.len() - 2].try_into().unwrap(),
        ) as usize;
        let offsets_start = data.len() - (c_alloc + 1) * 2;
        let mut offsets = Vec::with_capacity(c_alloc + 1);
        let mut cursor = offsets_start;
        for _ in 0..=c_alloc {
            offsets.push(u16::from_le_bytes(data[cursor..cursor + 2].try_into().unwrap()));
            cursor += 2;
        }

        let mut items = vec![Vec::new()];
        for window in offsets.windows(2).skip(1) {
            let (start, end) = (window[0] as usize, window[1] as usize);
            items.push(data[start..end].to_vec());
        }

        Ok(Self {
            client_sig,
            user_root,
            items,
        })
    }
}
