//! [Subnodes](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/2cf5207d-aea0-474d-8eac-c3bb7b9a37fb)
//!
//! SLBLOCK leaves map a subnode's internal [`NodeId`] to a data BID and
//! (optionally) a subnode BID of its own; SIBLOCK pages index sets of
//! SLBLOCKs by the lowest NID each covers, mirroring the NBT/BBT
//! intermediate/leaf split in `page.rs` at the per-node-subnode scope.

use std::io::{self, Read, Write};

use super::block_id::BlockId;
use super::node_id::NodeId;
use super::{NdbError, NdbResult};

const BTYPE_SUBNODE_LEAF: u8 = 0x02;
const BTYPE_SUBNODE_INTERMEDIATE: u8 = 0x03;

#[derive(Clone, Copy, Debug)]
pub struct SubnodeLeafEntry {
    pub node_id: NodeId,
    pub data_bid: BlockId,
    pub sub_bid: BlockId,
}

/// SLBLOCK: a flat list of subnode leaf entries belonging to one owning
/// node, stored as its own data block (referenced by the owner's sub BID).
#[derive(Clone, Debug)]
pub struct SubnodeLeafBlock {
    pub block_id: BlockId,
    pub entries: Vec<SubnodeLeafEntry>,
}

impl SubnodeLeafBlock {
    pub fn new(block_id: BlockId, mut entries: Vec<SubnodeLeafEntry>) -> Self {
        entries.sort_by_key(|e| u32::from(e.node_id));
        Self { block_id, entries }
    }

    pub fn find(&self, node_id: NodeId) -> Option<&SubnodeLeafEntry> {
        self.entries
            .binary_search_by_key(&u32::from(node_id), |e| u32::from(e.node_id))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    fn payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(4 + self.entries.len() * 20);
        payload.push(BTYPE_SUBNODE_LEAF);
        payload.push(0);
        payload.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        for entry in &self.entries {
            payload.extend_from_slice(&u32::from(entry.node_id).to_le_bytes());
            payload.extend_from_slice(&u64::from(entry.data_bid).to_le_bytes());
            payload.extend_from_slice(&u64::from(entry.sub_bid).to_le_bytes());
        }
        payload
    }

    pub fn write(&self, f: &mut dyn Write) -> io::Result<()> {
        f.write_all(&self.payload())
    }

    pub fn read(f: &mut dyn Read, declared_size: usize, block_id: BlockId) -> NdbResult<Self> {
        let mut data = vec![0u8; declared_size];
        f.read_exact(&mut data)?;
        if data.len() < 4 || data[0] != BTYPE_SUBNODE_LEAF {
            return Err(NdbError::InvalidSubnodeEntryNodeId);
        }
        let count = u16::from_le_bytes([data[2], data[3]]) as usize;
        let mut entries = Vec::with_capacity(count);
        let mut cursor = 4;
        for _ in 0..count {
            if cursor + 20 > data.len() {
                return Err(NdbError::InvalidSubnodeEntryNodeId);
            }
            let node_id = NodeId::from(u32::from_le_bytes(data[cursor..cursor + 4].try_into().unwrap()));
            let data_bid =
                BlockId::from(u64::from_le_bytes(data[cursor + 4..cursor + 12].try_into().unwrap()));
            let sub_bid =
                BlockId::from(u64::from_le_bytes(data[cursor + 12..cursor + 20].try_into().unwrap()));
            entries.push(SubnodeLeafEntry {
                node_id,
                data_bid,
                sub_bid,
            });
            cursor += 20;
        }
        Ok(Self { block_id, entries })
    }
}

/// SIBLOCK: indexes a set of [`SubnodeLeafBlock`]s by the lowest NID each
/// covers. Only emitted once a node accumulates enough subnodes that a
/// single SLBLOCK would exceed [`super::block::MAX_BLOCK_DATA_SIZE`].
#[derive(Clone, Debug)]
pub struct SubnodeIntermediateBlock {
    pub block_id: BlockId,
    pub entries: Vec<(NodeId, BlockId)>,
}

impl SubnodeIntermediateBlock {
    pub fn new(block_id: BlockId, entries: Vec<(NodeId, BlockId)>) -> Self {
        Self { block_id, entries }
    }

    fn payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(4 + self.entries.len() * 12);
        payload.push(BTYPE_SUBNODE_INTERMEDIATE);
        payload.push(0);
        payload.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        for (node_id, child) in &self.entries {
            payload.extend_from_slice(&u32::from(*node_id).to_le_bytes());
            payload.extend_from_slice(&u64::from(*child).to_le_bytes());
        }
        payload
    }

    pub fn write(&self, f: &mut dyn Write) -> io::Result<()> {
        f.write_all(&self.payload())
    }

    pub fn read(f: &mut dyn Read, declared_size: usize, block_id: BlockId) -> NdbResult<Self> {
        let mut data = vec![0u8; declared_size];
        f.read_exact(&mut data)?;
        if data.len() < 4 || data[0] != BTYPE_SUBNODE_INTERMEDIATE {
            return Err(NdbError::InvalidSubnodeEntryNodeId);
        }
        let count = u16::from_le_bytes([data[2], data[3]]) as usize;
        let mut entries = Vec::with_capacity(count);
        let mut cursor = 4;
        for _ in 0..count {
            let node_id = NodeId::from(u32::from_le_bytes(data[cursor..cursor + 4].try_into().unwrap()));
            let child =
                BlockId::from(u64::from_le_bytes(data[cursor + 4..cursor + 12].try_into().unwrap()));
            entries.push((node_id, child));
            cursor += 12;
        }
        Ok(Self { block_id, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndb::node_id::NodeIdType;

    #[test]
    fn test_subnode_leaf_round_trip_and_lookup() {
        let block_id = BlockId::new(true, 9).unwrap();
        let entries = vec![
            SubnodeLeafEntry {
                node_id: NodeId::new(NodeIdType::Attachment, 2).unwrap(),
                data_bid: BlockId::new(false, 30).unwrap(),
                sub_bid: BlockId::from(0),
            },
            SubnodeLeafEntry {
                node_id: NodeId::new(NodeIdType::Attachment, 1).unwrap(),
                data_bid: BlockId::new(false, 31).unwrap(),
                sub_bid: BlockId::from(0),
            },
        ];
        let block = SubnodeLeafBlock::new(block_id, entries);
        let mut buf = Vec::new();
        block.write(&mut buf).unwrap();

        let read_back =
            SubnodeLeafBlock::read(&mut std::io::Cursor::new(buf), block.payload().len(), block_id)
                .unwrap();
        let target = NodeId::new(NodeIdType::Attachment, 1).unwrap();
        let found = read_back.find(target).unwrap();
        assert_eq!(found.data_bid, BlockId::new(false, 31).unwrap());
    }

    #[test]
    fn test_subnode_intermediate_round_trip() {
        let block_id = BlockId::new(true, 40).unwrap();
        let entries = vec![(
            NodeId::new(NodeIdType::Attachment, 0).unwrap(),
            BlockId::new(true, 41).unwrap(),
        )];
        let block = SubnodeIntermediateBlock::new(block_id, entries);
        let mut buf = Vec::new();
        block.write(&mut buf).unwrap();
        let read_back = SubnodeIntermediateBlock::read(
            &mut std::io::Cursor::new(buf),
            block.payload().len(),
            block_id,
        )
        .unwrap();
        assert_eq!(read_back.entries.len(), 1);
    }
}
