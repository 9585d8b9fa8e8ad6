//! From-scratch NDB assembly: NID/BID allocation, block emission, and a
//! bulk B-tree loader for the NBT/BBT, built entirely on the byte layouts
//! `block.rs`/`page.rs`/`header.rs` already read and write.

use std::collections::HashMap;

use super::block::{DataBlock, DataTreeBlock, MAX_BLOCK_DATA_SIZE};
use super::block_id::BlockId;
use super::block_ref::BlockRef;
use super::byte_index::ByteIndex;
use super::header::Header;
use super::node_id::{NodeId, NodeIdType};
use super::page::{
    AllocationMapPage, BTreeLeafCodec, BTreePage, BbtEntry, DensityListEntry, DensityListPage,
    NbtEntry, PageType, AMAP_PAGE_GRANULARITY, PAGE_SIZE,
};
use super::root::Root;
use super::{NdbError, NdbResult};

const HEADER_SIZE: usize = super::header::HEADER_SIZE;

/// Target load factor for bulk-loaded B-tree leaf pages: pack to roughly
/// half a page's entry capacity, leaving room for later incremental
/// inserts without an immediate page split.
const BULK_LOAD_FILL_NUMERATOR: usize = 1;
const BULK_LOAD_FILL_DENOMINATOR: usize = 2;

const PAGE_BODY_SIZE: usize = PAGE_SIZE - 16;
const PAGE_HEADER_SIZE: usize = 3;
const INTERMEDIATE_ENTRY_SIZE: usize = 24;

/// Allocates NIDs/BIDs, accumulates encoded blocks and pages at sequential
/// file offsets, and assembles the final PST byte stream on [`Self::finish`].
pub struct PstWriter {
    next_nid_index: HashMap<u8, u32>,
    next_shared_index: u32,
    next_bid_index: u64,
    blocks: Vec<(BlockId, Vec<u8>)>,
    nbt_entries: Vec<NbtEntry>,
    bbt_entries: Vec<BbtEntry>,
    emitted_bytes: u64,
}

impl Default for PstWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PstWriter {
    pub fn new() -> Self {
        Self {
            next_nid_index: HashMap::new(),
            next_shared_index: 1,
            next_bid_index: 1,
            blocks: Vec::new(),
            nbt_entries: Vec::new(),
            bbt_entries: Vec::new(),
            emitted_bytes: HEADER_SIZE as u64,
        }
    }

    /// Accounts `len` additional bytes against the writer's output ceiling
    /// (50 GiB), failing fast rather than letting a runaway input silently
    /// grow the file past the point any PST client will open it.
    fn account_bytes(&mut self, len: usize) -> NdbResult<()> {
        self.emitted_bytes += len as u64;
        if self.emitted_bytes > crate::PST_SPACE_CEILING_BYTES {
            return Err(NdbError::SpaceExhausted(self.emitted_bytes));
        }
        Ok(())
    }

    pub fn allocate_nid(&mut self, node_type: NodeIdType) -> NdbResult<NodeId> {
        let counter = self.next_nid_index.entry(node_type as u8).or_insert(1);
        let index = *counter;
        *counter += 1;
        NodeId::new(node_type, index)
    }

    /// Allocates a fresh node index shared across a family of sibling NIDs
    /// (e.g. a folder's own NID and its Hierarchy/Contents/Associated
    /// Contents table NIDs, which differ only in [`NodeIdType`] but share
    /// an index per [MS-PST] §2.4.4).
    pub fn allocate_shared_index(&mut self) -> u32 {
        let index = self.next_shared_index;
        self.next_shared_index += 1;
        index
    }

    fn allocate_bid(&mut self, is_internal: bool) -> NdbResult<BlockId> {
        let index = self.next_bid_index;
        self.next_bid_index += 1;
        BlockId::new(is_internal, index)
    }

    /// Writes `data` as a node's primary block, chunking into an XBLOCK
    /// data tree when it exceeds a single block's capacity, and registers
    /// an NBT leaf entry plus the owning BBT leaf entries.
    pub fn write_node_data(
        &mut self,
        node_id: NodeId,
        parent_node_id: NodeId,
        data: &[u8],
    ) -> NdbResult<()> {
        let data_bid = self.write_data_payload(data)?;
        self.nbt_entries.push(NbtEntry {
            node_id,
            data_bid,
            sub_bid: BlockId::from(0),
            parent_node_id,
        });
        Ok(())
    }

    /// Attaches a subnode BID (an SLBLOCK/SIBLOCK chain built by the
    /// `ltp`/`messaging` writers) to an already-registered NBT entry.
    pub fn set_subnode_bid(&mut self, node_id: NodeId, sub_bid: BlockId) -> NdbResult<()> {
        let entry = self
            .nbt_entries
            .iter_mut()
            .find(|e| e.node_id == node_id)
            .ok_or(NdbError::InvalidNodeBTreeEntryNodeId)?;
        entry.sub_bid = sub_bid;
        Ok(())
    }

    /// Writes a raw byte blob as one or more data blocks and registers it
    /// in the BBT, returning the BID a caller should store as a data or
    /// subnode reference.
    pub fn write_data_payload(&mut self, data: &[u8]) -> NdbResult<BlockId> {
        if data.len() <= MAX_BLOCK_DATA_SIZE {
            let block_id = self.allocate_bid(false)?;
            let block = DataBlock::new(block_id, data.to_vec())?;
            let mut buf = Vec::new();
            block.write(&mut buf).map_err(NdbError::Io)?;
            self.bbt_entries.push(BbtEntry {
                block_id,
                byte_count: data.len() as u16,
                ref_count: 1,
            });
            self.account_bytes(buf.len())?;
            self.blocks.push((block_id, buf));
            Ok(block_id)
        } else {
            let mut child_ids = Vec::new();
            for chunk in data.chunks(MAX_BLOCK_DATA_SIZE) {
                let leaf_bid = self.allocate_bid(false)?;
                let leaf = DataBlock::new(leaf_bid, chunk.to_vec())?;
                let mut buf = Vec::new();
                leaf.write(&mut buf).map_err(NdbError::Io)?;
                self.bbt_entries.push(BbtEntry {
                    block_id: leaf_bid,
                    byte_count: chunk.len() as u16,
                    ref_count: 1,
                });
                self.account_bytes(buf.len())?;
                self.blocks.push((leaf_bid, buf));
                child_ids.push(leaf_bid);
            }
            let tree_bid = self.allocate_bid(true)?;
            let tree = DataTreeBlock::new(tree_bid, 1, data.len() as u32, child_ids);
            let mut buf = Vec::new();
            tree.write(&mut buf).map_err(NdbError::Io)?;
            self.bbt_entries.push(BbtEntry {
                block_id: tree_bid,
                byte_count: buf.len() as u16,
                ref_count: 1,
            });
            self.account_bytes(buf.len())?;
            self.blocks.push((tree_bid, buf));
            Ok(tree_bid)
        }
    }

    /// Registers an already-encoded block (used by the `ltp` writer for HN
    /// pages, and the subnode writer for SLBLOCK/SIBLOCK chains) without
    /// going through [`Self::write_data_payload`]'s chunking.
    pub fn register_raw_block(&mut self, block_id: BlockId, encoded: Vec<u8>, data_len: u16) -> NdbResult<()> {
        self.bbt_entries.push(BbtEntry {
            block_id,
            byte_count: data_len,
            ref_count: 1,
        });
        self.account_bytes(encoded.len())?;
        self.blocks.push((block_id, encoded));
        Ok(())
    }

    pub fn next_block_id(&mut self, is_internal: bool) -> NdbResult<BlockId> {
        self.allocate_bid(is_internal)
    }

    fn bulk_load<Leaf: BTreeLeafCodec + Clone>(
        &mut self,
        mut entries: Vec<Leaf>,
        page_type: PageType,
    ) -> NdbResult<(BlockRef, Vec<(BlockId, Vec<u8>)>)> {
        entries.sort_by_key(|e| e.key());

        let max_leaf_entries = (PAGE_BODY_SIZE - PAGE_HEADER_SIZE) / Leaf::ENTRY_SIZE;
        let target_per_page =
            (max_leaf_entries * BULK_LOAD_FILL_NUMERATOR / BULK_LOAD_FILL_DENOMINATOR).max(1);

        let mut leaf_pages = Vec::new();
        let mut encoded_pages = Vec::new();
        for chunk in entries.chunks(target_per_page) {
            let block_id = self.allocate_bid(true)?;
            let page = BTreePage::Leaf {
                block_id,
                entries: chunk.to_vec(),
            };
            let mut buf = Vec::new();
            page.write(&mut buf, page_type).map_err(NdbError::Io)?;
            self.account_bytes(buf.len())?;
            let first_key = chunk[0].key();
            leaf_pages.push((first_key, block_id));
            encoded_pages.push((block_id, buf));
        }

        if leaf_pages.len() == 1 {
            let (_, block_id) = leaf_pages[0];
            return Ok((BlockRef::new(block_id, ByteIndex::new(0)), encoded_pages));
        }

        let max_intermediate_entries = (PAGE_BODY_SIZE - PAGE_HEADER_SIZE) / INTERMEDIATE_ENTRY_SIZE;
        if leaf_pages.len() > max_intermediate_entries {
            return Err(NdbError::InvalidBTreeEntryCount(leaf_pages.len() as u16));
        }

        let root_block_id = self.allocate_bid(true)?;
        let intermediate_entries: Vec<(u64, BlockRef)> = leaf_pages
            .into_iter()
            .map(|(key, block_id)| (key, BlockRef::new(block_id, ByteIndex::new(0))))
            .collect();
        let root_page = BTreePage::Intermediate {
            block_id: root_block_id,
            level: 1,
            entries: intermediate_entries,
        };
        let mut buf = Vec::new();
        root_page.write(&mut buf, page_type).map_err(NdbError::Io)?;
        self.account_bytes(buf.len())?;
        encoded_pages.push((root_block_id, buf));

        Ok((
            BlockRef::new(root_block_id, ByteIndex::new(0)),
            encoded_pages,
        ))
    }

    /// Lays out the header, every registered block/page, the bulk-loaded
    /// NBT/BBT, and a trailing run of Allocation Map pages (plus one
    /// Density List page indexing them), returning the complete PST byte
    /// stream. The AMap run covers every byte written ahead of it with a
    /// new page appended every [`AMAP_PAGE_GRANULARITY`] bytes of file
    /// growth; the header's `cbAMapFree` is set to the free-slot total
    /// across that run.
    pub fn finish(mut self) -> NdbResult<Vec<u8>> {
        let nbt_entries = std::mem::take(&mut self.nbt_entries);
        let (nbt_root, nbt_pages) = self.bulk_load(nbt_entries, PageType::NodeBTree)?;

        let bbt_entries = std::mem::take(&mut self.bbt_entries);
        let (bbt_root, bbt_pages) = self.bulk_load(bbt_entries, PageType::BlockBTree)?;

        let mut out = vec![0u8; HEADER_SIZE];
        let mut offset = HEADER_SIZE as u64;

        let mut locations: HashMap<BlockId, u64> = HashMap::new();
        for (block_id, buf) in self.blocks.iter().chain(nbt_pages.iter()).chain(bbt_pages.iter()) {
            locations.insert(*block_id, offset);
            out.extend_from_slice(buf);
            offset += buf.len() as u64;
        }

        let nbt_offset = *locations.get(nbt_root.block()).ok_or(NdbError::AllocationMapExhausted)?;
        let bbt_offset = *locations.get(bbt_root.block()).ok_or(NdbError::AllocationMapExhausted)?;

        let (amap_pages, amap_free_bytes, density_entries) = self.build_allocation_maps(offset)?;
        for (_, buf) in &amap_pages {
            out.extend_from_slice(buf);
            offset += buf.len() as u64;
        }

        let dlist_block_id = self.allocate_bid(true)?;
        let dlist_page = DensityListPage::new(dlist_block_id, density_entries);
        let mut dlist_buf = Vec::new();
        dlist_page.write(&mut dlist_buf).map_err(NdbError::Io)?;
        self.account_bytes(dlist_buf.len())?;
        out.extend_from_slice(&dlist_buf);
        offset += dlist_buf.len() as u64;

        let root = Root::new(
            ByteIndex::new(offset),
            BlockRef::new(*nbt_root.block(), ByteIndex::new(nbt_offset)),
            BlockRef::new(*bbt_root.block(), ByteIndex::new(bbt_offset)),
        );
        let next_block = BlockId::new(false, self.next_bid_index)?;
        let mut header = Header::new(offset / PAGE_SIZE as u64 + 1, next_block, root);
        header.amap_free_bytes = amap_free_bytes;

        let mut header_buf = Vec::new();
        header.write(&mut header_buf).map_err(NdbError::Io)?;
        out[0..HEADER_SIZE].copy_from_slice(&header_buf);

        super::verify::verify_pst(&out)?;
        tracing::debug!(bytes = out.len(), "pst readback verification passed");

        Ok(out)
    }

    /// Builds one Allocation Map page per [`AMAP_PAGE_GRANULARITY`]-byte
    /// span of `content_len` bytes already laid out (header, data blocks,
    /// and the NBT/BBT), marking every slot within that span allocated and
    /// every slot beyond it (up to the page's own span) free. Returns the
    /// encoded pages, the total free-byte count across them (for
    /// `cbAMapFree`), and one [`DensityListEntry`] per page.
    fn build_allocation_maps(
        &mut self,
        content_len: u64,
    ) -> NdbResult<(Vec<(BlockId, Vec<u8>)>, u64, Vec<DensityListEntry>)> {
        const SLOT_SIZE: u64 = 64;
        const SLOTS_PER_PAGE: u64 = AMAP_PAGE_GRANULARITY / SLOT_SIZE;

        let page_count = content_len.div_ceil(AMAP_PAGE_GRANULARITY).max(1);

        let mut pages = Vec::new();
        let mut density_entries = Vec::new();
        let mut total_free_bytes = 0u64;

        for page_number in 0..page_count {
            let span_start = page_number * AMAP_PAGE_GRANULARITY;
            let allocated_in_span = content_len.saturating_sub(span_start).min(AMAP_PAGE_GRANULARITY);
            let allocated_slots = allocated_in_span.div_ceil(SLOT_SIZE).min(SLOTS_PER_PAGE);

            let mut bitmap = vec![0u8; (SLOTS_PER_PAGE / 8) as usize];
            for slot in 0..allocated_slots {
                bitmap[(slot / 8) as usize] |= 1 << (slot % 8);
            }

            let free_slots = SLOTS_PER_PAGE - allocated_slots;
            total_free_bytes += free_slots * SLOT_SIZE;

            let block_id = self.allocate_bid(true)?;
            let page = AllocationMapPage::new(block_id, bitmap)?;
            let mut buf = Vec::new();
            page.write(&mut buf).map_err(NdbError::Io)?;
            self.account_bytes(buf.len())?;

            density_entries.push(DensityListEntry {
                page_number: page_number as u32,
                free_slots: free_slots as u32,
            });
            pages.push((block_id, buf));
        }

        Ok((pages, total_free_bytes, density_entries))
    }
}
