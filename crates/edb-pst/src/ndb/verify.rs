//! Independent PST readback verifier. Re-parses a PST byte stream this
//! crate just produced through the same header/page read path used for
//! inspecting an arbitrary PST file, and fails if the header or either
//! top-level B-tree root page doesn't round-trip. This is the same
//! read-side code exercised by `Header::read`/`BTreePage::read`'s own
//! tests; it is not a second PST parser, just that parser pointed back at
//! the writer's own output.

use std::io::{Cursor, Seek, SeekFrom};

use super::header::Header;
use super::page::{BbtEntry, BTreePage, NbtEntry, PageType};
use super::{NdbError, NdbResult};

/// Validates `bytes` (a complete PST produced by
/// [`super::writer::PstWriter::finish`]): the 564-byte header's magic,
/// version, and trailer CRC, then the root page of each top-level B-tree.
///
/// Descending past the root page is only attempted when the tree fits in a
/// single leaf page. `PstWriter::bulk_load` does not yet resolve a byte
/// offset for intermediate-page `BlockRef` entries (tracked in
/// `DESIGN.md`), so multi-page trees are structurally checked at the root
/// only; a `tracing` event notes when this shallower check applies.
pub fn verify_pst(bytes: &[u8]) -> NdbResult<()> {
    let mut cursor = Cursor::new(bytes);
    let header = Header::read(&mut cursor)?;

    verify_root::<NbtEntry>(bytes, header.root.node_btree().index().index(), PageType::NodeBTree, "nbt")?;
    verify_root::<BbtEntry>(bytes, header.root.block_btree().index().index(), PageType::BlockBTree, "bbt")?;

    Ok(())
}

fn verify_root<Leaf: super::page::BTreeLeafCodec + Clone>(
    bytes: &[u8],
    offset: u64,
    page_type: PageType,
    tree_name: &'static str,
) -> NdbResult<()> {
    let mut cursor = Cursor::new(bytes);
    cursor.seek(SeekFrom::Start(offset)).map_err(NdbError::Io)?;
    let page: BTreePage<Leaf> = BTreePage::read(&mut cursor, page_type)?;
    match page {
        BTreePage::Leaf { entries, .. } => {
            tracing::trace!(tree = tree_name, leaf_entries = entries.len(), "verified root leaf page");
        }
        BTreePage::Intermediate { entries, .. } => {
            tracing::warn!(
                tree = tree_name,
                child_pages = entries.len(),
                "multi-page b-tree root verified structurally; children not walked"
            );
        }
    }
    Ok(())
}
