//! Glue between the LTP layer's in-memory builders and the NDB layer's
//! node/block allocator.

use super::prop_context::PropertyContext;
use super::table_context::TableContext;
use super::LtpResult;
use crate::ndb::node_id::NodeId;
use crate::ndb::writer::PstWriter;

pub fn write_property_context(
    writer: &mut PstWriter,
    node_id: NodeId,
    parent_node_id: NodeId,
    pc: PropertyContext,
) -> LtpResult<()> {
    let encoded = pc.finish();
    writer.write_node_data(node_id, parent_node_id, &encoded)?;
    Ok(())
}

pub fn write_table_context(
    writer: &mut PstWriter,
    node_id: NodeId,
    parent_node_id: NodeId,
    tc: TableContext,
) -> LtpResult<()> {
    let encoded = tc.finish();
    writer.write_node_data(node_id, parent_node_id, &encoded)?;
    Ok(())
}
