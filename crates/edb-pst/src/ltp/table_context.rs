//! [TC (Table Context)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/d0e6fbf8-ed2b-4a8d-bbb5-0fb3b3683d69)
//!
//! A column-described row matrix: `TCINFO` (signature, column descriptors)
//! plus the row data itself, both stored as heap items on the same HN the
//! [`super::prop_context::PropertyContext`] would use for a non-tabular
//! node. Every cell is a 4-byte slot exactly like a PC record's value:
//! inline for small fixed types, a [`HeapId`] indirection otherwise.

use super::heap::{HeapId, HeapNodeType, HeapOnNode};
use super::prop_type::PropertyType;
use super::{LtpError, LtpResult};

const TC_SIGNATURE: u8 = 0x7C;

#[derive(Clone, Copy, Debug)]
pub struct ColumnDescriptor {
    pub prop_id: u16,
    pub prop_type: PropertyType,
}

#[derive(Clone, Copy, Debug, Default)]
struct Cell {
    present: bool,
    value: [u8; 4],
}

#[derive(Clone, Debug)]
pub struct TableContext {
    heap: HeapOnNode,
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Vec<Cell>>,
}

impl TableContext {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            heap: HeapOnNode::new(HeapNodeType::Table),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, prop_id: u16) -> LtpResult<usize> {
        self.columns
            .iter()
            .position(|c| c.prop_id == prop_id)
            .ok_or(LtpError::ColumnNotFound(prop_id as u32))
    }

    /// Appends a row. `values` must supply one entry per column in
    /// `self.columns`'s order; `None` marks the cell absent.
    pub fn add_row(&mut self, values: Vec<Option<&[u8]>>) -> LtpResult<()> {
        if values.len() != self.columns.len() {
            return Err(LtpError::ColumnNotFound(values.len() as u32));
        }
        let mut row = Vec::with_capacity(self.columns.len());
        for (column, value) in self.columns.iter().zip(values.into_iter()) {
            let cell = match value {
                None => Cell::default(),
                Some(bytes) => {
                    let slot = match column.prop_type.fixed_size() {
                        Some(size) if size <= 4 => {
                            let mut slot = [0u8; 4];
                            slot[..size].copy_from_slice(&bytes[..size]);
                            slot
                        }
                        _ => {
                            let hid = self.heap.allocate(bytes.to_vec())?;
                            u32::from(hid).to_le_bytes()
                        }
                    };
                    Cell {
                        present: true,
                        value: slot,
                    }
                }
            };
            row.push(cell);
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn get_cell(&self, row: usize, prop_id: u16) -> LtpResult<Option<Vec<u8>>> {
        let col_index = self.column_index(prop_id)?;
        let column = &self.columns[col_index];
        let cell = self
            .rows
            .get(row)
            .ok_or(LtpError::RowIndexOutOfRange(row as u32))?
            .get(col_index)
            .ok_or(LtpError::ColumnNotFound(prop_id as u32))?;
        if !cell.present {
            return Ok(None);
        }
        match column.prop_type.fixed_size() {
            Some(size) if size <= 4 => Ok(Some(cell.value[..size].to_vec())),
            _ => {
                let hid = HeapId::from(u32::from_le_bytes(cell.value));
                Ok(Some(self.heap.get(hid)?.to_vec()))
            }
        }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn finish(mut self) -> Vec<u8> {
        let mut tcinfo = Vec::new();
        tcinfo.push(TC_SIGNATURE);
        tcinfo.extend_from_slice(&(self.columns.len() as u16).to_le_bytes());
        for column in &self.columns {
            tcinfo.extend_from_slice(&column.prop_id.to_le_bytes());
            tcinfo.extend_from_slice(&u16::from(column.prop_type).to_le_bytes());
        }

        tcinfo.extend_from_slice(&(self.rows.len() as u32).to_le_bytes());
        for row in &self.rows {
            for cell in row {
                tcinfo.push(if cell.present { 1 } else { 0 });
                tcinfo.extend_from_slice(&cell.value);
            }
        }

        let hid = self.heap.allocate(tcinfo).expect("tcinfo always fits");
        self.heap.set_user_root(hid);
        self.heap.encode()
    }

    pub fn parse(data: &[u8]) -> LtpResult<Self> {
        let heap = HeapOnNode::decode(data)?;
        let tcinfo = heap.get(heap.user_root())?;
        if tcinfo.is_empty() || tcinfo[0] != TC_SIGNATURE {
            return Err(LtpError::InvalidHeapNodeTypeSignature(
                tcinfo.first().copied().unwrap_or(0),
            ));
        }

        let column_count = u16::from_le_bytes(tcinfo[1..3].try_into().unwrap()) as usize;
        let mut columns = Vec::with_capacity(column_count);
        let mut cursor = 3;
        for _ in 0..column_count {
            let prop_id = u16::from_le_bytes(tcinfo[cursor..cursor + 2].try_into().unwrap());
            let prop_type_raw = u16::from_le_bytes(tcinfo[cursor + 2..cursor + 4].try_into().unwrap());
            columns.push(ColumnDescriptor {
                prop_id,
                prop_type: PropertyType::try_from(prop_type_raw)?,
            });
            cursor += 4;
        }

        let row_count = u32::from_le_bytes(tcinfo[cursor..cursor + 4].try_into().unwrap()) as usize;
        cursor += 4;
        let mut rows = Vec::with_capacity(row_count);
        for _ in 0..row_count {
            let mut row = Vec::with_capacity(column_count);
            for _ in 0..column_count {
                let present = tcinfo[cursor] != 0;
                let mut value = [0u8; 4];
                value.copy_from_slice(&tcinfo[cursor + 1..cursor + 5]);
                row.push(Cell { present, value });
                cursor += 5;
            }
            rows.push(row);
        }

        Ok(Self {
            heap,
            columns,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_context_round_trip() {
        let columns = vec![
            ColumnDescriptor {
                prop_id: 0x3001,
                prop_type: PropertyType::Unicode,
            },
            ColumnDescriptor {
                prop_id: 0x0E06,
                prop_type: PropertyType::Time,
            },
        ];
        let mut tc = TableContext::new(columns);

        let name: Vec<u8> = "Inbox".encode_utf16().flat_map(u16::to_le_bytes).collect();
        tc.add_row(vec![Some(&name), Some(&1234567890i64.to_le_bytes())])
            .unwrap();
        tc.add_row(vec![None, None]).unwrap();

        let encoded = tc.finish();
        let parsed = TableContext::parse(&encoded).unwrap();

        assert_eq!(parsed.row_count(), 2);
        let cell = parsed.get_cell(0, 0x3001).unwrap().unwrap();
        let units: Vec<u16> = cell.chunks(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
        assert_eq!(String::from_utf16(&units).unwrap(), "Inbox");

        assert!(parsed.get_cell(1, 0x3001).unwrap().is_none());
    }

    #[test]
    fn test_column_not_found() {
        let tc = TableContext::new(vec![]);
        assert!(matches!(
            tc.column_index(0x9999),
            Err(LtpError::ColumnNotFound(_))
        ));
    }
}
