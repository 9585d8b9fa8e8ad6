//! [PC (Property Context)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/a3fadb10-1661-4f28-b1dc-22261bdbd1b4)
//!
//! A BTree-on-Heap keyed by 16-bit property id, each record holding a
//! property type and a 4-byte value slot: either the value itself (fixed
//! types no wider than 4 bytes) or a [`HeapId`] pointing at a larger heap
//! item (wider fixed types, and every variable-length type).

use super::heap::{HeapId, HeapNodeType, HeapOnNode};
use super::prop_type::PropertyType;
use super::{LtpError, LtpResult};

const BTH_SIGNATURE: u8 = 0xB5;
const BTH_KEY_SIZE: u8 = 2;
const BTH_ENTRY_SIZE: u8 = 6;

/// Heap items wider than this are rejected with [`LtpError::LongValueMissing`]
/// rather than silently truncated; callers needing larger payloads (e.g. an
/// attachment's binary body) should route them through a subnode instead of
/// a direct PC property.
pub const MAX_INLINE_HEAP_ITEM: usize = 3800;

#[derive(Clone, Copy, Debug)]
pub struct PropertyRecord {
    pub prop_id: u16,
    pub prop_type: PropertyType,
    pub value: [u8; 4],
}

#[derive(Clone, Debug)]
pub struct PropertyContext {
    heap: HeapOnNode,
    records: Vec<PropertyRecord>,
}

impl PropertyContext {
    pub fn new() -> Self {
        Self {
            heap: HeapOnNode::new(HeapNodeType::Properties),
            records: Vec::new(),
        }
    }

    pub fn set_property(
        &mut self,
        prop_id: u16,
        prop_type: PropertyType,
        bytes: &[u8],
    ) -> LtpResult<()> {
        let value = match prop_type.fixed_size() {
            Some(size) if size <= 4 => {
                let mut slot = [0u8; 4];
                slot[..size].copy_from_slice(&bytes[..size]);
                slot
            }
            _ => {
                if bytes.len() > MAX_INLINE_HEAP_ITEM {
                    return Err(LtpError::LongValueMissing);
                }
                let hid = self.heap.allocate(bytes.to_vec())?;
                u32::from(hid).to_le_bytes()
            }
        };

        self.records.retain(|r| r.prop_id != prop_id);
        self.records.push(PropertyRecord {
            prop_id,
            prop_type,
            value,
        });
        self.records.sort_by_key(|r| r.prop_id);
        Ok(())
    }

    pub fn get_property(&self, prop_id: u16) -> LtpResult<(PropertyType, Vec<u8>)> {
        let record = self
            .records
            .iter()
            .find(|r| r.prop_id == prop_id)
            .ok_or(LtpError::PropertyNotFound(prop_id as u32))?;

        match record.prop_type.fixed_size() {
            Some(size) if size <= 4 => Ok((record.prop_type, record.value[..size].to_vec())),
            _ => {
                let hid = HeapId::from(u32::from_le_bytes(record.value));
                Ok((record.prop_type, self.heap.get(hid)?.to_vec()))
            }
        }
    }

    pub fn properties(&self) -> impl Iterator<Item = u16> + '_ {
        self.records.iter().map(|r| r.prop_id)
    }

    /// Finalizes the BTH (header + sorted record array) as one heap item,
    /// sets it as the heap's user root, and returns the encoded block.
    pub fn finish(mut self) -> Vec<u8> {
        let mut bth = Vec::with_capacity(4 + self.records.len() * 8);
        bth.push(BTH_SIGNATURE);
        bth.push(BTH_KEY_SIZE);
        bth.push(BTH_ENTRY_SIZE);
        bth.push(0); // cLevels: single-level BTH only

        for record in &self.records {
            bth.extend_from_slice(&record.prop_id.to_le_bytes());
            bth.extend_from_slice(&u16::from(record.prop_type).to_le_bytes());
            bth.extend_from_slice(&record.value);
        }

        let hid = self.heap.allocate(bth).expect("bth item always fits");
        self.heap.set_user_root(hid);
        self.heap.encode()
    }

    pub fn parse(data: &[u8]) -> LtpResult<Self> {
        let heap = HeapOnNode::decode(data)?;
        let bth = heap.get(heap.user_root())?;

        if bth.len() < 4 || bth[0] != BTH_SIGNATURE {
            return Err(LtpError::InvalidBthKeySize(bth.first().copied().unwrap_or(0)));
        }
        let key_size = bth[1];
        let entry_size = bth[2];
        let levels = bth[3];
        if key_size != BTH_KEY_SIZE {
            return Err(LtpError::InvalidBthKeySize(key_size));
        }
        if entry_size != BTH_ENTRY_SIZE {
            return Err(LtpError::InvalidBthEntrySize(entry_size));
        }
        if levels != 0 {
            return Err(LtpError::InvalidBthLevels(levels));
        }

        let record_size = (key_size + entry_size) as usize;
        let mut records = Vec::new();
        let mut cursor = 4;
        while cursor + record_size <= bth.len() {
            let prop_id = u16::from_le_bytes(bth[cursor..cursor + 2].try_into().unwrap());
            let prop_type_raw = u16::from_le_bytes(bth[cursor + 2..cursor + 4].try_into().unwrap());
            let prop_type = PropertyType::try_from(prop_type_raw)?;
            let mut value = [0u8; 4];
            value.copy_from_slice(&bth[cursor + 4..cursor + 8]);
            records.push(PropertyRecord {
                prop_id,
                prop_type,
                value,
            });
            cursor += record_size;
        }

        Ok(Self { heap, records })
    }
}

impl Default for PropertyContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_context_round_trip_fixed_and_variable() {
        let mut pc = PropertyContext::new();
        pc.set_property(0x3001, PropertyType::Integer32, &100i32.to_le_bytes())
            .unwrap();
        pc.set_property(
            0x3003,
            PropertyType::Unicode,
            "Jane Doe".encode_utf16().flat_map(u16::to_le_bytes).collect::<Vec<u8>>().as_slice(),
        )
        .unwrap();

        let encoded = pc.finish();
        let parsed = PropertyContext::parse(&encoded).unwrap();

        let (ty, bytes) = parsed.get_property(0x3001).unwrap();
        assert_eq!(ty, PropertyType::Integer32);
        assert_eq!(i32::from_le_bytes(bytes.try_into().unwrap()), 100);

        let (ty, bytes) = parsed.get_property(0x3003).unwrap();
        assert_eq!(ty, PropertyType::Unicode);
        let units: Vec<u16> = bytes
            .chunks(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(String::from_utf16(&units).unwrap(), "Jane Doe");
    }

    #[test]
    fn test_property_not_found() {
        let pc = PropertyContext::new();
        assert!(matches!(
            pc.get_property(0x9999),
            Err(LtpError::PropertyNotFound(_))
        ));
    }

    #[test]
    fn test_oversized_value_rejected() {
        let mut pc = PropertyContext::new();
        let big = vec![0u8; MAX_INLINE_HEAP_ITEM + 1];
        assert!(matches!(
            pc.set_property(0x3001, PropertyType::Binary, &big),
            Err(LtpError::LongValueMissing)
        ));
    }
}
