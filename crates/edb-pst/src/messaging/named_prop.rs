//! [Name-to-ID Map](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/55a3d7dd-7a79-4cbc-ac9d-9f6ccd6cd4a4)
//!
//! Named properties (calendar fields in `PSETID_Appointment`, for example)
//! don't have a fixed 16-bit id; a PST assigns them one starting at
//! `0x8000` and records the `(GUID, name-or-lid) -> id` mapping under the
//! well-known `NID_NAME_TO_ID_MAP` node so a later reader can resolve them.

use super::{MessagingError, MessagingResult};

pub const PSETID_APPOINTMENT: [u8; 16] = [
    0x02, 0x20, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];
pub const PSETID_ADDRESS: [u8; 16] = [
    0x04, 0x20, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

pub const PID_LID_LOCATION: u32 = 0x8208;
pub const PID_LID_APPOINTMENT_START_WHOLE: u32 = 0x820D;
pub const PID_LID_APPOINTMENT_END_WHOLE: u32 = 0x820E;
pub const PID_LID_APPOINTMENT_ALL_DAY_EVENT: u32 = 0x8215;

/// Property id holding the encoded [`NamedPropertyMap`] blob on the
/// `NID_NAME_TO_ID_MAP` node's own Property Context. Outside the
/// `0x8000`-`0xFFFF` named-property range so it can never collide with an
/// id this same map assigns.
pub const PR_NAME_TO_ID_MAP_BLOB: u16 = 0x0001;

const FIRST_NAMED_PROP_ID: u16 = 0x8000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NamedPropertyKey {
    pub guid: [u8; 16],
    pub lid: u32,
}

#[derive(Clone, Debug, Default)]
pub struct NamedPropertyMap {
    entries: Vec<(NamedPropertyKey, u16)>,
}

impl NamedPropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the prop id already assigned to `key`, allocating the next
    /// free id starting at `0x8000` if this is the first request for it.
    pub fn resolve(&mut self, guid: [u8; 16], lid: u32) -> MessagingResult<u16> {
        let key = NamedPropertyKey { guid, lid };
        if let Some((_, id)) = self.entries.iter().find(|(k, _)| *k == key) {
            return Ok(*id);
        }
        let next_id = FIRST_NAMED_PROP_ID
            .checked_add(self.entries.len() as u16)
            .ok_or(MessagingError::NamedPropertyIdSpaceExhausted)?;
        self.entries.push((key, next_id));
        Ok(next_id)
    }

    /// Serializes the mapping table as a single binary blob, stored as one
    /// property on the `NID_NAME_TO_ID_MAP` node's property context.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.entries.len() * 22);
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for (key, id) in &self.entries {
            out.extend_from_slice(&key.guid);
            out.extend_from_slice(&key.lid.to_le_bytes());
            out.extend_from_slice(&id.to_le_bytes());
        }
        out
    }

    pub fn decode(data: &[u8]) -> MessagingResult<Self> {
        if data.len() < 4 {
            return Ok(Self::default());
        }
        let count = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
        let mut entries = Vec::with_capacity(count);
        let mut cursor = 4;
        for _ in 0..count {
            let mut guid = [0u8; 16];
            guid.copy_from_slice(&data[cursor..cursor + 16]);
            let lid = u32::from_le_bytes(data[cursor + 16..cursor + 20].try_into().unwrap());
            let id = u16::from_le_bytes(data[cursor + 20..cursor + 22].try_into().unwrap());
            entries.push((NamedPropertyKey { guid, lid }, id));
            cursor += 22;
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_assigns_sequential_ids_and_is_stable() {
        let mut map = NamedPropertyMap::new();
        let start = map
            .resolve(PSETID_APPOINTMENT, PID_LID_APPOINTMENT_START_WHOLE)
            .unwrap();
        let end = map
            .resolve(PSETID_APPOINTMENT, PID_LID_APPOINTMENT_END_WHOLE)
            .unwrap();
        assert_eq!(start, 0x8000);
        assert_eq!(end, 0x8001);

        let start_again = map
            .resolve(PSETID_APPOINTMENT, PID_LID_APPOINTMENT_START_WHOLE)
            .unwrap();
        assert_eq!(start_again, start);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut map = NamedPropertyMap::new();
        map.resolve(PSETID_APPOINTMENT, PID_LID_LOCATION).unwrap();
        let encoded = map.encode();
        let decoded = NamedPropertyMap::decode(&encoded).unwrap();
        assert_eq!(decoded.entries.len(), 1);
    }
}
