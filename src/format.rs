//! On-disk binary layouts for the `.msg` and `.idx` segment files.
//!
//! `.msg`: `MAGIC (8) | VERSION (1) | ( size:u32 | id:u64 | payload:size )*`
//! `.idx`: packed array of 20-byte records `(id:u64, offset:u64, size:u32)`.
//!
//! All multi-byte integers are little-endian. Bit-exact adherence to this
//! layout is required for on-disk compatibility.

pub const MAGIC: [u8; 8] = [0x42, 0xF9, 0xB4, 0x6C, 0x52, 0x4B, 0xDE, 0xB6];
pub const VERSION: u8 = 0x01;
pub const HEADER_SIZE: u64 = MAGIC.len() as u64 + 1;

/// Size in bytes of the `size:u32 | id:u64` frame preceding every payload.
pub const MESSAGE_FRAME_SIZE: u64 = 12;

/// Size in bytes of a single packed index record.
pub const INDEX_RECORD_SIZE: u64 = 20;

/// One 20-byte `.idx` record: where a message lives and how big it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub id: u64,
    pub offset: u64,
    pub size: u32,
}

impl IndexRecord {
    pub fn encode(&self) -> [u8; INDEX_RECORD_SIZE as usize] {
        let mut buf = [0u8; INDEX_RECORD_SIZE as usize];
        buf[0..8].copy_from_slice(&self.id.to_le_bytes());
        buf[8..16].copy_from_slice(&self.offset.to_le_bytes());
        buf[16..20].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> IndexRecord {
        debug_assert_eq!(buf.len(), INDEX_RECORD_SIZE as usize);
        IndexRecord {
            id: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            offset: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            size: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
        }
    }
}

/// Encodes the `size:u32 | id:u64` frame that precedes every payload in a
/// `.msg` file.
pub fn encode_message_frame(id: u64, size: u32) -> [u8; MESSAGE_FRAME_SIZE as usize] {
    let mut buf = [0u8; MESSAGE_FRAME_SIZE as usize];
    buf[0..4].copy_from_slice(&size.to_le_bytes());
    buf[4..12].copy_from_slice(&id.to_le_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_record_round_trips() {
        let record = IndexRecord {
            id: 42,
            offset: 1337,
            size: 9,
        };
        let encoded = record.encode();
        assert_eq!(encoded.len(), INDEX_RECORD_SIZE as usize);
        assert_eq!(IndexRecord::decode(&encoded), record);
    }

    #[test]
    fn message_frame_is_little_endian() {
        let frame = encode_message_frame(1, 2);
        assert_eq!(u32::from_le_bytes(frame[0..4].try_into().unwrap()), 2);
        assert_eq!(u64::from_le_bytes(frame[4..12].try_into().unwrap()), 1);
    }
}
