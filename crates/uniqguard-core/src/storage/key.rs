//! Row key encoding.

use std::fmt;

/// Size of a row identity in bytes (UUID).
pub const ROW_ID_SIZE: usize = 16;

/// Row identity.
pub type RowId = [u8; ROW_ID_SIZE];

/// A row key combining the entity name and the row identity.
///
/// Key format: `[entity name (utf-8)][0x00][row id (16 bytes)]`
///
/// The null separator keeps every row of an entity under one scan prefix.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    /// Entity name.
    pub entity: String,

    /// Row identity.
    pub id: RowId,
}

impl RowKey {
    /// Create a new row key.
    pub fn new(entity: impl Into<String>, id: RowId) -> Self {
        Self {
            entity: entity.into(),
            id,
        }
    }

    /// Encode the key to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Self::entity_prefix(&self.entity);
        buf.extend_from_slice(&self.id);
        buf
    }

    /// Decode a key from bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let split = bytes.len().checked_sub(ROW_ID_SIZE + 1)?;
        if bytes[split] != 0 {
            return None;
        }
        let entity = std::str::from_utf8(&bytes[..split]).ok()?;

        let mut id = [0u8; ROW_ID_SIZE];
        id.copy_from_slice(&bytes[split + 1..]);

        Some(Self::new(entity, id))
    }

    /// Get the prefix for scanning all rows of an entity.
    pub fn entity_prefix(entity: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(entity.len() + 1 + ROW_ID_SIZE);
        prefix.extend_from_slice(entity.as_bytes());
        prefix.push(0);
        prefix
    }
}

impl fmt::Debug for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowKey")
            .field("entity", &self.entity)
            .field("id", &hex::encode(self.id))
            .finish()
    }
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let id = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

        let key = RowKey::new("Author", id);
        let encoded = key.encode();
        assert_eq!(&encoded[..7], b"Author\0");
        assert_eq!(RowKey::decode(&encoded).unwrap(), key);
    }

    #[test]
    fn test_prefix_isolates_entities() {
        let author = RowKey::new("Author", [0xff; 16]).encode();
        let authority = RowKey::new("Authority", [0; 16]).encode();

        assert!(author.starts_with(&RowKey::entity_prefix("Author")));
        assert!(!authority.starts_with(&RowKey::entity_prefix("Author")));
    }

    #[test]
    fn test_decode_invalid() {
        assert!(RowKey::decode(&[0u8; 10]).is_none());

        let mut missing_separator = b"Author".to_vec();
        missing_separator.extend_from_slice(&[1u8; 17]);
        assert!(RowKey::decode(&missing_separator).is_none());
    }
}
