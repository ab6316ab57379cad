/// Wire layout shared by both ends of a transfer.
///
/// ```text
/// MetaFrame (64 bytes)
/// [0..56]   Name, UTF-8, ends at the first byte < 33, zero padded
/// [56..64]  Size, base-255 little-endian digits, zero padded
///
/// Plain body:   size raw bytes
/// Secure body:  repeated [ciphertext (<= chunk_size)][tag (16)]
///               chunk i is sealed with nonce = base255(i) over 12 bytes
/// ```

use crate::error::{Result, TransferError};

/// Total header size in bytes.
pub const META_BUFFER_SIZE: usize = 64;

/// Bytes reserved at the end of the header for the encoded size.
pub const LENGTH_BUFFER_SIZE: usize = 8;

/// Bytes reserved at the start of the header for the name.
pub const NAME_BUFFER_SIZE: usize = META_BUFFER_SIZE - LENGTH_BUFFER_SIZE;

/// Body chunk size: 1 KB of plaintext per read/write cycle.
pub const FILE_BUFFER_SIZE: usize = 1024;

/// AES-GCM authentication tag size.
pub const TAG_SIZE: usize = 16;

/// AES-GCM nonce size. Chunk indices are base-255 encoded into this many bytes.
pub const NONCE_SIZE: usize = 12;

/// Name bytes below this value terminate the name (space and control bytes).
pub const NAME_TERMINATOR_BELOW: u8 = 33;

/// Largest slot the varint codec can fill without overflowing its `u128` accumulator.
const MAX_LENGTH_BUFFER_SIZE: usize = 16;

/// Frame layout and chunking parameters. Sender and receiver must use the same record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Total header size.
    pub meta_size: usize,
    /// Size slot at the end of the header.
    pub length_size: usize,
    /// Plaintext bytes per body chunk.
    pub chunk_size: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            meta_size: META_BUFFER_SIZE,
            length_size: LENGTH_BUFFER_SIZE,
            chunk_size: FILE_BUFFER_SIZE,
        }
    }
}

impl ProtocolConfig {
    /// Default layout with a different chunk size.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }

    /// Bytes available for the name.
    #[inline]
    pub fn name_size(&self) -> usize {
        self.meta_size - self.length_size
    }

    /// Size of one secure chunk on the wire for `plaintext_len` bytes of payload.
    #[inline]
    pub fn sealed_chunk_size(&self, plaintext_len: usize) -> usize {
        plaintext_len + TAG_SIZE
    }

    /// Reject layouts that cannot carry a frame.
    pub fn validate(&self) -> Result<()> {
        if self.length_size == 0 || self.length_size > MAX_LENGTH_BUFFER_SIZE {
            return Err(TransferError::InvalidArgument(format!(
                "length slot must be 1..={} bytes, got {}",
                MAX_LENGTH_BUFFER_SIZE, self.length_size
            )));
        }
        if self.length_size >= self.meta_size {
            return Err(TransferError::InvalidArgument(format!(
                "length slot ({}) leaves no room for a name in a {}-byte frame",
                self.length_size, self.meta_size
            )));
        }
        if self.chunk_size == 0 {
            return Err(TransferError::InvalidArgument("chunk size must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_wire() {
        let cfg = ProtocolConfig::default();
        assert_eq!(cfg.meta_size, 64);
        assert_eq!(cfg.length_size, 8);
        assert_eq!(cfg.name_size(), 56);
        assert_eq!(cfg.chunk_size, 1024);
        assert_eq!(cfg.sealed_chunk_size(1024), 1040);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_layouts() {
        let no_name = ProtocolConfig {
            meta_size: 8,
            length_size: 8,
            chunk_size: 1024,
        };
        assert!(matches!(no_name.validate(), Err(TransferError::InvalidArgument(_))));

        let zero_chunk = ProtocolConfig::with_chunk_size(0);
        assert!(matches!(zero_chunk.validate(), Err(TransferError::InvalidArgument(_))));

        let wide_slot = ProtocolConfig {
            meta_size: 64,
            length_size: 17,
            chunk_size: 1024,
        };
        assert!(wide_slot.validate().is_err());
    }
}
