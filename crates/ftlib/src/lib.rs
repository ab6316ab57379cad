/// ftlib: named byte-stream transfer over a reliable stream socket.
///
/// Every transfer is:
/// - a 64-byte meta frame (name + base-255 size)
/// - the body, either raw or as AES-GCM sealed 1 KB chunks with counter-derived nonces
///
/// Transfers are blocking and single-threaded: one call moves one stream and returns when the
/// declared size has been moved, the peer disconnects, or a chunk fails authentication.

pub mod error;
pub mod files;
pub mod keys;
pub mod logging;
pub mod meta;
pub mod plain;
pub mod protocol;
pub mod secure;
pub mod session;
mod stream;
pub mod varint;

// Re-export key types for convenience.
pub use error::{Result, TransferError};
pub use files::{ReceivedFile, receive_file, send_file};
pub use keys::{generate_key, key_from_base64, key_to_base64};
pub use logging::{
    LevelMask, LogLevel, MemoryLogger, NullLogger, TracingLogger, TransferEvent, TransferLog,
    TransferLogger, WriterLogger,
};
pub use meta::Meta;
pub use protocol::{
    FILE_BUFFER_SIZE, LENGTH_BUFFER_SIZE, META_BUFFER_SIZE, NAME_BUFFER_SIZE, NONCE_SIZE,
    ProtocolConfig, TAG_SIZE,
};
pub use secure::{ChunkCipher, chunk_nonce};
pub use session::{TransferMode, TransferSession, TransferState, TransferSummary};
