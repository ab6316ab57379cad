/// Secure transfer: meta frame in the clear, then AES-GCM sealed chunks.
///
/// ```text
/// [meta frame (64)] [ct_0 | tag_0] [ct_1 | tag_1] ... [ct_n | tag_n]
///
/// ct_i    = AES-GCM(key, nonce_i, plaintext_i), len(ct_i) = len(plaintext_i)
/// nonce_i = base255(i) over 12 bytes, i counting from 0 per session
/// ```
///
/// Every chunk but the last carries exactly `chunk_size` plaintext bytes, so both ends derive the
/// same chunk boundaries from `meta.size` alone. Sender and receiver must therefore agree on
/// `chunk_size`; a mismatch shows up as `AuthenticationFailed`, never as wrong output. How the
/// transport fragments the stream does not matter.
///
/// Nonces repeat across sessions. Never reuse one key for two sessions.

use std::io::{Read, Write};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit, Nonce};

use crate::error::{Result, TransferError};
use crate::logging::{TransferEvent, TransferLogger};
use crate::meta::{self, Meta};
use crate::plain::next_chunk_len;
use crate::protocol::{NONCE_SIZE, ProtocolConfig, TAG_SIZE};
use crate::session::{TransferSummary, Tracker};
use crate::stream::{fill, send_all, socket_error};
use crate::varint;

/// Deterministic nonce for chunk `index`: its base-255 digits, zero padded to 12 bytes.
pub fn chunk_nonce(index: u64) -> Result<[u8; NONCE_SIZE]> {
    let mut nonce = [0u8; NONCE_SIZE];
    varint::encode_into(index as u128, &mut nonce)?;
    Ok(nonce)
}

/// AES-GCM keyed for one session. The raw key is not retained.
pub enum ChunkCipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl ChunkCipher {
    /// Accepts 16-byte (AES-128) or 32-byte (AES-256) keys.
    pub fn new(key: &[u8]) -> Result<Self> {
        let cipher = match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map(Self::Aes128),
            32 => Aes256Gcm::new_from_slice(key).map(Self::Aes256),
            n => {
                return Err(TransferError::InvalidArgument(format!(
                    "key must be 16 or 32 bytes, got {}",
                    n
                )));
            }
        };
        cipher.map_err(|e| TransferError::InvalidArgument(format!("cipher init failed: {}", e)))
    }

    /// Encrypt one chunk. Output is `ciphertext || tag`.
    pub fn seal(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        let sealed = match self {
            Self::Aes128(c) => c.encrypt(nonce, plaintext),
            Self::Aes256(c) => c.encrypt(nonce, plaintext),
        };
        sealed
            .map_err(|e| TransferError::InvalidArgument(format!("chunk encryption failed: {}", e)))
    }

    /// Verify and decrypt `ciphertext || tag`. `None` if the tag does not match.
    pub fn open(&self, nonce: &[u8; NONCE_SIZE], sealed: &[u8]) -> Option<Vec<u8>> {
        if sealed.len() < TAG_SIZE {
            return None;
        }
        let nonce = Nonce::from_slice(nonce);
        match self {
            Self::Aes128(c) => c.decrypt(nonce, sealed).ok(),
            Self::Aes256(c) => c.decrypt(nonce, sealed).ok(),
        }
    }
}

/// Send the meta frame and `meta.size()` bytes from `source`, sealed chunk by chunk.
pub fn send<W, R>(
    socket: &mut W,
    meta: &Meta,
    source: &mut R,
    key: &[u8],
    config: &ProtocolConfig,
    logger: &dyn TransferLogger,
) -> Result<TransferSummary>
where
    W: Write + ?Sized,
    R: Read + ?Sized,
{
    Tracker::new("sender", logger).run(|tracker| {
        config.validate()?;
        let cipher = ChunkCipher::new(key)?;
        let frame = meta::write_frame(socket, meta, config)?;
        tracker.meta_done(meta, &frame, true);

        let total = meta.size();
        let mut sent: u64 = 0;
        let mut index: u64 = 0;

        while sent < total {
            // Fresh, exactly-sized buffer per chunk: nothing from a previous chunk can leak in.
            let mut chunk = vec![0u8; next_chunk_len(config.chunk_size, total - sent)];
            let n = fill(source, &mut chunk)?;
            if n < chunk.len() {
                return Err(TransferError::ShortSource {
                    read: sent + n as u64,
                    expected: total,
                });
            }

            let nonce = chunk_nonce(index)?;
            let sealed = cipher.seal(&nonce, &chunk)?;
            tracker.log(TransferEvent::ChunkSealed {
                index,
                nonce,
                len: chunk.len(),
            });

            send_all(socket, &sealed, sent, total)?;
            sent += chunk.len() as u64;
            index += 1;
            tracker.chunk_done(chunk.len());
        }
        socket.flush().map_err(|e| socket_error(e, sent, total))?;
        Ok(meta.clone())
    })
}

/// Receive a meta frame and its sealed body, writing authenticated plaintext to `sink`.
///
/// A chunk whose tag does not verify ends the session with `AuthenticationFailed`; none of its
/// bytes reach `sink`. Chunks before it were authenticated and have been written.
pub fn receive<R, W>(
    socket: &mut R,
    sink: &mut W,
    key: &[u8],
    config: &ProtocolConfig,
    logger: &dyn TransferLogger,
) -> Result<TransferSummary>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    Tracker::new("receiver", logger).run(|tracker| {
        config.validate()?;
        let cipher = ChunkCipher::new(key)?;
        let frame = meta::read_frame(socket, config)?;
        let meta = meta::decode(&frame, config)?;
        tracker.meta_done(&meta, &frame, false);

        let total = meta.size();
        let mut received: u64 = 0;
        let mut index: u64 = 0;

        while received < total {
            let plain_len = next_chunk_len(config.chunk_size, total - received);
            let mut sealed = vec![0u8; config.sealed_chunk_size(plain_len)];
            let got = fill(socket, &mut sealed).map_err(|e| socket_error(e, received, total))?;
            if got < sealed.len() {
                return Err(TransferError::ConnectionLost {
                    transferred: received,
                    expected: total,
                });
            }

            let nonce = chunk_nonce(index)?;
            let plaintext = cipher
                .open(&nonce, &sealed)
                .ok_or(TransferError::AuthenticationFailed { chunk: index })?;
            tracker.log(TransferEvent::ChunkOpened {
                index,
                len: plaintext.len(),
            });

            sink.write_all(&plaintext)?;
            received += plaintext.len() as u64;
            index += 1;
            tracker.chunk_done(plaintext.len());
        }
        sink.flush()?;
        Ok(meta)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{MemoryLogger, NullLogger};
    use std::io::Cursor;

    const KEY: [u8; 32] = [0x42; 32];

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    fn seal_stream(data: &[u8], cfg: &ProtocolConfig) -> Vec<u8> {
        let mut wire = Vec::new();
        send(
            &mut wire,
            &Meta::new("s", data.len() as u64),
            &mut Cursor::new(data),
            &KEY,
            cfg,
            &NullLogger,
        )
        .unwrap();
        wire
    }

    #[test]
    fn nonce_layout() {
        assert_eq!(chunk_nonce(0).unwrap(), [0; 12]);
        assert_eq!(chunk_nonce(1).unwrap(), [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(chunk_nonce(255).unwrap(), [0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(chunk_nonce(u64::MAX).is_ok());
    }

    #[test]
    fn cipher_rejects_odd_key_lengths() {
        assert!(ChunkCipher::new(&[0u8; 16]).is_ok());
        assert!(ChunkCipher::new(&[0u8; 32]).is_ok());
        assert!(matches!(
            ChunkCipher::new(&[0u8; 24]),
            Err(TransferError::InvalidArgument(_))
        ));
    }

    #[test]
    fn sealed_chunk_is_ciphertext_plus_tag() {
        let cipher = ChunkCipher::new(&KEY).unwrap();
        let nonce = chunk_nonce(0).unwrap();
        let sealed = cipher.seal(&nonce, b"hello").unwrap();
        assert_eq!(sealed.len(), 5 + TAG_SIZE);
        assert_eq!(cipher.open(&nonce, &sealed).unwrap(), b"hello");
        assert!(cipher.open(&chunk_nonce(1).unwrap(), &sealed).is_none());
        assert!(cipher.open(&nonce, &sealed[..10]).is_none());
    }

    #[test]
    fn roundtrip_boundary_sizes() {
        let cfg = ProtocolConfig::default();
        for len in [0, 1, 1024, 1025, 10_000] {
            let data = pattern(len);
            let wire = seal_stream(&data, &cfg);
            let chunks = len.div_ceil(1024);
            assert_eq!(wire.len(), 64 + len + chunks * TAG_SIZE);

            let mut sink = Vec::new();
            let summary =
                receive(&mut Cursor::new(wire), &mut sink, &KEY, &cfg, &NullLogger).unwrap();
            assert_eq!(sink, data, "len {}", len);
            assert_eq!(summary.chunks, chunks as u64);
        }
    }

    #[test]
    fn aes128_roundtrip() {
        let key = [9u8; 16];
        let cfg = ProtocolConfig::default();
        let data = pattern(2100);
        let mut wire = Vec::new();
        send(&mut wire, &Meta::new("k", 2100), &mut Cursor::new(&data), &key, &cfg, &NullLogger)
            .unwrap();
        let mut sink = Vec::new();
        receive(&mut Cursor::new(wire), &mut sink, &key, &cfg, &NullLogger).unwrap();
        assert_eq!(sink, data);
    }

    #[test]
    fn body_is_not_plaintext() {
        let data = vec![b'A'; 2048];
        let wire = seal_stream(&data, &ProtocolConfig::default());
        assert_ne!(&wire[64..64 + 1024], &data[..1024]);
    }

    #[test]
    fn flipped_tag_bit_stops_before_that_chunk() {
        let cfg = ProtocolConfig::default();
        let data = pattern(3000);
        let mut wire = seal_stream(&data, &cfg);

        // Last byte of chunk 1's tag.
        let tag_end = 64 + 2 * (1024 + TAG_SIZE) - 1;
        wire[tag_end] ^= 0x01;

        let mut sink = Vec::new();
        let err = receive(&mut Cursor::new(wire), &mut sink, &KEY, &cfg, &NullLogger).unwrap_err();
        assert!(matches!(err, TransferError::AuthenticationFailed { chunk: 1 }));
        assert_eq!(sink, &data[..1024]);
    }

    #[test]
    fn wrong_key_fails_first_chunk() {
        let cfg = ProtocolConfig::default();
        let wire = seal_stream(&pattern(10), &cfg);
        let mut sink = Vec::new();
        let err =
            receive(&mut Cursor::new(wire), &mut sink, &[0x43; 32], &cfg, &NullLogger).unwrap_err();
        assert!(matches!(err, TransferError::AuthenticationFailed { chunk: 0 }));
        assert!(sink.is_empty());
    }

    #[test]
    fn nonces_count_up_from_zero() {
        let logger = MemoryLogger::new();
        let mut wire = Vec::new();
        send(
            &mut wire,
            &Meta::new("n", 5000),
            &mut Cursor::new(pattern(5000)),
            &KEY,
            &ProtocolConfig::default(),
            &logger,
        )
        .unwrap();

        let nonces = logger.nonces();
        let expected: Vec<_> = (0..5u64).map(|i| chunk_nonce(i).unwrap()).collect();
        assert_eq!(nonces, expected);
        for (i, a) in nonces.iter().enumerate() {
            for b in &nonces[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn mismatched_chunk_size_is_detected() {
        let data = pattern(3000);
        let wire = seal_stream(&data, &ProtocolConfig::with_chunk_size(1024));
        let mut sink = Vec::new();
        let err = receive(
            &mut Cursor::new(wire),
            &mut sink,
            &KEY,
            &ProtocolConfig::with_chunk_size(512),
            &NullLogger,
        )
        .unwrap_err();
        assert!(matches!(err, TransferError::AuthenticationFailed { chunk: 0 }));
        assert!(sink.is_empty());
    }

    #[test]
    fn short_source_is_reported() {
        let mut wire = Vec::new();
        let err = send(
            &mut wire,
            &Meta::new("short", 2000),
            &mut Cursor::new(pattern(1500)),
            &KEY,
            &ProtocolConfig::default(),
            &NullLogger,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TransferError::ShortSource { read: 1500, expected: 2000 }
        ));
        // Only the first, complete chunk was sealed and sent.
        assert_eq!(wire.len(), 64 + 1024 + TAG_SIZE);
    }

    #[test]
    fn partial_chunk_is_connection_lost() {
        let cfg = ProtocolConfig::default();
        let data = pattern(3000);
        let mut wire = seal_stream(&data, &cfg);
        wire.truncate(64 + (1024 + TAG_SIZE) + 500);

        let mut sink = Vec::new();
        let err = receive(&mut Cursor::new(wire), &mut sink, &KEY, &cfg, &NullLogger).unwrap_err();
        assert!(matches!(
            err,
            TransferError::ConnectionLost { transferred: 1024, expected: 3000 }
        ));
        assert_eq!(sink, &data[..1024]);
    }

    #[test]
    fn invalid_key_sends_nothing() {
        let mut wire = Vec::new();
        let err = send(
            &mut wire,
            &Meta::new("x", 1),
            &mut Cursor::new(vec![1u8]),
            &[0u8; 7],
            &ProtocolConfig::default(),
            &NullLogger,
        )
        .unwrap_err();
        assert!(matches!(err, TransferError::InvalidArgument(_)));
        assert!(wire.is_empty());
    }
}
