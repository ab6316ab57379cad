/// Plain transfer: meta frame, then exactly `size` raw bytes.
///
/// Chunk boundaries carry no meaning on the wire, so each side may use its own chunk size.

use std::io::{Read, Write};

use crate::error::{Result, TransferError};
use crate::logging::TransferLogger;
use crate::meta::{self, Meta};
use crate::protocol::ProtocolConfig;
use crate::session::{TransferSummary, Tracker};
use crate::stream::{read_some, send_all, socket_error};

/// Bytes to move in the next chunk.
#[inline]
pub(crate) fn next_chunk_len(chunk_size: usize, remaining: u64) -> usize {
    remaining.min(chunk_size as u64) as usize
}

/// Send the meta frame and `meta.size()` bytes read from `source`.
///
/// Never reads past the declared size. A source that ends early is `ShortSource`.
pub fn send<W, R>(
    socket: &mut W,
    meta: &Meta,
    source: &mut R,
    config: &ProtocolConfig,
    logger: &dyn TransferLogger,
) -> Result<TransferSummary>
where
    W: Write + ?Sized,
    R: Read + ?Sized,
{
    Tracker::new("sender", logger).run(|tracker| {
        config.validate()?;
        let frame = meta::write_frame(socket, meta, config)?;
        tracker.meta_done(meta, &frame, true);

        let total = meta.size();
        let mut buf = vec![0u8; config.chunk_size];
        let mut sent: u64 = 0;

        while sent < total {
            let want = next_chunk_len(config.chunk_size, total - sent);
            let n = read_some(source, &mut buf[..want])?;
            if n == 0 {
                return Err(TransferError::ShortSource {
                    read: sent,
                    expected: total,
                });
            }
            send_all(socket, &buf[..n], sent, total)?;
            sent += n as u64;
            tracker.chunk_done(n);
        }
        socket.flush().map_err(|e| socket_error(e, sent, total))?;
        Ok(meta.clone())
    })
}

/// Receive a meta frame and its body into `sink`.
///
/// A peer that closes before `size` bytes arrived is `ConnectionLost`; everything received up to
/// that point has already been written to `sink`.
pub fn receive<R, W>(
    socket: &mut R,
    sink: &mut W,
    config: &ProtocolConfig,
    logger: &dyn TransferLogger,
) -> Result<TransferSummary>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    Tracker::new("receiver", logger).run(|tracker| {
        config.validate()?;
        let frame = meta::read_frame(socket, config)?;
        let meta = meta::decode(&frame, config)?;
        tracker.meta_done(&meta, &frame, false);

        let total = meta.size();
        let mut buf = vec![0u8; config.chunk_size];
        let mut received: u64 = 0;

        while received < total {
            let want = next_chunk_len(config.chunk_size, total - received);
            let n = read_some(socket, &mut buf[..want])
                .map_err(|e| socket_error(e, received, total))?;
            if n == 0 {
                return Err(TransferError::ConnectionLost {
                    transferred: received,
                    expected: total,
                });
            }
            sink.write_all(&buf[..n])?;
            received += n as u64;
            tracker.chunk_done(n);
        }
        sink.flush()?;
        Ok(meta)
    })
}
