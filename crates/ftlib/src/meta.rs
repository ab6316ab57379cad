/// Meta frame: the fixed-size header that starts every transfer.
///
/// ```text
/// [0..name_size]          UTF-8 name, zero padded
/// [name_size..meta_size]  base-255 size, zero padded
/// ```
///
/// Names longer than the name region are truncated before encoding, on a UTF-8 boundary. This
/// is lossy: the receiver sees the shortened name. Names also end at the first byte below 33, so
/// a name containing a space or control byte comes back cut at that byte. Sizes are capped by
/// the length slot, `255^8 - 1` with the default layout.

use std::io::{ErrorKind, Read, Write};

use crate::error::{Result, TransferError};
use crate::protocol::{NAME_TERMINATOR_BELOW, ProtocolConfig};
use crate::stream::{read_some, socket_error};
use crate::varint;

/// Name and size of one transferable stream. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Meta {
    name: String,
    size: u64,
}

impl Meta {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Longest prefix of `name` that fits in `max` bytes without splitting a character.
pub fn truncate_name(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Encode `meta` into a header of `config.meta_size` bytes.
///
/// Fails with `InvalidArgument` if the size does not fit the length slot.
pub fn encode(meta: &Meta, config: &ProtocolConfig) -> Result<Vec<u8>> {
    config.validate()?;
    let name_size = config.name_size();
    let mut frame = vec![0u8; config.meta_size];

    let name = truncate_name(&meta.name, name_size);
    frame[..name.len()].copy_from_slice(name.as_bytes());

    varint::encode_into(meta.size as u128, &mut frame[name_size..])?;
    Ok(frame)
}

/// Decode a header produced by `encode`.
pub fn decode(frame: &[u8], config: &ProtocolConfig) -> Result<Meta> {
    config.validate()?;
    if frame.len() != config.meta_size {
        return Err(TransferError::MalformedFrame(format!(
            "expected {} bytes, got {}",
            config.meta_size,
            frame.len()
        )));
    }

    let (name_region, size_region) = frame.split_at(config.name_size());
    let end = name_region
        .iter()
        .position(|&b| b < NAME_TERMINATOR_BELOW)
        .unwrap_or(name_region.len());
    let name = std::str::from_utf8(&name_region[..end])
        .map_err(|e| TransferError::MalformedFrame(format!("name is not UTF-8: {}", e)))?;

    let size = varint::decode(size_region)
        .ok()
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| TransferError::MalformedFrame("size does not fit 64 bits".into()))?;

    Ok(Meta::new(name, size))
}

/// Read exactly one header from the socket.
///
/// Peer EOF before the header is complete is `ConnectionLost`. A transport timeout after part of
/// the header arrived is `MalformedFrame`; a timeout before any byte arrived is returned as `Io`.
pub fn read_frame<R: Read + ?Sized>(socket: &mut R, config: &ProtocolConfig) -> Result<Vec<u8>> {
    config.validate()?;
    let expected = config.meta_size as u64;
    let mut frame = vec![0u8; config.meta_size];
    let mut filled = 0;

    while filled < frame.len() {
        match read_some(socket, &mut frame[filled..]) {
            Ok(0) => {
                return Err(TransferError::ConnectionLost {
                    transferred: filled as u64,
                    expected,
                });
            }
            Ok(n) => filled += n,
            Err(e)
                if filled > 0
                    && matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                return Err(TransferError::MalformedFrame(format!(
                    "header stalled after {} of {} bytes",
                    filled, expected
                )));
            }
            Err(e) => return Err(socket_error(e, filled as u64, expected)),
        }
    }
    Ok(frame)
}

/// Encode and write one header. The header is written whole, before any body byte.
pub fn write_frame<W: Write + ?Sized>(
    socket: &mut W,
    meta: &Meta,
    config: &ProtocolConfig,
) -> Result<Vec<u8>> {
    let frame = encode(meta, config)?;
    socket
        .write_all(&frame)
        .map_err(|e| socket_error(e, 0, frame.len() as u64))?;
    Ok(frame)
}
