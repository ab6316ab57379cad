/// Blocking read/write helpers shared by the plain and secure loops.

use std::io::{self, ErrorKind, Read, Write};

use crate::error::{Result, TransferError};

/// True for I/O errors that mean the peer is gone.
pub(crate) fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::UnexpectedEof
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::WriteZero
    )
}

/// Map a socket error to `ConnectionLost` when it means disconnection.
pub(crate) fn socket_error(err: io::Error, transferred: u64, expected: u64) -> TransferError {
    if is_disconnect(&err) {
        TransferError::ConnectionLost { transferred, expected }
    } else {
        TransferError::Io(err)
    }
}

/// One read, retried on `Interrupted`.
pub(crate) fn read_some<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Read until `buf` is full or the reader hits EOF. Returns bytes read.
pub(crate) fn fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = read_some(reader, &mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Write all of `buf` to the socket. `sent`/`expected` describe body progress for error reporting.
pub(crate) fn send_all<W: Write + ?Sized>(
    socket: &mut W,
    buf: &[u8],
    sent: u64,
    expected: u64,
) -> Result<()> {
    socket
        .write_all(buf)
        .map_err(|e| socket_error(e, sent, expected))
}
