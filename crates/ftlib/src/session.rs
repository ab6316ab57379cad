/// One-shot transfer sessions.
///
/// A session moves exactly one stream: meta frame first, then the body, plain or sealed. It is
/// consumed by its first `send` or `receive`; the secure chunk counter therefore always starts at
/// zero and never restarts within a session.
///
/// Reusing one key across several secure sessions repeats nonces (every session counts from 0).
/// Callers that keep a long-lived key must derive a fresh per-session key out of band.

use std::fmt;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use crate::error::{Result, TransferError};
use crate::logging::{TransferEvent, TransferLog, TransferLogger};
use crate::meta::Meta;
use crate::protocol::ProtocolConfig;
use crate::{plain, secure};

/// Transfer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    AwaitingMeta,
    Transferring,
    Complete,
    Aborted,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AwaitingMeta => "awaiting_meta",
            Self::Transferring => "transferring",
            Self::Complete => "complete",
            Self::Aborted => "aborted",
        })
    }
}

/// Body protection for a session. The key stays owned by the caller.
#[derive(Clone, Copy)]
pub enum TransferMode<'k> {
    Plain,
    /// AES-GCM with a 16- or 32-byte key.
    Secure(&'k [u8]),
}

impl fmt::Debug for TransferMode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("Plain"),
            Self::Secure(key) => write!(f, "Secure(<{} byte key>)", key.len()),
        }
    }
}

/// Outcome of a completed transfer.
#[derive(Debug, Clone)]
pub struct TransferSummary {
    pub meta: Meta,
    /// Body chunks moved (socket reads/writes in plain mode, sealed chunks in secure mode).
    pub chunks: u64,
    pub elapsed: Duration,
}

/// Progress bookkeeping and lifecycle logging for one direction of a transfer.
pub(crate) struct Tracker<'a> {
    component: &'static str,
    logger: &'a dyn TransferLogger,
    state: TransferState,
    name: String,
    done: u64,
    total: u64,
    chunks: u64,
    started: Instant,
}

impl<'a> Tracker<'a> {
    pub(crate) fn new(component: &'static str, logger: &'a dyn TransferLogger) -> Self {
        Self {
            component,
            logger,
            state: TransferState::AwaitingMeta,
            name: String::new(),
            done: 0,
            total: 0,
            chunks: 0,
            started: Instant::now(),
        }
    }

    pub(crate) fn log(&self, event: TransferEvent) {
        self.logger.log(TransferLog {
            component: self.component,
            name: &self.name,
            event,
        });
    }

    /// Header is on the wire (sender) or decoded (receiver); the body phase begins.
    pub(crate) fn meta_done(&mut self, meta: &Meta, frame: &[u8], sent: bool) {
        self.name = meta.name().to_string();
        self.total = meta.size();
        self.state = TransferState::Transferring;
        self.log(TransferEvent::FrameBytes {
            hex: hex::encode(frame),
        });
        self.log(if sent {
            TransferEvent::MetaSent { size: meta.size() }
        } else {
            TransferEvent::MetaReceived { size: meta.size() }
        });
    }

    pub(crate) fn chunk_done(&mut self, bytes: usize) {
        self.done += bytes as u64;
        self.log(TransferEvent::ChunkTransferred {
            index: self.chunks,
            bytes,
            done: self.done,
            total: self.total,
        });
        self.chunks += 1;
    }

    pub(crate) fn finish(self, meta: Meta) -> TransferSummary {
        let elapsed = self.started.elapsed();
        self.log(TransferEvent::TransferComplete {
            total_bytes: self.done,
            chunks: self.chunks,
            duration_ms: elapsed.as_millis() as u64,
        });
        TransferSummary {
            meta,
            chunks: self.chunks,
            elapsed,
        }
    }

    pub(crate) fn fail(mut self, err: TransferError) -> TransferError {
        let phase = self.state;
        self.state = TransferState::Aborted;
        self.log(TransferEvent::TransferAborted {
            kind: err.kind(),
            message: format!("during {}: {}", phase, err),
        });
        err
    }

    /// Run `body` and close the tracker according to its outcome.
    pub(crate) fn run<F>(mut self, body: F) -> Result<TransferSummary>
    where
        F: FnOnce(&mut Self) -> Result<Meta>,
    {
        match body(&mut self) {
            Ok(meta) => Ok(self.finish(meta)),
            Err(e) => Err(self.fail(e)),
        }
    }
}

/// Orchestrates "meta then body" in either direction, plain or secure.
pub struct TransferSession<'a> {
    config: ProtocolConfig,
    mode: TransferMode<'a>,
    logger: &'a dyn TransferLogger,
    state: TransferState,
}

impl<'a> TransferSession<'a> {
    pub fn new(
        config: ProtocolConfig,
        mode: TransferMode<'a>,
        logger: &'a dyn TransferLogger,
    ) -> Self {
        Self {
            config,
            mode,
            logger,
            state: TransferState::AwaitingMeta,
        }
    }

    pub fn plain(logger: &'a dyn TransferLogger) -> Self {
        Self::new(ProtocolConfig::default(), TransferMode::Plain, logger)
    }

    pub fn secure(key: &'a [u8], logger: &'a dyn TransferLogger) -> Self {
        Self::new(ProtocolConfig::default(), TransferMode::Secure(key), logger)
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Send `meta` followed by exactly `meta.size()` bytes from `source`.
    pub fn send<W, R>(
        &mut self,
        socket: &mut W,
        meta: &Meta,
        source: &mut R,
    ) -> Result<TransferSummary>
    where
        W: Write + ?Sized,
        R: Read + ?Sized,
    {
        self.claim()?;
        let result = match self.mode {
            TransferMode::Plain => plain::send(socket, meta, source, &self.config, self.logger),
            TransferMode::Secure(key) => {
                secure::send(socket, meta, source, key, &self.config, self.logger)
            }
        };
        self.settle(result)
    }

    /// Receive one meta frame and its body into `sink`.
    pub fn receive<R, W>(&mut self, socket: &mut R, sink: &mut W) -> Result<TransferSummary>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        self.claim()?;
        let result = match self.mode {
            TransferMode::Plain => plain::receive(socket, sink, &self.config, self.logger),
            TransferMode::Secure(key) => {
                secure::receive(socket, sink, key, &self.config, self.logger)
            }
        };
        self.settle(result)
    }

    fn claim(&mut self) -> Result<()> {
        if self.state != TransferState::AwaitingMeta {
            return Err(TransferError::InvalidArgument(format!(
                "session already used (state {})",
                self.state
            )));
        }
        self.state = TransferState::Transferring;
        Ok(())
    }

    fn settle(&mut self, result: Result<TransferSummary>) -> Result<TransferSummary> {
        self.state = if result.is_ok() {
            TransferState::Complete
        } else {
            TransferState::Aborted
        };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{MemoryLogger, NullLogger};
    use crate::meta;
    use std::io::Cursor;

    #[test]
    fn session_is_one_shot() {
        let logger = NullLogger;
        let mut session = TransferSession::plain(&logger);
        assert_eq!(session.state(), TransferState::AwaitingMeta);

        let mut wire = Vec::new();
        let meta = Meta::new("a", 3);
        session.send(&mut wire, &meta, &mut Cursor::new(b"abc")).unwrap();
        assert_eq!(session.state(), TransferState::Complete);

        let again = session.send(&mut wire, &meta, &mut Cursor::new(b"abc"));
        assert!(matches!(again, Err(TransferError::InvalidArgument(_))));
    }

    #[test]
    fn failed_session_is_aborted() {
        let logger = MemoryLogger::new();
        let mut session = TransferSession::plain(&logger);
        let mut sink = Vec::new();
        let err = session
            .receive(&mut Cursor::new(Vec::<u8>::new()), &mut sink)
            .unwrap_err();
        assert!(matches!(err, TransferError::ConnectionLost { .. }));
        assert_eq!(session.state(), TransferState::Aborted);

        let last = logger.events().pop().unwrap();
        assert_eq!(
            last,
            TransferEvent::TransferAborted {
                kind: "connection_lost",
                message: "during awaiting_meta: connection lost after 0 of 64 bytes".into(),
            }
        );
    }

    #[test]
    fn abort_reports_the_phase_it_interrupted() {
        let logger = MemoryLogger::new();
        let header = Meta::new("half.bin", 10);
        let mut wire = meta::encode(&header, &ProtocolConfig::default()).unwrap();
        wire.extend_from_slice(b"12345");

        let err = TransferSession::plain(&logger)
            .receive(&mut Cursor::new(wire), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, TransferError::ConnectionLost { transferred: 5, expected: 10 }));
        match logger.events().pop().unwrap() {
            TransferEvent::TransferAborted { message, .. } => {
                assert!(message.starts_with("during transferring:"), "{}", message)
            }
            other => panic!("unexpected last event {:?}", other),
        }
    }

    #[test]
    fn secure_session_roundtrip_in_memory() {
        let key = [7u8; 32];
        let logger = NullLogger;
        let data: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        let meta = Meta::new("data.bin", data.len() as u64);

        let mut wire = Vec::new();
        TransferSession::secure(&key, &logger)
            .send(&mut wire, &meta, &mut Cursor::new(&data))
            .unwrap();
        // header + 3 sealed chunks (1024, 1024, 952)
        assert_eq!(wire.len(), 64 + 3000 + 3 * 16);

        let mut sink = Vec::new();
        let summary = TransferSession::secure(&key, &logger)
            .receive(&mut Cursor::new(wire), &mut sink)
            .unwrap();
        assert_eq!(summary.meta, meta);
        assert_eq!(summary.chunks, 3);
        assert_eq!(sink, data);
    }

    #[test]
    fn mode_debug_hides_key() {
        let key = [0xAB; 16];
        assert_eq!(format!("{:?}", TransferMode::Secure(&key)), "Secure(<16 byte key>)");
    }
}
