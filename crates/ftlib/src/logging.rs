/// Transfer logging hook.
///
/// Every transfer takes a `&dyn TransferLogger` argument and reports its lifecycle through it.
/// Nothing in the transfer loops depends on what the logger does with an entry.

use std::fmt;
use std::io::Write;
use std::sync::Mutex;

use crate::protocol::NONCE_SIZE;

/// Category of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Start and end of a transfer.
    Simple,
    /// Per-chunk byte counts.
    Progress,
    /// Frame dumps and per-chunk crypto detail.
    Debug,
}

impl LogLevel {
    fn bit(self) -> u8 {
        match self {
            Self::Progress => 0b0010,
            Self::Debug => 0b0100,
            Self::Simple => 0b1000,
        }
    }
}

/// Set of levels a `WriterLogger` lets through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelMask(u8);

impl LevelMask {
    pub const SILENT: Self = Self(0);
    pub const PROGRESS: Self = Self(0b0010);
    pub const DEBUG: Self = Self(0b0100);
    pub const SIMPLE: Self = Self(0b1000);
    pub const ALL: Self = Self(0b1110);

    pub fn contains(self, level: LogLevel) -> bool {
        self.0 & level.bit() != 0
    }
}

impl std::ops::BitOr for LevelMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Structured log entry for one transfer.
#[derive(Debug, Clone)]
pub struct TransferLog<'a> {
    pub component: &'static str,
    /// Stream name from the meta frame. Empty until the frame is known.
    pub name: &'a str,
    pub event: TransferEvent,
}

/// Transfer events that can be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// Sender: meta frame written
    MetaSent { size: u64 },
    /// Receiver: meta frame decoded
    MetaReceived { size: u64 },
    /// Raw meta frame bytes, hex encoded
    FrameBytes { hex: String },
    /// Body bytes moved
    ChunkTransferred {
        index: u64,
        bytes: usize,
        done: u64,
        total: u64,
    },
    /// Sender: chunk sealed
    ChunkSealed {
        index: u64,
        nonce: [u8; NONCE_SIZE],
        len: usize,
    },
    /// Receiver: chunk authenticated and opened
    ChunkOpened { index: u64, len: usize },
    /// Transfer complete
    TransferComplete {
        total_bytes: u64,
        chunks: u64,
        duration_ms: u64,
    },
    /// Transfer ended with an error
    TransferAborted { kind: &'static str, message: String },
}

impl TransferEvent {
    pub fn level(&self) -> LogLevel {
        match self {
            Self::MetaSent { .. }
            | Self::MetaReceived { .. }
            | Self::TransferComplete { .. }
            | Self::TransferAborted { .. } => LogLevel::Simple,
            Self::ChunkTransferred { .. } => LogLevel::Progress,
            Self::FrameBytes { .. } | Self::ChunkSealed { .. } | Self::ChunkOpened { .. } => {
                LogLevel::Debug
            }
        }
    }
}

impl fmt::Display for TransferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MetaSent { size } => write!(f, "meta_sent size={}", size),
            Self::MetaReceived { size } => write!(f, "meta_received size={}", size),
            Self::FrameBytes { hex } => write!(f, "frame_bytes [{}]", hex),
            Self::ChunkTransferred { index, bytes, done, total } => {
                write!(f, "chunk idx={} bytes={} done={}/{}", index, bytes, done, total)
            }
            Self::ChunkSealed { index, nonce, len } => {
                write!(f, "chunk_sealed idx={} nonce={} len={}", index, hex::encode(nonce), len)
            }
            Self::ChunkOpened { index, len } => {
                write!(f, "chunk_opened idx={} len={}", index, len)
            }
            Self::TransferComplete { total_bytes, chunks, duration_ms } => write!(
                f,
                "transfer_complete bytes={} chunks={} duration_ms={}",
                total_bytes, chunks, duration_ms
            ),
            Self::TransferAborted { kind, message } => {
                write!(f, "transfer_aborted kind={}: {}", kind, message)
            }
        }
    }
}

/// Sink for transfer log entries.
pub trait TransferLogger: Send + Sync {
    fn log(&self, entry: TransferLog<'_>);
}

/// Logger that uses the `tracing` crate.
pub struct TracingLogger;

impl TransferLogger for TracingLogger {
    fn log(&self, entry: TransferLog<'_>) {
        match entry.event.level() {
            LogLevel::Simple => tracing::info!(
                component = entry.component,
                name = entry.name,
                "{}",
                entry.event,
            ),
            LogLevel::Progress => tracing::debug!(
                component = entry.component,
                name = entry.name,
                "{}",
                entry.event,
            ),
            LogLevel::Debug => tracing::trace!(
                component = entry.component,
                name = entry.name,
                "{}",
                entry.event,
            ),
        }
    }
}

/// No-op logger that discards all log entries.
pub struct NullLogger;

impl TransferLogger for NullLogger {
    fn log(&self, _entry: TransferLog<'_>) {}
}

/// Human-readable progress lines on any writer (stdout by default in the CLI).
///
/// Progress entries redraw a single `\r<name> - <done> / <total>` line; other entries get a
/// line of their own. Write failures are ignored.
pub struct WriterLogger<W: Write + Send> {
    out: Mutex<W>,
    mask: LevelMask,
}

impl<W: Write + Send> WriterLogger<W> {
    pub fn new(out: W, mask: LevelMask) -> Self {
        Self {
            out: Mutex::new(out),
            mask,
        }
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> TransferLogger for WriterLogger<W> {
    fn log(&self, entry: TransferLog<'_>) {
        let finishing_progress = matches!(entry.event, TransferEvent::TransferComplete { .. })
            && self.mask.contains(LogLevel::Progress);
        if !self.mask.contains(entry.event.level()) && !finishing_progress {
            return;
        }
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        let _ = match &entry.event {
            TransferEvent::ChunkTransferred { done, total, .. } => {
                write!(out, "\r{} - {} / {}", entry.name, done, total)
            }
            TransferEvent::TransferComplete { total_bytes, .. } if finishing_progress => {
                writeln!(out, "\r{} - {} / {}", entry.name, total_bytes, total_bytes)
            }
            event => writeln!(out, "[{}] {}: {}", entry.component, entry.name, event),
        };
        let _ = out.flush();
    }
}

/// Logger that keeps every entry in memory. Handy for tests and for embedding callers that want
/// to inspect a finished transfer.
#[derive(Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<(&'static str, String, TransferEvent)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in order.
    pub fn events(&self) -> Vec<TransferEvent> {
        self.entries
            .lock()
            .map(|e| e.iter().map(|(_, _, ev)| ev.clone()).collect())
            .unwrap_or_default()
    }

    /// Recorded events from one component ("sender" or "receiver").
    pub fn events_from(&self, component: &str) -> Vec<TransferEvent> {
        self.entries
            .lock()
            .map(|e| {
                e.iter()
                    .filter(|(c, _, _)| *c == component)
                    .map(|(_, _, ev)| ev.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nonces of every sealed chunk, in order.
    pub fn nonces(&self) -> Vec<[u8; NONCE_SIZE]> {
        self.events()
            .into_iter()
            .filter_map(|ev| match ev {
                TransferEvent::ChunkSealed { nonce, .. } => Some(nonce),
                _ => None,
            })
            .collect()
    }
}

impl TransferLogger for MemoryLogger {
    fn log(&self, entry: TransferLog<'_>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((entry.component, entry.name.to_string(), entry.event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(done: u64) -> TransferLog<'static> {
        TransferLog {
            component: "receiver",
            name: "a.bin",
            event: TransferEvent::ChunkTransferred {
                index: 0,
                bytes: 10,
                done,
                total: 20,
            },
        }
    }

    #[test]
    fn writer_logger_filters_by_mask() {
        let logger = WriterLogger::new(Vec::new(), LevelMask::SIMPLE);
        logger.log(progress(10));
        logger.log(TransferLog {
            component: "receiver",
            name: "a.bin",
            event: TransferEvent::MetaReceived { size: 20 },
        });
        let out = String::from_utf8(logger.into_inner()).unwrap();
        assert_eq!(out, "[receiver] a.bin: meta_received size=20\n");
    }

    #[test]
    fn writer_logger_redraws_progress() {
        let logger = WriterLogger::new(Vec::new(), LevelMask::PROGRESS);
        logger.log(progress(10));
        logger.log(progress(20));
        logger.log(TransferLog {
            component: "receiver",
            name: "a.bin",
            event: TransferEvent::TransferComplete {
                total_bytes: 20,
                chunks: 2,
                duration_ms: 1,
            },
        });
        let out = String::from_utf8(logger.into_inner()).unwrap();
        assert_eq!(out, "\ra.bin - 10 / 20\ra.bin - 20 / 20\ra.bin - 20 / 20\n");
    }

    #[test]
    fn silent_mask_writes_nothing() {
        let logger = WriterLogger::new(Vec::new(), LevelMask::SILENT);
        logger.log(progress(10));
        assert!(logger.into_inner().is_empty());
        assert!(LevelMask::ALL.contains(LogLevel::Debug));
        assert!((LevelMask::SIMPLE | LevelMask::DEBUG).contains(LogLevel::Debug));
    }

    #[test]
    fn sealed_chunk_display_shows_nonce_hex() {
        let event = TransferEvent::ChunkSealed {
            index: 1,
            nonce: [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            len: 5,
        };
        assert_eq!(event.to_string(), "chunk_sealed idx=1 nonce=010000000000000000000000 len=5");
        assert_eq!(event.level(), LogLevel::Debug);
    }

    #[test]
    fn memory_logger_collects_nonces() {
        let logger = MemoryLogger::new();
        for i in 0..3u8 {
            let mut nonce = [0u8; NONCE_SIZE];
            nonce[0] = i;
            logger.log(TransferLog {
                component: "sender",
                name: "x",
                event: TransferEvent::ChunkSealed { index: i as u64, nonce, len: 1 },
            });
        }
        assert_eq!(logger.nonces().len(), 3);
        assert_eq!(logger.events_from("receiver").len(), 0);
    }
}
