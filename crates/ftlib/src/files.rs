/// File helpers around the transfer core.
///
/// `send_file` names the stream after the file's last path component. `receive_file` writes into
/// a temporary file in the target folder and links it under the received name only once the whole
/// body arrived. An existing file of that name is never replaced. On any failure the temporary file
/// is removed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::error::{Result, TransferError};
use crate::logging::TransferLogger;
use crate::meta::Meta;
use crate::protocol::ProtocolConfig;
use crate::session::{TransferMode, TransferSession, TransferSummary};

/// Per-process counter so concurrent receives never pick the same temp name.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A file received into a folder.
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    pub meta: Meta,
    pub path: PathBuf,
    pub summary: TransferSummary,
}

/// Stream name for a path: its final component.
pub fn stream_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            TransferError::InvalidArgument(format!(
                "{} has no UTF-8 file name",
                path.display()
            ))
        })
}

/// Check that a received name is a single, plain path component.
pub fn check_received_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !plain || name.contains(['/', '\\']) {
        return Err(TransferError::MalformedFrame(format!(
            "received name {:?} is not a plain file name",
            name
        )));
    }
    Ok(())
}

/// Send the file at `path`.
pub fn send_file<W: Write + ?Sized>(
    socket: &mut W,
    path: &Path,
    mode: TransferMode<'_>,
    config: ProtocolConfig,
    logger: &dyn TransferLogger,
) -> Result<TransferSummary> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let meta = Meta::new(stream_name(path)?, size);
    info!("Sending {} ({} bytes) from {}", meta.name(), size, path.display());

    TransferSession::new(config, mode, logger).send(socket, &meta, &mut file)
}

/// Receive one file into `folder`, which must already exist.
pub fn receive_file<R: Read + ?Sized>(
    socket: &mut R,
    folder: &Path,
    mode: TransferMode<'_>,
    config: ProtocolConfig,
    logger: &dyn TransferLogger,
) -> Result<ReceivedFile> {
    if !folder.is_dir() {
        return Err(TransferError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", folder.display()),
        )));
    }

    let temp_path = folder.join(temp_name());
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)?;
    debug!("Receiving into {}", temp_path.display());

    match receive_into(socket, file, folder, &temp_path, mode, config, logger) {
        Ok(received) => {
            info!(
                "Received {} ({} bytes) into {}",
                received.meta.name(),
                received.meta.size(),
                received.path.display()
            );
            Ok(received)
        }
        Err(e) => {
            if let Err(rm) = fs::remove_file(&temp_path) {
                warn!("Cannot remove partial file {}: {}", temp_path.display(), rm);
            }
            Err(e)
        }
    }
}

fn receive_into<R: Read + ?Sized>(
    socket: &mut R,
    file: File,
    folder: &Path,
    temp_path: &Path,
    mode: TransferMode<'_>,
    config: ProtocolConfig,
    logger: &dyn TransferLogger,
) -> Result<ReceivedFile> {
    let mut out = BufWriter::new(file);
    let summary = TransferSession::new(config, mode, logger).receive(socket, &mut out)?;
    let file = out.into_inner().map_err(|e| TransferError::Io(e.into_error()))?;
    file.sync_all()?;
    drop(file);

    let meta = summary.meta.clone();
    check_received_name(meta.name())?;
    let path = folder.join(meta.name());
    // Fails with AlreadyExists instead of replacing a file created meanwhile.
    fs::hard_link(temp_path, &path).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => TransferError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )),
        _ => TransferError::Io(e),
    })?;
    if let Err(rm) = fs::remove_file(temp_path) {
        warn!("Cannot remove temp file {}: {}", temp_path.display(), rm);
    }

    Ok(ReceivedFile {
        meta,
        path,
        summary,
    })
}

fn temp_name() -> String {
    format!(
        "ftlib-receive-{}-{}-{}",
        chrono::Local::now().format("%H_%M_%S"),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}
