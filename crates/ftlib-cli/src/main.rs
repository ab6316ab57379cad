mod net;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use ftlib::{
    FILE_BUFFER_SIZE, LevelMask, ProtocolConfig, TracingLogger, TransferLogger, TransferMode,
    WriterLogger, generate_key, key_from_base64, key_to_base64, receive_file, send_file,
};

#[derive(Parser)]
#[command(name = "ft", version, about = "Send and receive named files over TCP")]
struct Cli {
    /// Print a progress line instead of log records.
    #[arg(long, global = true, env = "FT_PROGRESS")]
    progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to a receiver and send one file.
    Send {
        path: PathBuf,
        #[command(flatten)]
        net: NetArgs,
    },
    /// Wait for one sender and store its file.
    Receive {
        #[arg(long, env = "FT_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,
        #[command(flatten)]
        net: NetArgs,
    },
    /// Print a fresh base64 key for secure transfers.
    Keygen {
        #[arg(long, default_value_t = 256)]
        bits: usize,
    },
}

#[derive(Args)]
struct NetArgs {
    #[arg(long, env = "FT_HOST", default_value = "127.0.0.1")]
    host: String,
    #[arg(long, env = "FT_PORT", default_value_t = 3211)]
    port: u16,
    /// Base64 AES-GCM key; enables secure mode. Both ends need the same key.
    #[arg(long, env = "FT_KEY", hide_env_values = true)]
    key: Option<String>,
    /// Plaintext bytes per chunk. Must match the peer in secure mode.
    #[arg(long, env = "FT_CHUNK_SIZE", default_value_t = FILE_BUFFER_SIZE)]
    chunk_size: usize,
    /// Socket read/write timeout; unset blocks forever.
    #[arg(long, env = "FT_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

impl NetArgs {
    fn key(&self) -> anyhow::Result<Option<Vec<u8>>> {
        self.key
            .as_deref()
            .map(key_from_base64)
            .transpose()
            .context("invalid FT_KEY")
    }

    fn config(&self) -> anyhow::Result<ProtocolConfig> {
        let config = ProtocolConfig::with_chunk_size(self.chunk_size);
        config.validate().context("invalid chunk size")?;
        Ok(config)
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn mode(key: Option<&[u8]>) -> TransferMode<'_> {
    match key {
        Some(k) => TransferMode::Secure(k),
        None => TransferMode::Plain,
    }
}

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ft=info,ftlib=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let logger: Box<dyn TransferLogger> = if cli.progress {
        Box::new(WriterLogger::new(
            std::io::stdout(),
            LevelMask::SIMPLE | LevelMask::PROGRESS,
        ))
    } else {
        Box::new(TracingLogger)
    };

    match cli.command {
        Command::Send { path, net } => run_send(&path, &net, logger.as_ref()),
        Command::Receive { output_dir, net } => run_receive(&output_dir, &net, logger.as_ref()),
        Command::Keygen { bits } => run_keygen(bits),
    }
}

fn run_send(path: &Path, net: &NetArgs, logger: &dyn TransferLogger) -> anyhow::Result<()> {
    let key = net.key()?;
    let config = net.config()?;
    let addr = net::resolve(&net.host, net.port)?;

    let mut stream = net::connect(addr, net.timeout())
        .with_context(|| format!("cannot connect to {}", addr))?;
    info!("Connected to {}", addr);

    let summary = send_file(&mut stream, path, mode(key.as_deref()), config, logger)
        .with_context(|| format!("sending {} failed", path.display()))?;
    info!(
        "Sent {} ({} bytes, {} chunks) in {:.2}s",
        summary.meta.name(),
        summary.meta.size(),
        summary.chunks,
        summary.elapsed.as_secs_f64()
    );
    Ok(())
}

fn run_receive(
    output_dir: &Path,
    net: &NetArgs,
    logger: &dyn TransferLogger,
) -> anyhow::Result<()> {
    let key = net.key()?;
    let config = net.config()?;
    let addr = net::resolve(&net.host, net.port)?;

    let listener = net::listen(addr).with_context(|| format!("cannot listen on {}", addr))?;
    info!("Listening on {}", listener.local_addr()?);

    let (mut stream, peer) = listener.accept()?;
    net::configure(&stream, net.timeout())?;
    info!("Accepted {}", peer);

    let received = receive_file(&mut stream, output_dir, mode(key.as_deref()), config, logger)
        .with_context(|| format!("receiving from {} failed", peer))?;
    println!("{}\t{}", received.path.display(), received.meta.size());
    Ok(())
}

fn run_keygen(bits: usize) -> anyhow::Result<()> {
    let len = match bits {
        128 => 16,
        256 => 32,
        other => bail!("unsupported key size {} (use 128 or 256)", other),
    };
    println!("{}", key_to_base64(&generate_key(len)?));
    Ok(())
}
