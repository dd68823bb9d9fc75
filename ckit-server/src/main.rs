use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ckit_engine::{snapshot, Store};
use ckit_server::command::ServerCtx;
use ckit_server::server::serve;

const DEFAULT_PORT: u16 = 6380;
const DEFAULT_SNAPSHOT: &str = "dump.ckdb";

struct Config {
    port: u16,
    snapshot_path: PathBuf,
    maxmemory: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT),
            maxmemory: 0,
        }
    }
}

fn usage(program: &str) {
    eprintln!("usage: {program} [-p port] [-d snapshot_file] [-m maxmemory_bytes]");
    eprintln!("  -p port     listen port (default {DEFAULT_PORT})");
    eprintln!("  -d file     snapshot path (default {DEFAULT_SNAPSHOT})");
    eprintln!("  -m bytes    memory budget before eviction (default 0 = unlimited)");
}

/// Parses argv by hand; `Ok(None)` means help was requested.
fn parse_args(args: &[String]) -> Result<Option<Config>, String> {
    let mut config = Config::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-p" => {
                let raw = iter.next().ok_or("-p needs a value")?;
                let port: u32 = raw.parse().map_err(|_| format!("invalid port '{raw}'"))?;
                if port == 0 || port > 65535 {
                    return Err(format!("invalid port '{raw}'"));
                }
                config.port = port as u16;
            }
            "-d" => {
                let raw = iter.next().ok_or("-d needs a value")?;
                config.snapshot_path = PathBuf::from(raw);
            }
            "-m" => {
                let raw = iter.next().ok_or("-m needs a value")?;
                config.maxmemory = raw
                    .parse()
                    .map_err(|_| format!("invalid maxmemory '{raw}'"))?;
            }
            "-h" | "--help" => return Ok(None),
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(Some(config))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("cachekit-server");
    let config = match parse_args(&args) {
        Ok(Some(config)) => config,
        Ok(None) => {
            usage(program);
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{err}");
            usage(program);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let mut store = Store::with_maxmemory(config.maxmemory);

    match snapshot::load(&mut store, &config.snapshot_path) {
        Ok(_) => {}
        Err(ckit_common::SnapshotError::Io(err))
            if err.kind() == std::io::ErrorKind::NotFound =>
        {
            info!(path = %config.snapshot_path.display(), "no snapshot found, starting empty");
        }
        Err(err) => {
            // a bad snapshot keeps whatever prefix loaded
            warn!(error = %err, "snapshot load failed");
        }
    }

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;

    let ctx = Arc::new(ServerCtx::new(store, config.snapshot_path));
    serve(listener, ctx).await.context("server loop failed")
}
