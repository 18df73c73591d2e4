use std::path::PathBuf;

use anyhow::Result;
use certfs_core::{DEFAULT_REDIS_ADDR, DEFAULT_REDIS_DB, KeyResolver};
use certfs_fuse::Projection;
use certfs_store::RedisStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let opts = parse_args();

    let store = RedisStore::connect(&opts.redis_addr, opts.db)?;
    let resolver = KeyResolver::new(opts.wildcard);
    let handle = certfs_fuse::mount(Projection::new(store, resolver), &opts.mountpoint)?;

    tracing::info!(
        mountpoint = %opts.mountpoint.display(),
        redis = %opts.redis_addr,
        db = opts.db,
        wildcard = opts.wildcard,
        "certfs mounted"
    );

    // The FUSE session runs on its own thread; hold the handle until a
    // shutdown signal arrives, then drop it to unmount.
    shutdown_signal().await;
    tracing::info!("received shutdown signal, unmounting");
    drop(handle);
    Ok(())
}

struct Options {
    redis_addr: String,
    db: u32,
    wildcard: bool,
    mountpoint: PathBuf,
}

/// Parse CLI args by hand: a few flags and one required positional
/// mountpoint.
fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut redis_addr = DEFAULT_REDIS_ADDR.to_string();
    let mut db = DEFAULT_REDIS_DB;
    let mut wildcard = true;
    let mut mountpoint: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--redis" => {
                let Some(addr) = args.get(i + 1) else {
                    usage_error("--redis requires an address argument");
                };
                redis_addr = addr.clone();
                i += 1;
            }
            "--db" => {
                let Some(value) = args.get(i + 1) else {
                    usage_error("--db requires a database index argument");
                };
                db = match value.parse() {
                    Ok(n) => n,
                    Err(_) => usage_error(&format!("invalid database index: {value}")),
                };
                i += 1;
            }
            "--no-wildcard" => wildcard = false,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg => {
                if let Some(addr) = arg.strip_prefix("--redis=") {
                    redis_addr = addr.to_string();
                } else if let Some(value) = arg.strip_prefix("--db=") {
                    db = match value.parse() {
                        Ok(n) => n,
                        Err(_) => usage_error(&format!("invalid database index: {value}")),
                    };
                } else if arg.starts_with('-') {
                    usage_error(&format!("unknown option: {arg}"));
                } else if mountpoint.is_some() {
                    usage_error("only one mountpoint may be given");
                } else {
                    mountpoint = Some(PathBuf::from(arg));
                }
            }
        }
        i += 1;
    }

    let Some(mountpoint) = mountpoint else {
        usage_error("a mountpoint is required");
    };

    Options {
        redis_addr,
        db,
        wildcard,
        mountpoint,
    }
}

fn usage_error(msg: &str) -> ! {
    eprintln!("error: {msg}");
    eprintln!();
    print_help();
    std::process::exit(1);
}

fn print_help() {
    eprintln!(
        "\
certfsd - mount Redis-hosted TLS certificates as a read-only filesystem

USAGE:
    certfsd [options] <mountpoint>

OPTIONS:
    --redis <addr>   Redis address (default: {DEFAULT_REDIS_ADDR})
    --db <n>         Redis database index (default: {DEFAULT_REDIS_DB})
    --no-wildcard    Disable the wildcard fallback (exact keys only)
    -h, --help       Show this help message"
    );
}

/// Wait for ctrl-c (SIGINT) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}, falling back to SIGINT only");
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
