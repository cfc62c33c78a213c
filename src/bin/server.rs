use clap::Parser;
use rustaof::config::{Config, DEFAULT_AOF_PATH, DEFAULT_PORT};
use rustaof::{server, Error};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
struct Args {
    /// The port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// The address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Path of the append-only file, replayed on startup
    #[arg(long = "aof", env = "AOF_PATH", default_value = DEFAULT_AOF_PATH)]
    aof_path: PathBuf,

    /// How often new writes are synced to disk, in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    fsync_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let config = Config::builder()
        .host(args.host)
        .port(args.port)
        .aof_path(args.aof_path)
        .fsync_interval(Duration::from_millis(args.fsync_interval_ms))
        .build();

    server::run(config).await
}
