use clap::Parser;
use protocol::codec;
use sensor::config::SensorConfig;
use sensor::sender::SensorClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::Level;

/// µTP/1 sensor client
#[derive(Parser)]
struct Args {
    /// collector host
    #[clap(long, default_value = "127.0.0.1")]
    server: String,

    /// collector UDP port
    #[clap(long, default_value_t = 9000)]
    port: u16,

    /// unique device identifier (1-65535)
    #[clap(long, default_value_t = 1)]
    device_id: u16,

    /// seconds between two samples
    #[clap(long, default_value_t = 1.0)]
    interval: f64,

    /// seconds after which a non-empty batch is flushed regardless of fill
    #[clap(long, default_value_t = 5.0)]
    report_interval: f64,

    /// total run time in seconds
    #[clap(long, default_value_t = 60)]
    duration: u64,

    /// maximum number of readings per DATA packet; 1 disables batching
    #[clap(long, default_value_t = 1)]
    batch_size: usize,

    /// random seed for reproducible runs
    #[clap(long, default_value_t = 42)]
    seed: u64,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    if !(args.interval > 0.0) || !(args.report_interval > 0.0) {
        anyhow::bail!("intervals must be positive");
    }

    let server_addr: SocketAddr = format!("{}:{}", args.server, args.port).parse()?;

    let config = SensorConfig {
        server_addr,
        device_id: args.device_id,
        sampling_interval: Duration::from_secs_f64(args.interval),
        report_interval: Duration::from_secs_f64(args.report_interval),
        run_duration: Duration::from_secs(args.duration),
        batch_size: args.batch_size,
        seed: args.seed,
        max_packet_bytes: codec::DEFAULT_MAX_PACKET_BYTES,
    };
    config.validate()?;

    let bind_addr = if server_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr).await?;

    SensorClient::new(config, Arc::new(socket)).run().await;
    Ok(())
}
