use clap::Parser;
use collector::config::CollectorConfig;
use collector::metrics::CsvSink;
use collector::receiver::Receiver;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

/// µTP/1 collector server
#[derive(Parser)]
struct Args {
    /// UDP port to listen on
    #[clap(long, default_value_t = 9000)]
    port: u16,

    /// path of the CSV metrics file
    #[clap(long, default_value = "telemetry_log.csv")]
    csv: PathBuf,

    /// record packets in arrival order instead of restoring send order
    #[clap(long, default_value_t = false)]
    no_reorder: bool,

    /// how long a missing sequence number is awaited before later packets
    ///  are emitted anyway (milliseconds)
    #[clap(long, default_value_t = 250)]
    reorder_window_ms: u64,

    /// stop after this many seconds (runs until ctrl-c if omitted)
    #[clap(long)]
    duration: Option<u64>,

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

    let bind_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    let reorder_window = (!args.no_reorder).then(|| Duration::from_millis(args.reorder_window_ms));
    let run_duration = args.duration.map(Duration::from_secs);

    let config = CollectorConfig::new(bind_addr, args.csv, reorder_window, run_duration);
    config.validate()?;
    info!("reordering {}", match config.reorder_window {
        Some(window) => format!("enabled, window {:?}", window),
        None => "disabled".to_string(),
    });

    let sink = CsvSink::create(&config.csv_path).await?;
    let receiver = Receiver::bind(Arc::new(config), Box::new(sink)).await?;

    let report = receiver.run().await?;
    info!("final report\n{}", report);
    Ok(())
}
