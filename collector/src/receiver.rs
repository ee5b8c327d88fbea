use crate::config::CollectorConfig;
use crate::engine::ReorderEngine;
use crate::metrics::MetricsSink;
use crate::report::FinalReport;
use protocol::codec;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::select;
use tokio::time::{interval, sleep_until, Instant};
use tracing::{error, info, trace, warn};

/// Owns the server socket and the reorder engine: receives datagrams,
///  decodes them and feeds the engine, interleaved with periodic sweeps of
///  the pending buffers. Running everything on one task serializes all
///  mutation of per-device state without any locking.
pub struct Receiver {
    socket: UdpSocket,
    engine: ReorderEngine,
    config: Arc<CollectorConfig>,
}

impl Receiver {
    /// Binding the socket is the only fatal failure on the server side -
    ///  everything after that degrades per packet.
    pub async fn bind(config: Arc<CollectorConfig>, sink: Box<dyn MetricsSink>) -> anyhow::Result<Receiver> {
        let socket = UdpSocket::bind(config.bind_addr).await?;
        info!("listening on {}", socket.local_addr()?);

        Ok(Receiver {
            socket,
            engine: ReorderEngine::new(config.clone(), sink),
            config,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Runs until the configured duration elapses (or ctrl-c), keeps
    ///  absorbing delayed in-flight packets for the drain period, then
    ///  flushes everything still pending and returns the final report.
    pub async fn run(self) -> anyhow::Result<FinalReport> {
        let Receiver { socket, mut engine, config } = self;

        let started = Instant::now();
        let end = config.run_duration.map(|duration| started + duration);
        let mut sweep_tick = interval(config.sweep_interval);
        let mut buf = vec![0u8; 2048];

        loop {
            select! {
                recv = socket.recv_from(&mut buf) => {
                    let arrival = Instant::now();
                    match recv {
                        Ok((len, from)) => Self::on_datagram(&mut engine, &buf[..len], from, arrival).await,
                        Err(e) => error!("socket error: {}", e),
                    }
                }
                _ = sweep_tick.tick() => {
                    Self::on_sweep(&mut engine, true).await;
                }
                _ = sleep_until_opt(end) => {
                    info!("run duration elapsed");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        // drain: the client has stopped sending, but impaired packets may
        //  still be in flight
        info!("draining for {:?}", config.drain_period);
        let drain_end = Instant::now() + config.drain_period;
        loop {
            select! {
                recv = socket.recv_from(&mut buf) => {
                    let arrival = Instant::now();
                    match recv {
                        Ok((len, from)) => Self::on_datagram(&mut engine, &buf[..len], from, arrival).await,
                        Err(e) => error!("socket error: {}", e),
                    }
                }
                _ = sweep_tick.tick() => {
                    Self::on_sweep(&mut engine, false).await;
                }
                _ = sleep_until(drain_end) => break,
            }
        }

        engine.finalize().await?;

        Ok(FinalReport {
            runtime: started.elapsed(),
            devices: engine.device_stats(),
        })
    }

    /// Decode failures drop the datagram and log, record failures are
    ///  logged as well - nothing on this path is allowed to terminate the
    ///  receive loop.
    async fn on_datagram(
        engine: &mut ReorderEngine,
        datagram: &[u8],
        from: SocketAddr,
        arrival: Instant,
    ) {
        match codec::decode_datagram(datagram) {
            Ok((header, readings)) => {
                trace!("received {:?} from {:?}", header, from);
                if let Err(e) = engine.on_packet(&header, readings, datagram.len(), arrival).await {
                    error!("error recording packet from {:?}: {}", from, e);
                }
            }
            Err(e) => {
                warn!("dropping malformed datagram ({} bytes) from {:?}: {}", datagram.len(), from, e);
            }
        }
    }

    async fn on_sweep(engine: &mut ReorderEngine, flush: bool) {
        if let Err(e) = engine.sweep(Instant::now()).await {
            error!("error sweeping reorder buffers: {}", e);
            return;
        }
        if flush {
            if let Err(e) = engine.flush_sink().await {
                error!("error flushing metrics sink: {}", e);
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
