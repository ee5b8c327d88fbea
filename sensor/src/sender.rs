use crate::batcher::Batcher;
use crate::config::SensorConfig;
use crate::readings::SyntheticSensor;
use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use protocol::codec;
use protocol::packet_header::{MsgKind, PacketFlags, PacketHeader};
use protocol::seq::{SeqNum, SeqTracker};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::select;
use tokio::time::{interval, sleep_until, Instant};
use tracing::{debug, error, info};

/// This is an abstraction for sending a datagram on a UDP socket,
///  introduced to facilitate mocking the I/O part away for testing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SendSocket: Send + Sync + 'static {
    async fn do_send_packet(&self, to: SocketAddr, packet_buf: &[u8]);
}

#[async_trait]
impl SendSocket for UdpSocket {
    async fn do_send_packet(&self, to: SocketAddr, packet_buf: &[u8]) {
        // fire and forget: a failed send is indistinguishable from network
        //  loss for the peer, so it is logged and never retried
        if let Err(e) = self.send_to(packet_buf, to).await {
            error!("error sending UDP packet to {:?}: {}", to, e);
        }
    }
}

/// counters for the end-of-run summary
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct SensorStats {
    pub packets_sent: u64,
    pub heartbeats_sent: u64,
    pub readings_sent: u64,
    pub bytes_sent: u64,
}

/// The sampling / batching / flushing loop of one device.
///
/// Single-task by design: the sequence tracker and the batch accumulator are
///  confined to this loop, so there is no shared mutable state anywhere on
///  the client side.
pub struct SensorClient {
    config: SensorConfig,
    socket: Arc<dyn SendSocket>,
    seq: SeqTracker,
    batcher: Batcher,
    readings: SyntheticSensor,
    stats: SensorStats,
}

impl SensorClient {
    pub fn new(config: SensorConfig, socket: Arc<dyn SendSocket>) -> SensorClient {
        SensorClient {
            seq: SeqTracker::new(SeqNum::ZERO),
            batcher: Batcher::new(config.batch_size),
            readings: SyntheticSensor::new(config.seed),
            stats: SensorStats::default(),
            config,
            socket,
        }
    }

    fn timestamp_now() -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default()
    }

    async fn flush_batch(&mut self) {
        let readings = self.batcher.take_batch();

        let flags = if readings.len() > 1 { PacketFlags::BATCHED } else { PacketFlags::empty() };
        let header = PacketHeader {
            kind: MsgKind::Data,
            device_id: self.config.device_id,
            seq_num: self.seq.next(),
            timestamp: Self::timestamp_now(),
            flags,
        };

        let buf = match codec::encode_data(&header, &readings, self.config.max_packet_bytes) {
            Ok(buf) => buf,
            Err(e) => {
                // config validation caps the batch size, so this is a bug
                error!("dropping batch of {} readings: {}", readings.len(), e);
                return;
            }
        };

        debug!("sending {:?} with {} readings, {} bytes", header, readings.len(), buf.len());
        self.socket.do_send_packet(self.config.server_addr, &buf).await;

        self.stats.packets_sent += 1;
        self.stats.readings_sent += readings.len() as u64;
        self.stats.bytes_sent += buf.len() as u64;
    }

    async fn send_heartbeat(&mut self) {
        let header = PacketHeader {
            kind: MsgKind::Heartbeat,
            device_id: self.config.device_id,
            seq_num: self.seq.next(),
            timestamp: Self::timestamp_now(),
            flags: PacketFlags::empty(),
        };

        let buf = codec::encode_heartbeat(&header);
        debug!("sending heartbeat {:?}", header);
        self.socket.do_send_packet(self.config.server_addr, &buf).await;

        self.stats.packets_sent += 1;
        self.stats.heartbeats_sent += 1;
        self.stats.bytes_sent += buf.len() as u64;
    }

    /// Runs the sampling loop until the configured duration has elapsed,
    ///  then flushes the trailing partial batch. A batch is flushed when it
    ///  is full or when the report interval has passed since the last
    ///  flush, whichever comes first.
    pub async fn run(mut self) -> SensorStats {
        info!("sensor device {} reporting to {} (sampling {:?}, report {:?}, batch size {}, seed {})",
            self.config.device_id, self.config.server_addr, self.config.sampling_interval,
            self.config.report_interval, self.config.batch_size, self.config.seed);

        let started = Instant::now();
        let end = started + self.config.run_duration;
        let mut sample_tick = interval(self.config.sampling_interval);
        let mut report_deadline = started + self.config.report_interval;

        loop {
            select! {
                _ = sample_tick.tick() => {
                    let reading = self.readings.next_reading();
                    self.batcher.push(reading);
                    if self.batcher.is_full() {
                        self.flush_batch().await;
                        report_deadline = Instant::now() + self.config.report_interval;
                    }
                }
                _ = sleep_until(report_deadline) => {
                    if self.batcher.is_empty() {
                        self.send_heartbeat().await;
                    }
                    else {
                        self.flush_batch().await;
                    }
                    report_deadline = Instant::now() + self.config.report_interval;
                }
                _ = sleep_until(end) => {
                    break;
                }
            }
        }

        // the trailing partial batch is still sent
        if !self.batcher.is_empty() {
            self.flush_batch().await;
        }

        info!("sensor device {} finished after {:?}: {:?}",
            self.config.device_id, started.elapsed(), self.stats);
        self.stats
    }
}
