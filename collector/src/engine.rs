use crate::config::CollectorConfig;
use crate::device_state::{DeviceState, DeviceStats, PendingPacket};
use crate::metrics::{DeliveryRecord, MetricsSink};
use protocol::packet_header::{PacketFlags, PacketHeader};
use protocol::reading::Reading;
use rustc_hash::FxHashMap;
use std::cmp::min;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The µTP/1 protocol state machine. Every decoded packet is classified as
///  in-order, duplicate or gap-causing against its device's state; packets
///  that arrive ahead of a hole are held in a bounded per-device pending
///  buffer for up to the reorder window before being emitted anyway.
///
/// The engine is the only place that reads or writes [DeviceState]. Its
///  caller serializes all invocations (single-task ownership), so each
///  packet's classification is one atomic update to its device's state.
///
/// Exactly one [DeliveryRecord] reaches the sink per packet, in emission
///  order: duplicates immediately on arrival, everything else when it is
///  accepted into the delivered order.
pub struct ReorderEngine {
    config: Arc<CollectorConfig>,
    devices: FxHashMap<u16, DeviceState>,
    sink: Box<dyn MetricsSink>,
}

impl ReorderEngine {
    pub fn new(config: Arc<CollectorConfig>, sink: Box<dyn MetricsSink>) -> ReorderEngine {
        ReorderEngine {
            config,
            devices: FxHashMap::default(),
            sink,
        }
    }

    /// classifies one decoded datagram, emitting whatever becomes ready
    pub async fn on_packet(
        &mut self,
        header: &PacketHeader,
        readings: Vec<Reading>,
        packet_size: usize,
        arrival: Instant,
    ) -> anyhow::Result<()> {
        let processing_started = Instant::now();
        let arrival_wallclock = wallclock_now();

        let state = self.devices.entry(header.device_id).or_insert_with(|| {
            info!("new device {}", header.device_id);
            DeviceState::new(header.device_id, header.seq_num)
        });

        let mut records = Vec::new();
        Self::classify_and_buffer(
            state,
            &self.config,
            header,
            readings,
            packet_size,
            arrival,
            arrival_wallclock,
            processing_started,
            &mut records,
        );

        for record in records {
            self.sink.record(record).await?;
        }
        Ok(())
    }

    /// Periodic pass over all pending buffers: force-emits every packet
    ///  that has waited past the reorder window, so a lost packet delays
    ///  its successors by a bounded amount of time only.
    pub async fn sweep(&mut self, now: Instant) -> anyhow::Result<()> {
        let Some(window) = self.config.reorder_window else {
            return Ok(());
        };

        let mut records = Vec::new();
        for state in self.devices.values_mut() {
            loop {
                let Some((&logical, oldest)) = state.pending.first_key_value() else {
                    break;
                };
                if now.duration_since(oldest.arrival) < window {
                    break;
                }
                let seq_num = oldest.seq_num;

                state.stats.forced_flushes += 1;
                debug!("device {}: reorder window of {:?} expired for seq {} - force-emitting",
                    state.device_id, window, seq_num);
                Self::emit_pending(state, logical, &mut records);
                Self::drain_contiguous(state, &mut records);
            }
        }

        for record in records {
            self.sink.record(record).await?;
        }
        Ok(())
    }

    /// flushes all pending packets regardless of their deadline and
    ///  finalizes the sink; called once at shutdown, after the drain period
    pub async fn finalize(&mut self) -> anyhow::Result<()> {
        let mut records = Vec::new();
        for state in self.devices.values_mut() {
            Self::drain_all_pending(state, &mut records);
        }

        for record in records {
            self.sink.record(record).await?;
        }
        self.sink.flush().await?;
        Ok(())
    }

    pub async fn flush_sink(&mut self) -> anyhow::Result<()> {
        self.sink.flush().await
    }

    /// per-device counters, sorted by device id
    pub fn device_stats(&self) -> Vec<(u16, DeviceStats)> {
        let mut stats = self.devices.iter()
            .map(|(&id, state)| (id, state.stats.clone()))
            .collect::<Vec<_>>();
        stats.sort_by_key(|(id, _)| *id);
        stats
    }

    #[allow(clippy::too_many_arguments)]
    fn classify_and_buffer(
        state: &mut DeviceState,
        config: &CollectorConfig,
        header: &PacketHeader,
        readings: Vec<Reading>,
        packet_size: usize,
        arrival: Instant,
        arrival_wallclock: f64,
        processing_started: Instant,
        records: &mut Vec<DeliveryRecord>,
    ) {
        state.stats.packets += 1;
        state.stats.bytes += packet_size as u64;
        state.stats.readings += readings.len() as u64;

        let batched = header.flags.contains(PacketFlags::BATCHED);

        let logical = match state.unwrap_seq(header.seq_num) {
            Some(logical) => logical,
            None => {
                // so far behind the anchor that it cannot be represented;
                //  treat like any other already-seen sequence number
                Self::record_duplicate(state, header, &readings, batched, packet_size,
                                       arrival_wallclock, processing_started, records);
                return;
            }
        };

        let behind_cursor = state.last_delivered.map(|cursor| logical <= cursor).unwrap_or(false);
        if behind_cursor || state.pending.contains_key(&logical) {
            debug!("device {}: duplicate of seq {}", state.device_id, header.seq_num);
            Self::record_duplicate(state, header, &readings, batched, packet_size,
                                   arrival_wallclock, processing_started, records);
            return;
        }

        if let Some(highest) = state.highest_arrived {
            if logical < highest {
                state.stats.reorder_events += 1;
                debug!("device {}: seq {} arrived out of order (highest seen is ahead by {})",
                    state.device_id, header.seq_num, highest - logical);
            }
        }
        state.highest_arrived = Some(state.highest_arrived.map_or(logical, |h| h.max(logical)));

        state.pending.insert(logical, PendingPacket {
            seq_num: header.seq_num,
            send_timestamp: header.timestamp,
            readings,
            batched,
            packet_size,
            arrival,
            arrival_wallclock,
            cpu_time_ms: elapsed_ms(processing_started),
        });

        // A forward jump beyond the configured bound points to a restarted
        //  or corrupt counter rather than loss; waiting out the reorder
        //  window for thousands of sequence numbers would only delay the
        //  inevitable, so the device's buffer is flushed right away.
        if let Some(cursor) = state.last_delivered {
            if logical - cursor > config.max_forward_jump as u64 {
                warn!("device {}: forward jump of {} sequence numbers (bound is {}) - flushing pending buffer",
                    state.device_id, logical - cursor, config.max_forward_jump);
                Self::drain_all_pending(state, records);
                return;
            }
        }

        if config.reorder_window.is_none() {
            // reordering disabled: emit in arrival order, immediately
            Self::emit_pending(state, logical, records);
            return;
        }

        if state.last_delivered.is_none() {
            // first packet of this device anchors the delivered order
            Self::emit_pending(state, logical, records);
        }
        Self::drain_contiguous(state, records);

        while state.pending.len() > config.max_pending_per_device {
            let (&oldest, _) = state.pending.first_key_value().expect("pending is non-empty");
            state.stats.forced_flushes += 1;
            warn!("device {}: pending buffer exceeds its bound of {} - force-emitting oldest",
                state.device_id, config.max_pending_per_device);
            Self::emit_pending(state, oldest, records);
            Self::drain_contiguous(state, records);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_duplicate(
        state: &mut DeviceState,
        header: &PacketHeader,
        readings: &[Reading],
        batched: bool,
        packet_size: usize,
        arrival_wallclock: f64,
        processing_started: Instant,
        records: &mut Vec<DeliveryRecord>,
    ) {
        state.stats.duplicates += 1;
        let cpu_time_ms = elapsed_ms(processing_started);
        state.stats.cpu_time_ms += cpu_time_ms;

        // a duplicate is never also flagged as causing a gap
        records.push(DeliveryRecord {
            arrival_time: arrival_wallclock,
            device_id: state.device_id,
            seq_num: header.seq_num,
            send_timestamp: header.timestamp,
            duplicate: true,
            gap: false,
            gap_size: 0,
            num_readings: readings.len(),
            batched,
            packet_size_bytes: packet_size,
            cpu_time_ms,
        });
    }

    /// Accepts the given pending packet into the delivered order: accounts
    ///  for the gap before it, advances the delivery cursor and produces
    ///  its record.
    fn emit_pending(state: &mut DeviceState, logical: u64, records: &mut Vec<DeliveryRecord>) {
        let packet = state.pending.remove(&logical).expect("caller checked presence");

        let gap_size = match state.last_delivered {
            Some(cursor) => logical - cursor - 1,
            None => 0,
        };
        let gap = gap_size > 0;
        if gap {
            state.stats.gaps += 1;
            state.stats.missing += gap_size;
            debug!("device {}: gap of {} sequence numbers before seq {}",
                state.device_id, gap_size, packet.seq_num);
        }

        state.last_delivered = Some(logical);
        state.stats.cpu_time_ms += packet.cpu_time_ms;

        records.push(DeliveryRecord {
            arrival_time: packet.arrival_wallclock,
            device_id: state.device_id,
            seq_num: packet.seq_num,
            send_timestamp: packet.send_timestamp,
            duplicate: false,
            gap,
            gap_size: min(gap_size, u16::MAX as u64) as u16,
            num_readings: packet.readings.len(),
            batched: packet.batched,
            packet_size_bytes: packet.packet_size,
            cpu_time_ms: packet.cpu_time_ms,
        });
    }

    /// emits the contiguous run starting right after the delivery cursor
    fn drain_contiguous(state: &mut DeviceState, records: &mut Vec<DeliveryRecord>) {
        while let Some(cursor) = state.last_delivered {
            let next = cursor + 1;
            if !state.pending.contains_key(&next) {
                break;
            }
            Self::emit_pending(state, next, records);
        }
    }

    /// emits everything pending, in ascending sequence order
    fn drain_all_pending(state: &mut DeviceState, records: &mut Vec<DeliveryRecord>) {
        while let Some((&oldest, _)) = state.pending.first_key_value() {
            Self::emit_pending(state, oldest, records);
        }
    }
}

fn wallclock_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
