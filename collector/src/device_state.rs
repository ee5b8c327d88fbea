use protocol::reading::Reading;
use protocol::seq::SeqNum;
use std::collections::BTreeMap;
use tokio::time::Instant;

/// a decoded packet waiting in the reorder buffer
pub(crate) struct PendingPacket {
    pub seq_num: SeqNum,
    pub send_timestamp: u32,
    pub readings: Vec<Reading>,
    pub batched: bool,
    pub packet_size: usize,
    /// monotonic arrival instant, drives the reorder-window deadline
    pub arrival: Instant,
    /// wall-clock arrival, seconds since the Unix epoch, for the record
    pub arrival_wallclock: f64,
    pub cpu_time_ms: f64,
}

/// per-device counters, aggregated into the final report
#[derive(Default, Clone, Debug)]
pub struct DeviceStats {
    pub packets: u64,
    pub readings: u64,
    pub bytes: u64,
    pub duplicates: u64,
    /// number of gap events (not the number of missing sequence numbers)
    pub gaps: u64,
    /// total count of sequence numbers that never arrived
    pub missing: u64,
    /// packets that arrived behind an already-arrived higher sequence number
    pub reorder_events: u64,
    /// emissions forced by the reorder window or the capacity bound
    pub forced_flushes: u64,
    pub cpu_time_ms: f64,
}

/// Server-side state of one device, created lazily on its first packet and
///  exclusively owned and mutated by the reorder engine.
///
/// Wire sequence numbers are 16 bit and wrap; internally they are unwrapped
///  onto a monotonic u64 'logical' number line via signed-difference
///  arithmetic around a moving anchor, so neither the delivery cursor nor
///  the pending buffer's keys ever wrap.
pub struct DeviceState {
    pub(crate) device_id: u16,

    /// logical sequence of the last packet accepted into the delivered
    ///  order; `None` until the first emission
    pub(crate) last_delivered: Option<u64>,

    /// anchor mapping wire sequence numbers onto the logical number line;
    ///  follows the highest sequence number seen so far
    anchor_logical: u64,
    anchor_seq: SeqNum,

    /// received but not yet emitted, keyed by logical sequence
    pub(crate) pending: BTreeMap<u64, PendingPacket>,

    /// highest logical sequence that has arrived, for reorder detection
    pub(crate) highest_arrived: Option<u64>,

    pub(crate) stats: DeviceStats,
}

impl DeviceState {
    pub(crate) fn new(device_id: u16, first_seq: SeqNum) -> DeviceState {
        DeviceState {
            device_id,
            last_delivered: None,
            // offset the anchor so slightly-older sequence numbers arriving
            //  late stay representable without underflow
            anchor_logical: (1 << 16) + first_seq.to_raw() as u64,
            anchor_seq: first_seq,
            pending: BTreeMap::new(),
            highest_arrived: None,
            stats: DeviceStats::default(),
        }
    }

    /// Maps a wire sequence number onto the device's logical number line.
    ///  Returns `None` for sequence numbers so far behind the anchor that
    ///  they fall off the representable range (only possible right after
    ///  device creation).
    pub(crate) fn unwrap_seq(&mut self, seq: SeqNum) -> Option<u64> {
        let diff = seq.signed_distance(self.anchor_seq) as i64;
        let logical = self.anchor_logical as i64 + diff;
        if logical < 0 {
            return None;
        }
        let logical = logical as u64;

        // move the anchor forward so consecutive wraps keep resolving
        if logical > self.anchor_logical {
            self.anchor_logical = logical;
            self.anchor_seq = seq;
        }
        Some(logical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::next(100, 101, 1)]
    #[case::same(100, 100, 0)]
    #[case::behind(100, 98, -2)]
    #[case::ahead(100, 150, 50)]
    fn test_unwrap_relative_to_anchor(#[case] first: u16, #[case] arriving: u16, #[case] expected_offset: i64) {
        let mut state = DeviceState::new(1, SeqNum::from_raw(first));
        let base = state.unwrap_seq(SeqNum::from_raw(first)).unwrap();

        let logical = state.unwrap_seq(SeqNum::from_raw(arriving)).unwrap();
        assert_eq!(logical as i64 - base as i64, expected_offset);
    }

    #[test]
    fn test_unwrap_is_monotonic_across_wrap() {
        let mut state = DeviceState::new(1, SeqNum::from_raw(65534));

        let mut prev = state.unwrap_seq(SeqNum::from_raw(65534)).unwrap();
        for raw in [65535u16, 0, 1, 2] {
            let logical = state.unwrap_seq(SeqNum::from_raw(raw)).unwrap();
            assert_eq!(logical, prev + 1);
            prev = logical;
        }
    }

    #[test]
    fn test_unwrap_late_packet_after_wrap_maps_behind() {
        let mut state = DeviceState::new(1, SeqNum::from_raw(65534));
        let base = state.unwrap_seq(SeqNum::from_raw(65534)).unwrap();

        // the anchor has moved past the wrap...
        let after_wrap = state.unwrap_seq(SeqNum::from_raw(2)).unwrap();
        assert_eq!(after_wrap, base + 4);

        // ...and a delayed pre-wrap sequence number still resolves below it
        let late = state.unwrap_seq(SeqNum::from_raw(65535)).unwrap();
        assert_eq!(late, base + 1);
    }
}
