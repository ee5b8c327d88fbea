use crate::device_state::DeviceStats;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Aggregate and per-device summary, assembled once at shutdown after the
///  engine has been finalized.
pub struct FinalReport {
    pub runtime: Duration,
    pub devices: Vec<(u16, DeviceStats)>,
}

impl FinalReport {
    pub fn totals(&self) -> DeviceStats {
        let mut totals = DeviceStats::default();
        for (_, stats) in &self.devices {
            totals.packets += stats.packets;
            totals.readings += stats.readings;
            totals.bytes += stats.bytes;
            totals.duplicates += stats.duplicates;
            totals.gaps += stats.gaps;
            totals.missing += stats.missing;
            totals.reorder_events += stats.reorder_events;
            totals.forced_flushes += stats.forced_flushes;
            totals.cpu_time_ms += stats.cpu_time_ms;
        }
        totals
    }
}

impl Display for FinalReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let totals = self.totals();
        let runtime_secs = self.runtime.as_secs_f64();
        let per_packet = |value: f64| value / totals.packets.max(1) as f64;

        writeln!(f, "runtime: {:.2}s, devices: {}", runtime_secs, self.devices.len())?;
        writeln!(f, "packets: {} ({:.2}/s), readings: {}, bytes: {} ({:.1}/packet)",
            totals.packets,
            totals.packets as f64 / runtime_secs.max(f64::EPSILON),
            totals.readings,
            totals.bytes,
            per_packet(totals.bytes as f64))?;
        writeln!(f, "duplicates: {} ({:.2}%), gap events: {} ({} sequence numbers missing)",
            totals.duplicates,
            per_packet(totals.duplicates as f64 * 100.0),
            totals.gaps,
            totals.missing)?;
        writeln!(f, "reorder events: {}, forced flushes: {}, processing: {:.3}ms/packet",
            totals.reorder_events,
            totals.forced_flushes,
            per_packet(totals.cpu_time_ms))?;

        for (device_id, stats) in &self.devices {
            writeln!(f, "  device {}: packets={} readings={} bytes={} duplicates={} gaps={} missing={} reorder={} forced={}",
                device_id, stats.packets, stats.readings, stats.bytes, stats.duplicates,
                stats.gaps, stats.missing, stats.reorder_events, stats.forced_flushes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(packets: u64, duplicates: u64, gaps: u64, missing: u64) -> DeviceStats {
        DeviceStats {
            packets,
            readings: packets,
            bytes: packets * 20,
            duplicates,
            gaps,
            missing,
            ..DeviceStats::default()
        }
    }

    #[test]
    fn test_totals_aggregate_all_devices() {
        let report = FinalReport {
            runtime: Duration::from_secs(10),
            devices: vec![(1, stats(10, 1, 0, 0)), (2, stats(5, 0, 2, 4))],
        };

        let totals = report.totals();
        assert_eq!(totals.packets, 15);
        assert_eq!(totals.duplicates, 1);
        assert_eq!(totals.gaps, 2);
        assert_eq!(totals.missing, 4);
    }

    #[test]
    fn test_display_lists_every_device() {
        let report = FinalReport {
            runtime: Duration::from_secs(10),
            devices: vec![(1, stats(10, 0, 0, 0)), (7, stats(5, 0, 0, 0))],
        };

        let rendered = format!("{}", report);
        assert!(rendered.contains("device 1:"));
        assert!(rendered.contains("device 7:"));
        assert!(rendered.contains("packets: 15"));
    }

    #[test]
    fn test_display_handles_empty_run() {
        let report = FinalReport {
            runtime: Duration::from_millis(1),
            devices: Vec::new(),
        };

        // must not divide by zero
        let rendered = format!("{}", report);
        assert!(rendered.contains("packets: 0"));
    }
}
