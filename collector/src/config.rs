use anyhow::bail;
use std::cmp::max;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration. The reorder window is the protocol's main tuning
///  knob: it trades delivery latency against the chance of restoring send
///  order for jittered packets, and is therefore exposed on the CLI rather
///  than hard-coded.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub bind_addr: SocketAddr,

    /// path of the append-only CSV metrics file
    pub csv_path: PathBuf,

    /// How long a missing sequence number is awaited before later packets
    ///  are emitted anyway. `None` disables reordering entirely: packets
    ///  are then recorded in arrival order.
    pub reorder_window: Option<Duration>,

    /// how often pending buffers are swept for timed-out entries
    pub sweep_interval: Duration,

    /// Safety bound for the per-device pending buffer. Exceeding it
    ///  force-emits the oldest entries instead of growing without bound.
    pub max_pending_per_device: usize,

    /// Forward sequence jumps beyond this are treated as a restarted or
    ///  corrupt counter: the device's pending packets are flushed and the
    ///  engine continues from the new position. Must stay within the
    ///  positive half of the 16-bit sequence space.
    pub max_forward_jump: u16,

    /// stop accepting new work after this long; `None` runs until ctrl-c
    pub run_duration: Option<Duration>,

    /// time to keep absorbing delayed in-flight packets after the run
    ///  duration has elapsed
    pub drain_period: Duration,
}

impl CollectorConfig {
    pub fn new(
        bind_addr: SocketAddr,
        csv_path: PathBuf,
        reorder_window: Option<Duration>,
        run_duration: Option<Duration>,
    ) -> CollectorConfig {
        // sweeping considerably faster than the window keeps the worst-case
        //  force-emit delay at ~1.25 windows
        let sweep_interval = reorder_window
            .map(|window| max(window / 4, Duration::from_millis(10)))
            .unwrap_or(Duration::from_secs(1));

        CollectorConfig {
            bind_addr,
            csv_path,
            reorder_window,
            sweep_interval,
            max_pending_per_device: 1024,
            max_forward_jump: 8192,
            run_duration,
            drain_period: Duration::from_secs(2),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(window) = self.reorder_window {
            if window.is_zero() {
                bail!("reorder window must be positive (or reordering disabled)");
            }
        }
        if self.sweep_interval.is_zero() {
            bail!("sweep interval must be positive");
        }
        if self.max_pending_per_device == 0 {
            bail!("pending buffer bound must be at least 1");
        }
        if self.max_forward_jump == 0 || self.max_forward_jump > i16::MAX as u16 {
            bail!("max forward jump must be between 1 and {}", i16::MAX);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CollectorConfig {
        CollectorConfig::new(
            "127.0.0.1:0".parse().unwrap(),
            PathBuf::from("telemetry_log.csv"),
            Some(Duration::from_millis(250)),
            None,
        )
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(test_config().validate().is_ok());

        let no_reorder = CollectorConfig::new(
            "127.0.0.1:0".parse().unwrap(),
            PathBuf::from("telemetry_log.csv"),
            None,
            None,
        );
        assert!(no_reorder.validate().is_ok());
    }

    #[test]
    fn test_sweep_interval_derived_from_window() {
        let config = test_config();
        assert_eq!(config.sweep_interval, Duration::from_micros(62_500));

        let tiny = CollectorConfig::new(
            "127.0.0.1:0".parse().unwrap(),
            PathBuf::from("x.csv"),
            Some(Duration::from_millis(20)),
            None,
        );
        assert_eq!(tiny.sweep_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_invalid_forward_jump() {
        let mut config = test_config();
        config.max_forward_jump = 0;
        assert!(config.validate().is_err());

        config.max_forward_jump = 40000;
        assert!(config.validate().is_err());
    }
}
