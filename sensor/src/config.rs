use anyhow::bail;
use protocol::codec;
use std::net::SocketAddr;
use std::time::Duration;

/// Run configuration for one sensor instance.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    pub server_addr: SocketAddr,

    /// identity of this device; every client instance is exactly one device
    pub device_id: u16,

    /// time between two synthetic samples
    pub sampling_interval: Duration,

    /// A non-empty batch is flushed when this much time has passed since the
    ///  last flush, even if it is not full. When the interval elapses with
    ///  an empty batch, a heartbeat is sent instead.
    pub report_interval: Duration,

    pub run_duration: Duration,

    /// readings per packet; 1 disables batching, i.e. every sampling tick
    ///  flushes immediately
    pub batch_size: usize,

    /// seed for the synthetic readings - equal seeds give equal runs
    pub seed: u64,

    /// upper bound for encoded datagrams
    pub max_packet_bytes: usize,
}

impl SensorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.device_id == 0 {
            bail!("device id must be at least 1");
        }
        if self.batch_size == 0 {
            bail!("batch size must be at least 1");
        }
        let max_readings = codec::max_readings_for(self.max_packet_bytes);
        if self.batch_size > max_readings {
            bail!("batch size {} exceeds the {} readings that fit into {} bytes",
                self.batch_size, max_readings, self.max_packet_bytes);
        }
        if self.sampling_interval.is_zero() {
            bail!("sampling interval must be positive");
        }
        if self.report_interval.is_zero() {
            bail!("report interval must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn valid_config() -> SensorConfig {
        SensorConfig {
            server_addr: "127.0.0.1:9000".parse().unwrap(),
            device_id: 1,
            sampling_interval: Duration::from_secs(1),
            report_interval: Duration::from_secs(5),
            run_duration: Duration::from_secs(60),
            batch_size: 1,
            seed: 42,
            max_packet_bytes: codec::DEFAULT_MAX_PACKET_BYTES,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[rstest]
    #[case::zero_device_id(|c: &mut SensorConfig| c.device_id = 0)]
    #[case::zero_batch_size(|c: &mut SensorConfig| c.batch_size = 0)]
    #[case::oversized_batch(|c: &mut SensorConfig| c.batch_size = 48)]
    #[case::zero_sampling_interval(|c: &mut SensorConfig| c.sampling_interval = Duration::ZERO)]
    #[case::zero_report_interval(|c: &mut SensorConfig| c.report_interval = Duration::ZERO)]
    fn test_invalid_config(#[case] break_it: fn(&mut SensorConfig)) {
        let mut config = valid_config();
        break_it(&mut config);
        assert!(config.validate().is_err());
    }
}
