use protocol::reading::Reading;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic synthetic sensor: rotates through temperature, humidity
///  and supply-voltage profiles with a little seeded jitter on top. Two
///  instances with the same seed produce identical reading streams, which
///  makes runs reproducible across repeated executions.
pub struct SyntheticSensor {
    rng: StdRng,
    reading_id: u64,
}

impl SyntheticSensor {
    pub fn new(seed: u64) -> SyntheticSensor {
        SyntheticSensor {
            rng: StdRng::seed_from_u64(seed),
            reading_id: 0,
        }
    }

    pub fn next_reading(&mut self) -> Reading {
        self.reading_id += 1;

        let value = match self.reading_id % 3 {
            1 => {
                // temperature, 20-40 °C
                let jitter: f32 = self.rng.random_range(-0.5..0.5);
                20.0 + (self.reading_id % 20) as f32 + jitter
            }
            2 => {
                // relative humidity, 30-90 %
                let jitter: f32 = self.rng.random_range(-1.0..1.0);
                30.0 + (self.reading_id % 60) as f32 + jitter
            }
            _ => {
                // supply voltage, 3-5 V
                let jitter: f32 = self.rng.random_range(-0.05..0.05);
                3.0 + (self.reading_id % 20) as f32 * 0.1 + jitter
            }
        };

        Reading { value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = SyntheticSensor::new(42);
        let mut b = SyntheticSensor::new(42);

        for _ in 0..50 {
            assert_eq!(a.next_reading(), b.next_reading());
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut a = SyntheticSensor::new(1);
        let mut b = SyntheticSensor::new(2);

        let differs = (0..10).any(|_| a.next_reading() != b.next_reading());
        assert!(differs);
    }

    #[test]
    fn test_values_stay_in_sensor_ranges() {
        let mut sensor = SyntheticSensor::new(7);

        for i in 1..=300u64 {
            let reading = sensor.next_reading();
            match i % 3 {
                1 => assert!((19.0..41.0).contains(&reading.value), "temperature out of range: {}", reading.value),
                2 => assert!((28.0..91.0).contains(&reading.value), "humidity out of range: {}", reading.value),
                _ => assert!((2.9..5.1).contains(&reading.value), "voltage out of range: {}", reading.value),
            }
        }
    }
}
