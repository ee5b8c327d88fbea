use protocol::reading::Reading;

/// Accumulates sampled readings until they are flushed into one packet.
///
/// The batcher itself only tracks fullness; the time-based flush trigger
///  (report interval since the last flush) is owned by the run loop, which
///  keeps this type trivially testable.
pub struct Batcher {
    batch_size: usize,
    buffer: Vec<Reading>,
}

impl Batcher {
    pub fn new(batch_size: usize) -> Batcher {
        Batcher {
            batch_size,
            buffer: Vec::with_capacity(batch_size),
        }
    }

    pub fn push(&mut self, reading: Reading) {
        self.buffer.push(reading);
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// hands out the accumulated batch and resets the accumulator
    pub fn take_batch(&mut self) -> Vec<Reading> {
        std::mem::take(&mut self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(value: f32) -> Reading {
        Reading { value }
    }

    #[test]
    fn test_batch_of_one_is_immediately_full() {
        let mut batcher = Batcher::new(1);
        assert!(!batcher.is_full());

        batcher.push(reading(1.0));
        assert!(batcher.is_full());
        assert_eq!(batcher.take_batch().len(), 1);
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_seven_ticks_with_batch_size_three_yield_3_3_1() {
        let mut batcher = Batcher::new(3);
        let mut flushed = Vec::new();

        for i in 0..7 {
            batcher.push(reading(i as f32));
            if batcher.is_full() {
                flushed.push(batcher.take_batch());
            }
        }
        // the partial trailing batch is flushed once the run ends
        if !batcher.is_empty() {
            flushed.push(batcher.take_batch());
        }

        let sizes = flushed.iter().map(Vec::len).collect::<Vec<_>>();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_take_batch_preserves_input_order() {
        let mut batcher = Batcher::new(3);
        for i in 0..3 {
            batcher.push(reading(i as f32));
        }

        let values = batcher.take_batch().iter().map(|r| r.value).collect::<Vec<_>>();
        assert_eq!(values, vec![0.0, 1.0, 2.0]);
    }
}
