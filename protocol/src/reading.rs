use crate::error::DecodeError;
use bytes::{Buf, BufMut, BytesMut};

/// One sensor sample. Readings are timestamped by the header of the packet
///  they travel in - there are no per-reading timestamps on the wire.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Reading {
    pub value: f32,
}

impl Reading {
    pub const SERIALIZED_LEN: usize = size_of::<f32>();
}

/// serializes the DATA payload: a count byte followed by the readings in
///  input order
pub fn ser_readings(readings: &[Reading], buf: &mut BytesMut) {
    debug_assert!(!readings.is_empty() && readings.len() <= u8::MAX as usize);

    buf.put_u8(readings.len() as u8);
    for reading in readings {
        buf.put_f32(reading.value);
    }
}

/// Parses a DATA payload. The remaining buffer must match the declared
///  reading count exactly - a datagram is accepted or rejected as a whole,
///  there is no partial salvage.
pub fn deser_readings(buf: &mut impl Buf) -> Result<Vec<Reading>, DecodeError> {
    if buf.remaining() < 1 {
        return Err(DecodeError::Truncated { len: 0 });
    }

    let num_readings = buf.get_u8();
    if num_readings == 0 {
        return Err(DecodeError::ZeroReadings);
    }

    let expected = num_readings as usize * Reading::SERIALIZED_LEN;
    if buf.remaining() != expected {
        return Err(DecodeError::PayloadMismatch {
            num_readings,
            expected,
            actual: buf.remaining(),
        });
    }

    let mut readings = Vec::with_capacity(num_readings as usize);
    for _ in 0..num_readings {
        readings.push(Reading { value: buf.get_f32() });
    }
    Ok(readings)
}
