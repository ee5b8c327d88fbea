use crate::error::{DecodeError, EncodeError};
use crate::packet_header::{MsgKind, PacketHeader};
use crate::reading::{self, Reading};
use bytes::{Buf, BytesMut};
use std::cmp::min;

/// Default upper bound for an encoded datagram. Small enough to stay far
///  away from any realistic MTU, large enough for a useful batch.
pub const DEFAULT_MAX_PACKET_BYTES: usize = 200;

/// The number of readings that fit into a packet of the given size
///  (header + count byte + 4 bytes per reading). The count byte caps this
///  at 255 no matter how large the packet bound is.
pub fn max_readings_for(max_packet_bytes: usize) -> usize {
    let by_size = max_packet_bytes.saturating_sub(PacketHeader::SERIALIZED_LEN + 1)
        / Reading::SERIALIZED_LEN;
    min(by_size, u8::MAX as usize)
}

/// Encodes a DATA packet, failing if the readings would not fit into
///  `max_packet_bytes`. The caller is responsible for the BATCHED flag
///  matching the batch size.
pub fn encode_data(
    header: &PacketHeader,
    readings: &[Reading],
    max_packet_bytes: usize,
) -> Result<BytesMut, EncodeError> {
    if readings.is_empty() {
        return Err(EncodeError::EmptyBatch);
    }

    let max_readings = max_readings_for(max_packet_bytes);
    if readings.len() > max_readings {
        return Err(EncodeError::TooManyReadings {
            num_readings: readings.len(),
            max_readings,
            max_packet_bytes,
        });
    }

    let mut buf = BytesMut::with_capacity(
        PacketHeader::SERIALIZED_LEN + 1 + readings.len() * Reading::SERIALIZED_LEN,
    );
    header.ser(&mut buf);
    reading::ser_readings(readings, &mut buf);
    Ok(buf)
}

/// a heartbeat is the bare header
pub fn encode_heartbeat(header: &PacketHeader) -> BytesMut {
    let mut buf = BytesMut::with_capacity(PacketHeader::SERIALIZED_LEN);
    header.ser(&mut buf);
    buf
}

/// Decodes a whole inbound datagram into its header and readings. This is a
///  pure transformation without side effects; all failure modes map to a
///  [DecodeError] variant so the receiver can drop and log.
pub fn decode_datagram(datagram: &[u8]) -> Result<(PacketHeader, Vec<Reading>), DecodeError> {
    let buf = &mut &datagram[..];
    let header = PacketHeader::deser(buf)?;

    let readings = match header.kind {
        MsgKind::Data => reading::deser_readings(buf)?,
        MsgKind::Heartbeat => {
            if buf.remaining() > 0 {
                return Err(DecodeError::TrailingBytes { len: buf.remaining() });
            }
            Vec::new()
        }
    };

    Ok((header, readings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet_header::PacketFlags;
    use crate::seq::SeqNum;
    use rstest::rstest;

    fn data_header(num_readings: usize) -> PacketHeader {
        let flags = if num_readings > 1 { PacketFlags::BATCHED } else { PacketFlags::empty() };
        PacketHeader {
            kind: MsgKind::Data,
            device_id: 7,
            seq_num: SeqNum::from_raw(42),
            timestamp: 1_700_000_000,
            flags,
        }
    }

    #[rstest]
    #[case::single(1)]
    #[case::small_batch(3)]
    #[case::max_batch(max_readings_for(DEFAULT_MAX_PACKET_BYTES))]
    fn test_data_round_trip(#[case] num_readings: usize) {
        let readings = (0..num_readings)
            .map(|i| Reading { value: i as f32 * 0.5 })
            .collect::<Vec<_>>();
        let header = data_header(num_readings);

        let buf = encode_data(&header, &readings, DEFAULT_MAX_PACKET_BYTES).unwrap();
        assert!(buf.len() <= DEFAULT_MAX_PACKET_BYTES);

        let (deser_header, deser_readings) = decode_datagram(&buf).unwrap();
        assert_eq!(deser_header, header);
        assert_eq!(deser_readings, readings);
    }

    #[test]
    fn test_heartbeat_round_trip() {
        let header = PacketHeader {
            kind: MsgKind::Heartbeat,
            device_id: 3,
            seq_num: SeqNum::from_raw(9),
            timestamp: 1_700_000_001,
            flags: PacketFlags::empty(),
        };

        let buf = encode_heartbeat(&header);
        assert_eq!(buf.len(), PacketHeader::SERIALIZED_LEN);

        let (deser_header, readings) = decode_datagram(&buf).unwrap();
        assert_eq!(deser_header, header);
        assert!(readings.is_empty());
    }

    #[test]
    fn test_encode_empty_batch() {
        assert_eq!(
            encode_data(&data_header(1), &[], DEFAULT_MAX_PACKET_BYTES),
            Err(EncodeError::EmptyBatch)
        );
    }

    #[test]
    fn test_encode_too_many_readings() {
        let max_readings = max_readings_for(DEFAULT_MAX_PACKET_BYTES);
        let readings = vec![Reading { value: 1.0 }; max_readings + 1];

        assert_eq!(
            encode_data(&data_header(readings.len()), &readings, DEFAULT_MAX_PACKET_BYTES),
            Err(EncodeError::TooManyReadings {
                num_readings: max_readings + 1,
                max_readings,
                max_packet_bytes: DEFAULT_MAX_PACKET_BYTES,
            })
        );
    }

    #[test]
    fn test_max_readings_never_exceeds_bound() {
        for max_packet_bytes in [32, 64, 100, DEFAULT_MAX_PACKET_BYTES, 1024] {
            let max_readings = max_readings_for(max_packet_bytes);
            let readings = vec![Reading { value: 0.25 }; max_readings];

            let buf = encode_data(&data_header(max_readings), &readings, max_packet_bytes).unwrap();
            assert!(buf.len() <= max_packet_bytes);
        }
    }

    #[test]
    fn test_decode_heartbeat_with_trailing_bytes() {
        let mut buf = encode_heartbeat(&PacketHeader {
            kind: MsgKind::Heartbeat,
            device_id: 3,
            seq_num: SeqNum::ZERO,
            timestamp: 0,
            flags: PacketFlags::empty(),
        });
        buf.extend_from_slice(&[0, 0]);

        assert_eq!(decode_datagram(&buf), Err(DecodeError::TrailingBytes { len: 2 }));
    }

    #[test]
    fn test_decode_data_with_mismatched_payload() {
        let readings = [Reading { value: 1.0 }];
        let mut buf = encode_data(&data_header(1), &readings, DEFAULT_MAX_PACKET_BYTES).unwrap();
        buf.extend_from_slice(&[9]);

        assert_eq!(
            decode_datagram(&buf),
            Err(DecodeError::PayloadMismatch { num_readings: 1, expected: 4, actual: 5 })
        );
    }
}
