use thiserror::Error;

/// Things that can go wrong when producing a wire packet. Encoding is fully
///  under the sender's control, so every variant points to a configuration
///  or caller bug rather than to network conditions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("a DATA packet must carry at least one reading")]
    EmptyBatch,

    #[error("{num_readings} readings exceed the {max_readings} that fit into a {max_packet_bytes} byte packet")]
    TooManyReadings {
        num_readings: usize,
        max_readings: usize,
        max_packet_bytes: usize,
    },
}

/// Decode failures. All of these cause the datagram to be dropped and
///  logged by the receiver - none of them may terminate the receive loop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("datagram of {len} bytes is too short for a µTP/1 packet")]
    Truncated { len: usize },

    #[error("unsupported protocol version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("unknown message kind {kind}")]
    UnknownKind { kind: u8 },

    #[error("DATA packet declares zero readings")]
    ZeroReadings,

    #[error("payload of {actual} bytes does not match {num_readings} declared readings ({expected} bytes)")]
    PayloadMismatch {
        num_readings: u8,
        expected: usize,
        actual: usize,
    },

    #[error("HEARTBEAT packet carries {len} unexpected payload bytes")]
    TrailingBytes { len: usize },
}
