use crate::error::DecodeError;
use crate::seq::SeqNum;
use bitflags::bitflags;
use bytes::{Buf, BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt::{Debug, Formatter};

/// Message kinds. HEARTBEAT packets are bare headers sent when a reporting
///  interval elapses without any sampled data, so a silent device remains
///  distinguishable from a lossy network path.
#[derive(Copy, Clone, Eq, PartialEq, Debug, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MsgKind {
    Heartbeat = 0,
    Data = 1,
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct PacketFlags: u8 {
        /// set iff the packet carries more than one reading
        const BATCHED = 0b0000_0001;
    }
}

/// The fixed 11-byte packet header (see the crate-level documentation for
///  the wire layout).
#[derive(Clone, Eq, PartialEq)]
pub struct PacketHeader {
    pub kind: MsgKind,
    pub device_id: u16,
    pub seq_num: SeqNum,
    /// send time, whole seconds since the Unix epoch
    pub timestamp: u32,
    pub flags: PacketFlags,
}

impl Debug for PacketHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let batched = if self.flags.contains(PacketFlags::BATCHED) { "+B" } else { "" };
        write!(f, "PCKT{{V1:{:?} dev={} seq={} @{}{}}}",
               self.kind, self.device_id, self.seq_num, self.timestamp, batched)
    }
}

impl PacketHeader {
    pub const PROTOCOL_VERSION_1: u8 = 1;
    pub const SERIALIZED_LEN: usize = 11;

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u8(Self::PROTOCOL_VERSION_1);
        buf.put_u8(self.kind.into());
        buf.put_u16(self.device_id);
        buf.put_u16(self.seq_num.to_raw());
        buf.put_u32(self.timestamp);
        buf.put_u8(self.flags.bits());
    }

    pub fn deser(buf: &mut impl Buf) -> Result<PacketHeader, DecodeError> {
        if buf.remaining() < Self::SERIALIZED_LEN {
            return Err(DecodeError::Truncated { len: buf.remaining() });
        }

        let version = buf.get_u8();
        if version != Self::PROTOCOL_VERSION_1 {
            return Err(DecodeError::UnsupportedVersion { version });
        }

        let raw_kind = buf.get_u8();
        let kind = MsgKind::try_from(raw_kind)
            .map_err(|_| DecodeError::UnknownKind { kind: raw_kind })?;

        Ok(PacketHeader {
            kind,
            device_id: buf.get_u16(),
            seq_num: SeqNum::from_raw(buf.get_u16()),
            timestamp: buf.get_u32(),
            flags: PacketFlags::from_bits_truncate(buf.get_u8()),
        })
    }
}
