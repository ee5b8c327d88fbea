//! µTP/1 is a compact, fire-and-forget telemetry protocol on top of UDP,
//!  designed for IoT-style sensor reporting. It deliberately does *not*
//!  attempt reliable delivery - there are no acknowledgements, no
//!  retransmission and no congestion control. Instead, every packet carries
//!  enough sequencing information for the receiving side to make loss,
//!  duplication, delay and reordering *observable*.
//!
//! ## Design goals
//!
//! * One datagram per report, small enough to never be fragmented
//!   * a configurable upper bound for the encoded size, enforced at encode
//!     time
//! * Several readings can share one packet (batching), with a flag making
//!   the batching visible to the receiver
//! * Per-device sequence numbers make gaps and duplicates detectable
//!   * 16 bit, wrapping modulo 65536 - ordering is defined by
//!     signed-difference arithmetic on the circular number line, never by
//!     naive comparison
//! * Loss is accepted: a dropped packet is never re-sent, a send failure is
//!   treated exactly like network loss
//!
//! ## Wire format
//!
//! Fixed 11-byte packet header, all numbers in network byte order (BE):
//! ```ascii
//! 0:  protocol version (u8) - currently always 1
//! 1:  message kind (u8):
//!     * 0 HEARTBEAT - no payload
//!     * 1 DATA - payload as described below
//! 2:  device id (u16): identity of the sending device; one client instance
//!      is exactly one device
//! 4:  sequence number (u16): per-device counter, incremented once per
//!      *packet* (not per reading), wrapping to 0 after 65535
//! 6:  timestamp (u32): whole seconds since the Unix epoch, stamped when
//!      the packet is flushed
//! 10: flags (u8):
//!     * bit 0: BATCHED - set iff the packet carries more than one reading
//!     * bits 1-7: unused, should be 0
//! ```
//!
//! DATA payload, immediately after the header:
//! ```ascii
//! 0: number of readings (u8), at least 1
//! *: (repeated) reading value (f32 BE, IEEE-754 binary32)
//! ```
//!
//! The payload length must match the declared reading count exactly;
//!  datagrams with trailing or missing bytes are rejected as a whole.
//! HEARTBEAT packets consist of the bare header.

pub mod codec;
pub mod error;
pub mod packet_header;
pub mod reading;
pub mod seq;
