//! The µTP/1 sensor client. One instance represents exactly one device: it
//!  samples synthetic readings at a configured interval, batches them, and
//!  fires the resulting packets at a collector over UDP.
//!
//! Sending is strictly fire-and-forget: there is no acknowledgement and no
//!  retry path anywhere in this crate. A failed send is logged and then
//!  treated exactly like a packet the network dropped - that is the
//!  protocol's design, not an oversight.

pub mod batcher;
pub mod config;
pub mod readings;
pub mod sender;
