//! The µTP/1 collector. It listens on a UDP socket, decodes inbound
//!  datagrams, and runs every packet through a per-device state machine
//!  that classifies it as in-order, duplicate or gap-causing - restoring
//!  send order where network jitter delivered packets out of order - before
//!  appending one record per packet to a metrics sink.
//!
//! UDP's delivery model (unordered, lossy, duplicating) is the normal case
//!  here, not an error: nothing on the receive path may terminate the
//!  process. Malformed datagrams are dropped and logged, buffer pressure
//!  degrades by force-emitting the oldest entries, and only a failure to
//!  bind the socket at startup is fatal.

pub mod config;
pub mod device_state;
pub mod engine;
pub mod metrics;
pub mod receiver;
pub mod report;

#[cfg(test)]
mod tests {
    use tracing::Level;

    #[ctor::ctor]
    fn init_test_logging() {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(Level::DEBUG)
            .try_init()
            .ok();
    }
}
