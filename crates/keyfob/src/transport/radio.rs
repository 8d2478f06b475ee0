//! Datagram transport shared by the radio and the BLE data channel

use super::types::{Datagram, TransportResult};
use crate::types::PeerId;

/// Non-blocking, addressed datagram transport
///
/// Frame-level reliability is the driver's job. Absence of data is a normal
/// condition reported as `None`, never as an error.
pub trait DatagramTransport {
    /// Queue a frame for `to`. Fails only if the send cannot be issued.
    fn send(&mut self, to: PeerId, data: &[u8]) -> TransportResult<()>;

    /// Next received frame, if any
    fn receive(&mut self) -> Option<Datagram>;

    /// Set the address this endpoint answers to
    fn set_own_address(&mut self, id: PeerId);

    /// Set the default destination
    fn set_peer_address(&mut self, id: PeerId);

    /// Address this endpoint answers to
    fn own_address(&self) -> PeerId;

    /// Default destination
    fn peer_address(&self) -> PeerId;
}

/// Long-range radio
pub trait RadioTransport: DatagramTransport {
    /// Bring up the radio. The radio must be set up before it can be put to sleep.
    fn init(&mut self) -> TransportResult<()>;

    /// Enter the radio's low-power mode
    fn sleep(&mut self);
}
