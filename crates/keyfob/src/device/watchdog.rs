//! Connection inactivity watchdog

use crate::transport::{
    BleEvent, BleTransport, Datagram, DatagramTransport, LocalCharacteristic, TransportResult,
};
use crate::types::{Millis, PeerId};
use crate::uuid::Uuid;

/// Tracks the time since the last link activity
#[derive(Debug, Clone)]
pub struct ActivityWatchdog {
    timeout_ms: Millis,
    last_activity: Millis,
}

impl ActivityWatchdog {
    /// Create a watchdog that expires after `timeout_ms` without activity
    pub fn new(timeout_ms: Millis) -> Self {
        Self {
            timeout_ms,
            last_activity: 0,
        }
    }

    /// Record activity
    pub fn feed(&mut self, now: Millis) {
        self.last_activity = now;
    }

    /// Time since the last recorded activity
    pub fn idle_for(&self, now: Millis) -> Millis {
        now.saturating_sub(self.last_activity)
    }

    /// Whether the idle time exceeds the timeout
    pub fn expired(&self, now: Millis) -> bool {
        self.idle_for(now) > self.timeout_ms
    }
}

/// Transport wrapper that notes whether any frame was received through it
///
/// Engines consume frames themselves; the orchestrator hands them a tap so
/// every inbound datagram counts as activity.
pub struct ActivityTap<'a, T: ?Sized> {
    inner: &'a mut T,
    received: bool,
}

impl<'a, T: ?Sized> ActivityTap<'a, T> {
    pub fn new(inner: &'a mut T) -> Self {
        Self {
            inner,
            received: false,
        }
    }

    /// Whether a frame came in since the tap was created
    pub fn received(&self) -> bool {
        self.received
    }
}

impl<T: DatagramTransport + ?Sized> DatagramTransport for ActivityTap<'_, T> {
    fn send(&mut self, to: PeerId, data: &[u8]) -> TransportResult<()> {
        self.inner.send(to, data)
    }

    fn receive(&mut self) -> Option<Datagram> {
        let datagram = self.inner.receive();
        self.received |= datagram.is_some();
        datagram
    }

    fn set_own_address(&mut self, id: PeerId) {
        self.inner.set_own_address(id);
    }

    fn set_peer_address(&mut self, id: PeerId) {
        self.inner.set_peer_address(id);
    }

    fn own_address(&self) -> PeerId {
        self.inner.own_address()
    }

    fn peer_address(&self) -> PeerId {
        self.inner.peer_address()
    }
}

impl<T: BleTransport + ?Sized> BleTransport for ActivityTap<'_, T> {
    fn init(&mut self) -> TransportResult<()> {
        self.inner.init()
    }

    fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn is_bonded(&self) -> bool {
        self.inner.is_bonded()
    }

    fn is_secured(&self) -> bool {
        self.inner.is_secured()
    }

    fn start_advertising(&mut self, timeout_ms: Millis) -> TransportResult<()> {
        self.inner.start_advertising(timeout_ms)
    }

    fn disconnect(&mut self, timeout_ms: Millis) -> TransportResult<()> {
        self.inner.disconnect(timeout_ms)
    }

    fn sleep(&mut self) {
        self.inner.sleep();
    }

    fn program_peripheral(
        &mut self,
        characteristics: &[LocalCharacteristic],
        device_name: &str,
    ) -> TransportResult<()> {
        self.inner.program_peripheral(characteristics, device_name)
    }

    fn local_handle(&self, uuid: &Uuid) -> Option<u16> {
        self.inner.local_handle(uuid)
    }

    fn begin_peripheral(&mut self, characteristics: &[LocalCharacteristic]) -> TransportResult<()> {
        self.inner.begin_peripheral(characteristics)
    }

    fn read_local_characteristic(&mut self, characteristic: &LocalCharacteristic) -> Option<Vec<u8>> {
        self.inner.read_local_characteristic(characteristic)
    }

    fn write_local_characteristic(
        &mut self,
        characteristic: &LocalCharacteristic,
        value: &[u8],
    ) -> TransportResult<()> {
        self.inner.write_local_characteristic(characteristic, value)
    }

    fn poll_event(&mut self) -> Option<BleEvent> {
        self.inner.poll_event()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimAir;

    #[test]
    fn test_expiry_and_feed() {
        let mut watchdog = ActivityWatchdog::new(100);
        watchdog.feed(1_000);

        assert!(!watchdog.expired(1_100));
        assert!(watchdog.expired(1_101));

        watchdog.feed(1_101);
        assert!(!watchdog.expired(1_150));
        assert_eq!(watchdog.idle_for(1_150), 49);
    }

    #[test]
    fn test_tap_notices_received_frames() {
        let air = SimAir::new();
        let mut fob = air.endpoint(PeerId(2));
        let mut lock = air.endpoint(PeerId(1));

        let mut tap = ActivityTap::new(&mut fob);
        assert!(tap.receive().is_none());
        assert!(!tap.received());

        lock.send(PeerId(2), &[1]).unwrap();
        assert!(tap.receive().is_some());
        assert!(tap.received());
    }
}
