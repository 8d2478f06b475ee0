//! Simulated packet radio

use crate::transport::{Datagram, DatagramTransport, RadioTransport, TransportError, TransportResult};
use crate::types::PeerId;
use log::trace;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Largest frame the simulated radio carries
pub const SIM_RADIO_MTU: usize = 255;

#[derive(Debug, Clone)]
struct Frame {
    from: PeerId,
    to: PeerId,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct AirState {
    frames: VecDeque<Frame>,
    drop_next: usize,
}

/// Shared medium connecting any number of [`SimRadio`] endpoints
#[derive(Debug, Clone, Default)]
pub struct SimAir {
    state: Arc<Mutex<AirState>>,
}

impl SimAir {
    /// Create an empty medium
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an endpoint listening on `address`
    pub fn endpoint(&self, address: PeerId) -> SimRadio {
        SimRadio {
            air: self.clone(),
            endpoint: Arc::new(Mutex::new(EndpointState::new(address))),
        }
    }

    /// Silently lose the next `count` transmitted frames
    pub fn drop_next(&self, count: usize) {
        self.lock().drop_next = count;
    }

    /// Number of frames waiting for delivery
    pub fn pending(&self) -> usize {
        self.lock().frames.len()
    }

    fn lock(&self) -> MutexGuard<'_, AirState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transmit(&self, frame: Frame) {
        let mut air = self.lock();
        if air.drop_next > 0 {
            air.drop_next -= 1;
            trace!("Air dropped frame {} -> {}", frame.from, frame.to);
            return;
        }
        air.frames.push_back(frame);
    }

    fn take_for(&self, address: PeerId) -> Option<Frame> {
        let mut air = self.lock();
        let index = air
            .frames
            .iter()
            .position(|f| f.from != address && (f.to == address || f.to.is_broadcast()))?;
        air.frames.remove(index)
    }
}

#[derive(Debug)]
struct EndpointState {
    own: PeerId,
    peer: PeerId,
    initialized: bool,
    asleep: bool,
    fail_sends: bool,
    fail_init: bool,
    sent: Vec<(PeerId, Vec<u8>)>,
}

impl EndpointState {
    fn new(own: PeerId) -> Self {
        Self {
            own,
            peer: PeerId::BROADCAST,
            initialized: false,
            asleep: false,
            fail_sends: false,
            fail_init: false,
            sent: Vec::new(),
        }
    }
}

/// One radio endpoint on a [`SimAir`]
#[derive(Debug, Clone)]
pub struct SimRadio {
    air: SimAir,
    endpoint: Arc<Mutex<EndpointState>>,
}

impl SimRadio {
    fn lock(&self) -> MutexGuard<'_, EndpointState> {
        self.endpoint.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every following send fail
    pub fn set_fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    /// Make the next initialization fail
    pub fn set_fail_init(&self, fail: bool) {
        self.lock().fail_init = fail;
    }

    /// Deliver a frame to this endpoint as if `from` had sent it
    pub fn inject(&self, from: PeerId, data: &[u8]) {
        let to = self.lock().own;
        self.air.transmit(Frame {
            from,
            to,
            data: data.to_vec(),
        });
    }

    /// Every frame this endpoint transmitted, with its destination
    pub fn sent_frames(&self) -> Vec<(PeerId, Vec<u8>)> {
        self.lock().sent.clone()
    }

    /// Whether the radio was put to sleep
    pub fn is_asleep(&self) -> bool {
        self.lock().asleep
    }

    /// Whether the radio was initialized
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }
}

impl DatagramTransport for SimRadio {
    fn send(&mut self, to: PeerId, data: &[u8]) -> TransportResult<()> {
        let from = {
            let mut state = self.lock();
            if state.fail_sends {
                return Err(TransportError::SendFailed(to));
            }
            if data.len() > SIM_RADIO_MTU {
                return Err(TransportError::FrameTooLarge(data.len()));
            }
            state.sent.push((to, data.to_vec()));
            state.own
        };

        trace!("Radio {} -> {}: {}", from, to, hex::encode(data));
        self.air.transmit(Frame {
            from,
            to,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn receive(&mut self) -> Option<Datagram> {
        let own = self.lock().own;
        self.air
            .take_for(own)
            .map(|frame| Datagram::new(frame.from, frame.data))
    }

    fn set_own_address(&mut self, id: PeerId) {
        self.lock().own = id;
    }

    fn set_peer_address(&mut self, id: PeerId) {
        self.lock().peer = id;
    }

    fn own_address(&self) -> PeerId {
        self.lock().own
    }

    fn peer_address(&self) -> PeerId {
        self.lock().peer
    }
}

impl RadioTransport for SimRadio {
    fn init(&mut self) -> TransportResult<()> {
        let mut state = self.lock();
        if state.fail_init {
            return Err(TransportError::Unavailable("radio did not answer".into()));
        }
        state.initialized = true;
        state.asleep = false;
        Ok(())
    }

    fn sleep(&mut self) {
        self.lock().asleep = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_reach_addressee_only() {
        let air = SimAir::new();
        let mut a = air.endpoint(PeerId(1));
        let mut b = air.endpoint(PeerId(2));
        let mut c = air.endpoint(PeerId(3));

        a.send(PeerId(2), &[1, 2, 3]).unwrap();

        assert!(c.receive().is_none());
        assert_eq!(b.receive(), Some(Datagram::new(PeerId(1), vec![1, 2, 3])));
        assert!(b.receive().is_none());
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let air = SimAir::new();
        let mut a = air.endpoint(PeerId(1));
        let mut b = air.endpoint(PeerId(2));

        a.send(PeerId::BROADCAST, &[9]).unwrap();

        assert!(a.receive().is_none());
        assert_eq!(b.receive().map(|d| d.data), Some(vec![9]));
    }

    #[test]
    fn test_dropped_and_failed_sends() {
        let air = SimAir::new();
        let mut a = air.endpoint(PeerId(1));

        air.drop_next(1);
        a.send(PeerId(2), &[1]).unwrap();
        assert_eq!(air.pending(), 0);

        a.set_fail_sends(true);
        assert_eq!(a.send(PeerId(2), &[1]), Err(TransportError::SendFailed(PeerId(2))));
    }
}
