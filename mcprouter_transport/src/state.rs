//! Relay state machine.
//!
//! The bridge processes one message at a time. This module makes that explicit:
//! a round trip may only start from `Idle`, so a second concurrent forward is a
//! rejected transition rather than a silent race. State changes are published
//! on a `tokio::sync::watch` channel so observers see them without polling.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Waiting for the next framed message or direct send.
    Idle,
    /// An HTTP round trip is in flight.
    Forwarding,
    /// The reply (or synthesized error) is being written to the output stream.
    WritingResponse,
    /// The bridge shut down; no further transitions.
    Closed,
}

#[derive(Debug)]
pub struct RelayStateMachine {
    sender: watch::Sender<RelayState>,
    // Keep a receiver to ensure the channel stays alive
    _receiver: watch::Receiver<RelayState>,
}

impl RelayStateMachine {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(RelayState::Idle);
        Self {
            sender,
            _receiver: receiver,
        }
    }

    pub fn current(&self) -> RelayState {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RelayState> {
        self.sender.subscribe()
    }

    /// Idle → Forwarding
    pub fn begin_forwarding(&self) -> Result<(), &'static str> {
        self.step(RelayState::Idle, RelayState::Forwarding)
            .map_err(|_| "Can only start forwarding from Idle")
    }

    /// Forwarding → WritingResponse
    pub fn begin_writing(&self) -> Result<(), &'static str> {
        self.step(RelayState::Forwarding, RelayState::WritingResponse)
            .map_err(|_| "Can only write a response after forwarding")
    }

    /// Forwarding | WritingResponse → Idle
    pub fn finish(&self) -> Result<(), &'static str> {
        let mut transitioned = false;
        self.sender.send_if_modified(|state| {
            if matches!(state, RelayState::Forwarding | RelayState::WritingResponse) {
                *state = RelayState::Idle;
                transitioned = true;
            }
            transitioned
        });
        if transitioned {
            Ok(())
        } else {
            Err("No round trip in progress")
        }
    }

    /// Any state → Closed. Returns false if already closed.
    pub fn close(&self) -> bool {
        self.sender.send_if_modified(|state| {
            if *state == RelayState::Closed {
                false
            } else {
                *state = RelayState::Closed;
                true
            }
        })
    }

    fn step(&self, from: RelayState, to: RelayState) -> Result<(), RelayState> {
        let mut observed = from;
        self.sender.send_if_modified(|state| {
            observed = *state;
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if observed == from {
            Ok(())
        } else {
            Err(observed)
        }
    }
}

impl Default for RelayStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle() {
        let sm = RelayStateMachine::new();
        assert_eq!(sm.current(), RelayState::Idle);
        sm.begin_forwarding().unwrap();
        assert_eq!(sm.current(), RelayState::Forwarding);
        sm.begin_writing().unwrap();
        assert_eq!(sm.current(), RelayState::WritingResponse);
        sm.finish().unwrap();
        assert_eq!(sm.current(), RelayState::Idle);
    }

    #[test]
    fn second_forward_is_rejected_while_in_flight() {
        let sm = RelayStateMachine::new();
        sm.begin_forwarding().unwrap();
        assert!(sm.begin_forwarding().is_err());
        sm.begin_writing().unwrap();
        assert!(sm.begin_forwarding().is_err());
    }

    #[test]
    fn writing_requires_forwarding() {
        let sm = RelayStateMachine::new();
        assert!(sm.begin_writing().is_err());
        assert!(sm.finish().is_err());
    }

    #[test]
    fn closed_is_terminal() {
        let sm = RelayStateMachine::new();
        assert!(sm.close());
        assert!(!sm.close());
        assert!(sm.begin_forwarding().is_err());
        assert!(sm.finish().is_err());
        assert_eq!(sm.current(), RelayState::Closed);
    }

    #[test]
    fn subscribers_see_transitions() {
        let sm = RelayStateMachine::new();
        let mut rx = sm.subscribe();
        assert_eq!(*rx.borrow(), RelayState::Idle);

        sm.begin_forwarding().unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), RelayState::Forwarding);
    }
}
