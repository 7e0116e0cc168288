//! Observability events published by the bridge.
//!
//! Subscribers get a `tokio::sync::broadcast` receiver. The bridge does not care
//! how many there are; with none, events are simply dropped.

use crate::error::{BridgeError, FailureKind};
use crate::message::{JsonRpcMessage, RequestId};

/// Capacity of the event channel; slow subscribers observe `Lagged`.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// An inbound message was forwarded and its reply written.
    /// Carries the original inbound message, not the remote reply.
    Relayed(JsonRpcMessage),
    /// Something failed. `id` is the id of the message involved, when known.
    Failed {
        kind: FailureKind,
        id: Option<RequestId>,
        message: String,
    },
    /// The bridge shut down.
    Closed,
}

impl BridgeEvent {
    pub fn failed(error: &BridgeError, id: Option<RequestId>) -> Self {
        BridgeEvent::Failed {
            kind: error.kind(),
            id,
            message: error.to_string(),
        }
    }
}
