//! Outbound message channel abstraction
//!
//! This module defines the trait for delivering events from the engine to
//! connected participants. The tunnel abstraction keeps the engine
//! transport-agnostic: WebSockets, Server-Sent Events, or an in-memory
//! queue in tests all work the same way. Sends are fire-and-forget; the
//! engine assumes no delivery acknowledgment.

use super::Event;

/// Trait for sending events through a per-participant communication tunnel
///
/// A session broadcast is simply a send to every tunnel in its roster, so
/// implementations only need to handle a single recipient.
pub trait Tunnel {
    /// Sends an event to the participant behind this tunnel
    fn send(&self, event: &Event);

    /// Closes the communication tunnel
    ///
    /// Called when the participant disconnects or the session no longer
    /// needs the connection.
    fn close(self);
}
