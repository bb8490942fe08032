//! Device I/O collaborator interface.
//!
//! The core never touches USB directly; it drives a [`Transport`] for
//! enumeration and opening, and a per-device [`Connection`] for traffic.

use crate::error::TransportError;
use crate::protocol::{InMessage, OutMessage};
use crate::types::DeviceIdentity;

/// Transport-assigned device id, stable for as long as the device stays plugged in.
pub type DeviceId = u32;

pub trait Transport {
    type Connection: Connection;

    /// One-time library startup. Called by [`crate::library::Library`] only.
    fn init(&self) -> Result<(), TransportError>;

    /// Library teardown, after the last user has gone.
    fn shutdown(&self);

    /// Ids of attached devices, at most `max` of them.
    fn enumerate(&self, max: usize) -> Result<Vec<DeviceId>, TransportError>;

    fn device_info(&self, id: DeviceId) -> Result<DeviceIdentity, TransportError>;

    fn open(&self, id: DeviceId) -> Result<Self::Connection, TransportError>;
}

/// An open device.
pub trait Connection {
    fn id(&self) -> DeviceId;

    /// Discard any buffered input.
    fn flush(&mut self) -> Result<(), TransportError>;

    fn send(&mut self, msg: &OutMessage) -> Result<(), TransportError>;

    /// Wait up to `timeout_ms` for the next message; `0` polls without blocking.
    fn read(&mut self, timeout_ms: u32) -> Result<InMessage, TransportError>;

    fn close(&mut self);
}
