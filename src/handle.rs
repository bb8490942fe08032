use crate::error::{FreespaceError, TransportError};
use crate::protocol::{InMessage, OutMessage};
use crate::transport::{Connection, DeviceId, Transport};
use crate::types::DeviceIdentity;
use crate::Result;

/// Exclusive owner of one open device connection.
///
/// The connection is closed exactly once: by the first [`DeviceHandle::close`]
/// or, failing that, on drop. Callers are responsible for never opening the
/// same id twice (see [`crate::detection::ClaimRegistry`]).
pub struct DeviceHandle<C: Connection> {
    connection: C,
    identity: DeviceIdentity,
    closed: bool,
}

impl<C: Connection> DeviceHandle<C> {
    /// Open `id`, read its identity and flush stale input.
    pub fn open<T>(transport: &T, id: DeviceId) -> Result<Self>
    where
        T: Transport<Connection = C>,
    {
        let mut connection = transport
            .open(id)
            .map_err(|source| FreespaceError::Open { id, source })?;

        let identity = match transport.device_info(id) {
            Ok(identity) => identity,
            Err(source) => {
                connection.close();
                return Err(FreespaceError::Open { id, source });
            }
        };

        log::info!(
            "Opened Freespace device {}: {} (VID={:04X} PID={:04X})",
            id,
            identity.name,
            identity.vendor_id,
            identity.product_id
        );

        Ok(Self::from_connection(connection, identity))
    }

    /// Wrap an already-open connection. Flushes once; a failed flush is
    /// logged and the handle is still returned.
    pub fn from_connection(connection: C, identity: DeviceIdentity) -> Self {
        let mut handle = Self {
            connection,
            identity,
            closed: false,
        };
        if let Err(e) = handle.flush() {
            log::warn!("Error flushing device {}: {}", handle.id(), e);
        }
        handle
    }

    pub fn id(&self) -> DeviceId {
        self.connection.id()
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn flush(&mut self) -> std::result::Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.connection.flush()
    }

    pub fn send(&mut self, msg: &OutMessage) -> Result<()> {
        if self.closed {
            return Err(FreespaceError::SessionClosed);
        }
        self.connection.send(msg).map_err(FreespaceError::Send)
    }

    pub fn read(&mut self, timeout_ms: u32) -> std::result::Result<InMessage, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.connection.read(timeout_ms)
    }

    /// Close the connection. Only the first call has any effect.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.connection.close();
        log::info!("Closed Freespace device {}", self.id());
    }
}

impl<C: Connection> Drop for DeviceHandle<C> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FSM9_PID;
    use crate::transport::mock::{Event, MockTransport};

    #[test]
    fn test_open_flushes_once() {
        let mock = MockTransport::new().with_device(4, FSM9_PID);
        let handle = DeviceHandle::open(&mock, 4).unwrap();
        assert_eq!(handle.identity().product_id, FSM9_PID);
        assert_eq!(mock.events(), vec![Event::Open(4), Event::Flush(4)]);
    }

    #[test]
    fn test_flush_failure_is_not_fatal() {
        let mock = MockTransport::new().with_device(1, FSM9_PID);
        mock.fail_flush(true);
        let handle = DeviceHandle::open(&mock, 1).unwrap();
        assert!(!handle.is_closed());
    }

    #[test]
    fn test_open_failure() {
        let mock = MockTransport::new().with_device(2, FSM9_PID);
        mock.fail_open(2);
        let err = DeviceHandle::open(&mock, 2).err().unwrap();
        assert!(matches!(err, FreespaceError::Open { id: 2, .. }));
    }

    #[test]
    fn test_missing_info_closes_connection() {
        let mock = MockTransport::new();
        assert!(DeviceHandle::open(&mock, 9).is_err());
        assert_eq!(mock.events(), vec![Event::Open(9), Event::Close(9)]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mock = MockTransport::new().with_device(1, FSM9_PID);
        let mut handle = DeviceHandle::open(&mock, 1).unwrap();
        handle.close();
        handle.close();
        drop(handle);
        let closes = mock
            .events()
            .into_iter()
            .filter(|e| *e == Event::Close(1))
            .count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn test_drop_closes() {
        let mock = MockTransport::new().with_device(1, FSM9_PID);
        drop(DeviceHandle::open(&mock, 1).unwrap());
        assert_eq!(mock.events().last(), Some(&Event::Close(1)));
    }

    #[test]
    fn test_closed_handle_rejects_traffic() {
        let mock = MockTransport::new().with_device(1, FSM9_PID);
        let mut handle = DeviceHandle::open(&mock, 1).unwrap();
        handle.close();
        assert!(matches!(handle.read(0), Err(TransportError::Closed)));
        assert!(handle.flush().is_err());
    }
}
