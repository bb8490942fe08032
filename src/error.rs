use crate::transport::DeviceId;
use std::fmt;

/// Failures reported by the device I/O layer.
///
/// `Timeout` and `Interrupted` are the excusable read results: they recur
/// every idle tick and never end a session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Timed out waiting for a message")]
    Timeout,

    #[error("Wait interrupted")]
    Interrupted,

    #[error("Device {0} not found")]
    NotFound(DeviceId),

    #[error("Transport not initialized")]
    NotInitialized,

    #[error("Connection already closed")]
    Closed,

    #[error("Transport failure (code {0})")]
    Code(i32),

    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("Incomplete write: sent {sent} of {all} bytes")]
    IncompleteWrite { sent: usize, all: usize },
}

impl TransportError {
    /// Timeouts and interrupted waits mean "nothing available right now".
    pub fn is_excusable(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Interrupted)
    }
}

/// Errors crossing the core boundary.
#[derive(Debug, thiserror::Error)]
pub enum FreespaceError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No Freespace device found")]
    DeviceNotFound,

    #[error("Didn't find enough devices: found {found}, wanted index {index}")]
    InsufficientDevices { found: usize, index: usize },

    #[error("Device {0} is already claimed by another session")]
    AlreadyClaimed(DeviceId),

    #[error("Could not open device {id}: {source}")]
    Open {
        id: DeviceId,
        #[source]
        source: TransportError,
    },

    #[error("Could not send message: {0}")]
    Send(#[source] TransportError),

    #[error("Device lost: {0}")]
    DeviceLost(#[source] TransportError),

    #[error("Session already closed")]
    SessionClosed,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &FreespaceError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excusable_codes() {
        assert!(TransportError::Timeout.is_excusable());
        assert!(TransportError::Interrupted.is_excusable());
        assert!(!TransportError::Code(-5).is_excusable());
        assert!(!TransportError::NotFound(3).is_excusable());
    }

    #[test]
    fn test_last_error_is_nul_terminated() {
        let slot = LastError::new();
        assert!(slot.as_ptr().is_null());

        slot.set(&FreespaceError::InsufficientDevices { found: 1, index: 3 });
        let msg = unsafe { std::ffi::CStr::from_ptr(slot.as_ptr()) };
        assert_eq!(
            msg.to_str().unwrap(),
            "Didn't find enough devices: found 1, wanted index 3"
        );

        slot.clear();
        assert!(slot.as_ptr().is_null());
    }
}
