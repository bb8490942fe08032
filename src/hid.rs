use crate::error::TransportError;
use crate::protocol::{self, InMessage, OutMessage, IN_REPORT_SIZE, VID};
use crate::transport::{Connection, DeviceId, Transport};
use crate::types::DeviceIdentity;
use hidapi::{HidApi, HidDevice, HidError};
use std::collections::HashMap;
use std::ffi::CString;
use std::io::ErrorKind;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Vendor-defined usage page carrying the Freespace message stream.
pub const FREESPACE_USAGE_PAGE: u16 = 0xFF01;

/// Reads discarded by one flush before giving up on a chatty device.
const FLUSH_LIMIT: usize = 256;

/// Interface that carries the message stream when the backend cannot
/// report usage pages.
pub const FREESPACE_INTERFACE: i32 = 0;

/// Check if a hidapi DeviceInfo is a Freespace message interface.
fn is_freespace_hid(d: &hidapi::DeviceInfo) -> bool {
    is_message_interface(d.vendor_id(), d.usage_page(), d.interface_number())
}

/// Some backends (older hidraw, libusb) report usage page 0 for every
/// interface; those are narrowed to the message interface, -1 on macOS IOKit.
fn is_message_interface(vendor_id: u16, usage_page: u16, interface: i32) -> bool {
    if vendor_id != VID {
        return false;
    }
    match usage_page {
        FREESPACE_USAGE_PAGE => true,
        0 => interface == FREESPACE_INTERFACE || interface == -1,
        _ => false,
    }
}

/// Map a failed hidapi read to a transport error. A wait cut short by a
/// signal (EINTR) is reported as `Interrupted`, not as a hard failure.
fn read_error(err: HidError) -> TransportError {
    let interrupted = match &err {
        HidError::IoError { error } => error.kind() == ErrorKind::Interrupted,
        HidError::HidApiError { message } => message.contains("Interrupted system call"),
        _ => false,
    };
    if interrupted {
        TransportError::Interrupted
    } else {
        TransportError::Hid(err)
    }
}

fn create_hid_api() -> Result<HidApi, TransportError> {
    let api = HidApi::new()?;
    #[cfg(target_os = "macos")]
    {
        // Keep HID opens shared on macOS to avoid seizing the interface.
        api.set_open_exclusive(false);
    }
    Ok(api)
}

#[derive(Default)]
struct HidState {
    api: Option<HidApi>,
    /// Ids stay stable for a path across enumerations.
    paths: HashMap<DeviceId, CString>,
    identities: HashMap<DeviceId, DeviceIdentity>,
    next_id: DeviceId,
}

impl HidState {
    fn id_for(&mut self, path: &CString) -> DeviceId {
        if let Some((id, _)) = self.paths.iter().find(|(_, p)| *p == path) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.paths.insert(id, path.clone());
        id
    }
}

/// [`Transport`] over hidapi.
///
/// The `HidApi` context is created by `init` and dropped by `shutdown`, so
/// its lifetime follows [`crate::library::Library`].
#[derive(Default)]
pub struct HidapiTransport {
    state: Mutex<HidState>,
}

impl HidapiTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HidState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for HidapiTransport {
    type Connection = HidConnection;

    fn init(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.api.is_none() {
            state.api = Some(create_hid_api()?);
        }
        Ok(())
    }

    fn shutdown(&self) {
        let mut state = self.lock();
        state.api = None;
        state.identities.clear();
        log::debug!("hidapi context released");
    }

    fn enumerate(&self, max: usize) -> Result<Vec<DeviceId>, TransportError> {
        let mut state = self.lock();
        let state = &mut *state;
        let api = state.api.as_mut().ok_or(TransportError::NotInitialized)?;
        api.refresh_devices()?;

        let mut found = Vec::new();
        for info in api.device_list().filter(|d| is_freespace_hid(d)) {
            found.push((
                info.path().to_owned(),
                DeviceIdentity {
                    vendor_id: info.vendor_id(),
                    product_id: info.product_id(),
                    name: info
                        .product_string()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Freespace {:04X}", info.product_id())),
                },
            ));
        }

        let mut ids = Vec::new();
        for (path, identity) in found {
            if ids.len() >= max {
                break;
            }
            let id = state.id_for(&path);
            if ids.contains(&id) {
                continue;
            }
            log::trace!("Found {} at {:?} (id {})", identity.name, path, id);
            state.identities.insert(id, identity);
            ids.push(id);
        }
        Ok(ids)
    }

    fn device_info(&self, id: DeviceId) -> Result<DeviceIdentity, TransportError> {
        self.lock()
            .identities
            .get(&id)
            .cloned()
            .ok_or(TransportError::NotFound(id))
    }

    fn open(&self, id: DeviceId) -> Result<HidConnection, TransportError> {
        let state = self.lock();
        let api = state.api.as_ref().ok_or(TransportError::NotInitialized)?;
        let path = state.paths.get(&id).ok_or(TransportError::NotFound(id))?;
        let device = api.open_path(path)?;
        Ok(HidConnection {
            id,
            device: Some(device),
        })
    }
}

/// One open Freespace HID interface.
pub struct HidConnection {
    id: DeviceId,
    device: Option<HidDevice>,
}

impl HidConnection {
    fn device(&self) -> Result<&HidDevice, TransportError> {
        self.device.as_ref().ok_or(TransportError::Closed)
    }
}

impl Connection for HidConnection {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        let device = self.device()?;
        let mut buf = [0u8; IN_REPORT_SIZE];
        for _ in 0..FLUSH_LIMIT {
            if device.read_timeout(&mut buf, 0).map_err(read_error)? == 0 {
                return Ok(());
            }
        }
        log::debug!("Device {} still streaming after flush", self.id);
        Ok(())
    }

    fn send(&mut self, msg: &OutMessage) -> Result<(), TransportError> {
        // byte 0 is the output report id, which hidapi passes through as-is
        let buf = msg.encode();
        let sent = self.device()?.write(&buf)?;
        if sent < buf.len() {
            return Err(TransportError::IncompleteWrite {
                sent,
                all: buf.len(),
            });
        }
        Ok(())
    }

    fn read(&mut self, timeout_ms: u32) -> Result<InMessage, TransportError> {
        let mut buf = [0u8; IN_REPORT_SIZE];
        let timeout = i32::try_from(timeout_ms).unwrap_or(i32::MAX);
        match self
            .device()?
            .read_timeout(&mut buf, timeout)
            .map_err(read_error)?
        {
            0 => Err(TransportError::Timeout),
            n => Ok(protocol::decode(&buf[..n])),
        }
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            log::debug!("Closed HID device {}", self.id);
        }
    }
}
