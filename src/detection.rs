use crate::config::Settings;
use crate::error::FreespaceError;
use crate::handle::DeviceHandle;
use crate::library::{Library, LibraryLease};
use crate::session::TrackerSession;
use crate::transport::{DeviceId, Transport};
use crate::Result;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type ClaimedIds = Arc<Mutex<HashSet<DeviceId>>>;

fn lock(ids: &ClaimedIds) -> MutexGuard<'_, HashSet<DeviceId>> {
    ids.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Set of device ids currently bound to a session.
///
/// Shared by every detection pass so a device is never opened twice.
#[derive(Clone, Default)]
pub struct ClaimRegistry {
    ids: ClaimedIds,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or `None` if it is already bound.
    pub fn try_claim(&self, id: DeviceId) -> Option<Claim> {
        if !lock(&self.ids).insert(id) {
            return None;
        }
        Some(Claim {
            id,
            ids: Arc::clone(&self.ids),
        })
    }

    pub fn is_claimed(&self, id: DeviceId) -> bool {
        lock(&self.ids).contains(&id)
    }

    pub fn len(&self) -> usize {
        lock(&self.ids).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A claimed device id; released on drop.
pub struct Claim {
    id: DeviceId,
    ids: ClaimedIds,
}

impl Claim {
    pub fn id(&self) -> DeviceId {
        self.id
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        lock(&self.ids).remove(&self.id);
    }
}

/// Finds attached devices and turns each unclaimed one into a configured
/// [`TrackerSession`].
pub struct HardwareDetection<T: Transport> {
    library: Arc<Library<T>>,
    registry: ClaimRegistry,
    settings: Settings,
    opened: usize,
}

impl<T: Transport> HardwareDetection<T> {
    pub fn new(library: Arc<Library<T>>, registry: ClaimRegistry, settings: Settings) -> Self {
        Self {
            library,
            registry,
            settings,
            opened: 0,
        }
    }

    pub fn registry(&self) -> &ClaimRegistry {
        &self.registry
    }

    /// One detection pass. Devices that fail to open are skipped and will be
    /// retried on the next pass; only library or enumeration failures are
    /// returned as errors.
    pub fn detect(&mut self) -> Result<Vec<TrackerSession<T>>> {
        let lease = self.library.acquire()?;
        let ids = lease.transport().enumerate(self.settings.max_devices)?;
        log::debug!("Detection pass: {} device(s) attached", ids.len());

        let mut sessions = Vec::new();
        for id in ids {
            let Some(claim) = self.registry.try_claim(id) else {
                continue;
            };
            match self.open_session(&lease, claim) {
                Ok(session) => sessions.push(session),
                Err(e) => log::warn!("Device {} unavailable: {}", id, e),
            }
        }
        Ok(sessions)
    }

    /// Open the `index`-th enumerated device.
    pub fn open_index(&mut self, index: usize) -> Result<TrackerSession<T>> {
        let lease = self.library.acquire()?;
        let ids = lease.transport().enumerate(self.settings.max_devices)?;
        if ids.is_empty() {
            return Err(FreespaceError::DeviceNotFound);
        }
        let id = *ids.get(index).ok_or(FreespaceError::InsufficientDevices {
            found: ids.len(),
            index,
        })?;
        let claim = self
            .registry
            .try_claim(id)
            .ok_or(FreespaceError::AlreadyClaimed(id))?;
        self.open_session(&lease, claim)
    }

    fn open_session(&mut self, lease: &LibraryLease<T>, claim: Claim) -> Result<TrackerSession<T>> {
        let handle = DeviceHandle::open(lease.transport(), claim.id())?;
        let name = format!("{}{}", self.settings.device_name, self.opened);
        self.opened += 1;

        if !handle.identity().variant().is_supported() {
            log::warn!(
                "{}: unsupported product 0x{:04X}; device stays open but will not stream",
                name,
                handle.identity().product_id
            );
        }

        let mut session = TrackerSession::new(name, handle, &self.settings)
            .with_lease(lease.clone())
            .with_claim(claim);
        session.configure();
        log::info!("Added Freespace device: {}", session.name());
        Ok(session)
    }
}
