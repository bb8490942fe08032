use crate::error::TransportError;
use crate::transport::Transport;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Process-wide transport library lifecycle.
///
/// The first [`Library::acquire`] runs `Transport::init`; dropping the last
/// [`LibraryLease`] runs `Transport::shutdown`. A failed init leaves the
/// count at zero so the next acquire retries it.
pub struct Library<T: Transport> {
    transport: T,
    users: Mutex<usize>,
}

impl<T: Transport> Library<T> {
    pub fn new(transport: T) -> Arc<Self> {
        Arc::new(Self {
            transport,
            users: Mutex::new(0),
        })
    }

    pub fn acquire(self: &Arc<Self>) -> Result<LibraryLease<T>, TransportError> {
        let mut users = self.lock_users();
        if *users == 0 {
            self.transport.init()?;
            log::info!("Freespace library initialized");
        }
        *users += 1;
        Ok(LibraryLease {
            library: Arc::clone(self),
        })
    }

    /// Number of live leases.
    pub fn users(&self) -> usize {
        *self.lock_users()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn lock_users(&self) -> MutexGuard<'_, usize> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps the library initialized while alive.
pub struct LibraryLease<T: Transport> {
    library: Arc<Library<T>>,
}

impl<T: Transport> LibraryLease<T> {
    pub fn transport(&self) -> &T {
        &self.library.transport
    }
}

impl<T: Transport> Clone for LibraryLease<T> {
    fn clone(&self) -> Self {
        *self.library.lock_users() += 1;
        Self {
            library: Arc::clone(&self.library),
        }
    }
}

impl<T: Transport> Drop for LibraryLease<T> {
    fn drop(&mut self) {
        let mut users = self.library.lock_users();
        *users = users.saturating_sub(1);
        if *users == 0 {
            self.library.transport.shutdown();
            log::info!("Freespace library shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{Event, MockTransport};

    #[test]
    fn test_init_once_shutdown_on_last_release() {
        let mock = MockTransport::new();
        let library = Library::new(mock.clone());

        let a = library.acquire().unwrap();
        let b = library.acquire().unwrap();
        let c = a.clone();
        assert_eq!(library.users(), 3);
        assert_eq!(mock.events(), vec![Event::Init]);

        drop(a);
        drop(b);
        assert_eq!(mock.events(), vec![Event::Init]);

        drop(c);
        assert_eq!(library.users(), 0);
        assert_eq!(mock.events(), vec![Event::Init, Event::Shutdown]);

        let _again = library.acquire().unwrap();
        assert_eq!(
            mock.events(),
            vec![Event::Init, Event::Shutdown, Event::Init]
        );
    }

    #[test]
    fn test_failed_init_is_retried() {
        let mock = MockTransport::new();
        mock.fail_init(true);
        let library = Library::new(mock.clone());

        assert!(library.acquire().is_err());
        assert_eq!(library.users(), 0);

        mock.fail_init(false);
        let _lease = library.acquire().unwrap();
        assert_eq!(library.users(), 1);
        assert_eq!(mock.events(), vec![Event::Init, Event::Init]);
    }
}
