use crate::codec::OrientationCodec;
use crate::config::Settings;
use crate::configurator::ProtocolConfigurator;
use crate::detection::Claim;
use crate::error::FreespaceError;
use crate::handle::DeviceHandle;
use crate::library::LibraryLease;
use crate::pump::{MessagePump, PumpStats};
use crate::sink::OrientationSink;
use crate::transport::Transport;
use crate::types::{DeviceIdentity, Outcome, SessionState, StreamConfig};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One device's tracking session, driven by host ticks.
///
/// `Opened → Configured → Streaming → Closing → Closed`. While streaming,
/// the enable request is re-sent on every new wall-clock second so the
/// device recovers its mode after a sleep or reset. The first hard read
/// failure, an explicit [`TrackerSession::teardown`] or drop runs
/// flush → unconfigure → close, each attempted regardless of the others.
pub struct TrackerSession<T: Transport> {
    name: String,
    handle: DeviceHandle<T::Connection>,
    pump: MessagePump,
    stream: StreamConfig,
    read_timeout_ms: u32,
    drain_backlog: bool,
    state: SessionState,
    last_configure_second: Option<u64>,
    claim: Option<Claim>,
    // declared last: the library must outlive the connection
    lease: Option<LibraryLease<T>>,
}

impl<T: Transport> TrackerSession<T> {
    pub fn new(
        name: impl Into<String>,
        handle: DeviceHandle<T::Connection>,
        settings: &Settings,
    ) -> Self {
        Self {
            name: name.into(),
            handle,
            pump: MessagePump::new(OrientationCodec::new(settings.conjugate)),
            stream: settings.stream,
            read_timeout_ms: settings.read_timeout_ms,
            drain_backlog: settings.drain_backlog,
            state: SessionState::Opened,
            last_configure_second: None,
            claim: None,
            lease: None,
        }
    }

    /// Keep the transport library initialized for the life of the session.
    pub fn with_lease(mut self, lease: LibraryLease<T>) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Release `claim` when the session closes.
    pub fn with_claim(mut self, claim: Claim) -> Self {
        self.claim = Some(claim);
        self
    }

    /// Host-side name; not protocol relevant.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> &DeviceIdentity {
        self.handle.identity()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> PumpStats {
        self.pump.stats()
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Send the enable request for the current wall-clock second.
    pub fn configure(&mut self) {
        self.configure_at(wall_clock());
    }

    pub fn configure_at(&mut self, now: Duration) {
        if matches!(self.state, SessionState::Closing | SessionState::Closed) {
            return;
        }
        self.last_configure_second = Some(now.as_secs());
        match ProtocolConfigurator::configure(&mut self.handle, self.stream) {
            Ok(true) => log::debug!("{}: configured", self.name),
            Ok(false) => {}
            Err(e) => log::warn!("{}: could not send configuration: {}", self.name, e),
        }
        if self.state == SessionState::Opened {
            self.state = SessionState::Configured;
        }
    }

    /// Per-tick entry point.
    pub fn update(&mut self, sink: &mut dyn OrientationSink) -> Outcome {
        self.update_at(wall_clock(), sink)
    }

    /// Tick at an explicit wall-clock time (seconds since the Unix epoch).
    pub fn update_at(&mut self, now: Duration, sink: &mut dyn OrientationSink) -> Outcome {
        match self.state {
            SessionState::Closing | SessionState::Closed => {
                log::debug!("{}: update on closed session", self.name);
                return Outcome::Fatal;
            }
            SessionState::Uninitialized | SessionState::Opened => self.configure_at(now),
            SessionState::Configured | SessionState::Streaming => {
                if self.last_configure_second != Some(now.as_secs())
                    && self.identity().variant().is_supported()
                {
                    self.configure_at(now);
                }
            }
        }
        self.state = SessionState::Streaming;

        let result = match self.pump.pump_once(&mut self.handle, self.read_timeout_ms, sink) {
            Ok(n) if n > 0 && self.drain_backlog => self.pump.drain(&mut self.handle, sink),
            other => other,
        };

        match result {
            Ok(_) => Outcome::Continue,
            Err(e) => {
                match &e {
                    FreespaceError::DeviceLost(_) => log::warn!("{}: {}", self.name, e),
                    _ => log::error!("{}: {}", self.name, e),
                }
                self.teardown();
                Outcome::Fatal
            }
        }
    }

    /// Flush, unconfigure and close. Runs at most once; each step is
    /// attempted even if an earlier one failed.
    pub fn teardown(&mut self) {
        if matches!(self.state, SessionState::Closing | SessionState::Closed) {
            return;
        }
        self.state = SessionState::Closing;
        log::info!("{}: closing", self.name);

        if let Err(e) = self.handle.flush() {
            log::warn!("{}: error flushing device: {}", self.name, e);
        }
        if let Err(e) = ProtocolConfigurator::unconfigure(&mut self.handle) {
            log::warn!("{}: could not send unconfigure: {}", self.name, e);
        }
        self.handle.close();

        self.state = SessionState::Closed;
        self.claim = None;
        self.lease = None;
    }
}

impl<T: Transport> Drop for TrackerSession<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn wall_clock() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}
