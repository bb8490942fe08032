use crate::config::Settings;
use crate::detection::{ClaimRegistry, HardwareDetection};
use crate::library::Library;
use crate::session::TrackerSession;
use crate::sink::{ChannelSink, TaggedReport};
use crate::transport::Transport;
use crate::types::Outcome;
use crate::Result;
use crossbeam_channel::Receiver;

/// Owns every live session and routes their reports into one channel.
///
/// Sessions that end fatally are dropped on the tick that ends them, which
/// releases their device claim so a later [`TrackerHost::detect`] can pick
/// the device up again.
pub struct TrackerHost<T: Transport> {
    detection: HardwareDetection<T>,
    sessions: Vec<(TrackerSession<T>, ChannelSink)>,
    sink: ChannelSink,
    receiver: Receiver<TaggedReport>,
}

impl<T: Transport> TrackerHost<T> {
    pub fn new(transport: T, settings: Settings) -> Self {
        let (sink, receiver) = ChannelSink::bounded(settings.channel_capacity);
        Self {
            detection: HardwareDetection::new(
                Library::new(transport),
                ClaimRegistry::new(),
                settings,
            ),
            sessions: Vec::new(),
            sink,
            receiver,
        }
    }

    /// Run one detection pass; returns how many sessions were added.
    pub fn detect(&mut self) -> Result<usize> {
        let found = self.detection.detect()?;
        let added = found.len();
        for session in found {
            let sink = self.sink.named(session.name());
            self.sessions.push((session, sink));
        }
        Ok(added)
    }

    /// Tick every session once; returns how many ended on this tick.
    pub fn update(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain_mut(|(session, sink)| {
            let outcome = session.update(sink);
            if outcome == Outcome::Fatal {
                log::info!("Removed Freespace device: {}", session.name());
            }
            outcome == Outcome::Continue
        });
        before - self.sessions.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &TrackerSession<T>> {
        self.sessions.iter().map(|(session, _)| session)
    }

    pub fn receiver(&self) -> &Receiver<TaggedReport> {
        &self.receiver
    }

    pub fn try_recv(&self) -> Option<TaggedReport> {
        self.receiver.try_recv().ok()
    }

    /// Close every session.
    pub fn shutdown(&mut self) {
        for (mut session, _) in self.sessions.drain(..) {
            session.teardown();
        }
    }
}

impl<T: Transport> Drop for TrackerHost<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
