use crate::protocol::LinkStatus;
use crate::types::OrientationReport;
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Host-side consumer of per-session output.
pub trait OrientationSink {
    /// Called exactly once per orientation-bearing message.
    fn send_orientation(&mut self, report: &OrientationReport);

    /// Link-status hook for connectivity consumers. No-op by default.
    fn link_status(&mut self, _status: &LinkStatus) {}
}

impl OrientationSink for Vec<OrientationReport> {
    fn send_orientation(&mut self, report: &OrientationReport) {
        self.push(*report);
    }
}

/// Orientation report tagged with the session that produced it.
#[derive(Debug, Clone)]
pub struct TaggedReport {
    pub device_name: String,
    pub report: OrientationReport,
}

/// Forwards reports into a bounded channel, dropping them when the
/// receiver falls behind.
#[derive(Clone)]
pub struct ChannelSink {
    sender: Sender<TaggedReport>,
    device_name: String,
}

impl ChannelSink {
    pub fn bounded(capacity: usize) -> (ChannelSink, Receiver<TaggedReport>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (
            ChannelSink {
                sender,
                device_name: String::new(),
            },
            receiver,
        )
    }

    /// A sink feeding the same channel that tags reports with `name`.
    pub fn named(&self, name: &str) -> ChannelSink {
        ChannelSink {
            sender: self.sender.clone(),
            device_name: name.to_string(),
        }
    }
}

impl OrientationSink for ChannelSink {
    fn send_orientation(&mut self, report: &OrientationReport) {
        let tagged = TaggedReport {
            device_name: self.device_name.clone(),
            report: *report,
        };
        match self.sender.try_send(tagged) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::trace!("Orientation channel full, dropping sample");
            }
            Err(TrySendError::Disconnected(_)) => {
                log::trace!("Orientation channel disconnected, dropping sample");
            }
        }
    }

    fn link_status(&mut self, status: &LinkStatus) {
        log::debug!(
            "{}: link status={} mode={}",
            self.device_name,
            status.status,
            status.mode
        );
    }
}
