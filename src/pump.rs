use crate::codec::OrientationCodec;
use crate::error::FreespaceError;
use crate::handle::DeviceHandle;
use crate::protocol::InMessage;
use crate::sink::OrientationSink;
use crate::transport::Connection;
use crate::types::OrientationReport;
use crate::Result;
use std::time::Instant;

/// Upper bound on messages handled by one [`MessagePump::drain`] call, so a
/// device that never goes quiet cannot pin the caller.
pub const DRAIN_LIMIT: usize = 4096;

/// Per-session message counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub messages: u64,
    pub orientations: u64,
    pub link_status: u64,
    /// Body and body-user frames; read but not interpreted.
    pub reserved_frames: u64,
    pub unhandled: u64,
    /// Reads that timed out or were interrupted.
    pub idle_reads: u64,
}

/// Reads messages from a device and dispatches them by kind.
pub struct MessagePump {
    codec: OrientationCodec,
    epoch: Instant,
    stats: PumpStats,
}

impl MessagePump {
    pub fn new(codec: OrientationCodec) -> Self {
        Self {
            codec,
            epoch: Instant::now(),
            stats: PumpStats::default(),
        }
    }

    pub fn stats(&self) -> PumpStats {
        self.stats
    }

    /// Read at most one message.
    ///
    /// Timeouts and interrupted waits yield `Ok(None)`. Any other read
    /// failure is reported as [`FreespaceError::DeviceLost`].
    pub fn poll<C: Connection>(
        &mut self,
        handle: &mut DeviceHandle<C>,
        timeout_ms: u32,
    ) -> Result<Option<InMessage>> {
        match handle.read(timeout_ms) {
            Ok(msg) => Ok(Some(msg)),
            Err(e) if e.is_excusable() => {
                self.stats.idle_reads += 1;
                Ok(None)
            }
            Err(e) => Err(FreespaceError::DeviceLost(e)),
        }
    }

    /// Bounded wait: read one message within `timeout_ms` and dispatch it.
    /// Returns the number of messages dispatched (0 or 1).
    pub fn pump_once<C: Connection>(
        &mut self,
        handle: &mut DeviceHandle<C>,
        timeout_ms: u32,
        sink: &mut dyn OrientationSink,
    ) -> Result<usize> {
        match self.poll(handle, timeout_ms)? {
            Some(msg) => {
                self.dispatch(&msg, sink);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Drain-all: non-blocking reads until nothing is immediately available,
    /// dispatching in arrival order.
    pub fn drain<C: Connection>(
        &mut self,
        handle: &mut DeviceHandle<C>,
        sink: &mut dyn OrientationSink,
    ) -> Result<usize> {
        let mut count = 0;
        while count < DRAIN_LIMIT {
            match self.poll(handle, 0)? {
                Some(msg) => {
                    self.dispatch(&msg, sink);
                    count += 1;
                }
                None => return Ok(count),
            }
        }
        log::debug!("Drain stopped after {} messages", count);
        Ok(count)
    }

    /// Route one message to its handler.
    pub fn dispatch(&mut self, msg: &InMessage, sink: &mut dyn OrientationSink) {
        self.stats.messages += 1;
        match msg {
            InMessage::LinkStatus(status) => {
                self.stats.link_status += 1;
                sink.link_status(status);
            }
            InMessage::BodyFrame(_) | InMessage::BodyUserFrame(_) => {
                self.stats.reserved_frames += 1;
                log::trace!("Ignoring {}", msg.name());
            }
            InMessage::UserFrame(_) | InMessage::MotionEngineOutput(_) => {
                match self.codec.decode(msg) {
                    Some((orientation, sequence)) => {
                        self.stats.orientations += 1;
                        sink.send_orientation(&OrientationReport {
                            sensor: 0,
                            orientation,
                            translation: [0.0; 3],
                            sequence,
                            host_timestamp_s: self.epoch.elapsed().as_secs_f64(),
                        });
                    }
                    None => log::trace!("{} carried no orientation", msg.name()),
                }
            }
            InMessage::Unknown { report_id, kind } => {
                self.stats.unhandled += 1;
                log::debug!(
                    "Unhandled message type: report 0x{:02X} kind 0x{:02X}",
                    report_id,
                    kind
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{BodyFrame, Cursor, LinkStatus, UserFrame, FSM9_PID};
    use crate::transport::mock::{MockConnection, MockTransport, Scripted};

    fn user_frame(sequence: u32) -> InMessage {
        InMessage::UserFrame(UserFrame {
            cursor: Cursor::default(),
            sequence,
            linear_position: [0; 3],
            angular_position: [16384, 0, 0, 0],
        })
    }

    #[derive(Default)]
    struct Recorder {
        reports: Vec<OrientationReport>,
        links: Vec<LinkStatus>,
    }

    impl OrientationSink for Recorder {
        fn send_orientation(&mut self, report: &OrientationReport) {
            self.reports.push(*report);
        }

        fn link_status(&mut self, status: &LinkStatus) {
            self.links.push(*status);
        }
    }

    fn open(mock: &MockTransport) -> DeviceHandle<MockConnection> {
        DeviceHandle::open(mock, 1).unwrap()
    }

    #[test]
    fn test_timeout_and_interrupt_are_idle() {
        let mock = MockTransport::new().with_device(1, FSM9_PID);
        mock.script(1, [Scripted::Timeout, Scripted::Interrupted]);
        let mut handle = open(&mock);
        let mut pump = MessagePump::new(OrientationCodec::default());
        let mut sink: Vec<OrientationReport> = Vec::new();

        assert_eq!(pump.pump_once(&mut handle, 100, &mut sink).unwrap(), 0);
        assert_eq!(pump.pump_once(&mut handle, 100, &mut sink).unwrap(), 0);
        assert!(sink.is_empty());
        assert_eq!(pump.stats().idle_reads, 2);
    }

    #[test]
    fn test_hard_failure_is_device_lost() {
        let mock = MockTransport::new().with_device(1, FSM9_PID);
        mock.script(1, [Scripted::Fail(-7)]);
        let mut handle = open(&mock);
        let mut pump = MessagePump::new(OrientationCodec::default());
        let mut sink: Vec<OrientationReport> = Vec::new();
        let err = pump.pump_once(&mut handle, 100, &mut sink).unwrap_err();
        assert!(matches!(err, FreespaceError::DeviceLost(_)));
    }

    #[test]
    fn test_drain_dispatches_in_order() {
        let mock = MockTransport::new().with_device(1, FSM9_PID);
        mock.script(
            1,
            [
                Scripted::Message(user_frame(1)),
                Scripted::Message(InMessage::Unknown {
                    report_id: 8,
                    kind: 0x77,
                }),
                Scripted::Message(user_frame(2)),
                Scripted::Message(user_frame(3)),
                Scripted::Timeout,
                Scripted::Message(user_frame(4)),
            ],
        );
        let mut handle = open(&mock);
        let mut pump = MessagePump::new(OrientationCodec::default());
        let mut sink: Vec<OrientationReport> = Vec::new();

        assert_eq!(pump.drain(&mut handle, &mut sink).unwrap(), 4);
        let seqs: Vec<u32> = sink.iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(pump.stats().unhandled, 1);
        assert_eq!(pump.stats().orientations, 3);
    }

    #[test]
    fn test_dispatch_routes_by_kind() {
        let mut pump = MessagePump::new(OrientationCodec::default());
        let mut sink = Recorder::default();

        pump.dispatch(
            &InMessage::LinkStatus(LinkStatus {
                status: 1,
                mode: 0,
                reset_status: 0,
                tx_disabled: 0,
            }),
            &mut sink,
        );
        pump.dispatch(
            &InMessage::BodyFrame(BodyFrame {
                cursor: Cursor::default(),
                sequence: 0,
                acceleration: [0; 3],
                angular_velocity: [0; 3],
            }),
            &mut sink,
        );
        pump.dispatch(&user_frame(5), &mut sink);

        assert_eq!(sink.links.len(), 1);
        assert_eq!(sink.reports.len(), 1);
        let report = sink.reports[0];
        assert_eq!(report.sensor, 0);
        assert_eq!(report.translation, [0.0; 3]);
        assert_eq!(report.orientation, crate::types::Quaternion::IDENTITY);

        let stats = pump.stats();
        assert_eq!(stats.messages, 3);
        assert_eq!(stats.reserved_frames, 1);
        assert_eq!(stats.link_status, 1);
    }
}
