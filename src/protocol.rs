//! Freespace HID wire format.
//!
//! Outbound requests are fixed 8-byte output reports; inbound messages are
//! input reports discriminated by a message id in byte 1. All multi-byte
//! fields are little-endian.

// -- USB identifiers --
pub const VID: u16 = 0x1D5A;
pub const SCOOP_PID: u16 = 0xC0B3;
pub const FSM6_PID: u16 = 0xC080;
pub const FSM9_PID: u16 = 0xC0E0;

// -- Report geometry --
pub const OUT_REPORT_SIZE: usize = 8;
pub const IN_REPORT_SIZE: usize = 64;

pub const REPORT_ID_HOST_TO_DEVICE: u8 = 0x07;
pub const REPORT_ID_DEVICE_TO_HOST: u8 = 0x08;

// -- Message ids (byte 1) --
pub const MSG_DATA_MODE_CONTROL_V2: u8 = 0x14;
pub const MSG_BODY_FRAME: u8 = 0x20;
pub const MSG_USER_FRAME: u8 = 0x21;
pub const MSG_BODY_USER_FRAME: u8 = 0x22;
pub const MSG_LINK_STATUS: u8 = 0x30;
pub const MSG_MOTION_ENGINE_OUTPUT: u8 = 0x41;

// -- Fixed-point scales for motion-engine fields --
pub const Q10: f64 = 1.0 / 1024.0;
pub const Q14: f64 = 1.0 / 16384.0;

/// Largest motion-engine payload after the header.
pub const ME_DATA_LEN: usize = 48;

/// Which message family the device streams.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketSelect {
    None = 0,
    Mouse = 1,
    BodyFrame = 2,
    UserFrame = 3,
    BodyUserFrame = 4,
    MotionEngineOutput = 8,
}

/// Operating mode of the sensor-fusion engine.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Device default; with mouse packets this is plain pointer behaviour.
    Normal = 0,
    Sleep = 1,
    FullMotionOn = 4,
}

bitflags::bitflags! {
    /// Motion-engine field flags (ff0..ff7).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MotionFields: u8 {
        const CURSOR                 = 1 << 0;
        const ACCELERATION           = 1 << 1;
        const ACCELERATION_NO_GRAVITY = 1 << 2;
        const ANGULAR_VELOCITY       = 1 << 3;
        const MAGNETOMETER           = 1 << 4;
        const INCLINATION            = 1 << 5;
        const ANGULAR_POSITION       = 1 << 6;
        const COMPASS_HEADING        = 1 << 7;
    }
}

/// Packed size of each format-0 field, indexed by flag bit.
const FIELD_SIZES: [usize; 8] = [4, 6, 6, 6, 6, 6, 8, 2];

/// Data-mode control (V2) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataModeControlV2Request {
    pub packet_select: PacketSelect,
    pub mode: Mode,
    pub format_select: u8,
    pub fields: MotionFields,
}

/// Host-to-device messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutMessage {
    DataModeControlV2(DataModeControlV2Request),
}

impl OutMessage {
    /// Encode as an output report.
    ///
    /// Layout: `[0x07, 0x14, mode, packet_select, format_select, ff_bits, 0, 0]`.
    pub fn encode(&self) -> [u8; OUT_REPORT_SIZE] {
        let mut buf = [0u8; OUT_REPORT_SIZE];
        buf[0] = REPORT_ID_HOST_TO_DEVICE;
        match self {
            OutMessage::DataModeControlV2(req) => {
                buf[1] = MSG_DATA_MODE_CONTROL_V2;
                buf[2] = req.mode as u8;
                buf[3] = req.packet_select as u8;
                buf[4] = req.format_select;
                buf[5] = req.fields.bits();
            }
        }
        buf
    }
}

/// Relative pointer movement and button state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub buttons: u8,
    pub delta_x: i8,
    pub delta_y: i8,
    pub delta_wheel: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub status: u8,
    pub mode: u8,
    pub reset_status: u8,
    pub tx_disabled: u8,
}

impl LinkStatus {
    pub fn is_connected(&self) -> bool {
        self.status == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyFrame {
    pub cursor: Cursor,
    pub sequence: u32,
    pub acceleration: [i16; 3],
    pub angular_velocity: [i16; 3],
}

/// Raw orientation sample; `angular_position` is (w, x, y, z), unnormalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserFrame {
    pub cursor: Cursor,
    pub sequence: u32,
    pub linear_position: [i16; 3],
    pub angular_position: [i16; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyUserFrame {
    pub body: BodyFrame,
    pub linear_position: [i16; 3],
    pub angular_position: [i16; 4],
}

/// Three or four axis reading from the motion engine. `w` is zero for
/// three-axis fields.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MultiAxis {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Fused output of the device's onboard motion engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionEngineOutput {
    pub format_select: u8,
    pub fields: MotionFields,
    pub sequence: u32,
    pub data: Vec<u8>,
}

impl MotionEngineOutput {
    /// Offset of `field` inside `data`, if present in a format-0 packet.
    fn field_offset(&self, field: MotionFields) -> Option<usize> {
        if self.format_select != 0 || !self.fields.contains(field) {
            return None;
        }
        let bit = field.bits().trailing_zeros() as usize;
        let offset = (0..bit)
            .filter(|b| self.fields.bits() & (1 << b) != 0)
            .map(|b| FIELD_SIZES[b])
            .sum::<usize>();
        if offset + FIELD_SIZES[bit] > self.data.len() {
            return None;
        }
        Some(offset)
    }

    fn read_axes(&self, field: MotionFields, count: usize, scale: f64) -> Option<[f64; 4]> {
        let offset = self.field_offset(field)?;
        let mut out = [0.0; 4];
        for (i, v) in out.iter_mut().take(count).enumerate() {
            let at = offset + 2 * i;
            *v = i16::from_le_bytes([self.data[at], self.data[at + 1]]) as f64 * scale;
        }
        Some(out)
    }

    pub fn cursor(&self) -> Option<Cursor> {
        let at = self.field_offset(MotionFields::CURSOR)?;
        Some(Cursor {
            buttons: self.data[at],
            delta_x: self.data[at + 1] as i8,
            delta_y: self.data[at + 2] as i8,
            delta_wheel: self.data[at + 3] as i8,
        })
    }

    /// Linear acceleration in m/s².
    pub fn acceleration(&self) -> Option<MultiAxis> {
        let [x, y, z, _] = self.read_axes(MotionFields::ACCELERATION, 3, Q10)?;
        Some(MultiAxis { x, y, z, w: 0.0 })
    }

    /// Angular velocity in rad/s.
    pub fn angular_velocity(&self) -> Option<MultiAxis> {
        let [x, y, z, _] = self.read_axes(MotionFields::ANGULAR_VELOCITY, 3, Q10)?;
        Some(MultiAxis { x, y, z, w: 0.0 })
    }

    /// Angular position as a unit quaternion. Wire order is w, x, y, z.
    pub fn angular_position(&self) -> Option<MultiAxis> {
        let [w, x, y, z] = self.read_axes(MotionFields::ANGULAR_POSITION, 4, Q14)?;
        Some(MultiAxis { x, y, z, w })
    }
}

/// Device-to-host messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InMessage {
    LinkStatus(LinkStatus),
    BodyFrame(BodyFrame),
    UserFrame(UserFrame),
    BodyUserFrame(BodyUserFrame),
    MotionEngineOutput(MotionEngineOutput),
    /// Unrecognized, foreign or truncated report.
    Unknown { report_id: u8, kind: u8 },
}

impl InMessage {
    pub fn name(&self) -> &'static str {
        match self {
            InMessage::LinkStatus(_) => "LinkStatus",
            InMessage::BodyFrame(_) => "BodyFrame",
            InMessage::UserFrame(_) => "UserFrame",
            InMessage::BodyUserFrame(_) => "BodyUserFrame",
            InMessage::MotionEngineOutput(_) => "MotionEngineOutput",
            InMessage::Unknown { .. } => "Unknown",
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Some(out)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|b| b[0])
    }

    fn i8(&mut self) -> Option<i8> {
        self.u8().map(|b| b as i8)
    }

    fn i16(&mut self) -> Option<i16> {
        self.take::<2>().map(i16::from_le_bytes)
    }

    fn u32(&mut self) -> Option<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    fn i16s<const N: usize>(&mut self) -> Option<[i16; N]> {
        let mut out = [0i16; N];
        for v in out.iter_mut() {
            *v = self.i16()?;
        }
        Some(out)
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    fn cursor(&mut self) -> Option<Cursor> {
        Some(Cursor {
            buttons: self.u8()?,
            delta_x: self.i8()?,
            delta_y: self.i8()?,
            delta_wheel: self.i8()?,
        })
    }

    fn body_frame(&mut self) -> Option<BodyFrame> {
        Some(BodyFrame {
            cursor: self.cursor()?,
            sequence: self.u32()?,
            acceleration: self.i16s()?,
            angular_velocity: self.i16s()?,
        })
    }

    fn link_status(&mut self) -> Option<LinkStatus> {
        Some(LinkStatus {
            status: self.u8()?,
            mode: self.u8()?,
            reset_status: self.u8()?,
            tx_disabled: self.u8()?,
        })
    }

    fn user_frame(&mut self) -> Option<UserFrame> {
        Some(UserFrame {
            cursor: self.cursor()?,
            sequence: self.u32()?,
            linear_position: self.i16s()?,
            angular_position: self.i16s()?,
        })
    }

    fn body_user_frame(&mut self) -> Option<BodyUserFrame> {
        Some(BodyUserFrame {
            body: self.body_frame()?,
            linear_position: self.i16s()?,
            angular_position: self.i16s()?,
        })
    }

    fn motion_engine_output(&mut self) -> Option<MotionEngineOutput> {
        let format_select = self.u8()?;
        let fields = MotionFields::from_bits_retain(self.u8()?);
        let sequence = self.u32()?;
        let rest = self.rest();
        Some(MotionEngineOutput {
            format_select,
            fields,
            sequence,
            data: rest[..rest.len().min(ME_DATA_LEN)].to_vec(),
        })
    }
}

/// Decode an input report. Never fails: anything that is not a well-formed
/// known message becomes [`InMessage::Unknown`].
pub fn decode(data: &[u8]) -> InMessage {
    let report_id = data.first().copied().unwrap_or(0);
    let kind = data.get(1).copied().unwrap_or(0);
    let unknown = InMessage::Unknown { report_id, kind };

    if report_id != REPORT_ID_DEVICE_TO_HOST {
        return unknown;
    }

    let mut r = Reader::new(data.get(2..).unwrap_or(&[]));
    let parsed = match kind {
        MSG_LINK_STATUS => r.link_status().map(InMessage::LinkStatus),
        MSG_BODY_FRAME => r.body_frame().map(InMessage::BodyFrame),
        MSG_USER_FRAME => r.user_frame().map(InMessage::UserFrame),
        MSG_BODY_USER_FRAME => r.body_user_frame().map(InMessage::BodyUserFrame),
        MSG_MOTION_ENGINE_OUTPUT => r.motion_engine_output().map(InMessage::MotionEngineOutput),
        _ => None,
    };

    parsed.unwrap_or(unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(kind: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![REPORT_ID_DEVICE_TO_HOST, kind];
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn test_encode_data_mode_request() {
        let msg = OutMessage::DataModeControlV2(DataModeControlV2Request {
            packet_select: PacketSelect::MotionEngineOutput,
            mode: Mode::FullMotionOn,
            format_select: 0,
            fields: MotionFields::CURSOR | MotionFields::ANGULAR_POSITION,
        });
        assert_eq!(msg.encode(), [0x07, 0x14, 4, 8, 0, 0x41, 0, 0]);
    }

    #[test]
    fn test_decode_link_status() {
        let msg = decode(&report(MSG_LINK_STATUS, &[1, 0, 0, 0]));
        match msg {
            InMessage::LinkStatus(s) => assert!(s.is_connected()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_user_frame() {
        let mut payload = vec![0x01, 0xFF, 2, 0];
        payload.extend_from_slice(&42u32.to_le_bytes());
        for v in [0i16, 0, 0, 100, -200, 300, -400] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        let msg = decode(&report(MSG_USER_FRAME, &payload));
        let InMessage::UserFrame(frame) = msg else {
            panic!("expected user frame");
        };
        assert_eq!(frame.cursor.buttons, 1);
        assert_eq!(frame.cursor.delta_x, -1);
        assert_eq!(frame.sequence, 42);
        assert_eq!(frame.angular_position, [100, -200, 300, -400]);
    }

    #[test]
    fn test_decode_truncated_is_unknown() {
        let msg = decode(&report(MSG_USER_FRAME, &[0, 0, 0]));
        assert_eq!(
            msg,
            InMessage::Unknown {
                report_id: REPORT_ID_DEVICE_TO_HOST,
                kind: MSG_USER_FRAME
            }
        );
        assert!(matches!(decode(&[]), InMessage::Unknown { .. }));
        assert!(matches!(
            decode(&[0x05, MSG_LINK_STATUS, 1, 0, 0, 0]),
            InMessage::Unknown { report_id: 0x05, .. }
        ));
    }

    #[test]
    fn test_motion_engine_angular_position_offset() {
        // cursor (4 B) + angular velocity (6 B) precede angular position
        let fields =
            MotionFields::CURSOR | MotionFields::ANGULAR_VELOCITY | MotionFields::ANGULAR_POSITION;
        let mut payload = vec![0, fields.bits()];
        payload.extend_from_slice(&7u32.to_le_bytes());
        payload.extend_from_slice(&[0x01, 0, 0, 0]);
        for v in [1024i16, 0, -1024] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        for v in [16384i16, 0, 0, 0] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        let InMessage::MotionEngineOutput(me) = decode(&report(MSG_MOTION_ENGINE_OUTPUT, &payload))
        else {
            panic!("expected motion engine output");
        };
        assert_eq!(me.sequence, 7);
        assert_eq!(me.cursor().unwrap().buttons, 1);
        let vel = me.angular_velocity().unwrap();
        assert!((vel.x - 1.0).abs() < 1e-12);
        assert!((vel.z + 1.0).abs() < 1e-12);
        let pos = me.angular_position().unwrap();
        assert!((pos.w - 1.0).abs() < 1e-12);
        assert_eq!(pos.x, 0.0);
        assert!(me.acceleration().is_none());
    }

    #[test]
    fn test_motion_engine_other_format_has_no_fields() {
        let me = MotionEngineOutput {
            format_select: 1,
            fields: MotionFields::ANGULAR_POSITION,
            sequence: 0,
            data: vec![0; 8],
        };
        assert!(me.angular_position().is_none());
    }
}
