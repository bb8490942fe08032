use crate::protocol::{InMessage, MultiAxis, UserFrame};
use crate::types::Quaternion;

/// Converts device orientation encodings into unit quaternions in the
/// consumer's right-handed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationCodec {
    conjugate: bool,
}

impl Default for OrientationCodec {
    fn default() -> Self {
        Self { conjugate: true }
    }
}

impl OrientationCodec {
    /// `conjugate` selects whether user-frame quaternions are conjugated.
    ///
    /// The device reports user frames as the rotation of the world around the
    /// object; conjugating yields the rotation in the object's own frame.
    pub fn new(conjugate: bool) -> Self {
        Self { conjugate }
    }

    /// Normalize a raw (w, x, y, z) quaternion of arbitrary magnitude.
    ///
    /// A zero-length input has no direction; it maps to the identity rather
    /// than NaN.
    pub fn from_raw_quaternion(&self, w: f64, x: f64, y: f64, z: f64) -> Quaternion {
        let Some(q) = Quaternion::new(w, x, y, z).normalized() else {
            log::trace!("Degenerate quaternion ({}, {}, {}, {}), using identity", w, x, y, z);
            return Quaternion::IDENTITY;
        };
        if self.conjugate {
            q.conjugate()
        } else {
            q
        }
    }

    pub fn from_user_frame(&self, frame: &UserFrame) -> Quaternion {
        let [w, x, y, z] = frame.angular_position.map(f64::from);
        self.from_raw_quaternion(w, x, y, z)
    }

    /// Motion-engine angular position, already in the consumer frame.
    /// Components are reordered to (w, x, y, z) and renormalized to absorb
    /// fixed-point rounding.
    pub fn from_angular_position(&self, pos: &MultiAxis) -> Quaternion {
        Quaternion::new(pos.w, pos.x, pos.y, pos.z)
            .normalized()
            .unwrap_or(Quaternion::IDENTITY)
    }

    /// Orientation and sequence number carried by `msg`, if any.
    pub fn decode(&self, msg: &InMessage) -> Option<(Quaternion, u32)> {
        match msg {
            InMessage::UserFrame(frame) => Some((self.from_user_frame(frame), frame.sequence)),
            InMessage::MotionEngineOutput(me) => {
                let pos = me.angular_position()?;
                Some((self.from_angular_position(&pos), me.sequence))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Cursor, MotionEngineOutput, MotionFields};
    use std::f64::consts::FRAC_1_SQRT_2;

    fn user_frame(angular_position: [i16; 4]) -> UserFrame {
        UserFrame {
            cursor: Cursor::default(),
            sequence: 11,
            linear_position: [0; 3],
            angular_position,
        }
    }

    #[test]
    fn test_zero_quaternion_is_identity() {
        let codec = OrientationCodec::default();
        let q = codec.from_user_frame(&user_frame([0, 0, 0, 0]));
        assert_eq!(q, Quaternion::IDENTITY);
        assert!(q.w.is_finite());
    }

    #[test]
    fn test_output_is_unit_or_identity() {
        let codec = OrientationCodec::default();
        let inputs = [
            [1.0, 0.0, 0.0, 0.0],
            [32767.0, -32768.0, 12.0, 5.0],
            [1e-12, 0.0, 3e-12, 0.0],
            [-3.0, 4.0, 0.0, 12.0],
            [0.0, 0.0, 0.0, 1e-300],
            [0.0, 0.0, 0.0, 0.0],
        ];
        for [w, x, y, z] in inputs {
            let q = codec.from_raw_quaternion(w, x, y, z);
            assert!(
                (q.norm() - 1.0).abs() < 1e-6 || q == Quaternion::IDENTITY,
                "{:?} -> {:?}",
                [w, x, y, z],
                q
            );
        }
    }

    #[test]
    fn test_conjugate_is_configurable() {
        let frame = user_frame([7071, 0, 0, 7071]);

        let object = OrientationCodec::new(true).from_user_frame(&frame);
        assert!((object.w - FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((object.z + FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((object.to_euler().yaw.to_degrees() + 90.0).abs() < 1e-3);

        let world = OrientationCodec::new(false).from_user_frame(&frame);
        assert!((world.z - FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((world.to_euler().yaw.to_degrees() - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_angular_position_is_reordered() {
        let codec = OrientationCodec::default();
        let pos = MultiAxis {
            x: 0.0,
            y: FRAC_1_SQRT_2,
            z: 0.0,
            w: FRAC_1_SQRT_2,
        };
        let q = codec.from_angular_position(&pos);
        assert!((q.w - FRAC_1_SQRT_2).abs() < 1e-12);
        assert!((q.y - FRAC_1_SQRT_2).abs() < 1e-12);
        assert_eq!(q.x, 0.0);
    }

    #[test]
    fn test_decode_dispatches_by_message() {
        let codec = OrientationCodec::default();
        let mut data = Vec::new();
        for v in [0i16, 16384, 0, 0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let me = InMessage::MotionEngineOutput(MotionEngineOutput {
            format_select: 0,
            fields: MotionFields::ANGULAR_POSITION,
            sequence: 99,
            data,
        });
        let (q, seq) = codec.decode(&me).unwrap();
        assert_eq!(seq, 99);
        assert!((q.x - 1.0).abs() < 1e-12);

        let (_, seq) = codec
            .decode(&InMessage::UserFrame(user_frame([1, 0, 0, 0])))
            .unwrap();
        assert_eq!(seq, 11);

        let no_position = InMessage::MotionEngineOutput(MotionEngineOutput {
            format_select: 0,
            fields: MotionFields::CURSOR,
            sequence: 1,
            data: vec![0; 4],
        });
        assert!(codec.decode(&no_position).is_none());
        assert!(codec
            .decode(&InMessage::Unknown {
                report_id: 8,
                kind: 0x99
            })
            .is_none());
    }
}
