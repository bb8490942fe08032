use crate::protocol::{FSM6_PID, FSM9_PID, SCOOP_PID};
use std::f64::consts::PI;

/// Identity of an enumerated device as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub name: String,
}

impl DeviceIdentity {
    pub fn variant(&self) -> ProductVariant {
        ProductVariant::from_product_id(self.product_id)
    }
}

/// Protocol variant selected by product id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductVariant {
    Scoop,
    Fsm6,
    Fsm9,
    Unsupported,
}

impl ProductVariant {
    pub fn from_product_id(product_id: u16) -> Self {
        match product_id {
            SCOOP_PID => ProductVariant::Scoop,
            FSM6_PID => ProductVariant::Fsm6,
            FSM9_PID => ProductVariant::Fsm9,
            _ => ProductVariant::Unsupported,
        }
    }

    pub fn is_supported(self) -> bool {
        self != ProductVariant::Unsupported
    }
}

/// Which frame families the device is asked to stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub send_body_frames: bool,
    pub send_user_frames: bool,
}

impl Default for StreamConfig {
    /// User frames only: orientation without raw body motion.
    fn default() -> Self {
        Self {
            send_body_frames: false,
            send_user_frames: true,
        }
    }
}

impl StreamConfig {
    pub fn new(send_body_frames: bool, send_user_frames: bool) -> Self {
        Self {
            send_body_frames,
            send_user_frames,
        }
    }

    /// The configuration actually sent to the device.
    ///
    /// Requesting neither frame family would leave a tracker silent, so that
    /// combination degrades to [`StreamConfig::default`].
    pub fn effective(self) -> Self {
        if !self.send_body_frames && !self.send_user_frames {
            log::warn!("Stream config requests no frames; falling back to user frames only");
            Self::default()
        } else {
            self
        }
    }
}

/// Rotation quaternion (w, x, y, z), right-handed.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit-length copy, or `None` when the length is zero or not finite.
    pub fn normalized(&self) -> Option<Quaternion> {
        let len = self.norm();
        if len == 0.0 || !len.is_finite() {
            return None;
        }
        Some(Quaternion::new(
            self.w / len,
            self.x / len,
            self.y / len,
            self.z / len,
        ))
    }

    pub fn conjugate(&self) -> Quaternion {
        Quaternion::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Components in (w, x, y, z) order.
    pub fn to_array(&self) -> [f64; 4] {
        [self.w, self.x, self.y, self.z]
    }

    /// Roll/pitch/yaw in radians, from the rotation-matrix elements:
    ///   roll  = atan2(2(yz+wx), 2(w²+z²)-1)
    ///   pitch = asin(-(2(xz-wy)))
    ///   yaw   = atan2(2(xy+wz), 2(w²+x²)-1)
    pub fn to_euler(&self) -> EulerAngles {
        let Quaternion { w, x, y, z } = *self;
        let m11 = 2.0 * w * w + 2.0 * x * x - 1.0;
        let m12 = 2.0 * x * y + 2.0 * w * z;
        let m13 = 2.0 * x * z - 2.0 * w * y;
        let m23 = 2.0 * y * z + 2.0 * w * x;
        let m33 = 2.0 * w * w + 2.0 * z * z - 1.0;
        EulerAngles {
            roll: m23.atan2(m33),
            pitch: (-m13).clamp(-1.0, 1.0).asin(),
            yaw: m12.atan2(m11),
        }
    }

    /// Inverse of [`Quaternion::to_euler`] (Z-Y-X intrinsic order).
    pub fn from_euler(angles: &EulerAngles) -> Quaternion {
        let (sr, cr) = (angles.roll * 0.5).sin_cos();
        let (sp, cp) = (angles.pitch * 0.5).sin_cos();
        let (sy, cy) = (angles.yaw * 0.5).sin_cos();
        Quaternion::new(
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        )
    }
}

/// Euler angles in radians.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    /// [roll, pitch, yaw] in degrees.
    pub fn to_degrees(&self) -> [f64; 3] {
        [
            self.roll.to_degrees(),
            self.pitch.to_degrees(),
            self.yaw.to_degrees(),
        ]
    }
}

/// Radians per raw device angle unit (full circle = 65536 units).
pub const RAW_ANGLE_SCALE: f64 = PI / 32768.0;

/// Angles in the device's raw 16-bit units.
///
/// Roll is stored in the device's winding, which is opposite to ours; the
/// sign is flipped when converting to and from [`EulerAngles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawAngles {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
}

impl RawAngles {
    /// Quantize angles already in the device's winding, as derived from a
    /// device-frame quaternion.
    pub fn from_device_euler(angles: &EulerAngles) -> Self {
        Self {
            roll: radians_to_raw(angles.roll),
            pitch: radians_to_raw(angles.pitch),
            yaw: radians_to_raw(angles.yaw),
        }
    }

    /// Quantize consumer-winding angles.
    pub fn from_euler(angles: &EulerAngles) -> Self {
        Self {
            roll: radians_to_raw(-angles.roll),
            pitch: radians_to_raw(angles.pitch),
            yaw: radians_to_raw(angles.yaw),
        }
    }

    /// Radians in the consumer's winding.
    pub fn to_euler(&self) -> EulerAngles {
        EulerAngles {
            roll: -(self.roll as f64 * RAW_ANGLE_SCALE),
            pitch: self.pitch as f64 * RAW_ANGLE_SCALE,
            yaw: self.yaw as f64 * RAW_ANGLE_SCALE,
        }
    }
}

fn radians_to_raw(rad: f64) -> i16 {
    let units = (rad / RAW_ANGLE_SCALE).round() as i64;
    // wrap into [-32768, 32767]; +π and -π are the same raw angle
    ((units + 32768).rem_euclid(65536) - 32768) as i16
}

/// One orientation sample handed to the host tracker interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationReport {
    /// Sensor index; this device class has exactly one sensor per handle.
    pub sensor: u32,
    pub orientation: Quaternion,
    /// Always zero: these devices report orientation only.
    pub translation: [f64; 3],
    /// Device sequence number of the source message.
    pub sequence: u32,
    /// Host timestamp in seconds since the session opened.
    pub host_timestamp_s: f64,
}

impl OrientationReport {
    /// Host-facing Euler angles. The orientation is taken to raw device
    /// units and back, which flips roll into the consumer's winding.
    pub fn euler(&self) -> EulerAngles {
        RawAngles::from_device_euler(&self.orientation.to_euler()).to_euler()
    }
}

/// Result of one host tick.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue = 0,
    Fatal = 1,
}

/// Per-device session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Opened,
    Configured,
    Streaming,
    Closing,
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angle_diff(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(2.0 * PI);
        d.min(2.0 * PI - d)
    }

    #[test]
    fn test_variant_from_product_id() {
        assert_eq!(ProductVariant::from_product_id(0xC0B3), ProductVariant::Scoop);
        assert_eq!(ProductVariant::from_product_id(0xC080), ProductVariant::Fsm6);
        assert_eq!(ProductVariant::from_product_id(0xC0E0), ProductVariant::Fsm9);
        assert_eq!(
            ProductVariant::from_product_id(0x1234),
            ProductVariant::Unsupported
        );
        assert!(!ProductVariant::Unsupported.is_supported());
    }

    #[test]
    fn test_stream_config_never_both_off() {
        let cfg = StreamConfig::new(false, false).effective();
        assert_eq!(cfg, StreamConfig::default());
        let both = StreamConfig::new(true, true);
        assert_eq!(both.effective(), both);
    }

    #[test]
    fn test_zero_quaternion_does_not_normalize() {
        assert!(Quaternion::new(0.0, 0.0, 0.0, 0.0).normalized().is_none());
        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0).normalized().unwrap();
        assert_eq!(q, Quaternion::IDENTITY);
    }

    #[test]
    fn test_euler_identity() {
        let e = Quaternion::IDENTITY.to_euler();
        assert!(e.roll.abs() < 1e-12);
        assert!(e.pitch.abs() < 1e-12);
        assert!(e.yaw.abs() < 1e-12);
    }

    #[test]
    fn test_euler_quaternion_round_trip() {
        let angles = EulerAngles {
            roll: 0.3,
            pitch: -0.7,
            yaw: 2.1,
        };
        let back = Quaternion::from_euler(&angles).to_euler();
        assert!((back.roll - angles.roll).abs() < 1e-9);
        assert!((back.pitch - angles.pitch).abs() < 1e-9);
        assert!((back.yaw - angles.yaw).abs() < 1e-9);
    }

    #[test]
    fn test_raw_angle_round_trip_within_quantization() {
        let quantum = 2.0 * PI / 65536.0;
        let cases = [
            (0.0, 0.0, 0.0),
            (1.0, -0.5, 3.0),
            (-2.9, 1.2, -1.75),
            (PI - 1e-4, -PI / 2.0 + 1e-3, 0.123),
        ];
        for (roll, pitch, yaw) in cases {
            let angles = EulerAngles { roll, pitch, yaw };
            let back = RawAngles::from_euler(&angles).to_euler();
            assert!(angle_diff(back.roll, roll) <= quantum, "roll {}", roll);
            assert!(angle_diff(back.pitch, pitch) <= quantum, "pitch {}", pitch);
            assert!(angle_diff(back.yaw, yaw) <= quantum, "yaw {}", yaw);
        }
    }

    #[test]
    fn test_raw_roll_uses_device_winding() {
        let raw = RawAngles::from_euler(&EulerAngles {
            roll: PI / 2.0,
            pitch: PI / 2.0,
            yaw: 0.0,
        });
        assert_eq!(raw.roll, -16384);
        assert_eq!(raw.pitch, 16384);
    }

    #[test]
    fn test_report_euler_inverts_roll() {
        let quantum = 2.0 * PI / 65536.0;
        let report = OrientationReport {
            sensor: 0,
            orientation: Quaternion::from_euler(&EulerAngles {
                roll: 0.5,
                pitch: 0.2,
                yaw: -1.1,
            }),
            translation: [0.0; 3],
            sequence: 0,
            host_timestamp_s: 0.0,
        };
        let e = report.euler();
        assert!((e.roll + 0.5).abs() <= quantum, "roll {}", e.roll);
        assert!((e.pitch - 0.2).abs() <= quantum, "pitch {}", e.pitch);
        assert!((e.yaw + 1.1).abs() <= quantum, "yaw {}", e.yaw);
    }
}
