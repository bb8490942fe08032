//! # freespace-tracker - orientation tracking for Freespace motion devices
//!
//! Cross-platform driver using hidapi. Provides:
//! - Device detection with one session per attached device
//! - Data-mode configuration for the Scoop, FSM-6 and FSM-9 variants
//! - Decoding of user-frame and motion-engine orientation into unit quaternions
//! - C FFI for integration with C/C++ hosts
//!
//! ## Quick Start
//! ```no_run
//! use freespace_tracker::{HidapiTransport, Settings, TrackerHost};
//!
//! let mut host = TrackerHost::new(HidapiTransport::new(), Settings::from_env());
//! host.detect().unwrap();
//! for _ in 0..100 {
//!     host.update();
//!     while let Some(sample) = host.try_recv() {
//!         println!("{}: {:?}", sample.device_name, sample.report.orientation);
//!     }
//! }
//! ```

pub mod error;
pub mod types;
pub mod protocol;
pub mod transport;
pub mod hid;
pub mod library;
pub mod handle;
pub mod configurator;
pub mod codec;
pub mod pump;
pub mod sink;
pub mod session;
pub mod detection;
pub mod host;
pub mod config;
pub mod ffi;

pub use config::Settings;
pub use detection::{ClaimRegistry, HardwareDetection};
pub use error::{FreespaceError, TransportError};
pub use hid::HidapiTransport;
pub use host::TrackerHost;
pub use session::TrackerSession;
pub use sink::{ChannelSink, OrientationSink, TaggedReport};
pub use types::*;

/// Result type alias for freespace-tracker operations.
pub type Result<T> = std::result::Result<T, FreespaceError>;
