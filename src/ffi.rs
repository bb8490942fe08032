//! C FFI layer for freespace-tracker.
//!
//! Provides an opaque host handle for C/C++ consumers. The generated C
//! header is written to `include/freespace_tracker.h` by cbindgen.

use crate::config::Settings;
use crate::error::LastError;
use crate::hid::HidapiTransport;
use crate::host::TrackerHost;
use std::ffi::{c_char, c_int};

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Opaque tracker host for C consumers.
pub struct FsHost(TrackerHost<HidapiTransport>);

/// One orientation sample in C-compatible layout.
#[repr(C)]
pub struct FsOrientation {
    /// Quaternion [w, x, y, z].
    pub quaternion: [f64; 4],
    /// Always zero; Freespace devices report no position.
    pub translation: [f64; 3],
    /// Euler angles [roll, pitch, yaw] in degrees.
    pub euler_deg: [f64; 3],
    pub sensor: u32,
    pub sequence: u32,
    /// Host steady-clock timestamp in seconds.
    pub host_timestamp_s: f64,
    /// Index of the producing session in `fs_host_session_name` order at
    /// the time of the call, or -1 if it has since been removed.
    pub session: c_int,
}

/// Create a host configured from `FREESPACE_*` environment variables.
/// No devices are opened until `fs_host_detect`.
#[no_mangle]
pub extern "C" fn fs_host_new() -> *mut FsHost {
    LAST_ERROR.clear();
    let host = TrackerHost::new(HidapiTransport::new(), Settings::from_env());
    Box::into_raw(Box::new(FsHost(host)))
}

/// Close every session and free the host.
///
/// # Safety
/// `host` must be a pointer returned by `fs_host_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn fs_host_free(host: *mut FsHost) {
    if !host.is_null() {
        drop(Box::from_raw(host));
    }
}

/// Run one detection pass. Returns the number of sessions added, or -1 on
/// error (check `fs_last_error()`).
///
/// # Safety
/// `host` must be a valid pointer returned by `fs_host_new`.
#[no_mangle]
pub unsafe extern "C" fn fs_host_detect(host: *mut FsHost) -> c_int {
    let Some(host) = host.as_mut() else {
        return -1;
    };
    match host.0.detect() {
        Ok(added) => added as c_int,
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Tick every session once. Returns how many sessions ended on this tick,
/// or -1 if `host` is null.
///
/// # Safety
/// `host` must be a valid pointer returned by `fs_host_new`.
#[no_mangle]
pub unsafe extern "C" fn fs_host_update(host: *mut FsHost) -> c_int {
    match host.as_mut() {
        Some(host) => host.0.update() as c_int,
        None => -1,
    }
}

/// Number of live sessions.
///
/// # Safety
/// `host` must be a valid pointer returned by `fs_host_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn fs_host_session_count(host: *const FsHost) -> c_int {
    host.as_ref().map_or(0, |h| h.0.session_count() as c_int)
}

/// Copy the name of session `index` into `buf` (null-terminated,
/// truncated to `len - 1` bytes). Returns the full name length, or -1 if
/// the index is out of range.
///
/// # Safety
/// `host` must be a valid pointer returned by `fs_host_new`. `buf` must
/// point to at least `len` writable bytes, or be null.
#[no_mangle]
pub unsafe extern "C" fn fs_host_session_name(
    host: *const FsHost,
    index: c_int,
    buf: *mut c_char,
    len: c_int,
) -> c_int {
    let Some(host) = host.as_ref() else {
        return -1;
    };
    let Some(session) = usize::try_from(index)
        .ok()
        .and_then(|i| host.0.sessions().nth(i))
    else {
        return -1;
    };
    let name = session.name().as_bytes();
    if !buf.is_null() && len > 0 {
        let n = name.len().min(len as usize - 1);
        std::ptr::copy_nonoverlapping(name.as_ptr() as *const c_char, buf, n);
        buf.add(n).write(0);
    }
    name.len() as c_int
}

/// Take the next queued orientation sample.
/// Returns 1 if `out` was written, 0 if the queue is empty, -1 on error.
///
/// # Safety
/// `host` must be a valid pointer returned by `fs_host_new`. `out` must
/// point to a writable `FsOrientation`.
#[no_mangle]
pub unsafe extern "C" fn fs_host_poll_orientation(
    host: *const FsHost,
    out: *mut FsOrientation,
) -> c_int {
    let Some(host) = host.as_ref() else {
        return -1;
    };
    if out.is_null() {
        return -1;
    }
    let Some(tagged) = host.0.try_recv() else {
        return 0;
    };
    let session = host
        .0
        .sessions()
        .position(|s| s.name() == tagged.device_name)
        .map_or(-1, |i| i as c_int);
    let report = tagged.report;
    out.write(FsOrientation {
        quaternion: report.orientation.to_array(),
        translation: report.translation,
        euler_deg: report.euler().to_degrees(),
        sensor: report.sensor,
        sequence: report.sequence,
        host_timestamp_s: report.host_timestamp_s,
        session,
    });
    1
}

/// Get the last error message, or null if none.
/// The returned pointer is valid until the next call into this library.
#[no_mangle]
pub extern "C" fn fs_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}
