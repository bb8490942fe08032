use crate::types::StreamConfig;

/// Runtime settings shared by every session a host creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub stream: StreamConfig,
    /// Conjugate user-frame quaternions (world-around-object → object frame).
    pub conjugate: bool,
    /// Bounded-wait read timeout for each tick.
    pub read_timeout_ms: u32,
    /// After a message arrives, drain whatever else is already queued.
    pub drain_backlog: bool,
    /// Enumeration cap.
    pub max_devices: usize,
    /// Prefix for host-side session names.
    pub device_name: String,
    /// Capacity of the orientation channel used by the C API.
    pub channel_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            conjugate: true,
            read_timeout_ms: 100,
            drain_backlog: true,
            max_devices: 100,
            device_name: "FreespaceDevice".to_string(),
            channel_capacity: 256,
        }
    }
}

impl Settings {
    /// Defaults overridden by `FREESPACE_*` environment variables.
    ///
    /// - `FREESPACE_SEND_BODY_FRAMES`, `FREESPACE_SEND_USER_FRAMES`
    /// - `FREESPACE_CONJUGATE`
    /// - `FREESPACE_READ_TIMEOUT_MS`
    /// - `FREESPACE_DRAIN`
    /// - `FREESPACE_MAX_DEVICES`
    /// - `FREESPACE_DEVICE_NAME`
    /// - `FREESPACE_CHANNEL_CAPACITY`
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let settings = Self {
            stream: StreamConfig::new(
                read_bool(&lookup, "FREESPACE_SEND_BODY_FRAMES", d.stream.send_body_frames),
                read_bool(&lookup, "FREESPACE_SEND_USER_FRAMES", d.stream.send_user_frames),
            ),
            conjugate: read_bool(&lookup, "FREESPACE_CONJUGATE", d.conjugate),
            read_timeout_ms: read_parsed(&lookup, "FREESPACE_READ_TIMEOUT_MS", d.read_timeout_ms),
            drain_backlog: read_bool(&lookup, "FREESPACE_DRAIN", d.drain_backlog),
            max_devices: read_parsed(&lookup, "FREESPACE_MAX_DEVICES", d.max_devices),
            device_name: read_string(&lookup, "FREESPACE_DEVICE_NAME", &d.device_name),
            channel_capacity: read_parsed(&lookup, "FREESPACE_CHANNEL_CAPACITY", d.channel_capacity)
                .max(1),
        };
        log::info!(
            "Freespace settings: body={} user={} conjugate={} timeout={}ms drain={} maxDevices={}",
            settings.stream.send_body_frames,
            settings.stream.send_user_frames,
            settings.conjugate,
            settings.read_timeout_ms,
            settings.drain_backlog,
            settings.max_devices,
        );
        settings
    }
}

fn read_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> bool {
    lookup(name)
        .and_then(|v| {
            let v = v.trim().to_ascii_lowercase();
            match v.as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            }
        })
        .unwrap_or(default)
}

fn read_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> T {
    lookup(name)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn read_string(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults_without_env() {
        assert_eq!(settings_from(&[]), Settings::default());
    }

    #[test]
    fn test_overrides() {
        let s = settings_from(&[
            ("FREESPACE_SEND_BODY_FRAMES", "Yes"),
            ("FREESPACE_SEND_USER_FRAMES", "off"),
            ("FREESPACE_CONJUGATE", "0"),
            ("FREESPACE_READ_TIMEOUT_MS", " 25 "),
            ("FREESPACE_DEVICE_NAME", "Wand"),
            ("FREESPACE_CHANNEL_CAPACITY", "0"),
        ]);
        assert_eq!(s.stream, StreamConfig::new(true, false));
        assert!(!s.conjugate);
        assert_eq!(s.read_timeout_ms, 25);
        assert_eq!(s.device_name, "Wand");
        assert_eq!(s.channel_capacity, 1);
    }

    #[test]
    fn test_garbage_falls_back_to_default() {
        let s = settings_from(&[
            ("FREESPACE_CONJUGATE", "maybe"),
            ("FREESPACE_READ_TIMEOUT_MS", "-3"),
            ("FREESPACE_DEVICE_NAME", "   "),
        ]);
        assert!(s.conjugate);
        assert_eq!(s.read_timeout_ms, 100);
        assert_eq!(s.device_name, "FreespaceDevice");
    }
}
