//! Stream orientation as JSON lines, one object per sample:
//!
//! {"device":"FreespaceDevice0","w":1.0,"x":0.0,"y":0.0,"z":0.0,"roll":0.0,"pitch":0.0,"yaw":0.0,"seq":412,"t":3.25}
//!
//! Usage: cargo run --release --example stream_json

use freespace_tracker::{HidapiTransport, Settings, TaggedReport, TrackerHost};
use std::io::{self, Write};
use std::time::Duration;

fn to_json(sample: &TaggedReport) -> String {
    let r = &sample.report;
    let q = r.orientation;
    let [roll, pitch, yaw] = r.euler().to_degrees();
    serde_json::json!({
        "device": sample.device_name,
        "w": q.w, "x": q.x, "y": q.y, "z": q.z,
        "roll": roll, "pitch": pitch, "yaw": yaw,
        "seq": r.sequence,
        "t": r.host_timestamp_s,
    })
    .to_string()
}

fn main() {
    env_logger::init();

    let mut host = TrackerHost::new(HidapiTransport::new(), Settings::from_env());
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut idle_polls: u32 = 0;

    eprintln!("Streaming JSON (Ctrl+C to stop)...");

    loop {
        if host.session_count() == 0 {
            match host.detect() {
                Ok(0) => {
                    idle_polls += 1;
                    if idle_polls >= 30 {
                        eprintln!("Stopping after 30s without a device");
                        break;
                    }
                    std::thread::sleep(Duration::from_secs(1));
                    continue;
                }
                Ok(n) => {
                    idle_polls = 0;
                    eprintln!("Opened {} device(s)", n);
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    break;
                }
            }
        }

        host.update();
        while let Some(sample) = host.try_recv() {
            let _ = writeln!(out, "{}", to_json(&sample));
        }
        let _ = out.flush();
    }
}
