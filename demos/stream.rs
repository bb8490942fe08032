//! Stream orientation from every attached Freespace device to stdout.
//!
//! Usage: cargo run --example stream
//! Press Ctrl+C to stop.

use freespace_tracker::{HidapiTransport, Settings, TrackerHost};
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let mut host = TrackerHost::new(HidapiTransport::new(), Settings::from_env());
    match host.detect() {
        Ok(0) => {
            eprintln!("No Freespace device found");
            std::process::exit(1);
        }
        Ok(n) => println!("Opened {} device(s)", n),
        Err(e) => {
            eprintln!("Detection failed: {}", e);
            std::process::exit(1);
        }
    }

    for session in host.sessions() {
        println!(
            "{}: {} ({:?})",
            session.name(),
            session.identity().name,
            session.identity().variant()
        );
    }
    println!();
    println!("Streaming orientation (Ctrl+C to stop)...");

    let start = Instant::now();
    let mut count: u64 = 0;
    let mut last_report = Instant::now();

    while host.session_count() > 0 {
        let ended = host.update();
        if ended > 0 {
            eprintln!("{} device(s) lost", ended);
        }

        while let Some(sample) = host.try_recv() {
            count += 1;
            // Print every ~50th sample to avoid flooding the terminal
            if count % 50 == 1 {
                let q = sample.report.orientation;
                let [roll, pitch, yaw] = sample.report.euler().to_degrees();
                println!(
                    "{:<18} seq={:<8} quat=[{:+.3}, {:+.3}, {:+.3}, {:+.3}]  rpy=[{:+.1}, {:+.1}, {:+.1}]",
                    sample.device_name, sample.report.sequence, q.w, q.x, q.y, q.z, roll, pitch, yaw,
                );
            }
        }

        let now = Instant::now();
        if now.duration_since(last_report) >= Duration::from_secs(3) {
            let elapsed = start.elapsed().as_secs_f64();
            println!(
                "--- {} samples in {:.1}s ({:.1} Hz) ---",
                count,
                elapsed,
                count as f64 / elapsed
            );
            last_report = now;
        }
    }

    println!("All devices gone; exiting.");
}
