//! Freespace orientation over WebSocket.
//!
//! Runs the tracker host on a dedicated thread and broadcasts every device's
//! orientation as JSON to all connected WebSocket clients:
//!
//! {"device":"FreespaceDevice0","w":1.0,"x":0.0,"y":0.0,"z":0.0,"roll":0.0,"pitch":0.0,"yaw":0.0,"seq":412}
//!
//! Usage:
//!   cargo run --release --example server
//!   Connect to ws://localhost:8081

use freespace_tracker::{HidapiTransport, Settings, TaggedReport, TrackerHost};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tungstenite::Message;

const PORT: u16 = 8081;

type WsClient = Arc<Mutex<tungstenite::WebSocket<TcpStream>>>;
type Clients = Arc<Mutex<Vec<WsClient>>>;

fn main() {
    env_logger::init();

    let clients: Clients = Arc::new(Mutex::new(Vec::new()));

    let tracker_clients = clients.clone();
    let running = Arc::new(AtomicBool::new(true));
    let tracker_running = running.clone();

    let tracker_thread = match std::thread::Builder::new()
        .name("freespace-host".into())
        .spawn(move || tracker_loop(tracker_clients, tracker_running))
    {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to spawn tracker thread: {}", e);
            std::process::exit(1);
        }
    };

    let listener = TcpListener::bind(format!("0.0.0.0:{}", PORT)).unwrap_or_else(|e| {
        eprintln!("Failed to bind port {}: {}", PORT, e);
        std::process::exit(1);
    });
    eprintln!("[WS] Listening on ws://localhost:{}", PORT);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[TCP] accept error: {}", e);
                continue;
            }
        };
        let clients = clients.clone();
        std::thread::spawn(move || handle_websocket(stream, clients));
    }

    running.store(false, Ordering::Relaxed);
    let _ = tracker_thread.join();
}

/// Complete the handshake and register the client for broadcast. The
/// tracker thread is the only writer and drops clients whose send fails.
fn handle_websocket(stream: TcpStream, clients: Clients) {
    stream.set_nodelay(true).ok();
    // Write timeout keeps a slow client from stalling the tracker thread
    stream.set_write_timeout(Some(Duration::from_secs(2))).ok();

    let ws = match tungstenite::accept(stream) {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("[WS] handshake error: {}", e);
            return;
        }
    };

    if let Ok(mut list) = clients.lock() {
        list.push(Arc::new(Mutex::new(ws)));
        eprintln!("[WS] Client connected ({} total)", list.len());
    }
}

fn to_json(sample: &TaggedReport) -> String {
    let r = &sample.report;
    let q = r.orientation;
    let [roll, pitch, yaw] = r.euler().to_degrees();
    serde_json::json!({
        "device": sample.device_name,
        "w": q.w, "x": q.x, "y": q.y, "z": q.z,
        "roll": roll, "pitch": pitch, "yaw": yaw,
        "seq": r.sequence,
    })
    .to_string()
}

fn broadcast(clients: &Clients, text: String) {
    let msg = Message::Text(text);
    if let Ok(mut list) = clients.lock() {
        list.retain(|ws| match ws.lock() {
            Ok(mut ws) => ws.send(msg.clone()).is_ok(),
            Err(_) => false,
        });
    }
}

/// Detect devices once a second while none are attached; otherwise tick the
/// host and forward every queued sample.
fn tracker_loop(clients: Clients, running: Arc<AtomicBool>) {
    let mut host = TrackerHost::new(HidapiTransport::new(), Settings::from_env());
    let mut last_detect: Option<Instant> = None;
    let mut count: u64 = 0;
    let mut last_report = Instant::now();

    while running.load(Ordering::Relaxed) {
        let due = last_detect.map_or(true, |t| t.elapsed() >= Duration::from_secs(1));
        if due {
            last_detect = Some(Instant::now());
            match host.detect() {
                Ok(0) => {}
                Ok(n) => eprintln!("[Freespace] {} device(s) added", n),
                Err(e) => eprintln!("[Freespace] detection failed: {}", e),
            }
        }

        if host.session_count() == 0 {
            std::thread::sleep(Duration::from_millis(200));
            continue;
        }

        host.update();
        while let Some(sample) = host.try_recv() {
            count += 1;
            broadcast(&clients, to_json(&sample));
        }

        if last_report.elapsed() >= Duration::from_secs(5) {
            let clients_count = clients.lock().map(|l| l.len()).unwrap_or(0);
            eprintln!(
                "[Freespace] {} samples/s, {} session(s), {} client(s)",
                (count as f64 / last_report.elapsed().as_secs_f64()) as u32,
                host.session_count(),
                clients_count
            );
            count = 0;
            last_report = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freespace_tracker::{OrientationReport, Quaternion};

    #[test]
    fn test_device_name_is_escaped() {
        let sample = TaggedReport {
            device_name: "Wand \"A\" \\ 0".to_string(),
            report: OrientationReport {
                sensor: 0,
                orientation: Quaternion::IDENTITY,
                translation: [0.0; 3],
                sequence: 3,
                host_timestamp_s: 0.5,
            },
        };
        let value: serde_json::Value = serde_json::from_str(&to_json(&sample)).unwrap();
        assert_eq!(value["device"], "Wand \"A\" \\ 0");
        assert_eq!(value["seq"], 3);
    }
}
