//! List attached Freespace devices and the variant each one maps to.

use freespace_tracker::transport::Transport;
use freespace_tracker::{HidapiTransport, Settings};

fn main() {
    env_logger::init();

    let settings = Settings::from_env();
    let transport = HidapiTransport::new();
    if let Err(e) = transport.init() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    match transport.enumerate(settings.max_devices) {
        Ok(ids) => {
            println!("Found {} Freespace device(s):", ids.len());
            for id in ids {
                match transport.device_info(id) {
                    Ok(info) => println!(
                        "  [{}] {}  VID={:04X} PID={:04X}  {:?}",
                        id,
                        info.name,
                        info.vendor_id,
                        info.product_id,
                        info.variant()
                    ),
                    Err(e) => println!("  [{}] <{}>", id, e),
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            transport.shutdown();
            std::process::exit(1);
        }
    }
    transport.shutdown();
}
